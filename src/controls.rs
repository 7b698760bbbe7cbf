//! What the operator has asked to see.
//!
//! `SpdControls` drives the spectrum pages and `VisControls` the time-series
//! pages. Each group of mutually exclusive choices (x axis, y quantity,
//! amplitude scaling) is a single enum field, so setting one choice
//! replaces the previous one.

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::error::{NspdError, Result};
use crate::geometry::MAX_YPANELS;
use crate::header::MetField;
use crate::spectrum::{CycleData, Pol, Quantity};
use crate::syscal::SyscalQuantity;
use crate::utils::minmatch;

/// Window slots a control record can address.
pub const MAX_WINDOWS: usize = 34;
/// Highest antenna number the array specification understands.
pub const MAX_ANTENNAS: u32 = 9;

/// Y quantity of a spectrum page.
pub type YKind = Quantity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XAxis {
    #[default]
    Channel,
    Frequency,
}

impl XAxis {
    pub fn toggled(self) -> XAxis {
        match self {
            XAxis::Channel => XAxis::Frequency,
            XAxis::Frequency => XAxis::Channel,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            XAxis::Channel => "Channel",
            XAxis::Frequency => "Frequency (MHz)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmpScale {
    #[default]
    Linear,
    Log,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PolSet: u8 {
        const XX = 1 << 0;
        const YY = 1 << 1;
        const XY = 1 << 2;
        const YX = 1 << 3;
    }
}

impl PolSet {
    pub fn from_pol(pol: Pol) -> PolSet {
        match pol {
            Pol::XX => PolSet::XX,
            Pol::YY => PolSet::YY,
            Pol::XY => PolSet::XY,
            Pol::YX => PolSet::YX,
        }
    }

    pub fn has(self, pol: Pol) -> bool {
        self.contains(PolSet::from_pol(pol))
    }

    /// Members in XX, YY, XY, YX order.
    pub fn pols(self) -> Vec<Pol> {
        Pol::ALL.into_iter().filter(|p| self.has(*p)).collect()
    }

    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }

    /// `aa`, `bb`, `ab`, `ba` or `*`.
    pub fn from_keyword(token: &str) -> Option<PolSet> {
        match token.to_ascii_lowercase().as_str() {
            "aa" => Some(PolSet::XX),
            "bb" => Some(PolSet::YY),
            "ab" => Some(PolSet::XY),
            "ba" => Some(PolSet::YX),
            "*" => Some(PolSet::all()),
            _ => None,
        }
    }
}

bitflags! {
    /// Which products may be drawn at all, independent of the selection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PlotFlags: u8 {
        const XX = 1 << 0;
        const YY = 1 << 1;
        const XY = 1 << 2;
        const YX = 1 << 3;
        const AUTOS = 1 << 4;
        const CROSSES = 1 << 5;
    }
}

impl Default for PlotFlags {
    fn default() -> Self {
        PlotFlags::XX | PlotFlags::YY | PlotFlags::AUTOS | PlotFlags::CROSSES
    }
}

impl PlotFlags {
    /// Targets of the `on` and `off` commands.
    pub fn from_keyword(token: &str) -> Option<PlotFlags> {
        match token.to_ascii_lowercase().as_str() {
            "acs" => Some(PlotFlags::AUTOS),
            "ccs" => Some(PlotFlags::CROSSES),
            "aa" => Some(PlotFlags::XX),
            "bb" => Some(PlotFlags::YY),
            "ab" => Some(PlotFlags::XY),
            "ba" => Some(PlotFlags::YX),
            _ => None,
        }
    }

    pub fn allows(self, pol: Pol) -> bool {
        match pol {
            Pol::XX => self.contains(PlotFlags::XX),
            Pol::YY => self.contains(PlotFlags::YY),
            Pol::XY => self.contains(PlotFlags::XY),
            Pol::YX => self.contains(PlotFlags::YX),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Decorations: u8 {
        const TVCHANNELS = 1 << 0;
        const AVERAGED = 1 << 1;
    }
}

/// Antennas in use; bit `k` is antenna `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArraySpec(u16);

impl Default for ArraySpec {
    fn default() -> Self {
        ArraySpec::from_antennas(1..=6)
    }
}

impl ArraySpec {
    pub fn empty() -> Self {
        ArraySpec(0)
    }

    pub fn from_antennas<I: IntoIterator<Item = u32>>(antennas: I) -> Self {
        let mut bits = 0u16;
        for ant in antennas {
            if (1..=MAX_ANTENNAS).contains(&ant) {
                bits |= 1 << ant;
            }
        }
        ArraySpec(bits)
    }

    /// Collects every digit 1..9 found in the tokens.
    pub fn from_digits<'a, I: IntoIterator<Item = &'a str>>(tokens: I) -> Self {
        ArraySpec::from_antennas(
            tokens
                .into_iter()
                .flat_map(|t| t.chars())
                .filter_map(|c| c.to_digit(10)),
        )
    }

    pub fn contains(self, ant: u32) -> bool {
        ant <= MAX_ANTENNAS && self.0 & (1 << ant) != 0
    }

    pub fn antennas(self) -> Vec<u32> {
        (1..=MAX_ANTENNAS).filter(|a| self.contains(*a)).collect()
    }

    pub fn count(self) -> usize {
        self.antennas().len()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn highest(self) -> Option<u32> {
        self.antennas().last().copied()
    }

    pub fn intersection(self, other: ArraySpec) -> ArraySpec {
        ArraySpec(self.0 & other.0)
    }

    /// Antenna digits with `-` for antennas not in use.
    pub fn display(self, max_ants: u32) -> String {
        (1..=max_ants)
            .map(|a| {
                if self.contains(a) {
                    char::from_digit(a % 10, 10).unwrap_or('?')
                } else {
                    '-'
                }
            })
            .collect()
    }
}

/// An inclusive channel range, always ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRange {
    pub min: usize,
    pub max: usize,
}

impl ChannelRange {
    pub fn new(a: usize, b: usize) -> Self {
        ChannelRange {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

fn sorted_pair(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpdControls {
    pub x_axis: XAxis,
    pub y_kind: YKind,
    pub amp_scale: AmpScale,
    pub pols: PolSet,
    pub consistent_yrange: bool,
    pub decorations: Decorations,
    pub plot_flags: PlotFlags,
    /// Window slots selected for display.
    pub if_num_spec: Vec<bool>,
    pub channel_range: Vec<Option<ChannelRange>>,
    pub yaxis_range: Option<(f32, f32)>,
    pub array_spec: ArraySpec,
    pub interactive: bool,
}

impl Default for SpdControls {
    fn default() -> Self {
        SpdControls {
            x_axis: XAxis::Channel,
            y_kind: Quantity::Amplitude,
            amp_scale: AmpScale::Linear,
            pols: PolSet::XX | PolSet::YY,
            consistent_yrange: true,
            decorations: Decorations::empty(),
            plot_flags: PlotFlags::default(),
            if_num_spec: vec![true; MAX_WINDOWS],
            channel_range: vec![None; MAX_WINDOWS],
            yaxis_range: None,
            array_spec: ArraySpec::default(),
            interactive: true,
        }
    }
}

impl SpdControls {
    pub fn npols(&self) -> usize {
        self.pols.count()
    }

    pub fn toggle_x_axis(&mut self) {
        self.x_axis = self.x_axis.toggled();
    }

    /// Sets the y quantity; a range replaces the override, `None` clears it.
    pub fn set_y_kind(&mut self, kind: YKind, range: Option<(f32, f32)>) {
        self.y_kind = kind;
        self.yaxis_range = range.map(|(a, b)| sorted_pair(a, b));
    }

    pub fn set_amp_scale(&mut self, scale: AmpScale) {
        self.amp_scale = scale;
    }

    pub fn set_windows(&mut self, windows: &[usize]) {
        self.if_num_spec.iter_mut().for_each(|w| *w = false);
        for &w in windows {
            if let Some(slot) = self.if_num_spec.get_mut(w) {
                *slot = true;
            }
        }
    }

    pub fn shown_windows(&self) -> Vec<usize> {
        self.if_num_spec
            .iter()
            .enumerate()
            .filter_map(|(w, on)| on.then_some(w))
            .collect()
    }

    pub fn set_channel_range(&mut self, window: usize, a: usize, b: usize) -> Result<()> {
        let slot = self.channel_range.get_mut(window).ok_or_else(|| {
            NspdError::out_of_range(format!("window slot {} does not exist", window + 1))
        })?;
        *slot = Some(ChannelRange::new(a, b));
        Ok(())
    }

    pub fn clear_channel_ranges(&mut self) {
        self.channel_range.iter_mut().for_each(|r| *r = None);
    }

    /// Turns flags on or off; true when anything changed.
    pub fn set_flags(&mut self, flags: PlotFlags, on: bool) -> bool {
        let before = self.plot_flags;
        self.plot_flags.set(flags, on);
        before != self.plot_flags
    }

    pub fn set_decoration(&mut self, decoration: Decorations, on: bool) {
        self.decorations.set(decoration, on);
    }

    /// Copy of the controls restricted to what the cycle actually holds.
    pub fn reconcile(&self, cycle: &CycleData) -> SpdControls {
        let mut out = self.clone();
        let nwin = cycle.num_windows();
        for (w, shown) in out.if_num_spec.iter_mut().enumerate() {
            *shown = *shown && w < nwin && !cycle.windows[w].is_empty();
        }
        for (w, range) in out.channel_range.iter_mut().enumerate() {
            let nchan = cycle
                .windows
                .get(w)
                .and_then(|blocks| blocks.first())
                .map(|b| b.nchannels())
                .unwrap_or(0);
            *range = match (*range, nchan) {
                (Some(r), n) if n > 0 => Some(ChannelRange::new(r.min.min(n - 1), r.max.min(n - 1))),
                _ => None,
            };
        }
        let available = cycle
            .windows
            .iter()
            .flatten()
            .fold(PolSet::empty(), |acc, b| acc | PolSet::from_pol(b.pol));
        out.pols = out.pols & available;

        let present = ArraySpec::from_antennas(
            cycle
                .windows
                .iter()
                .flatten()
                .flat_map(|b| b.baselines.iter())
                .flat_map(|bl| [bl.ant1, bl.ant2]),
        );
        out.array_spec = out.array_spec.intersection(present);
        out
    }
}

/// One stacked panel of a time-series page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VisPanel {
    Time,
    Amplitude,
    Phase,
    Delay,
    Tsys,
    ComputedTsys,
    Gtp,
    Sdo,
    CalJy,
    Temperature,
    Pressure,
    Humidity,
    WindSpeed,
    WindDirection,
    RainGauge,
    SeemonPhase,
    SeemonRms,
}

impl VisPanel {
    const KEYWORDS: [(VisPanel, &'static str, usize); 16] = [
        (VisPanel::Amplitude, "amplitude", 1),
        (VisPanel::Phase, "phase", 1),
        (VisPanel::Delay, "delay", 1),
        (VisPanel::Tsys, "tsys", 2),
        (VisPanel::ComputedTsys, "ctsys", 2),
        (VisPanel::Gtp, "gtp", 1),
        (VisPanel::Sdo, "sdo", 2),
        (VisPanel::CalJy, "caljy", 2),
        (VisPanel::Temperature, "temperature", 2),
        (VisPanel::Pressure, "pressure", 2),
        (VisPanel::Humidity, "humidity", 2),
        (VisPanel::WindSpeed, "wspd", 2),
        (VisPanel::WindDirection, "wdir", 2),
        (VisPanel::RainGauge, "rain", 1),
        (VisPanel::SeemonPhase, "smph", 3),
        (VisPanel::SeemonRms, "smrm", 3),
    ];

    pub fn from_keyword(token: &str) -> Option<VisPanel> {
        Self::KEYWORDS
            .iter()
            .find(|(_, keyword, min)| minmatch(keyword, token, *min))
            .map(|(panel, _, _)| *panel)
    }

    pub fn can_be_x(self) -> bool {
        matches!(self, VisPanel::Time)
    }

    pub fn is_visibility(self) -> bool {
        matches!(self, VisPanel::Amplitude | VisPanel::Phase | VisPanel::Delay)
    }

    pub fn syscal_quantity(self) -> Option<SyscalQuantity> {
        match self {
            VisPanel::Tsys => Some(SyscalQuantity::OnlineTsys),
            VisPanel::ComputedTsys => Some(SyscalQuantity::ComputedTsys),
            VisPanel::Gtp => Some(SyscalQuantity::Gtp),
            VisPanel::Sdo => Some(SyscalQuantity::Sdo),
            VisPanel::CalJy => Some(SyscalQuantity::CalJy),
            _ => None,
        }
    }

    pub fn met_field(self) -> Option<MetField> {
        match self {
            VisPanel::Temperature => Some(MetField::Temperature),
            VisPanel::Pressure => Some(MetField::Pressure),
            VisPanel::Humidity => Some(MetField::Humidity),
            VisPanel::WindSpeed => Some(MetField::WindSpeed),
            VisPanel::WindDirection => Some(MetField::WindDirection),
            VisPanel::RainGauge => Some(MetField::RainGauge),
            VisPanel::SeemonPhase => Some(MetField::SeemonPhase),
            VisPanel::SeemonRms => Some(MetField::SeemonRms),
            _ => None,
        }
    }

    pub fn axis_label(self) -> &'static str {
        match self {
            VisPanel::Time => "Time (UT)",
            VisPanel::Amplitude => "Amplitude (Pseudo-Jy)",
            VisPanel::Phase => "Phase (deg)",
            VisPanel::Delay => "Delay (ns)",
            VisPanel::Tsys => "Tsys (K)",
            VisPanel::ComputedTsys => "Computed Tsys (K)",
            VisPanel::Gtp => "GTP",
            VisPanel::Sdo => "SDO",
            VisPanel::CalJy => "Noise Cal (Jy)",
            VisPanel::Temperature => "Temperature (C)",
            VisPanel::Pressure => "Pressure (hPa)",
            VisPanel::Humidity => "Humidity (%)",
            VisPanel::WindSpeed => "Wind Speed (km/h)",
            VisPanel::WindDirection => "Wind Dir (deg)",
            VisPanel::RainGauge => "Rain (mm)",
            VisPanel::SeemonPhase => "Seemon Phase (deg)",
            VisPanel::SeemonRms => "Seemon RMS (um)",
        }
    }

    /// The time-series panel that shows a spectrum y quantity, if any.
    pub fn from_quantity(quantity: Quantity) -> Option<VisPanel> {
        match quantity {
            Quantity::Amplitude => Some(VisPanel::Amplitude),
            Quantity::Phase => Some(VisPanel::Phase),
            Quantity::Delay => Some(VisPanel::Delay),
            Quantity::Real | Quantity::Imaginary => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisControls {
    pub panels: Vec<VisPanel>,
    pub panel_limits: BTreeMap<VisPanel, (f32, f32)>,
    pub x_axis: VisPanel,
    /// Window labels to plot, such as `f1` or `z3`.
    pub visbands: Vec<String>,
    /// Seconds.
    pub cycletime: f32,
    /// Minutes of history shown.
    pub history_length: f32,
    /// Minutes before the latest cycle at which the shown history begins.
    pub history_start: f32,
    /// Antenna whose Tsys is taken from the second antenna of a baseline;
    /// `None` means the highest active antenna.
    pub reference_antenna: Option<u32>,
    pub array_spec: ArraySpec,
    pub pols: PolSet,
    pub plot_flags: PlotFlags,
    pub sort_baselines: bool,
}

impl Default for VisControls {
    fn default() -> Self {
        VisControls {
            panels: vec![VisPanel::Amplitude, VisPanel::Phase],
            panel_limits: BTreeMap::new(),
            x_axis: VisPanel::Time,
            visbands: vec!["f1".to_string(), "f2".to_string()],
            cycletime: 10.0,
            history_length: 20.0,
            history_start: 20.0,
            reference_antenna: None,
            array_spec: ArraySpec::default(),
            pols: PolSet::XX | PolSet::YY | PolSet::XY,
            plot_flags: PlotFlags::default(),
            sort_baselines: true,
        }
    }
}

impl VisControls {
    pub fn num_panels(&self) -> usize {
        self.panels.len()
    }

    pub fn nvisbands(&self) -> usize {
        self.visbands.len()
    }

    pub fn set_x_axis(&mut self, panel: VisPanel) -> Result<()> {
        if !panel.can_be_x() {
            return Err(NspdError::out_of_range(format!(
                "{:?} cannot be used as the x axis",
                panel
            )));
        }
        self.x_axis = panel;
        Ok(())
    }

    pub fn set_panels(&mut self, panels: Vec<VisPanel>) -> Result<()> {
        if panels.is_empty() {
            return Err(NspdError::parse("no panels given"));
        }
        if panels.len() > MAX_YPANELS {
            return Err(NspdError::out_of_range(format!(
                "{} panels requested, at most {} fit",
                panels.len(),
                MAX_YPANELS
            )));
        }
        self.panels = panels;
        Ok(())
    }

    pub fn set_panel_limits(&mut self, panel: VisPanel, range: Option<(f32, f32)>) {
        match range {
            Some((a, b)) => {
                self.panel_limits.insert(panel, sorted_pair(a, b));
            }
            None => {
                self.panel_limits.remove(&panel);
            }
        }
    }

    pub fn set_history(&mut self, length: f32, start: Option<f32>) -> Result<()> {
        if !length.is_finite() || length <= 0.0 {
            return Err(NspdError::out_of_range("history length must be positive"));
        }
        let start = start.unwrap_or(length);
        if start < 0.0 {
            return Err(NspdError::out_of_range("history start must not be negative"));
        }
        self.history_length = length;
        self.history_start = start;
        Ok(())
    }

    /// Antenna above which Tsys comes from the second antenna of a pair.
    pub fn threshold_antenna(&self) -> Option<u32> {
        self.reference_antenna.or_else(|| self.array_spec.highest())
    }

    /// Drops bands the cycle does not carry and antennas it does not have.
    pub fn reconcile(&self, cycle: &CycleData) -> VisControls {
        let mut out = self.clone();
        let names = cycle.window_names();
        out.visbands
            .retain(|band| names.iter().any(|n| n.eq_ignore_ascii_case(band)));
        let present = ArraySpec::from_antennas(
            cycle
                .windows
                .iter()
                .flatten()
                .flat_map(|b| b.baselines.iter())
                .flat_map(|bl| [bl.ant1, bl.ant2]),
        );
        out.array_spec = out.array_spec.intersection(present);
        if cycle.header.cycle_time > 0.0 {
            out.cycletime = cycle.header.cycle_time;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{AmpPhaseBlock, Baseline, C32};

    fn two_window_cycle() -> CycleData {
        let block = |w: usize, pol: Pol| {
            AmpPhaseBlock::from_raw(
                w,
                &format!("f{}", w + 1),
                pol,
                0,
                (0..16).map(|c| c as f32).collect(),
                (0..16).map(|c| 2000.0 + c as f32).collect(),
                vec![Baseline::new(1, 1), Baseline::new(1, 2), Baseline::new(2, 2)],
                vec![vec![vec![C32::new(1.0, 0.0); 16]]; 3],
            )
        };
        CycleData {
            windows: vec![
                vec![block(0, Pol::XX), block(0, Pol::YY)],
                vec![block(1, Pol::XX), block(1, Pol::YY)],
            ],
            ..CycleData::default()
        }
    }

    #[test]
    fn x_axis_toggle_is_an_involution() {
        let mut controls = SpdControls::default();
        let before = controls.clone();
        controls.toggle_x_axis();
        assert_eq!(controls.x_axis, XAxis::Frequency);
        controls.toggle_x_axis();
        assert_eq!(controls, before);
    }

    #[test]
    fn ranges_are_stored_ascending() {
        let mut controls = SpdControls::default();
        controls.set_y_kind(Quantity::Phase, Some((180.0, -180.0)));
        assert_eq!(controls.yaxis_range, Some((-180.0, 180.0)));
        controls.set_channel_range(1, 900, 100).unwrap();
        assert_eq!(controls.channel_range[1], Some(ChannelRange { min: 100, max: 900 }));
        controls.set_y_kind(Quantity::Amplitude, None);
        assert_eq!(controls.yaxis_range, None);
        assert!(controls.set_channel_range(MAX_WINDOWS, 0, 1).is_err());
    }

    #[test]
    fn flags_report_changes() {
        let mut controls = SpdControls::default();
        assert!(!controls.set_flags(PlotFlags::AUTOS, true));
        assert!(controls.set_flags(PlotFlags::AUTOS, false));
        assert!(controls.set_flags(PlotFlags::XY | PlotFlags::YX, true));
    }

    #[test]
    fn array_spec_from_digits() {
        let spec = ArraySpec::from_digits(["13", "5"]);
        assert_eq!(spec.antennas(), vec![1, 3, 5]);
        assert_eq!(spec.display(6), "1-3-5-");
        assert_eq!(spec.highest(), Some(5));
        assert!(ArraySpec::from_digits(["x0"]).is_empty());
    }

    #[test]
    fn reconcile_trims_to_data_shape() {
        let cycle = two_window_cycle();
        let mut controls = SpdControls::default();
        controls.pols = PolSet::all();
        controls.set_channel_range(0, 4, 400).unwrap();
        controls.set_channel_range(5, 1, 2).unwrap();
        let sane = controls.reconcile(&cycle);
        assert_eq!(sane.shown_windows(), vec![0, 1]);
        assert_eq!(sane.channel_range[0], Some(ChannelRange { min: 4, max: 15 }));
        assert_eq!(sane.channel_range[5], None);
        assert_eq!(sane.pols, PolSet::XX | PolSet::YY);
        assert_eq!(sane.array_spec.antennas(), vec![1, 2]);
        // the original is untouched
        assert_eq!(controls.pols, PolSet::all());
    }

    #[test]
    fn vis_bands_follow_the_data() {
        let cycle = two_window_cycle();
        let mut controls = VisControls::default();
        controls.visbands = vec!["f2".into(), "z7".into()];
        assert_eq!(controls.reconcile(&cycle).visbands, vec!["f2".to_string()]);
    }

    #[test]
    fn panel_keywords_use_minimum_match() {
        assert_eq!(VisPanel::from_keyword("amp"), Some(VisPanel::Amplitude));
        assert_eq!(VisPanel::from_keyword("ct"), Some(VisPanel::ComputedTsys));
        assert_eq!(VisPanel::from_keyword("te"), Some(VisPanel::Temperature));
        assert_eq!(VisPanel::from_keyword("t"), None);
        assert!(VisPanel::Time.can_be_x());
        assert!(!VisPanel::Amplitude.can_be_x());
        let mut controls = VisControls::default();
        assert!(controls.set_x_axis(VisPanel::Phase).is_err());
    }

    #[test]
    fn too_many_panels_leave_the_layout_alone() {
        let mut controls = VisControls::default();
        let before = controls.panels.clone();
        let err = controls
            .set_panels(vec![VisPanel::Amplitude; MAX_YPANELS + 1])
            .unwrap_err();
        assert!(matches!(err, NspdError::OutOfRange(_)));
        assert_eq!(controls.panels, before);
        controls.set_panels(vec![VisPanel::Phase; MAX_YPANELS]).unwrap();
        assert_eq!(controls.num_panels(), MAX_YPANELS);
    }

    #[test]
    fn history_start_defaults_to_length() {
        let mut controls = VisControls::default();
        controls.set_history(30.0, None).unwrap();
        assert_eq!((controls.history_length, controls.history_start), (30.0, 30.0));
        controls.set_history(10.0, Some(60.0)).unwrap();
        assert_eq!(controls.history_start, 60.0);
        assert!(controls.set_history(0.0, None).is_err());
    }
}
