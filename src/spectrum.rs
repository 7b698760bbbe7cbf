use std::fmt;
use std::io::{self, Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_complex::Complex;

use crate::codec::{
    averaging_from_bits, averaging_to_bits, capacity_for, pol_from_code, pol_to_code,
    read_bool, read_complex_vec, read_f32_vec, read_len, read_string, write_bool,
    write_complex_slice, write_f32_slice, write_len, write_string,
};
use crate::header::{parse_met_info, parse_scan_header, write_met_info, write_scan_header};
use crate::header::{MetInfo, ScanHeader};
use crate::syscal::{parse_syscal, write_syscal, SyscalData};
use crate::utils::{finite_range, unwrap_phase};

pub type C32 = Complex<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pol {
    XX,
    YY,
    XY,
    YX,
}

impl Pol {
    pub const ALL: [Pol; 4] = [Pol::XX, Pol::YY, Pol::XY, Pol::YX];

    /// Operator-facing name (the feeds are labelled A and B).
    pub fn label(self) -> &'static str {
        match self {
            Pol::XX => "AA",
            Pol::YY => "BB",
            Pol::XY => "AB",
            Pol::YX => "BA",
        }
    }

    pub fn is_parallel(self) -> bool {
        matches!(self, Pol::XX | Pol::YY)
    }
}

impl fmt::Display for Pol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What is drawn on a y axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quantity {
    #[default]
    Amplitude,
    Phase,
    Real,
    Imaginary,
    Delay,
}

impl Quantity {
    pub fn short_name(self) -> &'static str {
        match self {
            Quantity::Amplitude => "AMPL",
            Quantity::Phase => "PHAS",
            Quantity::Real => "REAL",
            Quantity::Imaginary => "IMAG",
            Quantity::Delay => "DELY",
        }
    }

    pub fn axis_label(self) -> &'static str {
        match self {
            Quantity::Amplitude => "Amplitude (Pseudo-Jy)",
            Quantity::Phase => "Phase (degrees)",
            Quantity::Real => "Real",
            Quantity::Imaginary => "Imag",
            Quantity::Delay => "Delay (ns)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AveragingKind {
    #[default]
    Mean,
    Median,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AveragingDomain {
    /// Combine complex values, then derive amplitude and phase.
    #[default]
    Vector,
    /// Combine amplitude and phase separately.
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AveragingMethod {
    pub kind: AveragingKind,
    pub domain: AveragingDomain,
}

/// Per-window processing options the server used for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
    pub min_tvchannel: usize,
    pub max_tvchannel: usize,
    pub delay_averaging: usize,
    pub averaging_method: AveragingMethod,
}

impl Default for WindowOptions {
    fn default() -> Self {
        WindowOptions {
            min_tvchannel: 0,
            max_tvchannel: 0,
            delay_averaging: 1,
            averaging_method: AveragingMethod::default(),
        }
    }
}

impl WindowOptions {
    /// Tvchannel range clipped to `nchan` and put in ascending order.
    pub fn tvchannel_range(&self, nchan: usize) -> Option<(usize, usize)> {
        if nchan == 0 {
            return None;
        }
        let lo = self.min_tvchannel.min(self.max_tvchannel).min(nchan - 1);
        let hi = self.min_tvchannel.max(self.max_tvchannel).min(nchan - 1);
        Some((lo, hi))
    }
}

/// Server-owned options record. Blocks refer to one of these by index into
/// the table that arrived with the cycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AmpPhaseOptions {
    pub phase_in_degrees: bool,
    pub include_flagged_data: bool,
    pub windows: Vec<WindowOptions>,
}

impl AmpPhaseOptions {
    pub fn window(&self, w: usize) -> Option<&WindowOptions> {
        self.windows.get(w)
    }

    pub fn window_mut(&mut self, w: usize) -> Option<&mut WindowOptions> {
        self.windows.get_mut(w)
    }
}

pub type OptionsIndex = usize;

/// Ordered antenna pair, antennas numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Baseline {
    pub ant1: u32,
    pub ant2: u32,
}

impl Baseline {
    pub fn new(ant1: u32, ant2: u32) -> Self {
        Baseline { ant1, ant2 }
    }

    pub fn is_auto(self) -> bool {
        self.ant1 == self.ant2
    }

    pub fn label(self) -> String {
        format!("{}{}", self.ant1, self.ant2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    fn from_values<I: IntoIterator<Item = f32>>(values: I) -> Self {
        finite_range(values)
            .map(|(min, max)| ValueRange { min, max })
            .unwrap_or_default()
    }

    pub fn union(self, other: ValueRange) -> ValueRange {
        ValueRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BaselineLimits {
    pub amplitude: ValueRange,
    pub phase: ValueRange,
    pub real: ValueRange,
    pub imag: ValueRange,
    pub delay: ValueRange,
}

impl BaselineLimits {
    pub fn range(&self, quantity: Quantity) -> ValueRange {
        match quantity {
            Quantity::Amplitude => self.amplitude,
            Quantity::Phase => self.phase,
            Quantity::Real => self.real,
            Quantity::Imaginary => self.imag,
            Quantity::Delay => self.delay,
        }
    }
}

/// Amplitude and phase of every channel, bin and baseline of one window
/// and polarisation in a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AmpPhaseBlock {
    /// Window slot, counted from 0.
    pub window: usize,
    /// `f<n>` for continuum windows, `z<n>` for zooms.
    pub window_name: String,
    pub pol: Pol,
    pub options: OptionsIndex,
    pub channel: Vec<f32>,
    /// MHz.
    pub frequency: Vec<f32>,
    pub baselines: Vec<Baseline>,
    /// `[baseline][bin][channel]`.
    pub raw: Vec<Vec<Vec<C32>>>,
    pub amplitude: Vec<Vec<Vec<f32>>>,
    /// Degrees.
    pub phase: Vec<Vec<Vec<f32>>>,
    /// Nanoseconds, from the unwrapped phase slope across channels.
    pub delay: Vec<Vec<Vec<f32>>>,
    pub limits: Vec<BaselineLimits>,
}

impl AmpPhaseBlock {
    /// Builds a block from raw complex visibilities and derives every other
    /// quantity, including the per-baseline limits.
    pub fn from_raw(
        window: usize,
        window_name: &str,
        pol: Pol,
        options: OptionsIndex,
        channel: Vec<f32>,
        frequency: Vec<f32>,
        baselines: Vec<Baseline>,
        raw: Vec<Vec<Vec<C32>>>,
    ) -> Self {
        let amplitude: Vec<Vec<Vec<f32>>> = raw
            .iter()
            .map(|bins| bins.iter().map(|c| c.iter().map(|v| v.norm()).collect()).collect())
            .collect();
        let phase: Vec<Vec<Vec<f32>>> = raw
            .iter()
            .map(|bins| {
                bins.iter()
                    .map(|c| c.iter().map(|v| v.im.atan2(v.re).to_degrees()).collect())
                    .collect()
            })
            .collect();
        let delay: Vec<Vec<Vec<f32>>> = phase
            .iter()
            .map(|bins| bins.iter().map(|p| channel_delays(p, &frequency)).collect())
            .collect();

        let limits = (0..raw.len())
            .map(|b| BaselineLimits {
                amplitude: ValueRange::from_values(amplitude[b].iter().flatten().copied()),
                phase: ValueRange::from_values(phase[b].iter().flatten().copied()),
                real: ValueRange::from_values(raw[b].iter().flatten().map(|v| v.re)),
                imag: ValueRange::from_values(raw[b].iter().flatten().map(|v| v.im)),
                delay: ValueRange::from_values(delay[b].iter().flatten().copied()),
            })
            .collect();

        AmpPhaseBlock {
            window,
            window_name: window_name.to_string(),
            pol,
            options,
            channel,
            frequency,
            baselines,
            raw,
            amplitude,
            phase,
            delay,
            limits,
        }
    }

    pub fn nchannels(&self) -> usize {
        self.channel.len()
    }

    pub fn nbins(&self, baseline_index: usize) -> usize {
        self.raw.get(baseline_index).map(Vec::len).unwrap_or(0)
    }

    pub fn baseline_index(&self, baseline: Baseline) -> Option<usize> {
        self.baselines.iter().position(|b| *b == baseline)
    }

    /// True when the frequency axis runs downwards with channel number.
    pub fn is_inverted(&self) -> bool {
        match (self.frequency.first(), self.frequency.last()) {
            (Some(first), Some(last)) => last < first,
            _ => false,
        }
    }

    pub fn is_zoom(&self) -> bool {
        self.window_name.starts_with('z')
    }

    pub fn values(&self, quantity: Quantity, baseline_index: usize, bin: usize) -> Vec<f32> {
        let take = |arr: &Vec<Vec<Vec<f32>>>| {
            arr.get(baseline_index)
                .and_then(|bins| bins.get(bin))
                .cloned()
                .unwrap_or_default()
        };
        match quantity {
            Quantity::Amplitude => take(&self.amplitude),
            Quantity::Phase => take(&self.phase),
            Quantity::Delay => take(&self.delay),
            Quantity::Real | Quantity::Imaginary => self
                .raw
                .get(baseline_index)
                .and_then(|bins| bins.get(bin))
                .map(|c| {
                    c.iter()
                        .map(|v| if quantity == Quantity::Real { v.re } else { v.im })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Per-channel delay in ns from the phase slope. The last channel reuses the
/// preceding slope.
fn channel_delays(phase_deg: &[f32], frequency_mhz: &[f32]) -> Vec<f32> {
    let n = phase_deg.len().min(frequency_mhz.len());
    if n < 2 {
        return vec![0.0; phase_deg.len()];
    }
    let mut unwrapped = phase_deg[..n].to_vec();
    unwrap_phase(&mut unwrapped);

    let slope = |i: usize| {
        let df = frequency_mhz[i + 1] - frequency_mhz[i];
        if df == 0.0 {
            return 0.0;
        }
        // degrees per MHz -> microseconds -> ns
        (unwrapped[i + 1] - unwrapped[i]) / (360.0 * df) * 1000.0
    };
    let mut out: Vec<f32> = (0..n - 1).map(slope).collect();
    out.push(out[n - 2]);
    out.resize(phase_deg.len(), 0.0);
    out
}

/// One correlator integration as delivered by the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CycleData {
    pub header: ScanHeader,
    pub syscal: SyscalData,
    pub met: MetInfo,
    /// `[window][pol]`.
    pub windows: Vec<Vec<AmpPhaseBlock>>,
}

impl CycleData {
    pub fn num_windows(&self) -> usize {
        self.windows.len()
    }

    pub fn num_pols(&self) -> usize {
        self.windows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn mjd(&self) -> Option<f64> {
        self.header.mjd()
    }

    pub fn window_names(&self) -> Vec<String> {
        self.windows
            .iter()
            .enumerate()
            .map(|(w, blocks)| {
                blocks
                    .first()
                    .map(|b| b.window_name.clone())
                    .unwrap_or_else(|| format!("f{}", w + 1))
            })
            .collect()
    }

    pub fn block(&self, window: usize, pol: Pol) -> Option<&AmpPhaseBlock> {
        self.windows.get(window)?.iter().find(|b| b.pol == pol)
    }

    pub fn pols_in_window(&self, window: usize) -> Vec<Pol> {
        self.windows
            .get(window)
            .map(|blocks| blocks.iter().map(|b| b.pol).collect())
            .unwrap_or_default()
    }
}

pub fn parse_options(cursor: &mut Cursor<&[u8]>) -> io::Result<AmpPhaseOptions> {
    let phase_in_degrees = read_bool(cursor)?;
    let include_flagged_data = read_bool(cursor)?;
    let nwin = read_len(cursor)?;
    let mut windows = Vec::with_capacity(capacity_for(cursor, nwin, 16));
    for _ in 0..nwin {
        windows.push(WindowOptions {
            min_tvchannel: cursor.read_u32::<LittleEndian>()? as usize,
            max_tvchannel: cursor.read_u32::<LittleEndian>()? as usize,
            delay_averaging: (cursor.read_u32::<LittleEndian>()? as usize).max(1),
            averaging_method: averaging_from_bits(cursor.read_u32::<LittleEndian>()?),
        });
    }
    Ok(AmpPhaseOptions {
        phase_in_degrees,
        include_flagged_data,
        windows,
    })
}

pub fn write_options<W: Write>(w: &mut W, options: &AmpPhaseOptions) -> io::Result<()> {
    write_bool(w, options.phase_in_degrees)?;
    write_bool(w, options.include_flagged_data)?;
    write_len(w, options.windows.len())?;
    for win in &options.windows {
        w.write_u32::<LittleEndian>(win.min_tvchannel as u32)?;
        w.write_u32::<LittleEndian>(win.max_tvchannel as u32)?;
        w.write_u32::<LittleEndian>(win.delay_averaging as u32)?;
        w.write_u32::<LittleEndian>(averaging_to_bits(win.averaging_method))?;
    }
    Ok(())
}

/// Options table as carried on the wire: a count then that many records.
pub fn parse_options_table(cursor: &mut Cursor<&[u8]>) -> io::Result<Vec<AmpPhaseOptions>> {
    let n = read_len(cursor)?;
    (0..n).map(|_| parse_options(cursor)).collect()
}

pub fn write_options_table<W: Write>(w: &mut W, table: &[AmpPhaseOptions]) -> io::Result<()> {
    write_len(w, table.len())?;
    for options in table {
        write_options(w, options)?;
    }
    Ok(())
}

fn parse_block(cursor: &mut Cursor<&[u8]>) -> io::Result<AmpPhaseBlock> {
    let window = cursor.read_u32::<LittleEndian>()? as usize;
    let window_name = read_string(cursor)?;
    let pol = pol_from_code(cursor.read_u8()?)?;
    let options = cursor.read_u32::<LittleEndian>()? as usize;
    let channel = read_f32_vec(cursor)?;
    let frequency = read_f32_vec(cursor)?;
    if frequency.len() != channel.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "window {}: {} frequencies for {} channels",
                window_name,
                frequency.len(),
                channel.len()
            ),
        ));
    }

    let nbaselines = read_len(cursor)?;
    let mut baselines = Vec::with_capacity(capacity_for(cursor, nbaselines, 12));
    let mut raw = Vec::with_capacity(capacity_for(cursor, nbaselines, 12));
    for _ in 0..nbaselines {
        let ant1 = cursor.read_u32::<LittleEndian>()?;
        let ant2 = cursor.read_u32::<LittleEndian>()?;
        baselines.push(Baseline::new(ant1, ant2));
        let nbins = read_len(cursor)?;
        let mut bins = Vec::with_capacity(capacity_for(cursor, nbins, 4));
        for _ in 0..nbins {
            let samples = read_complex_vec(cursor)?;
            if samples.len() != channel.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "window {} baseline {}: {} samples for {} channels",
                        window_name,
                        Baseline::new(ant1, ant2).label(),
                        samples.len(),
                        channel.len()
                    ),
                ));
            }
            bins.push(samples);
        }
        raw.push(bins);
    }

    Ok(AmpPhaseBlock::from_raw(
        window,
        &window_name,
        pol,
        options,
        channel,
        frequency,
        baselines,
        raw,
    ))
}

fn write_block<W: Write>(w: &mut W, block: &AmpPhaseBlock) -> io::Result<()> {
    w.write_u32::<LittleEndian>(block.window as u32)?;
    write_string(w, &block.window_name)?;
    w.write_u8(pol_to_code(block.pol))?;
    w.write_u32::<LittleEndian>(block.options as u32)?;
    write_f32_slice(w, &block.channel)?;
    write_f32_slice(w, &block.frequency)?;
    write_len(w, block.baselines.len())?;
    for (b, baseline) in block.baselines.iter().enumerate() {
        w.write_u32::<LittleEndian>(baseline.ant1)?;
        w.write_u32::<LittleEndian>(baseline.ant2)?;
        let bins = block.raw.get(b).map(Vec::as_slice).unwrap_or(&[]);
        write_len(w, bins.len())?;
        for samples in bins {
            write_complex_slice(w, samples)?;
        }
    }
    Ok(())
}

pub fn parse_cycle(cursor: &mut Cursor<&[u8]>) -> io::Result<CycleData> {
    let header = parse_scan_header(cursor)?;
    let syscal = parse_syscal(cursor)?;
    let met = parse_met_info(cursor)?;
    let nwin = read_len(cursor)?;
    let mut windows = Vec::with_capacity(capacity_for(cursor, nwin, 4));
    for _ in 0..nwin {
        let npol = read_len(cursor)?;
        let blocks = (0..npol)
            .map(|_| parse_block(cursor))
            .collect::<io::Result<Vec<_>>>()?;
        windows.push(blocks);
    }
    Ok(CycleData {
        header,
        syscal,
        met,
        windows,
    })
}

pub fn write_cycle<W: Write>(w: &mut W, cycle: &CycleData) -> io::Result<()> {
    write_scan_header(w, &cycle.header)?;
    write_syscal(w, &cycle.syscal)?;
    write_met_info(w, &cycle.met)?;
    write_len(w, cycle.windows.len())?;
    for blocks in &cycle.windows {
        write_len(w, blocks.len())?;
        for block in blocks {
            write_block(w, block)?;
        }
    }
    Ok(())
}
