//! Time-series pages: stacked panels of per-cycle quantities against UT,
//! one line per baseline, antenna or site quantity.

use tracing::{debug, trace};

use crate::controls::{PlotFlags, VisControls, VisPanel};
use crate::cycles::VisCycle;
use crate::device::{Axis, Colour, LineStyle, PlotDevice, Side, FOREGROUND, LIGHT_GREY};
use crate::error::Result;
use crate::geometry::{PanelGeometry, PanelSelect};
use crate::spectrum::{Baseline, Pol};
use crate::utils::{finite_range, SECONDS_PER_DAY};

/// Lines drawn in one panel at most.
pub const MAX_LINES: usize = 16;

/// Highest antenna shown in the antenna legend.
const LEGEND_ANTENNAS: u32 = 6;

/// Colour used for antenna `ant` in the legend and on antenna-based panels.
pub fn antenna_colour(ant: u32) -> Colour {
    (ant % 15 + 1) as Colour
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisLine {
    pub ant1: u32,
    pub ant2: u32,
    pub window: usize,
    pub window_label: String,
    pub pol: Pol,
    pub bin: usize,
    pub colour: Colour,
    pub line_style: LineStyle,
    /// Metres; zero for autocorrelations and site quantities.
    pub baseline_length: f64,
    pub label: String,
}

impl VisLine {
    fn new(baseline: Baseline, window: usize, window_label: &str, pol: Pol, length: f64) -> Self {
        VisLine {
            ant1: baseline.ant1,
            ant2: baseline.ant2,
            window,
            window_label: window_label.to_string(),
            pol,
            bin: 0,
            colour: FOREGROUND,
            line_style: LineStyle::Full,
            baseline_length: length,
            label: baseline.label(),
        }
    }

    pub fn baseline(&self) -> Baseline {
        Baseline::new(self.ant1, self.ant2)
    }
}

/// Expands a panel into its lines, using `reference` (normally the latest
/// cycle) for the baselines, windows and antenna positions available.
pub fn build_lines(panel: VisPanel, reference: &VisCycle, controls: &VisControls) -> Vec<VisLine> {
    let spec = controls.array_spec;
    let flags = controls.plot_flags;
    let many_bands = controls.nvisbands() > 1;
    let mut lines: Vec<VisLine> = Vec::new();

    if panel.is_visibility() {
        for band in &controls.visbands {
            let Some(w) = reference.window_index(band) else {
                continue;
            };
            for pol in controls.pols.pols() {
                let Some(quantity) = reference.quantity(w, pol) else {
                    continue;
                };
                for &baseline in &quantity.baselines {
                    if !spec.contains(baseline.ant1) || !spec.contains(baseline.ant2) {
                        continue;
                    }
                    let wanted = if baseline.is_auto() {
                        pol == Pol::XY && flags.contains(PlotFlags::AUTOS)
                    } else {
                        pol.is_parallel() && flags.contains(PlotFlags::CROSSES) && flags.allows(pol)
                    };
                    if !wanted {
                        continue;
                    }
                    let length = reference.header.baseline_length(baseline.ant1, baseline.ant2);
                    let mut line = VisLine::new(baseline, w, band, pol, length);
                    line.label = format!("{}{}", baseline.label(), pol.label());
                    if many_bands {
                        line.label = format!("{}:{}", line.label, band);
                    }
                    lines.push(line);
                }
            }
        }
        if controls.sort_baselines {
            lines.sort_by(|a, b| a.baseline_length.total_cmp(&b.baseline_length));
        }
        lines.truncate(MAX_LINES);
        for (i, line) in lines.iter_mut().enumerate() {
            line.colour = (i + 1) as Colour;
        }
    } else if panel.syscal_quantity().is_some() {
        let threshold = controls.threshold_antenna();
        let mut pairs: Vec<(usize, Pol)> = Vec::new();
        for band in &controls.visbands {
            let Some(w) = reference.window_index(band) else {
                continue;
            };
            for pol in [Pol::XX, Pol::YY] {
                if !controls.pols.has(pol) {
                    continue;
                }
                let Some(quantity) = reference.quantity(w, pol) else {
                    continue;
                };
                for &baseline in &quantity.baselines {
                    if !spec.contains(baseline.ant1) || !spec.contains(baseline.ant2) {
                        continue;
                    }
                    let ant = if baseline.is_auto() {
                        if !flags.contains(PlotFlags::AUTOS) {
                            continue;
                        }
                        baseline.ant1
                    } else {
                        if !flags.contains(PlotFlags::CROSSES) {
                            continue;
                        }
                        if Some(baseline.ant2) == threshold {
                            baseline.ant2
                        } else {
                            baseline.ant1
                        }
                    };
                    if lines
                        .iter()
                        .any(|l| l.ant1 == ant && l.window == w && l.pol == pol)
                    {
                        continue;
                    }
                    let style_index = match pairs.iter().position(|p| *p == (w, pol)) {
                        Some(i) => i,
                        None => {
                            pairs.push((w, pol));
                            pairs.len() - 1
                        }
                    };
                    let mut line = VisLine::new(Baseline::new(ant, ant), w, band, pol, 0.0);
                    line.line_style = LineStyle::from_index(style_index + 1);
                    line.colour = antenna_colour(ant);
                    line.label = format!("CA{:02}", ant);
                    lines.push(line);
                }
            }
        }
        lines.truncate(MAX_LINES);
    } else if panel.met_field().is_some() {
        let mut line = VisLine::new(Baseline::new(0, 0), 0, "", Pol::XX, 0.0);
        line.label = "site".to_string();
        lines.push(line);
    }
    lines
}

/// Value of one line in one cycle, if it has a usable one.
fn line_value(panel: VisPanel, line: &VisLine, cycle: &VisCycle) -> Option<f32> {
    let value = if panel.is_visibility() {
        let w = cycle.window_index(&line.window_label)?;
        let quantity = cycle.quantity(w, line.pol)?;
        let b = quantity.baseline_index(line.baseline())?;
        if quantity.flagged_bad.get(b).copied().unwrap_or(false) {
            return None;
        }
        let values = match panel {
            VisPanel::Amplitude => &quantity.amplitude,
            VisPanel::Phase => &quantity.phase,
            _ => &quantity.delay,
        };
        values.get(b)?.get(line.bin).copied()?
    } else if let Some(q) = panel.syscal_quantity() {
        let w = cycle.window_index(&line.window_label)?;
        cycle.syscal.value(q, line.ant1, w, line.pol)?
    } else if let Some(field) = panel.met_field() {
        if !cycle.met.valid {
            return None;
        }
        cycle.met.value(field)
    } else {
        return None;
    };
    value.is_finite().then_some(value)
}

/// The UT span shown, in seconds after midnight of the first cycle's day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub day0: f64,
    pub min_x: f64,
    pub max_x: f64,
}

impl TimeWindow {
    pub fn x_of(&self, mjd: f64) -> f64 {
        (mjd - self.day0) * SECONDS_PER_DAY
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.min_x && x <= self.max_x
    }
}

pub fn time_window(history: &[VisCycle], controls: &VisControls) -> Option<TimeWindow> {
    let first = history.first()?;
    let day0 = first.mjd.floor();
    let xs = history.iter().map(|c| (c.mjd - day0) * SECONDS_PER_DAY);
    let observed_min = xs.clone().fold(f64::INFINITY, f64::min);
    let observed_max = xs.fold(f64::NEG_INFINITY, f64::max);
    let min_x = observed_min.max(observed_max - controls.history_start as f64 * 60.0);
    let mut max_x = observed_max.min(min_x + controls.history_length as f64 * 60.0);
    if max_x <= min_x {
        max_x = min_x + controls.cycletime.max(1.0) as f64;
    }
    max_x += 0.05 * (max_x - min_x);
    Some(TimeWindow { day0, min_x, max_x })
}

/// Points of one line, split wherever consecutive cycles are further apart
/// than one and a half cycle times.
fn line_segments(
    panel: VisPanel,
    line: &VisLine,
    history: &[VisCycle],
    span: &TimeWindow,
    default_cycletime: f32,
) -> Vec<(Vec<f32>, Vec<f32>)> {
    let mut segments = Vec::new();
    let mut xs: Vec<f32> = Vec::new();
    let mut ys: Vec<f32> = Vec::new();
    let mut last_x: Option<f64> = None;
    for cycle in history {
        let x = span.x_of(cycle.mjd);
        if !span.contains(x) {
            continue;
        }
        let Some(y) = line_value(panel, line, cycle) else {
            continue;
        };
        let cycletime = if cycle.header.cycle_time > 0.0 {
            cycle.header.cycle_time
        } else {
            default_cycletime
        } as f64;
        if let Some(prev) = last_x {
            if x - prev > 1.5 * cycletime {
                segments.push((std::mem::take(&mut xs), std::mem::take(&mut ys)));
            }
        }
        xs.push(x as f32);
        ys.push(y);
        last_x = Some(x);
    }
    if !xs.is_empty() {
        segments.push((xs, ys));
    }
    segments
}

pub struct VisPage<'a> {
    /// Time ordered.
    pub history: &'a [VisCycle],
    /// Already reconciled against the latest cycle.
    pub controls: &'a VisControls,
    /// MJDs marked with a dashed guide.
    pub times: &'a [f64],
}

pub fn render_vis(device: &mut dyn PlotDevice, geometry: &PanelGeometry, page: &VisPage) -> Result<usize> {
    let (Some(reference), Some(span)) = (page.history.last(), time_window(page.history, page.controls)) else {
        debug!("no cycles in the history, nothing to draw");
        return Ok(0);
    };
    device.buffer_begin();
    device.page();
    let result = draw_panels(device, geometry, page, reference, &span);
    device.buffer_end();
    let drawn = result?;
    trace!("time-series page drew {} panels", drawn);
    Ok(drawn)
}

fn draw_panels(
    device: &mut dyn PlotDevice,
    geometry: &PanelGeometry,
    page: &VisPage,
    reference: &VisCycle,
    span: &TimeWindow,
) -> Result<usize> {
    let controls = page.controls;
    let npanels = controls.num_panels().min(geometry.ny);
    let mut all_lines: Vec<(VisPanel, Vec<VisLine>)> = Vec::with_capacity(npanels);
    for (py, &panel) in controls.panels.iter().take(npanels).enumerate() {
        let lines = build_lines(panel, reference, controls);
        geometry.select(device, PanelSelect::Panel(0, py))?;

        let segments: Vec<Vec<(Vec<f32>, Vec<f32>)>> = lines
            .iter()
            .map(|line| line_segments(panel, line, page.history, span, controls.cycletime))
            .collect();
        let (ymin, ymax) = panel_yrange(panel, controls, &segments);
        let (xmin, xmax) = (span.min_x as f32, span.max_x as f32);
        device.window(xmin, xmax, ymin, ymax);
        device.set_colour(FOREGROUND);
        device.set_line_style(LineStyle::Full);
        let bottom = py + 1 == npanels;
        let x_opts = if bottom {
            Axis::LABELLED | Axis::TIME
        } else {
            Axis::TICKED | Axis::TIME
        };
        device.draw_box(x_opts, Axis::LABELLED);
        device.mtext(Side::Left, 3.0, 0.5, 0.5, panel.axis_label());
        if bottom {
            device.mtext(Side::Bottom, 2.4, 0.5, 0.5, VisPanel::Time.axis_label());
        }

        for (line, parts) in lines.iter().zip(&segments) {
            device.set_colour(line.colour);
            device.set_line_style(line.line_style);
            for (xs, ys) in parts {
                if xs.len() > 1 {
                    device.line(xs, ys);
                }
            }
        }

        device.set_colour(LIGHT_GREY);
        device.set_line_style(LineStyle::Dashed);
        for &mjd in page.times {
            let x = span.x_of(mjd);
            if span.contains(x) {
                device.line(&[x as f32, x as f32], &[ymin, ymax]);
            }
        }
        device.set_line_style(LineStyle::Full);
        device.set_colour(FOREGROUND);

        if py == 0 {
            draw_legends(device, page, reference, &lines, panel, (xmin, xmax, ymin, ymax));
        }
        all_lines.push((panel, lines));
    }

    let labelled = all_lines
        .iter()
        .rev()
        .find(|(panel, _)| panel.is_visibility())
        .or(all_lines.last());
    if let Some((_, last)) = labelled {
        if !last.is_empty() {
            let n = last.len() as f32;
            for (i, line) in last.iter().enumerate() {
                device.set_colour(line.colour);
                device.mtext(Side::Bottom, 3.6, (i as f32 + 0.5) / n, 0.5, &line.label);
            }
            device.set_colour(FOREGROUND);
        }
    }
    Ok(all_lines.len())
}

fn panel_yrange(
    panel: VisPanel,
    controls: &VisControls,
    segments: &[Vec<(Vec<f32>, Vec<f32>)>],
) -> (f32, f32) {
    if let Some(&limits) = controls.panel_limits.get(&panel) {
        return limits;
    }
    let values = segments
        .iter()
        .flatten()
        .flat_map(|(_, ys)| ys.iter().copied());
    let (min, max) = finite_range(values).unwrap_or((0.0, 1.0));
    let span = max - min;
    let (mut lo, hi) = if span > 0.0 {
        (min - 0.05 * span, max + 0.05 * span)
    } else {
        (min - 1.0, max + 1.0)
    };
    if panel == VisPanel::Amplitude {
        lo = lo.max(0.0);
    }
    (lo, hi)
}

fn draw_legends(
    device: &mut dyn PlotDevice,
    page: &VisPage,
    reference: &VisCycle,
    lines: &[VisLine],
    panel: VisPanel,
    world: (f32, f32, f32, f32),
) {
    let controls = page.controls;
    let spec = controls.array_spec;
    let max_ant = (reference.header.num_ants() as u32).max(LEGEND_ANTENNAS);
    for ant in 1..=max_ant {
        let text = if spec.contains(ant) {
            ant.to_string()
        } else {
            "-".to_string()
        };
        device.set_colour(antenna_colour(ant));
        device.mtext(Side::Top, 0.5, 0.02 * ant as f32, 0.0, &text);
    }

    if panel.syscal_quantity().is_some() {
        let (xmin, xmax, ymin, ymax) = world;
        let mut seen: Vec<(usize, Pol)> = Vec::new();
        for line in lines {
            if seen.contains(&(line.window, line.pol)) {
                continue;
            }
            let k = seen.len() as f32;
            seen.push((line.window, line.pol));
            let y = ymax - (0.08 + 0.07 * k) * (ymax - ymin);
            let x0 = xmin + 0.75 * (xmax - xmin);
            let x1 = xmin + 0.82 * (xmax - xmin);
            device.set_colour(FOREGROUND);
            device.set_line_style(line.line_style);
            device.line(&[x0, x1], &[y, y]);
            device.set_line_style(LineStyle::Full);
            device.text_at(x1, y, 0.0, 0.0, &format!(" {} {}", line.window_label, line.pol.label()));
        }
    }

    device.set_colour(FOREGROUND);
    let nbands = controls.visbands.len();
    for (k, band) in controls.visbands.iter().enumerate() {
        let coord = 1.0 - 0.2 * (nbands - k) as f32;
        device.mtext(Side::Top, 1.7, coord, 0.0, &format!("AA,BB = {}", band));
        if let Some(freq) = reference.header.centre_frequency_of(band) {
            device.mtext(Side::Top, 0.5, coord, 0.0, &format!("{:.0} MHz", freq));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::averaging::VisQuantity;
    use crate::canvas::Canvas;
    use crate::controls::{ArraySpec, PolSet};
    use crate::header::{MetInfo, ScanHeader};
    use crate::syscal::SyscalData;

    fn baselines(nants: u32) -> Vec<Baseline> {
        let mut out = Vec::new();
        for a in 1..=nants {
            for b in a..=nants {
                out.push(Baseline::new(a, b));
            }
        }
        out
    }

    fn quantity(pol: Pol, baselines: &[Baseline], amp: f32) -> VisQuantity {
        let n = baselines.len();
        VisQuantity {
            window: 0,
            window_name: "f1".into(),
            pol,
            options: 0,
            baselines: baselines.to_vec(),
            amplitude: (0..n).map(|b| vec![amp + b as f32]).collect(),
            phase: vec![vec![10.0]; n],
            delay: vec![vec![0.5]; n],
            flagged_bad: vec![false; n],
        }
    }

    fn header(nants: u32) -> ScanHeader {
        ScanHeader {
            obs_date: "2017-09-04".into(),
            cycle_time: 10.0,
            // antenna n sits n^2 * 100 m east, so longer pairs have higher numbers
            ant_cartesian: (1..=nants)
                .map(|a| [(a * a) as f64 * 100.0, 0.0, 0.0])
                .collect(),
            if_name: vec!["f1".into()],
            if_centre_freq: vec![2100.0],
            ..ScanHeader::default()
        }
    }

    fn cycle_at(seconds: f64, nants: u32) -> VisCycle {
        let bl = baselines(nants);
        VisCycle {
            mjd: 58000.0 + seconds / SECONDS_PER_DAY,
            header: header(nants),
            met: MetInfo {
                temperature: 20.0,
                valid: true,
                ..MetInfo::default()
            },
            syscal: SyscalData::default(),
            quantities: vec![vec![
                quantity(Pol::XX, &bl, 1.0),
                quantity(Pol::YY, &bl, 2.0),
                quantity(Pol::XY, &bl, 0.1),
            ]],
        }
    }

    fn controls(nants: u32) -> VisControls {
        VisControls {
            visbands: vec!["f1".into()],
            array_spec: ArraySpec::from_antennas(1..=nants),
            ..VisControls::default()
        }
    }

    #[test]
    fn crosses_give_parallel_lines_and_autos_give_xy() {
        let reference = cycle_at(0.0, 3);
        let lines = build_lines(VisPanel::Amplitude, &reference, &controls(3));
        let crosses = lines.iter().filter(|l| l.ant1 != l.ant2).count();
        let autos: Vec<_> = lines.iter().filter(|l| l.ant1 == l.ant2).collect();
        assert_eq!(crosses, 6);
        assert_eq!(autos.len(), 3);
        assert!(autos.iter().all(|l| l.pol == Pol::XY));
        let colours: Vec<Colour> = lines.iter().map(|l| l.colour).collect();
        assert_eq!(colours, (1..=9).collect::<Vec<Colour>>());
    }

    #[test]
    fn lines_sorted_by_length_and_capped() {
        let reference = cycle_at(0.0, 7);
        let lines = build_lines(VisPanel::Phase, &reference, &controls(7));
        assert_eq!(lines.len(), MAX_LINES);
        assert!(lines
            .windows(2)
            .all(|w| w[0].baseline_length <= w[1].baseline_length));
        assert_eq!(lines.last().map(|l| l.colour), Some(16));

        let mut unsorted = controls(3);
        unsorted.sort_baselines = false;
        let lines = build_lines(VisPanel::Phase, &cycle_at(0.0, 3), &unsorted);
        assert_eq!(lines[0].baseline(), Baseline::new(1, 2));
        let sorted = build_lines(VisPanel::Phase, &cycle_at(0.0, 3), &controls(3));
        assert_eq!(sorted[0].baseline(), Baseline::new(1, 1));
    }

    #[test]
    fn tsys_lines_follow_the_threshold_antenna() {
        let reference = cycle_at(0.0, 3);
        let mut c = controls(3);
        c.plot_flags.remove(PlotFlags::AUTOS);
        c.pols = PolSet::XX;
        let lines = build_lines(VisPanel::Tsys, &reference, &c);
        // 12 and 13 give antenna 1 and 3; 23 gives antenna 3 again
        let ants: Vec<u32> = lines.iter().map(|l| l.ant1).collect();
        assert_eq!(ants, vec![1, 3]);

        c.reference_antenna = Some(2);
        let lines = build_lines(VisPanel::Tsys, &reference, &c);
        let ants: Vec<u32> = lines.iter().map(|l| l.ant1).collect();
        assert_eq!(ants, vec![2, 1]);
    }

    #[test]
    fn tsys_pairs_get_their_own_line_style() {
        let reference = cycle_at(0.0, 2);
        let lines = build_lines(VisPanel::Tsys, &reference, &controls(2));
        let xx: Vec<_> = lines.iter().filter(|l| l.pol == Pol::XX).collect();
        let yy: Vec<_> = lines.iter().filter(|l| l.pol == Pol::YY).collect();
        assert!(xx.iter().all(|l| l.line_style == LineStyle::Full));
        assert!(yy.iter().all(|l| l.line_style == LineStyle::Dashed));
    }

    #[test]
    fn time_window_follows_history_settings() {
        let history: Vec<VisCycle> = (0..=360).map(|i| cycle_at(i as f64 * 10.0, 2)).collect();
        let mut c = controls(2);
        c.set_history(20.0, None).unwrap();
        let span = time_window(&history, &c).unwrap();
        assert!((span.min_x - 2400.0).abs() < 1e-3);
        assert!((span.max_x - (3600.0 + 60.0)).abs() < 1e-3);

        c.set_history(10.0, Some(30.0)).unwrap();
        let span = time_window(&history, &c).unwrap();
        assert!((span.min_x - 1800.0).abs() < 1e-3);
        assert!((span.max_x - (2400.0 + 30.0)).abs() < 1e-3);
    }

    #[test]
    fn gaps_split_the_polyline() {
        let history: Vec<VisCycle> = [0.0, 10.0, 20.0, 60.0, 70.0]
            .iter()
            .map(|&t| cycle_at(t, 2))
            .collect();
        let c = controls(2);
        let span = time_window(&history, &c).unwrap();
        let line = &build_lines(VisPanel::Amplitude, history.last().unwrap(), &c)[0];
        let segments = line_segments(VisPanel::Amplitude, line, &history, &span, 10.0);
        assert_eq!(segments.len(), 2);
        let starts: Vec<f32> = segments.iter().map(|s| s.0[0]).collect();
        assert_eq!(segments[0].0.len(), 3);
        assert_eq!(segments[1].0.len(), 2);
        assert!(starts[0].abs() < 1e-3 && (starts[1] - 60.0).abs() < 1e-3);
    }

    #[test]
    fn flagged_cycles_are_skipped() {
        let mut history: Vec<VisCycle> = [0.0, 10.0, 20.0].iter().map(|&t| cycle_at(t, 2)).collect();
        let c = controls(2);
        let line = build_lines(VisPanel::Amplitude, &history[0], &c)
            .into_iter()
            .find(|l| l.baseline() == Baseline::new(1, 2) && l.pol == Pol::XX)
            .unwrap();
        let b = history[1].quantities[0][0].baseline_index(line.baseline()).unwrap();
        history[1].quantities[0][0].flagged_bad[b] = true;
        let span = time_window(&history, &c).unwrap();
        let segments = line_segments(VisPanel::Amplitude, &line, &history, &span, 10.0);
        // 0 and 20 are two cycle times apart, so they are not joined either
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn render_draws_one_panel_per_quantity() {
        let history: Vec<VisCycle> = (0..30).map(|i| cycle_at(i as f64 * 10.0, 3)).collect();
        let mut c = controls(3);
        c.set_panels(vec![VisPanel::Amplitude, VisPanel::Phase, VisPanel::Temperature])
            .unwrap();
        c.set_panel_limits(VisPanel::Phase, Some((180.0, -180.0)));
        let mut canvas = Canvas::new(1024, 768);
        let mut geometry = PanelGeometry::new();
        geometry.split(1, 3, &canvas, true, 1.0, 0).unwrap();
        let times = [history[5].mjd];
        let page = VisPage {
            history: &history,
            controls: &c,
            times: &times,
        };
        assert_eq!(render_vis(&mut canvas, &geometry, &page).unwrap(), 3);

        let phase_panel = geometry.panel(0, 1).unwrap();
        let phase_lines: Vec<_> = canvas
            .polylines()
            .filter(|p| p.viewport == phase_panel)
            .collect();
        assert!(phase_lines
            .iter()
            .all(|p| p.window.ymin == -180.0 && p.window.ymax == 180.0));
        let amp_panel = geometry.panel(0, 0).unwrap();
        assert!(canvas
            .polylines()
            .filter(|p| p.viewport == amp_panel)
            .all(|p| p.window.ymin >= 0.0));
        // one guide per panel
        assert_eq!(
            canvas
                .polylines()
                .filter(|p| p.style == LineStyle::Dashed)
                .count(),
            3
        );
        assert!(canvas.has_text("AA,BB = f1"));
        assert!(canvas.has_text("2100 MHz"));
        assert!(canvas.has_text("12AA"));
    }

    #[test]
    fn empty_history_draws_nothing() {
        let mut canvas = Canvas::new(640, 480);
        let mut geometry = PanelGeometry::new();
        geometry.split(1, 2, &canvas, true, 1.0, 0).unwrap();
        let c = controls(2);
        let page = VisPage {
            history: &[],
            controls: &c,
            times: &[],
        };
        assert_eq!(render_vis(&mut canvas, &geometry, &page).unwrap(), 0);
        assert_eq!(canvas.polylines().count(), 0);
    }
}
