//! Spectrum pages: one panel per window and baseline, quantity against
//! channel or frequency, under an information strip.

use tracing::{debug, trace};

use crate::averaging::average_channels;
use crate::controls::{AmpScale, Decorations, PlotFlags, SpdControls, XAxis};
use crate::device::{Axis, Colour, LineStyle, PlotDevice, Side, Units, FOREGROUND, LIGHT_GREY};
use crate::error::Result;
use crate::geometry::{PanelGeometry, PanelSelect};
use crate::spectrum::{AmpPhaseBlock, AmpPhaseOptions, Baseline, CycleData, Pol, Quantity, ValueRange};
use crate::syscal::TsysTable;
use crate::utils::{format_ut, parse_obs_date};

/// Floor of the log amplitude scale, relative to the panel maximum.
const LOG_FLOOR_DB: f32 = -60.0;

/// Colour of each pol for bins 0 and 1.
const POL_COLOURS: [[Colour; 2]; 4] = [[7, 2], [5, 4], [3, 6], [9, 10]];

fn trace_colour(pol: Pol, bin: usize) -> Colour {
    let row = match pol {
        Pol::XX => 0,
        Pol::YY => 1,
        Pol::XY => 2,
        Pol::YX => 3,
    };
    POL_COLOURS[row][bin.min(1)]
}

/// Colour of the averaged overlay drawn over a trace of colour `colour`.
pub fn averaged_colour(colour: Colour) -> Colour {
    match (colour + 5) % 16 {
        0 => 1,
        c => c,
    }
}

/// Bins worth drawing for a pol. Autos show up to two bins of the parallel
/// pols; XY autos show the noise-diode-on bin when there is one; the other
/// cross-pol products need their plot flag and only show bin 0.
pub fn bins_to_plot(pol: Pol, auto: bool, nbins: usize, flags: PlotFlags) -> Vec<usize> {
    if nbins == 0 {
        return Vec::new();
    }
    match (pol, auto) {
        (Pol::XX | Pol::YY, _) => {
            if flags.allows(pol) {
                (0..nbins.min(2)).collect()
            } else {
                Vec::new()
            }
        }
        (Pol::XY, true) => vec![if nbins > 1 { 1 } else { 0 }],
        (Pol::YX, true) | (Pol::XY | Pol::YX, false) => {
            if flags.allows(pol) {
                vec![0]
            } else {
                Vec::new()
            }
        }
    }
}

/// Lines the info strip needs for a cycle with `num_ifs` windows.
pub fn info_lines(num_ifs: usize, max_tsys_ifs: usize) -> usize {
    // header, Tsys table heading plus rows, weather
    1 + 1 + num_ifs.min(max_tsys_ifs) + 1
}

pub struct SpdPage<'a> {
    pub cycle: &'a CycleData,
    pub options: &'a [AmpPhaseOptions],
    /// Already reconciled against `cycle`.
    pub controls: &'a SpdControls,
    pub tsys: &'a TsysTable,
    pub max_tsys_ifs: usize,
}

struct Trace {
    colour: Colour,
    label: String,
    xs: Vec<f32>,
    ys: Vec<f32>,
}

impl<'a> SpdPage<'a> {
    fn pols_in(&self, window: usize) -> Vec<Pol> {
        let present = self.cycle.pols_in_window(window);
        self.controls
            .pols
            .pols()
            .into_iter()
            .filter(|p| present.contains(p))
            .collect()
    }

    fn baseline_shown(&self, baseline: Baseline) -> bool {
        let spec = self.controls.array_spec;
        if !spec.contains(baseline.ant1) || !spec.contains(baseline.ant2) {
            return false;
        }
        let flags = self.controls.plot_flags;
        if baseline.is_auto() {
            flags.contains(PlotFlags::AUTOS)
        } else {
            flags.contains(PlotFlags::CROSSES)
        }
    }

    fn panels_per_window(&self) -> usize {
        let n = self.controls.array_spec.count();
        let flags = self.controls.plot_flags;
        let autos = if flags.contains(PlotFlags::AUTOS) { n } else { 0 };
        let crosses = if flags.contains(PlotFlags::CROSSES) {
            n * n.saturating_sub(1) / 2
        } else {
            0
        };
        autos + crosses
    }

    /// Y range of one baseline over the selected pols, from the limits the
    /// blocks carry.
    fn baseline_range(&self, window: usize, baseline: Baseline, quantity: Quantity) -> Option<ValueRange> {
        self.pols_in(window)
            .into_iter()
            .filter_map(|pol| {
                let block = self.cycle.block(window, pol)?;
                let b = block.baseline_index(baseline)?;
                block.limits.get(b).map(|l| l.range(quantity))
            })
            .reduce(ValueRange::union)
    }

    /// Union over every shown baseline of the same auto/cross class.
    fn class_range(&self, auto: bool, quantity: Quantity) -> Option<ValueRange> {
        self.controls
            .shown_windows()
            .into_iter()
            .flat_map(|w| {
                self.cycle
                    .windows
                    .get(w)
                    .and_then(|blocks| blocks.first())
                    .map(|b| b.baselines.clone())
                    .unwrap_or_default()
                    .into_iter()
                    .filter(move |bl| bl.is_auto() == auto)
                    .map(move |bl| (w, bl))
            })
            .filter(|(_, bl)| self.baseline_shown(*bl))
            .filter_map(|(w, bl)| self.baseline_range(w, bl, quantity))
            .reduce(ValueRange::union)
    }
}

pub fn render_spd(
    device: &mut dyn PlotDevice,
    geometry: &PanelGeometry,
    page: &SpdPage,
) -> Result<usize> {
    let per_window = page.panels_per_window();
    if per_window == 0 {
        debug!("no antennas or baseline types selected, nothing to draw");
        return Ok(0);
    }
    let windows = page.controls.shown_windows();
    let total = (windows.len() * per_window).min(geometry.num_panels());

    device.buffer_begin();
    device.page();
    let result = draw_page(device, geometry, page, &windows, per_window, total);
    device.buffer_end();
    let drawn = result?;
    trace!("spectrum page drew {} panels", drawn);
    Ok(drawn)
}

fn draw_page(
    device: &mut dyn PlotDevice,
    geometry: &PanelGeometry,
    page: &SpdPage,
    windows: &[usize],
    per_window: usize,
    total: usize,
) -> Result<usize> {
    draw_info_strip(device, geometry, page)?;
    let mut drawn = 0;
    for (ordinal, &w) in windows.iter().enumerate() {
        let pols = page.pols_in(w);
        let Some(reference) = pols.first().and_then(|p| page.cycle.block(w, *p)) else {
            continue;
        };
        let mut slot = 0;
        for &baseline in &reference.baselines {
            if !page.baseline_shown(baseline) {
                continue;
            }
            let i = ordinal * per_window + slot;
            slot += 1;
            let (px, py) = (i % geometry.nx, i / geometry.nx);
            if py >= geometry.ny {
                continue;
            }
            geometry.select(device, PanelSelect::Panel(px, py))?;
            let outer_x = py + 1 == geometry.ny || i + geometry.nx >= total;
            draw_panel(device, page, w, baseline, &pols, px == 0, outer_x);
            drawn += 1;
        }
    }
    Ok(drawn)
}

fn draw_info_strip(device: &mut dyn PlotDevice, geometry: &PanelGeometry, page: &SpdPage) -> Result<()> {
    geometry.select(device, PanelSelect::InfoStrip)?;
    device.set_colour(FOREGROUND);
    let header = &page.cycle.header;
    let date = parse_obs_date(&header.obs_date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| header.obs_date.clone());
    let num_ants = header.num_ants().max(page.cycle.syscal.num_ants()) as u32;
    let first = format!(
        "{}  {}  {}  On source: {}",
        date,
        format_ut(header.ut_seconds),
        header.source_name,
        page.cycle.syscal.on_source_string(num_ants)
    );
    device.mtext(Side::Top, -1.2, 0.0, 0.0, &first);

    let tsys = page.tsys;
    let nifs = tsys.num_windows().min(page.max_tsys_ifs);
    let ncols = tsys.ant_num.len() + 1;
    let column = |c: usize| c as f32 / ncols as f32;
    let mut line = 2.0;
    for (a, ant) in tsys.ant_num.iter().enumerate() {
        device.mtext(Side::Top, -1.3 * line, column(a + 1), 0.0, &format!("CA{:02}", ant));
    }
    for w in 0..nifs {
        line += 1.0;
        device.mtext(Side::Top, -1.3 * line, 0.0, 0.0, &format!("IF{}", w + 1));
        for a in 0..tsys.ant_num.len() {
            device.mtext(Side::Top, -1.3 * line, column(a + 1), 0.0, &tsys.format_cell(w, a));
        }
    }
    line += 1.0;
    let met = &page.cycle.met;
    let weather = if met.valid {
        format!(
            "T={:.1} C  P={:.1} hPa  H={:.1}%",
            met.temperature, met.air_pressure, met.humidity
        )
    } else {
        "T=-  P=-  H=-".to_string()
    };
    device.mtext(Side::Top, -1.3 * line, 0.0, 0.0, &weather);
    Ok(())
}

fn window_title(block: &AmpPhaseBlock, quantity: Quantity, baseline: Baseline) -> String {
    let kind = if block.is_zoom() { "ZM" } else { "FQ" };
    let label = block.window_name.get(1..).unwrap_or("");
    format!(
        "{} {}:{} BSL{}{}",
        quantity.short_name(),
        kind,
        label,
        baseline.ant1,
        baseline.ant2
    )
}

fn to_log(values: &mut [f32], ymax: f32) {
    for v in values.iter_mut() {
        *v = if *v > 0.0 && ymax > 0.0 {
            (10.0 * (*v / ymax).log10()).max(LOG_FLOOR_DB)
        } else if v.is_finite() {
            LOG_FLOOR_DB
        } else {
            *v
        };
    }
}

/// Channel indices to sample, in the order that makes x increase.
fn sample_order(block: &AmpPhaseBlock, lo: usize, hi: usize, x_axis: XAxis) -> Vec<usize> {
    let mut order: Vec<usize> = (lo..=hi).collect();
    if x_axis == XAxis::Frequency && block.is_inverted() {
        order.reverse();
    }
    order
}

fn axis_values(block: &AmpPhaseBlock, x_axis: XAxis) -> &[f32] {
    match x_axis {
        XAxis::Channel => &block.channel,
        XAxis::Frequency => &block.frequency,
    }
}

/// Draws a polyline, breaking it wherever a value is not finite.
fn draw_segments(device: &mut dyn PlotDevice, xs: &[f32], ys: &[f32]) {
    let mut start = 0;
    for i in 0..=xs.len().min(ys.len()) {
        let bad = i == xs.len().min(ys.len()) || !xs[i].is_finite() || !ys[i].is_finite();
        if bad {
            if i > start + 1 {
                device.line(&xs[start..i], &ys[start..i]);
            }
            start = i + 1;
        }
    }
}

fn draw_panel(
    device: &mut dyn PlotDevice,
    page: &SpdPage,
    window: usize,
    baseline: Baseline,
    pols: &[Pol],
    outer_y: bool,
    outer_x: bool,
) {
    let controls = page.controls;
    let quantity = controls.y_kind;
    let Some(reference) = page.cycle.block(window, pols[0]) else {
        return;
    };
    let nchan = reference.nchannels();
    if nchan == 0 {
        return;
    }
    let (lo, hi) = controls
        .channel_range
        .get(window)
        .copied()
        .flatten()
        .map(|r| (r.min.min(nchan - 1), r.max.min(nchan - 1)))
        .unwrap_or((0, nchan - 1));

    let axis = axis_values(reference, controls.x_axis);
    let (mut xmin, mut xmax) = match (axis.get(lo), axis.get(hi)) {
        (Some(a), Some(b)) => (*a, *b),
        _ => return,
    };
    if xmin > xmax {
        std::mem::swap(&mut xmin, &mut xmax);
    }
    if xmin == xmax {
        xmin -= 0.5;
        xmax += 0.5;
    }

    let auto = baseline.is_auto();
    let log = quantity == Quantity::Amplitude && controls.amp_scale == AmpScale::Log;
    let mut range = page
        .baseline_range(window, baseline, quantity)
        .unwrap_or_default();
    if controls.consistent_yrange {
        if let Some(class) = page.class_range(auto, quantity) {
            range = range.union(class);
        }
    }
    let ymax_linear = range.max;

    let (ymin, ymax) = match controls.yaxis_range {
        Some(r) => r,
        None if log => {
            let low = if range.min > 0.0 && range.max > 0.0 {
                (10.0 * (range.min / range.max).log10()).max(LOG_FLOOR_DB)
            } else {
                LOG_FLOOR_DB
            };
            (low, 0.0)
        }
        None => {
            let span = range.max - range.min;
            if span > 0.0 {
                (range.min - 0.05 * span, range.max + 0.05 * span)
            } else {
                let pad = if range.max != 0.0 { 0.1 * range.max.abs() } else { 1.0 };
                (range.min - pad, range.max + pad)
            }
        }
    };
    device.window(xmin, xmax, ymin, ymax);
    device.set_colour(FOREGROUND);
    device.set_line_style(LineStyle::Full);
    let x_opts = if outer_x { Axis::LABELLED } else { Axis::TICKED };
    let y_opts = if outer_y { Axis::LABELLED } else { Axis::TICKED };
    device.draw_box(x_opts, y_opts);
    device.mtext(Side::Top, 0.4, 0.5, 0.5, &window_title(reference, quantity, baseline));
    if outer_x {
        device.mtext(Side::Bottom, 2.4, 0.5, 0.5, controls.x_axis.label());
    }
    if outer_y {
        let label = if log {
            "Amplitude (dB)"
        } else {
            quantity.axis_label()
        };
        device.mtext(Side::Left, 3.0, 0.5, 0.5, label);
    }

    let window_options = |block: &AmpPhaseBlock| {
        page.options
            .get(block.options)
            .and_then(|o| o.window(window))
            .cloned()
    };

    let mut traces: Vec<Trace> = Vec::new();
    for &pol in pols {
        let Some(block) = page.cycle.block(window, pol) else {
            continue;
        };
        let Some(b) = block.baseline_index(baseline) else {
            continue;
        };
        let bins = bins_to_plot(pol, auto, block.nbins(b), controls.plot_flags);
        let order = sample_order(block, lo, hi.min(block.nchannels().saturating_sub(1)), controls.x_axis);
        let xs_all = axis_values(block, controls.x_axis);
        for &bin in &bins {
            let values = block.values(quantity, b, bin);
            let xs: Vec<f32> = order.iter().filter_map(|&c| xs_all.get(c).copied()).collect();
            let mut ys: Vec<f32> = order.iter().filter_map(|&c| values.get(c).copied()).collect();
            if log {
                to_log(&mut ys, ymax_linear);
            }
            let label = if bin == 0 {
                pol.label().to_string()
            } else {
                format!("{}{}", pol.label(), bin + 1)
            };
            traces.push(Trace {
                colour: trace_colour(pol, bin),
                label,
                xs,
                ys,
            });
        }

        if controls.decorations.contains(Decorations::AVERAGED) && !bins.is_empty() {
            if let Some(opts) = window_options(block) {
                let averaged = average_channels(block, &opts);
                let channels = axis_values(block, XAxis::Channel);
                let (x_lo, x_hi) = match (channels.get(lo), channels.get(hi)) {
                    (Some(a), Some(b)) => (a.min(*b), a.max(*b)),
                    _ => continue,
                };
                let mut keep: Vec<usize> = (0..averaged.nchannels())
                    .filter(|&c| averaged.channel[c] >= x_lo && averaged.channel[c] <= x_hi)
                    .collect();
                if controls.x_axis == XAxis::Frequency && averaged.is_inverted() {
                    keep.reverse();
                }
                let avg_xs_all = axis_values(&averaged, controls.x_axis);
                for &bin in &bins {
                    let values = averaged.values(quantity, b, bin);
                    let xs: Vec<f32> = keep.iter().filter_map(|&c| avg_xs_all.get(c).copied()).collect();
                    let mut ys: Vec<f32> = keep.iter().filter_map(|&c| values.get(c).copied()).collect();
                    if log {
                        to_log(&mut ys, ymax_linear);
                    }
                    let base = trace_colour(pol, bin);
                    let label = if bin == 0 {
                        format!("{}v", pol.label())
                    } else {
                        format!("{}{}v", pol.label(), bin + 1)
                    };
                    traces.push(Trace {
                        colour: averaged_colour(base),
                        label,
                        xs,
                        ys,
                    });
                }
            }
        }
    }

    for t in &traces {
        device.set_colour(t.colour);
        draw_segments(device, &t.xs, &t.ys);
    }

    if controls.decorations.contains(Decorations::TVCHANNELS) {
        if let Some(opts) = window_options(reference) {
            if let Some((tv_lo, tv_hi)) = opts.tvchannel_range(nchan) {
                device.set_colour(LIGHT_GREY);
                device.set_line_style(LineStyle::Dashed);
                for x in [tv_lo, tv_hi].iter().filter_map(|&ch| axis.get(ch).copied()) {
                    device.line(&[x, x], &[ymin, ymax]);
                }
                device.set_line_style(LineStyle::Full);
            }
        }
    }

    // pol legend along the bottom edge
    let vp_width = device.query_viewport(Units::Ndc).width();
    let mut coord = 0.02;
    for t in &traces {
        device.set_colour(t.colour);
        device.mtext(Side::Bottom, -0.8, coord, 0.0, &t.label);
        let (w, _) = device.query_text_bounds(&t.label);
        if vp_width > 0.0 {
            coord += 1.2 * w / vp_width;
        }
    }
    device.set_colour(FOREGROUND);
}
