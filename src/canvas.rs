//! Display-list implementation of [`PlotDevice`].
//!
//! Everything drawn on the current page is kept as a list of polylines and
//! text items. File devices replay the list through `plotters` on flush;
//! the null device and the tests just keep it.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::device::{
    Axis, Colour, DeviceType, LineStyle, PlotDevice, Rect, Side, Units, Window, FOREGROUND,
};
use crate::error::{NspdError, Result};
use crate::utils::format_ut;

/// Character height at size 1.0, as a fraction of the surface height.
const BASE_CHAR_FRACTION: f32 = 1.0 / 40.0;
/// Mean glyph advance relative to the character height.
const GLYPH_ASPECT: f32 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub path: PathBuf,
    pub kind: DeviceType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    /// Points in the world coordinates of `window`.
    pub world: Vec<(f32, f32)>,
    pub viewport: Rect,
    pub window: Window,
    pub colour: Colour,
    pub style: LineStyle,
    /// Frame, tick or other axis furniture rather than data.
    pub axis: bool,
}

impl Polyline {
    fn ndc(points: Vec<(f32, f32)>, colour: Colour) -> Self {
        Polyline {
            world: points,
            viewport: Rect::new(0.0, 1.0, 0.0, 1.0),
            window: Window::default(),
            colour,
            style: LineStyle::Full,
            axis: true,
        }
    }

    pub fn ndc_points(&self) -> Vec<(f32, f32)> {
        self.world
            .iter()
            .map(|&(x, y)| world_to_ndc(&self.viewport, &self.window, x, y))
            .collect()
    }

    pub fn xs(&self) -> Vec<f32> {
        self.world.iter().map(|p| p.0).collect()
    }

    pub fn ys(&self) -> Vec<f32> {
        self.world.iter().map(|p| p.1).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    /// Anchor in NDC, on the text baseline.
    pub x: f32,
    pub y: f32,
    /// Degrees anticlockwise.
    pub angle: f32,
    pub fjust: f32,
    /// Character height in NDC (vertical).
    pub height: f32,
    pub colour: Colour,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Polyline(Polyline),
    Text(TextItem),
}

fn world_to_ndc(vp: &Rect, win: &Window, x: f32, y: f32) -> (f32, f32) {
    let fx = if win.xmax != win.xmin {
        (x - win.xmin) / (win.xmax - win.xmin)
    } else {
        0.5
    };
    let fy = if win.ymax != win.ymin {
        (y - win.ymin) / (win.ymax - win.ymin)
    } else {
        0.5
    };
    (vp.x1 + fx * vp.width(), vp.y1 + fy * vp.height())
}

#[derive(Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    viewport: Rect,
    window: Window,
    colour: Colour,
    style: LineStyle,
    char_height: f32,
    items: Vec<Item>,
    pages: usize,
    buffer_depth: u32,
    output: Option<Output>,
    closed: bool,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut canvas = Canvas {
            width: width.max(1),
            height: height.max(1),
            viewport: Rect::default(),
            window: Window::default(),
            colour: FOREGROUND,
            style: LineStyle::Full,
            char_height: 1.0,
            items: Vec::new(),
            pages: 0,
            buffer_depth: 0,
            output: None,
            closed: false,
        };
        canvas.viewport = canvas.default_viewport();
        canvas
    }

    pub fn with_output(width: u32, height: u32, output: Output) -> Self {
        let mut canvas = Canvas::new(width, height);
        canvas.output = Some(output);
        canvas
    }

    /// Four character heights of margin on every side.
    fn default_viewport(&self) -> Rect {
        let (cx, cy) = self.char_size_at(1.0);
        Rect::new(4.0 * cx, 1.0 - 4.0 * cx, 4.0 * cy, 1.0 - 4.0 * cy)
    }

    fn char_size_at(&self, height: f32) -> (f32, f32) {
        let px = height * BASE_CHAR_FRACTION * self.height as f32;
        (px / self.width as f32, px / self.height as f32)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Data polylines on the current page, axis furniture excluded.
    pub fn polylines(&self) -> impl Iterator<Item = &Polyline> {
        self.items.iter().filter_map(|item| match item {
            Item::Polyline(p) if !p.axis => Some(p),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &TextItem> {
        self.items.iter().filter_map(|item| match item {
            Item::Text(t) => Some(t),
            _ => None,
        })
    }

    pub fn has_text(&self, text: &str) -> bool {
        self.texts().any(|t| t.text == text)
    }

    fn push_text(&mut self, x: f32, y: f32, angle: f32, fjust: f32, text: &str) {
        if text.is_empty() {
            return;
        }
        let (_, cy) = self.query_char_size();
        self.items.push(Item::Text(TextItem {
            x,
            y,
            angle,
            fjust,
            height: cy,
            colour: self.colour,
            text: text.to_string(),
        }));
    }

    fn axis_line(&mut self, points: Vec<(f32, f32)>) {
        self.items.push(Item::Polyline(Polyline::ndc(points, self.colour)));
    }

    fn draw_axis(&mut self, opts: Axis, horizontal: bool) {
        let vp = self.viewport;
        let win = self.window;
        let (lo, hi) = if horizontal {
            (win.xmin, win.xmax)
        } else {
            (win.ymin, win.ymax)
        };
        let (cx, cy) = self.query_char_size();
        let major_len = if horizontal { 0.5 * cy } else { 0.5 * cx };
        let minor_len = major_len * 0.5;

        if opts.contains(Axis::EDGE_LOW) {
            if horizontal {
                self.axis_line(vec![(vp.x1, vp.y1), (vp.x2, vp.y1)]);
            } else {
                self.axis_line(vec![(vp.x1, vp.y1), (vp.x1, vp.y2)]);
            }
        }
        if opts.contains(Axis::EDGE_HIGH) {
            if horizontal {
                self.axis_line(vec![(vp.x1, vp.y2), (vp.x2, vp.y2)]);
            } else {
                self.axis_line(vec![(vp.x2, vp.y1), (vp.x2, vp.y2)]);
            }
        }

        let time = opts.contains(Axis::TIME);
        let step = if time {
            time_step((hi - lo).abs())
        } else {
            nice_step((hi - lo).abs())
        };
        if step <= 0.0 || !step.is_finite() {
            return;
        }
        let majors = ticks(lo, hi, step);
        let minors = if opts.contains(Axis::MINOR_TICKS) {
            ticks(lo, hi, step / minor_divisions(step, time))
        } else {
            Vec::new()
        };

        let frac = |v: f32| if hi != lo { (v - lo) / (hi - lo) } else { 0.5 };
        let tick = |canvas: &mut Canvas, f: f32, len: f32| {
            if horizontal {
                let x = vp.x1 + f * vp.width();
                if opts.contains(Axis::EDGE_LOW) {
                    canvas.axis_line(vec![(x, vp.y1), (x, vp.y1 + len)]);
                }
                if opts.contains(Axis::EDGE_HIGH) {
                    canvas.axis_line(vec![(x, vp.y2), (x, vp.y2 - len)]);
                }
            } else {
                let y = vp.y1 + f * vp.height();
                if opts.contains(Axis::EDGE_LOW) {
                    canvas.axis_line(vec![(vp.x1, y), (vp.x1 + len, y)]);
                }
                if opts.contains(Axis::EDGE_HIGH) {
                    canvas.axis_line(vec![(vp.x2, y), (vp.x2 - len, y)]);
                }
            }
        };
        if opts.contains(Axis::MAJOR_TICKS) {
            for v in &majors {
                tick(self, frac(*v), major_len);
            }
            for v in &minors {
                tick(self, frac(*v), minor_len);
            }
        }

        if opts.intersects(Axis::LABELS | Axis::LABELS_HIGH) {
            for v in majors {
                let label = if time {
                    format_ut(v as f64)[..5].to_string()
                } else {
                    format_tick(v, step)
                };
                let f = frac(v);
                match (horizontal, opts.contains(Axis::LABELS_HIGH)) {
                    (true, false) => self.mtext(Side::Bottom, 1.2, f, 0.5, &label),
                    (true, true) => self.mtext(Side::Top, 0.5, f, 0.5, &label),
                    (false, false) => self.mtext(Side::LeftVertical, 0.7, f, 1.0, &label),
                    (false, true) => self.mtext(Side::RightVertical, 0.7, f, 0.0, &label),
                }
            }
        }
    }

    fn write_output(&mut self) -> Result<()> {
        let Some(output) = self.output.as_ref() else {
            return Ok(());
        };
        debug!(
            "rendering {} items to {}",
            self.items.len(),
            output.path.display()
        );
        crate::plot::render_page(&self.items, (self.width, self.height), output)
            .map_err(|e| NspdError::device(format!("{}: {}", output.path.display(), e)))
    }
}

/// Step of roughly five major intervals, from the 1-2-5 sequence.
fn nice_step(range: f32) -> f32 {
    if range <= 0.0 || !range.is_finite() {
        return 0.0;
    }
    let raw = range / 5.0;
    let magnitude = 10f32.powf(raw.log10().floor());
    let norm = raw / magnitude;
    let unit = if norm < 1.5 {
        1.0
    } else if norm < 3.5 {
        2.0
    } else if norm < 7.5 {
        5.0
    } else {
        10.0
    };
    unit * magnitude
}

/// Step in seconds that lands on whole minutes or hours.
fn time_step(range: f32) -> f32 {
    const STEPS: [f32; 16] = [
        1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0, 3600.0,
        7200.0, 10800.0, 21600.0,
    ];
    if range <= 0.0 || !range.is_finite() {
        return 0.0;
    }
    STEPS
        .iter()
        .copied()
        .find(|s| range / s <= 6.0)
        .unwrap_or(43200.0)
}

fn minor_divisions(step: f32, time: bool) -> f32 {
    if time {
        return if step >= 3600.0 { 4.0 } else { 5.0 };
    }
    let magnitude = 10f32.powf(step.log10().floor());
    if ((step / magnitude) - 2.0).abs() < 1e-3 {
        4.0
    } else {
        5.0
    }
}

fn ticks(a: f32, b: f32, step: f32) -> Vec<f32> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let eps = step * 1e-4;
    let mut v = (lo / step).ceil() * step;
    let mut out = Vec::new();
    while v <= hi + eps && out.len() < 1000 {
        out.push(if v.abs() < eps { 0.0 } else { v });
        v += step;
    }
    out
}

fn format_tick(value: f32, step: f32) -> String {
    let decimals = if step >= 1.0 {
        0
    } else {
        (-step.log10()).ceil() as usize
    };
    format!("{:.*}", decimals, value)
}

impl PlotDevice for Canvas {
    fn viewport(&mut self, rect: Rect) {
        self.viewport = rect;
    }

    fn window(&mut self, xmin: f32, xmax: f32, ymin: f32, ymax: f32) {
        self.window = Window {
            xmin,
            xmax,
            ymin,
            ymax,
        };
    }

    fn draw_box(&mut self, x: Axis, y: Axis) {
        self.draw_axis(x, true);
        self.draw_axis(y, false);
    }

    fn line(&mut self, xs: &[f32], ys: &[f32]) {
        let world: Vec<(f32, f32)> = xs.iter().copied().zip(ys.iter().copied()).collect();
        if world.len() < 2 {
            return;
        }
        self.items.push(Item::Polyline(Polyline {
            world,
            viewport: self.viewport,
            window: self.window,
            colour: self.colour,
            style: self.style,
            axis: false,
        }));
    }

    fn mtext(&mut self, side: Side, displacement: f32, coord: f32, fjust: f32, text: &str) {
        let vp = self.viewport;
        let (cx, cy) = self.query_char_size();
        let along_x = vp.x1 + coord * vp.width();
        let along_y = vp.y1 + coord * vp.height();
        let (x, y, angle) = match side {
            Side::Bottom => (along_x, vp.y1 - displacement * cy, 0.0),
            Side::Top => (along_x, vp.y2 + displacement * cy, 0.0),
            Side::Left => (vp.x1 - displacement * cx, along_y, 90.0),
            Side::Right => (vp.x2 + displacement * cx, along_y, 90.0),
            Side::LeftVertical => (vp.x1 - displacement * cx, along_y - 0.5 * cy, 0.0),
            Side::RightVertical => (vp.x2 + displacement * cx, along_y - 0.5 * cy, 0.0),
        };
        self.push_text(x, y, angle, fjust, text);
    }

    fn text_at(&mut self, x: f32, y: f32, angle: f32, fjust: f32, text: &str) {
        let (nx, ny) = world_to_ndc(&self.viewport, &self.window, x, y);
        self.push_text(nx, ny, angle, fjust, text);
    }

    fn set_colour(&mut self, colour: Colour) {
        self.colour = colour.min(crate::device::NUM_COLOURS - 1);
    }

    fn set_line_style(&mut self, style: LineStyle) {
        self.style = style;
    }

    fn set_char_height(&mut self, height: f32) {
        if height > 0.0 {
            self.char_height = height;
        }
    }

    fn char_height(&self) -> f32 {
        self.char_height
    }

    fn query_text_bounds(&self, text: &str) -> (f32, f32) {
        let (cx, cy) = self.query_char_size();
        (text.chars().count() as f32 * GLYPH_ASPECT * cx, cy)
    }

    fn query_viewport(&self, units: Units) -> Rect {
        match units {
            Units::Ndc => self.viewport,
            Units::Pixels => {
                let w = self.width as f32;
                let h = self.height as f32;
                Rect::new(
                    self.viewport.x1 * w,
                    self.viewport.x2 * w,
                    self.viewport.y1 * h,
                    self.viewport.y2 * h,
                )
            }
        }
    }

    fn query_char_size(&self) -> (f32, f32) {
        self.char_size_at(self.char_height)
    }

    fn page(&mut self) {
        self.items.clear();
        self.pages += 1;
        trace!("new page {}", self.pages);
    }

    fn buffer_begin(&mut self) {
        self.buffer_depth += 1;
    }

    fn buffer_end(&mut self) {
        self.buffer_depth = self.buffer_depth.saturating_sub(1);
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer_depth > 0 || self.closed {
            return Ok(());
        }
        self.write_output()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.buffer_depth = 0;
        let result = self.write_output();
        self.closed = true;
        result
    }
}
