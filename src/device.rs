//! The graphics capability the composers draw through.
//!
//! Operations follow PGPLOT: a viewport in normalised device coordinates
//! (NDC, 0..1 on both axes, origin bottom left), a world window mapped onto
//! it, integer colour and line-style indices, and text placed relative to
//! the viewport edges.

use std::fmt;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use chrono::{DateTime, Utc};

use crate::canvas::{Canvas, Output};
use crate::error::{NspdError, Result};
use crate::utils::dump_timestamp;

/// PGPLOT colour index, 0..=16.
pub type Colour = u8;

pub const BACKGROUND: Colour = 0;
pub const FOREGROUND: Colour = 1;
pub const RED: Colour = 2;
pub const GREEN: Colour = 3;
pub const BLUE: Colour = 4;
pub const CYAN: Colour = 5;
pub const MAGENTA: Colour = 6;
pub const YELLOW: Colour = 7;
pub const ORANGE: Colour = 8;
pub const DARK_GREY: Colour = 14;
pub const LIGHT_GREY: Colour = 15;
pub const NUM_COLOURS: u8 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineStyle {
    #[default]
    Full,
    Dashed,
    DotDash,
    Dotted,
    DashDotDotDot,
}

impl LineStyle {
    /// PGPLOT numbering (1..=5), cycling for larger indices.
    pub fn from_index(index: usize) -> LineStyle {
        match index.saturating_sub(1) % 5 {
            0 => LineStyle::Full,
            1 => LineStyle::Dashed,
            2 => LineStyle::DotDash,
            3 => LineStyle::Dotted,
            _ => LineStyle::DashDotDotDot,
        }
    }

    /// On/off lengths in pixels, `None` for a full line.
    pub fn dash_pattern(self) -> Option<&'static [f32]> {
        match self {
            LineStyle::Full => None,
            LineStyle::Dashed => Some(&[10.0, 6.0]),
            LineStyle::DotDash => Some(&[10.0, 4.0, 2.0, 4.0]),
            LineStyle::Dotted => Some(&[2.0, 4.0]),
            LineStyle::DashDotDotDot => Some(&[10.0, 4.0, 2.0, 4.0, 2.0, 4.0, 2.0, 4.0]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
}

impl Rect {
    pub fn new(x1: f32, x2: f32, y1: f32, y2: f32) -> Self {
        Rect { x1, x2, y1, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn contains(&self, other: &Rect) -> bool {
        const EPS: f32 = 1e-5;
        other.x1 >= self.x1 - EPS
            && other.x2 <= self.x2 + EPS
            && other.y1 >= self.y1 - EPS
            && other.y2 <= self.y2 + EPS
    }
}

/// World coordinate limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub xmin: f32,
    pub xmax: f32,
    pub ymin: f32,
    pub ymax: f32,
}

impl Default for Window {
    fn default() -> Self {
        Window {
            xmin: 0.0,
            xmax: 1.0,
            ymin: 0.0,
            ymax: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Ndc,
    Pixels,
}

/// Viewport edge for `mtext`. The vertical variants write horizontal text
/// beside the left or right edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bottom,
    Left,
    Top,
    Right,
    LeftVertical,
    RightVertical,
}

bitflags! {
    /// Axis decoration, the equivalent of a PGPLOT `BCNST` option string.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Axis: u8 {
        const EDGE_LOW = 1 << 0;
        const EDGE_HIGH = 1 << 1;
        const MAJOR_TICKS = 1 << 2;
        const MINOR_TICKS = 1 << 3;
        const LABELS = 1 << 4;
        /// Values are seconds and are labelled `HH:MM`.
        const TIME = 1 << 5;
        /// Labels on the high edge instead of the low one.
        const LABELS_HIGH = 1 << 6;

        const FRAME = Self::EDGE_LOW.bits() | Self::EDGE_HIGH.bits();
        const TICKED = Self::FRAME.bits() | Self::MAJOR_TICKS.bits() | Self::MINOR_TICKS.bits();
        const LABELLED = Self::TICKED.bits() | Self::LABELS.bits();
    }
}

pub trait PlotDevice {
    fn viewport(&mut self, rect: Rect);
    fn window(&mut self, xmin: f32, xmax: f32, ymin: f32, ymax: f32);
    fn draw_box(&mut self, x: Axis, y: Axis);
    fn line(&mut self, xs: &[f32], ys: &[f32]);
    /// Text relative to the viewport: `displacement` in character heights
    /// outside the edge, `coord` as a fraction along it, `fjust` 0 = left,
    /// 0.5 = centred, 1 = right.
    fn mtext(&mut self, side: Side, displacement: f32, coord: f32, fjust: f32, text: &str);
    /// Text at a world position.
    fn text_at(&mut self, x: f32, y: f32, angle: f32, fjust: f32, text: &str);
    fn set_colour(&mut self, colour: Colour);
    fn set_line_style(&mut self, style: LineStyle);
    /// Relative character height, 1.0 being 1/40 of the surface height.
    fn set_char_height(&mut self, height: f32);
    fn char_height(&self) -> f32;
    /// Width and height of `text` at the current character height, NDC.
    fn query_text_bounds(&self, text: &str) -> (f32, f32);
    fn query_viewport(&self, units: Units) -> Rect;
    /// Character height in NDC as `(x, y)`.
    fn query_char_size(&self) -> (f32, f32);
    fn page(&mut self);
    fn buffer_begin(&mut self);
    fn buffer_end(&mut self);
    fn flush(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum DeviceType {
    #[default]
    Png,
    Svg,
    /// Vector output; written as SVG.
    Ps,
}

impl DeviceType {
    pub fn extension(self) -> &'static str {
        match self {
            DeviceType::Png => "png",
            DeviceType::Svg => "svg",
            DeviceType::Ps => "ps",
        }
    }

    pub fn from_name(name: &str) -> Option<DeviceType> {
        match name.to_ascii_lowercase().as_str() {
            "png" => Some(DeviceType::Png),
            "svg" => Some(DeviceType::Svg),
            "ps" | "cps" | "vps" | "vcps" => Some(DeviceType::Ps),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A parsed `path/type` device name, or the null device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    Null,
    File { path: PathBuf, kind: DeviceType },
}

impl DeviceSpec {
    pub fn parse(spec: &str) -> Result<DeviceSpec> {
        let spec = spec.trim();
        if spec.eq_ignore_ascii_case("/null") {
            return Ok(DeviceSpec::Null);
        }
        let (path, kind) = spec
            .rsplit_once('/')
            .ok_or_else(|| NspdError::device(format!("{}: expected <file>/<type>", spec)))?;
        let kind = DeviceType::from_name(kind)
            .ok_or_else(|| NspdError::device(format!("{}: unknown device type", spec)))?;
        if path.is_empty() {
            return Err(NspdError::device(format!("{}: missing file name", spec)));
        }
        Ok(DeviceSpec::File {
            path: PathBuf::from(path),
            kind,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            DeviceSpec::Null => None,
            DeviceSpec::File { path, .. } => Some(path),
        }
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceSpec::Null => f.write_str("/null"),
            DeviceSpec::File { path, kind } => write!(f, "{}/{}", path.display(), kind),
        }
    }
}

pub const SCREEN_SIZE: (u32, u32) = (1024, 768);

pub fn open_device(spec: &DeviceSpec) -> Result<Box<dyn PlotDevice>> {
    let canvas = match spec {
        DeviceSpec::Null => Canvas::new(SCREEN_SIZE.0, SCREEN_SIZE.1),
        DeviceSpec::File { path, kind } => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                if !dir.is_dir() {
                    return Err(NspdError::device(format!(
                        "{}: directory does not exist",
                        dir.display()
                    )));
                }
            }
            Canvas::with_output(
                SCREEN_SIZE.0,
                SCREEN_SIZE.1,
                Output {
                    path: path.clone(),
                    kind: *kind,
                },
            )
        }
    };
    Ok(Box::new(canvas))
}

/// Device for a dump. A missing name becomes `nspd_plot_<timestamp>`; a name
/// without a recognised extension gets the default type's extension.
pub fn dump_target(filename: Option<&str>, default_type: DeviceType, now: DateTime<Utc>) -> DeviceSpec {
    let name = match filename.map(str::trim).filter(|f| !f.is_empty()) {
        Some(name) => name.to_string(),
        None => format!("nspd_plot_{}", dump_timestamp(now)),
    };
    if let Some((stem, kind)) = name.rsplit_once('/').and_then(|(p, k)| {
        DeviceType::from_name(k).map(|kind| (p.to_string(), kind))
    }) {
        return DeviceSpec::File {
            path: PathBuf::from(stem),
            kind,
        };
    }
    let path = PathBuf::from(&name);
    match path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(DeviceType::from_name)
    {
        Some(kind) => DeviceSpec::File { path, kind },
        None => DeviceSpec::File {
            path: PathBuf::from(format!("{}.{}", name, default_type.extension())),
            kind: default_type,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn device_specs_parse() {
        assert_eq!(DeviceSpec::parse("/null").unwrap(), DeviceSpec::Null);
        assert_eq!(
            DeviceSpec::parse("out/screen.png/png").unwrap(),
            DeviceSpec::File {
                path: PathBuf::from("out/screen.png"),
                kind: DeviceType::Png
            }
        );
        assert!(DeviceSpec::parse("screen.png").is_err());
        assert!(DeviceSpec::parse("screen/xw").is_err());
    }

    #[test]
    fn dump_without_name_is_timestamped() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 4, 5, 6).unwrap();
        let spec = dump_target(None, DeviceType::Ps, now);
        assert_eq!(
            spec,
            DeviceSpec::File {
                path: PathBuf::from("nspd_plot_20240309_040506.ps"),
                kind: DeviceType::Ps
            }
        );
    }

    #[test]
    fn dump_keeps_known_extension() {
        let now = Utc::now();
        let spec = dump_target(Some("bandpass.svg"), DeviceType::Png, now);
        assert_eq!(spec.path(), Some(Path::new("bandpass.svg")));
        let spec = dump_target(Some("bandpass"), DeviceType::Png, now);
        assert_eq!(spec.to_string(), "bandpass.png/png");
    }

    #[test]
    fn line_styles_cycle_like_pgplot() {
        assert_eq!(LineStyle::from_index(1), LineStyle::Full);
        assert_eq!(LineStyle::from_index(2), LineStyle::Dashed);
        assert_eq!(LineStyle::from_index(6), LineStyle::Full);
        assert!(LineStyle::Full.dash_pattern().is_none());
    }
}
