//! Division of the plot surface into a grid of panels under an
//! information strip.

use crate::device::{PlotDevice, Rect, Units};
use crate::error::{NspdError, Result};

pub const MAX_XPANELS: usize = 10;
pub const MAX_YPANELS: usize = 10;

/// Panel padding, in character heights per unit of margin reduction.
const PADDING_FRACTION: f32 = 1.8;

/// What `select` should make the current viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelSelect {
    /// Column, row; row 0 is the top of the grid.
    Panel(usize, usize),
    /// The viewport the device started with.
    Original,
    InfoStrip,
    /// The gap between the info strip and the top panel of a column.
    ColumnHeader(usize),
}

#[derive(Debug, Clone, Default)]
pub struct PanelGeometry {
    pub nx: usize,
    pub ny: usize,
    pub abut: bool,
    measured: bool,
    original: Rect,
    original_px: Rect,
    info: Rect,
    panels: Vec<Rect>,
    panels_px: Vec<Rect>,
    grid_top: f32,
}

impl PanelGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_measured(&self) -> bool {
        self.measured
    }

    pub fn original(&self) -> Rect {
        self.original
    }

    pub fn info_strip(&self) -> Rect {
        self.info
    }

    pub fn panel(&self, px: usize, py: usize) -> Option<Rect> {
        if px >= self.nx || py >= self.ny {
            return None;
        }
        self.panels.get(py * self.nx + px).copied()
    }

    pub fn panel_pixels(&self, px: usize, py: usize) -> Option<Rect> {
        if px >= self.nx || py >= self.ny {
            return None;
        }
        self.panels_px.get(py * self.nx + px).copied()
    }

    pub fn num_panels(&self) -> usize {
        self.nx * self.ny
    }

    /// Rebuilds the grid. The device viewport is only read the first time,
    /// since the composers leave it pointing at whatever panel they drew last.
    pub fn split(
        &mut self,
        nx: usize,
        ny: usize,
        device: &dyn PlotDevice,
        abut: bool,
        margin_reduction: f32,
        info_lines: usize,
    ) -> Result<()> {
        if !(1..=MAX_XPANELS).contains(&nx) || !(1..=MAX_YPANELS).contains(&ny) {
            return Err(NspdError::out_of_range(format!(
                "panel grid {}x{} outside 1..{} x 1..{}",
                nx, ny, MAX_XPANELS, MAX_YPANELS
            )));
        }
        if !self.measured {
            self.original = device.query_viewport(Units::Ndc);
            self.original_px = device.query_viewport(Units::Pixels);
            self.measured = true;
        }
        let reduction = if margin_reduction > 0.0 {
            margin_reduction
        } else {
            1.0
        };
        let (cx, cy) = device.query_char_size();
        let orig = self.original;

        let x1 = orig.x1 / reduction;
        let x2 = 1.0 - (1.0 - orig.x2) / reduction;

        let info_height = info_lines as f32 * 1.3 * cy;
        let top = 1.0 - 0.5 * cy;
        self.info = Rect::new(x1, x2, top - info_height, top);
        // room for the panel titles above the grid
        self.grid_top = (self.info.y1 - 1.5 * cy).min(orig.y2);
        let bottom = orig.y1;

        let (pad_x, pad_y) = if abut {
            (0.0, 0.0)
        } else {
            (
                reduction * PADDING_FRACTION * cx,
                reduction * PADDING_FRACTION * cy,
            )
        };
        let cell_w = ((x2 - x1) - pad_x * (nx - 1) as f32) / nx as f32;
        let cell_h = ((self.grid_top - bottom) - pad_y * (ny - 1) as f32) / ny as f32;
        if cell_w <= 0.0 || cell_h <= 0.0 {
            return Err(NspdError::out_of_range(format!(
                "panel grid {}x{} does not fit the surface",
                nx, ny
            )));
        }

        self.nx = nx;
        self.ny = ny;
        self.abut = abut;
        self.panels.clear();
        for py in 0..ny {
            for px in 0..nx {
                let left = x1 + px as f32 * (cell_w + pad_x);
                let upper = self.grid_top - py as f32 * (cell_h + pad_y);
                self.panels
                    .push(Rect::new(left, left + cell_w, upper - cell_h, upper));
            }
        }
        let sx = if orig.width() != 0.0 {
            self.original_px.width() / orig.width()
        } else {
            1.0
        };
        let sy = if orig.height() != 0.0 {
            self.original_px.height() / orig.height()
        } else {
            1.0
        };
        self.panels_px = self
            .panels
            .iter()
            .map(|r| Rect::new(r.x1 * sx, r.x2 * sx, r.y1 * sy, r.y2 * sy))
            .collect();
        Ok(())
    }

    pub fn select(&self, device: &mut dyn PlotDevice, which: PanelSelect) -> Result<()> {
        let rect = match which {
            PanelSelect::Original => self.original,
            PanelSelect::InfoStrip => self.info,
            PanelSelect::Panel(px, py) => self.panel(px, py).ok_or_else(|| {
                NspdError::out_of_range(format!("no panel at {},{}", px, py))
            })?,
            PanelSelect::ColumnHeader(px) => {
                let column = self.panel(px, 0).ok_or_else(|| {
                    NspdError::out_of_range(format!("no column {}", px))
                })?;
                Rect::new(column.x1, column.x2, self.grid_top, self.info.y1)
            }
        };
        device.viewport(rect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;

    #[test]
    fn panels_tile_without_overlap() {
        let canvas = Canvas::new(1024, 768);
        let mut geometry = PanelGeometry::new();
        geometry.split(3, 2, &canvas, false, 1.5, 3).unwrap();
        assert_eq!(geometry.num_panels(), 6);
        let a = geometry.panel(0, 0).unwrap();
        let b = geometry.panel(1, 0).unwrap();
        let c = geometry.panel(0, 1).unwrap();
        assert!(a.x2 < b.x1);
        assert!(c.y2 < a.y1);
        assert!(a.y2 < geometry.info_strip().y1);
        assert!(geometry.panel(3, 0).is_none());
    }

    #[test]
    fn abutted_panels_share_edges() {
        let canvas = Canvas::new(1024, 768);
        let mut geometry = PanelGeometry::new();
        geometry.split(2, 2, &canvas, true, 1.0, 0).unwrap();
        let a = geometry.panel(0, 0).unwrap();
        let b = geometry.panel(1, 0).unwrap();
        assert!((a.x2 - b.x1).abs() < 1e-6);
    }

    #[test]
    fn original_viewport_is_measured_once() {
        let mut canvas = Canvas::new(800, 600);
        let mut geometry = PanelGeometry::new();
        geometry.split(1, 1, &canvas, false, 1.0, 2).unwrap();
        let original = geometry.original();
        geometry
            .select(&mut canvas, PanelSelect::Panel(0, 0))
            .unwrap();
        canvas.viewport(Rect::new(0.4, 0.5, 0.4, 0.5));
        geometry.split(2, 2, &canvas, false, 1.0, 2).unwrap();
        assert_eq!(geometry.original(), original);
        geometry.select(&mut canvas, PanelSelect::Original).unwrap();
        assert_eq!(canvas.query_viewport(Units::Ndc), original);
    }

    #[test]
    fn sentinels_select_strips() {
        let mut canvas = Canvas::new(800, 600);
        let mut geometry = PanelGeometry::new();
        geometry.split(2, 1, &canvas, false, 1.0, 4).unwrap();
        geometry.select(&mut canvas, PanelSelect::InfoStrip).unwrap();
        assert_eq!(canvas.query_viewport(Units::Ndc), geometry.info_strip());
        geometry
            .select(&mut canvas, PanelSelect::ColumnHeader(1))
            .unwrap();
        let header = canvas.query_viewport(Units::Ndc);
        assert_eq!(header.x1, geometry.panel(1, 0).unwrap().x1);
        assert!(geometry
            .select(&mut canvas, PanelSelect::Panel(5, 0))
            .is_err());
    }

    #[test]
    fn pixel_rectangles_follow_ndc() {
        let canvas = Canvas::new(1000, 500);
        let mut geometry = PanelGeometry::new();
        geometry.split(1, 1, &canvas, false, 1.0, 1).unwrap();
        let ndc = geometry.panel(0, 0).unwrap();
        let px = geometry.panel_pixels(0, 0).unwrap();
        assert!((px.x1 - ndc.x1 * 1000.0).abs() < 1e-2);
        assert!((px.y2 - ndc.y2 * 500.0).abs() < 1e-2);
        assert!(geometry.split(0, 1, &canvas, false, 1.0, 1).is_err());
    }
}
