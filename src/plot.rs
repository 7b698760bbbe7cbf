use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::{debug, warn};

use crate::canvas::{Item, Output, Polyline, TextItem};
use crate::device::{Colour, DeviceType};

/// The PGPLOT default colour table, plus one extra entry for index 16.
const PALETTE: [RGBColor; 17] = [
    RGBColor(0, 0, 0),
    RGBColor(255, 255, 255),
    RGBColor(255, 0, 0),
    RGBColor(0, 255, 0),
    RGBColor(0, 0, 255),
    RGBColor(0, 255, 255),
    RGBColor(255, 0, 255),
    RGBColor(255, 255, 0),
    RGBColor(255, 128, 0),
    RGBColor(128, 255, 0),
    RGBColor(0, 255, 128),
    RGBColor(0, 128, 255),
    RGBColor(128, 0, 255),
    RGBColor(255, 0, 128),
    RGBColor(85, 85, 85),
    RGBColor(170, 170, 170),
    RGBColor(255, 192, 203),
];

pub fn palette(colour: Colour) -> RGBColor {
    PALETTE[(colour as usize).min(PALETTE.len() - 1)]
}

/// Writes one page of display-list items to the output file.
pub fn render_page(
    items: &[Item],
    size: (u32, u32),
    output: &Output,
) -> Result<(), Box<dyn std::error::Error>> {
    match output.kind {
        DeviceType::Png => {
            let root = BitMapBackend::new(&output.path, size).into_drawing_area();
            draw_items(&root, items, size)?;
            root.present()?;
        }
        DeviceType::Svg | DeviceType::Ps => {
            let root = SVGBackend::new(&output.path, size).into_drawing_area();
            draw_items(&root, items, size)?;
            root.present()?;
        }
    }
    Ok(())
}

fn draw_items<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    items: &[Item],
    size: (u32, u32),
) -> Result<(), Box<dyn std::error::Error>>
where
    DB::ErrorType: 'static,
{
    root.fill(&palette(0))?;
    let mut text_failures = 0;
    for item in items {
        match item {
            Item::Polyline(line) => draw_polyline(root, line, size)?,
            Item::Text(text) => {
                // A host without usable fonts still gets the lines.
                if let Err(e) = draw_text(root, text, size) {
                    if text_failures == 0 {
                        warn!("cannot draw text: {}", e);
                    }
                    text_failures += 1;
                }
            }
        }
    }
    if text_failures > 0 {
        debug!("{} text items skipped", text_failures);
    }
    Ok(())
}

fn to_pixels(point: (f32, f32), size: (u32, u32)) -> (f32, f32) {
    (point.0 * size.0 as f32, (1.0 - point.1) * size.1 as f32)
}

fn draw_polyline<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    line: &Polyline,
    size: (u32, u32),
) -> Result<(), Box<dyn std::error::Error>>
where
    DB::ErrorType: 'static,
{
    let points: Vec<(f32, f32)> = line
        .ndc_points()
        .into_iter()
        .filter(|p| p.0.is_finite() && p.1.is_finite())
        .map(|p| to_pixels(p, size))
        .collect();
    let style = palette(line.colour).stroke_width(1);
    let runs = match line.style.dash_pattern() {
        None => vec![points],
        Some(pattern) => dash_segments(&points, pattern),
    };
    for run in runs {
        if run.len() < 2 {
            continue;
        }
        let run: Vec<(i32, i32)> = run
            .iter()
            .map(|&(x, y)| (x.round() as i32, y.round() as i32))
            .collect();
        root.draw(&PathElement::new(run, style))?;
    }
    Ok(())
}

/// Splits a pixel-space path into the "on" pieces of a dash pattern. The
/// pattern phase carries across vertices.
fn dash_segments(points: &[(f32, f32)], pattern: &[f32]) -> Vec<Vec<(f32, f32)>> {
    let mut runs = Vec::new();
    if points.len() < 2 || pattern.is_empty() {
        return runs;
    }
    let mut index = 0;
    let mut left = pattern[0];
    let mut current = vec![points[0]];

    for pair in points.windows(2) {
        let (mut x0, mut y0) = pair[0];
        let (x1, y1) = pair[1];
        let mut remaining = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        while remaining > 0.0 {
            let step = left.min(remaining);
            let t = step / remaining;
            x0 += (x1 - x0) * t;
            y0 += (y1 - y0) * t;
            remaining -= step;
            left -= step;
            let on = index % 2 == 0;
            if on {
                current.push((x0, y0));
            }
            if left <= 0.0 {
                if on && current.len() > 1 {
                    runs.push(std::mem::take(&mut current));
                }
                index = (index + 1) % pattern.len();
                left = pattern[index];
                current.clear();
                if index % 2 == 0 {
                    current.push((x0, y0));
                }
            }
        }
    }
    if index % 2 == 0 && current.len() > 1 {
        runs.push(current);
    }
    runs
}

fn draw_text<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    text: &TextItem,
    size: (u32, u32),
) -> Result<(), Box<dyn std::error::Error>>
where
    DB::ErrorType: 'static,
{
    let (x, y) = to_pixels((text.x, text.y), size);
    let font_px = (text.height * size.1 as f32).max(6.0) as u32;
    let hpos = if text.fjust < 0.25 {
        HPos::Left
    } else if text.fjust > 0.75 {
        HPos::Right
    } else {
        HPos::Center
    };
    let colour = palette(text.colour);
    let mut style = TextStyle::from(("sans-serif", font_px).into_font())
        .color(&colour)
        .pos(Pos::new(hpos, VPos::Bottom));
    if (text.angle - 90.0).abs() < 1.0 {
        style = style.transform(FontTransform::Rotate270);
    }
    root.draw(&Text::new(
        text.text.clone(),
        (x.round() as i32, y.round() as i32),
        style,
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::device::{Axis, LineStyle, PlotDevice, Rect, RED};

    #[test]
    fn dashes_alternate_on_and_off() {
        let runs = dash_segments(&[(0.0, 0.0), (40.0, 0.0)], &[10.0, 5.0]);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0], vec![(0.0, 0.0), (10.0, 0.0)]);
        assert_eq!(runs[1], vec![(15.0, 0.0), (25.0, 0.0)]);
        assert_eq!(runs[2], vec![(30.0, 0.0), (40.0, 0.0)]);
    }

    #[test]
    fn dash_phase_continues_round_corners() {
        let runs = dash_segments(&[(0.0, 0.0), (6.0, 0.0), (6.0, 6.0)], &[10.0, 5.0]);
        assert_eq!(runs[0], vec![(0.0, 0.0), (6.0, 0.0), (6.0, 4.0)]);
    }

    #[test]
    fn palette_clamps_out_of_range_indices() {
        assert_eq!(palette(1), RGBColor(255, 255, 255));
        assert_eq!(palette(200), palette(16));
    }

    #[test]
    fn svg_page_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.svg");
        let mut canvas = Canvas::with_output(
            320,
            240,
            Output {
                path: path.clone(),
                kind: DeviceType::Svg,
            },
        );
        canvas.viewport(Rect::new(0.1, 0.9, 0.1, 0.9));
        canvas.window(0.0, 10.0, 0.0, 10.0);
        canvas.draw_box(Axis::TICKED, Axis::TICKED);
        canvas.set_line_style(LineStyle::Dashed);
        canvas.line(&[0.0, 10.0], &[0.0, 10.0]);
        canvas.set_colour(RED);
        canvas.text_at(5.0, 5.0, 0.0, 0.5, "1-2 aa");
        canvas.text_at(0.5, 5.0, 90.0, 0.5, "Amplitude");
        canvas.flush().unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("polyline") || svg.contains("path"));
    }
}
