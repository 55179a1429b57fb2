//! Polar chart renderer.
//!
//! Draws the three report charts (daily scatter, wind rose, monthly summary)
//! as 1800×1800 px PNGs — 6×6 inches at 300 DPI — using `plotters`.
//!
//! All charts use the compass convention: zero angle at geographic north,
//! angles increasing clockwise. This is the reverse of the mathematical
//! convention, so screen coordinates are computed as
//! `(x, y) = (cx + r·sin θ, cy − r·cos θ)`.

use plotters::prelude::*;
use plotters::style::colors::colormaps::{ColorMap, DerivedColorMap, ViridisRGB};
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use thiserror::Error;

/// Output resolution: 6 in × 300 DPI.
const IMAGE_SIZE: u32 = 1800;
/// Plot radius in pixels, leaving room for tick labels and the title.
const PLOT_RADIUS: f64 = 620.0;
/// Plot center; offset left of the image center to leave room for the
/// color-scale legend on the right.
const CENTER: (f64, f64) = (830.0, 950.0);
/// Sector width of wind-rose bars, degrees.
const ROSE_SECTOR_DEG: f64 = 8.0;
/// Angular tick label spacing, degrees.
const TICK_STEP_DEG: f64 = 10.0;
/// Number of radial grid circles.
const RADIAL_GRID_STEPS: usize = 5;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("chart drawing failed: {0}")]
    Draw(String),
}

/// Chart variant to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// One point per observation at (theta = direction, r = magnitude).
    Scatter,
    /// Sectored polar bars from the origin, sorted by angle.
    Rose,
    /// Scatter with a text label next to each point (monthly summaries).
    LabeledScatter,
}

/// Continuous color scale applied to point/bar magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Viridis,
    Plasma,
}

impl Palette {
    /// Color for a normalized magnitude in [0, 1].
    fn color(&self, h: f64) -> RGBColor {
        let h = h.clamp(0.0, 1.0);
        match self {
            Palette::Viridis => ViridisRGB.get_color(h),
            // plotters ships no plasma map; derive one from its anchor colors.
            Palette::Plasma => DerivedColorMap::new(&[
                RGBColor(13, 8, 135),
                RGBColor(126, 3, 168),
                RGBColor(204, 71, 120),
                RGBColor(248, 149, 64),
                RGBColor(240, 249, 33),
            ])
            .get_color(h),
        }
    }
}

/// One value positioned by angle and radial distance.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarPoint {
    pub angle_deg: f64,
    pub magnitude: f64,
    /// Drawn next to the point for `ChartKind::LabeledScatter`.
    pub label: Option<String>,
}

/// Everything needed to render one chart image.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub palette: Palette,
    /// Legend caption for the color scale, e.g. "Wind Speed (m/s)".
    pub magnitude_label: String,
    pub points: Vec<PolarPoint>,
}

/// Normalization over the magnitude range of a point set.
///
/// When all magnitudes are equal (or the set is empty) the span collapses to
/// zero; a span of 1 is substituted so color lookup never divides by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnitudeScale {
    pub min: f64,
    pub max: f64,
    span: f64,
}

impl MagnitudeScale {
    pub fn from_points(points: &[PolarPoint]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for p in points {
            if p.magnitude.is_finite() {
                min = min.min(p.magnitude);
                max = max.max(p.magnitude);
            }
        }
        if !min.is_finite() || !max.is_finite() {
            min = 0.0;
            max = 1.0;
        }
        let span = if (max - min).abs() < f64::EPSILON {
            1.0
        } else {
            max - min
        };
        Self { min, max, span }
    }

    /// Normalized position of a magnitude within [0, 1].
    pub fn normalize(&self, magnitude: f64) -> f64 {
        ((magnitude - self.min) / self.span).clamp(0.0, 1.0)
    }

    /// Radial axis maximum: the largest magnitude, or 1 for flat/empty data.
    pub fn radial_max(&self) -> f64 {
        if self.max > 0.0 {
            self.max
        } else {
            1.0
        }
    }
}

/// Compass-convention polar → screen pixel coordinates.
fn to_screen(angle_deg: f64, radius_px: f64) -> (i32, i32) {
    let theta = angle_deg.to_radians();
    let x = CENTER.0 + radius_px * theta.sin();
    let y = CENTER.1 - radius_px * theta.cos();
    (x.round() as i32, y.round() as i32)
}

/// Render a chart spec to a PNG file.
pub fn render(spec: &ChartSpec, path: &Path) -> Result<(), ChartError> {
    let root = BitMapBackend::new(path, (IMAGE_SIZE, IMAGE_SIZE)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let scale = MagnitudeScale::from_points(&spec.points);
    let r_max = scale.radial_max();

    draw_title(&root, &spec.title)?;
    draw_polar_frame(&root, r_max)?;

    match spec.kind {
        ChartKind::Scatter => draw_scatter(&root, spec, &scale, false)?,
        ChartKind::LabeledScatter => draw_scatter(&root, spec, &scale, true)?,
        ChartKind::Rose => draw_rose(&root, spec, &scale)?,
    }

    draw_colorbar(&root, spec, &scale)?;

    root.present().map_err(draw_err)?;
    Ok(())
}

fn draw_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Draw(e.to_string())
}

type Root<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

fn draw_title(root: &Root, title: &str) -> Result<(), ChartError> {
    let style = ("sans-serif", 44)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    root.draw(&Text::new(title.to_string(), (CENTER.0 as i32, 90), style))
        .map_err(draw_err)
}

/// Grid circles with radial value labels, angular spokes, tick labels every
/// 10°, and bold cardinal labels just outside the plot radius.
fn draw_polar_frame(root: &Root, r_max: f64) -> Result<(), ChartError> {
    let grid = RGBColor(190, 190, 190);
    let cx = CENTER.0 as i32;
    let cy = CENTER.1 as i32;

    // Concentric grid circles, innermost to the outer rim
    for step in 1..=RADIAL_GRID_STEPS {
        let frac = step as f64 / RADIAL_GRID_STEPS as f64;
        let radius = (PLOT_RADIUS * frac).round() as i32;
        root.draw(&Circle::new((cx, cy), radius, grid.stroke_width(1)))
            .map_err(draw_err)?;

        // Radial value label, placed along the 90° (east) spoke
        let value = r_max * frac;
        let style = ("sans-serif", 22)
            .into_font()
            .color(&RGBColor(90, 90, 90))
            .pos(Pos::new(HPos::Left, VPos::Bottom));
        let (lx, ly) = to_screen(90.0, PLOT_RADIUS * frac);
        root.draw(&Text::new(format!("{:.1}", value), (lx + 4, ly - 4), style))
            .map_err(draw_err)?;
    }

    // Angular spokes and tick labels every 10°
    let mut deg = 0.0;
    while deg < 360.0 {
        let edge = to_screen(deg, PLOT_RADIUS);
        root.draw(&PathElement::new(vec![(cx, cy), edge], grid.stroke_width(1)))
            .map_err(draw_err)?;

        let style = ("sans-serif", 24)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        let label_pos = to_screen(deg, PLOT_RADIUS + 34.0);
        root.draw(&Text::new(format!("{}°", deg as i32), label_pos, style))
            .map_err(draw_err)?;

        deg += TICK_STEP_DEG;
    }

    // Cardinal labels at 1.1 × plot radius
    for (label, deg) in [("N", 0.0), ("E", 90.0), ("S", 180.0), ("W", 270.0)] {
        let style = FontDesc::new(FontFamily::SansSerif, 36.0, FontStyle::Bold)
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));
        let pos = to_screen(deg, PLOT_RADIUS * 1.1);
        root.draw(&Text::new(label.to_string(), pos, style))
            .map_err(draw_err)?;
    }

    Ok(())
}

fn draw_scatter(
    root: &Root,
    spec: &ChartSpec,
    scale: &MagnitudeScale,
    with_labels: bool,
) -> Result<(), ChartError> {
    let r_max = scale.radial_max();

    for point in &spec.points {
        let radius_px = PLOT_RADIUS * (point.magnitude / r_max).clamp(0.0, 1.0);
        let pos = to_screen(point.angle_deg, radius_px);
        let fill = spec.palette.color(scale.normalize(point.magnitude));

        root.draw(&Circle::new(pos, 9, fill.mix(0.75).filled()))
            .map_err(draw_err)?;
        root.draw(&Circle::new(pos, 9, BLACK.stroke_width(1)))
            .map_err(draw_err)?;

        if with_labels {
            if let Some(label) = &point.label {
                let style = ("sans-serif", 26)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Left, VPos::Center));
                root.draw(&Text::new(label.clone(), (pos.0 + 14, pos.1), style))
                    .map_err(draw_err)?;
            }
        }
    }

    Ok(())
}

/// Sectored bars from the origin, sorted by angle for visual continuity.
fn draw_rose(root: &Root, spec: &ChartSpec, scale: &MagnitudeScale) -> Result<(), ChartError> {
    let r_max = scale.radial_max();

    let mut sorted: Vec<&PolarPoint> = spec.points.iter().collect();
    sorted.sort_by(|a, b| {
        a.angle_deg
            .partial_cmp(&b.angle_deg)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for point in sorted {
        let radius_px = PLOT_RADIUS * (point.magnitude / r_max).clamp(0.0, 1.0);
        let fill = spec.palette.color(scale.normalize(point.magnitude));

        // Sector polygon: origin plus an arc swept across the bar width
        let half = ROSE_SECTOR_DEG / 2.0;
        let mut vertices = vec![(CENTER.0 as i32, CENTER.1 as i32)];
        let arc_steps = 8;
        for i in 0..=arc_steps {
            let deg = point.angle_deg - half + ROSE_SECTOR_DEG * i as f64 / arc_steps as f64;
            vertices.push(to_screen(deg, radius_px));
        }

        root.draw(&Polygon::new(vertices.clone(), fill.mix(0.75).filled()))
            .map_err(draw_err)?;
        vertices.push((CENTER.0 as i32, CENTER.1 as i32));
        root.draw(&PathElement::new(vertices, BLACK.stroke_width(1)))
            .map_err(draw_err)?;
    }

    Ok(())
}

/// Vertical color-scale legend on the right edge, min at the bottom,
/// max at the top, captioned with the magnitude label.
fn draw_colorbar(root: &Root, spec: &ChartSpec, scale: &MagnitudeScale) -> Result<(), ChartError> {
    let x0 = 1620;
    let x1 = 1670;
    let y_top = 450;
    let y_bottom = 1450;

    for y in y_top..y_bottom {
        let h = (y_bottom - y) as f64 / (y_bottom - y_top) as f64;
        let color = spec.palette.color(h);
        root.draw(&PathElement::new(vec![(x0, y), (x1, y)], color.stroke_width(1)))
            .map_err(draw_err)?;
    }
    root.draw(&Rectangle::new(
        [(x0, y_top), (x1, y_bottom)],
        BLACK.stroke_width(1),
    ))
    .map_err(draw_err)?;

    let value_style = ("sans-serif", 26)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    root.draw(&Text::new(
        format!("{:.1}", scale.max),
        ((x0 + x1) / 2, y_top - 8),
        value_style.clone(),
    ))
    .map_err(draw_err)?;
    let min_style = ("sans-serif", 26)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Top));
    root.draw(&Text::new(
        format!("{:.1}", scale.min),
        ((x0 + x1) / 2, y_bottom + 8),
        min_style,
    ))
    .map_err(draw_err)?;

    let caption_style = ("sans-serif", 28)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    root.draw(&Text::new(
        spec.magnitude_label.clone(),
        ((x0 + x1) / 2, y_top - 48),
        caption_style,
    ))
    .map_err(draw_err)?;

    Ok(())
}
