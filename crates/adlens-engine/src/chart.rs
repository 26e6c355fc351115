//! Chart renderers.
//!
//! [`SvgChartRenderer`] writes one standalone SVG per run, named after the run
//! id, so concurrent runs never share an output file.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use adlens_core::collaborators::{ChartReference, ChartRenderer};
use adlens_core::ids::RunId;
use adlens_core::plan::{ChartSpec, ChartType};
use adlens_core::table::Table;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 480.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 90.0;
const COLOR: &str = "#4e79a7";

/// Renders charts as SVG files under `output_dir`.
#[derive(Clone, Debug)]
pub struct SvgChartRenderer {
    output_dir: PathBuf,
}

impl SvgChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Artifact path for one run.
    pub fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.output_dir.join(format!("{}.svg", run_id.file_stem()))
    }
}

#[async_trait]
impl ChartRenderer for SvgChartRenderer {
    async fn render_chart(
        &self,
        run_id: &RunId,
        table: &Table,
        spec: &ChartSpec,
    ) -> Option<ChartReference> {
        let svg = match render_svg(table, spec) {
            Ok(svg) => svg,
            Err(reason) => {
                warn!(%run_id, reason, "chart not rendered");
                return None;
            }
        };

        let path = self.path_for(run_id);
        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            warn!(%run_id, error = %e, dir = %self.output_dir.display(), "cannot create chart directory");
            return None;
        }
        if let Err(e) = tokio::fs::write(&path, svg).await {
            warn!(%run_id, error = %e, path = %path.display(), "cannot write chart");
            return None;
        }

        debug!(%run_id, path = %path.display(), chart_type = spec.chart_type.as_str(), "chart rendered");
        Some(ChartReference::new(path))
    }
}

/// Renderer used when charts are disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopChartRenderer;

#[async_trait]
impl ChartRenderer for NoopChartRenderer {
    async fn render_chart(&self, _: &RunId, _: &Table, _: &ChartSpec) -> Option<ChartReference> {
        None
    }
}

struct Point {
    label: String,
    x: Option<f64>,
    y: f64,
}

fn collect_points(table: &Table, spec: &ChartSpec) -> Result<Vec<Point>, &'static str> {
    if table.is_empty() {
        return Err("empty table");
    }
    let xs = table.column(&spec.x_column).ok_or("x column missing")?;
    let ys = table.column(&spec.y_column).ok_or("y column missing")?;

    let points: Vec<Point> = xs
        .zip(ys)
        .filter_map(|(x, y)| {
            Some(Point {
                label: x.to_string(),
                x: x.as_f64(),
                y: y.as_f64().filter(|v| v.is_finite())?,
            })
        })
        .collect();

    if points.is_empty() {
        return Err("no numeric y values");
    }
    Ok(points)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

struct Frame {
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn new(points: &[Point]) -> Self {
        let (lo, hi) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        let y_min = lo.min(0.0);
        let y_max = if hi > y_min { hi.max(0.0) } else { y_min + 1.0 };
        Self { y_min, y_max }
    }

    fn plot_width() -> f64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height() -> f64 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn y_to_px(&self, y: f64) -> f64 {
        let t = (y - self.y_min) / (self.y_max - self.y_min);
        MARGIN_TOP + Self::plot_height() * (1.0 - t)
    }

    fn slot_center(index: usize, count: usize) -> f64 {
        let slot = Self::plot_width() / count as f64;
        MARGIN_LEFT + slot * (index as f64 + 0.5)
    }
}

fn render_svg(table: &Table, spec: &ChartSpec) -> Result<String, &'static str> {
    let points = collect_points(table, spec)?;
    let frame = Frame::new(&points);
    let mut svg = String::new();

    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="28" text-anchor="middle" font-size="18">{}</text>"#,
        WIDTH / 2.0,
        escape(&spec.title)
    );

    draw_axes(&mut svg, &frame, spec);

    match spec.chart_type {
        ChartType::Bar => draw_bars(&mut svg, &frame, &points),
        ChartType::Pie => {
            draw_bars(&mut svg, &frame, &points);
            let _ = writeln!(
                svg,
                r##"<text x="{}" y="44" text-anchor="middle" fill="#777">(pie chart shown as bars)</text>"##,
                WIDTH / 2.0
            );
        }
        ChartType::Line => draw_line(&mut svg, &frame, &points),
        ChartType::Scatter => draw_scatter(&mut svg, &frame, &points),
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

fn draw_axes(svg: &mut String, frame: &Frame, spec: &ChartSpec) {
    let bottom = MARGIN_TOP + Frame::plot_height();
    let right = MARGIN_LEFT + Frame::plot_width();
    let zero = frame.y_to_px(0.0);

    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{bottom}" stroke="black"/>"#
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{zero:.1}" x2="{right}" y2="{zero:.1}" stroke="black"/>"#
    );

    for step in 0..=4 {
        let value = frame.y_min + (frame.y_max - frame.y_min) * f64::from(step) / 4.0;
        let y = frame.y_to_px(value);
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{:.1}" text-anchor="end">{}</text>"#,
            MARGIN_LEFT - 6.0,
            y + 4.0,
            format_tick(value)
        );
    }

    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle">{}</text>"#,
        MARGIN_LEFT + Frame::plot_width() / 2.0,
        HEIGHT - 12.0,
        escape(&spec.x_column)
    );
    let _ = writeln!(
        svg,
        r#"<text x="16" y="{}" text-anchor="middle" transform="rotate(-90 16 {})">{}</text>"#,
        MARGIN_TOP + Frame::plot_height() / 2.0,
        MARGIN_TOP + Frame::plot_height() / 2.0,
        escape(&spec.y_column)
    );
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn draw_category_label(svg: &mut String, x: f64, label: &str) {
    let y = MARGIN_TOP + Frame::plot_height() + 14.0;
    let _ = writeln!(
        svg,
        r#"<text x="{x:.1}" y="{y:.1}" text-anchor="end" transform="rotate(-35 {x:.1} {y:.1})">{}</text>"#,
        escape(label)
    );
}

fn draw_bars(svg: &mut String, frame: &Frame, points: &[Point]) {
    let slot = Frame::plot_width() / points.len() as f64;
    let bar_width = (slot * 0.7).max(1.0);
    let zero = frame.y_to_px(0.0);

    for (i, p) in points.iter().enumerate() {
        let center = Frame::slot_center(i, points.len());
        let top = frame.y_to_px(p.y);
        let (y, height) = if top < zero { (top, zero - top) } else { (zero, top - zero) };
        let _ = writeln!(
            svg,
            r#"<rect x="{:.1}" y="{y:.1}" width="{bar_width:.1}" height="{height:.1}" fill="{COLOR}"><title>{}: {}</title></rect>"#,
            center - bar_width / 2.0,
            escape(&p.label),
            p.y
        );
        draw_category_label(svg, center, &p.label);
    }
}

fn draw_line(svg: &mut String, frame: &Frame, points: &[Point]) {
    let coords: Vec<String> = points
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{:.1},{:.1}", Frame::slot_center(i, points.len()), frame.y_to_px(p.y)))
        .collect();
    let _ = writeln!(
        svg,
        r#"<polyline points="{}" fill="none" stroke="{COLOR}" stroke-width="2"/>"#,
        coords.join(" ")
    );
    for (i, p) in points.iter().enumerate() {
        let cx = Frame::slot_center(i, points.len());
        let _ = writeln!(
            svg,
            r#"<circle cx="{cx:.1}" cy="{:.1}" r="3" fill="{COLOR}"/>"#,
            frame.y_to_px(p.y)
        );
        draw_category_label(svg, cx, &p.label);
    }
}

/// Numeric x values are placed proportionally; otherwise points fall back to
/// evenly spaced categories.
fn draw_scatter(svg: &mut String, frame: &Frame, points: &[Point]) {
    let xs: Option<Vec<f64>> = points.iter().map(|p| p.x).collect();
    let positions: Vec<f64> = match xs {
        Some(xs) => {
            let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let span = if hi > lo { hi - lo } else { 1.0 };
            xs.iter()
                .map(|x| MARGIN_LEFT + Frame::plot_width() * ((x - lo) / span * 0.9 + 0.05))
                .collect()
        }
        None => (0..points.len()).map(|i| Frame::slot_center(i, points.len())).collect(),
    };

    for (p, cx) in points.iter().zip(positions) {
        let _ = writeln!(
            svg,
            r#"<circle cx="{cx:.1}" cy="{:.1}" r="4" fill="{COLOR}"><title>{}: {}</title></circle>"#,
            frame.y_to_px(p.y),
            escape(&p.label),
            p.y
        );
    }
}
