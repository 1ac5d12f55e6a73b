//! Render projected charts to SVG documents with plotters.

use std::error::Error;
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::chart_data::{CartesianData, ChartData, ChartPoint, Slice, SunburstNode, XAxis};
use crate::chart_spec::{ChartKind, ChartSpec};
use crate::config::ChartsConfig;
use crate::dataset::ResultTable;
use crate::error::{PortalError, Result};

type DrawResult = std::result::Result<(), Box<dyn Error>>;
type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// Turns a projected chart into an opaque document.
pub trait ChartRenderer {
    type Output: AsRef<[u8]>;

    /// File extension of the rendered document, without the dot.
    fn extension(&self) -> &'static str;

    fn render_chart(&self, spec: &ChartSpec, data: &ChartData) -> Result<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgChartRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

impl SvgChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn from_config(config: &ChartsConfig) -> Self {
        Self::new(config.width, config.height)
    }
}

impl ChartRenderer for SvgChartRenderer {
    type Output = String;

    fn extension(&self) -> &'static str {
        "svg"
    }

    fn render_chart(&self, spec: &ChartSpec, data: &ChartData) -> Result<String> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (self.width, self.height))
                .into_drawing_area();
            draw(&root, &spec.title(), data).map_err(|e| PortalError::Render(e.to_string()))?;
            root.present()
                .map_err(|e| PortalError::Render(e.to_string()))?;
        }
        Ok(svg)
    }
}

/// Project `spec` over `table`, render it, and write the document to `path`.
pub fn write_chart<R: ChartRenderer>(
    path: &Path,
    spec: &ChartSpec,
    table: &ResultTable,
    renderer: &R,
) -> Result<()> {
    let data = ChartData::project(spec, table)?;
    let document = renderer.render_chart(spec, &data)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, document)?;
    info!("Wrote {} chart to {}", spec.kind, path.display());
    Ok(())
}

/// `write_chart` with the SVG renderer.
pub fn write_chart_svg(
    path: &Path,
    spec: &ChartSpec,
    table: &ResultTable,
    renderer: &SvgChartRenderer,
) -> Result<()> {
    write_chart(path, spec, table, renderer)
}

/// Write each chart into `dir` as `<stem>-<n>-<kind>.<ext>`, returning the paths written.
pub fn export_charts<R: ChartRenderer>(
    dir: &Path,
    stem: &str,
    charts: &[(ChartSpec, &ResultTable)],
    renderer: &R,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(charts.len());
    for (i, (spec, table)) in charts.iter().enumerate() {
        let name = format!(
            "{}-{}-{}.{}",
            sanitize_stem(stem),
            i + 1,
            spec.kind,
            renderer.extension()
        );
        let path = dir.join(name);
        write_chart(&path, spec, table, renderer)?;
        written.push(path);
    }
    Ok(written)
}

/// Keep file stems to alphanumerics, dash and underscore.
pub fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "chart".to_string()
    } else {
        cleaned
    }
}

fn draw(root: &Area, title: &str, data: &ChartData) -> DrawResult {
    root.fill(&WHITE)?;
    match data {
        ChartData::Cartesian(cartesian) => draw_cartesian(root, title, cartesian),
        ChartData::Pie { slices, .. } => draw_pie(root, title, slices),
        ChartData::Sunburst { root: tree, .. } => draw_sunburst(root, title, tree),
    }
}

fn series_color(index: usize) -> RGBAColor {
    Palette99::pick(index).to_rgba()
}

fn draw_cartesian(root: &Area, title: &str, data: &CartesianData) -> DrawResult {
    let root = root.titled(title, ("sans-serif", 22))?;
    let panels = root.split_evenly((1, data.panels.len().max(1)));

    // same series name, same color in every panel
    let mut names: Vec<&str> = Vec::new();
    for series in data.panels.iter().flat_map(|p| &p.series) {
        if !names.contains(&series.name.as_str()) {
            names.push(&series.name);
        }
    }

    let (x0, x1) = data.x_bounds();
    let (y0, y1) = data.y_bounds();
    let x_labels = match &data.x_axis {
        XAxis::Categories(labels) => labels.len().max(1),
        XAxis::Numeric { .. } => 10,
    };
    let size_range = size_range(data);
    let formatter = |x: &f64| data.x_label_at(*x);

    for (area, panel) in panels.iter().zip(&data.panels) {
        let mut builder = ChartBuilder::on(area);
        builder
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60);
        if let Some(facet) = &panel.title {
            builder.caption(facet, ("sans-serif", 16));
        }
        let mut chart = builder.build_cartesian_2d(x0..x1, y0..y1)?;
        chart
            .configure_mesh()
            .x_labels(x_labels)
            .x_label_formatter(&formatter)
            .x_desc(data.x_label.as_str())
            .y_desc(data.y_label.as_str())
            .draw()?;

        let slots = panel.series.len().max(1) as f64;
        let bar_width = 0.8 / slots;
        for (i, series) in panel.series.iter().enumerate() {
            let index = names
                .iter()
                .position(|n| *n == series.name)
                .unwrap_or(i);
            let color = series_color(index);
            let points = series.points.iter().map(|p| (p.x, p.y));
            match data.kind {
                ChartKind::Line => {
                    chart
                        .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
                        .label(series.name.as_str())
                        .legend(move |(x, y)| {
                            PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                        });
                    chart.draw_series(points.map(|p| Circle::new(p, 3, color.filled())))?;
                }
                ChartKind::Scatter => {
                    chart
                        .draw_series(series.points.iter().map(|p| {
                            Circle::new((p.x, p.y), radius(p, size_range), color.filled())
                        }))?
                        .label(series.name.as_str())
                        .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
                }
                _ => {
                    let offset = -0.4 + i as f64 * bar_width;
                    chart
                        .draw_series(series.points.iter().map(|p| {
                            let left = p.x + offset;
                            Rectangle::new([(left, 0.0), (left + bar_width, p.y)], color.filled())
                        }))?
                        .label(series.name.as_str())
                        .legend(move |(x, y)| {
                            Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                        });
                }
            }
        }

        if panel.series.len() > 1 {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
    }
    Ok(())
}

fn size_range(data: &CartesianData) -> Option<(f64, f64)> {
    let mut sizes = data.points().filter_map(|p| p.size).peekable();
    sizes.peek()?;
    Some(sizes.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s), hi.max(s))
    }))
}

/// Marker radius in pixels, scaled into [3, 15] by the size channel.
fn radius(point: &ChartPoint, range: Option<(f64, f64)>) -> i32 {
    match (point.size, range) {
        (Some(s), Some((lo, hi))) if hi > lo => (3.0 + 12.0 * (s - lo) / (hi - lo)).round() as i32,
        (Some(_), Some(_)) => 8,
        _ => 4,
    }
}

fn draw_pie(root: &Area, title: &str, slices: &[Slice]) -> DrawResult {
    let root = root.titled(title, ("sans-serif", 22))?;
    let (w, h) = root.dim_in_pixel();
    let (plot, legend) = root.split_horizontally((w as f64 * 0.7) as i32);
    let center = ((w as f64 * 0.35) as i32, (h / 2) as i32);
    let radius = (w as f64 * 0.7).min(h as f64) * 0.4;

    let total: f64 = slices.iter().map(|s| s.value).sum();
    if total <= 0.0 {
        plot.draw(&Text::new("No data", center, centered(16)))?;
        return Ok(());
    }

    let mut start = -PI / 2.0;
    for (i, slice) in slices.iter().enumerate() {
        let sweep = 2.0 * PI * slice.value / total;
        let color = series_color(i);
        plot.draw(&Polygon::new(
            wedge(center, 0.0, radius, start, start + sweep),
            color.filled(),
        ))?;
        if sweep > 0.25 {
            let mid = start + sweep / 2.0;
            let at = polar(center, radius * 0.65, mid);
            let pct = format!("{:.1}%", 100.0 * slice.value / total);
            plot.draw(&Text::new(pct, at, centered(12)))?;
        }
        start += sweep;
    }

    draw_legend(&legend, slices.iter().map(|s| s.label.as_str()))
}

fn draw_legend<'a>(area: &Area, labels: impl Iterator<Item = &'a str>) -> DrawResult {
    for (i, label) in labels.enumerate() {
        let y = 20 + i as i32 * 20;
        let color = series_color(i);
        area.draw(&Rectangle::new([(0, y - 6), (12, y + 6)], color.filled()))?;
        area.draw(&Text::new(
            label.to_string(),
            (18, y),
            ("sans-serif", 13)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Left, VPos::Center)),
        ))?;
    }
    Ok(())
}

fn draw_sunburst(root: &Area, title: &str, tree: &SunburstNode) -> DrawResult {
    let root = root.titled(title, ("sans-serif", 22))?;
    let (w, h) = root.dim_in_pixel();
    let center = ((w / 2) as i32, (h / 2) as i32);
    if tree.value <= 0.0 || tree.children.is_empty() {
        root.draw(&Text::new("No data", center, centered(16)))?;
        return Ok(());
    }
    let levels = tree.depth().saturating_sub(1).max(1);
    let ring = (w.min(h) as f64 * 0.45) / levels as f64;
    draw_ring(&root, tree, center, ring, 0, -PI / 2.0, 1.5 * PI, None)
}

#[allow(clippy::too_many_arguments)]
fn draw_ring(
    area: &Area,
    node: &SunburstNode,
    center: (i32, i32),
    ring: f64,
    depth: usize,
    start: f64,
    end: f64,
    base: Option<RGBAColor>,
) -> DrawResult {
    let inner = depth as f64 * ring;
    let outer = inner + ring;
    let mut angle = start;
    for (i, child) in node.children.iter().enumerate() {
        let sweep = (end - start) * child.value / node.value;
        let color = match base {
            Some(c) => c.mix((1.0 - 0.2 * depth as f64).max(0.4)),
            None => series_color(i),
        };
        let points = wedge(center, inner, outer, angle, angle + sweep);
        area.draw(&Polygon::new(points.clone(), color.filled()))?;
        area.draw(&PathElement::new(points, WHITE.stroke_width(1)))?;
        if sweep * (inner + ring / 2.0) > 30.0 {
            let at = polar(center, inner + ring / 2.0, angle + sweep / 2.0);
            area.draw(&Text::new(child.label.clone(), at, centered(11)))?;
        }
        draw_ring(
            area,
            child,
            center,
            ring,
            depth + 1,
            angle,
            angle + sweep,
            Some(color),
        )?;
        angle += sweep;
    }
    Ok(())
}

fn centered(size: u32) -> TextStyle<'static> {
    ("sans-serif", size)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center))
}

fn polar(center: (i32, i32), r: f64, theta: f64) -> (i32, i32) {
    (
        center.0 + (r * theta.cos()).round() as i32,
        center.1 + (r * theta.sin()).round() as i32,
    )
}

/// Outline of an annular sector; a pie slice when `inner` is 0.
fn wedge(center: (i32, i32), inner: f64, outer: f64, start: f64, end: f64) -> Vec<(i32, i32)> {
    let steps = (((end - start).abs() * 180.0 / PI) as usize).max(2);
    let arc = |r: f64| {
        (0..=steps).map(move |k| polar(center, r, start + (end - start) * k as f64 / steps as f64))
    };
    let mut points: Vec<(i32, i32)> = arc(outer).collect();
    if inner > 0.0 {
        let mut back: Vec<(i32, i32)> = arc(inner).collect();
        back.reverse();
        points.extend(back);
    } else {
        points.push(center);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_spec::ChannelMapping;
    use crate::dataset::Dataset;
    use polars::prelude::*;

    fn table() -> ResultTable {
        Dataset::new(
            df!(
                "region" => &["n", "n", "s"],
                "city" => &["A", "B", "A"],
                "newcol" => &[6.0f64, 2.0, 8.0],
            )
            .unwrap(),
        )
    }

    fn spec(kind: ChartKind) -> ChartSpec {
        ChartSpec::new(
            kind,
            ChannelMapping {
                x: Some("city".into()),
                y: Some("newcol".into()),
                names: Some("city".into()),
                values: Some("newcol".into()),
                path: vec!["region".into(), "city".into()],
                ..Default::default()
            },
        )
    }

    #[test]
    fn every_kind_renders_svg() {
        let renderer = SvgChartRenderer::new(400, 300);
        for kind in ChartKind::ALL {
            let s = spec(kind);
            let data = ChartData::project(&s, &table()).unwrap();
            let svg = renderer.render_chart(&s, &data).unwrap();
            assert!(svg.contains("<svg"), "{} should render", kind);
            assert!(svg.contains("</svg>"));
        }
    }

    #[test]
    fn grouped_bar_with_color_renders_legend() {
        let mut s = spec(ChartKind::Bar);
        s.channels.color = Some("region".into());
        let data = ChartData::project(&s, &table()).unwrap();
        let svg = SvgChartRenderer::default().render_chart(&s, &data).unwrap();
        assert!(svg.contains("<rect"));
        assert!(svg.contains("newcol"));
    }

    #[test]
    fn write_and_export_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chart.svg");
        write_chart_svg(&path, &spec(ChartKind::Pie), &table(), &SvgChartRenderer::default())
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<svg"));

        let t = table();
        let charts = vec![(spec(ChartKind::Line), &t), (spec(ChartKind::Sunburst), &t)];
        let written =
            export_charts(dir.path(), "sales data", &charts, &SvgChartRenderer::default())
                .unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["sales_data-1-line.svg", "sales_data-2-sunburst.svg"]);
        assert!(written.iter().all(|p| p.exists()));
    }

    #[test]
    fn invalid_chart_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.svg");
        let mut s = spec(ChartKind::Line);
        s.channels.y = Some("profit".into());
        let err = write_chart_svg(&path, &s, &table(), &SvgChartRenderer::default()).unwrap_err();
        assert!(matches!(err, PortalError::ColumnNotFound(_)));
        assert!(!path.exists());
    }

    #[test]
    fn empty_pie_still_renders() {
        let data = ChartData::Pie {
            title: "pie".into(),
            slices: vec![],
        };
        let svg = SvgChartRenderer::default()
            .render_chart(&spec(ChartKind::Pie), &data)
            .unwrap();
        assert!(svg.contains("No data"));
    }

    #[test]
    fn wedge_geometry() {
        let pie = wedge((0, 0), 0.0, 10.0, 0.0, PI / 2.0);
        assert_eq!(pie.first(), Some(&(10, 0)));
        assert_eq!(pie.last(), Some(&(0, 0)));
        let ring = wedge((0, 0), 5.0, 10.0, 0.0, PI / 2.0);
        assert_eq!(ring.last(), Some(&(5, 0)));
        assert_eq!(sanitize_stem("a b/c"), "a_b_c");
        assert_eq!(sanitize_stem(""), "chart");
    }
}
