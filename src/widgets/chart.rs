//! Terminal rendering of projected charts.
//!
//! Cartesian charts use ratatui's `Chart` (or `BarChart` for non-negative bars over
//! categories). Pie and sunburst charts are drawn as share bars, one line per slice
//! or node.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, LegendPosition,
        Paragraph, Widget, Wrap,
    },
};

use crate::chart_data::{CartesianData, ChartData, Panel, Slice, SunburstNode, XAxis};
use crate::chart_spec::ChartKind;
use crate::config::Theme;
use crate::dataset::format_float;
use crate::error::{user_message, Result};

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::Red,
];

/// Most category names printed under an x axis before only the ends are labelled.
const MAX_CATEGORY_LABELS: usize = 8;

fn series_color(i: usize) -> Color {
    SERIES_COLORS[i % SERIES_COLORS.len()]
}

/// A titled chart panel, or the reason the chart cannot be drawn.
pub struct ChartView<'a> {
    title: String,
    data: &'a Result<ChartData>,
    border_fg: Color,
    text_fg: Color,
    error_fg: Color,
    dimmed_fg: Color,
}

impl<'a> ChartView<'a> {
    pub fn new(title: impl Into<String>, data: &'a Result<ChartData>) -> Self {
        Self {
            title: title.into(),
            data,
            border_fg: Color::Cyan,
            text_fg: Color::White,
            error_fg: Color::Red,
            dimmed_fg: Color::DarkGray,
        }
    }

    pub fn with_theme(mut self, theme: &Theme) -> Self {
        self.border_fg = theme.get("table_border");
        self.text_fg = theme.get("text_primary");
        self.error_fg = theme.get("error");
        self.dimmed_fg = theme.get("dimmed");
        self
    }

    fn render_cartesian(&self, data: &CartesianData, area: Rect, buf: &mut Buffer) {
        if data.panels.is_empty() || data.points().next().is_none() {
            self.render_placeholder("No data points", area, buf);
            return;
        }
        let constraints = vec![Constraint::Fill(1); data.panels.len()];
        let areas = Layout::new(Direction::Horizontal, constraints).split(area);
        for (panel, panel_area) in data.panels.iter().zip(areas.iter()) {
            let mut inner = *panel_area;
            if let Some(title) = &panel.title {
                let block = Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(self.dimmed_fg))
                    .title(title.as_str());
                inner = block.inner(*panel_area);
                block.render(*panel_area, buf);
            }
            let all_non_negative = panel
                .series
                .iter()
                .flat_map(|s| s.points.iter())
                .all(|p| p.y >= 0.0);
            match &data.x_axis {
                XAxis::Categories(labels) if data.kind == ChartKind::Bar && all_non_negative => {
                    self.render_bars(panel, labels, inner, buf)
                }
                _ => self.render_plot(data, panel, inner, buf),
            }
        }
    }

    /// Grouped bars: one group per category, one bar per series.
    fn render_bars(&self, panel: &Panel, labels: &[String], area: Rect, buf: &mut Buffer) {
        let per_group = panel.series.len().max(1) as u16;
        let groups = labels.len().max(1) as u16;
        let group_gap = 1u16;
        let group_width = (area.width / groups).saturating_sub(group_gap);
        let bar_width = (group_width / per_group).max(1);

        let mut chart = BarChart::default()
            .bar_width(bar_width)
            .bar_gap(0)
            .group_gap(group_gap)
            .value_style(Style::default().fg(Color::Black).add_modifier(Modifier::BOLD))
            .label_style(Style::default().fg(self.text_fg));

        for (i, label) in labels.iter().enumerate() {
            let bars: Vec<Bar> = panel
                .series
                .iter()
                .enumerate()
                .filter_map(|(s, series)| {
                    series
                        .points
                        .iter()
                        .find(|p| p.x.round() as usize == i)
                        .map(|p| {
                            Bar::default()
                                .value((p.y * 100.0).round() as u64)
                                .text_value(format_float(p.y))
                                .style(Style::default().fg(series_color(s)))
                        })
                })
                .collect();
            chart = chart.data(BarGroup::default().label(Line::from(label.clone())).bars(&bars));
        }
        chart.render(area, buf);
    }

    fn render_plot(&self, data: &CartesianData, panel: &Panel, area: Rect, buf: &mut Buffer) {
        let (graph_type, marker) = match data.kind {
            ChartKind::Scatter => (GraphType::Scatter, symbols::Marker::Dot),
            ChartKind::Bar => (GraphType::Bar, symbols::Marker::HalfBlock),
            _ => (GraphType::Line, symbols::Marker::Braille),
        };

        let points: Vec<(String, Vec<(f64, f64)>)> = panel
            .series
            .iter()
            .map(|s| (s.name.clone(), s.points.iter().map(|p| (p.x, p.y)).collect()))
            .collect();
        let datasets: Vec<Dataset> = points
            .iter()
            .enumerate()
            .map(|(i, (name, pts))| {
                Dataset::default()
                    .name(name.as_str())
                    .marker(marker)
                    .graph_type(graph_type)
                    .style(Style::default().fg(series_color(i)))
                    .data(pts)
            })
            .collect();

        let label_style = Style::default().fg(self.text_fg);
        let (x_min, x_max, x_labels) = match &data.x_axis {
            XAxis::Categories(labels) if labels.len() > 1 => {
                let last = (labels.len() - 1) as f64;
                let shown: Vec<Span> = if labels.len() <= MAX_CATEGORY_LABELS {
                    labels
                        .iter()
                        .map(|l| Span::styled(l.clone(), label_style))
                        .collect()
                } else {
                    [0.0, last]
                        .iter()
                        .map(|x| Span::styled(data.x_label_at(*x), label_style))
                        .collect()
                };
                (0.0, last, shown)
            }
            XAxis::Categories(labels) => (
                -0.5,
                0.5,
                vec![Span::styled(
                    labels.first().cloned().unwrap_or_default(),
                    label_style,
                )],
            ),
            XAxis::Numeric { .. } => {
                let (lo, hi) = data.x_bounds();
                let labels = [lo, (lo + hi) / 2.0, hi]
                    .iter()
                    .map(|v| Span::styled(format_axis_label(*v), label_style))
                    .collect();
                (lo, hi, labels)
            }
        };
        let (y_min, y_max) = data.y_bounds();
        let y_labels: Vec<Span> = [y_min, (y_min + y_max) / 2.0, y_max]
            .iter()
            .map(|v| Span::styled(format_axis_label(*v), label_style))
            .collect();

        let x_axis = Axis::default()
            .title(data.x_label.as_str())
            .bounds([x_min, x_max])
            .style(Style::default().fg(self.text_fg))
            .labels(x_labels);
        let y_axis = Axis::default()
            .title(data.y_label.as_str())
            .bounds([y_min, y_max])
            .style(Style::default().fg(self.text_fg))
            .labels(y_labels);

        let legend = if datasets.len() > 1 {
            Some(LegendPosition::TopRight)
        } else {
            None
        };
        Chart::new(datasets)
            .x_axis(x_axis)
            .y_axis(y_axis)
            .legend_position(legend)
            .render(area, buf);
    }

    fn render_pie(&self, slices: &[Slice], area: Rect, buf: &mut Buffer) {
        let total: f64 = slices.iter().map(|s| s.value).sum();
        if slices.is_empty() || total <= 0.0 {
            self.render_placeholder("No data", area, buf);
            return;
        }
        let label_width = slices
            .iter()
            .map(|s| s.label.chars().count())
            .max()
            .unwrap_or(0);
        let lines: Vec<Line> = slices
            .iter()
            .enumerate()
            .map(|(i, s)| {
                share_line(
                    &pad(&s.label, label_width),
                    s.value,
                    total,
                    area.width,
                    series_color(i),
                )
            })
            .collect();
        Paragraph::new(lines).render(area, buf);
    }

    fn render_sunburst(&self, root: &SunburstNode, area: Rect, buf: &mut Buffer) {
        if root.children.is_empty() || root.value <= 0.0 {
            self.render_placeholder("No data", area, buf);
            return;
        }
        let mut rows: Vec<(usize, usize, &SunburstNode)> = Vec::new();
        for (i, child) in root.children.iter().enumerate() {
            flatten(child, 0, i, &mut rows);
        }
        let label_width = rows
            .iter()
            .map(|(depth, _, node)| depth * 2 + node.label.chars().count())
            .max()
            .unwrap_or(0);
        let lines: Vec<Line> = rows
            .iter()
            .map(|(depth, branch, node)| {
                let label = format!("{}{}", "  ".repeat(*depth), node.label);
                share_line(
                    &pad(&label, label_width),
                    node.value,
                    root.value,
                    area.width,
                    series_color(*branch),
                )
            })
            .collect();
        Paragraph::new(lines).render(area, buf);
    }

    fn render_placeholder(&self, text: &str, area: Rect, buf: &mut Buffer) {
        Paragraph::new(text)
            .style(Style::default().fg(self.dimmed_fg))
            .centered()
            .render(area, buf);
    }
}

impl Widget for ChartView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.border_fg))
            .title(self.title.as_str());
        let inner = block.inner(area);
        block.render(area, buf);

        match self.data {
            Ok(ChartData::Cartesian(data)) => self.render_cartesian(data, inner, buf),
            Ok(ChartData::Pie { slices, .. }) => self.render_pie(slices, inner, buf),
            Ok(ChartData::Sunburst { root, .. }) => self.render_sunburst(root, inner, buf),
            Err(e) => Paragraph::new(user_message(e))
                .style(Style::default().fg(self.error_fg))
                .wrap(Wrap { trim: true })
                .render(inner, buf),
        }
    }
}

/// Depth-first rows of `(depth, top-level branch, node)`.
fn flatten<'a>(
    node: &'a SunburstNode,
    depth: usize,
    branch: usize,
    out: &mut Vec<(usize, usize, &'a SunburstNode)>,
) {
    out.push((depth, branch, node));
    for child in &node.children {
        flatten(child, depth + 1, branch, out);
    }
}

fn pad(s: &str, width: usize) -> String {
    format!("{:<width$}", s, width = width)
}

/// `label ████░░░░  42.0%  value`
fn share_line(label: &str, value: f64, total: f64, width: u16, color: Color) -> Line<'static> {
    let share = if total > 0.0 { value / total } else { 0.0 };
    let suffix = format!(" {:>5.1}%  {}", share * 100.0, format_float(value));
    let used = label.chars().count() + 1 + suffix.chars().count();
    let bar_width = (width as usize).saturating_sub(used).max(1);
    let filled = ((share * bar_width as f64).round() as usize).min(bar_width);
    Line::from(vec![
        Span::raw(format!("{} ", label)),
        Span::styled("█".repeat(filled), Style::default().fg(color)),
        Span::styled(
            "░".repeat(bar_width - filled),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(suffix),
    ])
}

fn format_axis_label(v: f64) -> String {
    if v.abs() >= 1e6 || (v.abs() < 1e-2 && v != 0.0) {
        format!("{:.2e}", v)
    } else {
        format!("{:.2}", v)
    }
}
