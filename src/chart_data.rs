//! Project a result table through a chart specification into drawable data.
//!
//! Shared by the terminal chart widget and the SVG renderer so both draw the same thing.

use crate::chart_spec::{Channel, ChartKind, ChartSpec};
use crate::dataset::ResultTable;
use crate::error::Result;

/// Label used for null keys in categories, slices and sunburst nodes.
pub const NULL_LABEL: &str = "(null)";

#[derive(Debug, Clone, PartialEq)]
pub enum XAxis {
    /// Point `x` is the index into these labels.
    Categories(Vec<String>),
    Numeric { min: f64, max: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<ChartPoint>,
}

/// One facet of a cartesian chart. Unfaceted charts have a single untitled panel.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: Option<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartesianData {
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    pub x_axis: XAxis,
    pub panels: Vec<Panel>,
}

impl CartesianData {
    /// `(min, max)` of y over all panels, widened to include 0 for bars.
    pub fn y_bounds(&self) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for p in self.points() {
            lo = lo.min(p.y);
            hi = hi.max(p.y);
        }
        if !lo.is_finite() || !hi.is_finite() {
            return (0.0, 1.0);
        }
        if self.kind == ChartKind::Bar {
            lo = lo.min(0.0);
            hi = hi.max(0.0);
        }
        widen(lo, hi)
    }

    pub fn x_bounds(&self) -> (f64, f64) {
        match &self.x_axis {
            XAxis::Categories(labels) => (-0.5, labels.len().max(1) as f64 - 0.5),
            XAxis::Numeric { min, max } => widen(*min, *max),
        }
    }

    pub fn points(&self) -> impl Iterator<Item = &ChartPoint> {
        self.panels
            .iter()
            .flat_map(|p| p.series.iter())
            .flat_map(|s| s.points.iter())
    }

    /// Label for an x position: the category name, or the number itself.
    pub fn x_label_at(&self, x: f64) -> String {
        match &self.x_axis {
            XAxis::Categories(labels) => {
                let i = x.round();
                if (x - i).abs() > 1e-6 || i < 0.0 {
                    return String::new();
                }
                labels.get(i as usize).cloned().unwrap_or_default()
            }
            XAxis::Numeric { .. } => crate::dataset::format_float(x),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub label: String,
    pub value: f64,
}

/// Node of a sunburst hierarchy. `value` is the number of rows under the node.
#[derive(Debug, Clone, PartialEq)]
pub struct SunburstNode {
    pub label: String,
    pub value: f64,
    pub children: Vec<SunburstNode>,
}

impl SunburstNode {
    fn child_mut(&mut self, label: &str) -> &mut SunburstNode {
        let pos = match self.children.iter().position(|c| c.label == label) {
            Some(pos) => pos,
            None => {
                self.children.push(SunburstNode {
                    label: label.to_string(),
                    value: 0.0,
                    children: Vec::new(),
                });
                self.children.len() - 1
            }
        };
        &mut self.children[pos]
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Cartesian(CartesianData),
    Pie { title: String, slices: Vec<Slice> },
    Sunburst { title: String, root: SunburstNode },
}

impl ChartData {
    /// Validate `spec` against `table` and gather the points, slices or tree it describes.
    pub fn project(spec: &ChartSpec, table: &ResultTable) -> Result<Self> {
        spec.validate(table)?;
        let channels = &spec.channels;
        match spec.kind {
            ChartKind::Line | ChartKind::Bar | ChartKind::Scatter => {
                // validate() guarantees x and y are mapped
                let x = channels.get(Channel::X).unwrap_or_default();
                let y = channels.get(Channel::Y).unwrap_or_default();
                project_cartesian(spec, table, x, y).map(ChartData::Cartesian)
            }
            ChartKind::Pie => {
                let names = channels.get(Channel::Names).unwrap_or_default();
                let values = channels.get(Channel::Values).unwrap_or_default();
                Ok(ChartData::Pie {
                    title: spec.title(),
                    slices: project_pie(table, names, values)?,
                })
            }
            ChartKind::Sunburst => Ok(ChartData::Sunburst {
                title: spec.title(),
                root: project_sunburst(table, &channels.path)?,
            }),
        }
    }
}

fn project_cartesian(
    spec: &ChartSpec,
    table: &ResultTable,
    x: &str,
    y: &str,
) -> Result<CartesianData> {
    let channels = &spec.channels;
    let numeric_x = spec.kind != ChartKind::Bar && table.kind(x)?.is_numeric();

    let ys = table.f64_values(y)?;
    let x_numbers = if numeric_x {
        Some(table.f64_values(x)?)
    } else {
        None
    };
    let x_text = labels(table, x)?;
    let colors = optional_labels(table, channels.get(Channel::Color))?;
    let facets = match spec.kind {
        ChartKind::Bar => optional_labels(table, channels.get(Channel::Facet))?,
        _ => None,
    };
    let sizes = match (spec.kind, channels.get(Channel::Size)) {
        (ChartKind::Scatter, Some(size)) => Some(table.f64_values(size)?),
        _ => None,
    };

    let mut categories: Vec<String> = Vec::new();
    let mut panels: Vec<Panel> = Vec::new();
    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);

    for row in 0..table.height() {
        let Some(yv) = ys[row].filter(|v| v.is_finite()) else {
            continue;
        };
        let xv = match &x_numbers {
            Some(numbers) => match numbers[row].filter(|v| v.is_finite()) {
                Some(v) => v,
                None => continue,
            },
            None => index_of(&mut categories, &x_text[row]) as f64,
        };
        x_min = x_min.min(xv);
        x_max = x_max.max(xv);

        let panel_title = facets.as_ref().map(|f| f[row].clone());
        let panel = match panels.iter().position(|p| p.title == panel_title) {
            Some(i) => &mut panels[i],
            None => {
                panels.push(Panel {
                    title: panel_title,
                    series: Vec::new(),
                });
                let last = panels.len() - 1;
                &mut panels[last]
            }
        };

        let series_name = match &colors {
            Some(c) => c[row].clone(),
            None => y.to_string(),
        };
        let series = match panel.series.iter().position(|s| s.name == series_name) {
            Some(i) => &mut panel.series[i],
            None => {
                panel.series.push(ChartSeries {
                    name: series_name,
                    points: Vec::new(),
                });
                let last = panel.series.len() - 1;
                &mut panel.series[last]
            }
        };
        series.points.push(ChartPoint {
            x: xv,
            y: yv,
            size: sizes.as_ref().and_then(|s| s[row]).filter(|v| v.is_finite()),
        });
    }

    if panels.is_empty() {
        panels.push(Panel {
            title: None,
            series: Vec::new(),
        });
    }

    let x_axis = if numeric_x {
        if x_min.is_finite() {
            XAxis::Numeric {
                min: x_min,
                max: x_max,
            }
        } else {
            XAxis::Numeric { min: 0.0, max: 1.0 }
        }
    } else {
        XAxis::Categories(categories)
    };

    Ok(CartesianData {
        kind: spec.kind,
        x_label: x.to_string(),
        y_label: y.to_string(),
        x_axis,
        panels,
    })
}

/// Slices in first-appearance order; repeated labels are summed.
/// Null, non-finite and negative values are skipped.
fn project_pie(table: &ResultTable, names: &str, values: &str) -> Result<Vec<Slice>> {
    let labels = labels(table, names)?;
    let values = table.f64_values(values)?;
    let mut slices: Vec<Slice> = Vec::new();
    for (label, value) in labels.into_iter().zip(values) {
        let Some(v) = value.filter(|v| v.is_finite() && *v >= 0.0) else {
            continue;
        };
        match slices.iter_mut().find(|s| s.label == label) {
            Some(slice) => slice.value += v,
            None => slices.push(Slice { label, value: v }),
        }
    }
    Ok(slices)
}

/// Each row adds one to every node along its path.
fn project_sunburst(table: &ResultTable, path: &[String]) -> Result<SunburstNode> {
    let levels: Vec<Vec<String>> = path
        .iter()
        .map(|c| labels(table, c))
        .collect::<Result<_>>()?;
    let mut root = SunburstNode {
        label: String::new(),
        value: 0.0,
        children: Vec::new(),
    };
    for row in 0..table.height() {
        root.value += 1.0;
        let mut node = &mut root;
        for level in &levels {
            node = node.child_mut(&level[row]);
            node.value += 1.0;
        }
    }
    Ok(root)
}

fn labels(table: &ResultTable, column: &str) -> Result<Vec<String>> {
    let nulls = table.column(column)?.as_materialized_series().is_null();
    let mut text = table.text_values(column)?;
    for (value, is_null) in text.iter_mut().zip(nulls.into_iter()) {
        if is_null.unwrap_or(false) {
            *value = NULL_LABEL.to_string();
        }
    }
    Ok(text)
}

fn optional_labels(table: &ResultTable, column: Option<&str>) -> Result<Option<Vec<String>>> {
    column.map(|c| labels(table, c)).transpose()
}

fn index_of(categories: &mut Vec<String>, label: &str) -> usize {
    match categories.iter().position(|c| c == label) {
        Some(i) => i,
        None => {
            categories.push(label.to_string());
            categories.len() - 1
        }
    }
}

/// Ensure a non-empty range with a little headroom.
fn widen(lo: f64, hi: f64) -> (f64, f64) {
    if (hi - lo).abs() < f64::EPSILON {
        let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
        (lo - pad, hi + pad)
    } else {
        let pad = (hi - lo) * 0.05;
        (if lo == 0.0 { 0.0 } else { lo - pad }, hi + pad)
    }
}
