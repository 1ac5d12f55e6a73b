//! Descriptive summary: shape, per-column statistics for numeric columns, types and names.

use polars::prelude::*;

use crate::dataset::{ColumnKind, Dataset};

/// Row labels of the statistics table, in display order.
pub const STATISTIC_LABELS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub name: String,
    /// Non-null, non-NaN values.
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (N-1 denominator).
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl NumericSummary {
    /// Statistics in `STATISTIC_LABELS` order.
    pub fn values(&self) -> [f64; 8] {
        [
            self.count as f64,
            self.mean,
            self.std,
            self.min,
            self.q25,
            self.median,
            self.q75,
            self.max,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: DataType,
    pub kind: ColumnKind,
    pub null_count: usize,
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub row_count: usize,
    pub col_count: usize,
    /// Numeric columns only, in column order.
    pub column_stats: Vec<NumericSummary>,
    /// Every column, in column order.
    pub dtypes: Vec<ColumnInfo>,
    pub column_names: Vec<String>,
}

/// Summarize a dataset. Never fails: an empty dataset gives zero counts and NaN statistics.
pub fn summarize(ds: &Dataset) -> Summary {
    let df = ds.frame();
    let mut column_stats = Vec::new();
    let mut dtypes = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let name = column.name().to_string();
        let kind = ColumnKind::of(column.dtype());
        dtypes.push(ColumnInfo {
            name: name.clone(),
            dtype: column.dtype().clone(),
            kind,
            null_count: column.null_count(),
        });
        if kind.is_numeric() {
            column_stats.push(numeric_summary(name, column.as_materialized_series()));
        }
    }

    Summary {
        row_count: df.height(),
        col_count: df.width(),
        column_stats,
        dtypes,
        column_names: ds.column_names(),
    }
}

impl Summary {
    /// Statistics as a table: a `statistic` label column plus one f64 column per numeric column.
    pub fn describe_frame(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.column_stats.len() + 1);
        columns.push(Series::new("statistic".into(), STATISTIC_LABELS.to_vec()).into());
        for stats in &self.column_stats {
            columns.push(Series::new(stats.name.as_str().into(), stats.values().to_vec()).into());
        }
        DataFrame::new(columns)
    }

    /// Column types as a two-column table (`column`, `dtype`).
    pub fn dtypes_frame(&self) -> PolarsResult<DataFrame> {
        let names: Vec<&str> = self.dtypes.iter().map(|c| c.name.as_str()).collect();
        let types: Vec<String> = self.dtypes.iter().map(|c| c.dtype.to_string()).collect();
        let nulls: Vec<u64> = self.dtypes.iter().map(|c| c.null_count as u64).collect();
        df!(
            "column" => names,
            "dtype" => types,
            "nulls" => nulls,
        )
    }
}

/// A numeric series cast to f64 with nulls and NaNs removed.
fn clean_values(series: &Series) -> Series {
    let empty = || Series::new_empty(series.name().clone(), &DataType::Float64);
    let Ok(cast) = series.cast(&DataType::Float64) else {
        return empty();
    };
    let cast = cast.drop_nulls();
    let Ok(not_nan) = cast.is_not_nan() else {
        return empty();
    };
    cast.filter(&not_nan).unwrap_or_else(|_| empty())
}

fn numeric_summary(name: String, series: &Series) -> NumericSummary {
    let values = clean_values(series);
    let n = values.len();
    let mean = values.mean().unwrap_or(f64::NAN);
    // sample std (ddof=1) is undefined for a single value
    let std = if n < 2 {
        f64::NAN
    } else {
        values.std(1).unwrap_or(f64::NAN)
    };

    let mut sorted: Vec<f64> = values
        .f64()
        .map(|ca| ca.iter().flatten().collect())
        .unwrap_or_default();
    sorted.sort_by(|a, b| a.total_cmp(b));

    NumericSummary {
        name,
        count: n,
        mean,
        std,
        min: sorted.first().copied().unwrap_or(f64::NAN),
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted.last().copied().unwrap_or(f64::NAN),
    }
}

/// Quantile of sorted values by linear interpolation between closest ranks.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}
