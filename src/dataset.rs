//! In-memory tables: the loaded Dataset and the Result Tables derived from it.

use polars::prelude::*;

use crate::error::{PortalError, Result};

/// Coarse column type used for display and operator checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    String,
    Boolean,
    Temporal,
    Other,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Self::Integer,
            DataType::Float32 | DataType::Float64 => Self::Float,
            DataType::String => Self::String,
            DataType::Boolean => Self::Boolean,
            DataType::Date | DataType::Datetime(_, _) | DataType::Time => Self::Temporal,
            _ => Self::Other,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// A table of named, typed columns sharing one row count.
///
/// Operations never mutate a Dataset; they return new tables.
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
}

/// Tables produced by value counts and group-by share the Dataset shape.
pub type ResultTable = Dataset;

impl Dataset {
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }

    pub fn empty() -> Self {
        Self::new(DataFrame::empty())
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_index(name).is_some()
    }

    /// Look up a column by name, failing with `ColumnNotFound` when absent.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.df
            .column(name)
            .map_err(|_| PortalError::ColumnNotFound(name.to_string()))
    }

    /// Validate every name before any computation starts.
    pub fn require_columns<'a, I>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            if !self.has_column(name) {
                return Err(PortalError::ColumnNotFound(name.to_string()));
            }
        }
        Ok(())
    }

    pub fn dtype(&self, name: &str) -> Result<&DataType> {
        self.column(name).map(|c| c.dtype())
    }

    pub fn kind(&self, name: &str) -> Result<ColumnKind> {
        self.dtype(name).map(ColumnKind::of)
    }

    /// Column names paired with their types, in column order.
    pub fn dtypes(&self) -> Vec<(String, DataType)> {
        self.df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.dtype().clone()))
            .collect()
    }

    /// Cell at (row, column) as display text; nulls render as an empty string.
    pub fn cell_text(&self, row: usize, name: &str) -> Result<String> {
        let value = self.column(name)?.get(row)?;
        Ok(format_value(&value))
    }

    /// Values of a column cast to f64 (nulls and unconvertible values become None).
    pub fn f64_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self.column(name)?.as_materialized_series();
        let cast = series.cast(&DataType::Float64)?;
        Ok(cast.f64()?.into_iter().collect())
    }

    /// Values of a column as display text, in row order.
    pub fn text_values(&self, name: &str) -> Result<Vec<String>> {
        let column = self.column(name)?;
        (0..column.len())
            .map(|i| Ok(format_value(&column.get(i)?)))
            .collect()
    }
}

/// Display text for a single value.
pub fn format_value(value: &AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Float64(v) => format_float(*v),
        AnyValue::Float32(v) => format_float(*v as f64),
        other => other.str_value().to_string(),
    }
}

/// Compact float text: whole numbers keep one decimal, others up to 4 decimals.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        (if v > 0.0 { "inf" } else { "-inf" }).to_string()
    } else if v == v.trunc() && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        let s = format!("{:.4}", v);
        let s = s.trim_end_matches('0');
        s.trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            df!(
                "city" => &["A", "A", "B"],
                "sales" => &[10i64, 20, 30],
                "ratio" => &[Some(0.5f64), None, Some(1.25)],
            )
            .unwrap(),
        )
    }

    #[test]
    fn column_lookup() {
        let ds = sample();
        assert!(ds.column("city").is_ok());
        match ds.column("region") {
            Err(PortalError::ColumnNotFound(name)) => assert_eq!(name, "region"),
            other => panic!("expected ColumnNotFound, got {:?}", other),
        }
    }

    #[test]
    fn require_columns_reports_first_missing() {
        let ds = sample();
        assert!(ds.require_columns(["city", "sales"]).is_ok());
        let err = ds.require_columns(["city", "nope", "also"]).unwrap_err();
        assert!(matches!(err, PortalError::ColumnNotFound(ref n) if n == "nope"));
    }

    #[test]
    fn kinds() {
        let ds = sample();
        assert_eq!(ds.kind("city").unwrap(), ColumnKind::String);
        assert_eq!(ds.kind("sales").unwrap(), ColumnKind::Integer);
        assert_eq!(ds.kind("ratio").unwrap(), ColumnKind::Float);
        assert!(ds.kind("sales").unwrap().is_numeric());
        assert!(!ds.kind("city").unwrap().is_numeric());
    }

    #[test]
    fn cell_text_formats_values() {
        let ds = sample();
        assert_eq!(ds.cell_text(0, "city").unwrap(), "A");
        assert_eq!(ds.cell_text(2, "sales").unwrap(), "30");
        assert_eq!(ds.cell_text(1, "ratio").unwrap(), "");
        assert_eq!(ds.cell_text(2, "ratio").unwrap(), "1.25");
    }

    #[test]
    fn f64_values_keep_nulls() {
        let ds = sample();
        assert_eq!(
            ds.f64_values("ratio").unwrap(),
            vec![Some(0.5), None, Some(1.25)]
        );
        assert_eq!(
            ds.f64_values("sales").unwrap(),
            vec![Some(10.0), Some(20.0), Some(30.0)]
        );
    }

    #[test]
    fn float_formatting() {
        assert_eq!(format_float(15.0), "15.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(1.0 / 3.0), "0.3333");
        assert_eq!(format_float(f64::NAN), "NaN");
    }
}
