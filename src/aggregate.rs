//! Group-by aggregation: partition by one or more columns and reduce a target column.

use std::fmt;
use std::str::FromStr;

use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, ResultTable};
use crate::error::{PortalError, Result};

/// Default name of the reduced column.
pub const DEFAULT_RESULT_COLUMN: &str = "newcol";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggOperator {
    #[default]
    Sum,
    Max,
    Min,
    Mean,
    Median,
    Count,
}

impl AggOperator {
    pub const ALL: [Self; 6] = [
        Self::Sum,
        Self::Max,
        Self::Min,
        Self::Mean,
        Self::Median,
        Self::Count,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Max => "max",
            Self::Min => "min",
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Count => "count",
        }
    }

    /// Every operator except `Count` needs a numeric target.
    pub fn requires_numeric(self) -> bool {
        !matches!(self, Self::Count)
    }

    fn apply(self, target: Expr) -> Expr {
        match self {
            Self::Sum => target.sum(),
            Self::Max => target.max(),
            Self::Min => target.min(),
            Self::Mean => target.mean(),
            Self::Median => target.median(),
            // partition size, nulls included
            Self::Count => target.len(),
        }
    }
}

impl fmt::Display for AggOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggOperator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == lower)
            .ok_or_else(|| {
                format!(
                    "Unknown operator '{}'. Expected one of: sum, max, min, mean, median, count",
                    s
                )
            })
    }
}

/// What to group by, which column to reduce, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSpec {
    pub group_by: Vec<String>,
    pub target: String,
    pub operator: AggOperator,
}

impl AggregationSpec {
    pub fn new<S: Into<String>>(group_by: Vec<String>, target: S, operator: AggOperator) -> Self {
        Self {
            group_by,
            target: target.into(),
            operator,
        }
    }

    /// Grouping columns with repeats removed, first occurrence kept.
    pub fn grouping_columns(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.group_by.len());
        for name in &self.group_by {
            if !seen.contains(&name.as_str()) {
                seen.push(name);
            }
        }
        seen
    }

    /// Check column references and operator/type compatibility before computing.
    pub fn validate(&self, ds: &Dataset) -> Result<()> {
        ds.require_columns(self.grouping_columns())?;
        let kind = ds.kind(&self.target)?;
        if self.operator.requires_numeric() && !kind.is_numeric() {
            return Err(PortalError::TypeAggregationMismatch {
                column: self.target.clone(),
                operator: self.operator,
                dtype: ds.dtype(&self.target)?.to_string(),
            });
        }
        Ok(())
    }
}

/// Partition `ds` by the grouping columns and reduce the target within each partition.
///
/// Returns `Ok(None)` when no grouping column is selected. Otherwise the result has
/// one row per distinct key combination, in first-appearance order, with the
/// grouping columns followed by `result_column`. Null keys form their own group.
pub fn group_and_aggregate(
    ds: &Dataset,
    spec: &AggregationSpec,
    result_column: &str,
) -> Result<Option<ResultTable>> {
    if spec.group_by.is_empty() {
        return Ok(None);
    }
    spec.validate(ds)?;

    let keys: Vec<Expr> = spec.grouping_columns().into_iter().map(col).collect();
    let reduced = spec
        .operator
        .apply(col(spec.target.as_str()))
        .alias(result_column);

    let df = ds
        .frame()
        .clone()
        .lazy()
        .group_by_stable(keys)
        .agg([reduced])
        .collect()
        .map_err(|e| {
            if is_duplicate(&e) {
                e.context(
                    format!(
                        "result column '{}' repeats a grouping column; pick another result name",
                        result_column
                    )
                    .into(),
                )
            } else {
                e
            }
        })?;

    debug!(
        "group by {:?}: {}({}) -> {} groups",
        spec.group_by,
        spec.operator,
        spec.target,
        df.height()
    );
    Ok(Some(Dataset::new(df)))
}

fn is_duplicate(err: &PolarsError) -> bool {
    match err {
        PolarsError::Duplicate(_) => true,
        PolarsError::Context { error, .. } => is_duplicate(error),
        _ => false,
    }
}
