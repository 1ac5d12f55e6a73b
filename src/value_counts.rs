//! Frequency of each distinct value in one column, most frequent first.

use log::debug;
use polars::prelude::*;

use crate::chart_spec::{ChannelMapping, ChartKind, ChartSpec};
use crate::dataset::{Dataset, ResultTable};
use crate::error::Result;

pub const COUNT_COLUMN: &str = "count";

/// Value counts of one column plus the names needed to chart them.
#[derive(Debug, Clone)]
pub struct ValueCounts {
    pub table: ResultTable,
    /// The counted column, first in `table`.
    pub column: String,
    /// The frequency column, second in `table`.
    pub count_column: String,
}

impl ValueCounts {
    /// Bar, line and pie views of the counts, in that order.
    pub fn charts(&self) -> [ChartSpec; 3] {
        let xy = ChannelMapping {
            x: Some(self.column.clone()),
            y: Some(self.count_column.clone()),
            ..Default::default()
        };
        let pie = ChannelMapping {
            names: Some(self.column.clone()),
            values: Some(self.count_column.clone()),
            ..Default::default()
        };
        [
            ChartSpec::new(ChartKind::Bar, xy.clone()),
            ChartSpec::new(ChartKind::Line, xy),
            ChartSpec::new(ChartKind::Pie, pie),
        ]
    }

    pub fn len(&self) -> usize {
        self.table.height()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Name of the frequency column, avoiding a clash with the counted column.
pub fn count_column_for(column: &str) -> String {
    if column == COUNT_COLUMN {
        format!("{}_{}", COUNT_COLUMN, 1)
    } else {
        COUNT_COLUMN.to_string()
    }
}

/// Count occurrences of each distinct value of `column`, keep the `top_k` most
/// frequent. Ties keep the order in which values first appear. Nulls are counted
/// as their own value. `top_k` below 1 is treated as 1.
pub fn value_counts(ds: &Dataset, column: &str, top_k: usize) -> Result<ValueCounts> {
    ds.column(column)?;
    let top_k = top_k.clamp(1, IdxSize::MAX as usize) as IdxSize;
    let count_column = count_column_for(column);

    let df = ds
        .frame()
        .clone()
        .lazy()
        .group_by_stable([col(column)])
        .agg([len().alias(count_column.as_str())])
        .sort_by_exprs(
            [col(count_column.as_str())],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .limit(top_k)
        .collect()?;

    debug!(
        "value counts for '{}': {} distinct values shown (top_k={})",
        column,
        df.height(),
        top_k
    );

    Ok(ValueCounts {
        table: Dataset::new(df),
        column: column.to_string(),
        count_column,
    })
}
