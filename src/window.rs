//! First/last row windows over a dataset.

use crate::dataset::Dataset;

/// Clamp a requested window size to `[1, row_count]` (0 for an empty dataset).
pub fn clamp_rows(n: usize, row_count: usize) -> usize {
    if row_count == 0 {
        0
    } else {
        n.clamp(1, row_count)
    }
}

/// Rows `[0, n)`.
pub fn head(ds: &Dataset, n: usize) -> Dataset {
    let n = clamp_rows(n, ds.height());
    Dataset::new(ds.frame().head(Some(n)))
}

/// The last `n` rows, in original order.
pub fn tail(ds: &Dataset, n: usize) -> Dataset {
    let n = clamp_rows(n, ds.height());
    Dataset::new(ds.frame().tail(Some(n)))
}
