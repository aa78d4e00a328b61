//! Splitting an item set across workers.

use crate::error::{Error, Result};
use std::ops::Range;

/// Split `total` items into `workers` contiguous, non-overlapping index
/// ranges that together cover every item.
///
/// Each worker gets `total / workers` items; the last range absorbs the
/// remainder so no item is left unassigned. Zero items is a valid,
/// trivially complete workload and yields `workers` empty ranges.
pub fn partition(total: usize, workers: usize) -> Result<Vec<Range<usize>>> {
    if workers == 0 {
        return Err(Error::InvalidConfiguration(
            "cannot partition across zero workers".to_string(),
        ));
    }

    let per_worker = total / workers;
    let mut slices = Vec::with_capacity(workers);

    for w in 0..workers {
        let start = w * per_worker;
        let end = if w == workers - 1 {
            total
        } else {
            start + per_worker
        };
        slices.push(start..end);
    }

    Ok(slices)
}
