// src/process/sample.rs

use tracing::info;

use crate::{error::Result, process::load::LazyTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleStats {
    pub total_rows: usize,
    pub kept_rows: usize,
}

/// `floor(row_count * percentage)`, clamped to `row_count`.
pub fn keep_rows(row_count: usize, percentage: f64) -> usize {
    if percentage >= 1.0 {
        return row_count;
    }
    if percentage.is_nan() || percentage <= 0.0 {
        return 0;
    }
    ((row_count as f64 * percentage).floor() as usize).min(row_count)
}

/// Truncate `table` to the leading `percentage` of its records, in file order.
///
/// A percentage of 1.0 returns the table untouched without counting rows,
/// so stats are only present when a count actually happened.
pub fn sample(table: &LazyTable, percentage: f64) -> Result<(LazyTable, Option<SampleStats>)> {
    if percentage >= 1.0 {
        return Ok((table.clone(), None));
    }

    let total_rows = table.row_count()?;
    let kept_rows = keep_rows(total_rows, percentage);
    info!(
        table = table.name(),
        total_rows, kept_rows, percentage, "truncating to leading rows"
    );

    Ok((
        table.limit(kept_rows),
        Some(SampleStats {
            total_rows,
            kept_rows,
        }),
    ))
}
