//! Row and shot-number selectors for the read operations.

use super::error::ReadError;

/// Which rows of a dataset a read should cover.
///
/// Shot numbers select by the recorded shot-number column; rows select
/// by dataset row index directly. When a request carries both, shot
/// numbers win.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Every row of the driving dataset.
    All,
    /// Conditioned shot numbers, sorted ascending without duplicates.
    Shots(Vec<u32>),
    /// Conditioned row indices, sorted ascending without duplicates.
    Rows(Vec<usize>),
}

impl Selector {
    /// Build a selector from the optional request fields.
    pub fn from_parts(
        shots: Option<&[i64]>,
        rows: Option<&[usize]>,
    ) -> Result<Self, ReadError> {
        match (shots, rows) {
            (Some(shots), _) => condition_shots(shots).map(Selector::Shots),
            (None, Some(rows)) => Ok(Selector::Rows(condition_rows(rows))),
            (None, None) => Ok(Selector::All),
        }
    }
}

/// Condition requested shot numbers: drop values below 1 or beyond the
/// recordable range, deduplicate, sort ascending. An empty result is an
/// error since no read can come of it.
pub fn condition_shots(shots: &[i64]) -> Result<Vec<u32>, ReadError> {
    let mut out: Vec<u32> = shots
        .iter()
        .filter_map(|&s| u32::try_from(s).ok())
        .filter(|&s| s >= 1)
        .collect();
    out.sort_unstable();
    out.dedup();
    if out.is_empty() {
        return Err(ReadError::EmptyShotSelection);
    }
    Ok(out)
}

/// Deduplicate and sort requested row indices. Range checking happens
/// against the driving dataset at read time.
pub fn condition_rows(rows: &[usize]) -> Vec<usize> {
    let mut out = rows.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}
