//! Shot-number indexing: relating recorded shot numbers to dataset rows.
//!
//! Every correlated read goes through a [`ShotIndex`] per dataset. The
//! index holds the dataset's shot-number column (for one configuration
//! block) and answers "which row holds shot N". Data runs are almost
//! always recorded with sequential shot numbers, so that case is
//! detected and answered arithmetically; anything else falls back to a
//! hash map.

use fxhash::FxHashMap;

use super::error::ReadError;

#[derive(Debug)]
enum Relation {
    /// `shot_column[i] = first + i`; rows computed without a map.
    Sequential { first: u32, len: usize },
    Mapped(FxHashMap<u32, usize>),
}

/// Index over one dataset's shot-number column. Rows are relative to
/// the column handed in, so a caller indexing one configuration block
/// passes the block's column alone.
#[derive(Debug)]
pub struct ShotIndex {
    relation: Relation,
    duplicates: Vec<u32>,
}

impl ShotIndex {
    pub fn new(shot_column: &[u32]) -> Self {
        let len = shot_column.len();
        let sequential = match shot_column.first() {
            Some(&first) => shot_column
                .iter()
                .enumerate()
                .all(|(i, &s)| s == first + i as u32),
            None => false,
        };
        let mut duplicates = Vec::new();
        let relation = if sequential {
            Relation::Sequential {
                first: shot_column[0],
                len,
            }
        } else {
            let mut map = FxHashMap::default();
            map.reserve(len);
            for (i, &shot) in shot_column.iter().enumerate() {
                // First occurrence wins on duplicate shot numbers.
                if map.contains_key(&shot) {
                    if !duplicates.contains(&shot) {
                        duplicates.push(shot);
                    }
                } else {
                    map.insert(shot, i);
                }
            }
            Relation::Mapped(map)
        };
        Self {
            relation,
            duplicates,
        }
    }

    /// Shot numbers that appeared more than once in the column. The
    /// caller decides how to report them.
    pub fn duplicates(&self) -> &[u32] {
        &self.duplicates
    }

    /// Row holding `shot`, if recorded.
    pub fn row_of(&self, shot: u32) -> Option<usize> {
        match &self.relation {
            Relation::Sequential { first, len } => {
                let i = shot.checked_sub(*first)? as usize;
                (i < *len).then_some(i)
            }
            Relation::Mapped(map) => map.get(&shot).copied(),
        }
    }
}

/// Locate the single contiguous run of `true` in a per-row membership
/// mask, as `(start, len)`. A split run means the dataset interleaves
/// configurations row-by-row, which is not supported.
pub fn contiguous_block(
    mask: impl IntoIterator<Item = bool>,
    dataset: &str,
) -> Result<Option<(usize, usize)>, ReadError> {
    let mut start = None;
    let mut len = 0usize;
    let mut ended = false;
    for (i, hit) in mask.into_iter().enumerate() {
        if hit {
            if ended {
                return Err(ReadError::UnsupportedLayout(format!(
                    "rows of dataset '{dataset}' are interleaved between configurations"
                )));
            }
            if start.is_none() {
                start = Some(i);
            }
            len += 1;
        } else if start.is_some() {
            ended = true;
        }
    }
    Ok(start.map(|s| (s, len)))
}
