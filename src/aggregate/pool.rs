//! Pooling raw counts across qubit groups.
//!
//! Device-wide numbers are fitted on pooled counts, not averaged from
//! per-group fits.

use std::collections::BTreeMap;

use crate::domain::{Dataset, SpamCounts, SurvivalTable};
use crate::error::AppResult;

/// Concatenate every group's repetitions, length by length.
///
/// Shots per repetition are unchanged, so the pooled table can go straight
/// into the fitter and the bootstrap. Groups must share the length set and
/// the qubit count.
pub fn pool_tables(dataset: &Dataset<SurvivalTable>) -> AppResult<SurvivalTable> {
    dataset.qubit_count()?;
    let lengths = dataset.check_shared_lengths()?;

    let mut rows: BTreeMap<u32, Vec<u32>> = lengths.iter().map(|&m| (m, Vec::new())).collect();
    for table in dataset.groups.values() {
        for (m, counts) in table.rows() {
            if let Some(pooled) = rows.get_mut(m) {
                pooled.extend_from_slice(counts);
            }
        }
    }
    SurvivalTable::new(rows, dataset.shots)
}

/// SPAM successes summed across groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PooledSpam {
    pub zero: u64,
    pub one: u64,
    /// Shots per state, summed over groups.
    pub trials: u64,
}

pub fn pool_spam(dataset: &Dataset<SpamCounts>) -> PooledSpam {
    let zero = dataset.groups.values().map(|c| u64::from(c.zero)).sum();
    let one = dataset.groups.values().map(|c| u64::from(c.one)).sum();
    PooledSpam {
        zero,
        one,
        trials: u64::from(dataset.shots) * dataset.groups.len() as u64,
    }
}
