//! Reduction of overlapping elementary arbitrages to the real arbitrages of a block.
//!
//! Every legal cycle is a candidate, so the same swap usually shows up in several elementary
//! arbitrages (rotations, sub-cycles, alternative decompositions). The reducer picks the
//! sub-collection that uses every involved swap exactly once and, among those, the one with the
//! most arbitrages and then the most contiguous legs.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use log::{debug, warn};

use super::arbitrage::ArbitrageRecord;
use super::balance::Balance;
use super::block::{BlockError, Stage};
use super::cover::ExactCover;
use super::cycle::Cycle;
use super::swap::SwapId;
use super::types::SearchLimits;

/// A profitable cycle, before it is deduplicated against the other candidates of its block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementaryArbitrage {
    /// The cycle
    pub cycle: Cycle,
    /// Its net token flow; no token is negative
    pub balance: Balance,
}

/// The arbitrages kept for a block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reduction {
    /// Kept arbitrages, in candidate order
    pub records: Vec<ArbitrageRecord>,
    /// Whether the kept cycles are disjoint. Always expected to hold for an exact cover.
    pub pure: bool,
}

/// Score of a cover. Compared by number of rows, then total closeness, then the smallest rows.
struct CoverScore {
    rows: Vec<usize>,
    closeness: f64,
}

impl CoverScore {
    fn new(mut rows: Vec<usize>, closeness: &[f64]) -> Self {
        rows.sort_unstable();
        // summed in row order so equal covers always score the same
        let closeness = rows.iter().map(|&row| closeness[row]).sum();
        Self { rows, closeness }
    }

    fn is_better_than(&self, other: &Self) -> bool {
        let ordering = self
            .rows
            .len()
            .cmp(&other.rows.len())
            .then_with(|| self.closeness.total_cmp(&other.closeness))
            .then_with(|| other.rows.cmp(&self.rows));
        ordering == Ordering::Greater
    }
}

/// Reduces the elementary arbitrages of a block to a disjoint, maximal set of arbitrage records.
///
/// # Arguments
///
/// * `block_number` - The block the arbitrages were found in
/// * `arbitrages` - Elementary arbitrages, in enumeration order
/// * `limits` - Budget of the exact cover search
///
/// # Errors
///
/// * [`BlockError::NoExactCover`] if the arbitrages cannot be partitioned by the swaps they use
/// * [`BlockError::BudgetExhausted`] if the cover search ran out of budget
pub fn reduce(
    block_number: u64,
    arbitrages: Vec<ElementaryArbitrage>,
    limits: SearchLimits,
) -> Result<Reduction, BlockError> {
    let rows: Vec<BTreeSet<SwapId>> = arbitrages
        .iter()
        .map(|arb| arb.cycle.ids().collect())
        .collect();
    let closeness: Vec<f64> = arbitrages.iter().map(|arb| arb.cycle.closeness()).collect();

    let mut matrix = ExactCover::new(&rows);
    let mut best: Option<CoverScore> = None;
    let search = matrix
        .for_each_solution(limits, |cover| {
            let score = CoverScore::new(cover.to_vec(), &closeness);
            if best.as_ref().map_or(true, |b| score.is_better_than(b)) {
                best = Some(score);
            }
        })
        .map_err(|exceeded| BlockError::BudgetExhausted {
            block_number,
            stage: Stage::Reduction,
            nodes: exceeded.nodes,
        })?;

    debug!(
        "Block {block_number}: {} exact covers over {} swaps, {} nodes",
        search.solutions,
        matrix.universe().len(),
        search.nodes
    );

    let Some(best) = best else {
        let unresolved = search
            .dead_ends
            .iter()
            .map(|&column| matrix.universe()[column])
            .collect();
        return Err(BlockError::NoExactCover {
            block_number,
            candidates: arbitrages.len(),
            universe: matrix.universe().len(),
            unresolved,
        });
    };

    let records: Vec<ArbitrageRecord> = arbitrages
        .into_iter()
        .enumerate()
        .filter(|(row, _)| best.rows.binary_search(row).is_ok())
        .map(|(_, arb)| ArbitrageRecord::new(block_number, arb.cycle, arb.balance))
        .collect();

    let pure = is_disjoint(&records);
    if !pure {
        warn!("Block {block_number}: reduction isn't pure, kept cycles share swaps");
    }

    Ok(Reduction { records, pure })
}

/// Whether no swap is used by two of the records
fn is_disjoint(records: &[ArbitrageRecord]) -> bool {
    let swap_count: usize = records.iter().map(|r| r.cycle.len()).sum();
    let distinct = records
        .iter()
        .flat_map(|r| r.cycle.ids())
        .collect::<BTreeSet<_>>()
        .len();
    swap_count == distinct
}
