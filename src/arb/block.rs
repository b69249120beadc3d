//! Detection of the arbitrages of a single block.

use derive_more::Display;
use itertools::Itertools;
use log::{debug, info, warn};

use super::arbitrage::ArbitrageRecord;
use super::balance::evaluate;
use super::enumerator::{CycleEnumerator, ExtensionRules};
use super::reducer::{reduce, ElementaryArbitrage};
use super::swap::{SwapEvent, SwapId};
use super::types::SearchLimits;

/// The search a block was in when it failed
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Stage {
    /// Cycle enumeration
    #[display("cycle enumeration")]
    Enumeration,
    /// Overlap reduction
    #[display("overlap reduction")]
    Reduction,
}

/// A block that could not be processed. No record is emitted for it; other blocks are unaffected.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum BlockError {
    /// The elementary arbitrages claim swaps in a way that cannot be partitioned
    #[display(
        "block {block_number}: no exact cover of {universe} swaps by {candidates} elementary arbitrages, unresolved swaps [{}]",
        unresolved.iter().join(", ")
    )]
    NoExactCover {
        /// Block being processed
        block_number: u64,
        /// Number of elementary arbitrages
        candidates: usize,
        /// Number of distinct swaps they use
        universe: usize,
        /// Swaps the cover search could not cover on some branch
        unresolved: Vec<SwapId>,
    },
    /// A search ran out of its node budget
    #[display("block {block_number}: {stage} exceeded its budget after {nodes} nodes")]
    BudgetExhausted {
        /// Block being processed
        block_number: u64,
        /// Search that gave up
        stage: Stage,
        /// Nodes expanded when it gave up
        nodes: u64,
    },
    /// The worker running the block died before reporting
    #[display("block {block_number}: task failed: {reason}")]
    TaskFailed {
        /// Block being processed
        block_number: u64,
        /// What stopped the worker
        reason: String,
    },
}

impl BlockError {
    /// The block that failed
    #[must_use]
    pub const fn block_number(&self) -> u64 {
        match self {
            Self::NoExactCover { block_number, .. }
            | Self::BudgetExhausted { block_number, .. }
            | Self::TaskFailed { block_number, .. } => *block_number,
        }
    }
}

impl std::error::Error for BlockError {}

/// Outcome of a block that was processed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockReport {
    /// Block processed
    pub block_number: u64,
    /// Number of swaps in the block
    pub swap_count: usize,
    /// Number of legal cycles enumerated
    pub cycle_count: usize,
    /// Number of profitable cycles before reduction
    pub elementary_count: usize,
    /// Arbitrages kept after reduction
    pub records: Vec<ArbitrageRecord>,
    /// Whether the kept cycles are disjoint
    pub pure: bool,
}

/// Runs the enumeration, evaluation and reduction over the swaps of one block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockDetector {
    /// Which swaps may follow each other in a cycle
    pub rules: ExtensionRules,
    /// Budget of each search of a block
    pub limits: SearchLimits,
}

impl BlockDetector {
    /// Creates a detector
    #[must_use]
    pub const fn new(rules: ExtensionRules, limits: SearchLimits) -> Self {
        Self { rules, limits }
    }

    /// Finds the arbitrages of a block.
    ///
    /// The swaps are stably sorted by `(transaction_index, log_index)` first.
    ///
    /// # Errors
    ///
    /// Returns a [`BlockError`] if the block has no exact cover or a search ran out of budget
    pub fn detect(
        &self,
        block_number: u64,
        mut swaps: Vec<SwapEvent>,
    ) -> Result<BlockReport, BlockError> {
        swaps.sort_by_key(SwapEvent::id);
        info!("Started in block {block_number} with {} swaps", swaps.len());

        let mut enumerator = CycleEnumerator::new(&swaps, self.rules, self.limits);
        let mut cycle_count = 0;
        let mut arbitrages = Vec::new();
        for cycle in enumerator.by_ref() {
            cycle_count += 1;
            debug!("Found cycle with {} swaps", cycle.len());
            if let Some(balance) = evaluate(&cycle) {
                debug!("Found elementary arbitrage cycle with {} swaps", cycle.len());
                arbitrages.push(ElementaryArbitrage { cycle, balance });
            }
        }
        enumerator
            .finish()
            .map_err(|exceeded| BlockError::BudgetExhausted {
                block_number,
                stage: Stage::Enumeration,
                nodes: exceeded.nodes,
            })?;

        let mut report = BlockReport {
            block_number,
            swap_count: swaps.len(),
            cycle_count,
            elementary_count: arbitrages.len(),
            records: Vec::new(),
            pure: true,
        };
        if arbitrages.is_empty() {
            return Ok(report);
        }

        info!(
            "Block {block_number} has {} elementary arbitrages",
            arbitrages.len()
        );
        let reduction = reduce(block_number, arbitrages, self.limits)?;
        info!(
            "Block {block_number} has {} reduced arbitrages",
            reduction.records.len()
        );
        if !reduction.pure {
            warn!("Block {block_number}: reduction isn't pure");
        }
        for record in &reduction.records {
            info!("Found {record}");
            debug!("{:?}", record.cycle);
        }

        report.records = reduction.records;
        report.pure = reduction.pure;
        Ok(report)
    }
}

/// Finds the arbitrages of a block with the given settings.
///
/// # Errors
///
/// See [`BlockDetector::detect`]
pub fn find_in_block_arbitrages(
    block_number: u64,
    swaps: Vec<SwapEvent>,
    settings: &BlockDetector,
) -> Result<BlockReport, BlockError> {
    settings.detect(block_number, swaps)
}
