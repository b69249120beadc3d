//! Fan-out of the block detection over a whole swap history.
//!
//! Blocks never interact, so each one is detected on its own blocking task. A semaphore bounds
//! how many run at the same time and the results are joined back in block order.

use std::num::NonZeroUsize;
use std::sync::Arc;

use derive_more::Display;
use eyre::Result;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinError;

use crate::arb::arbitrage::ArbitrageRecord;
use crate::arb::block::{BlockDetector, BlockError, BlockReport};
use crate::arb::swap::SwapEvent;
use crate::history::SwapHistory;

/// Totals over the blocks of a scan
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
#[display(
    "{blocks} blocks, {swaps} swaps, {cycles} cycles, {elementary} elementary arbitrages, \
     {arbitrages} arbitrages ({multi_transaction} multi transaction), {failed} failed blocks"
)]
pub struct ScanStats {
    /// Blocks processed, failed ones included
    pub blocks: usize,
    /// Swaps processed
    pub swaps: usize,
    /// Cycles enumerated in successful blocks
    pub cycles: usize,
    /// Elementary arbitrages in successful blocks
    pub elementary: usize,
    /// Arbitrages kept
    pub arbitrages: usize,
    /// Arbitrages spanning more than one transaction
    pub multi_transaction: usize,
    /// Blocks that failed
    pub failed: usize,
    /// Blocks whose reduction was not pure
    pub impure: usize,
}

/// What a scan found
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Arbitrages of every successful block, in block order
    pub arbitrages: Vec<ArbitrageRecord>,
    /// One error per failed block, in block order
    pub failures: Vec<BlockError>,
    /// Totals
    pub stats: ScanStats,
}

impl ScanOutcome {
    fn record(&mut self, swap_count: usize, result: Result<BlockReport, BlockError>) {
        self.stats.blocks += 1;
        self.stats.swaps += swap_count;
        match result {
            Ok(report) => {
                self.stats.cycles += report.cycle_count;
                self.stats.elementary += report.elementary_count;
                self.stats.arbitrages += report.records.len();
                self.stats.multi_transaction += report
                    .records
                    .iter()
                    .filter(|record| record.is_multi_transaction())
                    .count();
                if !report.pure {
                    self.stats.impure += 1;
                }
                self.arbitrages.extend(report.records);
            }
            Err(e) => {
                error!("{e}");
                self.stats.failed += 1;
                self.failures.push(e);
            }
        }
    }
}

/// Runs a [`BlockDetector`] over every block of a swap history
#[derive(Clone, Copy, Debug)]
pub struct Scanner {
    detector: BlockDetector,
    workers: NonZeroUsize,
    progress: bool,
}

impl Scanner {
    /// Creates a scanner running at most `workers` blocks at the same time
    #[must_use]
    pub const fn new(detector: BlockDetector, workers: NonZeroUsize) -> Self {
        Self {
            detector,
            workers,
            progress: false,
        }
    }

    /// Shows a progress bar over the blocks while scanning
    #[must_use]
    pub const fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    fn progress_bar(&self, blocks: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(blocks as u64);
        let style = ProgressStyle::default_bar()
            .template("{elapsed_precise} [{bar:40}] {pos}/{len} blocks ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }

    /// Detects the arbitrages of every block, in parallel.
    ///
    /// A block that fails contributes its error to [`ScanOutcome::failures`] and no record;
    /// the other blocks are unaffected. A block task that panics fails its block with
    /// [`BlockError::TaskFailed`].
    pub async fn scan(&self, history: SwapHistory) -> ScanOutcome {
        let blocks = history.into_blocks();
        info!(
            "Scanning {} blocks with {} workers",
            blocks.len(),
            self.workers
        );
        let bar = self.progress_bar(blocks.len());
        let semaphore = Arc::new(Semaphore::new(self.workers.get()));

        let tasks = blocks.into_iter().map(|(block_number, swaps)| {
            let semaphore = Arc::clone(&semaphore);
            let detector = self.detector;
            let bar = bar.clone();
            async move {
                let swap_count = swaps.len();
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => settle(
                        block_number,
                        tokio::task::spawn_blocking(move || detector.detect(block_number, swaps))
                            .await,
                    ),
                    Err(e) => Err(BlockError::TaskFailed {
                        block_number,
                        reason: e.to_string(),
                    }),
                };
                bar.inc(1);
                (swap_count, result)
            }
        });
        let results = join_all(tasks).await;
        bar.finish_and_clear();

        let mut outcome = ScanOutcome::default();
        for (swap_count, result) in results {
            outcome.record(swap_count, result);
        }
        log_outcome(&outcome);
        outcome
    }

    /// Detects the arbitrages of every block, one after the other, on the calling thread
    #[must_use]
    pub fn scan_sequential(&self, history: SwapHistory) -> ScanOutcome {
        let blocks = history.into_blocks();
        let bar = self.progress_bar(blocks.len());
        let mut outcome = ScanOutcome::default();
        for (block_number, swaps) in blocks {
            let swap_count = swaps.len();
            outcome.record(swap_count, self.detector.detect(block_number, swaps));
            bar.inc(1);
        }
        bar.finish_and_clear();
        log_outcome(&outcome);
        outcome
    }

    /// Detects the arbitrages of a single block
    ///
    /// # Errors
    /// See [`BlockDetector::detect`]
    pub fn scan_block(
        &self,
        block_number: u64,
        swaps: Vec<SwapEvent>,
    ) -> Result<BlockReport, BlockError> {
        self.detector.detect(block_number, swaps)
    }
}

/// Result of a joined block task; a task that died fails only its own block
fn settle(
    block_number: u64,
    joined: Result<Result<BlockReport, BlockError>, JoinError>,
) -> Result<BlockReport, BlockError> {
    joined.unwrap_or_else(|e| {
        Err(BlockError::TaskFailed {
            block_number,
            reason: e.to_string(),
        })
    })
}

fn log_outcome(outcome: &ScanOutcome) {
    info!("Scanned {}", outcome.stats);
    if outcome.stats.impure > 0 {
        warn!("{} blocks had an impure reduction", outcome.stats.impure);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::arb::block::Stage;
    use crate::arb::swap::SwapId;
    use crate::arb::test_helpers::*;
    use crate::arb::types::SearchLimits;

    fn at(block_number: u64, mut swap: SwapEvent) -> SwapEvent {
        swap.block_number = block_number;
        swap
    }

    /// Block 1 has one arbitrage, block 2 has no exact cover, block 3 a sandwich, block 4 nothing
    fn history() -> SwapHistory {
        SwapHistory::from_swaps([
            at(1, swap(0, 1, (20, "B"), (15, "A"))),
            at(1, swap(0, 0, (10, "A"), (20, "B"))),
            at(2, swap(0, 0, (10, "A"), (20, "B"))),
            at(2, swap(0, 1, (20, "B"), (15, "A"))),
            at(2, swap(0, 2, (10, "A"), (20, "B"))),
            at(3, swap(1, 0, (10, "A"), (20, "B"))),
            at(3, swap_by(2, 0, (50, "B"), (40, "A"), "0xvictim")),
            at(3, swap(3, 0, (20, "B"), (12, "A"))),
            at(4, swap(0, 0, (10, "A"), (20, "B"))),
        ])
    }

    fn workers(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn check(outcome: &ScanOutcome) {
        assert_eq!(
            outcome
                .arbitrages
                .iter()
                .map(|r| r.block_number)
                .collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(
            outcome.arbitrages[0].cycle.ids().collect::<Vec<_>>(),
            vec![SwapId::new(0, 0), SwapId::new(0, 1)]
        );
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            outcome.failures[0],
            BlockError::NoExactCover { block_number: 2, .. }
        ));
        assert_eq!(
            outcome.stats,
            ScanStats {
                blocks: 4,
                swaps: 9,
                cycles: 3,
                elementary: 3,
                arbitrages: 2,
                multi_transaction: 1,
                failed: 1,
                impure: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_scan() {
        for n in [1, 3] {
            let outcome = Scanner::new(BlockDetector::default(), workers(n))
                .scan(history())
                .await;
            check(&outcome);
        }
    }

    #[test]
    fn test_scan_sequential() {
        let scanner = Scanner::new(BlockDetector::default(), workers(1)).with_progress(false);
        let outcome = scanner.scan_sequential(history());
        check(&outcome);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let swaps: Vec<SwapEvent> = (0..12)
            .flat_map(|seed| {
                random_block(seed, 9)
                    .into_iter()
                    .map(move |swap| at(100 + seed, swap))
            })
            .collect();
        let scanner = Scanner::new(BlockDetector::default(), workers(4));
        let parallel = scanner
            .scan(SwapHistory::from_swaps(swaps.clone()))
            .await;
        let sequential = scanner.scan_sequential(SwapHistory::from_swaps(swaps));
        assert_eq!(parallel, sequential);
    }

    #[tokio::test]
    async fn test_budget_failure_is_block_local() {
        let detector = BlockDetector::new(Default::default(), SearchLimits::with_max_nodes(4));
        let mut swaps = random_block(7, 12)
            .into_iter()
            .map(|swap| at(9, swap))
            .collect::<Vec<_>>();
        swaps.extend(history().into_blocks().remove(&1).unwrap());
        let outcome = Scanner::new(detector, workers(2))
            .scan(SwapHistory::from_swaps(swaps))
            .await;
        assert_eq!(outcome.arbitrages.len(), 1);
        assert_eq!(outcome.arbitrages[0].block_number, 1);
        assert!(matches!(
            outcome.failures.as_slice(),
            [BlockError::BudgetExhausted {
                block_number: 9,
                stage: Stage::Enumeration,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_panicked_task_fails_only_its_block() {
        let joined = tokio::task::spawn_blocking(|| -> Result<BlockReport, BlockError> {
            panic!("detector crashed")
        })
        .await;
        let failed = settle(5, joined);
        assert!(matches!(
            &failed,
            Err(BlockError::TaskFailed { block_number: 5, reason }) if reason.contains("panic")
        ));
        assert_eq!(failed.as_ref().err().unwrap().block_number(), 5);

        let mut blocks = history().into_blocks();
        let detector = BlockDetector::default();
        let swaps = blocks.remove(&1).unwrap();
        let ok = tokio::task::spawn_blocking(move || detector.detect(1, swaps)).await;

        let mut outcome = ScanOutcome::default();
        outcome.record(2, failed);
        outcome.record(2, settle(1, ok));
        assert_eq!(outcome.arbitrages.len(), 1);
        assert_eq!(outcome.arbitrages[0].block_number, 1);
        assert_eq!(outcome.stats.blocks, 2);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.failures[0].block_number(), 5);
    }

    #[test]
    fn test_scan_block() {
        let scanner = Scanner::new(BlockDetector::default(), workers(1));
        let blocks = history().into_blocks();
        let report = scanner.scan_block(3, blocks[&3].clone()).unwrap();
        assert_eq!(report.records.len(), 1);
        assert!(scanner.scan_block(2, blocks[&2].clone()).is_err());
    }
}
