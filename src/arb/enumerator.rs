//! Enumeration of every legal cycle of swaps inside one block.
//!
//! The search is a depth first backtracking over the block's swaps. It is run with an explicit
//! frame stack instead of recursion so that the enumerator can be a lazy [`Iterator`]: each call
//! to `next` resumes the search where the previous cycle was found.

use log::warn;

use super::cycle::Cycle;
use super::swap::SwapEvent;
use super::types::{SearchBudgetExceeded, SearchLimits};
use crate::utils::constants::MAX_CROSS_TRANSACTION;

/// The predicate deciding whether a swap may follow another one in a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtensionRules {
    /// How many transactions ahead a cross-transaction extension may look
    pub max_cross_transaction: u64,
}

impl Default for ExtensionRules {
    fn default() -> Self {
        Self {
            max_cross_transaction: MAX_CROSS_TRANSACTION,
        }
    }
}

impl ExtensionRules {
    /// Whether `right` may extend a chain ending in `left`.
    ///
    /// * `right` consumes the token `left` produced
    /// * `left` produced at least what `right` consumes
    /// * `right` happens in the same transaction as `left` or at most
    ///   `max_cross_transaction` transactions later
    /// * across transactions, both swaps were sent by the same account
    #[must_use]
    pub fn can_extend(&self, left: &SwapEvent, right: &SwapEvent) -> bool {
        left.to_token() == right.from_token()
            && left.to_quantity() >= right.from_quantity()
            && left.transaction_index <= right.transaction_index
            && right.transaction_index
                <= left.transaction_index.saturating_add(self.max_cross_transaction)
            && (left.transaction_index == right.transaction_index || left.sender == right.sender)
    }
}

/// Lazy depth first enumeration of the cycles of a block.
///
/// Every swap is tried as a start. A chain is yielded each time it closes, and the search keeps
/// extending it afterwards, so longer cycles sharing a prefix are yielded too. A swap is never
/// used twice in the same chain.
pub struct CycleEnumerator<'a> {
    /// Swaps of the block, sorted by `(transaction_index, log_index)`
    swaps: &'a [SwapEvent],
    /// Extension predicate
    rules: ExtensionRules,
    /// Node budget
    limits: SearchLimits,
    /// Indices of the swaps on the current chain
    path: Vec<usize>,
    /// For each chain position, the next swap index to try as its successor
    cursors: Vec<usize>,
    /// Swaps currently on the chain
    used: Vec<bool>,
    /// Next swap to try as the start of a chain
    next_start: usize,
    /// Chains expanded so far
    nodes: u64,
    /// Set once the node budget runs out
    exhausted: bool,
}

impl<'a> CycleEnumerator<'a> {
    /// Creates an enumerator over the swaps of a block.
    ///
    /// The swaps are expected in block order; the order only affects the order cycles are
    /// yielded in.
    #[must_use]
    pub fn new(swaps: &'a [SwapEvent], rules: ExtensionRules, limits: SearchLimits) -> Self {
        Self {
            swaps,
            rules,
            limits,
            path: Vec::with_capacity(swaps.len()),
            cursors: Vec::with_capacity(swaps.len()),
            used: vec![false; swaps.len()],
            next_start: 0,
            nodes: 0,
            exhausted: false,
        }
    }

    /// Number of chains expanded so far
    #[must_use]
    pub const fn nodes(&self) -> u64 {
        self.nodes
    }

    /// Whether the enumeration stopped because it ran out of budget
    #[must_use]
    pub const fn budget_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Returns an error if the enumeration stopped because it ran out of budget.
    ///
    /// # Errors
    ///
    /// Returns [`SearchBudgetExceeded`] once the node budget has been exceeded
    pub const fn finish(&self) -> Result<(), SearchBudgetExceeded> {
        if self.exhausted {
            Err(SearchBudgetExceeded { nodes: self.nodes })
        } else {
            Ok(())
        }
    }

    fn push(&mut self, index: usize) {
        self.path.push(index);
        self.cursors.push(0);
        self.used[index] = true;
        self.nodes += 1;
    }

    fn pop(&mut self) {
        if let Some(index) = self.path.pop() {
            self.used[index] = false;
            self.cursors.pop();
        }
    }

    fn is_closed(&self) -> bool {
        match (self.path.first(), self.path.last()) {
            (Some(&first), Some(&last)) => {
                self.swaps[last].to_token() == self.swaps[first].from_token()
            }
            _ => false,
        }
    }

    fn current_cycle(&self) -> Cycle {
        Cycle::from_chain(self.path.iter().map(|&i| self.swaps[i].clone()).collect())
    }

    /// Finds the next unused swap that may extend the chain, advancing the top cursor past it
    fn next_extension(&mut self) -> Option<usize> {
        let swaps = self.swaps;
        let depth = self.path.len().checked_sub(1)?;
        let last = &swaps[self.path[depth]];
        while self.cursors[depth] < swaps.len() {
            let candidate = self.cursors[depth];
            self.cursors[depth] += 1;
            if !self.used[candidate] && self.rules.can_extend(last, &swaps[candidate]) {
                return Some(candidate);
            }
        }
        None
    }
}

impl Iterator for CycleEnumerator<'_> {
    type Item = Cycle;

    fn next(&mut self) -> Option<Cycle> {
        while !self.exhausted {
            if self.limits.exceeded(self.nodes) {
                warn!("Cycle enumeration stopped after {} nodes", self.nodes);
                self.exhausted = true;
                // leave the frame stack clean
                while !self.path.is_empty() {
                    self.pop();
                }
                return None;
            }

            if self.path.is_empty() {
                if self.next_start >= self.swaps.len() {
                    return None;
                }
                let start = self.next_start;
                self.next_start += 1;
                self.push(start);
            } else if let Some(extension) = self.next_extension() {
                self.push(extension);
            } else {
                self.pop();
                continue;
            }

            if self.is_closed() {
                return Some(self.current_cycle());
            }
        }
        None
    }
}
