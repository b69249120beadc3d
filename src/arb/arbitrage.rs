use std::fmt::{self, Display};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::balance::Balance;
use super::cycle::Cycle;

/// An arbitrage that survived overlap reduction: one of the real arbitrage occurrences of a block.
///
/// Serialized as `{blockNumber, transactions, balance, cycle}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageRecord {
    /// Block the arbitrage happened in
    pub block_number: u64,
    /// Sorted distinct indices of the transactions involved
    #[serde(rename = "transactions")]
    pub transaction_indices: Vec<u64>,
    /// Net token flow of the cycle; no token is negative
    pub balance: Balance,
    /// The swaps of the arbitrage, in chain order
    pub cycle: Cycle,
}

impl ArbitrageRecord {
    /// Creates a record for a cycle kept by the reducer
    #[must_use]
    pub fn new(block_number: u64, cycle: Cycle, balance: Balance) -> Self {
        Self {
            block_number,
            transaction_indices: cycle.transaction_indices(),
            balance,
            cycle,
        }
    }

    /// Whether the arbitrage spans more than one transaction
    #[must_use]
    pub fn is_multi_transaction(&self) -> bool {
        self.transaction_indices.len() > 1
    }
}

impl Display for ArbitrageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Arbitrage(block {}, #swaps({}), #transactions({}), multiTransaction({}), profit [{}])",
            self.block_number,
            self.cycle.len(),
            self.transaction_indices.len(),
            self.is_multi_transaction(),
            self.balance
                .profits()
                .map(|(token, net)| format!("{net} {token}"))
                .join(", ")
        )
    }
}
