//! A swap event is a single exchange recorded in a pool's `Swap` log: it consumed one token
//! and produced another, at a fixed position (transaction, log) inside a block.
use std::fmt::{self, Debug, Display};

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::types::{AccountAddress, PoolAddress, Token, TokenAmount};
use crate::utils::constants::{LOG_MULTIPLIER, TRANSACTION_MULTIPLIER};

/// Identity of a swap inside its block.
///
/// `(transaction_index, log_index)` is unique within a block and totally orders its swaps.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SwapId {
    /// Index of the transaction in the block
    pub transaction_index: u64,
    /// Index of the log that emitted the swap
    pub log_index: u64,
}

impl SwapId {
    /// Creates a new swap id
    #[must_use]
    pub const fn new(transaction_index: u64, log_index: u64) -> Self {
        Self {
            transaction_index,
            log_index,
        }
    }
}

impl Debug for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.transaction_index, self.log_index)
    }
}

impl Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.transaction_index, self.log_index)
    }
}

/// An immutable swap record, as assembled by the data acquisition layer.
///
/// Pool and dex are provenance only; the detection never interprets them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapEvent {
    /// Block the swap was mined in
    pub block_number: u64,
    /// Index of the transaction in the block
    pub transaction_index: u64,
    /// Index of the log that emitted the swap
    pub log_index: u64,
    /// Hash of the transaction, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// What the swap consumed
    #[serde(rename = "from")]
    pub from_amount: TokenAmount,
    /// What the swap produced
    #[serde(rename = "to")]
    pub to_amount: TokenAmount,
    /// The account that called the pool
    pub sender: AccountAddress,
    /// The account that received the output
    pub recipient: AccountAddress,
    /// The pool that executed the swap
    pub pool_address: PoolAddress,
    /// The exchange the pool belongs to
    pub dex: String,
}

impl SwapEvent {
    /// The identity of this swap within its block
    #[must_use]
    pub const fn id(&self) -> SwapId {
        SwapId::new(self.transaction_index, self.log_index)
    }

    /// The token consumed by the swap
    #[must_use]
    pub const fn from_token(&self) -> &Token {
        self.from_amount.token()
    }

    /// The token produced by the swap
    #[must_use]
    pub const fn to_token(&self) -> &Token {
        self.to_amount.token()
    }

    /// The quantity consumed by the swap
    #[must_use]
    pub const fn from_quantity(&self) -> U256 {
        self.from_amount.quantity()
    }

    /// The quantity produced by the swap
    #[must_use]
    pub const fn to_quantity(&self) -> U256 {
        self.to_amount.quantity()
    }

    /// Position of the swap on a single real-time axis.
    ///
    /// Transactions are weighted so that swaps of the same transaction sit next to each other.
    #[must_use]
    pub const fn real_time_order(&self) -> u64 {
        self.transaction_index * TRANSACTION_MULTIPLIER + self.log_index * LOG_MULTIPLIER
    }
}

impl Debug for SwapEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            // Swap(3-12, 1000 WETH -> 2000 USDC)
            "Swap({:?}, {:?} -> {:?})",
            self.id(),
            self.from_amount,
            self.to_amount
        )
    }
}

impl Display for SwapEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Swap({}, {} -> {} @{} by {})",
            self.id(),
            self.from_amount,
            self.to_amount,
            self.pool_address,
            self.sender
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::*;

    #[test]
    fn test_id_ordering() {
        let ids = [SwapId::new(1, 0), SwapId::new(0, 7), SwapId::new(0, 3)];
        let mut sorted = ids.to_vec();
        sorted.sort();
        assert_eq!(
            sorted,
            vec![SwapId::new(0, 3), SwapId::new(0, 7), SwapId::new(1, 0)]
        );
        assert_eq!(SwapId::new(4, 2).to_string(), "4-2");
    }

    #[test]
    fn test_real_time_order() {
        let s = swap(3, 12, (10, "A"), (20, "B"));
        assert_eq!(s.real_time_order(), 3_012);
        assert_eq!(s.id(), SwapId::new(3, 12));
    }

    #[test]
    fn test_deserialize_reference_record() {
        let json = r#"{
            "blockNumber": 14035430,
            "transactionIndex": 4,
            "logIndex": 17,
            "transactionHash": "0x0ddb",
            "sender": "0xbot",
            "recipient": "0xpool2",
            "timeStamp": "0x61e5b2c3",
            "gasPrice": "0x1",
            "gasUsed": "0x2",
            "from": [1500000000000000000, "0xweth"],
            "to": [3000000000, "0xusdc"],
            "dex": "uniswapv2",
            "poolAddress": "0xpool1"
        }"#;
        let s: SwapEvent = serde_json::from_str(json).unwrap();
        assert_eq!(s.block_number, 14_035_430);
        assert_eq!(s.id(), SwapId::new(4, 17));
        assert_eq!(s.from_token(), &Token::from("0xweth"));
        assert_eq!(s.from_quantity(), U256::from(1_500_000_000_000_000_000_u64));
        assert_eq!(s.to_quantity(), U256::from(3_000_000_000_u64));
        assert_eq!(s.transaction_hash.as_deref(), Some("0x0ddb"));
        assert_eq!(s.pool_address, "0xpool1");
    }

    #[test]
    fn test_reject_sentinel_amount() {
        // The acquisition layer writes -1 for swaps it could not decode
        let json = r#"{
            "blockNumber": 1, "transactionIndex": 0, "logIndex": 0,
            "sender": "s", "recipient": "r",
            "from": [-1, "0xaaa0xbbb"], "to": [5, "0xbbb"],
            "dex": "uniswapv3", "poolAddress": "0xpool"
        }"#;
        let err = serde_json::from_str::<SwapEvent>(json).err().unwrap();
        assert!(err.to_string().contains("negative quantity"));
    }
}
