//! Swap history ingest.
//!
//! The acquisition layer writes one JSON document mapping block numbers to transaction indices
//! to the swaps of that transaction:
//!
//! ```json
//! { "14035430": { "3": [ { "blockNumber": 14035430, "transactionIndex": 3, "logIndex": 12, ... } ] } }
//! ```
//!
//! Each swap record is decoded on its own, so a malformed record (for example the `-1` sentinel
//! amount written when a log could not be decoded) is skipped without losing its block.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use derive_more::Display;
use eyre::{Result, WrapErr};
use log::{info, warn};
use serde_json::value::RawValue;

use crate::arb::swap::SwapEvent;

/// Raw document shape: block -> transaction -> swap records
type RawHistory = BTreeMap<String, BTreeMap<String, Vec<Box<RawValue>>>>;

/// Counts gathered while loading a swap history
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
#[display("{blocks} blocks, {transactions} transactions, {swaps} swaps ({skipped} skipped)")]
pub struct HistoryStats {
    /// Blocks with at least one swap
    pub blocks: usize,
    /// Transactions with at least one swap
    pub transactions: usize,
    /// Swaps loaded
    pub swaps: usize,
    /// Malformed records that were skipped
    pub skipped: usize,
}

/// The swaps of every block, each block sorted by `(transaction_index, log_index)`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SwapHistory {
    blocks: BTreeMap<u64, Vec<SwapEvent>>,
    skipped: usize,
}

impl SwapHistory {
    /// Loads a swap history document from `path`.
    ///
    /// # Errors
    /// * If the file cannot be read
    /// * If the document is not a `block -> transaction -> [swap]` object
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading swaps from {}", path.display());
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Couldn't load swaps from {}", path.display()))?;
        let history = Self::from_json(&text)
            .wrap_err_with(|| format!("Invalid swap history in {}", path.display()))?;
        info!("Loaded {}", history.stats());
        Ok(history)
    }

    /// Parses a swap history document.
    ///
    /// # Errors
    /// If the document is not a `block -> transaction -> [swap]` object or a key is not a number
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawHistory = serde_json::from_str(text)?;
        let mut history = Self::default();

        for (block_key, transactions) in raw {
            let block_number: u64 = block_key
                .trim()
                .parse()
                .wrap_err_with(|| format!("Invalid block number {block_key:?}"))?;

            for (transaction_key, records) in transactions {
                let transaction_index: u64 = transaction_key
                    .trim()
                    .parse()
                    .wrap_err_with(|| format!("Invalid transaction index {transaction_key:?}"))?;

                for record in records {
                    match Self::decode(block_number, transaction_index, &record) {
                        Ok(swap) => history.push(swap),
                        Err(e) => {
                            warn!(
                                "Skipping swap in block {block_number} transaction {transaction_index}: {e}"
                            );
                            history.skipped += 1;
                        }
                    }
                }
            }
        }

        history.sort();
        Ok(history)
    }

    /// Builds a history from swaps already decoded
    pub fn from_swaps(swaps: impl IntoIterator<Item = SwapEvent>) -> Self {
        let mut history = Self::default();
        for swap in swaps {
            history.push(swap);
        }
        history.sort();
        history
    }

    fn decode(block_number: u64, transaction_index: u64, record: &RawValue) -> Result<SwapEvent> {
        let swap: SwapEvent = serde_json::from_str(record.get())?;
        if swap.block_number != block_number || swap.transaction_index != transaction_index {
            eyre::bail!(
                "swap {} of block {} filed under block {block_number} transaction {transaction_index}",
                swap.id(),
                swap.block_number
            );
        }
        Ok(swap)
    }

    fn push(&mut self, swap: SwapEvent) {
        self.blocks.entry(swap.block_number).or_default().push(swap);
    }

    fn sort(&mut self) {
        for swaps in self.blocks.values_mut() {
            swaps.sort_by_key(SwapEvent::id);
        }
    }

    /// Swaps of a block, in block order
    #[must_use]
    pub fn block(&self, block_number: u64) -> Option<&[SwapEvent]> {
        self.blocks.get(&block_number).map(Vec::as_slice)
    }

    /// Iterates the blocks in ascending order
    pub fn blocks(&self) -> impl Iterator<Item = (u64, &[SwapEvent])> {
        self.blocks
            .iter()
            .map(|(&number, swaps)| (number, swaps.as_slice()))
    }

    /// Takes the blocks out of the history
    #[must_use]
    pub fn into_blocks(self) -> BTreeMap<u64, Vec<SwapEvent>> {
        self.blocks
    }

    /// Number of blocks
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no block has a swap
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Counts of blocks, transactions and swaps
    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        let transactions = self
            .blocks
            .values()
            .map(|swaps| {
                swaps
                    .iter()
                    .map(|swap| swap.transaction_index)
                    .collect::<BTreeSet<_>>()
                    .len()
            })
            .sum();
        HistoryStats {
            blocks: self.blocks.len(),
            transactions,
            swaps: self.blocks.values().map(Vec::len).sum(),
            skipped: self.skipped,
        }
    }
}

impl fmt::Debug for SwapHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SwapHistory({})", self.stats())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::arb::swap::SwapId;

    fn record(block: u64, tx: u64, log: u64, from: &str, to: &str) -> String {
        format!(
            r#"{{"blockNumber": {block}, "transactionIndex": {tx}, "logIndex": {log},
                "transactionHash": "0xhash{tx}", "sender": "0xbot", "recipient": "0xbot",
                "timeStamp": "0x61e5e7c4", "gasPrice": "0x1", "gasUsed": "0x2",
                "from": {from}, "to": {to}, "poolAddress": "0xpool", "dex": "uniswapv2"}}"#
        )
    }

    fn document() -> String {
        format!(
            r#"{{
                "14035431": {{ "0": [{}] }},
                "14035430": {{
                    "7": [{}, {}],
                    "2": [{}]
                }}
            }}"#,
            record(14_035_431, 0, 1, r#"[10, "A"]"#, r#"[20, "B"]"#),
            record(14_035_430, 7, 4, r#"[10, "A"]"#, r#"[20, "B"]"#),
            record(14_035_430, 7, 2, r#"["1000000000000000000000000", "B"]"#, r#"[1, "C"]"#),
            record(14_035_430, 2, 9, r#"[-1, "A"]"#, r#"[20, "B"]"#),
        )
    }

    #[test]
    fn test_from_json() {
        let history = SwapHistory::from_json(&document()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(
            history.blocks().map(|(number, _)| number).collect::<Vec<_>>(),
            vec![14_035_430, 14_035_431]
        );

        let block = history.block(14_035_430).unwrap();
        assert_eq!(
            block.iter().map(SwapEvent::id).collect::<Vec<_>>(),
            vec![SwapId::new(7, 2), SwapId::new(7, 4)]
        );
        assert_eq!(block[0].transaction_hash.as_deref(), Some("0xhash7"));
        assert!(history.block(1).is_none());

        assert_eq!(
            history.stats(),
            HistoryStats {
                blocks: 2,
                transactions: 2,
                swaps: 3,
                skipped: 1
            }
        );
        assert_eq!(
            history.stats().to_string(),
            "2 blocks, 2 transactions, 3 swaps (1 skipped)"
        );
    }

    #[test]
    fn test_misfiled_swap_is_skipped() {
        let text = format!(
            r#"{{"14035430": {{"1": [{}]}}}}"#,
            record(14_035_430, 2, 0, r#"[10, "A"]"#, r#"[20, "B"]"#)
        );
        let history = SwapHistory::from_json(&text).unwrap();
        assert!(history.is_empty());
        assert_eq!(history.stats().skipped, 1);
    }

    #[test]
    fn test_invalid_document() {
        assert!(SwapHistory::from_json("[]").is_err());
        assert!(SwapHistory::from_json(r#"{"latest": {}}"#).is_err());
        assert!(SwapHistory::from_json(r#"{"1": {"x": []}}"#).is_err());
    }

    #[test]
    fn test_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(document().as_bytes()).unwrap();
        let history = SwapHistory::load(file.path()).unwrap();
        assert_eq!(history.stats().swaps, 3);

        let missing = SwapHistory::load("/nonexistent/swap_history.json");
        assert!(missing
            .err()
            .unwrap()
            .to_string()
            .starts_with("Couldn't load swaps from"));
    }

    #[test]
    fn test_from_swaps() {
        use alloy::primitives::U256;

        use crate::arb::types::TokenAmount;

        let swap = |block_number, transaction_index, log_index| SwapEvent {
            block_number,
            transaction_index,
            log_index,
            transaction_hash: None,
            from_amount: TokenAmount::new(U256::from(10), "A"),
            to_amount: TokenAmount::new(U256::from(20), "B"),
            sender: "0xbot".to_string(),
            recipient: "0xbot".to_string(),
            pool_address: "0xpool".to_string(),
            dex: "uniswapv3".to_string(),
        };
        let history = SwapHistory::from_swaps([swap(5, 1, 0), swap(4, 0, 0), swap(5, 0, 3)]);
        assert_eq!(history.len(), 2);
        assert_eq!(
            history.block(5).unwrap().iter().map(SwapEvent::id).collect::<Vec<_>>(),
            vec![SwapId::new(0, 3), SwapId::new(1, 0)]
        );
        assert_eq!(history.into_blocks().len(), 2);
    }
}
