/// How many transactions ahead a cycle may reach from one of its swaps to the next
pub const MAX_CROSS_TRANSACTION: u64 = 5;
/// Weight of the transaction index in the real time order of a swap
pub const TRANSACTION_MULTIPLIER: u64 = 1000;
/// Weight of the log index in the real time order of a swap
pub const LOG_MULTIPLIER: u64 = 1;

/// Default swap history document
pub const DEFAULT_SWAP_HISTORY: &str = "data/swap_history.json";
/// Default arbitrage output file
pub const DEFAULT_OUTPUT: &str = "data/arbitrages.json";
