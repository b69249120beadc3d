/*!
 * # Arbtrace - In-Block Arbitrage Detection over Swap Histories
 *
 * Arbtrace reads the swaps recorded by decentralized exchanges, block by block,
 * and finds the cyclic arbitrages executed inside each block.
 *
 * ## Core Features
 *
 * - **Cycle Enumeration**: Finds every closed chain of swaps a single trader could have executed
 * - **Profitability**: Keeps the cycles that end with no token in deficit
 * - **Overlap Reduction**: Selects the exact cover of swaps with the most, tightest arbitrages
 * - **Parallel Scan**: Processes blocks independently on a bounded worker pool
 *
 * ## Module Structure
 *
 * - `arb`: Detection core, per block
 * - `config`: Configuration management for the system
 * - `history`: Swap history ingest
 * - `scanner`: Fan-out of the detection over all blocks
 * - `store`: Arbitrage output persistence
 * - `utils`: Utility functions and helpers
 */

/// Arbitrage detection logic
pub mod arb;
/// Configuration management for the system
pub mod config;
/// Swap history ingest
pub mod history;
/// Fan-out of the detection over all blocks
pub mod scanner;
/// Arbitrage output persistence
pub mod store;
/// Utility functions and helpers
pub mod utils;
