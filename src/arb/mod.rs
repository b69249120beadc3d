//! # Arbitrage Module
//!
//! This module contains the in-block arbitrage detection core.
//! It enumerates the cycles of swaps of a block, keeps the profitable ones
//! and reduces them to the non-overlapping set of real arbitrages.

/// Arbitrage records kept after reduction
pub mod arbitrage;
/// Net token flow of a cycle
pub mod balance;
/// Per block detection pipeline
pub mod block;
/// Exact cover search
pub mod cover;
/// Cycle of swaps
pub mod cycle;
/// Cycle enumeration
pub mod enumerator;
/// Overlap reduction
pub mod reducer;
/// Swap events
pub mod swap;
/// Test helpers and utilities
#[cfg(test)]
pub(crate) mod test_helpers;
/// Common type definitions
pub mod types;
