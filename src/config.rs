use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use eyre::{eyre, Result};

use crate::arb::block::BlockDetector;
use crate::arb::enumerator::ExtensionRules;
use crate::arb::types::SearchLimits;
use crate::utils::constants::{DEFAULT_OUTPUT, DEFAULT_SWAP_HISTORY, MAX_CROSS_TRANSACTION};

/// Runtime configuration of a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Swap history document to read
    pub swap_history: PathBuf,
    /// Where the arbitrages are written
    pub output: PathBuf,
    /// How many transactions ahead a cycle may reach
    pub max_cross_transaction: u64,
    /// Blocks processed at the same time
    pub workers: NonZeroUsize,
    /// Node budget of each search of a block, unbounded if `None`
    pub search_budget: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            swap_history: PathBuf::from(DEFAULT_SWAP_HISTORY),
            output: PathBuf::from(DEFAULT_OUTPUT),
            max_cross_transaction: MAX_CROSS_TRANSACTION,
            workers: default_workers(),
            search_budget: None,
        }
    }
}

fn default_workers() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Parses the variable `key` if it is set and not blank
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| eyre!("{key}={value:?} is invalid: {e}")),
        _ => Ok(None),
    }
}

impl Config {
    /// Reads the configuration from the environment.
    ///
    /// # Environment Variables
    /// * `ARB_SWAP_HISTORY` - Swap history document, default `data/swap_history.json`
    /// * `ARB_OUTPUT` - Output file, default `data/arbitrages.json`
    /// * `ARB_MAX_CROSS_TRANSACTION` - Transaction look-ahead, default 5
    /// * `ARB_WORKERS` - Blocks processed at the same time, default the available parallelism
    /// * `ARB_SEARCH_BUDGET` - Node budget per search, unbounded if unset
    ///
    /// # Errors
    /// * If a variable is set to a value that cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, see [`Config::from_env`]
    ///
    /// # Errors
    /// * If a variable is set to a value that cannot be parsed
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            swap_history: parse_var(&lookup, "ARB_SWAP_HISTORY")?.unwrap_or(defaults.swap_history),
            output: parse_var(&lookup, "ARB_OUTPUT")?.unwrap_or(defaults.output),
            max_cross_transaction: parse_var(&lookup, "ARB_MAX_CROSS_TRANSACTION")?
                .unwrap_or(defaults.max_cross_transaction),
            workers: parse_var(&lookup, "ARB_WORKERS")?.unwrap_or(defaults.workers),
            search_budget: parse_var(&lookup, "ARB_SEARCH_BUDGET")?,
        })
    }

    /// The search limits of a block
    #[must_use]
    pub const fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_nodes: self.search_budget,
        }
    }

    /// The detector every block is run with
    #[must_use]
    pub const fn detector(&self) -> BlockDetector {
        BlockDetector::new(
            ExtensionRules {
                max_cross_transaction: self.max_cross_transaction,
            },
            self.limits(),
        )
    }
}
