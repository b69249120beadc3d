use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::I256;
use eyre::{eyre, Result};
use log::warn;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::cycle::Cycle;
use super::types::{signed_quantity, Token};

/// Net token flow of a cycle.
///
/// Each swap contributes `-from_amount` and `+to_amount`. A cycle is a profitable
/// arbitrage when no token ends up negative.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Balance {
    /// Map of tokens to their net quantity
    pub holdings: BTreeMap<Token, I256>,
}

impl Balance {
    /// Creates a balance from net holdings
    #[must_use]
    pub const fn new(holdings: BTreeMap<Token, I256>) -> Self {
        Self { holdings }
    }

    /// Accumulates the net flow of every swap in the cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if a quantity or a running total does not fit in a signed 256-bit integer
    pub fn of(cycle: &Cycle) -> Result<Self> {
        let mut balance = Self::default();
        for swap in cycle.swaps() {
            let consumed = I256::try_from(swap.from_quantity())
                .map_err(|e| eyre!("{swap} consumed quantity overflows: {e}"))?;
            let produced = I256::try_from(swap.to_quantity())
                .map_err(|e| eyre!("{swap} produced quantity overflows: {e}"))?;
            balance.add(swap.from_token(), -consumed)?;
            balance.add(swap.to_token(), produced)?;
        }
        Ok(balance)
    }

    fn add(&mut self, token: &Token, quantity: I256) -> Result<()> {
        let net = self.holdings.entry(token.clone()).or_insert(I256::ZERO);
        *net = net
            .checked_add(quantity)
            .ok_or_else(|| eyre!("net balance of {token} overflows"))?;
        Ok(())
    }

    /// The net quantity of `token`, if the cycle touched it
    #[must_use]
    pub fn get(&self, token: &Token) -> Option<I256> {
        self.holdings.get(token).copied()
    }

    /// Whether no token ends up with a negative net quantity
    #[must_use]
    pub fn is_profitable(&self) -> bool {
        self.holdings.values().all(|net| !net.is_negative())
    }

    /// The tokens the cycle gained, with the quantity gained
    pub fn profits(&self) -> impl Iterator<Item = (&Token, I256)> + '_ {
        self.holdings
            .iter()
            .filter(|(_, net)| net.is_positive())
            .map(|(token, net)| (token, *net))
    }
}

/// Returns the balance of `cycle` when it is a profitable arbitrage, `None` otherwise.
///
/// An unprofitable cycle is the expected outcome for most candidates, not an error.
#[must_use]
pub fn evaluate(cycle: &Cycle) -> Option<Balance> {
    match Balance::of(cycle) {
        Ok(balance) => balance.is_profitable().then_some(balance),
        Err(e) => {
            warn!("Skipping {cycle:?}: {e}");
            None
        }
    }
}

impl fmt::Debug for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.holdings.iter().map(|(token, net)| (token.as_str(), net.to_string())))
            .finish()
    }
}

/// Net quantity wrapper so map values go through [`signed_quantity`]
#[derive(Serialize, Deserialize)]
struct Net(#[serde(with = "signed_quantity")] I256);

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.holdings.len()))?;
        for (token, net) in &self.holdings {
            map.serialize_entry(token, &Net(*net))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let holdings = BTreeMap::<Token, Net>::deserialize(deserializer)?;
        Ok(Self::new(
            holdings.into_iter().map(|(token, Net(net))| (token, net)).collect(),
        ))
    }
}
