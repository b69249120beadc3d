//! Cycle is a Vec<SwapEvent> that forms a closed chain: every swap consumes what the previous one
//! produced, and the last swap produces what the first one consumed.
use std::collections::BTreeSet;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

use eyre::{bail, Error, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::swap::{SwapEvent, SwapId};

/// A closed chain of swaps taken from a single block
#[derive(Clone, Serialize, Deserialize)]
#[serde(into = "Vec<SwapEvent>", try_from = "Vec<SwapEvent>")]
pub struct Cycle {
    /// Swaps in chain order
    swaps: Vec<SwapEvent>,
}

impl Debug for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle({})",
            self.swaps.iter().map(|s| format!("{s:?}")).join(", ")
        )
    }
}

/// Cycles are equal when they chain the same swaps in the same order
impl PartialEq for Cycle {
    fn eq(&self, other: &Self) -> bool {
        self.ids().eq(other.ids())
    }
}

impl Eq for Cycle {}

impl Hash for Cycle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for id in self.ids() {
            id.hash(state);
        }
    }
}

impl From<Cycle> for Vec<SwapEvent> {
    fn from(cycle: Cycle) -> Self {
        cycle.swaps
    }
}

impl TryFrom<Vec<SwapEvent>> for Cycle {
    type Error = Error;

    fn try_from(swaps: Vec<SwapEvent>) -> Result<Self> {
        Self::new(swaps)
    }
}

impl Cycle {
    /// Creates a cycle from swaps in chain order.
    ///
    /// # Errors
    ///
    /// Returns an error if the swaps are empty, repeat a swap, or do not chain back to the
    /// first swap's input token
    pub fn new(swaps: Vec<SwapEvent>) -> Result<Self> {
        let cycle = Self { swaps };
        cycle.validate_swaps()?;
        Ok(cycle)
    }

    /// Creates a cycle from a chain the enumerator has already checked
    pub(crate) const fn from_chain(swaps: Vec<SwapEvent>) -> Self {
        Self { swaps }
    }

    fn validate_swaps(&self) -> Result<()> {
        if self.swaps.is_empty() {
            bail!("Cycle must have at least 1 swap");
        }

        if !self.swaps.iter().map(SwapEvent::id).all_unique() {
            bail!("Cycle contains duplicate swaps");
        }

        for i in 0..self.swaps.len() {
            let next = (i + 1) % self.swaps.len();
            if self.swaps[i].to_token() != self.swaps[next].from_token() {
                bail!(
                    "Swap {} to token ({}) does not match swap {} from token ({})",
                    i,
                    self.swaps[i].to_token(),
                    next,
                    self.swaps[next].from_token()
                );
            }
        }
        Ok(())
    }

    /// The swaps in chain order
    #[must_use]
    pub fn swaps(&self) -> &[SwapEvent] {
        &self.swaps
    }

    /// Number of swaps in the cycle
    #[must_use]
    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    /// Always false: a cycle has at least one swap
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }

    /// Swap identities in chain order
    pub fn ids(&self) -> impl Iterator<Item = SwapId> + '_ {
        self.swaps.iter().map(SwapEvent::id)
    }

    /// Sorted, distinct indices of the transactions the cycle touches
    #[must_use]
    pub fn transaction_indices(&self) -> Vec<u64> {
        self.swaps
            .iter()
            .map(|s| s.transaction_index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Whether the cycle spans more than one transaction (a sandwich)
    #[must_use]
    pub fn is_multi_transaction(&self) -> bool {
        self.swaps
            .iter()
            .map(|s| s.transaction_index)
            .all_equal_value()
            .is_err()
    }

    /// How close together the legs of the cycle executed.
    ///
    /// This is the negative euclidean norm of the gaps between the real-time order of
    /// consecutive swaps, so 0 is best and contiguous swaps of one transaction score near it.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn closeness(&self) -> f64 {
        let squares: f64 = self
            .swaps
            .iter()
            .map(|s| s.real_time_order() as f64)
            .tuple_windows()
            .map(|(previous, current)| (current - previous).powi(2))
            .sum();
        -squares.sqrt()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::*;

    #[test]
    fn test_new_empty() {
        let cycle = Cycle::new(vec![]);
        assert_eq!(
            cycle.err().unwrap().to_string(),
            "Cycle must have at least 1 swap"
        );
    }

    #[test]
    fn test_new_invalid_duplicate_swaps() {
        let s1 = swap(0, 0, (10, "A"), (20, "A"));
        let cycle = Cycle::new(vec![s1.clone(), s1]);
        assert_eq!(
            cycle.err().unwrap().to_string(),
            "Cycle contains duplicate swaps"
        );
    }

    #[test]
    fn test_new_invalid_token_mismatch() {
        let cycle = Cycle::new(vec![
            swap(0, 0, (10, "A"), (20, "B")),
            swap(0, 1, (20, "C"), (10, "A")),
        ]);
        assert_eq!(
            cycle.err().unwrap().to_string(),
            "Swap 0 to token (B) does not match swap 1 from token (C)"
        );
    }

    #[test]
    fn test_new_invalid_not_closed() {
        let cycle = Cycle::new(vec![
            swap(0, 0, (10, "A"), (20, "B")),
            swap(0, 1, (20, "B"), (10, "C")),
        ]);
        assert_eq!(
            cycle.err().unwrap().to_string(),
            "Swap 1 to token (C) does not match swap 0 from token (A)"
        );
    }

    #[test]
    fn test_transaction_indices() {
        let cycle = cycle(&[
            &swap(4, 0, (10, "A"), (20, "B")),
            &swap(2, 0, (20, "B"), (30, "C")),
            &swap(4, 1, (30, "C"), (10, "A")),
        ]);
        assert_eq!(cycle.transaction_indices(), vec![2, 4]);
        assert!(cycle.is_multi_transaction());

        let single = cycle_of_one_transaction();
        assert_eq!(single.transaction_indices(), vec![7]);
        assert!(!single.is_multi_transaction());
    }

    fn cycle_of_one_transaction() -> Cycle {
        cycle(&[
            &swap(7, 0, (10, "A"), (20, "B")),
            &swap(7, 1, (20, "B"), (11, "A")),
        ])
    }

    #[test]
    fn test_closeness() {
        // orders 7000, 7001
        assert!((cycle_of_one_transaction().closeness() + 1.0).abs() < f64::EPSILON);

        // orders 0, 3, 4003 -> sqrt(3^2 + 4000^2)
        let spread = cycle(&[
            &swap(0, 0, (10, "A"), (20, "B")),
            &swap(0, 3, (20, "B"), (30, "C")),
            &swap(4, 3, (30, "C"), (10, "A")),
        ]);
        let expected = -(9.0_f64 + 16_000_000.0).sqrt();
        assert!((spread.closeness() - expected).abs() < 1e-9);

        let lone = cycle(&[&swap(0, 0, (10, "A"), (12, "A"))]);
        assert!(lone.closeness().abs() < f64::EPSILON);
    }

    #[test]
    fn test_equality_by_ids() {
        let a = swap(0, 0, (10, "A"), (20, "B"));
        let b = swap(0, 1, (20, "B"), (11, "A"));
        assert_eq!(cycle(&[&a, &b]), cycle(&[&a, &b]));
        assert_ne!(cycle(&[&a, &b]), cycle(&[&b, &a]));
    }

    #[test]
    fn test_serde_validates() {
        let a = swap(0, 0, (10, "A"), (20, "B"));
        let b = swap(0, 1, (20, "B"), (11, "A"));
        let json = serde_json::to_string(&cycle(&[&a, &b])).unwrap();
        let back: Cycle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cycle(&[&a, &b]));

        let broken = serde_json::to_string(&vec![a]).unwrap();
        assert!(serde_json::from_str::<Cycle>(&broken).is_err());
    }
}
