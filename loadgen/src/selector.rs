//! Weighted random selection of the next action.

use std::sync::Arc;

use rand::Rng;
use rand_distr::Distribution;
use rand_distr::weighted::WeightedIndex;

use crate::error::{Error, Result};
use crate::registry::{ActionEntry, ActionRegistry};

/// Picks actions with a probability proportional to their weight.
///
/// Selection is memoryless: every call is an independent draw, so repeats are possible and no
/// per-call fairness is guaranteed. Only the long-run frequency of each action converges to
/// `weight / total_weight`.
#[derive(Debug)]
pub struct WeightedSelector {
    registry: Arc<ActionRegistry>,
    distribution: WeightedIndex<u64>,
}

impl WeightedSelector {
    /// Creates a selector over the given registry.
    pub fn new(registry: Arc<ActionRegistry>) -> Result<Self> {
        if registry.is_empty() || registry.total_weight() == 0 {
            return Err(Error::NoActionsConfigured);
        }

        let weights = registry.iter().map(|entry| u64::from(entry.weight()));
        let distribution = WeightedIndex::new(weights)
            .map_err(|err| Error::InvalidConfig(format!("invalid action weights: {err}")))?;

        Ok(Self {
            registry,
            distribution,
        })
    }

    /// The registry this selector draws from.
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Draws the next action.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &ActionEntry {
        let index = self.distribution.sample(rng);
        match self.registry.get(index) {
            Some(entry) => entry,
            None => unreachable!("weighted index {index} outside of the registry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use crate::http::Session;
    use crate::registry::{Execute, Execution, Weight};

    use super::*;

    #[derive(Debug)]
    struct Noop;

    #[async_trait]
    impl Execute for Noop {
        async fn execute(&self, _session: &mut Session) -> Result<Execution> {
            Ok(Execution::Completed)
        }
    }

    fn selector(weights: &[(&str, Weight)]) -> WeightedSelector {
        let registry = weights
            .iter()
            .fold(ActionRegistry::builder(), |builder, (label, weight)| {
                builder.action(*label, *weight, Noop)
            })
            .build()
            .unwrap();
        WeightedSelector::new(Arc::new(registry)).unwrap()
    }

    fn frequencies(selector: &WeightedSelector, draws: usize, seed: u64) -> BTreeMap<String, f64> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut counts = BTreeMap::<String, usize>::new();
        for _ in 0..draws {
            *counts
                .entry(selector.select(&mut rng).label().to_owned())
                .or_default() += 1;
        }

        counts
            .into_iter()
            .map(|(label, count)| (label, count as f64 / draws as f64))
            .collect()
    }

    #[test]
    fn converges_to_weight_ratio() {
        let weights = [("list", 4), ("detail", 3), ("vets", 2), ("create", 1)];
        let selector = selector(&weights);
        let observed = frequencies(&selector, 100_000, 42);

        for (label, weight) in weights {
            let expected = weight as f64 / 10.0;
            let actual = observed[label];
            assert!(
                (actual - expected).abs() < 0.01,
                "{label}: expected {expected}, got {actual}"
            );
        }
    }

    #[test]
    fn converges_with_skewed_weights() {
        let weights = [("rare", 1), ("common", 99)];
        let selector = selector(&weights);
        let observed = frequencies(&selector, 100_000, 7);

        assert!((observed["rare"] - 0.01).abs() < 0.002);
        assert!((observed["common"] - 0.99).abs() < 0.002);
    }

    #[test]
    fn single_action_is_always_selected() {
        let selector = selector(&[("only", 5)]);
        let mut rng = SmallRng::seed_from_u64(0);
        for _ in 0..1000 {
            assert_eq!(selector.select(&mut rng).label(), "only");
        }
    }

    #[test]
    fn picks_follow_registry_order() {
        let selector = selector(&[("a", 1), ("b", 2), ("c", 1)]);
        let observed = frequencies(&selector, 40_000, 3);

        assert_eq!(observed.len(), 3);
        assert!((observed["a"] - 0.25).abs() < 0.01);
        assert!((observed["b"] - 0.50).abs() < 0.01);
        assert!((observed["c"] - 0.25).abs() < 0.01);
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let selector = selector(&[("a", 1), ("b", 2), ("c", 1)]);
        let picks = |seed| {
            let mut rng = SmallRng::seed_from_u64(seed);
            (0..100)
                .map(|_| selector.select(&mut rng).label().to_owned())
                .collect::<Vec<_>>()
        };

        assert_eq!(picks(9), picks(9));
    }
}
