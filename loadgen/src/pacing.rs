//! Randomized think-time between the actions of a virtual user.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Uniformly distributed wait time within a closed interval.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// Creates pacing bounded by `[min, max]`.
    pub fn new(min: Duration, max: Duration) -> Result<Self> {
        if min > max {
            return Err(Error::InvalidPacing { min, max });
        }
        Ok(Self { min, max })
    }

    /// Always waits exactly `wait`.
    pub fn constant(wait: Duration) -> Self {
        Self {
            min: wait,
            max: wait,
        }
    }

    /// The lower bound.
    pub fn min(&self) -> Duration {
        self.min
    }

    /// The upper bound.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draws a delay from `[min, max]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min == self.max {
            return self.min;
        }

        let min = saturating_nanos(self.min);
        let max = saturating_nanos(self.max);
        Duration::from_nanos(rng.random_range(min..=max))
    }

    /// Waits for a freshly sampled delay.
    ///
    /// Returns `false` if `cancel` fired before the delay elapsed.
    pub async fn wait<R: Rng + ?Sized>(&self, rng: &mut R, cancel: &CancellationToken) -> bool {
        let delay = self.sample(rng);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

fn saturating_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn samples_stay_within_bounds() {
        let pacing = Pacing::new(Duration::from_secs(1), Duration::from_secs(4)).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);

        let samples: Vec<_> = (0..10_000).map(|_| pacing.sample(&mut rng)).collect();
        assert!(
            samples
                .iter()
                .all(|d| (pacing.min()..=pacing.max()).contains(d))
        );

        // the interval is actually covered, not just one end of it
        assert!(samples.iter().any(|d| *d < Duration::from_millis(1500)));
        assert!(samples.iter().any(|d| *d > Duration::from_millis(3500)));
    }

    #[test]
    fn equal_bounds_are_exact() {
        let pacing = Pacing::new(Duration::from_millis(250), Duration::from_millis(250)).unwrap();
        let mut rng = SmallRng::seed_from_u64(2);
        for _ in 0..100 {
            assert_eq!(pacing.sample(&mut rng), Duration::from_millis(250));
        }

        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(Pacing::constant(Duration::ZERO).sample(&mut rng), Duration::ZERO);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let result = Pacing::new(Duration::from_secs(4), Duration::from_secs(1));
        assert!(matches!(result, Err(Error::InvalidPacing { .. })));
    }

    #[tokio::test]
    async fn wait_is_interrupted_by_cancellation() {
        let pacing = Pacing::constant(Duration::from_secs(60));
        let mut rng = SmallRng::seed_from_u64(4);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let start = Instant::now();
        assert!(!pacing.wait(&mut rng, &cancel).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn wait_completes_without_cancellation() {
        let pacing = Pacing::constant(Duration::from_millis(10));
        let mut rng = SmallRng::seed_from_u64(5);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        assert!(pacing.wait(&mut rng, &cancel).await);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
