//! Aggregation of per-action outcomes.
//!
//! Virtual users push every [`Outcome`] into a shared [`Aggregator`]. The aggregator keeps one
//! [`LabelStats`] per label. Combining stats is commutative and associative, so the result does
//! not depend on the order in which users report.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use sketches_ddsketch::DDSketch;

use crate::error::Error;

/// Maximum number of distinct error details kept per label.
const MAX_ERROR_SAMPLES: usize = 5;

/// The result of one executed action.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// Label of the action.
    pub label: String,
    /// Whether the service answered with success.
    pub success: bool,
    /// Time from sending the request until the full response was read.
    pub latency: Duration,
    /// Description of the failure, if any.
    pub error: Option<String>,
}

impl Outcome {
    /// A successful execution.
    pub fn success(label: impl Into<String>, latency: Duration) -> Self {
        Self {
            label: label.into(),
            success: true,
            latency,
            error: None,
        }
    }

    /// A failed execution.
    pub fn failure(label: impl Into<String>, latency: Duration, error: &Error) -> Self {
        Self {
            label: label.into(),
            success: false,
            latency,
            error: Some(error.to_string()),
        }
    }
}

/// Counters and latency distribution for a single label.
#[derive(Clone, Default)]
pub struct LabelStats {
    executions: u64,
    failures: u64,
    latency: DDSketch,
    errors: BTreeSet<String>,
}

impl LabelStats {
    /// Adds a single outcome.
    pub fn record(&mut self, outcome: &Outcome) {
        self.executions += 1;
        if !outcome.success {
            self.failures += 1;
        }
        self.latency.add(outcome.latency.as_secs_f64());
        if let Some(error) = &outcome.error {
            self.add_error(error);
        }
    }

    /// Combines `other` into `self`.
    pub fn merge(&mut self, other: &LabelStats) {
        self.executions += other.executions;
        self.failures += other.failures;
        if let Err(err) = self.latency.merge(&other.latency) {
            tracing::error!(error = %err, "failed to merge latency sketches");
        }
        for error in &other.errors {
            self.add_error(error);
        }
    }

    /// Total number of executions.
    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Number of failed executions.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Number of successful executions.
    pub fn successes(&self) -> u64 {
        self.executions - self.failures
    }

    // Keeping the smallest samples makes the kept set independent of insertion order.
    fn add_error(&mut self, error: &str) {
        if self.errors.contains(error) {
            return;
        }
        self.errors.insert(error.to_owned());
        if self.errors.len() > MAX_ERROR_SAMPLES {
            self.errors.pop_last();
        }
    }

    fn report(&self, elapsed: Duration) -> LabelReport {
        let secs = elapsed.as_secs_f64();
        LabelReport {
            executions: self.executions,
            successes: self.successes(),
            failures: self.failures,
            ops_per_sec: if secs > 0.0 {
                self.executions as f64 / secs
            } else {
                0.0
            },
            latency: LatencySummary::from_sketch(&self.latency),
            errors: self.errors.iter().cloned().collect(),
        }
    }
}

impl fmt::Debug for LabelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelStats")
            .field("executions", &self.executions)
            .field("failures", &self.failures)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// Collects outcomes from all virtual users of a run.
#[derive(Debug)]
pub struct Aggregator {
    started: Instant,
    labels: Mutex<BTreeMap<String, LabelStats>>,
}

impl Aggregator {
    /// Creates an empty aggregator, starting the clock for throughput figures.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            labels: Mutex::default(),
        }
    }

    /// Records one outcome.
    pub fn record(&self, outcome: Outcome) {
        let mut labels = self.labels.lock().unwrap_or_else(PoisonError::into_inner);
        labels.entry(outcome.label.clone()).or_default().record(&outcome);
    }

    /// Total executions and failures across all labels.
    pub fn totals(&self) -> (u64, u64) {
        let labels = self.labels.lock().unwrap_or_else(PoisonError::into_inner);
        labels.values().fold((0, 0), |(executions, failures), stats| {
            (executions + stats.executions, failures + stats.failures)
        })
    }

    /// Takes a snapshot of all statistics gathered so far.
    pub fn report(&self) -> Report {
        let elapsed = self.started.elapsed();
        let labels = self.labels.lock().unwrap_or_else(PoisonError::into_inner);

        let mut total = LabelStats::default();
        for stats in labels.values() {
            total.merge(stats);
        }

        Report {
            elapsed,
            labels: labels
                .iter()
                .map(|(label, stats)| (label.clone(), stats.report(elapsed)))
                .collect(),
            total: total.report(elapsed),
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time view of the aggregated statistics.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    /// Time since the aggregator was created.
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// Statistics per action label.
    pub labels: BTreeMap<String, LabelReport>,
    /// Statistics over all labels.
    pub total: LabelReport,
}

impl Report {
    /// Statistics for a single label, if it was ever executed.
    pub fn label(&self, label: &str) -> Option<&LabelReport> {
        self.labels.get(label)
    }
}

/// Statistics for one label in a [`Report`].
#[derive(Clone, Debug, Serialize)]
pub struct LabelReport {
    /// Total number of executions.
    pub executions: u64,
    /// Executions the service answered with success.
    pub successes: u64,
    /// Executions that failed, by status or transport error.
    pub failures: u64,
    /// Executions per second over the elapsed time.
    pub ops_per_sec: f64,
    /// Latency distribution, absent if nothing was executed.
    pub latency: Option<LatencySummary>,
    /// A few representative error details.
    pub errors: Vec<String>,
}

/// Latency percentiles of a label.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct LatencySummary {
    /// Mean latency.
    #[serde(with = "humantime_serde")]
    pub avg: Duration,
    /// Fastest execution.
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    /// Median.
    #[serde(with = "humantime_serde")]
    pub p50: Duration,
    /// 90th percentile.
    #[serde(with = "humantime_serde")]
    pub p90: Duration,
    /// 99th percentile.
    #[serde(with = "humantime_serde")]
    pub p99: Duration,
    /// Slowest execution.
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl LatencySummary {
    fn from_sketch(sketch: &DDSketch) -> Option<Self> {
        let count = sketch.count();
        if count == 0 {
            return None;
        }

        let quantile = |q| sketch.quantile(q).ok().flatten().map(secs);
        Some(Self {
            avg: secs(sketch.sum()? / count as f64),
            min: secs(sketch.min()?),
            p50: quantile(0.5)?,
            p90: quantile(0.9)?,
            p99: quantile(0.99)?,
            max: secs(sketch.max()?),
        })
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}
