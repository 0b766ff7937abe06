use std::time::Duration;

use reqwest::StatusCode;

/// Errors that can happen while configuring or running a load test.
///
/// Only the configuration errors ([`NoActionsConfigured`](Error::NoActionsConfigured),
/// [`InvalidWeight`](Error::InvalidWeight), [`InvalidPacing`](Error::InvalidPacing),
/// [`InvalidConfig`](Error::InvalidConfig) and [`Unreachable`](Error::Unreachable)) stop a run.
/// Everything else is absorbed by the virtual user that hit it and recorded as a failed outcome.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The action registry is empty, or its weights sum up to zero.
    #[error("no actions configured")]
    NoActionsConfigured,
    /// An action was configured with a weight of zero.
    #[error("action `{label}` must have a positive weight")]
    InvalidWeight {
        /// Label of the offending action.
        label: String,
    },
    /// The lower pacing bound exceeds the upper one.
    #[error("invalid wait interval: min {min:?} is larger than max {max:?}")]
    InvalidPacing {
        /// The configured lower bound.
        min: Duration,
        /// The configured upper bound.
        max: Duration,
    },
    /// Any other invalid run configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The startup probe could not reach the target service.
    #[error("target `{url}` is unreachable")]
    Unreachable {
        /// The probed URL.
        url: String,
        /// The transport error returned by the probe.
        #[source]
        source: reqwest::Error,
    },
    /// Fetching reference data during user setup did not succeed.
    #[error("setup failed: {0}")]
    SetupFailed(#[source] Box<Error>),
    /// The target service responded with a non-success status.
    #[error("unexpected status {0}")]
    UnexpectedStatus(StatusCode),
    /// Network-level failure, including request timeouts.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    /// A response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
