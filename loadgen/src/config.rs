//! Configuration for a load test run.
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `LOADGEN__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! The defaults describe the classic pet clinic mix: listing owners, fetching single owners,
//! listing veterinarians and creating owners at a ratio of 4:3:2:1.
//!
//! # Environment Variables
//!
//! Environment variables use `LOADGEN__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `LOADGEN__REMOTE=http://gateway:8080` sets the target service
//! - `LOADGEN__USERS=50` sets the number of concurrent users
//! - `LOADGEN__WAIT__MAX=10s` sets the upper bound of the think-time
//!
//! # YAML Configuration File
//!
//! ```yaml
//! remote: http://localhost:8080
//! users: 10
//! spawn_rate: 2
//! wait:
//!   min: 1s
//!   max: 4s
//! duration: 5m
//!
//! setup:
//!   name: GET /owners (setup)
//!   path: /api/customer/owners
//!
//! actions:
//!   - name: GET /owners (list)
//!     weight: 4
//!     request: { type: list, path: /api/customer/owners }
//!   - name: POST /owners (create)
//!     weight: 1
//!     request: { type: create, path: /api/customer/owners }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::registry::Weight;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "LOADGEN__";

/// Bounds of the think-time between two actions of a user.
///
/// Used in: [`Config::wait`]
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Wait {
    /// Shortest wait.
    ///
    /// # Default
    ///
    /// `1s`
    #[serde(with = "humantime_serde")]
    pub min: Duration,

    /// Longest wait. Must not be smaller than `min`.
    ///
    /// # Default
    ///
    /// `4s`
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl Default for Wait {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(1),
            max: Duration::from_secs(4),
        }
    }
}

/// The setup step run once by every user.
///
/// Used in: [`Config::setup`]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SetupConfig {
    /// Label the setup request is reported under.
    pub name: String,
    /// Collection listing the reference records. Every record must carry an `id` field.
    pub path: String,
}

/// The request an action issues.
///
/// The `type` field in YAML determines which variant is used.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RequestConfig {
    /// `GET <path>`.
    List {
        /// Collection path.
        path: String,
    },
    /// `GET <path>/{id}` with an identifier from the user's reference data.
    ///
    /// Skipped while the user has no reference data.
    Detail {
        /// Collection path.
        path: String,
    },
    /// `POST <path>` with a generated owner record.
    Create {
        /// Collection path.
        path: String,
    },
}

/// One entry of the action table.
///
/// Used in: [`Config::actions`]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActionConfig {
    /// Label for reporting.
    pub name: String,
    /// Relative weight, must be positive.
    pub weight: Weight,
    /// The request to issue.
    pub request: RequestConfig,
}

impl ActionConfig {
    fn new(name: &str, weight: Weight, request: RequestConfig) -> Self {
        Self {
            name: name.to_owned(),
            weight,
            request,
        }
    }
}

/// Main configuration struct for a load test run.
///
/// Read-only once loaded. See the module documentation for how to set these fields.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the target service.
    ///
    /// # Default
    ///
    /// `http://localhost:8080`
    pub remote: String,

    /// Number of concurrent virtual users.
    ///
    /// # Default
    ///
    /// `10`
    pub users: usize,

    /// Number of users started per second while ramping up.
    ///
    /// # Default
    ///
    /// `1.0`
    pub spawn_rate: f64,

    /// Think-time between two actions of a user.
    pub wait: Wait,

    /// Total run time. Runs until interrupted if absent.
    ///
    /// # Default
    ///
    /// `None`
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,

    /// Timeout for every individual request.
    ///
    /// # Default
    ///
    /// `10s`
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// How long users get to stop before they are abandoned.
    ///
    /// # Default
    ///
    /// `5s`
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Whether to check that the target is reachable before starting any user.
    ///
    /// # Default
    ///
    /// `true`
    pub probe: bool,

    /// Seed for the random number generators of all users, for repeatable runs.
    ///
    /// # Default
    ///
    /// `None` (random)
    pub seed: Option<u64>,

    /// Reference data fetched by every user on start.
    pub setup: Option<SetupConfig>,

    /// The weighted action table.
    pub actions: Vec<ActionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let owners = "/api/customer/owners";
        Self {
            remote: "http://localhost:8080".to_owned(),
            users: 10,
            spawn_rate: 1.0,
            wait: Wait::default(),
            duration: None,
            request_timeout: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(5),
            probe: true,
            seed: None,
            setup: Some(SetupConfig {
                name: "GET /owners (setup)".to_owned(),
                path: owners.to_owned(),
            }),
            actions: vec![
                ActionConfig::new(
                    "GET /owners (list)",
                    4,
                    RequestConfig::List {
                        path: owners.to_owned(),
                    },
                ),
                ActionConfig::new(
                    "GET /owners/{id} (detail)",
                    3,
                    RequestConfig::Detail {
                        path: owners.to_owned(),
                    },
                ),
                ActionConfig::new(
                    "GET /vets (list)",
                    2,
                    RequestConfig::List {
                        path: "/api/vet/vets".to_owned(),
                    },
                ),
                ActionConfig::new(
                    "POST /owners (create)",
                    1,
                    RequestConfig::Create {
                        path: owners.to_owned(),
                    },
                ),
            ],
        }
    }
}

impl Config {
    /// Loads configuration from the provided YAML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the population settings and the target URL.
    ///
    /// The action table and the wait bounds are validated when the scenario is built.
    pub fn validate(&self) -> Result<(), Error> {
        if self.users == 0 {
            return Err(Error::InvalidConfig("`users` must be at least 1".into()));
        }
        if !self.spawn_rate.is_finite() || self.spawn_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "`spawn_rate` must be a positive number, got {}",
                self.spawn_rate
            )));
        }
        if self.wait.min > self.wait.max {
            return Err(Error::InvalidPacing {
                min: self.wait.min,
                max: self.wait.max,
            });
        }
        if let Err(err) = reqwest::Url::parse(&self.remote) {
            return Err(Error::InvalidConfig(format!(
                "invalid remote `{}`: {err}",
                self.remote
            )));
        }
        if self.actions.is_empty() {
            return Err(Error::NoActionsConfigured);
        }
        Ok(())
    }
}
