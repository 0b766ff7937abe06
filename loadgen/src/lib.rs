//! A load generator emulating concurrent users of a REST service.
//!
//! A [`Population`] brings up a configured number of [`VirtualUser`]s at a bounded spawn rate.
//! Each user first fetches reference data, such as the identifiers of existing records, and then
//! repeatedly waits a random think-time and executes one action out of a weighted
//! [`ActionRegistry`]. The long-run frequency of each action converges to its share of the total
//! weight.
//!
//! Every outcome is recorded per action label. The resulting [`Report`] carries execution and
//! failure counts along with latency percentiles, and can be queried while the run is going on.
//!
//! Failed requests never stop a user. Only configuration errors, such as an empty action table
//! or an unreachable target, prevent a run from starting.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod http;
pub mod loadtest;
pub mod observability;
pub mod pacing;
pub mod population;
pub mod records;
pub mod reference;
pub mod registry;
pub mod report;
pub mod requests;
pub mod scenario;
pub mod selector;
pub mod stats;
pub mod user;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::loadtest::run;
pub use crate::population::{Population, PopulationSettings, RunResult};
pub use crate::registry::{ActionRegistry, Execute, Execution};
pub use crate::scenario::Scenario;
pub use crate::stats::{Outcome, Report};
pub use crate::user::VirtualUser;
