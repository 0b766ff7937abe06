//! The control loop of a single simulated user.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::http::Session;
use crate::reference::{self, ReferenceId};
use crate::registry::Execution;
use crate::scenario::{Scenario, Setup};
use crate::stats::{Aggregator, Outcome};

/// The lifecycle states of a [`VirtualUser`].
///
/// A user moves `Created -> Setup -> Ready`, then cycles through
/// `Pacing -> Selecting -> Executing -> Ready` until it is stopped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserState {
    /// Spawned, but not yet running.
    Created,
    /// Fetching reference data.
    Setup,
    /// Between two cycles.
    Ready,
    /// Waiting out the think-time before the next action.
    Pacing,
    /// Drawing the next action.
    Selecting,
    /// Waiting for the action's request to complete.
    Executing,
    /// Stopped for good.
    Stopped,
}

/// One simulated client session.
///
/// The user exclusively owns its [`Session`], including its connection pool, random number
/// generator and reference data. Nothing else mutates it while the user runs.
#[derive(Debug)]
pub struct VirtualUser {
    id: usize,
    session: Session,
    setup_complete: bool,
    state: UserState,
}

impl VirtualUser {
    /// Creates a user in state [`UserState::Created`].
    pub fn new(id: usize, session: Session) -> Self {
        Self {
            id,
            session,
            setup_complete: false,
            state: UserState::Created,
        }
    }

    /// Sequence number of this user within its population.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The current lifecycle state.
    pub fn state(&self) -> UserState {
        self.state
    }

    /// Whether the setup step has finished, successfully or degraded.
    pub fn setup_complete(&self) -> bool {
        self.setup_complete
    }

    /// The identifiers fetched during setup. Empty if setup failed.
    pub fn reference_ids(&self) -> &[ReferenceId] {
        self.session.reference_ids()
    }

    /// Runs setup once, then executes actions until `cancel` fires.
    ///
    /// Failed actions are recorded in `stats` and never end the loop. An action still in flight
    /// when `cancel` fires is abandoned without an outcome.
    pub async fn run(
        mut self,
        scenario: Arc<Scenario>,
        stats: Arc<Aggregator>,
        cancel: CancellationToken,
    ) -> Self {
        tracing::trace!(user = self.id, "starting user");

        self.state = UserState::Setup;
        if let Some(setup) = scenario.setup() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.stop(),
                _ = self.setup(setup, &stats) => (),
            }
        }
        self.setup_complete = true;
        self.state = UserState::Ready;

        loop {
            self.state = UserState::Pacing;
            if !scenario.pacing().wait(self.session.rng(), &cancel).await {
                break;
            }
            if cancel.is_cancelled() {
                break;
            }

            self.state = UserState::Selecting;
            let entry = scenario.selector().select(self.session.rng());

            self.state = UserState::Executing;
            let start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = entry.execute(&mut self.session) => result,
            };
            let latency = start.elapsed();

            match result {
                Ok(Execution::Completed) => stats.record(Outcome::success(entry.label(), latency)),
                Ok(Execution::Skipped) => {
                    tracing::trace!(user = self.id, action = entry.label(), "skipped action");
                }
                Err(err) => {
                    tracing::debug!(
                        user = self.id,
                        action = entry.label(),
                        error = &err as &dyn std::error::Error,
                        "action failed"
                    );
                    stats.record(Outcome::failure(entry.label(), latency, &err));
                }
            }

            self.state = UserState::Ready;
        }

        self.stop()
    }

    async fn setup(&mut self, setup: &Setup, stats: &Aggregator) {
        let url = self.session.url(&setup.path);
        let start = Instant::now();

        match reference::fetch_reference_ids(self.session.client(), &url).await {
            Ok(ids) => {
                stats.record(Outcome::success(&setup.label, start.elapsed()));
                if ids.is_empty() {
                    tracing::warn!(
                        user = self.id,
                        %url,
                        "no reference data found, detail actions will be skipped"
                    );
                }
                self.session.set_reference_ids(ids);
            }
            Err(err) => {
                stats.record(Outcome::failure(&setup.label, start.elapsed(), &err));
                tracing::warn!(
                    user = self.id,
                    %url,
                    error = &err as &dyn std::error::Error,
                    "continuing without reference data"
                );
            }
        }
    }

    fn stop(mut self) -> Self {
        self.state = UserState::Stopped;
        tracing::trace!(user = self.id, "user stopped");
        self
    }
}
