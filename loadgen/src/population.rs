//! Spawns, supervises and stops the set of live virtual users.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::Config;
use crate::http::Session;
use crate::scenario::Scenario;
use crate::stats::{Aggregator, Report};
use crate::user::VirtualUser;

/// Slowest supported ramp-up, one user per day.
const MAX_SPAWN_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// How many users to run, how quickly to bring them up, and how to tear them down.
#[derive(Clone, Debug)]
pub struct PopulationSettings {
    /// Base URL of the target service.
    pub remote: String,
    /// Target number of concurrently live users.
    pub users: usize,
    /// New users per second while ramping up.
    pub spawn_rate: f64,
    /// Upper bound for every single request.
    pub request_timeout: Duration,
    /// Grace period for users to stop before they are abandoned.
    pub stop_timeout: Duration,
    /// Seeds user `n` with `seed + n`. Random if absent.
    pub seed: Option<u64>,
}

impl PopulationSettings {
    fn spawn_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.spawn_rate.recip())
            .unwrap_or(MAX_SPAWN_INTERVAL)
            .clamp(Duration::from_nanos(1), MAX_SPAWN_INTERVAL)
    }

    fn rng_for(&self, id: usize) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id as u64)),
            None => SmallRng::seed_from_u64(rand::random()),
        }
    }
}

impl From<&Config> for PopulationSettings {
    fn from(config: &Config) -> Self {
        Self {
            remote: config.remote.clone(),
            users: config.users,
            spawn_rate: config.spawn_rate,
            request_timeout: config.request_timeout,
            stop_timeout: config.stop_timeout,
            seed: config.seed,
        }
    }
}

/// The result of stopping a [`Population`].
#[derive(Clone, Debug)]
pub struct RunResult {
    /// Final statistics.
    pub report: Report,
    /// Users that stopped within the grace period.
    pub stopped: usize,
    /// Users that had to be abandoned after the grace period.
    pub abandoned: usize,
}

/// A running set of virtual users.
///
/// Dropping the population without calling [`stop`](Self::stop) still signals every user to
/// stop, but nobody waits for them.
#[derive(Debug)]
pub struct Population {
    stats: Arc<Aggregator>,
    live: Arc<AtomicUsize>,
    cancel: CancellationToken,
    supervisor: JoinHandle<(usize, usize)>,
    _cancel_on_drop: DropGuard,
}

impl Population {
    /// Starts ramping up users in the background.
    ///
    /// Users are spawned one at a time, spaced by `1 / spawn_rate`, until `users` are live.
    pub fn spawn(settings: PopulationSettings, scenario: Scenario) -> Self {
        let stats = Arc::new(Aggregator::new());
        let live = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let supervisor = tokio::spawn(supervise(
            settings,
            Arc::new(scenario),
            Arc::clone(&stats),
            Arc::clone(&live),
            cancel.clone(),
        ));

        Self {
            stats,
            live,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            supervisor,
        }
    }

    /// Number of users currently running.
    pub fn live_users(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// The shared outcome aggregator.
    pub fn stats(&self) -> &Aggregator {
        &self.stats
    }

    /// A snapshot of the statistics so far.
    pub fn report(&self) -> Report {
        self.stats.report()
    }

    /// Signals all users to stop and waits for them, at most for the configured grace period.
    pub async fn stop(self) -> RunResult {
        self.cancel.cancel();

        let (stopped, abandoned) = match self.supervisor.await {
            Ok(counts) => counts,
            Err(err) => {
                tracing::error!(error = &err as &dyn std::error::Error, "supervisor failed");
                (0, self.live.load(Ordering::Relaxed))
            }
        };

        RunResult {
            report: self.stats.report(),
            stopped,
            abandoned,
        }
    }
}

/// Decrements the live user count when a user task ends, including when it is aborted.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(live))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

async fn supervise(
    settings: PopulationSettings,
    scenario: Arc<Scenario>,
    stats: Arc<Aggregator>,
    live: Arc<AtomicUsize>,
    cancel: CancellationToken,
) -> (usize, usize) {
    let mut users = JoinSet::new();
    let mut next_id = 0;

    let mut ticker = tokio::time::interval(settings.spawn_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        users = settings.users,
        spawn_rate = settings.spawn_rate,
        "ramping up users"
    );

    while users.len() < settings.users {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => (),
        }

        let id = next_id;
        next_id += 1;

        let guard = LiveGuard::new(&live);
        let remote = settings.remote.clone();
        let request_timeout = settings.request_timeout;
        let rng = settings.rng_for(id);
        let scenario = Arc::clone(&scenario);
        let stats = Arc::clone(&stats);
        let token = cancel.child_token();

        users.spawn(async move {
            let _guard = guard;
            // Client construction is blocking, keep it off the supervisor.
            let session = match Session::new(&remote, request_timeout, rng) {
                Ok(session) => session,
                Err(err) => {
                    tracing::error!(
                        user = id,
                        error = &err as &dyn std::error::Error,
                        "failed to create session"
                    );
                    return None;
                }
            };

            let user = VirtualUser::new(id, session);
            Some(user.run(scenario, stats, token).await)
        });
    }

    if !cancel.is_cancelled() {
        tracing::info!(users = users.len(), "all users spawned");
    }

    // Users only end on their own if they panic or fail to start.
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(joined) = users.join_next() => {
                if let Err(err) = joined {
                    tracing::error!(error = &err as &dyn std::error::Error, "user crashed");
                }
            }
        }
    }

    tracing::info!(users = users.len(), "stopping users");
    let mut stopped = 0;
    let grace = tokio::time::sleep(settings.stop_timeout);
    tokio::pin!(grace);

    loop {
        tokio::select! {
            _ = &mut grace => break,
            joined = users.join_next() => match joined {
                Some(Ok(Some(_user))) => stopped += 1,
                Some(Ok(None)) => (),
                Some(Err(err)) => {
                    tracing::error!(error = &err as &dyn std::error::Error, "user crashed");
                }
                None => break,
            },
        }
    }

    let abandoned = users.len();
    if abandoned > 0 {
        tracing::warn!(abandoned, "abandoning users that did not stop in time");
        users.abort_all();
    }

    tracing::info!(stopped, abandoned, "all users stopped");
    (stopped, abandoned)
}
