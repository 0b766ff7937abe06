//! Run a configured load test against the target service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Config;
use crate::error::Result;
use crate::http;
use crate::population::{Population, PopulationSettings, RunResult};
use crate::records::OwnerRecords;
use crate::scenario::Scenario;

/// Runs a load test until the configured duration elapses or `shutdown` resolves.
///
/// The configuration is validated and the target probed before any user starts, so a broken
/// setup fails fast. After that, no failing request ends the run early.
pub async fn run(config: Config, shutdown: impl Future<Output = ()>) -> Result<RunResult> {
    config.validate()?;
    let scenario = Scenario::from_config(&config, Arc::new(OwnerRecords))?;

    if config.probe {
        http::probe(&config.remote, config.request_timeout).await?;
    }

    tracing::info!(remote = %config.remote, duration = ?config.duration, "starting load test");
    let population = Population::spawn(PopulationSettings::from(&config), scenario);

    let style = ProgressStyle::with_template("{spinner} {msg} {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = ProgressBar::new_spinner().with_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));

    let deadline = async {
        match config.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    tokio::pin!(shutdown);

    let mut progress = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut shutdown => {
                tracing::info!("load test interrupted");
                break;
            }
            _ = progress.tick() => {
                let (executions, failures) = population.stats().totals();
                bar.set_message(format!(
                    "Running load test: {} users, {executions} requests, {failures} failures",
                    population.live_users()
                ));
            }
        }
    }

    bar.set_message("Stopping users...");
    let result = population.stop().await;
    bar.finish_and_clear();

    Ok(result)
}
