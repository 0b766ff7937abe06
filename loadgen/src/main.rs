//! This is a load generator binary which emulates concurrent users of a REST service.
//!
//! Every user fetches the identifiers of existing records once, then keeps picking one of the
//! configured actions by weight, pausing a random think-time between two actions.
//!
//! See [`loadgen::config`] for the configuration format.

use std::path::PathBuf;

use anyhow::Context;
use argh::FromArgs;

use loadgen::Config;
use loadgen::observability::init_tracing;
use loadgen::report::print_run;

/// Load generator for REST services.
#[derive(Debug, FromArgs)]
pub struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    /// write the final report as JSON to this path
    #[argh(option)]
    pub report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    init_tracing();

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config);

    let shutdown = tokio::spawn(async {
        elegant_departure::tokio::depart()
            .on_termination()
            .on_sigint()
            .await;
    });

    let result = loadgen::run(config, async move {
        shutdown.await.ok();
    })
    .await?;

    print_run(&result);

    if let Some(path) = args.report {
        let file = std::fs::File::create(&path).context("failed to create report file")?;
        serde_json::to_writer_pretty(file, &result.report).context("failed to write report")?;
        tracing::info!(path = %path.display(), "report written");
    }

    Ok(())
}
