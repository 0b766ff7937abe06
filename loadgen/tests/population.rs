use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use loadgen::config::{Config, Wait};
use loadgen::http::Session;
use loadgen::pacing::Pacing;
use loadgen::records::OwnerRecords;
use loadgen::{
    ActionRegistry, Execute, Execution, Population, PopulationSettings, Report, Scenario,
};
use loadgen_test::server::TestServer;

const LIST: &str = "GET /owners (list)";
const DETAIL: &str = "GET /owners/{id} (detail)";
const VETS: &str = "GET /vets (list)";
const CREATE: &str = "POST /owners (create)";

/// Counts executions without talking to any service.
#[derive(Debug, Default, Clone)]
struct Counting(Arc<AtomicU64>);

#[async_trait]
impl Execute for Counting {
    async fn execute(&self, _session: &mut Session) -> loadgen::Result<Execution> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Execution::Completed)
    }
}

fn settings(remote: String, users: usize, spawn_rate: f64) -> PopulationSettings {
    PopulationSettings {
        remote,
        users,
        spawn_rate,
        request_timeout: Duration::from_secs(5),
        stop_timeout: Duration::from_secs(5),
        seed: Some(1),
    }
}

/// The default action mix with think-times scaled down from seconds to milliseconds.
fn clinic_config(server: &TestServer) -> Config {
    Config {
        remote: server.remote(),
        users: 10,
        spawn_rate: 1000.0,
        wait: Wait {
            min: Duration::from_millis(1),
            max: Duration::from_millis(4),
        },
        seed: Some(1234),
        ..Default::default()
    }
}

async fn run_until(population: &Population, executions: u64) {
    let wait = async {
        while population.stats().totals().0 < executions {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(60), wait)
        .await
        .expect("timed out waiting for executions");
}

fn executions(report: &Report, label: &str) -> u64 {
    report.label(label).map_or(0, |stats| stats.executions)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mix_converges_to_weights() {
    loadgen_test::tracing::init();
    let server = TestServer::new().await;
    let config = clinic_config(&server);

    let scenario = Scenario::from_config(&config, Arc::new(OwnerRecords)).unwrap();
    let population = Population::spawn(PopulationSettings::from(&config), scenario);

    run_until(&population, 5000).await;
    let result = population.stop().await;
    let report = result.report;

    assert_eq!(result.stopped, 10);
    assert_eq!(result.abandoned, 0);
    assert_eq!(report.total.failures, 0, "{:?}", report.total.errors);
    assert_eq!(executions(&report, "GET /owners (setup)"), 10);

    let list = executions(&report, LIST) as f64;
    let detail = executions(&report, DETAIL) as f64;
    let vets = executions(&report, VETS) as f64;
    let create = executions(&report, CREATE) as f64;
    assert!(list + detail + vets + create >= 4990.0);

    let ratio = list / create;
    assert!((3.2..=4.8).contains(&ratio), "list/create ratio was {ratio}");
    let ratio = vets / create;
    assert!((1.6..=2.4).contains(&ratio), "vets/create ratio was {ratio}");
    let ratio = detail / create;
    assert!((2.4..=3.6).contains(&ratio), "detail/create ratio was {ratio}");

    // creates still in flight when stopping reach the server without being recorded
    assert!(server.created() >= create as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_failure_is_reported() {
    let server = TestServer::builder().owners(10).failing().start().await;
    let config = Config {
        users: 5,
        ..clinic_config(&server)
    };

    let scenario = Scenario::from_config(&config, Arc::new(OwnerRecords)).unwrap();
    let population = Population::spawn(PopulationSettings::from(&config), scenario);

    run_until(&population, 300).await;
    let result = population.stop().await;
    let report = result.report;

    assert_eq!(result.stopped, 5);
    assert_eq!(report.total.successes, 0);
    assert_eq!(report.total.failures, report.total.executions);
    for (label, stats) in &report.labels {
        assert_eq!(stats.failures, stats.executions, "{label}");
        assert!(
            stats.errors.iter().any(|error| error.contains("500")),
            "{label}: {:?}",
            stats.errors
        );
    }

    // without reference data, detail actions never run
    assert_eq!(executions(&report, DETAIL), 0);
    assert_eq!(executions(&report, "GET /owners (setup)"), 5);
}

#[tokio::test]
async fn never_exceeds_target_users() {
    let counter = Counting::default();
    let registry = ActionRegistry::builder()
        .action("count", 1, counter.clone())
        .build()
        .unwrap();
    let pacing = Pacing::constant(Duration::from_millis(5));
    let scenario = Scenario::new(None, registry, pacing).unwrap();

    let start = Instant::now();
    let population = Population::spawn(settings("http://localhost".into(), 5, 50.0), scenario);

    let mut max_live = 0;
    let mut ramped_up = None;
    while start.elapsed() < Duration::from_millis(500) {
        let live = population.live_users();
        max_live = max_live.max(live);
        if live == 5 && ramped_up.is_none() {
            ramped_up = Some(start.elapsed());
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    assert_eq!(max_live, 5);
    // 50 users per second spaces users by 20ms, the fifth comes up after four intervals
    let ramped_up = ramped_up.expect("population never reached its target");
    assert!(ramped_up >= Duration::from_millis(75), "ramped up after {ramped_up:?}");

    let result = population.stop().await;
    assert_eq!(result.stopped, 5);
    assert!(counter.0.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn stop_halts_new_executions() {
    let counter = Counting::default();
    let registry = ActionRegistry::builder()
        .action("count", 1, counter.clone())
        .build()
        .unwrap();
    let pacing = Pacing::new(Duration::from_millis(5), Duration::from_millis(10)).unwrap();
    let scenario = Scenario::new(None, registry, pacing).unwrap();

    let population = Population::spawn(settings("http://localhost".into(), 4, 1000.0), scenario);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(population.live_users(), 4);

    let start = Instant::now();
    let result = population.stop().await;
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(result.stopped, 4);
    assert_eq!(result.abandoned, 0);

    let executed = counter.0.load(Ordering::SeqCst);
    assert!(executed > 0);
    assert_eq!(result.report.total.executions, executed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(counter.0.load(Ordering::SeqCst), executed);
}

#[tokio::test]
async fn dropping_the_population_stops_its_users() {
    let counter = Counting::default();
    let registry = ActionRegistry::builder()
        .action("count", 1, counter.clone())
        .build()
        .unwrap();
    let pacing = Pacing::constant(Duration::from_millis(2));
    let scenario = Scenario::new(None, registry, pacing).unwrap();

    let population = Population::spawn(settings("http://localhost".into(), 3, 1000.0), scenario);
    run_until(&population, 10).await;
    drop(population);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_drop = counter.0.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(counter.0.load(Ordering::SeqCst), after_drop);
}

#[tokio::test]
async fn ramp_up_is_not_held_back_by_users() {
    let counter = Counting::default();
    let registry = ActionRegistry::builder()
        .action("count", 1, counter.clone())
        .build()
        .unwrap();
    let pacing = Pacing::constant(Duration::from_millis(1));
    let scenario = Scenario::new(None, registry, pacing).unwrap();

    let population = Population::spawn(settings("http://localhost".into(), 20, 1000.0), scenario);
    let ramp = async {
        while population.live_users() < 20 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), ramp)
        .await
        .expect("ramp-up did not reach the target");
    run_until(&population, 20).await;

    let result = population.stop().await;
    assert_eq!(result.stopped, 20);
}

#[tokio::test]
async fn stop_interrupts_slow_requests() {
    let server = TestServer::builder()
        .owners(1)
        .latency(Duration::from_secs(30))
        .start()
        .await;
    let config = Config {
        users: 3,
        ..clinic_config(&server)
    };

    let scenario = Scenario::from_config(&config, Arc::new(OwnerRecords)).unwrap();
    let population = Population::spawn(PopulationSettings::from(&config), scenario);

    while server.requests() < 3 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let start = Instant::now();
    let result = population.stop().await;
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(result.stopped, 3);
    assert_eq!(result.report.total.executions, 0);
}

#[tokio::test]
async fn report_is_available_during_the_run() {
    let counter = Counting::default();
    let registry = ActionRegistry::builder()
        .action("count", 1, counter.clone())
        .build()
        .unwrap();
    let pacing = Pacing::constant(Duration::from_millis(1));
    let scenario = Scenario::new(None, registry, pacing).unwrap();

    let population = Population::spawn(settings("http://localhost".into(), 2, 1000.0), scenario);
    run_until(&population, 50).await;

    let report = population.report();
    assert!(report.label("count").unwrap().executions >= 50);
    assert!(report.label("count").unwrap().latency.is_some());

    let result = population.stop().await;
    assert!(result.report.total.executions >= report.total.executions);
}
