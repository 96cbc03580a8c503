use std::fs;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use ingest::{ReportFileSource, UsageQuery, UsageSource};
use tempfile::tempdir;
use tokio::sync::watch;
use tracker_app::{PollMessage, Poller, TrackerConfig, TrackerSession, load_initial_pricing};
use tracker_core::UsageBucket;

/// Reports a steadily growing gpt-4o total, with a corrupt report on the third poll.
struct GrowingSource {
    polls: i64,
}

impl UsageSource for GrowingSource {
    fn fetch(&mut self, query: &UsageQuery) -> ingest::Result<Vec<UsageBucket>> {
        self.polls += 1;
        let input_tokens = if self.polls == 3 { -1 } else { 1_000 * self.polls };
        Ok(vec![UsageBucket {
            model: "gpt-4o".to_string(),
            start_time: query.window.start_time,
            end_time: query.window.end_time,
            input_tokens,
            cached_input_tokens: 0,
            output_tokens: 0,
            requests: self.polls,
        }])
    }
}

fn fast_config() -> TrackerConfig {
    TrackerConfig {
        interval_secs: 0.02,
        ..TrackerConfig::default()
    }
    .validate()
    .expect("config")
}

async fn next(rx: &mut tokio::sync::mpsc::Receiver<PollMessage>) -> PollMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("poll in time")
        .expect("poller running")
}

#[tokio::test]
async fn poller_reports_cycles_failures_and_stops() {
    let pricing = load_initial_pricing().expect("pricing");
    let session = Arc::new(TrackerSession::new(fast_config(), pricing));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut rx = Poller::new(session.clone(), GrowingSource { polls: 0 }).start(shutdown_rx);

    let PollMessage::Cycle(first) = next(&mut rx).await else {
        panic!("first cycle should succeed");
    };
    assert!(first.window.is_some());
    assert!(first.rates.is_empty());
    assert_eq!(first.snapshot.get("gpt-4o").expect("gpt-4o").input_tokens, 1_000);
    assert!(!first.costs.partial);

    let PollMessage::Cycle(second) = next(&mut rx).await else {
        panic!("second cycle should succeed");
    };
    assert_eq!(second.rates.get("gpt-4o").expect("rate").delta_tokens, 1_000);

    let PollMessage::CycleFailed { message, .. } = next(&mut rx).await else {
        panic!("third cycle should fail");
    };
    assert!(message.contains("negative input_tokens"));
    assert_eq!(
        session
            .previous_snapshot()
            .expect("kept")
            .get("gpt-4o")
            .expect("gpt-4o")
            .input_tokens,
        2_000
    );

    let PollMessage::Cycle(fourth) = next(&mut rx).await else {
        panic!("fourth cycle should succeed");
    };
    let rate = fourth.rates.get("gpt-4o").expect("rate");
    assert_eq!(rate.delta_tokens, 2_000);
    assert!(rate.tokens_per_minute > 0.0);

    shutdown_tx.send(true).expect("signal shutdown");
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok(), "poller should stop after shutdown");
}

/// Records which thread each fetch ran on.
struct ThreadRecordingSource {
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl UsageSource for ThreadRecordingSource {
    fn fetch(&mut self, query: &UsageQuery) -> ingest::Result<Vec<UsageBucket>> {
        self.threads.lock().push(thread::current().id());
        Ok(vec![UsageBucket {
            model: "gpt-4o".to_string(),
            start_time: query.window.start_time,
            end_time: query.window.end_time,
            input_tokens: 10,
            cached_input_tokens: 0,
            output_tokens: 0,
            requests: 1,
        }])
    }
}

#[tokio::test]
async fn poller_fetches_off_the_runtime_thread() {
    let threads = Arc::new(Mutex::new(Vec::new()));
    let source = ThreadRecordingSource {
        threads: Arc::clone(&threads),
    };
    let pricing = load_initial_pricing().expect("pricing");
    let session = Arc::new(TrackerSession::new(fast_config(), pricing));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut rx = Poller::new(session, source).start(shutdown_rx);

    let PollMessage::Cycle(_) = next(&mut rx).await else {
        panic!("cycle should succeed");
    };
    shutdown_tx.send(true).expect("signal shutdown");

    let runtime_thread = thread::current().id();
    let threads = threads.lock();
    assert!(!threads.is_empty());
    assert!(threads.iter().all(|id| *id != runtime_thread));
}

#[test]
fn run_once_reads_report_file() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("usage.json");
    let end = Utc::now().timestamp();
    let report = format!(
        r#"{{"data":[{{"start_time":{},"end_time":{},"results":[
            {{"model":"gpt-4o","input_tokens":1000,"output_tokens":500,"input_cached_tokens":0,"num_model_requests":10}},
            {{"model":"internal-preview","input_tokens":10,"output_tokens":10,"num_model_requests":1}}
        ]}}],"has_more":false,"next_page":null}}"#,
        end - 3_600,
        end
    );
    fs::write(&path, report).expect("write report");

    let session = TrackerSession::new(
        TrackerConfig::default(),
        load_initial_pricing().expect("pricing"),
    );
    let mut source = ReportFileSource::new(&path);
    let report = session.run_once(&mut source, Utc::now()).expect("cycle");

    let gpt = report.snapshot.get("gpt-4o").expect("gpt-4o");
    assert_eq!(gpt.total_tokens(), 1_500);
    assert_eq!(gpt.requests, 10);
    assert!(report.rates.is_empty());
    assert!(report.costs.partial);
    assert_eq!(report.costs.unpriced_models, vec!["internal-preview".to_string()]);
    let expected = (1_000.0 * 2.5 + 500.0 * 10.0) / 1_000_000.0;
    assert!((report.costs.total_cost_usd - expected).abs() < 1e-12);
}
