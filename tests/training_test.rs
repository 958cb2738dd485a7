//! Corpus collection, JSONL export and the retraining job.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use muninn::store::{MemoryStore, RecordGateway};
use muninn::training::{
    ChannelTrainingSink, JsonlCorpusExporter, RetrainOutcome, Retrainer, RetrainingJob,
    TrainingSample, TrainingSink, collect_corpus,
};
use muninn::{CacheRecord, MuninnError, Result};

/// Counts runs and the size of the last corpus.
#[derive(Default)]
struct CountingRetrainer {
    runs: AtomicUsize,
    last_size: AtomicUsize,
}

#[async_trait]
impl Retrainer for CountingRetrainer {
    fn name(&self) -> &str {
        "counting"
    }

    async fn retrain(&self, corpus: &[TrainingSample]) -> Result<()> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.last_size.store(corpus.len(), Ordering::Relaxed);
        Ok(())
    }
}

fn seeded() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_hash(
        "proxy:b",
        &[
            ("request_method", "GET"),
            ("request_url", "/b"),
            ("response", "bee"),
        ],
    );
    store.insert_hash(
        "proxy:a",
        &[
            ("request_method", "GET"),
            ("request_url", "/a"),
            ("response", "ay"),
        ],
    );
    // No response: contributes nothing.
    store.insert_hash("proxy:c", &[("request_method", "GET"), ("request_url", "/c")]);
    // Malformed: skipped.
    store.insert_hash("proxy:d", &[("response", "orphan")]);
    store.set_counter("stats:total_requests", 4);
    store
}

// =============================================================================
// Corpus
// =============================================================================

#[tokio::test]
async fn corpus_is_ordered_and_skips_unusable_records() {
    let gateway = RecordGateway::new(seeded());
    let corpus = collect_corpus(&gateway, "proxy:*").await.unwrap();

    let keys: Vec<_> = corpus.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, ["proxy:a", "proxy:b"]);
    assert_eq!(corpus[0].text, "Request URL: /a\nResponse: ay");
}

#[tokio::test]
async fn exporter_writes_one_json_line_per_sample() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = JsonlCorpusExporter::new(dir.path().join("corpus"));
    let corpus = collect_corpus(&RecordGateway::new(seeded()), "proxy:*")
        .await
        .unwrap();

    let path = exporter.export(&corpus).await.unwrap();
    assert!(path.starts_with(exporter.dir()));

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["text"], "Request URL: /b\nResponse: bee");
}

#[tokio::test]
async fn repeated_exports_do_not_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = JsonlCorpusExporter::new(dir.path());
    let corpus = collect_corpus(&RecordGateway::new(seeded()), "proxy:*")
        .await
        .unwrap();

    let first = exporter.export(&corpus).await.unwrap();
    let second = exporter.export(&corpus).await.unwrap();
    assert_ne!(first, second);
    assert!(first.exists() && second.exists());
}

// =============================================================================
// Retraining job
// =============================================================================

#[tokio::test]
async fn run_once_retrains_on_store_contents() {
    let retrainer = Arc::new(CountingRetrainer::default());
    let mut job = RetrainingJob::new(
        RecordGateway::new(seeded()),
        retrainer.clone(),
        "proxy:*",
        Duration::from_secs(3600),
    );

    assert_eq!(
        job.run_once().await.unwrap(),
        RetrainOutcome::Retrained { samples: 2 }
    );
    assert_eq!(retrainer.last_size.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn empty_store_means_no_data() {
    let retrainer = Arc::new(CountingRetrainer::default());
    let mut job = RetrainingJob::new(
        RecordGateway::new(Arc::new(MemoryStore::new())),
        retrainer.clone(),
        "proxy:*",
        Duration::from_secs(3600),
    );

    assert_eq!(job.run_once().await.unwrap(), RetrainOutcome::NoData);
    assert_eq!(retrainer.runs.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn notifications_gate_repeat_runs() {
    let retrainer = Arc::new(CountingRetrainer::default());
    let (sink, rx) = ChannelTrainingSink::channel(16);
    let mut job = RetrainingJob::new(
        RecordGateway::new(seeded()),
        retrainer.clone(),
        "proxy:*",
        Duration::from_secs(3600),
    )
    .with_notifications(rx);

    // First run always trains.
    assert!(matches!(
        job.run_once().await.unwrap(),
        RetrainOutcome::Retrained { .. }
    ));
    // Nothing processed since.
    assert_eq!(job.run_once().await.unwrap(), RetrainOutcome::Idle);

    let fields: HashMap<String, String> = [("request_method", "GET"), ("request_url", "/a")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let record = CacheRecord::from_fields("proxy:a", &fields).unwrap();
    sink.record_processed(&record).await;

    assert!(matches!(
        job.run_once().await.unwrap(),
        RetrainOutcome::Retrained { .. }
    ));
    assert_eq!(retrainer.runs.load(Ordering::Relaxed), 2);
}

struct FailingRetrainer;

#[async_trait]
impl Retrainer for FailingRetrainer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn retrain(&self, _corpus: &[TrainingSample]) -> Result<()> {
        Err(MuninnError::Io("disk full".into()))
    }
}

#[tokio::test]
async fn retrainer_failure_surfaces_from_run_once() {
    let mut job = RetrainingJob::new(
        RecordGateway::new(seeded()),
        Arc::new(FailingRetrainer),
        "proxy:*",
        Duration::from_secs(3600),
    );
    assert!(job.run_once().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn run_repeats_on_interval_until_shutdown() {
    let retrainer = Arc::new(CountingRetrainer::default());
    let job = RetrainingJob::new(
        RecordGateway::new(seeded()),
        retrainer.clone(),
        "proxy:*",
        Duration::from_secs(100),
    );
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(job.run(rx));

    tokio::time::sleep(Duration::from_secs(250)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    // t = 0, 100, 200
    assert_eq!(retrainer.runs.load(Ordering::Relaxed), 3);
}
