//! Boundary to the model retraining pipeline.
//!
//! Retraining runs beside curation with its own cadence and shares nothing
//! in-process with it except an optional notification channel: the curator
//! reports each record it processed through a [`TrainingSink`], and the
//! [`RetrainingJob`] reads the whole inventory from the store when it runs.
//!
//! Fine-tuning itself happens outside this crate. The bundled
//! [`JsonlCorpusExporter`] writes the corpus as JSON Lines for an offline
//! trainer to pick up.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::scheduler::wait_or_shutdown;
use crate::store::RecordGateway;
use crate::types::CacheRecord;
use crate::{MuninnError, Result};

/// Fire-and-forget notification that the curator processed a record.
#[async_trait]
pub trait TrainingSink: Send + Sync {
    async fn record_processed(&self, record: &CacheRecord);
}

/// Sink that discards notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTrainingSink;

#[async_trait]
impl TrainingSink for NoopTrainingSink {
    async fn record_processed(&self, _record: &CacheRecord) {}
}

/// Sink that forwards processed keys over a bounded channel.
///
/// Never blocks the curator: when the channel is full the notification is
/// dropped.
#[derive(Debug, Clone)]
pub struct ChannelTrainingSink {
    tx: mpsc::Sender<String>,
}

impl ChannelTrainingSink {
    /// Create a sink and the receiver a [`RetrainingJob`] drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TrainingSink for ChannelTrainingSink {
    async fn record_processed(&self, record: &CacheRecord) {
        if let Err(mpsc::error::TrySendError::Full(key)) = self.tx.try_send(record.key.clone()) {
            debug!(key, "training notification dropped, channel full");
        }
    }
}

/// One training example derived from a cached exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingSample {
    #[serde(skip)]
    pub key: String,
    pub text: String,
}

impl TrainingSample {
    /// Records without a response carry nothing to learn from.
    pub fn from_record(record: &CacheRecord) -> Option<Self> {
        let response = record.response_text()?;
        Some(Self {
            key: record.key.clone(),
            text: format!("Request URL: {}\nResponse: {}", record.url, response),
        })
    }
}

/// Read every record under `pattern` into a corpus, ordered by key.
///
/// Unreadable records are skipped; only store unavailability fails.
pub async fn collect_corpus(gateway: &RecordGateway, pattern: &str) -> Result<Vec<TrainingSample>> {
    let mut keys = gateway.list_keys(pattern).await?;
    keys.sort();

    let mut corpus = Vec::with_capacity(keys.len());
    for key in &keys {
        match gateway.read_record(key).await {
            Ok(record) => corpus.extend(TrainingSample::from_record(&record)),
            Err(e) if e.is_systemic() => return Err(e),
            Err(e) => debug!(key, error = %e, "skipping record for training corpus"),
        }
    }
    Ok(corpus)
}

/// Consumer of a training corpus.
#[async_trait]
pub trait Retrainer: Send + Sync {
    fn name(&self) -> &str;

    async fn retrain(&self, corpus: &[TrainingSample]) -> Result<()>;
}

/// Writes each corpus to `corpus-<unix-ts>.jsonl` in a directory.
#[derive(Debug, Clone)]
pub struct JsonlCorpusExporter {
    dir: PathBuf,
}

impl JsonlCorpusExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the corpus and return the created file.
    pub async fn export(&self, corpus: &[TrainingSample]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.unused_path(chrono::Utc::now().timestamp()).await;
        let mut buf = Vec::new();
        for sample in corpus {
            serde_json::to_writer(&mut buf, sample)?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(path)
    }

    /// `corpus-<ts>.jsonl`, suffixed if a file from the same second exists.
    async fn unused_path(&self, ts: i64) -> PathBuf {
        let mut path = self.dir.join(format!("corpus-{ts}.jsonl"));
        let mut n = 1;
        while tokio::fs::try_exists(&path).await.unwrap_or(false) {
            path = self.dir.join(format!("corpus-{ts}-{n}.jsonl"));
            n += 1;
        }
        path
    }
}

#[async_trait]
impl Retrainer for JsonlCorpusExporter {
    fn name(&self) -> &str {
        "jsonl-export"
    }

    async fn retrain(&self, corpus: &[TrainingSample]) -> Result<()> {
        let path = self.export(corpus).await?;
        info!(path = %path.display(), samples = corpus.len(), "training corpus exported");
        Ok(())
    }
}

/// What one retraining run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrainOutcome {
    /// Nothing was processed since the last successful run.
    Idle,
    /// The store held no usable samples.
    NoData,
    Retrained { samples: usize },
}

/// Periodic retraining loop over the shared store.
pub struct RetrainingJob {
    gateway: RecordGateway,
    retrainer: Arc<dyn Retrainer>,
    key_pattern: String,
    interval: Duration,
    notifications: Option<mpsc::Receiver<String>>,
    pending: usize,
    retrained_once: bool,
}

impl RetrainingJob {
    pub fn new(
        gateway: RecordGateway,
        retrainer: Arc<dyn Retrainer>,
        key_pattern: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            gateway,
            retrainer,
            key_pattern: key_pattern.into(),
            interval,
            notifications: None,
            pending: 0,
            retrained_once: false,
        }
    }

    /// Skip runs when the curator reported no processed records since the
    /// last successful one.
    pub fn with_notifications(mut self, rx: mpsc::Receiver<String>) -> Self {
        self.notifications = Some(rx);
        self
    }

    /// Perform one run now.
    pub async fn run_once(&mut self) -> Result<RetrainOutcome> {
        if let Some(rx) = self.notifications.as_mut() {
            while rx.try_recv().is_ok() {
                self.pending += 1;
            }
            if self.retrained_once && self.pending == 0 {
                return Ok(RetrainOutcome::Idle);
            }
        }

        let corpus = collect_corpus(&self.gateway, &self.key_pattern).await?;
        if corpus.is_empty() {
            return Ok(RetrainOutcome::NoData);
        }

        self.retrainer.retrain(&corpus).await?;
        self.pending = 0;
        self.retrained_once = true;
        Ok(RetrainOutcome::Retrained {
            samples: corpus.len(),
        })
    }

    /// Run immediately, then every `interval`, until shutdown is signalled.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            retrainer = self.retrainer.name(),
            interval_secs = self.interval.as_secs(),
            "retraining job started"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.run_once().await {
                Ok(RetrainOutcome::Retrained { samples }) => {
                    info!(samples, "retraining run completed");
                }
                Ok(RetrainOutcome::NoData) => info!("no data to train on"),
                Ok(RetrainOutcome::Idle) => debug!("no records processed since last run"),
                Err(e @ MuninnError::StoreUnavailable(_)) => {
                    warn!(error = %e, "retraining skipped, store unavailable");
                }
                Err(e) => error!(error = %e, "retraining run failed"),
            }

            if wait_or_shutdown(&mut shutdown, self.interval).await {
                break;
            }
        }
        info!("retraining job stopped");
    }
}
