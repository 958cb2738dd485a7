//! muninnd — Muninn curation daemon.
//!
//! Connects to the proxy's Redis store and runs curation passes on a fixed
//! cadence, with corpus export for retraining on a slower one.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use muninn::config::{Config, Secrets};
use muninn::intelligence::{
    CachingIntelligence, ChatIntelligence, ContentIntelligence, GuardedIntelligence,
    RetryingIntelligence,
};
use muninn::store::{RecordGateway, RedisStore};
use muninn::training::{ChannelTrainingSink, JsonlCorpusExporter, RetrainingJob};
use muninn::{CurationScheduler, Curator, MuninnError};

/// Capacity of the curator → retraining notification channel.
const TRAINING_CHANNEL_CAPACITY: usize = 1024;

/// Muninn daemon — AI-assisted cache curation.
#[derive(Parser)]
#[command(name = "muninnd")]
#[command(version = muninn::PKG_VERSION)]
#[command(about = "Muninn cache-curation daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "MUNINN_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    info!(version = muninn::version_string(), "muninnd starting");

    let store = RedisStore::connect(&config.store.url).await?;
    let gateway = RecordGateway::new(Arc::new(store));
    let intelligence = build_intelligence(&config, &secrets)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut curator = Curator::new(gateway.clone(), intelligence, config.curator());
    let mut tasks = Vec::new();

    if config.training.enabled {
        let (sink, notifications) = ChannelTrainingSink::channel(TRAINING_CHANNEL_CAPACITY);
        curator = curator.with_training_sink(Arc::new(sink));

        let exporter = JsonlCorpusExporter::new(&config.training.export_dir);
        let job = RetrainingJob::new(
            gateway,
            Arc::new(exporter),
            &config.store.key_pattern,
            config.training.interval(),
        )
        .with_notifications(notifications);
        tasks.push(tokio::spawn(job.run(shutdown_rx.clone())));
    }

    let scheduler = CurationScheduler::new(Arc::new(curator), config.scheduler());
    tasks.push(tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    }));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    let grace = config.scheduler.shutdown_grace();
    let aborts: Vec<_> = tasks.iter().map(|t| t.abort_handle()).collect();
    let joined = tokio::time::timeout(grace, futures_util::future::join_all(tasks)).await;
    match joined {
        Ok(results) => {
            for result in results {
                if let Err(e) = result {
                    error!(error = %e, "background task failed");
                }
            }
        }
        Err(_) => {
            warn!(grace_secs = grace.as_secs(), "grace period elapsed, aborting in-flight work");
            for handle in aborts {
                handle.abort();
            }
        }
    }

    info!("muninnd stopped");
    Ok(())
}

/// Build the intelligence stack: HTTP client, retry, verdict cache, then the
/// fallback guard that the curator talks to.
fn build_intelligence(
    config: &Config,
    secrets: &Secrets,
) -> Result<GuardedIntelligence, MuninnError> {
    let section = &config.intelligence;
    let mut client = ChatIntelligence::new(
        &section.base_url,
        &section.model,
        &section.guard_model,
        section.call_timeout(),
    )?;
    if let Some(key) = secrets.intelligence_api_key() {
        client = client.with_api_key(key);
    }

    let retrying: Arc<dyn ContentIntelligence> =
        Arc::new(RetryingIntelligence::new(Arc::new(client), section.retry()));
    let cached = CachingIntelligence::new(retrying, section.safety_cache_ttl());

    Ok(GuardedIntelligence::with_timeout(
        Arc::new(cached),
        section.call_timeout(),
    ))
}
