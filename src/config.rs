//! Configuration loading for muninnd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.muninn/config.toml` (user)
//! 3. `/etc/muninn/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.muninn/secrets.toml` (user, must be 0600)
//! 2. `/etc/muninn/secrets.toml` (system, must be 0600)

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::curator::{CuratorConfig, UnknownSafetyPolicy};
use crate::intelligence::RetryConfig;
use crate::intelligence::client::DEFAULT_BASE_URL;
use crate::scheduler::SchedulerConfig;
use crate::store::DEFAULT_KEY_PATTERN;
use crate::{MuninnError, Result};

/// Environment variable consulted when no secrets file provides an API key.
pub const API_KEY_ENV_VAR: &str = "MUNINN_INTELLIGENCE_API_KEY";

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub intelligence: IntelligenceConfig,
    #[serde(default)]
    pub curator: CuratorSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub training: TrainingConfig,
}

/// Record store connection.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Redis URL (default: redis://127.0.0.1:6379/0).
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Key pattern of cache records (default: proxy:*).
    #[serde(default = "default_key_pattern")]
    pub key_pattern: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            key_pattern: default_key_pattern(),
        }
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_key_pattern() -> String {
    DEFAULT_KEY_PATTERN.to_string()
}

/// Chat-completions endpoint and call limits.
#[derive(Debug, Clone, Deserialize)]
pub struct IntelligenceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_guard_model")]
    pub guard_model: String,
    /// Bound on one logical call, retries included (default: 30).
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// How long safety verdicts stay cached (default: 3600).
    #[serde(default = "default_safety_cache_ttl")]
    pub safety_cache_ttl_secs: u64,
    /// Attempts per call including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            guard_model: default_guard_model(),
            call_timeout_secs: default_call_timeout(),
            safety_cache_ttl_secs: default_safety_cache_ttl(),
            max_attempts: default_max_attempts(),
            initial_retry_delay_ms: default_initial_retry_delay(),
        }
    }
}

impl IntelligenceConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn safety_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.safety_cache_ttl_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.initial_retry_delay_ms))
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    "llama3.2:1b".to_string()
}

fn default_guard_model() -> String {
    "llama-guard3:1b".to_string()
}

fn default_call_timeout() -> u64 {
    30
}

fn default_safety_cache_ttl() -> u64 {
    3600
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_retry_delay() -> u64 {
    500
}

/// `[curator]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CuratorSection {
    /// Idle hours before a single-use record is retuned (default: 72).
    #[serde(default = "default_idle_threshold_hours")]
    pub idle_threshold_hours: u64,
    /// "skip" (default) or "proceed".
    #[serde(default)]
    pub unknown_safety: UnknownSafetyPolicy,
}

impl Default for CuratorSection {
    fn default() -> Self {
        Self {
            idle_threshold_hours: default_idle_threshold_hours(),
            unknown_safety: UnknownSafetyPolicy::default(),
        }
    }
}

fn default_idle_threshold_hours() -> u64 {
    72
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,
    /// Time allowed for in-flight work after a shutdown signal (default: 5).
    #[serde(default = "default_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            backoff_secs: default_backoff(),
            shutdown_grace_secs: default_grace(),
        }
    }
}

impl SchedulerSection {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_interval() -> u64 {
    600
}

fn default_backoff() -> u64 {
    60
}

fn default_grace() -> u64 {
    5
}

/// `[training]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_training_enabled")]
    pub enabled: bool,
    #[serde(default = "default_training_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            enabled: default_training_enabled(),
            interval_secs: default_training_interval(),
            export_dir: default_export_dir(),
        }
    }
}

impl TrainingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_training_enabled() -> bool {
    true
}

fn default_training_interval() -> u64 {
    86_400
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("/var/lib/muninn/corpus")
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.muninn/config.toml`
    /// 3. `/etc/muninn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MuninnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(MuninnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muninn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/muninn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(MuninnError::Configuration(
            "No config file found. Create ~/.muninn/config.toml or /etc/muninn/config.toml"
                .to_string(),
        ))
    }

    pub fn curator(&self) -> CuratorConfig {
        CuratorConfig {
            key_pattern: self.store.key_pattern.clone(),
            idle_threshold: Duration::from_secs(self.curator.idle_threshold_hours * 3600),
            unknown_safety: self.curator.unknown_safety,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.scheduler.interval_secs),
            backoff: Duration::from_secs(self.scheduler.backoff_secs),
        }
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub intelligence: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment, or the endpoint may need none).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".muninn").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/muninn/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MuninnError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(MuninnError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Intelligence API key, falling back to [`API_KEY_ENV_VAR`].
    pub fn intelligence_api_key(&self) -> Option<String> {
        self.intelligence
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.store.url, "redis://127.0.0.1:6379/0");
        assert_eq!(config.store.key_pattern, "proxy:*");
        assert_eq!(config.intelligence.call_timeout_secs, 30);
        assert_eq!(config.scheduler.interval_secs, 600);
        assert_eq!(config.scheduler.backoff_secs, 60);
        assert_eq!(config.curator.idle_threshold_hours, 72);
        assert_eq!(config.curator.unknown_safety, UnknownSafetyPolicy::Skip);
        assert!(config.training.enabled);
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [store]
            url = "redis://cache:6379/2"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.url, "redis://cache:6379/2");
        // Defaults preserved
        assert_eq!(config.store.key_pattern, "proxy:*");
        assert_eq!(config.intelligence.model, "llama3.2:1b");
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [store]
            url = "redis://127.0.0.1:6379/0"
            key_pattern = "edge:*"

            [intelligence]
            base_url = "http://gpu-box:8000"
            model = "meta-llama/Llama-3.2-1B-Instruct"
            guard_model = "meta-llama/Llama-Guard-3-1B"
            call_timeout_secs = 45
            max_attempts = 5

            [curator]
            idle_threshold_hours = 24
            unknown_safety = "proceed"

            [scheduler]
            interval_secs = 300
            backoff_secs = 30
            shutdown_grace_secs = 10

            [training]
            enabled = false
            export_dir = "/tmp/corpus"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.intelligence.base_url, "http://gpu-box:8000");
        assert_eq!(config.intelligence.retry().max_attempts, 5);
        assert_eq!(config.intelligence.call_timeout(), Duration::from_secs(45));

        let curator = config.curator();
        assert_eq!(curator.key_pattern, "edge:*");
        assert_eq!(curator.idle_threshold, Duration::from_secs(24 * 3600));
        assert_eq!(curator.unknown_safety, UnknownSafetyPolicy::Proceed);

        let scheduler = config.scheduler();
        assert_eq!(scheduler.interval, Duration::from_secs(300));
        assert_eq!(scheduler.backoff, Duration::from_secs(30));
        assert_eq!(config.scheduler.shutdown_grace(), Duration::from_secs(10));

        assert!(!config.training.enabled);
        assert_eq!(config.training.export_dir, PathBuf::from("/tmp/corpus"));
    }

    #[test]
    fn unknown_safety_policy_rejects_other_values() {
        let toml = r#"
            [curator]
            unknown_safety = "purge"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [intelligence]
            api_key = "sk-test-key"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.intelligence_api_key().as_deref(), Some("sk-test-key"));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler]\ninterval_secs = 120\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.scheduler.interval_secs, 120);
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_secrets_are_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[intelligence]\napi_key = \"k\"\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(Secrets::check_permissions(&path).is_err());

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        assert!(Secrets::check_permissions(&path).is_ok());
    }
}
