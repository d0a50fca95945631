//! Taskdeck
//!
//! Client core of a team task-management application:
//! - Schema layer validating every record and form
//! - Query/mutation hooks over a hosted relational backend, with a shared
//!   query cache invalidated on every successful mutation
//! - Auth/session controller exposing the signed-in identity, its profile and
//!   a `loading` flag

pub mod cache;
pub mod events;
pub mod queries;
pub mod remote;
pub mod schema;
pub mod session;
pub mod toast;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::QueryCache;
use crate::events::EventBus;
use crate::queries::QueryClient;
use crate::remote::{AuthBackend, DataStore, RestClient};
use crate::session::{SessionConfig, SessionController};
use crate::toast::ToastBus;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub remote: RemoteYamlConfig,
    pub session: SessionYamlConfig,
    pub cache: CacheYamlConfig,
    pub logging: LoggingYamlConfig,
}

/// Backend connection section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteYamlConfig {
    pub url: String,
    pub anon_key: String,
}

impl Default for RemoteYamlConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".into(),
            anon_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionYamlConfig {
    /// Ceiling on how long a profile fetch may hold the loading flag
    pub profile_timeout_ms: u64,
    /// Where sign-up confirmation emails point back to
    pub redirect_to: Option<String>,
}

impl Default for SessionYamlConfig {
    fn default() -> Self {
        Self {
            profile_timeout_ms: 5000,
            redirect_to: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheYamlConfig {
    pub max_capacity: u64,
    pub ttl_secs: u64,
}

impl Default for CacheYamlConfig {
    fn default() -> Self {
        Self {
            max_capacity: cache::DEFAULT_MAX_CAPACITY,
            ttl_secs: cache::DEFAULT_TTL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingYamlConfig {
    pub format: LogFormat,
}

/// Log output format of the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("Unknown log format '{}' (expected text or json)", other),
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub remote_url: String,
    pub anon_key: String,
    pub profile_timeout_ms: u64,
    pub redirect_to: Option<String>,
    pub cache_max_capacity: u64,
    pub cache_ttl_secs: u64,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "taskdeck.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let log_format = match std::env::var("TASKDECK_LOG_FORMAT") {
            Ok(value) => value.parse().context("Invalid TASKDECK_LOG_FORMAT")?,
            Err(_) => yaml.logging.format,
        };
        let profile_timeout_ms = match std::env::var("TASKDECK_PROFILE_TIMEOUT_MS") {
            Ok(value) => value
                .parse()
                .context("Invalid TASKDECK_PROFILE_TIMEOUT_MS")?,
            Err(_) => yaml.session.profile_timeout_ms,
        };

        Ok(Self {
            remote_url: std::env::var("TASKDECK_REMOTE_URL").unwrap_or(yaml.remote.url),
            anon_key: std::env::var("TASKDECK_ANON_KEY").unwrap_or(yaml.remote.anon_key),
            profile_timeout_ms,
            redirect_to: std::env::var("TASKDECK_REDIRECT_URL")
                .ok()
                .or(yaml.session.redirect_to),
            cache_max_capacity: yaml.cache.max_capacity,
            cache_ttl_secs: yaml.cache.ttl_secs,
            log_format,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("taskdeck.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            profile_timeout: Duration::from_millis(self.profile_timeout_ms),
            redirect_to: self.redirect_to.clone(),
        }
    }

    pub fn build_cache(&self) -> QueryCache {
        QueryCache::new(
            self.cache_max_capacity,
            Duration::from_secs(self.cache_ttl_secs),
        )
    }
}

/// Everything a presentation layer needs: the hooks and the channels they
/// report through.
#[derive(Clone)]
pub struct AppContext {
    pub queries: QueryClient,
    pub toasts: ToastBus,
    pub events: EventBus,
    pub config: Arc<Config>,
}

impl AppContext {
    /// Connect to the configured hosted backend
    pub fn new(config: Config) -> Result<Self> {
        reqwest::Url::parse(&config.remote_url)
            .with_context(|| format!("Invalid remote url '{}'", config.remote_url))?;
        if config.anon_key.is_empty() {
            tracing::warn!("No anon key configured, backend requests will likely be rejected");
        }
        let client = Arc::new(RestClient::new(&config.remote_url, &config.anon_key));
        Ok(Self::with_backend(config, client))
    }

    /// Use any backend implementing both data and auth access
    pub fn with_backend<B>(config: Config, backend: Arc<B>) -> Self
    where
        B: DataStore + AuthBackend + 'static,
    {
        let toasts = ToastBus::default();
        let events = EventBus::default();
        let queries = QueryClient::new(
            backend.clone(),
            backend,
            config.build_cache(),
            Arc::new(toasts.clone()),
        )
        .with_event_emitter(Arc::new(events.clone()));
        Self {
            queries,
            toasts,
            events,
            config: Arc::new(config),
        }
    }

    /// Start the session controller for this context
    pub async fn start_session(&self) -> SessionController {
        SessionController::start(self.queries.clone(), self.config.session_config()).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
remote:
  url: https://abc.example.co
  anon_key: public-anon
session:
  profile_timeout_ms: 2500
  redirect_to: https://app.example.co/
cache:
  max_capacity: 64
  ttl_secs: 30
logging:
  format: json
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.remote.url, "https://abc.example.co");
        assert_eq!(config.remote.anon_key, "public-anon");
        assert_eq!(config.session.profile_timeout_ms, 2500);
        assert_eq!(
            config.session.redirect_to.as_deref(),
            Some("https://app.example.co/")
        );
        assert_eq!(config.cache.max_capacity, 64);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert_eq!(config.remote.url, "http://localhost:54321");
        assert!(config.remote.anon_key.is_empty());
        assert_eq!(config.session.profile_timeout_ms, 5000);
        assert_eq!(config.cache.max_capacity, 256);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_partial_yaml_keeps_section_defaults() {
        let yaml = r#"
session:
  redirect_to: https://app.example.co/
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.session.profile_timeout_ms, 5000);
        assert_eq!(config.remote.url, "http://localhost:54321");
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    /// Combined test for YAML file loading and env var overrides.
    /// Runs as a single test to avoid parallel env var race conditions.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "TASKDECK_REMOTE_URL",
                "TASKDECK_ANON_KEY",
                "TASKDECK_PROFILE_TIMEOUT_MS",
                "TASKDECK_LOG_FORMAT",
                "TASKDECK_REDIRECT_URL",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
remote:
  url: http://yaml-host:54321
  anon_key: yaml-key
session:
  profile_timeout_ms: 1500
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("taskdeck.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.remote_url, "http://yaml-host:54321");
        assert_eq!(config.anon_key, "yaml-key");
        assert_eq!(config.profile_timeout_ms, 1500);
        assert_eq!(
            config.session_config().profile_timeout,
            Duration::from_millis(1500)
        );

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("TASKDECK_REMOTE_URL", "http://env-host:54321");
        std::env::set_var("TASKDECK_PROFILE_TIMEOUT_MS", "750");
        std::env::set_var("TASKDECK_LOG_FORMAT", "json");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.remote_url, "http://env-host:54321");
        assert_eq!(config.profile_timeout_ms, 750);
        assert_eq!(config.log_format, LogFormat::Json);
        // YAML value still used where no env override
        assert_eq!(config.anon_key, "yaml-key");

        // --- Phase 3: Bad env value is an error, not a silent default ---
        std::env::set_var("TASKDECK_PROFILE_TIMEOUT_MS", "soon");
        assert!(Config::from_yaml_and_env(Some(&file_path)).is_err());

        clear_env();

        // --- Phase 4: No YAML file → defaults ---
        let nonexistent = Path::new("/tmp/nonexistent-taskdeck-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.remote_url, "http://localhost:54321");
        assert_eq!(config.profile_timeout_ms, 5000);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_app_context_rejects_bad_url() {
        let mut config = test_helpers::test_config();
        config.remote_url = "not a url".into();
        assert!(AppContext::new(config).is_err());
    }
}
