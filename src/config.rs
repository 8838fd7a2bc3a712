//! Configuration: the optional ~/.config/feedrelay/config.toml file plus
//! command-line and environment overrides, resolved into [`Settings`].
//!
//! Without a config file the relay runs on defaults plus whatever the command
//! line and environment supply. Unknown keys are logged as likely typos.
use crate::monitor::MonitorSettings;
use crate::util::{validate_endpoint, UrlValidationError};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Feed monitored when none is configured.
pub const DEFAULT_FEED_URL: &str = "https://news.yahoo.co.jp/rss/topics/it.xml";

/// Environment variable consulted for the webhook URL.
pub const WEBHOOK_ENV_VAR: &str = "FEEDRELAY_WEBHOOK_URL";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("A webhook URL is required unless --dry-run is set (use --webhook or FEEDRELAY_WEBHOOK_URL)")]
    MissingWebhook,

    #[error("Invalid {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: UrlValidationError,
    },

    #[error("Invalid {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

// ============================================================================
// Configuration File
// ============================================================================

/// Contents of the TOML config file.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The webhook URL is masked in `Debug` output since it embeds a token.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed_url: Option<String>,
    pub webhook_url: Option<String>,
    pub interval_minutes: u64,
    pub retry_interval_seconds: u64,
    pub max_backoff_minutes: u64,
    pub request_timeout_seconds: u64,
    pub delivery_spacing_millis: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: None,
            webhook_url: None,
            interval_minutes: 10,
            retry_interval_seconds: 60,
            max_backoff_minutes: 30,
            request_timeout_seconds: 30,
            delivery_spacing_millis: 1000,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("feed_url", &self.feed_url)
            .field("webhook_url", &self.webhook_url.as_ref().map(|_| "[REDACTED]"))
            .field("interval_minutes", &self.interval_minutes)
            .field("retry_interval_seconds", &self.retry_interval_seconds)
            .field("max_backoff_minutes", &self.max_backoff_minutes)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("delivery_spacing_millis", &self.delivery_spacing_millis)
            .finish()
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "feed_url",
        "webhook_url",
        "interval_minutes",
        "retry_interval_seconds",
        "max_backoff_minutes",
        "request_timeout_seconds",
        "delivery_spacing_millis",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

// ============================================================================
// Resolved Settings
// ============================================================================

/// Values given on the command line; `None` defers to env/file/defaults.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub feed_url: Option<String>,
    pub webhook_url: Option<String>,
    pub interval_minutes: Option<u64>,
    pub dry_run: bool,
}

/// Fully validated settings the relay runs with.
pub struct Settings {
    pub feed_url: Url,
    /// Absent only in dry-run mode.
    pub webhook_url: Option<SecretString>,
    pub request_timeout: Duration,
    pub monitor: MonitorSettings,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("feed_url", &self.feed_url.as_str())
            .field("webhook_url", &self.webhook_url.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .field("monitor", &self.monitor)
            .finish()
    }
}

impl Settings {
    /// Merges CLI > environment > file > defaults and validates the result.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingWebhook`] - no webhook and not a dry run
    /// - [`ConfigError::InvalidUrl`] - feed or webhook URL is not http(s)
    /// - [`ConfigError::InvalidValue`] - a zero interval or timeout
    pub fn resolve(
        cli: CliOverrides,
        env_webhook: Option<String>,
        file: Config,
    ) -> Result<Self, ConfigError> {
        let feed_raw = cli
            .feed_url
            .or(file.feed_url)
            .unwrap_or_else(|| DEFAULT_FEED_URL.to_string());
        let feed_url = validate_endpoint(&feed_raw).map_err(|source| ConfigError::InvalidUrl {
            field: "feed URL",
            source,
        })?;

        let webhook_raw = cli
            .webhook_url
            .or(env_webhook)
            .or(file.webhook_url)
            .filter(|w| !w.trim().is_empty());

        let webhook_url = match webhook_raw {
            Some(raw) => {
                validate_endpoint(&raw).map_err(|source| ConfigError::InvalidUrl {
                    field: "webhook URL",
                    source,
                })?;
                Some(SecretString::from(raw.trim().to_string()))
            }
            None if cli.dry_run => None,
            None => return Err(ConfigError::MissingWebhook),
        };

        let interval_minutes = cli.interval_minutes.unwrap_or(file.interval_minutes);
        if interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "interval",
                reason: "must be at least 1 minute",
            });
        }
        if file.retry_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry_interval_seconds",
                reason: "must be at least 1 second",
            });
        }
        if file.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_seconds",
                reason: "must be at least 1 second",
            });
        }

        let retry_interval = Duration::from_secs(file.retry_interval_seconds);
        // Ceiling is never below the base delay
        let max_backoff = Duration::from_secs(file.max_backoff_minutes.saturating_mul(60))
            .max(retry_interval);

        Ok(Self {
            feed_url,
            webhook_url,
            request_timeout: Duration::from_secs(file.request_timeout_seconds),
            monitor: MonitorSettings {
                poll_interval: Duration::from_secs(interval_minutes.saturating_mul(60)),
                retry_interval,
                max_backoff,
                delivery_spacing: Duration::from_millis(file.delivery_spacing_millis),
                dry_run: cli.dry_run,
            },
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn live_cli() -> CliOverrides {
        CliOverrides {
            webhook_url: Some("https://hooks.example.com/abc".to_string()),
            ..CliOverrides::default()
        }
    }

    fn write_config(name: &str, content: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("feedrelay_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.interval_minutes, 10);
        assert_eq!(config.retry_interval_seconds, 60);
        assert_eq!(config.delivery_spacing_millis, 1000);
        assert!(config.feed_url.is_none());
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedrelay_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.interval_minutes, 10);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.interval_minutes, 10);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let (dir, path) = write_config(
            "full",
            r#"
feed_url = "https://example.com/rss.xml"
webhook_url = "https://hooks.example.com/xyz"
interval_minutes = 5
retry_interval_seconds = 15
max_backoff_minutes = 2
request_timeout_seconds = 10
delivery_spacing_millis = 0
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.feed_url.as_deref(), Some("https://example.com/rss.xml"));
        assert_eq!(config.interval_minutes, 5);
        assert_eq!(config.retry_interval_seconds, 15);
        assert_eq!(config.max_backoff_minutes, 2);
        assert_eq!(config.request_timeout_seconds, 10);
        assert_eq!(config.delivery_spacing_millis, 0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "interval_minutes = 3\nshiny = true\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.interval_minutes, 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_webhook() {
        let config = Config {
            webhook_url: Some("https://hooks.example.com/super-secret".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_resolve_defaults() {
        let settings = Settings::resolve(live_cli(), None, Config::default()).unwrap();
        assert_eq!(settings.feed_url.as_str(), DEFAULT_FEED_URL);
        assert_eq!(settings.monitor.poll_interval, Duration::from_secs(600));
        assert_eq!(settings.monitor.retry_interval, Duration::from_secs(60));
        assert_eq!(settings.monitor.max_backoff, Duration::from_secs(1800));
        assert!(!settings.monitor.dry_run);
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_webhook_is_error_when_live() {
        let err = Settings::resolve(CliOverrides::default(), None, Config::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingWebhook));
    }

    #[test]
    fn test_blank_webhook_counts_as_missing() {
        let cli = CliOverrides {
            webhook_url: Some("   ".to_string()),
            ..CliOverrides::default()
        };
        let err = Settings::resolve(cli, None, Config::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingWebhook));
    }

    #[test]
    fn test_dry_run_needs_no_webhook() {
        let cli = CliOverrides {
            dry_run: true,
            ..CliOverrides::default()
        };
        let settings = Settings::resolve(cli, None, Config::default()).unwrap();
        assert!(settings.webhook_url.is_none());
        assert!(settings.monitor.dry_run);
    }

    #[test]
    fn test_precedence_cli_env_file() {
        let file = Config {
            webhook_url: Some("https://file.example.com/hook".to_string()),
            interval_minutes: 7,
            ..Config::default()
        };

        let from_file = Settings::resolve(CliOverrides::default(), None, file.clone()).unwrap();
        assert_eq!(
            from_file.webhook_url.unwrap().expose_secret(),
            "https://file.example.com/hook"
        );
        assert_eq!(from_file.monitor.poll_interval, Duration::from_secs(420));

        let from_env = Settings::resolve(
            CliOverrides::default(),
            Some("https://env.example.com/hook".to_string()),
            file.clone(),
        )
        .unwrap();
        assert_eq!(
            from_env.webhook_url.unwrap().expose_secret(),
            "https://env.example.com/hook"
        );

        let cli = CliOverrides {
            webhook_url: Some("https://cli.example.com/hook".to_string()),
            interval_minutes: Some(1),
            ..CliOverrides::default()
        };
        let from_cli =
            Settings::resolve(cli, Some("https://env.example.com/hook".to_string()), file).unwrap();
        assert_eq!(
            from_cli.webhook_url.unwrap().expose_secret(),
            "https://cli.example.com/hook"
        );
        assert_eq!(from_cli.monitor.poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_feed_url_rejected() {
        let cli = CliOverrides {
            feed_url: Some("ftp://example.com/feed".to_string()),
            ..live_cli()
        };
        let err = Settings::resolve(cli, None, Config::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { field: "feed URL", .. }));
    }

    #[test]
    fn test_invalid_webhook_rejected() {
        let cli = CliOverrides {
            webhook_url: Some("discord webhook".to_string()),
            ..CliOverrides::default()
        };
        let err = Settings::resolve(cli, None, Config::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                field: "webhook URL",
                ..
            }
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let cli = CliOverrides {
            interval_minutes: Some(0),
            ..live_cli()
        };
        let err = Settings::resolve(cli, None, Config::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "interval", .. }));
    }

    #[test]
    fn test_backoff_ceiling_never_below_retry() {
        let file = Config {
            retry_interval_seconds: 120,
            max_backoff_minutes: 0,
            ..Config::default()
        };
        let settings = Settings::resolve(live_cli(), None, file).unwrap();
        assert_eq!(settings.monitor.max_backoff, Duration::from_secs(120));
    }

    #[test]
    fn test_settings_debug_masks_webhook() {
        let settings = Settings::resolve(live_cli(), None, Config::default()).unwrap();
        let debug_output = format!("{:?}", settings);
        assert!(!debug_output.contains("hooks.example.com/abc"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
