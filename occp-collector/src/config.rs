//! Collector configuration
//!
//! Priority per setting: CLI flag (or its environment variable) > TOML file >
//! built-in default. The root folder additionally honors `OCCP_ROOT_FOLDER`
//! through [`RootFolderResolver`].

use crate::collector::{CollectorSettings, DEFAULT_BATCH_SIZE, DEFAULT_MAX_QUEUE_LEN};
use crate::extractor::DEFAULT_MAX_DEPTH;
use crate::interceptor::{DEFAULT_MAX_BODY_BYTES, DEFAULT_URL_PATTERNS};
use occp_common::config::{
    load_toml_or_default, resolve_config_path, LoggingConfig, RootFolderInitializer,
    RootFolderResolver,
};
use occp_common::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Module name used for config file and root folder resolution
pub const MODULE_NAME: &str = "collector";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_BRIDGE_CAPACITY: usize = 256;
pub const DEFAULT_DATABASE_FILE: &str = "collector.db";

/// `collector.toml` contents. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub backend_url: Option<String>,
    pub batch_size: Option<usize>,
    pub flush_interval_ms: Option<u64>,
    pub max_queue_len: Option<usize>,
    pub max_depth: Option<usize>,
    pub bridge_capacity: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub url_patterns: Option<Vec<String>>,
    pub max_body_bytes: Option<usize>,
    pub database_file: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings taken from the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub backend_url: Option<String>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub root_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub backend_url: String,
    pub collector: CollectorSettings,
    pub max_depth: usize,
    pub bridge_capacity: usize,
    /// `None`: deliveries may wait indefinitely
    pub request_timeout: Option<Duration>,
    pub url_patterns: Vec<String>,
    /// Inspection cap for layered responses and body limit of `/api/capture`
    pub max_body_bytes: usize,
    pub database_path: PathBuf,
    pub log_level: String,
}

impl CollectorConfig {
    /// Resolve the config file location, read it, and merge with CLI values
    pub fn load(config_path: Option<&Path>, cli: CliOverrides) -> Result<Self> {
        let path = resolve_config_path(config_path, MODULE_NAME);
        let toml: TomlConfig = load_toml_or_default(path.as_deref())?;
        Self::resolve(toml, cli)
    }

    pub fn resolve(toml: TomlConfig, cli: CliOverrides) -> Result<Self> {
        let root_folder = RootFolderResolver::new(MODULE_NAME)
            .with_cli_arg(cli.root_folder)
            .with_toml_value(toml.root_folder)
            .resolve();

        let database_file = toml
            .database_file
            .unwrap_or_else(|| DEFAULT_DATABASE_FILE.to_string());
        let database_path = RootFolderInitializer::new(root_folder.clone()).file_path(&database_file);

        let config = Self {
            host: toml.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            backend_url: cli
                .backend_url
                .or(toml.backend_url)
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            collector: CollectorSettings {
                batch_size: toml.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
                flush_interval: Duration::from_millis(
                    toml.flush_interval_ms.unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
                ),
                max_queue_len: toml.max_queue_len.unwrap_or(DEFAULT_MAX_QUEUE_LEN),
            },
            max_depth: toml.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            bridge_capacity: toml.bridge_capacity.unwrap_or(DEFAULT_BRIDGE_CAPACITY),
            request_timeout: toml.request_timeout_secs.map(Duration::from_secs),
            url_patterns: toml.url_patterns.unwrap_or_else(|| {
                DEFAULT_URL_PATTERNS.iter().map(|p| p.to_string()).collect()
            }),
            max_body_bytes: toml.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
            log_level: toml.logging.level,
            root_folder,
            database_path,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let settings = &self.collector;
        if settings.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if settings.flush_interval.is_zero() {
            return Err(Error::Config("flush_interval_ms must be at least 1".to_string()));
        }
        if settings.max_queue_len == 0 {
            return Err(Error::Config("max_queue_len must be at least 1".to_string()));
        }
        if self.bridge_capacity == 0 {
            return Err(Error::Config("bridge_capacity must be at least 1".to_string()));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::Config("max_body_bytes must be at least 1".to_string()));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Config("request_timeout_secs must be at least 1".to_string()));
        }
        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "backend_url must be an http(s) URL, got '{}'",
                self.backend_url
            )));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Tracing filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> String {
        format!(
            "occp_collector={level},occp_common={level},tower_http={level}",
            level = self.log_level
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toml(text: &str) -> TomlConfig {
        ::toml::from_str(text).unwrap()
    }

    fn cli_with_root() -> CliOverrides {
        CliOverrides {
            root_folder: Some(PathBuf::from("/tmp/occp-config-test")),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::resolve(TomlConfig::default(), cli_with_root()).unwrap();

        assert_eq!(config.listen_addr(), "127.0.0.1:5780");
        assert_eq!(config.backend_url, "http://localhost:8000");
        assert_eq!(config.collector, CollectorSettings::default());
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.bridge_capacity, 256);
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.url_patterns.len(), DEFAULT_URL_PATTERNS.len());
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(
            config.database_path,
            PathBuf::from("/tmp/occp-config-test/collector.db")
        );
        assert_eq!(
            config.default_log_filter(),
            "occp_collector=info,occp_common=info,tower_http=info"
        );
    }

    #[test]
    fn test_toml_values_apply() {
        let parsed = toml(
            r#"
            port = 6001
            backend_url = "https://occp.example"
            batch_size = 10
            flush_interval_ms = 250
            request_timeout_secs = 30
            url_patterns = ["/Bookmarks"]
            database_file = "state.db"
            max_body_bytes = 4096

            [logging]
            level = "debug"
            "#,
        );
        let config = CollectorConfig::resolve(parsed, cli_with_root()).unwrap();

        assert_eq!(config.port, 6001);
        assert_eq!(config.backend_url, "https://occp.example");
        assert_eq!(config.collector.batch_size, 10);
        assert_eq!(config.collector.flush_interval, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.url_patterns, vec!["/Bookmarks".to_string()]);
        assert!(config.database_path.ends_with("state.db"));
        assert_eq!(config.max_body_bytes, 4096);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_cli_beats_toml() {
        let parsed = toml("port = 6001\nbackend_url = \"http://toml:1\"\n");
        let cli = CliOverrides {
            port: Some(7000),
            backend_url: Some("http://cli:2".to_string()),
            ..cli_with_root()
        };
        let config = CollectorConfig::resolve(parsed, cli).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.backend_url, "http://cli:2");
    }

    #[test]
    fn test_zero_values_rejected() {
        for text in [
            "batch_size = 0",
            "flush_interval_ms = 0",
            "max_queue_len = 0",
            "bridge_capacity = 0",
            "request_timeout_secs = 0",
            "max_body_bytes = 0",
        ] {
            let result = CollectorConfig::resolve(toml(text), cli_with_root());
            assert!(matches!(result, Err(Error::Config(_))), "{} accepted", text);
        }
    }

    #[test]
    fn test_backend_url_scheme_checked() {
        let result = CollectorConfig::resolve(toml("backend_url = \"localhost:8000\""), cli_with_root());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
