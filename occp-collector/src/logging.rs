//! Tracing subscriber setup
//!
//! The subscriber goes up before the config file is read, so anything the
//! loader reports (missing file, fallback defaults) is printed. It starts
//! with [`BOOTSTRAP_FILTER`] and switches to the configured level once the
//! config is known. A `RUST_LOG` filter is kept as-is throughout.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::config::CollectorConfig;

/// Filter in effect until the config file has been read
pub const BOOTSTRAP_FILTER: &str = "occp_collector=info,occp_common=info,tower_http=info";

/// Swaps the active filter once configuration is loaded
pub struct LogFilterHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilterHandle {
    /// Switch to the configured filter, unless `RUST_LOG` chose one
    pub fn apply_config(&self, config: &CollectorConfig) -> Result<(), reload::Error> {
        if self.from_env {
            return Ok(());
        }
        self.handle
            .reload(EnvFilter::new(config.default_log_filter()))
    }
}

fn reloadable_filter(
    env_filter: Option<EnvFilter>,
) -> (reload::Layer<EnvFilter, Registry>, LogFilterHandle) {
    let from_env = env_filter.is_some();
    let filter = env_filter.unwrap_or_else(|| EnvFilter::new(BOOTSTRAP_FILTER));
    let (layer, handle) = reload::Layer::new(filter);
    (layer, LogFilterHandle { handle, from_env })
}

/// Install the global subscriber. Call before loading configuration.
pub fn init() -> LogFilterHandle {
    let (filter, handle) = reloadable_filter(EnvFilter::try_from_default_env().ok());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    handle
}
