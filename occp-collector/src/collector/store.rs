//! Persistent collector state
//!
//! Key/value rows in a `settings` table. Two keys:
//! - `collector_enabled`: `"true"` / `"false"`
//! - `collector_stats`: JSON `{tweetsCollected, tweetsSent, lastSentAt, tweetsDropped}`
//!
//! Every write replaces the whole value. The queue itself is never stored.

use super::state::CollectorStats;
use occp_common::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

const ENABLED_KEY: &str = "collector_enabled";
const STATS_KEY: &str = "collector_stats";

/// State restored at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedState {
    pub enabled: bool,
    pub stats: CollectorStats,
}

impl Default for PersistedState {
    /// First run collects immediately
    fn default() -> Self {
        Self {
            enabled: true,
            stats: CollectorStats::default(),
        }
    }
}

/// Handle on the settings database
#[derive(Debug, Clone)]
pub struct StateStore {
    pool: SqlitePool,
}

impl StateStore {
    /// Open (creating if needed) the database file and its schema
    pub async fn open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        if newly_created {
            info!("Initialized new database: {}", db_path.display());
        } else {
            info!("Opened existing database: {}", db_path.display());
        }

        let store = Self { pool };
        store.create_settings_table().await?;
        Ok(store)
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self> {
        // One long-lived connection: each connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.create_settings_table().await?;
        Ok(store)
    }

    async fn create_settings_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load the enabled flag and counters. Missing keys take defaults;
    /// unreadable values take defaults with a warning.
    pub async fn load(&self) -> Result<PersistedState> {
        let mut state = PersistedState::default();

        if let Some(raw) = self.get(ENABLED_KEY).await? {
            match raw.parse::<bool>() {
                Ok(enabled) => state.enabled = enabled,
                Err(_) => warn!(value = %raw, "Ignoring unreadable {}", ENABLED_KEY),
            }
        }

        if let Some(raw) = self.get(STATS_KEY).await? {
            match serde_json::from_str::<CollectorStats>(&raw) {
                Ok(stats) => state.stats = stats,
                Err(e) => warn!(error = %e, "Ignoring unreadable {}", STATS_KEY),
            }
        }

        Ok(state)
    }

    pub async fn save_enabled(&self, enabled: bool) -> Result<()> {
        self.set(ENABLED_KEY, &enabled.to_string()).await
    }

    pub async fn save_stats(&self, stats: &CollectorStats) -> Result<()> {
        let value = serde_json::to_string(stats)?;
        self.set(STATS_KEY, &value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        Ok(row.and_then(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
