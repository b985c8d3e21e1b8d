//! Redis persistence for assessment history.
//!
//! The whole history list is stored as one JSON document under a single key
//! (get-all / set-all). Connection pooling via ConnectionManager.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument};

use crate::domain::assessment::HistoryEntry;

/// Redis-backed history list.
#[derive(Clone)]
pub struct HistoryStore {
    conn: ConnectionManager,
    key: String,
}

impl HistoryStore {
    /// Create a new Redis connection.
    pub async fn connect(redis_url: &str, key: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!(key = key, "History store connected");

        Ok(Self {
            conn,
            key: key.to_string(),
        })
    }

    /// Read the stored list; a missing key is an empty history.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn load(&self) -> Result<Vec<HistoryEntry>> {
        let mut conn = self.conn.clone();

        let data: Option<String> = conn
            .get(&self.key)
            .await
            .context("Failed to read history")?;

        let entries: Vec<HistoryEntry> = match data {
            Some(data) => serde_json::from_str(&data).context("Stored history is not valid JSON")?,
            None => Vec::new(),
        };

        debug!(entries = entries.len(), "History loaded");
        Ok(entries)
    }

    /// Replace the stored list.
    #[instrument(skip(self, entries), fields(key = %self.key, entries = entries.len()))]
    pub async fn save(&self, entries: &[HistoryEntry]) -> Result<()> {
        let mut conn = self.conn.clone();

        let data = serde_json::to_string(entries).context("Failed to serialize history")?;

        conn.set::<_, _, ()>(&self.key, data)
            .await
            .context("Failed to write history")?;

        debug!("History saved");
        Ok(())
    }

    /// Check if Redis is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}
