//! Signal cache keyed by query fingerprint.
//!
//! Backed by redis when `REDIS_URL` is configured, an in-process map
//! otherwise. Store failures never reach the pipeline: a failed read is a
//! miss, a failed write is logged and dropped.

use crate::query::CacheKey;
use crate::signal::MarketSignal;
use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Signals are acceptable at day granularity; everything is recomputed
/// after 24 hours.
pub const SIGNAL_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSignal {
    pub signal: MarketSignal,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedSignal {
    fn fresh(signal: MarketSignal) -> Self {
        let now = Utc::now();
        Self {
            signal,
            cached_at: now,
            expires_at: now + Duration::seconds(SIGNAL_TTL_SECS),
        }
    }
}

#[derive(Clone)]
pub struct SignalCache {
    redis: Option<redis::Client>,
    memory: Arc<Mutex<HashMap<String, CachedSignal>>>,
}

impl SignalCache {
    pub fn from_env() -> Self {
        let redis = std::env::var("REDIS_URL")
            .ok()
            .and_then(|url| redis::Client::open(url).ok());
        if redis.is_none() {
            debug!(target = "scout.cache", "REDIS_URL unset; using in-memory cache");
        }
        Self {
            redis,
            memory: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            redis: None,
            memory: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Absent on miss, on expiry, and on any store failure.
    pub async fn get(&self, key: &CacheKey) -> Option<MarketSignal> {
        let record = match &self.redis {
            Some(client) => redis_get(client, key.as_str()).await,
            None => self.memory.lock().await.get(key.as_str()).cloned(),
        }?;
        if record.expires_at <= Utc::now() {
            return None;
        }
        Some(record.signal)
    }

    /// Upsert with the fixed TTL. Replaces any previous record for the key.
    pub async fn put(&self, key: &CacheKey, signal: &MarketSignal) {
        let record = CachedSignal::fresh(signal.clone());
        match &self.redis {
            Some(client) => redis_put(client, key.as_str(), &record).await,
            None => {
                self.memory
                    .lock()
                    .await
                    .insert(key.as_str().to_string(), record);
            }
        }
    }

    #[cfg(test)]
    async fn put_record(&self, key: &CacheKey, record: CachedSignal) {
        self.memory
            .lock()
            .await
            .insert(key.as_str().to_string(), record);
    }
}

async fn redis_get(client: &redis::Client, key: &str) -> Option<CachedSignal> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(conn) => conn,
        Err(err) => {
            warn!(target = "scout.cache", error = %err, "cache read degraded to miss");
            return None;
        }
    };
    let raw: Option<String> = conn.get(key).await.ok()?;
    raw.and_then(|value| serde_json::from_str(&value).ok())
}

async fn redis_put(client: &redis::Client, key: &str, record: &CachedSignal) {
    let Ok(mut conn) = client.get_multiplexed_async_connection().await else {
        warn!(target = "scout.cache", key, "cache write skipped: store unreachable");
        return;
    };
    let Ok(json) = serde_json::to_string(record) else {
        return;
    };
    let result: Result<(), _> = conn.set_ex(key, json, SIGNAL_TTL_SECS as u64).await;
    if let Err(err) = result {
        warn!(target = "scout.cache", key, error = %err, "cache write failed");
    }
}
