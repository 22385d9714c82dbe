use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{DataType, HitSource};

#[derive(Debug, Deserialize)]
struct CacheFile {
    timestamp: String,
    data: Vec<Value>,
}

/// One JSON file per data type under `dir`, valid for `ttl`.
#[derive(Debug, Clone)]
pub struct FetchCache {
    dir: PathBuf,
    ttl: chrono::Duration,
}

impl FetchCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: chrono::Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn path_for(&self, data_type: DataType) -> PathBuf {
        self.dir.join(format!("{}_cache.json", data_type.as_str()))
    }

    /// Cached hits if the file exists, parses, and is younger than the TTL.
    pub fn load(&self, data_type: DataType, now: DateTime<Utc>) -> Option<Vec<Value>> {
        let path = self.path_for(data_type);
        let raw = fs::read_to_string(&path).ok()?;
        let file: CacheFile = match serde_json::from_str(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!("Ignoring unreadable cache {}: {}", path.display(), e);
                return None;
            }
        };
        let Some(stamp) = parse_timestamp(&file.timestamp) else {
            warn!("Ignoring cache {} with bad timestamp '{}'", path.display(), file.timestamp);
            return None;
        };
        let age = now - stamp;
        if age < self.ttl {
            debug!("Cache hit for {} (age {}m)", data_type, age.num_minutes());
            Some(file.data)
        } else {
            debug!("Cache for {} is stale (age {}h)", data_type, age.num_hours());
            None
        }
    }

    pub fn store(&self, data_type: DataType, data: &[Value], now: DateTime<Utc>) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache dir {}", self.dir.display()))?;
        let path = self.path_for(data_type);
        let body = serde_json::json!({
            "timestamp": now.to_rfc3339(),
            "data": data,
        });
        write_json(&path, &body)
    }
}

fn write_json(path: &Path, body: &Value) -> Result<()> {
    let raw = serde_json::to_string(body)?;
    fs::write(path, raw).with_context(|| format!("Failed to write {}", path.display()))
}

/// ISO-8601 with an offset, or a naive local timestamp as older caches wrote.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Wraps a source so fresh cache files short-circuit the network.
pub struct CachedSource<S> {
    inner: S,
    cache: FetchCache,
}

impl<S: HitSource> CachedSource<S> {
    pub fn new(inner: S, cache: FetchCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<S: HitSource> HitSource for CachedSource<S> {
    async fn fetch_all(
        &self,
        data_type: DataType,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<Vec<Value>> {
        if let Some(hits) = self.cache.load(data_type, Utc::now()) {
            info!("Using cached {} ({} hits)", data_type, hits.len());
            on_progress(100.0);
            return Ok(hits);
        }
        let hits = self.inner.fetch_all(data_type, on_progress).await?;
        self.cache.store(data_type, &hits, Utc::now())?;
        Ok(hits)
    }
}

// ── Tests ──
