//! Single-slot, file-backed cache for the most recent weather lookup.
//!
//! The slot holds `{key, data, timestamp}`. A read only hits when the key
//! matches and the entry is younger than the TTL; anything unreadable is a
//! miss. Stale entries are left on disk until the next write replaces them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::model::NormalizedWeather;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Cache key. Country code and coordinates are intentionally not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey<'a> {
    pub city: &'a str,
    pub state: &'a str,
}

impl<'a> CacheKey<'a> {
    pub fn new(city: &'a str, state: &'a str) -> Self {
        Self { city, state }
    }
}

impl fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.city, self.state)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    data: NormalizedWeather,
    /// Unix seconds.
    timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
    ttl: Duration,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ttl: DEFAULT_TTL }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, city: &str, state: &str) -> Option<NormalizedWeather> {
        self.get_at(city, state, Utc::now())
    }

    pub fn get_at(&self, city: &str, state: &str, now: DateTime<Utc>) -> Option<NormalizedWeather> {
        let entry = match self.read_entry() {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Weather cache miss ({}): {:#}", self.path.display(), e);
                return None;
            }
        };

        let key = CacheKey::new(city, state).to_string();
        if entry.key != key {
            tracing::debug!("Weather cache holds '{}', not '{}'", entry.key, key);
            return None;
        }

        let age = now.timestamp() - entry.timestamp;
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        if age >= ttl {
            tracing::debug!("Weather cache entry for '{}' expired ({}s old)", key, age);
            return None;
        }

        tracing::debug!("Weather cache hit for '{}' ({}s old)", key, age);
        Some(entry.data)
    }

    pub fn put(&self, city: &str, state: &str, data: &NormalizedWeather) -> Result<()> {
        self.put_at(city, state, data, Utc::now())
    }

    /// Overwrites the slot unconditionally.
    pub fn put_at(
        &self,
        city: &str,
        state: &str,
        data: &NormalizedWeather,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory: {}", parent.display())
            })?;
        }

        let entry = CacheEntry {
            key: CacheKey::new(city, state).to_string(),
            data: data.clone(),
            timestamp: now.timestamp(),
        };
        let json =
            serde_json::to_string(&entry).context("Failed to serialize weather cache entry")?;

        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write cache file: {}", self.path.display()))?;

        Ok(())
    }

    fn read_entry(&self) -> Result<CacheEntry> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cache file: {}", self.path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", self.path.display()))
    }
}
