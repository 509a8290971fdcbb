//! Local cache for site settings.
//!
//! Settings change rarely but are read on every homepage load and by most
//! CLI commands. This module keeps the last fetched key/value map in a JSON
//! file so repeated runs can skip the round-trip.
//!
//! # Design
//!
//! The cache is explicit: a [`SettingsCache`] is constructed with a path and
//! a TTL and handed to [`SettingsRepository`](crate::content::SettingsRepository).
//! Nothing reads it implicitly, and writes through the repository invalidate
//! it.
//!
//! A cached map is used only if all of these hold:
//! 1. The file exists and parses
//! 2. Its format version matches [`CACHE_VERSION`]
//! 3. It was stored less than `ttl` ago (and not in the future)
//!
//! Anything else is a miss; a miss never fails.
//!
//! ## Storage
//!
//! `<cache_dir>/settings-cache.json`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "stored_at": "2026-10-18T12:00:00Z",
//!   "values": { "whatsapp": "5527999999999", "num_trilhas": "50" }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the cache file within the cache directory.
const CACHE_FILENAME: &str = "settings-cache.json";

/// Version of the cache file format. Bump to invalidate existing files.
pub const CACHE_VERSION: u32 = 1;

/// One hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct CacheFile {
    version: u32,
    stored_at: DateTime<Utc>,
    values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsCache {
    path: PathBuf,
    ttl: Duration,
}

impl SettingsCache {
    /// Cache file inside `dir`.
    pub fn new(dir: &Path, ttl: Duration) -> Self {
        Self {
            path: dir.join(CACHE_FILENAME),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached values, if fresh.
    pub fn load(&self) -> Option<BTreeMap<String, String>> {
        self.load_at(Utc::now())
    }

    /// Cached values as seen at `now`.
    pub fn load_at(&self, now: DateTime<Utc>) -> Option<BTreeMap<String, String>> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let file: CacheFile = serde_json::from_str(&content).ok()?;
        if file.version != CACHE_VERSION {
            return None;
        }
        let age = (now - file.stored_at).to_std().ok()?;
        if age >= self.ttl {
            return None;
        }
        Some(file.values)
    }

    pub fn store(&self, values: &BTreeMap<String, String>) -> io::Result<()> {
        self.store_at(values, Utc::now())
    }

    pub fn store_at(&self, values: &BTreeMap<String, String>, now: DateTime<Utc>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CacheFile {
            version: CACHE_VERSION,
            stored_at: now,
            values: values.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.path, json)
    }

    /// Drop the cached file. Missing files are fine.
    pub fn invalidate(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
