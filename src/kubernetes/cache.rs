// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! On-disk stores backing discovery.
//!
//! Two layers share the helpers here: the registry snapshot written under the
//! per-host discovery directory, and [`ResponseCache`], which caches raw
//! metadata responses one JSON file per request. Writes are atomic
//! (tempfile + rename) so concurrent writers leave whole files; last writer
//! wins, no cross-process lock is taken.

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroupList, APIResourceList, APIVersions};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::error::Result;
use crate::kubernetes::discovery::{MetadataFetch, ResourceRegistry};

/// How long a cached metadata response is served before a live refetch
const RESPONSE_TTL: Duration = Duration::from_secs(10 * 60);

/// File name of the registry snapshot inside a derived host directory
const SNAPSHOT_FILE: &str = "registry.json";

/// Get current UNIX timestamp in seconds
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Check if a cached entry is still fresh based on creation time and TTL
fn is_cache_fresh(created_at: u64, ttl: Duration) -> bool {
    let now = current_timestamp();
    now.saturating_sub(created_at) < ttl.as_secs()
}

/// Atomically write content to a file using tempfile + rename
///
/// Other processes see either the old or the new content, never a partial
/// write, and a crash mid-write cannot corrupt the target file.
fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use tempfile::NamedTempFile;

    let temp_file = NamedTempFile::new_in(path.parent().unwrap_or_else(|| Path::new(".")))?;
    std::fs::write(temp_file.path(), content)?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Sanitize a string for use as a filename
/// Replaces non-alphanumeric characters (except dash, and optionally underscore) with underscore
fn sanitize_filename(name: &str, allow_underscore: bool) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || (allow_underscore && c == '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct Stamped<T> {
    created_at: u64,
    body: T,
}

/// Load the registry snapshot for a host directory, if present and fresh.
/// Stale snapshots are removed on sight.
pub fn load_registry_snapshot(dir: &Path, freshness: Duration) -> Option<ResourceRegistry> {
    let path = dir.join(SNAPSHOT_FILE);
    let content = std::fs::read_to_string(&path).ok()?;
    let stamped: Stamped<ResourceRegistry> = match serde_json::from_str(&content) {
        Ok(stamped) => stamped,
        Err(error) => {
            warn!(path = %path.display(), error = %error, "Discarding unreadable discovery snapshot");
            let _ = std::fs::remove_file(&path);
            return None;
        }
    };

    if is_cache_fresh(stamped.created_at, freshness) {
        debug!(path = %path.display(), "Serving discovery registry from snapshot");
        Some(stamped.body)
    } else {
        let _ = std::fs::remove_file(&path);
        None
    }
}

/// Persist a registry snapshot under the host directory.
pub fn store_registry_snapshot(dir: &Path, registry: &ResourceRegistry) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let stamped = Stamped {
        created_at: current_timestamp(),
        body: registry,
    };
    let content = serde_json::to_string_pretty(&stamped)?;
    atomic_write(&dir.join(SNAPSHOT_FILE), content.as_bytes())
}

/// On-disk cache over a [`MetadataFetch`].
///
/// One JSON file per request key. A fresh entry is served without touching
/// the wrapped fetch; anything else (cold, stale, unreadable) degrades to a
/// live request whose response is stored on the way out. Disk failures never
/// fail the request.
pub struct ResponseCache {
    dir: PathBuf,
    inner: Arc<dyn MetadataFetch>,
    /// Protects cache writes from concurrent threads
    write_lock: Mutex<()>,
}

impl ResponseCache {
    pub fn new(dir: PathBuf, inner: Arc<dyn MetadataFetch>) -> Self {
        Self {
            dir,
            inner,
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path(key);
        let content = std::fs::read_to_string(&path).ok()?;
        let stamped: Stamped<T> = serde_json::from_str(&content).ok()?;
        if is_cache_fresh(stamped.created_at, RESPONSE_TTL) {
            Some(stamped.body)
        } else {
            let _ = std::fs::remove_file(&path);
            None
        }
    }

    fn store<T: Serialize>(&self, key: &str, body: &T) {
        let stamped = Stamped {
            created_at: current_timestamp(),
            body,
        };
        let content = match serde_json::to_string(&stamped) {
            Ok(content) => content,
            Err(error) => {
                warn!(key = %key, error = %error, "Failed to serialize metadata response");
                return;
            }
        };

        let _lock = self.write_lock.lock().unwrap();
        if let Err(error) = std::fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %error, "Failed to create response cache directory");
            return;
        }
        if let Err(error) = atomic_write(&self.path(key), content.as_bytes()) {
            warn!(key = %key, error = %error, "Failed to write metadata response");
        }
    }
}

#[async_trait]
impl MetadataFetch for ResponseCache {
    async fn api_groups(&self) -> Result<APIGroupList> {
        if let Some(cached) = self.load("groups") {
            return Ok(cached);
        }
        let live = self.inner.api_groups().await?;
        self.store("groups", &live);
        Ok(live)
    }

    async fn group_resources(&self, api_version: &str) -> Result<APIResourceList> {
        let key = sanitize_filename(api_version, true);
        if let Some(cached) = self.load(&key) {
            return Ok(cached);
        }
        let live = self.inner.group_resources(api_version).await?;
        self.store(&key, &live);
        Ok(live)
    }

    async fn core_versions(&self) -> Result<APIVersions> {
        if let Some(cached) = self.load("core") {
            return Ok(cached);
        }
        let live = self.inner.core_versions().await?;
        self.store("core", &live);
        Ok(live)
    }

    async fn core_resources(&self, version: &str) -> Result<APIResourceList> {
        let key = format!("core_{}", sanitize_filename(version, true));
        if let Some(cached) = self.load(&key) {
            return Ok(cached);
        }
        let live = self.inner.core_resources(version).await?;
        self.store(&key, &live);
        Ok(live)
    }
}
