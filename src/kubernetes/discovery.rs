// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Metadata discovery for Kubernetes clusters.
//!
//! Enumerates every API group and version through a [`MetadataFetch`] chain
//! and serves the result from a per-host on-disk snapshot while it is fresh.

use async_trait::async_trait;
use futures::{StreamExt, stream};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroupList, APIResourceList, APIVersions};
use kube::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config;
use crate::error::{FactoryError, Result};
use crate::kubernetes::cache::{self, ResponseCache};
use crate::kubernetes::client::ClientSource;
use crate::resources::GroupKind;

/// How long a discovery registry snapshot stays valid before a refetch
pub const DISCOVERY_FRESHNESS: Duration = Duration::from_secs(10 * 60);

/// Concurrent metadata requests during a sweep. A sweep touches every group
/// and version (dozens of requests for an ordinary cluster), so this replaces
/// the steady-state request tuning of the client source, with headroom.
pub const DISCOVERY_BURST: usize = 100;

/// Raw metadata requests against a cluster endpoint.
///
/// The discovery client talks to the wire only through this seam, so callers
/// can chain decorators around it; [`ResponseCache`] is the stock one.
#[async_trait]
pub trait MetadataFetch: Send + Sync {
    async fn api_groups(&self) -> Result<APIGroupList>;
    async fn group_resources(&self, api_version: &str) -> Result<APIResourceList>;
    async fn core_versions(&self) -> Result<APIVersions>;
    async fn core_resources(&self, version: &str) -> Result<APIResourceList>;
}

/// The base of every fetch chain: typed metadata calls on a [`kube::Client`].
pub struct ApiFetch {
    client: Client,
}

impl ApiFetch {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataFetch for ApiFetch {
    async fn api_groups(&self) -> Result<APIGroupList> {
        Ok(self.client.list_api_groups().await?)
    }

    async fn group_resources(&self, api_version: &str) -> Result<APIResourceList> {
        Ok(self.client.list_api_group_resources(api_version).await?)
    }

    async fn core_versions(&self) -> Result<APIVersions> {
        Ok(self.client.list_core_api_versions().await?)
    }

    async fn core_resources(&self, version: &str) -> Result<APIResourceList> {
        Ok(self.client.list_core_api_resources(version).await?)
    }
}

/// A resource surfaced by a discovery sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

/// Registry of all discovered resources for a cluster.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRegistry {
    resources: Vec<DiscoveredResource>,
}

impl ResourceRegistry {
    /// Add a resource, skipping subresources and exact duplicates.
    pub fn add(&mut self, resource: DiscoveredResource) {
        if resource.plural.contains('/') {
            return;
        }
        let duplicate = self.resources.iter().any(|r| {
            r.group == resource.group && r.version == resource.version && r.kind == resource.kind
        });
        if !duplicate {
            self.resources.push(resource);
        }
    }

    /// Fold a wire resource list into the registry.
    pub fn add_list(&mut self, list: &APIResourceList) {
        let (group, version) = match list.group_version.split_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), list.group_version.clone()),
        };
        for resource in &list.resources {
            self.add(DiscoveredResource {
                group: resource.group.clone().unwrap_or_else(|| group.clone()),
                version: resource.version.clone().unwrap_or_else(|| version.clone()),
                kind: resource.kind.clone(),
                plural: resource.name.clone(),
                namespaced: resource.namespaced,
            });
        }
    }

    pub fn get(&self, kind: &str) -> Option<&DiscoveredResource> {
        self.resources.iter().find(|r| r.kind == kind)
    }

    pub fn contains(&self, kind: &GroupKind) -> bool {
        self.resources
            .iter()
            .any(|r| r.group == kind.group && r.kind == kind.kind)
    }

    /// All resources, sorted by group then kind.
    pub fn resources(&self) -> Vec<&DiscoveredResource> {
        let mut resources: Vec<_> = self.resources.iter().collect();
        resources.sort_by(|a, b| (&a.group, &a.kind).cmp(&(&b.group, &b.kind)));
        resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[derive(Debug)]
enum SweepTarget {
    Core(String),
    Group(String),
}

impl SweepTarget {
    fn group_version(&self) -> &str {
        match self {
            SweepTarget::Core(version) => version,
            SweepTarget::Group(group_version) => group_version,
        }
    }
}

/// Discovery client with a per-host snapshot and a bounded-concurrency sweep.
pub struct CachedDiscovery {
    fetch: Arc<dyn MetadataFetch>,
    cache_dir: PathBuf,
    freshness: Duration,
    burst: usize,
}

impl CachedDiscovery {
    pub fn new(
        fetch: Arc<dyn MetadataFetch>,
        cache_dir: PathBuf,
        freshness: Duration,
        burst: usize,
    ) -> Self {
        Self {
            fetch,
            cache_dir,
            freshness,
            burst,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The cluster's resource registry, served from the snapshot while fresh.
    pub async fn registry(&self) -> Result<ResourceRegistry> {
        if let Some(snapshot) = cache::load_registry_snapshot(&self.cache_dir, self.freshness) {
            return Ok(snapshot);
        }

        let registry = self.sweep().await?;
        if let Err(error) = cache::store_registry_snapshot(&self.cache_dir, &registry) {
            warn!(
                dir = %self.cache_dir.display(),
                error = %error,
                "Failed to persist discovery snapshot"
            );
        }
        Ok(registry)
    }

    /// Enumerate every group and version. Individual group failures are
    /// logged and skipped so one broken aggregated API cannot sink the sweep.
    async fn sweep(&self) -> Result<ResourceRegistry> {
        let mut targets = Vec::new();

        let core = self.fetch.core_versions().await?;
        for version in core.versions {
            targets.push(SweepTarget::Core(version));
        }

        let groups = self.fetch.api_groups().await?;
        for group in groups.groups {
            for version in group.versions {
                targets.push(SweepTarget::Group(version.group_version));
            }
        }

        debug!(targets = targets.len(), "Running discovery sweep");

        let results = stream::iter(targets)
            .map(|target| {
                let fetch = Arc::clone(&self.fetch);
                async move {
                    let list = match &target {
                        SweepTarget::Core(version) => fetch.core_resources(version).await,
                        SweepTarget::Group(group_version) => {
                            fetch.group_resources(group_version).await
                        }
                    };
                    (target, list)
                }
            })
            .buffer_unordered(self.burst)
            .collect::<Vec<_>>()
            .await;

        let mut registry = ResourceRegistry::default();
        for (target, list) in results {
            match list {
                Ok(list) => registry.add_list(&list),
                Err(error) => warn!(
                    group_version = %target.group_version(),
                    error = %error,
                    "Skipping API group in discovery sweep"
                ),
            }
        }

        Ok(registry)
    }
}

/// Build the caching discovery client for a client source.
///
/// Resolves the connection configuration, assembles the fetch chain (any
/// wrapper installed on the source first, the response cache outermost so
/// installed wrappers keep seeing raw traffic), and keys the snapshot by the
/// derived host directory.
pub async fn build_discovery_client(source: &ClientSource) -> Result<CachedDiscovery> {
    let config = source.client_config().await?;
    let host = config.cluster_url.to_string();

    let client = Client::try_from(config).map_err(FactoryError::ClientConstruction)?;

    let mut fetch: Arc<dyn MetadataFetch> = Arc::new(ApiFetch::new(client));
    if let Some(wrapper) = source.fetch_wrapper() {
        fetch = wrapper(fetch);
    }
    if let Some(dir) = source.http_cache_dir() {
        fetch = Arc::new(ResponseCache::new(dir.to_path_buf(), fetch));
    }

    let cache_dir = discovery_cache_dir(&config::discovery_cache_root()?, &host);
    Ok(CachedDiscovery::new(
        fetch,
        cache_dir,
        DISCOVERY_FRESHNESS,
        DISCOVERY_BURST,
    ))
}

/// Derive a per-host snapshot directory under `parent`.
///
/// Deterministic for a given host and safe on restrictive filesystems: the
/// scheme is stripped and everything outside `[A-Za-z0-9_/.]` collapses to
/// `_`. Distinct hosts may collide; a collision only reuses a snapshot
/// directory and ages out with it.
pub fn discovery_cache_dir(parent: &Path, host: &str) -> PathBuf {
    let schemeless = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host)
        .trim_end_matches('/');
    let safe_host: String = schemeless
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    parent.join(safe_host)
}
