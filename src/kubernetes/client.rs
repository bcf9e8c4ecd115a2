// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Client configuration source.
//!
//! [`ClientSource`] owns the raw kubeconfig plus the knobs layered on top of
//! it: context selection, steady-state timeouts, the metadata response cache
//! directory, and the fetch-wrapper chain consumed by discovery. It is shared
//! (`Arc`) between the factory and the discovery builder.

use clap::Args;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config;
use crate::error::{FactoryError, Result};
use crate::kubernetes::discovery::MetadataFetch;

/// Timeout for connecting to the API server
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Decorates the metadata fetch chain used by discovery.
pub type FetchWrapper = Arc<dyn Fn(Arc<dyn MetadataFetch>) -> Arc<dyn MetadataFetch> + Send + Sync>;

pub struct ClientSource {
    kubeconfig: Kubeconfig,
    options: KubeConfigOptions,
    http_cache_dir: Option<PathBuf>,
    fetch_wrapper: Option<FetchWrapper>,
}

impl std::fmt::Debug for ClientSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSource")
            .field("kubeconfig", &self.kubeconfig)
            .field("options", &self.options.context)
            .field("http_cache_dir", &self.http_cache_dir)
            .field("fetch_wrapper", &self.fetch_wrapper.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ClientSource {
    /// Read the user's kubeconfig, optionally pinning a context.
    pub fn new(context: Option<&str>) -> Result<Self> {
        let kubeconfig = Kubeconfig::read()?;
        Self::from_kubeconfig(kubeconfig, context)
    }

    /// Build from an already-loaded kubeconfig.
    pub fn from_kubeconfig(kubeconfig: Kubeconfig, context: Option<&str>) -> Result<Self> {
        if let Some(name) = context {
            if !kubeconfig.contexts.iter().any(|c| c.name == name) {
                return Err(FactoryError::ContextNotFound(name.to_string()));
            }
        }

        Ok(Self {
            options: KubeConfigOptions {
                context: context.map(String::from),
                ..Default::default()
            },
            http_cache_dir: Some(config::default_http_cache_dir()?),
            fetch_wrapper: None,
            kubeconfig,
        })
    }

    /// Directory for cached metadata responses; `None` disables caching.
    pub fn http_cache_dir(&self) -> Option<&Path> {
        self.http_cache_dir.as_deref()
    }

    pub fn set_http_cache_dir(&mut self, dir: Option<PathBuf>) {
        self.http_cache_dir = dir;
    }

    /// Install a fetch wrapper. A wrapper installed later wraps the chain the
    /// earlier ones produced, so earlier wrappers keep seeing raw traffic.
    pub fn wrap_fetch(&mut self, wrapper: FetchWrapper) {
        self.fetch_wrapper = Some(match self.fetch_wrapper.take() {
            Some(existing) => Arc::new(move |fetch| wrapper(existing(fetch))),
            None => wrapper,
        });
    }

    pub fn fetch_wrapper(&self) -> Option<&FetchWrapper> {
        self.fetch_wrapper.as_ref()
    }

    /// Resolve the connection configuration with steady-state timeouts.
    pub async fn client_config(&self) -> Result<Config> {
        let mut config =
            Config::from_custom_kubeconfig(self.kubeconfig.clone(), &self.options).await?;
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);
        Ok(config)
    }

    /// Resolve the connection configuration exactly as the kubeconfig states
    /// it, with no tuning applied.
    pub async fn bare_client_config(&self) -> Result<Config> {
        Ok(Config::from_custom_kubeconfig(self.kubeconfig.clone(), &self.options).await?)
    }

    /// Construct a client over the resolved configuration.
    pub async fn client(&self) -> Result<Client> {
        let config = self.client_config().await?;
        debug!(cluster_url = %config.cluster_url, "Constructing cluster client");
        Client::try_from(config).map_err(FactoryError::ClientConstruction)
    }

    /// The raw kubeconfig this source was built from.
    pub fn raw_config(&self) -> &Kubeconfig {
        &self.kubeconfig
    }

    pub fn contexts(&self) -> Vec<String> {
        self.kubeconfig.contexts.iter().map(|c| c.name.clone()).collect()
    }

    pub fn current_context(&self) -> Option<String> {
        self.options
            .context
            .clone()
            .or_else(|| self.kubeconfig.current_context.clone())
    }

    /// Namespace of the active context. The flag reports whether the
    /// kubeconfig named one explicitly.
    pub fn default_namespace(&self) -> (String, bool) {
        let namespace = self.current_context().and_then(|name| {
            self.kubeconfig
                .contexts
                .iter()
                .find(|c| c.name == name)
                .and_then(|c| c.context.as_ref())
                .and_then(|c| c.namespace.clone())
        });
        match namespace {
            Some(namespace) => (namespace, true),
            None => ("default".to_string(), false),
        }
    }
}

/// Connection flags shared by commands that construct a client source.
#[derive(Args, Clone, Debug, Default)]
pub struct ConnectionFlags {
    /// Kubernetes context to use
    #[arg(long, value_name = "CONTEXT")]
    pub context: Option<String>,

    /// Directory for cached metadata responses; an empty value disables caching
    #[arg(long, value_name = "DIR")]
    pub http_cache_dir: Option<PathBuf>,
}

impl ConnectionFlags {
    pub fn client_source(&self) -> Result<ClientSource> {
        let mut source = ClientSource::new(self.context.as_deref())?;
        if let Some(dir) = &self.http_cache_dir {
            if dir.as_os_str().is_empty() {
                source.set_http_cache_dir(None);
            } else {
                source.set_http_cache_dir(Some(dir.clone()));
            }
        }
        Ok(source)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    pub(crate) fn test_kubeconfig() -> Kubeconfig {
        serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Config",
            "current-context": "edge",
            "clusters": [{
                "name": "edge-cluster",
                "cluster": {"server": "https://api.edge.example.com:6443"}
            }],
            "users": [{
                "name": "edge-user",
                "user": {"token": "sekret"}
            }],
            "contexts": [{
                "name": "edge",
                "context": {
                    "cluster": "edge-cluster",
                    "user": "edge-user",
                    "namespace": "edge-system"
                }
            }]
        }))
        .expect("static kubeconfig parses")
    }

    #[test]
    fn unknown_contexts_are_rejected_at_construction() {
        let err = ClientSource::from_kubeconfig(test_kubeconfig(), Some("missing")).unwrap_err();
        assert!(matches!(err, FactoryError::ContextNotFound(name) if name == "missing"));
    }

    #[test]
    fn known_contexts_are_accepted() {
        let source = ClientSource::from_kubeconfig(test_kubeconfig(), Some("edge")).unwrap();
        assert_eq!(source.current_context().as_deref(), Some("edge"));
        assert_eq!(source.contexts(), vec!["edge".to_string()]);
    }

    #[test]
    fn default_namespace_reports_explicit_configuration() {
        let source = ClientSource::from_kubeconfig(test_kubeconfig(), None).unwrap();
        assert_eq!(
            source.default_namespace(),
            ("edge-system".to_string(), true)
        );

        let mut bare = test_kubeconfig();
        bare.contexts[0].context.as_mut().unwrap().namespace = None;
        let source = ClientSource::from_kubeconfig(bare, None).unwrap();
        assert_eq!(source.default_namespace(), ("default".to_string(), false));
    }

    #[test]
    fn http_cache_defaults_on_and_can_be_disabled() {
        let mut source = ClientSource::from_kubeconfig(test_kubeconfig(), None).unwrap();
        assert!(source.http_cache_dir().is_some());
        source.set_http_cache_dir(None);
        assert!(source.http_cache_dir().is_none());
    }

    #[test]
    fn later_wrappers_wrap_the_chain_earlier_ones_produced() {
        let applied = Arc::new(Mutex::new(Vec::new()));
        let mut source = ClientSource::from_kubeconfig(test_kubeconfig(), None).unwrap();

        for tag in ["first", "second"] {
            let applied = applied.clone();
            source.wrap_fetch(Arc::new(move |fetch| {
                applied.lock().unwrap().push(tag);
                fetch
            }));
        }

        let base: Arc<dyn MetadataFetch> =
            Arc::new(NullFetch);
        let _chained = source.fetch_wrapper().unwrap()(base);
        // the first-installed wrapper is applied first, innermost
        assert_eq!(*applied.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn resolved_configs_carry_steady_state_timeouts() {
        let source = ClientSource::from_kubeconfig(test_kubeconfig(), Some("edge")).unwrap();

        let tuned = source.client_config().await.unwrap();
        assert_eq!(tuned.connect_timeout, Some(CONNECT_TIMEOUT));
        assert_eq!(tuned.read_timeout, Some(READ_TIMEOUT));
        assert!(
            tuned
                .cluster_url
                .to_string()
                .starts_with("https://api.edge.example.com:6443")
        );

        let bare = source.bare_client_config().await.unwrap();
        assert_eq!(bare.connect_timeout, None);
        assert_eq!(bare.read_timeout, None);
    }

    struct NullFetch;

    #[async_trait::async_trait]
    impl MetadataFetch for NullFetch {
        async fn api_groups(
            &self,
        ) -> Result<k8s_openapi::apimachinery::pkg::apis::meta::v1::APIGroupList> {
            Ok(Default::default())
        }

        async fn group_resources(
            &self,
            _api_version: &str,
        ) -> Result<k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList> {
            Ok(Default::default())
        }

        async fn core_versions(
            &self,
        ) -> Result<k8s_openapi::apimachinery::pkg::apis::meta::v1::APIVersions> {
            Ok(Default::default())
        }

        async fn core_resources(
            &self,
            _version: &str,
        ) -> Result<k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList> {
            Ok(Default::default())
        }
    }
}
