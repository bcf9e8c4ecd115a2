// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The factory contract and its injectable collaborators.

pub mod dispatch;
pub mod generators;

use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use kube::config::Kubeconfig;
use kube::{Client, Config};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::Result;
use crate::kubernetes::CachedDiscovery;
use crate::resources::{GroupKind, GroupResource, ResourceObject};
use generators::Generator;

pub use dispatch::DeployConfigFactory;
pub use generators::{ParamSpec, default_generators};

/// Decides whether an object is shown by listing commands.
pub type ResourceFilter = Arc<dyn Fn(&ResourceObject) -> bool + Send + Sync>;

/// Serializes objects handed back by pause/resume.
pub trait ObjectEncoder: Send + Sync {
    fn encode(&self, object: &ResourceObject) -> Result<Vec<u8>>;
}

/// Stock encoder: plain JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonEncoder;

impl ObjectEncoder for JsonEncoder {
    fn encode(&self, object: &ResourceObject) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(object)?)
    }
}

/// The full cluster-access factory contract.
///
/// A delegate implements this for every generic kind;
/// [`DeployConfigFactory`] wraps one and intercepts the operations where the
/// DeployConfig kind needs its own interpretation, forwarding everything else
/// untouched.
#[async_trait]
pub trait ClientAccessFactory: Send + Sync {
    /// The unresolved kubeconfig.
    fn raw_config(&self) -> Result<Kubeconfig>;

    /// The resolved connection configuration, with client tuning applied.
    async fn client_config(&self) -> Result<Config>;

    /// The resolved connection configuration exactly as stated, untuned.
    async fn bare_client_config(&self) -> Result<Config>;

    /// A client over the resolved configuration.
    async fn client(&self) -> Result<Client>;

    /// The caching metadata-discovery client.
    async fn discovery_client(&self) -> Result<CachedDiscovery>;

    /// Run `mutate` against the object's pod spec, in the wire schema.
    /// Reports whether the object kind carries a mutable pod spec at all.
    fn update_pod_spec(
        &self,
        object: &mut ResourceObject,
        mutate: &mut dyn FnMut(&mut corev1::PodSpec) -> Result<()>,
    ) -> Result<bool>;

    /// The object's label selector as a label-expression string.
    fn map_based_selector(&self, object: &ResourceObject) -> Result<String>;

    /// Declared container ports, as decimal strings in declaration order.
    fn ports_for_object(&self, object: &ResourceObject) -> Result<Vec<String>>;

    /// Port number (string) to protocol name, last declaration winning.
    fn protocols_for_object(
        &self,
        object: &ResourceObject,
    ) -> Result<BTreeMap<String, String>>;

    fn labels_for_object(&self, object: &ResourceObject) -> Result<BTreeMap<String, String>>;

    /// Mark the object paused and return it re-encoded. Fails if it already is.
    fn pauser(&self, object: &mut ResourceObject) -> Result<Vec<u8>>;

    /// Clear the object's paused flag and return it re-encoded. Fails if it
    /// is not paused.
    fn resumer(&self, object: &mut ResourceObject) -> Result<Vec<u8>>;

    fn can_be_exposed(&self, kind: &GroupKind) -> Result<()>;

    fn can_be_autoscaled(&self, kind: &GroupKind) -> Result<()>;

    /// The generator table for a command name.
    fn generators(&self, command: &str) -> HashMap<String, Arc<dyn Generator>>;

    /// The effective namespace and whether it was set explicitly.
    fn default_namespace(&self) -> Result<(String, bool)>;

    /// Resolve an image shorthand to a full reference.
    fn resolve_image(&self, image: &str) -> Result<String>;

    /// Attach the factory's connection flags to a command definition.
    fn bind_flags(&self, command: clap::Command) -> clap::Command;

    /// Render an invocation for change-cause recording.
    fn command_record(&self, argv: &[String], show_secrets: bool) -> String;

    fn default_resource_filter(&self) -> ResourceFilter;

    /// Resource kinds worth suggesting where a pod template is expected.
    fn suggested_pod_template_resources(&self) -> Vec<GroupResource>;

    /// Editor environment variables, in precedence order.
    fn editor_envs(&self) -> Vec<String>;
}
