// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The DeployConfig workload kind (workloads.kubedc.io/v1).
//!
//! DeployConfig predates its API group; objects created through the legacy
//! ungrouped endpoint still carry the bare `v1` apiVersion, so kind matching
//! accepts both spellings.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::GroupKind;
use super::pod::PodSpec;

pub const GROUP: &str = "workloads.kubedc.io";
pub const VERSION: &str = "v1";
pub const KIND: &str = "DeployConfig";

/// Group of the pre-group API endpoint.
pub const LEGACY_GROUP: &str = "";

pub fn api_version() -> String {
    format!("{GROUP}/{VERSION}")
}

/// True for DeployConfig under its proper group or the legacy alias.
pub fn is_deploy_config_kind(kind: &GroupKind) -> bool {
    kind.kind == KIND && (kind.group == GROUP || kind.group == LEGACY_GROUP)
}

/// True when a wire apiVersion/kind pair names a DeployConfig.
pub fn matches_api(api_version: &str, kind: &str) -> bool {
    kind == KIND && (api_version == self::api_version() || api_version == VERSION)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(flatten)]
    pub types: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeployConfigSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeployConfigStatus>,
}

impl DeployConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            types: TypeMeta {
                api_version: api_version(),
                kind: KIND.to_string(),
            },
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind {
            group: GROUP.to_string(),
            kind: KIND.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfigSpec {
    #[serde(default)]
    pub replicas: i32,
    /// Suspends the controller's own reconciliation while set.
    #[serde(default)]
    pub paused: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplate>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplate {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfigStatus {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub observed_generation: i64,
}
