// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource object model shared by the factory surface.

pub mod convert;
pub mod deploy_config;
pub mod pod;
pub mod route;

use kube::api::DynamicObject;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::Result;
use deploy_config::DeployConfig;

/// A runtime object as seen by the factory: either the specialized
/// DeployConfig kind or anything else, held generically.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ResourceObject {
    DeployConfig(DeployConfig),
    Other(DynamicObject),
}

impl ResourceObject {
    /// Classify a decoded wire object by its apiVersion/kind pair.
    pub fn from_value(value: Value) -> Result<Self> {
        let api_version = value
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
        if deploy_config::matches_api(api_version, kind) {
            Ok(Self::DeployConfig(serde_json::from_value(value)?))
        } else {
            Ok(Self::Other(serde_json::from_value(value)?))
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::DeployConfig(dc) => dc.metadata.name.as_deref(),
            Self::Other(obj) => obj.metadata.name.as_deref(),
        }
    }

    pub fn group_kind(&self) -> GroupKind {
        match self {
            Self::DeployConfig(dc) => dc.group_kind(),
            Self::Other(obj) => match &obj.types {
                Some(types) => {
                    let group = match types.api_version.split_once('/') {
                        Some((group, _version)) => group.to_string(),
                        None => String::new(),
                    };
                    GroupKind {
                        group,
                        kind: types.kind.clone(),
                    }
                }
                None => GroupKind::default(),
            },
        }
    }
}

/// A kind qualified by its API group (empty group for the core API).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// A resource plural qualified by its API group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}
