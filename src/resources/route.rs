// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The Route kind (route.kubedc.io/v1) emitted by the expose generator.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};

pub const GROUP: &str = "route.kubedc.io";
pub const VERSION: &str = "v1";
pub const KIND: &str = "Route";

pub fn api_version() -> String {
    format!("{GROUP}/{VERSION}")
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(flatten)]
    pub types: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RouteSpec,
}

impl Route {
    pub fn new(name: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            types: TypeMeta {
                api_version: api_version(),
                kind: KIND.to_string(),
            },
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            spec: RouteSpec {
                to: RouteTarget {
                    kind: "Service".to_string(),
                    name: service.into(),
                },
                ..Default::default()
            },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default)]
    pub to: RouteTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTarget {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: String,
}
