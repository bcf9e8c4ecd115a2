// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Object generators backing the `run` and `expose` commands.
//!
//! The tables here always win over same-named delegate entries when the
//! factory merges them; see [`crate::factory::dispatch`].

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{FactoryError, Result};
use crate::image;
use crate::resources::ResourceObject;
use crate::resources::deploy_config::{DeployConfig, PodTemplate};
use crate::resources::pod::{Container, PodSpec};
use crate::resources::route::{Route, RoutePort};

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
}

/// Builds an object from named string parameters.
pub trait Generator: Send + Sync {
    fn param_specs(&self) -> &'static [ParamSpec];
    fn generate(&self, params: &BTreeMap<String, String>) -> Result<ResourceObject>;
}

/// The specialized generator table for a command name. Unknown command names
/// get an empty table, leaving the delegate's entries untouched on merge.
pub fn default_generators(command: &str) -> HashMap<String, Arc<dyn Generator>> {
    let mut table: HashMap<String, Arc<dyn Generator>> = HashMap::new();
    match command {
        "run" => {
            table.insert("deployconfig/v1".to_string(), Arc::new(DeployConfigGenerator));
            // legacy alias for run/v1
            table.insert(
                "run-controller/v1".to_string(),
                Arc::new(ReplicationControllerGenerator),
            );
        }
        "expose" => {
            table.insert("route/v1".to_string(), Arc::new(RouteGenerator));
        }
        _ => {}
    }
    table
}

fn required<'a>(
    params: &'a BTreeMap<String, String>,
    name: &'static str,
) -> Result<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(FactoryError::MissingParam(name))
}

fn parse_replicas(params: &BTreeMap<String, String>) -> Result<i32> {
    match params.get("replicas") {
        None => Ok(1),
        Some(raw) => raw.parse().map_err(|_| FactoryError::InvalidParam {
            name: "replicas",
            reason: format!("{raw:?} is not a number"),
        }),
    }
}

fn parse_port(params: &BTreeMap<String, String>) -> Result<Option<i32>> {
    match params.get("port") {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| FactoryError::InvalidParam {
            name: "port",
            reason: format!("{raw:?} is not a port number"),
        }),
    }
}

/// Parse "k1=v1,k2=v2" label lists.
fn parse_labels(params: &BTreeMap<String, String>) -> Result<Option<BTreeMap<String, String>>> {
    let Some(raw) = params.get("labels") else {
        return Ok(None);
    };
    let mut labels = BTreeMap::new();
    for pair in raw.split(',') {
        match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                labels.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(FactoryError::InvalidParam {
                    name: "labels",
                    reason: format!("{pair:?} is not a key=value pair"),
                });
            }
        }
    }
    Ok(Some(labels))
}

/// Wrap a typed wire object as a dynamic one, stamping its apiVersion/kind.
fn into_dynamic<T>(object: &T) -> Result<DynamicObject>
where
    T: Serialize + k8s_openapi::Resource,
{
    let mut value = serde_json::to_value(object)?;
    value["apiVersion"] = T::API_VERSION.into();
    value["kind"] = T::KIND.into();
    Ok(serde_json::from_value(value)?)
}

/// `run` generator emitting a DeployConfig around a single container.
pub struct DeployConfigGenerator;

const RUN_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "name", required: true },
    ParamSpec { name: "image", required: true },
    ParamSpec { name: "replicas", required: false },
    ParamSpec { name: "port", required: false },
    ParamSpec { name: "labels", required: false },
];

impl Generator for DeployConfigGenerator {
    fn param_specs(&self) -> &'static [ParamSpec] {
        RUN_PARAMS
    }

    fn generate(&self, params: &BTreeMap<String, String>) -> Result<ResourceObject> {
        let name = required(params, "name")?;
        let image = image::parse(required(params, "image")?)?.to_string();
        let replicas = parse_replicas(params)?;
        let labels = parse_labels(params)?
            .unwrap_or_else(|| BTreeMap::from([("run".to_string(), name.to_string())]));

        let mut container = Container::new(name, image);
        if let Some(port) = parse_port(params)? {
            container = container.port(port);
        }

        let mut dc = DeployConfig::new(name);
        dc.spec.replicas = replicas;
        dc.spec.selector = labels.clone();
        dc.spec.template = Some(PodTemplate {
            metadata: ObjectMeta {
                labels: Some(labels),
                ..Default::default()
            },
            spec: PodSpec::default().container(container),
        });
        Ok(ResourceObject::DeployConfig(dc))
    }
}

/// Legacy `run` generator emitting a bare v1 ReplicationController.
pub struct ReplicationControllerGenerator;

impl Generator for ReplicationControllerGenerator {
    fn param_specs(&self) -> &'static [ParamSpec] {
        RUN_PARAMS
    }

    fn generate(&self, params: &BTreeMap<String, String>) -> Result<ResourceObject> {
        let name = required(params, "name")?;
        let image = image::parse(required(params, "image")?)?.to_string();
        let replicas = parse_replicas(params)?;
        let labels = parse_labels(params)?
            .unwrap_or_else(|| BTreeMap::from([("run".to_string(), name.to_string())]));

        let mut container = corev1::Container {
            name: name.to_string(),
            image: Some(image),
            ..Default::default()
        };
        if let Some(port) = parse_port(params)? {
            container.ports = Some(vec![corev1::ContainerPort {
                container_port: port,
                ..Default::default()
            }]);
        }

        let controller = corev1::ReplicationController {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels.clone()),
                ..Default::default()
            },
            spec: Some(corev1::ReplicationControllerSpec {
                replicas: Some(replicas),
                selector: Some(labels.clone()),
                template: Some(corev1::PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(corev1::PodSpec {
                        containers: vec![container],
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            }),
            status: None,
        };
        Ok(ResourceObject::Other(into_dynamic(&controller)?))
    }
}

/// `expose` generator emitting a Route pointing at a service.
pub struct RouteGenerator;

const EXPOSE_PARAMS: &[ParamSpec] = &[
    ParamSpec { name: "service", required: true },
    ParamSpec { name: "name", required: false },
    ParamSpec { name: "hostname", required: false },
    ParamSpec { name: "port", required: false },
];

impl Generator for RouteGenerator {
    fn param_specs(&self) -> &'static [ParamSpec] {
        EXPOSE_PARAMS
    }

    fn generate(&self, params: &BTreeMap<String, String>) -> Result<ResourceObject> {
        let service = required(params, "service")?;
        let name = params
            .get("name")
            .map(String::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or(service);

        let mut route = Route::new(name, service);
        route.spec.host = params.get("hostname").cloned();
        if let Some(port) = parse_port(params)? {
            route.spec.port = Some(RoutePort {
                target_port: port.to_string(),
            });
        }

        let value = serde_json::to_value(&route)?;
        Ok(ResourceObject::Other(serde_json::from_value(value)?))
    }
}
