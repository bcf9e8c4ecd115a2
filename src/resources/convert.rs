// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Conversion between the canonical pod schema and the wire form.
//!
//! Pause/resume and template editing logic is written once against the wire
//! form (`k8s_openapi::api::core::v1::PodSpec`), while DeployConfig stores
//! its template in the canonical form. The two mutator adapters let a single
//! mutator serve both shapes: convert, mutate, convert back, and only then
//! overwrite the original. On any failure the original value is untouched.

use k8s_openapi::api::core::v1 as corev1;

use crate::error::{FactoryError, Result};
use crate::resources::pod::{Container, ContainerPort, EnvFromSource, EnvVar, PodSpec, Protocol};

/// Adapt a wire-form mutator so it can run against a canonical spec.
pub fn external_mutator_for_internal<'a>(
    mutate: &'a mut dyn FnMut(&mut corev1::PodSpec) -> Result<()>,
) -> impl FnMut(&mut PodSpec) -> Result<()> + 'a {
    move |spec: &mut PodSpec| {
        let mut external = to_external(spec);
        mutate(&mut external)?;
        let internal = from_external(&external)?;
        *spec = internal;
        Ok(())
    }
}

/// Adapt a canonical-form mutator so it can run against a wire spec.
pub fn internal_mutator_for_external<'a>(
    mutate: &'a mut dyn FnMut(&mut PodSpec) -> Result<()>,
) -> impl FnMut(&mut corev1::PodSpec) -> Result<()> + 'a {
    move |spec: &mut corev1::PodSpec| {
        let mut internal = from_external(spec)?;
        mutate(&mut internal)?;
        *spec = to_external(&internal);
        Ok(())
    }
}

/// Canonical to wire form. Total: every canonical value has a wire rendering.
pub fn to_external(spec: &PodSpec) -> corev1::PodSpec {
    corev1::PodSpec {
        containers: spec.containers.iter().map(container_to_external).collect(),
        init_containers: none_if_empty(
            spec.init_containers
                .iter()
                .map(container_to_external)
                .collect(),
        ),
        node_selector: if spec.node_selector.is_empty() {
            None
        } else {
            Some(spec.node_selector.clone())
        },
        service_account_name: spec.service_account_name.clone(),
        restart_policy: spec.restart_policy.clone(),
        ..Default::default()
    }
}

/// Wire to canonical form. Fails when a populated wire field has no
/// canonical counterpart; nothing is dropped silently.
pub fn from_external(spec: &corev1::PodSpec) -> Result<PodSpec> {
    ensure_convertible(spec)?;

    Ok(PodSpec {
        containers: spec
            .containers
            .iter()
            .map(container_from_external)
            .collect::<Result<_>>()?,
        init_containers: spec
            .init_containers
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(container_from_external)
            .collect::<Result<_>>()?,
        node_selector: spec.node_selector.clone().unwrap_or_default(),
        service_account_name: spec.service_account_name.clone(),
        restart_policy: spec.restart_policy.clone(),
    })
}

fn ensure_convertible(spec: &corev1::PodSpec) -> Result<()> {
    let unsupported = [
        ("volumes", spec.volumes.is_some()),
        ("ephemeralContainers", spec.ephemeral_containers.is_some()),
        ("affinity", spec.affinity.is_some()),
        ("tolerations", spec.tolerations.is_some()),
        ("hostAliases", spec.host_aliases.is_some()),
        ("overhead", spec.overhead.is_some()),
        ("securityContext", spec.security_context.is_some()),
        (
            "topologySpreadConstraints",
            spec.topology_spread_constraints.is_some(),
        ),
    ];
    for (field, set) in unsupported {
        if set {
            return Err(FactoryError::SpecConversion(format!(
                "pod field {field} has no canonical counterpart"
            )));
        }
    }
    Ok(())
}

fn container_to_external(container: &Container) -> corev1::Container {
    corev1::Container {
        name: container.name.clone(),
        image: container.image.clone(),
        command: none_if_empty(container.command.clone()),
        args: none_if_empty(container.args.clone()),
        ports: none_if_empty(container.ports.iter().map(port_to_external).collect()),
        env: none_if_empty(container.env.iter().map(env_to_external).collect()),
        env_from: none_if_empty(container.env_from.iter().map(env_from_to_external).collect()),
        ..Default::default()
    }
}

fn container_from_external(container: &corev1::Container) -> Result<Container> {
    let unsupported = [
        ("lifecycle", container.lifecycle.is_some()),
        ("livenessProbe", container.liveness_probe.is_some()),
        ("readinessProbe", container.readiness_probe.is_some()),
        ("startupProbe", container.startup_probe.is_some()),
        ("resources", container.resources.is_some()),
        ("volumeMounts", container.volume_mounts.is_some()),
        ("volumeDevices", container.volume_devices.is_some()),
        ("securityContext", container.security_context.is_some()),
    ];
    for (field, set) in unsupported {
        if set {
            return Err(FactoryError::SpecConversion(format!(
                "container {} field {field} has no canonical counterpart",
                container.name
            )));
        }
    }

    Ok(Container {
        name: container.name.clone(),
        image: container.image.clone(),
        command: container.command.clone().unwrap_or_default(),
        args: container.args.clone().unwrap_or_default(),
        ports: container
            .ports
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(port_from_external)
            .collect::<Result<_>>()?,
        env: container
            .env
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(env_from_external)
            .collect::<Result<_>>()?,
        env_from: container
            .env_from
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(env_from_from_external)
            .collect::<Result<_>>()?,
    })
}

fn port_to_external(port: &ContainerPort) -> corev1::ContainerPort {
    corev1::ContainerPort {
        container_port: port.container_port,
        name: port.name.clone(),
        protocol: port.protocol.map(|p| p.as_str().to_string()),
        ..Default::default()
    }
}

fn port_from_external(port: &corev1::ContainerPort) -> Result<ContainerPort> {
    let protocol = match port.protocol.as_deref() {
        None => None,
        Some("TCP") => Some(Protocol::Tcp),
        Some("UDP") => Some(Protocol::Udp),
        Some("SCTP") => Some(Protocol::Sctp),
        Some(other) => {
            return Err(FactoryError::SpecConversion(format!(
                "unknown port protocol {other:?}"
            )));
        }
    };
    Ok(ContainerPort {
        container_port: port.container_port,
        name: port.name.clone(),
        protocol,
    })
}

fn env_to_external(env: &EnvVar) -> corev1::EnvVar {
    match env {
        EnvVar::Value { name, value } => corev1::EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            value_from: None,
        },
        EnvVar::SecretRef {
            name,
            secret_name,
            key,
        } => corev1::EnvVar {
            name: name.clone(),
            value: None,
            value_from: Some(corev1::EnvVarSource {
                secret_key_ref: Some(corev1::SecretKeySelector {
                    name: secret_name.clone(),
                    key: key.clone(),
                    optional: None,
                }),
                ..Default::default()
            }),
        },
        EnvVar::ConfigMapRef {
            name,
            configmap_name,
            key,
        } => corev1::EnvVar {
            name: name.clone(),
            value: None,
            value_from: Some(corev1::EnvVarSource {
                config_map_key_ref: Some(corev1::ConfigMapKeySelector {
                    name: configmap_name.clone(),
                    key: key.clone(),
                    optional: None,
                }),
                ..Default::default()
            }),
        },
        EnvVar::FieldRef { name, field_path } => corev1::EnvVar {
            name: name.clone(),
            value: None,
            value_from: Some(corev1::EnvVarSource {
                field_ref: Some(corev1::ObjectFieldSelector {
                    field_path: field_path.clone(),
                    api_version: None,
                }),
                ..Default::default()
            }),
        },
    }
}

fn env_from_external(env: &corev1::EnvVar) -> Result<EnvVar> {
    match &env.value_from {
        None => Ok(EnvVar::Value {
            name: env.name.clone(),
            value: env.value.clone().unwrap_or_default(),
        }),
        Some(source) => {
            if source.resource_field_ref.is_some() {
                return Err(FactoryError::SpecConversion(format!(
                    "env {} resourceFieldRef has no canonical counterpart",
                    env.name
                )));
            }
            if let Some(secret) = &source.secret_key_ref {
                Ok(EnvVar::SecretRef {
                    name: env.name.clone(),
                    secret_name: secret.name.clone(),
                    key: secret.key.clone(),
                })
            } else if let Some(configmap) = &source.config_map_key_ref {
                Ok(EnvVar::ConfigMapRef {
                    name: env.name.clone(),
                    configmap_name: configmap.name.clone(),
                    key: configmap.key.clone(),
                })
            } else if let Some(field) = &source.field_ref {
                Ok(EnvVar::FieldRef {
                    name: env.name.clone(),
                    field_path: field.field_path.clone(),
                })
            } else {
                Err(FactoryError::SpecConversion(format!(
                    "env {} has an empty valueFrom",
                    env.name
                )))
            }
        }
    }
}

fn env_from_to_external(source: &EnvFromSource) -> corev1::EnvFromSource {
    match source {
        EnvFromSource::Secret(name) => corev1::EnvFromSource {
            secret_ref: Some(corev1::SecretEnvSource {
                name: name.clone(),
                optional: None,
            }),
            ..Default::default()
        },
        EnvFromSource::ConfigMap(name) => corev1::EnvFromSource {
            config_map_ref: Some(corev1::ConfigMapEnvSource {
                name: name.clone(),
                optional: None,
            }),
            ..Default::default()
        },
    }
}

fn env_from_from_external(source: &corev1::EnvFromSource) -> Result<EnvFromSource> {
    if source.prefix.is_some() {
        return Err(FactoryError::SpecConversion(
            "envFrom prefix has no canonical counterpart".to_string(),
        ));
    }
    if let Some(secret) = &source.secret_ref {
        Ok(EnvFromSource::Secret(secret.name.clone()))
    } else if let Some(configmap) = &source.config_map_ref {
        Ok(EnvFromSource::ConfigMap(configmap.name.clone()))
    } else {
        Err(FactoryError::SpecConversion(
            "envFrom entry has no source".to_string(),
        ))
    }
}

fn none_if_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() { None } else { Some(values) }
}
