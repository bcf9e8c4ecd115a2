// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Client access plumbing for Kubernetes clusters running DeployConfig
//! workloads.
//!
//! The crate centers on [`factory::DeployConfigFactory`], a decorator over a
//! caller-supplied [`factory::ClientAccessFactory`] delegate: DeployConfig
//! objects get their own pod-template handling, selector encoding, port
//! extraction and pause/resume semantics, while every other kind is forwarded
//! to the delegate untouched. Around it sit the client configuration source
//! ([`kubernetes::ClientSource`]), the cached metadata discovery client
//! ([`kubernetes::CachedDiscovery`]) and the `run`/`expose` object
//! generators.

pub mod config;
pub mod error;
pub mod factory;
pub mod image;
pub mod kubernetes;
pub mod resources;

pub use error::{FactoryError, Result};
pub use factory::{ClientAccessFactory, DeployConfigFactory, JsonEncoder, ObjectEncoder};
pub use kubernetes::{CachedDiscovery, ClientSource, build_discovery_client};
pub use resources::{GroupKind, GroupResource, ResourceObject};
