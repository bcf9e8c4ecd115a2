// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for the factory and its collaborators.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("cannot resolve client configuration: {0}")]
    ConfigResolution(#[from] kube::config::KubeconfigError),

    #[error("cannot construct cluster client: {0}")]
    ClientConstruction(#[source] kube::Error),

    #[error("context '{0}' not found in kubeconfig")]
    ContextNotFound(String),

    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("is already paused")]
    AlreadyPaused,

    #[error("is not paused")]
    NotPaused,

    #[error("pod spec conversion: {0}")]
    SpecConversion(String),

    #[error("missing generator parameter: {0}")]
    MissingParam(&'static str),

    #[error("invalid generator parameter {name}: {reason}")]
    InvalidParam {
        name: &'static str,
        reason: String,
    },

    #[error("invalid image reference: {0}")]
    InvalidImageReference(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FactoryError>;
