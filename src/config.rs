// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! On-disk layout and environment conventions for kubedc.
//!
//! All kubedc data lives under ~/.kubedc/:
//! - ~/.kubedc/http-cache - cached metadata responses
//! - ~/.kubedc/cache/discovery/<host>/ - discovery registry snapshots

use std::path::PathBuf;

use crate::error::{FactoryError, Result};

/// Editor environment variables, in precedence order.
pub const EDITOR_ENVS: [&str; 2] = ["KUBEDC_EDITOR", "EDITOR"];

/// Get the base kubedc directory (~/.kubedc/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".kubedc"))
        .ok_or(FactoryError::NoHomeDir)
}

/// Default directory for cached metadata responses (~/.kubedc/http-cache)
pub fn default_http_cache_dir() -> Result<PathBuf> {
    Ok(base_dir()?.join("http-cache"))
}

/// Parent directory for per-host discovery snapshots (~/.kubedc/cache/discovery)
pub fn discovery_cache_root() -> Result<PathBuf> {
    Ok(base_dir()?.join("cache").join("discovery"))
}
