// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

pub mod cache;
pub mod client;
pub mod discovery;

pub use client::{ClientSource, ConnectionFlags, FetchWrapper};
pub use discovery::{
    ApiFetch, CachedDiscovery, DiscoveredResource, MetadataFetch, ResourceRegistry,
    build_discovery_client, discovery_cache_dir,
};
