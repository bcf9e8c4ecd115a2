// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Container image reference parsing.
//!
//! Accepts `[registry[:port]/]repository[:tag][@digest]` and renders the
//! normalized string form the generators embed into pod templates.

use std::fmt;

use crate::error::{FactoryError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    pub registry: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        write!(f, "{}", self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

/// Parse an image reference, failing on anything a registry would reject.
pub fn parse(spec: &str) -> Result<ImageRef> {
    let invalid = |reason: &str| FactoryError::InvalidImageReference(format!("{spec}: {reason}"));

    if spec.is_empty() {
        return Err(invalid("empty reference"));
    }
    if spec.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }

    let (remainder, digest) = match spec.split_once('@') {
        Some((head, digest)) => {
            let valid = digest
                .split_once(':')
                .is_some_and(|(algo, hex)| {
                    !algo.is_empty() && !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
                });
            if !valid {
                return Err(invalid("malformed digest"));
            }
            (head, Some(digest.to_string()))
        }
        None => (spec, None),
    };

    // A tag colon can only appear after the last path separator; anything
    // before that is a registry port.
    let (remainder, tag) = match remainder.rfind(':') {
        Some(idx) if idx > remainder.rfind('/').map_or(0, |s| s) => {
            let (head, tag) = (&remainder[..idx], &remainder[idx + 1..]);
            if tag.is_empty()
                || tag.len() > 128
                || !tag.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
            {
                return Err(invalid("malformed tag"));
            }
            (head, Some(tag.to_string()))
        }
        _ => (remainder, None),
    };

    // The first path component is a registry host when it looks like one.
    let (registry, repository) = match remainder.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (Some(first.to_string()), rest.to_string())
        }
        _ => (None, remainder.to_string()),
    };

    if repository.is_empty() {
        return Err(invalid("empty repository"));
    }
    let repo_ok = repository
        .split('/')
        .all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
        });
    if !repo_ok {
        return Err(invalid("malformed repository"));
    }

    Ok(ImageRef {
        registry,
        repository,
        tag,
        digest,
    })
}
