// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Configuration and secret sources
//!
//! Adapters and the factory consume credentials and endpoints through this
//! trait instead of reading the environment directly, so tests can inject an
//! explicit source per test.

use std::collections::BTreeMap;

use crate::error::{GatewayError, Result};

/// Supplies configuration values and secrets by key.
pub trait ConfigSource: Send + Sync {
    /// Get a configuration value. Fails with a `Configuration` error on a
    /// missing key; callers with a sensible default should use [`get_or`].
    ///
    /// [`get_or`]: ConfigSource::get_or
    fn get(&self, key: &str) -> Result<String>;

    /// Get a secret (API key, key material). Fails on a missing secret.
    fn get_secret(&self, key: &str) -> Result<String>;

    /// Get a value, degrading gracefully to a default when the key is absent.
    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|_| default.to_string())
    }
}

/// Source backed by process environment variables.
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn get(&self, key: &str) -> Result<String> {
        std::env::var(key).map_err(|_| {
            GatewayError::configuration(format!("missing configuration value: {key}"))
                .with_context("key", key)
        })
    }

    fn get_secret(&self, key: &str) -> Result<String> {
        std::env::var(key).map_err(|_| {
            GatewayError::configuration(format!("missing secret: {key}")).with_context("key", key)
        })
    }
}

/// In-memory source for tests and embedding callers.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    values: BTreeMap<String, String>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for StaticConfigSource {
    fn get(&self, key: &str) -> Result<String> {
        self.values.get(key).cloned().ok_or_else(|| {
            GatewayError::configuration(format!("missing configuration value: {key}"))
                .with_context("key", key)
        })
    }

    fn get_secret(&self, key: &str) -> Result<String> {
        self.get(key)
    }
}
