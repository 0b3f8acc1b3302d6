// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Gateway settings
//!
//! Per-provider configuration records plus defaults and resilience knobs,
//! loaded from TOML. Settings are created once at orchestrator startup and
//! treated as read-only for the lifetime of the adapters that own them.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::source::ConfigSource;
use crate::error::{GatewayError, Result};

/// Top-level settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default provider selection and fallback ordering
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Retry and backoff settings for plan execution
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

impl Settings {
    /// Parse settings from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| GatewayError::configuration(format!("invalid settings: {e}")))
    }

    /// Load settings from a TOML file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::configuration(format!("cannot read settings file: {e}"))
                .with_context("path", path.display().to_string())
        })?;
        Self::from_toml(&text)
    }

    /// Serialize settings to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GatewayError::configuration(format!("cannot serialize settings: {e}")))
    }
}

/// Configuration for all providers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Local inference daemon (OpenAI-compatible HTTP)
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Cloud REST vendor
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Decentralized relay-based job marketplace
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
}

/// Local daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Whether this provider participates in plans
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the daemon's OpenAI-compatible API
    #[serde(default = "default_daemon_base_url")]
    pub base_url: String,

    /// User-facing model name
    #[serde(default = "default_daemon_model_name")]
    pub model_name: String,

    /// Backend-facing model identifier (may differ from the display name)
    #[serde(default = "default_daemon_model_identifier")]
    pub model_identifier: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_daemon_base_url(),
            model_name: default_daemon_model_name(),
            model_identifier: default_daemon_model_identifier(),
        }
    }
}

/// Cloud REST vendor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub enabled: bool,

    /// API key stored directly (not recommended; prefer the env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Secret key the API key is resolved from when not stored directly
    #[serde(default = "default_cloud_api_key_env")]
    pub api_key_env: String,

    /// Base URL for the vendor API
    #[serde(default = "default_cloud_base_url")]
    pub base_url: String,

    /// User-facing model name
    #[serde(default = "default_cloud_model_name")]
    pub model_name: String,

    /// Backend-facing model identifier
    #[serde(default = "default_cloud_model_identifier")]
    pub model_identifier: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            api_key_env: default_cloud_api_key_env(),
            base_url: default_cloud_base_url(),
            model_name: default_cloud_model_name(),
            model_identifier: default_cloud_model_identifier(),
        }
    }
}

impl CloudConfig {
    /// Resolve the API key: the stored value wins, then the secret source.
    pub fn resolve_api_key(&self, source: &dyn ConfigSource) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| source.get_secret(&self.api_key_env).ok())
    }
}

/// Marketplace (relay job network) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Relay URLs the transport connects to
    #[serde(default)]
    pub relays: Vec<String>,

    /// Public key of the provider jobs are addressed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_pubkey: Option<String>,

    /// Job-request event kind
    #[serde(default = "default_job_kind")]
    pub job_kind: u16,

    /// User-facing model name
    #[serde(default = "default_marketplace_model_name")]
    pub model_name: String,

    /// Backend-facing model identifier, passed as a job parameter when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_identifier: Option<String>,

    /// End-to-end encrypt job payloads
    #[serde(default = "default_true")]
    pub encrypted: bool,

    /// Reuse a long-lived identity instead of a fresh keypair per job.
    /// Off by default so requests cannot be correlated to one identity.
    #[serde(default)]
    pub reuse_identity: bool,

    /// Hex-encoded secret key, required only when `reuse_identity` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_secret: Option<String>,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            relays: vec![],
            provider_pubkey: None,
            job_kind: default_job_kind(),
            model_name: default_marketplace_model_name(),
            model_identifier: None,
            encrypted: true,
            reuse_identity: false,
            identity_secret: None,
        }
    }
}

/// Default provider selection and fallback ordering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Provider used when the caller does not express a preference
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Static fallback ordering for plan construction
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            fallback_order: default_fallback_order(),
        }
    }
}

/// Retry and backoff settings for plan execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Maximum retry attempts per plan step
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds (exponentially increased)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (backoff cap)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter fraction (0.0 to 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_daemon_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_daemon_model_name() -> String {
    "Local Model".to_string()
}

fn default_daemon_model_identifier() -> String {
    "llama3.2:latest".to_string()
}

fn default_cloud_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_cloud_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_cloud_model_name() -> String {
    "GPT-4o Mini".to_string()
}

fn default_cloud_model_identifier() -> String {
    "gpt-4o-mini".to_string()
}

fn default_job_kind() -> u16 {
    5100
}

fn default_marketplace_model_name() -> String {
    "Marketplace".to_string()
}

fn default_provider() -> String {
    "daemon".to_string()
}

fn default_fallback_order() -> Vec<String> {
    vec![
        "daemon".to_string(),
        "cloud".to_string(),
        "marketplace".to_string(),
    ]
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    16000
}

fn default_jitter() -> f64 {
    0.25
}
