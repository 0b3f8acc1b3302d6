// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Provider construction
//!
//! Builds adapters from settings, failing with configuration errors that
//! name the missing key. Assembling the orchestrator is deliberately
//! forgiving: a provider that cannot be constructed is skipped with a
//! warning so one bad credential does not take down the rest of the plan.

use std::sync::Arc;

use crate::config::{
    CloudConfig, ConfigSource, DaemonConfig, MarketplaceConfig, Settings,
};
use crate::error::{GatewayError, Result};
use crate::orchestrator::{Orchestrator, RetryConfig};
use crate::port::LanguageModel;
use crate::providers::cloud::CloudProvider;
use crate::providers::daemon::DaemonProvider;
use crate::providers::marketplace::{MarketplaceProvider, RelayTransport};
use crate::telemetry::Telemetry;

/// Factory for provider adapters
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create_daemon(config: &DaemonConfig) -> Arc<dyn LanguageModel> {
        Arc::new(DaemonProvider::new(config.clone()))
    }

    pub fn create_cloud(
        config: &CloudConfig,
        source: &dyn ConfigSource,
    ) -> Result<Arc<dyn LanguageModel>> {
        let api_key = config.resolve_api_key(source).ok_or_else(|| {
            GatewayError::configuration(format!(
                "cloud provider requires an API key; set {} or providers.cloud.api_key",
                config.api_key_env
            ))
            .with_context("key", config.api_key_env.clone())
        })?;
        Ok(Arc::new(CloudProvider::new(config.clone(), api_key)))
    }

    pub fn create_marketplace(
        config: &MarketplaceConfig,
        transport: Arc<dyn RelayTransport>,
    ) -> Result<Arc<dyn LanguageModel>> {
        let pubkey = config.provider_pubkey.clone().ok_or_else(|| {
            GatewayError::configuration(
                "marketplace provider requires providers.marketplace.provider_pubkey",
            )
        })?;
        if config.relays.is_empty() {
            return Err(GatewayError::configuration(
                "marketplace provider requires at least one relay in providers.marketplace.relays",
            ));
        }
        Ok(Arc::new(MarketplaceProvider::new(
            transport,
            config.clone(),
            pubkey,
        )))
    }

    /// Create a provider by key.
    pub fn create(
        key: &str,
        settings: &Settings,
        source: &dyn ConfigSource,
        transport: Option<&Arc<dyn RelayTransport>>,
    ) -> Result<Arc<dyn LanguageModel>> {
        match key {
            "daemon" => Ok(Self::create_daemon(&settings.providers.daemon)),
            "cloud" => Self::create_cloud(&settings.providers.cloud, source),
            "marketplace" => {
                let transport = transport.ok_or_else(|| {
                    GatewayError::configuration(
                        "marketplace provider requires a relay transport",
                    )
                })?;
                Self::create_marketplace(
                    &settings.providers.marketplace,
                    Arc::clone(transport),
                )
            }
            other => Err(GatewayError::configuration(format!(
                "unknown provider: {other}"
            ))
            .with_context("provider", other)),
        }
    }
}

/// Assemble an orchestrator from settings.
///
/// Providers are registered in fallback order, with the default provider
/// moved to the front. Disabled providers are skipped silently; enabled
/// providers that fail to construct are skipped with a warning.
pub fn orchestrator(
    settings: &Settings,
    source: &dyn ConfigSource,
    transport: Option<Arc<dyn RelayTransport>>,
    telemetry: Arc<dyn Telemetry>,
) -> Result<Orchestrator> {
    let mut order = settings.defaults.fallback_order.clone();
    if let Some(pos) = order.iter().position(|k| k == &settings.defaults.provider) {
        let preferred = order.remove(pos);
        order.insert(0, preferred);
    }

    let mut orchestrator =
        Orchestrator::new(RetryConfig::from(&settings.resilience), telemetry);
    for key in &order {
        let (enabled, display_name, model_name) = match key.as_str() {
            "daemon" => (
                settings.providers.daemon.enabled,
                settings.providers.daemon.model_name.clone(),
                settings.providers.daemon.model_identifier.clone(),
            ),
            "cloud" => (
                settings.providers.cloud.enabled,
                settings.providers.cloud.model_name.clone(),
                settings.providers.cloud.model_identifier.clone(),
            ),
            "marketplace" => (
                settings.providers.marketplace.enabled,
                settings.providers.marketplace.model_name.clone(),
                // marketplace jobs may leave model choice to the network
                settings
                    .providers
                    .marketplace
                    .model_identifier
                    .clone()
                    .unwrap_or_else(|| "any".to_string()),
            ),
            other => {
                tracing::warn!(provider = %other, "unknown provider in fallback order, skipping");
                continue;
            }
        };
        if !enabled {
            continue;
        }
        match ProviderFactory::create(key, settings, source, transport.as_ref()) {
            Ok(provider) => {
                orchestrator =
                    orchestrator.register(key.clone(), display_name, model_name, provider);
            }
            Err(e) => {
                tracing::warn!(provider = %key, error = %e, "cannot construct provider, skipping");
            }
        }
    }
    Ok(orchestrator)
}
