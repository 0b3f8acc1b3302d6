// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Local inference daemon adapter
//!
//! Talks to a locally running daemon over its OpenAI-compatible HTTP API.
//! No authentication; the daemon is assumed to listen on localhost. A
//! connection failure gets a friendly hint since the most common cause is
//! simply that the daemon is not running.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::DaemonConfig;
use crate::error::{unsupported, GatewayError, Result};
use crate::port::{CancelSignal, GenerateOptions, LanguageModel, ResponseStream};
use crate::providers::wire::{
    chat_request, generate_chat, stream_chat, ChatRequest, OpenAiCompatApi, ReqwestChatClient,
};
use crate::response::Response;

pub const DAEMON_PROVIDER: &str = "daemon";

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Provider backed by the local daemon
pub struct DaemonProvider {
    client: ReqwestChatClient,
    http: reqwest::Client,
    config: DaemonConfig,
}

impl DaemonProvider {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            client: ReqwestChatClient::new(DAEMON_PROVIDER, &config.base_url, None),
            http: reqwest::Client::new(),
            config,
        }
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.config.base_url.trim_end_matches('/'))
    }

    fn connect_hint(&self, error: reqwest::Error) -> GatewayError {
        if error.is_connect() {
            GatewayError::provider(
                format!(
                    "cannot reach local daemon at {}. Is it running?",
                    self.config.base_url
                ),
                DAEMON_PROVIDER,
                true,
            )
        } else {
            crate::error::provider_error(
                error,
                DAEMON_PROVIDER,
                &self.config.model_identifier,
                true,
            )
        }
    }

    /// Check that the daemon answers at all.
    pub async fn health_check(&self) -> Result<()> {
        let response = self
            .http
            .get(self.models_url())
            .send()
            .await
            .map_err(|e| self.connect_hint(e))?;
        if !response.status().is_success() {
            return Err(GatewayError::provider(
                format!("daemon health check failed: HTTP {}", response.status().as_u16()),
                DAEMON_PROVIDER,
                true,
            ));
        }
        Ok(())
    }

    /// List models the daemon has available.
    pub async fn list_local_models(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(self.models_url())
            .send()
            .await
            .map_err(|e| self.connect_hint(e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.connect_hint(e))?;
        if !(200..300).contains(&status) {
            return Err(crate::providers::wire::map_http_error(
                status,
                &body,
                DAEMON_PROVIDER,
                &self.config.model_identifier,
            ));
        }
        let list: ModelList = serde_json::from_str(&body).map_err(|e| {
            GatewayError::provider(
                format!("invalid model list: {e}"),
                DAEMON_PROVIDER,
                false,
            )
        })?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    fn request(&self, options: &GenerateOptions, stream: bool) -> ChatRequest {
        chat_request(&self.config.model_identifier, options, stream)
    }
}

#[async_trait]
impl LanguageModel for DaemonProvider {
    fn name(&self) -> &str {
        DAEMON_PROVIDER
    }

    async fn generate_text(&self, options: GenerateOptions) -> Result<Response> {
        generate_chat(&self.client, self.request(&options, false)).await
    }

    async fn stream_text(
        &self,
        options: GenerateOptions,
        cancel: CancelSignal,
    ) -> Result<ResponseStream> {
        stream_chat(&self.client, self.request(&options, true), cancel).await
    }

    async fn generate_structured(
        &self,
        _options: GenerateOptions,
        _shape: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        Err(unsupported(DAEMON_PROVIDER, "generate_structured"))
    }
}

#[async_trait]
impl OpenAiCompatApi for DaemonProvider {
    fn provider_key(&self) -> &str {
        DAEMON_PROVIDER
    }

    async fn chat_completions(&self, request: &ChatRequest) -> Result<Response> {
        let reply = crate::providers::wire::ChatHttpClient::execute(&self.client, request).await?;
        if !(200..300).contains(&reply.status) {
            return Err(crate::providers::wire::map_http_error(
                reply.status,
                &reply.body,
                DAEMON_PROVIDER,
                &request.model,
            ));
        }
        let wire = serde_json::from_str(&reply.body).map_err(|e| {
            GatewayError::provider(
                format!("invalid response: {e}"),
                DAEMON_PROVIDER,
                false,
            )
        })?;
        crate::providers::wire::response_from_wire(wire, DAEMON_PROVIDER, &request.model)
    }

    async fn list_models(&self) -> Result<serde_json::Value> {
        let models = self.list_local_models().await?;
        Ok(serde_json::json!({ "data": models }))
    }
}
