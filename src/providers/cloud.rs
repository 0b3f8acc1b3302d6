// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Cloud REST vendor adapter
//!
//! Same chat wire format as the daemon, different endpoint and bearer auth.
//! This is the only adapter that implements structured generation, via the
//! vendor's `response_format` JSON-schema mode.

use async_trait::async_trait;

use crate::config::CloudConfig;
use crate::error::{GatewayError, Result};
use crate::port::{CancelSignal, GenerateOptions, LanguageModel, ResponseStream};
use crate::providers::wire::{
    chat_request, generate_chat, map_http_error, response_from_wire, stream_chat, ChatHttpClient,
    ChatRequest, OpenAiCompatApi, ReqwestChatClient,
};
use crate::response::Response;

pub const CLOUD_PROVIDER: &str = "cloud";

/// Provider backed by a hosted vendor API
pub struct CloudProvider {
    client: ReqwestChatClient,
    config: CloudConfig,
}

impl CloudProvider {
    /// The API key must already be resolved; the factory fails with a
    /// configuration error before constructing a keyless cloud provider.
    pub fn new(config: CloudConfig, api_key: String) -> Self {
        Self {
            client: ReqwestChatClient::new(CLOUD_PROVIDER, &config.base_url, Some(api_key)),
            config,
        }
    }

    fn request(&self, options: &GenerateOptions, stream: bool) -> ChatRequest {
        chat_request(&self.config.model_identifier, options, stream)
    }
}

#[async_trait]
impl LanguageModel for CloudProvider {
    fn name(&self) -> &str {
        CLOUD_PROVIDER
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
        options: GenerateOptions,
        shape: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut request = self.request(&options, false);
        request.response_format = Some(serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": "structured_output",
                "strict": true,
                "schema": shape,
            }
        }));

        let response = generate_chat(&self.client, request).await?;
        let text = response.text();
        serde_json::from_str(&text).map_err(|e| {
            GatewayError::provider(
                format!("structured output is not valid JSON: {e}"),
                CLOUD_PROVIDER,
                false,
            )
            .with_context("model", self.config.model_identifier.clone())
        })
    }
}

#[async_trait]
impl OpenAiCompatApi for CloudProvider {
    fn provider_key(&self) -> &str {
        CLOUD_PROVIDER
    }

    async fn chat_completions(&self, request: &ChatRequest) -> Result<Response> {
        let reply = self.client.execute(request).await?;
        if !(200..300).contains(&reply.status) {
            return Err(map_http_error(
                reply.status,
                &reply.body,
                CLOUD_PROVIDER,
                &request.model,
            ));
        }
        let wire = serde_json::from_str(&reply.body).map_err(|e| {
            GatewayError::provider(format!("invalid response: {e}"), CLOUD_PROVIDER, false)
        })?;
        response_from_wire(wire, CLOUD_PROVIDER, &request.model)
    }
}
