// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! OpenAI-compatible chat wire format
//!
//! Shared by the daemon and cloud adapters: serde types for the chat
//! completions request/response/chunk shapes, HTTP error mapping into the
//! gateway taxonomy, and the streaming line decoder. The two adapters differ
//! only in endpoint, auth, and model naming; everything else lives here.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::{not_implemented, provider_error, GatewayError, Result};
use crate::port::{CancelSignal, GenerateOptions, ResponseStream};
use crate::response::{FinishReason, Part, Response, Usage};

/// A stream of decoded transport lines (SSE data payloads or NDJSON lines).
pub type LineStream = Pin<Box<dyn futures::Stream<Item = Result<String>> + Send>>;

/// Chat completions request body
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

/// A message on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

/// Chat completions response body.
///
/// `choices` stays optional so a 200 body missing the field maps to an
/// invalid-response error instead of a silent empty response.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
pub struct WireToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    /// JSON-encoded argument blob, as the wire format delivers it
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
pub struct WireUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(wire: WireUsage) -> Self {
        Usage {
            input_tokens: wire.prompt_tokens,
            output_tokens: wire.completion_tokens,
            ..Default::default()
        }
    }
}

/// One streamed chunk body
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error body; some backends send `{"error": "text"}`, others
/// `{"error": {"message": ..., "code": ...}}`.
#[derive(Debug, Deserialize)]
pub struct WireError {
    pub error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireErrorDetail {
    Text(String),
    Object {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
}

impl WireErrorDetail {
    pub fn message(&self) -> &str {
        match self {
            WireErrorDetail::Text(text) => text,
            WireErrorDetail::Object { message, .. } => message,
        }
    }
}

/// Build a chat request from generate options.
pub fn chat_request(model: &str, options: &GenerateOptions, stream: bool) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: options
            .prompt
            .messages()
            .into_iter()
            .map(|m| WireMessage {
                role: m.role.as_str().to_string(),
                content: m.content,
            })
            .collect(),
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        stop: if options.stop_sequences.is_empty() {
            None
        } else {
            Some(options.stop_sequences.clone())
        },
        stream,
        response_format: None,
    }
}

/// Map a wire finish reason string.
pub fn finish_reason_from_wire(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "tool_calls" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    }
}

/// Map a non-success HTTP reply into the taxonomy.
///
/// 429/408/5xx are transient; everything else in the 4xx range (auth,
/// validation, unknown model) cannot be fixed by retrying. Context-window
/// and content-policy refusals get their own variants.
pub fn map_http_error(status: u16, body: &str, provider: &str, model: &str) -> GatewayError {
    let message = serde_json::from_str::<WireError>(body)
        .map(|e| e.error.message().to_string())
        .unwrap_or_else(|_| body.to_string());
    let lower = message.to_lowercase();

    if lower.contains("context")
        && (lower.contains("length") || lower.contains("window") || lower.contains("token"))
    {
        return GatewayError::context_window(message)
            .with_context("provider", provider)
            .with_context("model", model);
    }
    if lower.contains("content policy")
        || lower.contains("content_filter")
        || lower.contains("flagged")
    {
        return GatewayError::content_policy(message)
            .with_context("provider", provider)
            .with_context("model", model);
    }

    let is_retryable = status == 429 || status == 408 || (500..600).contains(&status);
    GatewayError::provider(format!("HTTP {status}: {message}"), provider, is_retryable)
        .with_context("model", model)
        .with_context("status", status.to_string())
}

pub(crate) fn invalid_response(
    provider: &str,
    model: &str,
    detail: impl Into<String>,
) -> GatewayError {
    GatewayError::provider(
        format!("invalid response: {}", detail.into()),
        provider,
        false,
    )
    .with_context("model", model)
}

/// Convert a parsed chat response into the normalized response model.
pub fn response_from_wire(wire: ChatResponse, provider: &str, model: &str) -> Result<Response> {
    let choice = wire
        .choices
        .and_then(|mut choices| {
            if choices.is_empty() {
                None
            } else {
                Some(choices.remove(0))
            }
        })
        .ok_or_else(|| invalid_response(provider, model, "response body is missing choices"))?;

    let mut parts = Vec::new();
    if let Some(content) = choice.message.content {
        if !content.is_empty() {
            parts.push(Part::Text { text: content });
        }
    }
    if let Some(tool_calls) = choice.message.tool_calls {
        for (index, call) in tool_calls.into_iter().enumerate() {
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or(serde_json::Value::String(call.function.arguments));
            parts.push(Part::ToolCall {
                id: call.id.unwrap_or_else(|| format!("call_{index}")),
                name: call.function.name,
                arguments,
            });
        }
    }

    let reason = choice
        .finish_reason
        .as_deref()
        .map(finish_reason_from_wire)
        .unwrap_or(FinishReason::Unknown);
    parts.push(Part::Finish {
        reason,
        usage: wire.usage.map(Usage::from),
    });

    Ok(Response::new(parts))
}

/// Outcome of decoding one stream line
#[derive(Debug)]
pub enum StreamLine {
    /// One response chunk
    Chunk(Response),
    /// Explicit end-of-stream marker
    Done,
}

/// Decode one transport line. Returns `None` for keep-alives, comments, and
/// lines that are not chunk bodies.
pub fn parse_stream_line(line: &str) -> Option<StreamLine> {
    let data = line.trim();
    if data.is_empty() || data.starts_with(':') {
        return None;
    }
    let data = data.strip_prefix("data:").map(str::trim).unwrap_or(data);
    if data == "[DONE]" {
        return Some(StreamLine::Done);
    }

    let chunk: ChatChunk = serde_json::from_str(data).ok()?;
    let mut parts = Vec::new();
    let mut finish = None;
    for choice in chunk.choices {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                parts.push(Part::Text { text: content });
            }
        }
        if let Some(reason) = choice.finish_reason {
            finish = Some(finish_reason_from_wire(&reason));
        }
    }
    if let Some(reason) = finish {
        parts.push(Part::Finish {
            reason,
            usage: chunk.usage.map(Usage::from),
        });
    }
    if parts.is_empty() {
        return None;
    }
    Some(StreamLine::Chunk(Response::new(parts)))
}

/// A raw HTTP reply
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Transport seam for the chat wire format.
///
/// The daemon and cloud adapters inject different instances of this; tests
/// inject explicit doubles instead of sharing a global response registry.
#[async_trait]
pub trait ChatHttpClient: Send + Sync {
    /// Provider key used in error mapping
    fn provider(&self) -> &str;

    /// Execute a non-streaming request, returning status and body.
    async fn execute(&self, request: &ChatRequest) -> Result<HttpReply>;

    /// Execute a streaming request, returning decoded lines. Non-success
    /// statuses are mapped to errors before any line is delivered.
    async fn execute_stream(&self, request: &ChatRequest) -> Result<LineStream>;
}

/// `reqwest`-backed chat client
pub struct ReqwestChatClient {
    client: reqwest::Client,
    provider: String,
    url: String,
    api_key: Option<String>,
}

impl ReqwestChatClient {
    /// Create a client for `{base_url}/chat/completions`.
    pub fn new(
        provider: impl Into<String>,
        base_url: &str,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider: provider.into(),
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        }
    }

    fn map_transport_error(&self, error: reqwest::Error, model: &str) -> GatewayError {
        // Connect failures and timeouts are transient; anything else
        // (request construction, TLS, redirect policy) is not.
        let is_retryable = error.is_connect() || error.is_timeout();
        provider_error(error, &self.provider, model, is_retryable)
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
            .send()
            .await
            .map_err(|e| self.map_transport_error(e, &request.model))
    }
}

#[async_trait]
impl ChatHttpClient for ReqwestChatClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn execute(&self, request: &ChatRequest) -> Result<HttpReply> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e, &request.model))?;
        Ok(HttpReply { status, body })
    }

    async fn execute_stream(&self, request: &ChatRequest) -> Result<LineStream> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body, &self.provider, &request.model));
        }

        let provider = self.provider.clone();
        let model = request.model.clone();
        let mut bytes = response.bytes_stream();
        let lines = async_stream::stream! {
            let mut buffer = String::new();
            while let Some(item) = bytes.next().await {
                match item {
                    Ok(chunk) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].to_string();
                            buffer = buffer[pos + 1..].to_string();
                            yield Ok(line);
                        }
                    }
                    Err(e) => {
                        yield Err(provider_error(e, &provider, &model, true));
                        return;
                    }
                }
            }
            // trailing line without a newline
            if !buffer.trim().is_empty() {
                yield Ok(buffer.clone());
            }
        };
        Ok(Box::pin(lines))
    }
}

/// Non-streaming chat call: execute, map errors, normalize.
pub async fn generate_chat(client: &dyn ChatHttpClient, request: ChatRequest) -> Result<Response> {
    let reply = client.execute(&request).await?;
    if !(200..300).contains(&reply.status) {
        return Err(map_http_error(
            reply.status,
            &reply.body,
            client.provider(),
            &request.model,
        ));
    }
    let wire: ChatResponse = serde_json::from_str(&reply.body)
        .map_err(|e| invalid_response(client.provider(), &request.model, e.to_string()))?;
    response_from_wire(wire, client.provider(), &request.model)
}

/// Streaming chat call: each decoded chunk becomes one response increment.
///
/// Honors the cancellation signal: on cancel the line stream is dropped,
/// aborting the underlying request, and the stream ends without a terminal
/// error.
pub async fn stream_chat(
    client: &dyn ChatHttpClient,
    request: ChatRequest,
    mut cancel: CancelSignal,
) -> Result<ResponseStream> {
    let mut lines = client.execute_stream(&request).await?;
    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = lines.next() => {
                    match next {
                        None => break,
                        Some(Err(e)) => {
                            yield Err(e);
                            break;
                        }
                        Some(Ok(line)) => match parse_stream_line(&line) {
                            None => {}
                            Some(StreamLine::Done) => break,
                            Some(StreamLine::Chunk(chunk)) => {
                                let finished = chunk.finish_reason().is_some();
                                yield Ok(chunk);
                                if finished {
                                    break;
                                }
                            }
                        },
                    }
                }
            }
        }
    };
    Ok(Box::pin(stream))
}

/// Full surface of the OpenAI-compatible client interface.
///
/// The gateway only drives chat completions, but the adapters are built
/// against the complete surface so partial implementation cannot silently
/// type-check as complete. Every unused method fails fast through
/// [`not_implemented`]; adapters override only what they actually serve.
#[async_trait]
pub trait OpenAiCompatApi: Send + Sync {
    /// Provider key used in the not-implemented stubs
    fn provider_key(&self) -> &str;

    async fn chat_completions(&self, request: &ChatRequest) -> Result<Response>;

    async fn completions(&self, _request: &serde_json::Value) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "completions"))
    }

    async fn embeddings(&self, _request: &serde_json::Value) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "embeddings"))
    }

    async fn list_models(&self) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "list_models"))
    }

    async fn retrieve_model(&self, _model: &str) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "retrieve_model"))
    }

    async fn images_generations(&self, _request: &serde_json::Value) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "images_generations"))
    }

    async fn audio_transcriptions(
        &self,
        _request: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "audio_transcriptions"))
    }

    async fn audio_speech(&self, _request: &serde_json::Value) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "audio_speech"))
    }

    async fn moderations(&self, _request: &serde_json::Value) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "moderations"))
    }

    async fn files_list(&self) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "files_list"))
    }

    async fn files_upload(&self, _request: &serde_json::Value) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "files_upload"))
    }

    async fn fine_tuning_jobs_create(
        &self,
        _request: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "fine_tuning_jobs_create"))
    }

    async fn fine_tuning_jobs_list(&self) -> Result<serde_json::Value> {
        Err(not_implemented(self.provider_key(), "fine_tuning_jobs_list"))
    }
}
