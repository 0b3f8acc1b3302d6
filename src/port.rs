// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Language model port
//!
//! The abstract capability contract all provider adapters implement and all
//! consumers depend on. This is the seam that makes providers
//! interchangeable: the orchestrator only ever talks to this trait.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::sync::watch;

use crate::error::Result;
use crate::response::Response;

/// A finite stream of response chunks.
///
/// Terminates on a finish part or an error, and is not restartable; a new
/// `stream_text` call must be made to stream again. Chunks are delivered in
/// backend emission order.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<Response>> + Send>>;

/// Capability contract for a provider adapter.
///
/// All three methods are required. An adapter that cannot support one must
/// fail fast with a clearly tagged unsupported `Provider` error rather than
/// silently no-op (see [`crate::error::unsupported`]).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// The provider key (e.g., "daemon", "cloud", "marketplace")
    fn name(&self) -> &str;

    /// Non-streaming generation. Returns one complete response; no partial
    /// results.
    async fn generate_text(&self, options: GenerateOptions) -> Result<Response>;

    /// Streaming generation. Each element is one increment, not the
    /// accumulated text.
    ///
    /// On cancellation the in-flight backend request is aborted, no further
    /// chunks are emitted, and the stream terminates without a terminal
    /// error: cancellation is not a failure.
    async fn stream_text(
        &self,
        options: GenerateOptions,
        cancel: CancelSignal,
    ) -> Result<ResponseStream>;

    /// Structured generation against a JSON schema shape. Optional
    /// capability; adapters that cannot satisfy it fail with a not-supported
    /// `Provider` error.
    async fn generate_structured(
        &self,
        options: GenerateOptions,
        shape: &serde_json::Value,
    ) -> Result<serde_json::Value>;
}

/// Role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Prompt input: a bare string or a structured conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Text(String),
    Messages(Vec<ChatMessage>),
}

impl Prompt {
    /// Normalize to a message list; bare text becomes one user message.
    pub fn messages(&self) -> Vec<ChatMessage> {
        match self {
            Prompt::Text(text) => vec![ChatMessage::user(text.clone())],
            Prompt::Messages(messages) => messages.clone(),
        }
    }

    /// Render to plain text for backends without a chat wire format.
    pub fn render_text(&self) -> String {
        match self {
            Prompt::Text(text) => text.clone(),
            Prompt::Messages(messages) => messages
                .iter()
                .map(|m| format!("{}: {}", m.role.as_str(), m.content))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::Text(text)
    }
}

impl From<Vec<ChatMessage>> for Prompt {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Prompt::Messages(messages)
    }
}

/// Options for a generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Prompt input
    pub prompt: Prompt,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens in the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl GenerateOptions {
    /// Create options for a prompt
    pub fn new(prompt: impl Into<Prompt>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            max_tokens: None,
            stop_sequences: vec![],
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set stop sequences
    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }
}

/// Handle that cancels the signal(s) paired with it.
#[derive(Debug)]
pub struct CancelToken {
    sender: watch::Sender<bool>,
}

impl CancelToken {
    /// Create a token and its paired signal.
    pub fn new() -> (CancelToken, CancelSignal) {
        let (sender, receiver) = watch::channel(false);
        (
            CancelToken { sender },
            CancelSignal {
                receiver: Some(receiver),
            },
        )
    }

    /// Cancel. Idempotent; signals that already completed observe nothing
    /// further.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

/// Cancellation signal threaded from the orchestrator's public call down
/// through the active adapter to the backend transport.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires, for callers without cancellation needs.
    pub fn none() -> Self {
        Self { receiver: None }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.receiver
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// Resolve when cancellation is requested; pend forever otherwise.
    pub async fn cancelled(&mut self) {
        match &mut self.receiver {
            None => std::future::pending().await,
            Some(rx) => loop {
                if *rx.borrow() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Token dropped without cancelling: never fires.
                    std::future::pending::<()>().await;
                }
            },
        }
    }
}
