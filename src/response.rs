// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Normalized model output
//!
//! Every provider adapter produces [`Response`] values, both as the final
//! non-streaming result and as each element of a streaming sequence.
//!
//! When a `Response` is a stream element it represents *one increment* (a
//! chunk), not the text accumulated so far. Consumers that want the full text
//! must fold chunks themselves; conflating "this chunk's text" with
//! "everything received so far" is the classic mistake this type's contract
//! exists to prevent.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// One typed fragment of model output. Insertion order is emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Part {
    /// Text content
    Text { text: String },

    /// Tool invocation requested by the model
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },

    /// Terminal marker carrying finish reason and usage
    Finish {
        reason: FinishReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// Natural end of message
    Stop,
    /// Hit the output token limit
    Length,
    /// Wants to invoke tools
    ToolCalls,
    /// Backend content filter intervened
    ContentFilter,
    /// Backend did not report a recognized reason
    Unknown,
}

/// Token accounting reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens
    pub input_tokens: u32,
    /// Output tokens
    pub output_tokens: u32,
    /// Cache read tokens (providers that support caching)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u32>,
    /// Cache write tokens (providers that support caching)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u32>,
    /// Reasoning tokens (providers that report them)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
}

impl Usage {
    /// Total tokens used (input + output)
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A tool call extracted from a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One unit of model output: an ordered sequence of typed parts.
///
/// Immutable once constructed. Accessors are pure derivations over `parts`;
/// there is no separately stored authoritative state. Transformations return
/// a new `Response` rather than mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    parts: Vec<Part>,
}

impl Response {
    /// Construct a response from its parts.
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    /// Construct a single-text-part response (a plain streaming chunk).
    pub fn text_chunk(text: impl Into<String>) -> Self {
        Self::new(vec![Part::Text { text: text.into() }])
    }

    /// The ordered parts of this response.
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Concatenation of all text parts, in emission order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All tool-call parts.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolCall {
                    id,
                    name,
                    arguments,
                } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// The finish reason, present once a terminal part has been appended.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.parts.iter().find_map(|p| match p {
            Part::Finish { reason, .. } => Some(*reason),
            _ => None,
        })
    }

    /// Token usage, absent when the backend does not report it.
    pub fn usage(&self) -> Option<&Usage> {
        self.parts.iter().find_map(|p| match p {
            Part::Finish {
                usage: Some(usage), ..
            } => Some(usage),
            _ => None,
        })
    }

    /// Return a new response whose tool-call arguments are decoded.
    ///
    /// Backends that stream tool arguments deliver them as JSON text; this
    /// turns any string-valued argument blob into its structured form. Fails
    /// with a taxonomy error when a blob cannot be decoded; never panics.
    pub fn with_decoded_tool_calls(&self) -> Result<Response> {
        let mut parts = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            match part {
                Part::ToolCall {
                    id,
                    name,
                    arguments: serde_json::Value::String(raw),
                } => {
                    let decoded: serde_json::Value =
                        serde_json::from_str(raw).map_err(|e| {
                            GatewayError::tool_execution(
                                format!("failed to decode tool call arguments: {e}"),
                                name.clone(),
                            )
                        })?;
                    parts.push(Part::ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: decoded,
                    });
                }
                other => parts.push(other.clone()),
            }
        }
        Ok(Response::new(parts))
    }
}
