// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Error types for the gateway
//!
//! A closed taxonomy of failure kinds. Every raw failure raised by a backend
//! must be mapped to exactly one variant before it crosses the
//! [`LanguageModel`](crate::port::LanguageModel) boundary; an unmapped panic
//! or raw error escaping an adapter is a defect.

use std::collections::BTreeMap;

use thiserror::Error;

/// Diagnostic metadata attached to an error (request id, provider, model).
pub type ErrorContext = BTreeMap<String, String>;

/// Boxed underlying failure wrapped by a taxonomy variant.
pub type ErrorCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Missing or invalid configuration prevents provider construction.
    /// Never retryable.
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// A concrete backend call failed (network, HTTP status, backend error
    /// body). `is_retryable` is set by the adapter from backend semantics:
    /// 5xx / timeout / connect failures are transient, 4xx auth and
    /// validation failures are not.
    #[error("Provider error ({provider}): {message}")]
    Provider {
        message: String,
        provider: String,
        is_retryable: bool,
        #[source]
        cause: Option<ErrorCause>,
        context: ErrorContext,
    },

    /// A tool invoked by the model failed during execution.
    #[error("Tool execution failed ({tool_name}): {message}")]
    ToolExecution {
        message: String,
        tool_name: String,
        #[source]
        cause: Option<ErrorCause>,
        context: ErrorContext,
    },

    /// Input exceeded the model's context window.
    #[error("Context window exceeded: {message}")]
    ContextWindow {
        message: String,
        context: ErrorContext,
    },

    /// Backend refused the request due to content policy.
    #[error("Content policy refusal: {message}")]
    ContentPolicy {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
        context: ErrorContext,
    },
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Construct a configuration error with an empty context.
    pub fn configuration(message: impl Into<String>) -> Self {
        GatewayError::Configuration {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Construct a provider error with an empty context.
    pub fn provider(
        message: impl Into<String>,
        provider: impl Into<String>,
        is_retryable: bool,
    ) -> Self {
        GatewayError::Provider {
            message: message.into(),
            provider: provider.into(),
            is_retryable,
            cause: None,
            context: ErrorContext::new(),
        }
    }

    /// Construct a tool execution error.
    pub fn tool_execution(message: impl Into<String>, tool_name: impl Into<String>) -> Self {
        GatewayError::ToolExecution {
            message: message.into(),
            tool_name: tool_name.into(),
            cause: None,
            context: ErrorContext::new(),
        }
    }

    /// Construct a context window error.
    pub fn context_window(message: impl Into<String>) -> Self {
        GatewayError::ContextWindow {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Construct a content policy error.
    pub fn content_policy(message: impl Into<String>) -> Self {
        GatewayError::ContentPolicy {
            message: message.into(),
            cause: None,
            context: ErrorContext::new(),
        }
    }

    /// Attach a diagnostic key/value to the error's context map.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().insert(key.into(), value.into());
        self
    }

    /// Whether the retry predicate may re-attempt after this error.
    ///
    /// Only a `Provider` error explicitly marked retryable qualifies; every
    /// other variant describes a failure that retrying cannot fix.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Provider {
                is_retryable: true,
                ..
            }
        )
    }

    /// The adapter that produced this error, if it was a provider failure.
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            GatewayError::Provider { provider, .. } => Some(provider),
            _ => None,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            GatewayError::Configuration { context, .. }
            | GatewayError::Provider { context, .. }
            | GatewayError::ToolExecution { context, .. }
            | GatewayError::ContextWindow { context, .. }
            | GatewayError::ContentPolicy { context, .. } => context,
        }
    }
}

/// Map a raw backend failure to a `Provider` error.
///
/// Shared by all adapters so the mapping stays consistent: the raw error is
/// kept as the cause, and provider/model land in the context map.
pub fn provider_error(
    raw: impl Into<ErrorCause>,
    provider: &str,
    model: &str,
    is_retryable: bool,
) -> GatewayError {
    let cause = raw.into();
    GatewayError::Provider {
        message: cause.to_string(),
        provider: provider.to_string(),
        is_retryable,
        cause: Some(cause),
        context: ErrorContext::from([("model".to_string(), model.to_string())]),
    }
}

/// A capability the adapter does not support. Never retryable.
pub fn unsupported(provider: &str, operation: &str) -> GatewayError {
    GatewayError::provider(
        format!("unsupported: {operation} is not supported by this adapter"),
        provider,
        false,
    )
    .with_context("operation", operation)
}

/// A wire-format client method the adapter deliberately does not implement.
///
/// Centralizes the stub policy for the full-surface client interface: every
/// unused method fails through here instead of silently no-opping.
pub fn not_implemented(provider: &str, method: &str) -> GatewayError {
    GatewayError::provider(
        format!("not implemented by this adapter: {method}"),
        provider,
        false,
    )
    .with_context("method", method)
}
