// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Turn orchestration
//!
//! Owns the provider registry and drives each turn through an execution
//! plan: try the preferred provider, retry transient failures with backoff,
//! escalate to the next provider when a step's budget is exhausted.
//!
//! Two failures short-circuit the plan entirely: a `Configuration` error
//! surfaces immediately (retrying a bad config burns the budget and hides
//! the actionable message), and cancellation ends the turn without touching
//! further steps.

pub mod plan;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{GatewayError, Result};
use crate::port::{
    CancelSignal, ChatMessage, GenerateOptions, LanguageModel, Prompt, ResponseStream,
};
use crate::response::Response;
use crate::telemetry::{Telemetry, TelemetryEvent};

pub use plan::{ExecutionPlan, PlanStep, RetryConfig};

/// One conversation turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub messages: Vec<ChatMessage>,
    /// Provider to try first; `None` uses the registered order as-is
    pub preferred_provider: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Vec<String>,
}

impl TurnRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            preferred_provider: None,
            temperature: None,
            max_tokens: None,
            stop_sequences: vec![],
        }
    }

    /// Single user message turn.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::user(text)])
    }

    pub fn with_provider(mut self, key: impl Into<String>) -> Self {
        self.preferred_provider = Some(key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn to_options(&self) -> GenerateOptions {
        let mut options = GenerateOptions::new(Prompt::Messages(self.messages.clone()));
        options.temperature = self.temperature;
        options.max_tokens = self.max_tokens;
        options.stop_sequences = self.stop_sequences.clone();
        options
    }
}

/// Registered provider summary, for display to callers
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderListing {
    pub key: String,
    /// User-facing name ("Local Model", "GPT-4o Mini")
    pub display_name: String,
    /// Backend-facing model identifier
    pub model_name: String,
}

/// Plan-executing front door for all generation
pub struct Orchestrator {
    providers: Vec<(String, Arc<dyn LanguageModel>)>,
    listings: Vec<ProviderListing>,
    retry: RetryConfig,
    telemetry: Arc<dyn Telemetry>,
}

impl Orchestrator {
    pub fn new(retry: RetryConfig, telemetry: Arc<dyn Telemetry>) -> Self {
        Self {
            providers: Vec::new(),
            listings: Vec::new(),
            retry,
            telemetry,
        }
    }

    /// Register a provider. Registration order is the fallback order.
    pub fn register(
        mut self,
        key: impl Into<String>,
        display_name: impl Into<String>,
        model_name: impl Into<String>,
        provider: Arc<dyn LanguageModel>,
    ) -> Self {
        let key = key.into();
        self.listings.push(ProviderListing {
            key: key.clone(),
            display_name: display_name.into(),
            model_name: model_name.into(),
        });
        self.providers.push((key, provider));
        self
    }

    /// Registered providers, in fallback order.
    pub fn providers(&self) -> &[ProviderListing] {
        &self.listings
    }

    fn build_plan(&self, preferred: Option<&str>) -> Result<ExecutionPlan> {
        if self.providers.is_empty() {
            return Err(GatewayError::configuration("no providers are configured"));
        }
        let mut steps: Vec<PlanStep> = Vec::with_capacity(self.providers.len());
        if let Some(key) = preferred {
            let (key, provider) = self
                .providers
                .iter()
                .find(|(k, _)| k == key)
                .ok_or_else(|| {
                    GatewayError::configuration(format!("unknown provider: {key}"))
                        .with_context("provider", key)
                })?;
            steps.push(PlanStep {
                key: key.clone(),
                provider: Arc::clone(provider),
                retry: self.retry.clone(),
            });
        }
        for (key, provider) in &self.providers {
            if steps.iter().any(|s| &s.key == key) {
                continue;
            }
            steps.push(PlanStep {
                key: key.clone(),
                provider: Arc::clone(provider),
                retry: self.retry.clone(),
            });
        }
        Ok(ExecutionPlan::new(steps))
    }

    /// Run the plan's attempt loop around one operation.
    ///
    /// Cancellation is terminal for the whole turn: a cancelled signal stops
    /// the current step mid-backoff and skips every remaining retry and
    /// escalation.
    async fn run_plan<T, F>(
        &self,
        plan: &ExecutionPlan,
        mut cancel: CancelSignal,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut(Arc<dyn LanguageModel>) -> BoxFuture<'static, Result<T>>,
    {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut last_error = None;
        'plan: for step in &plan.steps {
            let mut attempt: u32 = 0;
            loop {
                if cancel.is_cancelled() {
                    break 'plan;
                }
                self.telemetry.track_event(
                    TelemetryEvent::new("orchestrator", "attempt").with_value(step.key.clone()),
                );
                match operation(Arc::clone(&step.provider)).await {
                    Ok(value) => return Ok(value),
                    Err(e @ GatewayError::Configuration { .. }) => {
                        // actionable by the operator, not by the plan
                        return Err(e);
                    }
                    Err(e) if e.is_retryable() && attempt < step.retry.max_retries => {
                        let delay = step.retry.delay_for(attempt);
                        tracing::warn!(
                            request_id = %request_id,
                            provider = %step.key,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "transient failure, retrying"
                        );
                        last_error = Some(e);
                        tokio::select! {
                            _ = cancel.cancelled() => break 'plan,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        self.telemetry.track_event(
                            TelemetryEvent::new("orchestrator", "retry")
                                .with_value(step.key.clone()),
                        );
                        attempt += 1;
                    }
                    Err(e) => {
                        tracing::warn!(request_id = %request_id, provider = %step.key, error = %e, "step failed, escalating");
                        self.telemetry.track_event(
                            TelemetryEvent::new("orchestrator", "escalate")
                                .with_value(step.key.clone()),
                        );
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }
        if cancel.is_cancelled() {
            tracing::debug!(request_id = %request_id, "turn cancelled, abandoning plan");
            return Err(GatewayError::provider("turn cancelled", "orchestrator", false)
                .with_context("request_id", request_id));
        }
        Err(last_error
            .unwrap_or_else(|| GatewayError::configuration("execution plan had no steps"))
            .with_context("request_id", request_id))
    }

    /// Non-streaming turn.
    pub async fn generate(&self, request: TurnRequest) -> Result<Response> {
        let plan = self.build_plan(request.preferred_provider.as_deref())?;
        let options = request.to_options();
        self.run_plan(&plan, CancelSignal::none(), move |provider| {
            let options = options.clone();
            Box::pin(async move { provider.generate_text(options).await })
        })
        .await
    }

    /// Non-streaming turn, returning the concatenated text.
    pub async fn generate_conversation_response(&self, request: TurnRequest) -> Result<String> {
        Ok(self.generate(request).await?.text())
    }

    /// Streaming turn.
    ///
    /// Retry and escalation apply only to establishing the stream; once a
    /// provider starts emitting chunks, its stream is forwarded as-is and a
    /// mid-stream failure is terminal for the turn.
    pub async fn stream_conversation(
        &self,
        request: TurnRequest,
        cancel: CancelSignal,
    ) -> Result<ResponseStream> {
        let plan = self.build_plan(request.preferred_provider.as_deref())?;
        let options = request.to_options();
        let stream_cancel = cancel.clone();
        self.run_plan(&plan, cancel, move |provider| {
            let options = options.clone();
            let cancel = stream_cancel.clone();
            Box::pin(async move { provider.stream_text(options, cancel).await })
        })
        .await
    }

    /// Structured turn against a JSON schema shape.
    pub async fn generate_structured(
        &self,
        request: TurnRequest,
        shape: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let plan = self.build_plan(request.preferred_provider.as_deref())?;
        let options = request.to_options();
        self.run_plan(&plan, CancelSignal::none(), move |provider| {
            let options = options.clone();
            let shape = shape.clone();
            Box::pin(async move { provider.generate_structured(options, &shape).await })
        })
        .await
    }
}
