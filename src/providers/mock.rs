// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Scripted in-memory provider for tests
//!
//! Outcomes are scripted per instance; once the script is exhausted the last
//! outcome repeats. Every call is recorded so tests can assert on attempt
//! counts and the options each attempt carried.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{GatewayError, Result};
use crate::port::{CancelSignal, GenerateOptions, LanguageModel, ResponseStream};
use crate::response::{FinishReason, Part, Response};

/// One scripted outcome
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this response
    Respond(Response),
    /// Fail with a provider error
    Fail { message: String, is_retryable: bool },
    /// Fail with a configuration error
    FailConfiguration { message: String },
}

/// Scripted language model
pub struct MockLanguageModel {
    name: String,
    outcomes: Arc<Mutex<Vec<MockOutcome>>>,
    call_count: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<GenerateOptions>>>,
}

impl MockLanguageModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcomes: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script a complete text response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_outcome(MockOutcome::Respond(Response::new(vec![
            Part::Text { text: text.into() },
            Part::Finish {
                reason: FinishReason::Stop,
                usage: None,
            },
        ])))
    }

    /// Script a provider failure.
    pub fn with_failure(self, message: impl Into<String>, is_retryable: bool) -> Self {
        self.with_outcome(MockOutcome::Fail {
            message: message.into(),
            is_retryable,
        })
    }

    /// Script a configuration failure.
    pub fn with_configuration_failure(self, message: impl Into<String>) -> Self {
        self.with_outcome(MockOutcome::FailConfiguration {
            message: message.into(),
        })
    }

    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.outcomes.lock().unwrap().push(outcome);
        self
    }

    pub fn with_outcomes(self, outcomes: Vec<MockOutcome>) -> Self {
        self.outcomes.lock().unwrap().extend(outcomes);
        self
    }

    /// Number of calls made so far (all three operations count).
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Options from every recorded call, in order.
    pub fn recorded_requests(&self) -> Vec<GenerateOptions> {
        self.recorded.lock().unwrap().clone()
    }

    fn next_outcome(&self, options: &GenerateOptions) -> Result<Response> {
        let index = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.recorded.lock().unwrap().push(options.clone());

        let outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            return Ok(Response::new(vec![
                Part::Text {
                    text: "mock response".to_string(),
                },
                Part::Finish {
                    reason: FinishReason::Stop,
                    usage: None,
                },
            ]));
        }
        // repeat the last outcome once the script runs out
        let outcome = outcomes[index.min(outcomes.len() - 1)].clone();
        match outcome {
            MockOutcome::Respond(response) => Ok(response),
            MockOutcome::Fail {
                message,
                is_retryable,
            } => Err(GatewayError::provider(message, self.name.clone(), is_retryable)),
            MockOutcome::FailConfiguration { message } => {
                Err(GatewayError::configuration(message))
            }
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_text(&self, options: GenerateOptions) -> Result<Response> {
        self.next_outcome(&options)
    }

    async fn stream_text(
        &self,
        options: GenerateOptions,
        cancel: CancelSignal,
    ) -> Result<ResponseStream> {
        let response = self.next_outcome(&options)?;
        let parts: Vec<Part> = response.parts().to_vec();
        let stream = async_stream::stream! {
            for part in parts {
                if cancel.is_cancelled() {
                    break;
                }
                yield Ok(Response::new(vec![part]));
            }
        };
        Ok(Box::pin(stream))
    }

    async fn generate_structured(
        &self,
        options: GenerateOptions,
        _shape: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let response = self.next_outcome(&options)?;
        serde_json::from_str(&response.text()).map_err(|e| {
            GatewayError::provider(
                format!("scripted output is not valid JSON: {e}"),
                self.name.clone(),
                false,
            )
        })
    }
}
