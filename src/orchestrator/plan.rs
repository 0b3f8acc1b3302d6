// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Execution plans and retry policy
//!
//! A plan is an ordered list of provider steps built per turn. Each step
//! carries its own retry budget; backoff grows exponentially from the base
//! delay, capped, with random jitter so synchronized callers do not retry in
//! lockstep.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::ResilienceConfig;
use crate::port::LanguageModel;

/// Retry policy for one plan step
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retry attempts (total attempts = retries + 1)
    pub max_retries: u32,
    /// Base delay in milliseconds
    pub base_delay_ms: u64,
    /// Delay cap in milliseconds
    pub max_delay_ms: u64,
    /// Jitter fraction applied to the computed delay (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (0-based): base * 2^attempt,
    /// capped, plus up to `jitter` extra.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped = exponential.min(self.max_delay_ms);
        let jittered = if self.jitter > 0.0 {
            let spread = (capped as f64 * self.jitter) as u64;
            if spread > 0 {
                capped + rand::rng().random_range(0..=spread)
            } else {
                capped
            }
        } else {
            capped
        };
        Duration::from_millis(jittered)
    }
}

/// One step of an execution plan: a provider plus its retry budget.
#[derive(Clone)]
pub struct PlanStep {
    /// Provider key ("daemon", "cloud", ...)
    pub key: String,
    pub provider: Arc<dyn LanguageModel>,
    pub retry: RetryConfig,
}

/// Ordered steps for one turn. Earlier steps are preferred; later steps are
/// escalation targets.
#[derive(Clone, Default)]
pub struct ExecutionPlan {
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
