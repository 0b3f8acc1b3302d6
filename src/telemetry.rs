// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Fire-and-forget telemetry
//!
//! The orchestrator reports plan lifecycle events (attempts, retries,
//! escalations) through this trait. Implementations must never fail the
//! caller: no return value is observed by the core logic.

use std::sync::Mutex;

/// One tracked event
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub category: String,
    pub action: String,
    pub value: Option<String>,
}

impl TelemetryEvent {
    pub fn new(category: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            action: action.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Telemetry sink
pub trait Telemetry: Send + Sync {
    fn track_event(&self, event: TelemetryEvent);
}

/// Default sink: structured log lines via `tracing`
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn track_event(&self, event: TelemetryEvent) {
        tracing::debug!(
            category = %event.category,
            action = %event.action,
            value = event.value.as_deref().unwrap_or(""),
            "telemetry"
        );
    }
}

/// Sink that drops everything
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn track_event(&self, _event: TelemetryEvent) {}
}

/// Recording sink for tests; constructed per test and injected, never shared
/// globally.
#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Count events whose action matches.
    pub fn count_action(&self, action: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.action == action)
            .count()
    }
}

impl Telemetry for RecordingTelemetry {
    fn track_event(&self, event: TelemetryEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Install a `tracing` subscriber reading `RUST_LOG`, falling back to `info`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
