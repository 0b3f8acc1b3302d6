// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Switchboard: a provider-agnostic streaming gateway for language models.
//!
//! A normalized response model and a single [`LanguageModel`] port sit
//! between callers and three interchangeable backends: a local inference
//! daemon, a hosted cloud vendor, and a decentralized relay marketplace.
//! The [`Orchestrator`] drives each turn through an execution plan with
//! retry, backoff, and provider escalation.
//!
//! ```no_run
//! use std::sync::Arc;
//! use switchboard::config::{EnvConfigSource, Settings};
//! use switchboard::orchestrator::TurnRequest;
//! use switchboard::providers::factory;
//! use switchboard::telemetry::LogTelemetry;
//!
//! # async fn run() -> switchboard::error::Result<()> {
//! let settings = Settings::default();
//! let orchestrator = factory::orchestrator(
//!     &settings,
//!     &EnvConfigSource,
//!     None,
//!     Arc::new(LogTelemetry),
//! )?;
//! let text = orchestrator
//!     .generate_conversation_response(TurnRequest::from_text("Hi!"))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`LanguageModel`]: port::LanguageModel
//! [`Orchestrator`]: orchestrator::Orchestrator

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod port;
pub mod providers;
pub mod response;
pub mod telemetry;

pub use error::{GatewayError, Result};
pub use orchestrator::{Orchestrator, TurnRequest};
pub use port::{CancelSignal, CancelToken, ChatMessage, GenerateOptions, LanguageModel, Prompt};
pub use response::{FinishReason, Part, Response, Usage};
