// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Plan execution behavior: retries, escalation, cancellation.

use std::sync::Arc;

use futures::StreamExt;
use switchboard::orchestrator::{Orchestrator, RetryConfig, TurnRequest};
use switchboard::providers::mock::{MockLanguageModel, MockOutcome};
use switchboard::response::{FinishReason, Part, Response};
use switchboard::telemetry::RecordingTelemetry;
use switchboard::{CancelSignal, CancelToken, GatewayError, LanguageModel};

fn quick_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_delay_ms: 5,
        max_delay_ms: 20,
        jitter: 0.0,
    }
}

#[tokio::test]
async fn successful_turn_returns_text() {
    let telemetry = Arc::new(RecordingTelemetry::new());
    let orchestrator = Orchestrator::new(quick_retry(3), telemetry.clone()).register(
        "daemon",
        "Local Model",
        "llama3.2:latest",
        Arc::new(MockLanguageModel::new("daemon").with_response("Hi there")) as Arc<dyn LanguageModel>,
    );

    let text = orchestrator
        .generate_conversation_response(TurnRequest::from_text("Hi"))
        .await
        .unwrap();
    assert_eq!(text, "Hi there");
    assert_eq!(telemetry.count_action("attempt"), 1);
    assert_eq!(telemetry.count_action("retry"), 0);
}

#[tokio::test]
async fn transient_failures_are_retried_within_budget() {
    let mock = Arc::new(
        MockLanguageModel::new("daemon")
            .with_failure("connection reset", true)
            .with_failure("connection reset", true)
            .with_response("recovered"),
    );
    let telemetry = Arc::new(RecordingTelemetry::new());
    let orchestrator = Orchestrator::new(quick_retry(3), telemetry.clone()).register(
        "daemon",
        "Local Model",
        "llama3.2:latest",
        Arc::clone(&mock) as Arc<dyn LanguageModel>,
    );

    let text = orchestrator
        .generate_conversation_response(TurnRequest::from_text("Hi"))
        .await
        .unwrap();

    assert_eq!(text, "recovered");
    assert_eq!(mock.call_count(), 3);
    assert_eq!(telemetry.count_action("retry"), 2);
    assert_eq!(telemetry.count_action("escalate"), 0);
}

#[tokio::test]
async fn exhausted_budget_surfaces_last_error() {
    let mock = Arc::new(MockLanguageModel::new("daemon").with_failure("still down", true));
    let telemetry = Arc::new(RecordingTelemetry::new());
    let orchestrator = Orchestrator::new(quick_retry(2), telemetry.clone()).register(
        "daemon",
        "Local Model",
        "llama3.2:latest",
        Arc::clone(&mock) as Arc<dyn LanguageModel>,
    );

    let err = orchestrator
        .generate(TurnRequest::from_text("Hi"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("still down"));
    // 1 initial + 2 retries
    assert_eq!(mock.call_count(), 3);
    assert_eq!(telemetry.count_action("retry"), 2);
}

#[tokio::test]
async fn failed_step_escalates_to_next_provider() {
    let first = Arc::new(MockLanguageModel::new("daemon").with_failure("HTTP 401", false));
    let second = Arc::new(MockLanguageModel::new("cloud").with_response("from cloud"));
    let third = Arc::new(MockLanguageModel::new("marketplace").with_response("unused"));
    let telemetry = Arc::new(RecordingTelemetry::new());

    let orchestrator = Orchestrator::new(quick_retry(3), telemetry.clone())
        .register("daemon", "Local Model", "llama3.2:latest", Arc::clone(&first) as Arc<dyn LanguageModel>)
        .register("cloud", "GPT-4o Mini", "gpt-4o-mini", Arc::clone(&second) as Arc<dyn LanguageModel>)
        .register(
            "marketplace",
            "Marketplace",
            "any",
            Arc::clone(&third) as Arc<dyn LanguageModel>,
        );

    let text = orchestrator
        .generate_conversation_response(TurnRequest::from_text("Hi"))
        .await
        .unwrap();

    assert_eq!(text, "from cloud");
    // non-retryable failure: no retries on the first step, one escalation
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 1);
    assert_eq!(third.call_count(), 0);
    assert_eq!(telemetry.count_action("retry"), 0);
    assert_eq!(telemetry.count_action("escalate"), 1);
}

#[tokio::test]
async fn all_steps_exhausted_returns_last_step_error() {
    let orchestrator = Orchestrator::new(quick_retry(0), Arc::new(RecordingTelemetry::new()))
        .register(
            "daemon",
            "Local Model",
            "llama3.2:latest",
            Arc::new(MockLanguageModel::new("daemon").with_failure("daemon down", false))
                as Arc<dyn LanguageModel>,
        )
        .register(
            "cloud",
            "GPT-4o Mini",
            "gpt-4o-mini",
            Arc::new(MockLanguageModel::new("cloud").with_failure("cloud down", false))
                as Arc<dyn LanguageModel>,
        );

    let err = orchestrator
        .generate(TurnRequest::from_text("Hi"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cloud down"));
}

#[tokio::test]
async fn configuration_error_is_never_retried_or_escalated() {
    let first = Arc::new(MockLanguageModel::new("daemon").with_configuration_failure("bad key"));
    let second = Arc::new(MockLanguageModel::new("cloud").with_response("unused"));
    let telemetry = Arc::new(RecordingTelemetry::new());

    let orchestrator = Orchestrator::new(quick_retry(3), telemetry.clone())
        .register("daemon", "Local Model", "llama3.2:latest", Arc::clone(&first) as Arc<dyn LanguageModel>)
        .register("cloud", "GPT-4o Mini", "gpt-4o-mini", Arc::clone(&second) as Arc<dyn LanguageModel>);

    let err = orchestrator
        .generate(TurnRequest::from_text("Hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Configuration { .. }));
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 0);
    assert_eq!(telemetry.count_action("retry"), 0);
    assert_eq!(telemetry.count_action("escalate"), 0);
}

#[tokio::test]
async fn streaming_chunks_concatenate_to_full_text() {
    let scripted = Response::new(vec![
        Part::Text {
            text: "Hel".to_string(),
        },
        Part::Text {
            text: "lo ".to_string(),
        },
        Part::Text {
            text: "world".to_string(),
        },
        Part::Finish {
            reason: FinishReason::Stop,
            usage: None,
        },
    ]);
    let orchestrator = Orchestrator::new(quick_retry(3), Arc::new(RecordingTelemetry::new()))
        .register(
            "daemon",
            "Local Model",
            "llama3.2:latest",
            Arc::new(MockLanguageModel::new("daemon").with_outcome(MockOutcome::Respond(scripted)))
                as Arc<dyn LanguageModel>,
        );

    let mut stream = orchestrator
        .stream_conversation(TurnRequest::from_text("Hi"), CancelSignal::none())
        .await
        .unwrap();

    let mut text = String::new();
    let mut finish = None;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        text.push_str(&chunk.text());
        if let Some(reason) = chunk.finish_reason() {
            finish = Some(reason);
        }
    }
    assert_eq!(text, "Hello world");
    assert_eq!(finish, Some(FinishReason::Stop));
}

#[tokio::test]
async fn stream_setup_failures_escalate() {
    let first = Arc::new(MockLanguageModel::new("daemon").with_failure("refused", true));
    let second = Arc::new(MockLanguageModel::new("cloud").with_response("backup"));
    let orchestrator = Orchestrator::new(quick_retry(1), Arc::new(RecordingTelemetry::new()))
        .register("daemon", "Local Model", "llama3.2:latest", Arc::clone(&first) as Arc<dyn LanguageModel>)
        .register("cloud", "GPT-4o Mini", "gpt-4o-mini", Arc::clone(&second) as Arc<dyn LanguageModel>);

    let mut stream = orchestrator
        .stream_conversation(TurnRequest::from_text("Hi"), CancelSignal::none())
        .await
        .unwrap();

    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk.unwrap().text());
    }
    assert_eq!(text, "backup");
    assert_eq!(first.call_count(), 2);
}

#[tokio::test]
async fn cancellation_ends_the_stream_and_is_idempotent() {
    let scripted = Response::new(vec![
        Part::Text {
            text: "never ".to_string(),
        },
        Part::Text {
            text: "seen".to_string(),
        },
        Part::Finish {
            reason: FinishReason::Stop,
            usage: None,
        },
    ]);
    let orchestrator = Orchestrator::new(quick_retry(3), Arc::new(RecordingTelemetry::new()))
        .register(
            "daemon",
            "Local Model",
            "llama3.2:latest",
            Arc::new(MockLanguageModel::new("daemon").with_outcome(MockOutcome::Respond(scripted)))
                as Arc<dyn LanguageModel>,
        );

    let (token, signal) = CancelToken::new();
    let mut stream = orchestrator
        .stream_conversation(TurnRequest::from_text("Hi"), signal)
        .await
        .unwrap();

    token.cancel();
    token.cancel(); // second cancel observes nothing further

    // cancelled before any chunk is yielded: stream ends without chunks and
    // without a terminal error
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn cancellation_before_the_turn_prevents_all_attempts() {
    let first = Arc::new(MockLanguageModel::new("daemon").with_failure("down", true));
    let second = Arc::new(MockLanguageModel::new("cloud").with_failure("down", true));
    let telemetry = Arc::new(RecordingTelemetry::new());
    let orchestrator = Orchestrator::new(quick_retry(3), telemetry.clone())
        .register("daemon", "Local Model", "llama3.2:latest", Arc::clone(&first) as Arc<dyn LanguageModel>)
        .register("cloud", "GPT-4o Mini", "gpt-4o-mini", Arc::clone(&second) as Arc<dyn LanguageModel>);

    let (token, signal) = CancelToken::new();
    token.cancel();

    let err = orchestrator
        .stream_conversation(TurnRequest::from_text("Hi"), signal)
        .await
        .err()
        .unwrap();

    assert!(!err.is_retryable());
    assert!(err.to_string().contains("cancelled"));
    assert_eq!(first.call_count(), 0);
    assert_eq!(second.call_count(), 0);
    assert_eq!(telemetry.count_action("attempt"), 0);
    assert_eq!(telemetry.count_action("retry"), 0);
}

#[tokio::test]
async fn cancellation_during_backoff_skips_remaining_retries_and_steps() {
    let first = Arc::new(MockLanguageModel::new("daemon").with_failure("down", true));
    let second = Arc::new(MockLanguageModel::new("cloud").with_response("unused"));
    let telemetry = Arc::new(RecordingTelemetry::new());
    let orchestrator = Orchestrator::new(
        RetryConfig {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 400,
            jitter: 0.0,
        },
        telemetry.clone(),
    )
    .register("daemon", "Local Model", "llama3.2:latest", Arc::clone(&first) as Arc<dyn LanguageModel>)
    .register("cloud", "GPT-4o Mini", "gpt-4o-mini", Arc::clone(&second) as Arc<dyn LanguageModel>);

    let (token, signal) = CancelToken::new();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        token.cancel();
    });

    let err = orchestrator
        .stream_conversation(TurnRequest::from_text("Hi"), signal)
        .await
        .err()
        .unwrap();

    assert!(err.to_string().contains("cancelled"));
    // one attempt failed, cancellation landed during its backoff: no retry,
    // no escalation to the second step
    assert_eq!(first.call_count(), 1);
    assert_eq!(second.call_count(), 0);
    assert_eq!(telemetry.count_action("retry"), 0);
    assert_eq!(telemetry.count_action("escalate"), 0);
}

#[tokio::test]
async fn structured_turns_run_through_the_plan() {
    let first = Arc::new(MockLanguageModel::new("daemon").with_failure("refused", false));
    let second = Arc::new(MockLanguageModel::new("cloud").with_response(r#"{"answer": 7}"#));
    let orchestrator = Orchestrator::new(quick_retry(3), Arc::new(RecordingTelemetry::new()))
        .register("daemon", "Local Model", "llama3.2:latest", Arc::clone(&first) as Arc<dyn LanguageModel>)
        .register("cloud", "GPT-4o Mini", "gpt-4o-mini", Arc::clone(&second) as Arc<dyn LanguageModel>);

    let value = orchestrator
        .generate_structured(
            TurnRequest::from_text("Count"),
            serde_json::json!({"type": "object"}),
        )
        .await
        .unwrap();
    assert_eq!(value["answer"], 7);
}
