// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Decentralized relay marketplace adapter
//!
//! Jobs are published as signed events to a set of relays and answered by
//! independent compute providers. Partial output arrives as feedback events,
//! the final output as a result event addressed to the job id.
//!
//! Identity is ephemeral: each job signs with a fresh keypair and the secret
//! is dropped when the job ends, so jobs cannot be correlated to one caller.
//! Operators who want a stable identity can opt in via `reuse_identity`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::MarketplaceConfig;
use crate::error::{unsupported, GatewayError, Result};
use crate::port::{CancelSignal, GenerateOptions, LanguageModel, ResponseStream};
use crate::response::{FinishReason, Part, Response};

pub const MARKETPLACE_PROVIDER: &str = "marketplace";

/// Feedback events (status updates and partial output)
pub const FEEDBACK_KIND: u16 = 7000;

/// A relay event on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct RelayEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl RelayEvent {
    /// First value of the named tag, if present.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(name))
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }
}

/// Subscription filter: event kinds plus the job the events answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayFilter {
    pub kinds: Vec<u16>,
    pub job_id: Option<String>,
}

pub type RelayEventStream =
    std::pin::Pin<Box<dyn futures::Stream<Item = Result<RelayEvent>> + Send>>;

/// Relay transport seam: publishing, subscribing, and the cryptography the
/// event format requires. Dropping a subscription stream disposes of it.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn publish(&self, event: &RelayEvent) -> Result<()>;

    async fn subscribe(&self, filter: RelayFilter) -> Result<RelayEventStream>;

    fn encrypt(&self, recipient_pubkey: &str, secret: &[u8; 32], plaintext: &str)
        -> Result<String>;

    fn decrypt(&self, sender_pubkey: &str, secret: &[u8; 32], ciphertext: &str) -> Result<String>;

    fn sign(&self, event: &RelayEvent, secret: &[u8; 32]) -> Result<String>;

    fn public_key(&self, secret: &[u8; 32]) -> Result<String>;
}

/// Canonical event id: lowercase hex SHA-256 over the serialized
/// `[0, pubkey, created_at, kind, tags, content]` array.
pub fn event_id(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Result<String> {
    let canonical = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    let serialized = serde_json::to_string(&canonical).map_err(|e| {
        GatewayError::provider(
            format!("cannot serialize event: {e}"),
            MARKETPLACE_PROVIDER,
            false,
        )
    })?;
    Ok(hex_encode(&Sha256::digest(serialized.as_bytes())))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode_32(text: &str) -> Result<[u8; 32]> {
    let text = text.trim();
    // byte-length check alone would let multibyte input through to the slices below
    if text.len() != 64 || !text.is_ascii() {
        return Err(GatewayError::configuration(
            "identity secret must be 64 hex characters",
        ));
    }
    let mut out = [0u8; 32];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).map_err(|_| {
            GatewayError::configuration("identity secret is not valid hex")
        })?;
    }
    Ok(out)
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Provider backed by the relay job marketplace
pub struct MarketplaceProvider {
    transport: Arc<dyn RelayTransport>,
    config: MarketplaceConfig,
    provider_pubkey: String,
}

impl MarketplaceProvider {
    /// The factory validates `provider_pubkey` before construction.
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        config: MarketplaceConfig,
        provider_pubkey: String,
    ) -> Self {
        Self {
            transport,
            config,
            provider_pubkey,
        }
    }

    fn result_kind(&self) -> u16 {
        self.config.job_kind + 1000
    }

    /// Secret key for one job: fresh per job unless identity reuse is
    /// configured.
    fn job_secret(&self) -> Result<[u8; 32]> {
        if self.config.reuse_identity {
            let stored = self.config.identity_secret.as_deref().ok_or_else(|| {
                GatewayError::configuration(
                    "reuse_identity is set but identity_secret is missing",
                )
            })?;
            hex_decode_32(stored)
        } else {
            Ok(rand::rng().random())
        }
    }

    fn job_tags(&self, options: &GenerateOptions) -> Vec<Vec<String>> {
        let mut tags = vec![vec!["p".to_string(), self.provider_pubkey.clone()]];
        if let Some(model) = &self.config.model_identifier {
            tags.push(vec![
                "param".to_string(),
                "model".to_string(),
                model.clone(),
            ]);
        }
        if let Some(temperature) = options.temperature {
            tags.push(vec![
                "param".to_string(),
                "temperature".to_string(),
                temperature.to_string(),
            ]);
        }
        if let Some(max_tokens) = options.max_tokens {
            tags.push(vec![
                "param".to_string(),
                "max_tokens".to_string(),
                max_tokens.to_string(),
            ]);
        }
        if self.config.encrypted {
            tags.push(vec!["encrypted".to_string()]);
        }
        tags
    }

    fn job_event(&self, secret: &[u8; 32], options: &GenerateOptions) -> Result<RelayEvent> {
        let pubkey = self.transport.public_key(secret)?;
        let created_at = now_unix();
        let kind = self.config.job_kind;
        let tags = self.job_tags(options);

        let plaintext = options.prompt.render_text();
        let content = if self.config.encrypted {
            self.transport
                .encrypt(&self.provider_pubkey, secret, &plaintext)?
        } else {
            plaintext
        };

        let id = event_id(&pubkey, created_at, kind, &tags, &content)?;
        let mut event = RelayEvent {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content,
            sig: String::new(),
        };
        event.sig = self.transport.sign(&event, secret)?;
        Ok(event)
    }

    fn event_content(&self, secret: &[u8; 32], event: &RelayEvent) -> Result<String> {
        if self.config.encrypted {
            self.transport
                .decrypt(&event.pubkey, secret, &event.content)
        } else {
            Ok(event.content.clone())
        }
    }
}

#[async_trait]
impl LanguageModel for MarketplaceProvider {
    fn name(&self) -> &str {
        MARKETPLACE_PROVIDER
    }

    async fn generate_text(&self, options: GenerateOptions) -> Result<Response> {
        let mut stream = self.stream_text(options, CancelSignal::none()).await?;
        let mut parts = Vec::new();
        while let Some(item) = stream.next().await {
            parts.extend(item?.parts().iter().cloned());
        }
        Ok(Response::new(parts))
    }

    async fn stream_text(
        &self,
        options: GenerateOptions,
        mut cancel: CancelSignal,
    ) -> Result<ResponseStream> {
        let secret = self.job_secret()?;
        let event = self.job_event(&secret, &options)?;
        let job_id = event.id.clone();
        let result_kind = self.result_kind();

        tracing::debug!(job_id = %job_id, kind = event.kind, "publishing marketplace job");
        self.transport.publish(&event).await?;

        let mut subscription = self
            .transport
            .subscribe(RelayFilter {
                kinds: vec![FEEDBACK_KIND, result_kind],
                job_id: Some(job_id.clone()),
            })
            .await?;

        let transport = Arc::clone(&self.transport);
        let config = self.config.clone();
        let stream = async_stream::stream! {
            loop {
                let incoming = tokio::select! {
                    _ = cancel.cancelled() => break,
                    incoming = subscription.next() => incoming,
                };
                let event = match incoming {
                    None => {
                        yield Err(GatewayError::provider(
                            "relay subscription ended before job result",
                            MARKETPLACE_PROVIDER,
                            true,
                        ));
                        break;
                    }
                    Some(Err(e)) => {
                        yield Err(e);
                        break;
                    }
                    Some(Ok(event)) => event,
                };

                if event.kind == FEEDBACK_KIND {
                    match event.tag_value("status") {
                        Some("partial") => {
                            let decoded = if config.encrypted {
                                transport.decrypt(&event.pubkey, &secret, &event.content)
                            } else {
                                Ok(event.content.clone())
                            };
                            match decoded {
                                Ok(text) if !text.is_empty() => {
                                    yield Ok(Response::text_chunk(text));
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    yield Err(e);
                                    break;
                                }
                            }
                        }
                        Some("error") => {
                            // the provider gave up on this job; retrying the
                            // same job cannot help
                            yield Err(GatewayError::provider(
                                format!("marketplace job failed: {}", event.content),
                                MARKETPLACE_PROVIDER,
                                false,
                            ));
                            break;
                        }
                        _ => {}
                    }
                } else if event.kind == result_kind {
                    let decoded = if config.encrypted {
                        transport.decrypt(&event.pubkey, &secret, &event.content)
                    } else {
                        Ok(event.content.clone())
                    };
                    match decoded {
                        Ok(text) => {
                            let mut parts = Vec::new();
                            if !text.is_empty() {
                                parts.push(Part::Text { text });
                            }
                            parts.push(Part::Finish {
                                reason: FinishReason::Stop,
                                usage: None,
                            });
                            yield Ok(Response::new(parts));
                        }
                        Err(e) => yield Err(e),
                    }
                    break;
                }
            }
            // secret and subscription drop here; the job identity is gone
        };
        Ok(Box::pin(stream))
    }

    async fn generate_structured(
        &self,
        _options: GenerateOptions,
        _shape: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        Err(unsupported(MARKETPLACE_PROVIDER, "generate_structured"))
    }
}
