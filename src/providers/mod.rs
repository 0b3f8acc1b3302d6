// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Provider adapters
//!
//! Each adapter maps one backend onto the [`LanguageModel`] port: the local
//! inference daemon, a hosted cloud vendor, and the relay job marketplace.
//! The daemon and cloud adapters share the OpenAI-compatible wire codec in
//! [`wire`]; the marketplace speaks signed relay events instead of HTTP.
//!
//! [`LanguageModel`]: crate::port::LanguageModel

pub mod cloud;
pub mod daemon;
pub mod factory;
pub mod marketplace;
pub mod mock;
pub mod wire;

pub use cloud::CloudProvider;
pub use daemon::DaemonProvider;
pub use factory::ProviderFactory;
pub use marketplace::{
    MarketplaceProvider, RelayEvent, RelayEventStream, RelayFilter, RelayTransport,
};
pub use mock::{MockLanguageModel, MockOutcome};
