// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Switchboard contributors

//! Configuration module
//!
//! Settings records plus the config/secret source abstraction.

pub mod settings;
pub mod source;

pub use settings::*;
pub use source::{ConfigSource, EnvConfigSource, StaticConfigSource};
