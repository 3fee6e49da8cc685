//! Client configuration.
//!
//! Layering, lowest to highest priority: built-in defaults, an optional
//! config file, then `AURA_*` environment variables (`__` separates nested
//! keys, e.g. `AURA_API_BASE`).

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TOKEN_SLOT: &str = "aura_token";
pub const DEFAULT_ROSTER_SLOT_PREFIX: &str = "aura_guardians";
pub const DEFAULT_GREETING: &str = "Hi, I'm Aura \u{2014} your emotional support friend \u{1F496}";
pub const DEFAULT_REPLY_FALLBACK: &str = "No reply";

/// Settings shared by the client components.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the remote service.
    pub api_base: String,
    /// Durable slot holding the session token.
    pub token_slot: String,
    /// Prefix of the per-token guardian cache slot.
    pub roster_slot_prefix: String,
    /// Assistant greeting that opens every transcript.
    pub greeting: String,
    /// Shown when a chat reply carries no text.
    pub reply_fallback: String,
    /// Optional HTTP timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token_slot: DEFAULT_TOKEN_SLOT.to_string(),
            roster_slot_prefix: DEFAULT_ROSTER_SLOT_PREFIX.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            reply_fallback: DEFAULT_REPLY_FALLBACK.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Load defaults, `file` (if given) and `AURA_*` environment overrides.
    ///
    /// # Errors
    /// Returns error if the file cannot be parsed or a value has the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("api_base", DEFAULT_API_BASE)?
            .set_default("token_slot", DEFAULT_TOKEN_SLOT)?
            .set_default("roster_slot_prefix", DEFAULT_ROSTER_SLOT_PREFIX)?
            .set_default("greeting", DEFAULT_GREETING)?
            .set_default("reply_fallback", DEFAULT_REPLY_FALLBACK)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("AURA")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Parsed API base.
    ///
    /// # Errors
    /// Returns error if `api_base` is not an absolute URL.
    pub fn api_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.api_base)
    }

    /// Override the API base.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}
