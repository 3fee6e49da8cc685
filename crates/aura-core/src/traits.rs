//! Collaborator traits: durable storage, remote API, media playback, confirmation.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::types::{
    AuthMode, AuthReply, ChatReply, Credentials, GuardianFields, GuardianId, GuardianRecord,
};

/// Storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Durable string key-value store.
///
/// Writes must be durable by the time the returned future resolves.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a slot.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite a slot.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a slot. Removing a missing slot is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Remote API error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// No usable response (connection refused, timeout, ...).
    #[error("Network error: {0}")]
    Network(String),
    /// A success response could not be decoded.
    #[error("Invalid response: {0}")]
    Decode(String),
    /// The request could not be built (e.g. an unjoinable endpoint path).
    #[error("Invalid request: {0}")]
    Request(String),
}

impl ApiError {
    /// Human-readable detail without the classification prefix.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::Server { message, .. } => message,
            Self::Network(message) | Self::Decode(message) | Self::Request(message) => message,
        }
    }
}

/// The remote support service.
///
/// `token` is attached as a bearer credential when present.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Log in or register.
    async fn authenticate(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<AuthReply, ApiError>;

    /// Send one chat message. Anonymous use is permitted.
    async fn chat(&self, token: Option<&str>, message: &str) -> Result<ChatReply, ApiError>;

    /// Drop the server-side conversation history.
    async fn clear_history(&self, token: &str) -> Result<(), ApiError>;

    /// Fetch the full guardian collection.
    async fn list_guardians(&self, token: &str) -> Result<Vec<GuardianRecord>, ApiError>;

    /// Create a guardian and return the canonical record.
    async fn create_guardian(
        &self,
        token: &str,
        fields: &GuardianFields,
    ) -> Result<GuardianRecord, ApiError>;

    /// Update a guardian and return the canonical record.
    async fn update_guardian(
        &self,
        token: &str,
        id: GuardianId,
        fields: &GuardianFields,
    ) -> Result<GuardianRecord, ApiError>;

    /// Delete a guardian.
    async fn delete_guardian(&self, token: &str, id: GuardianId) -> Result<(), ApiError>;

    /// Base URL of the service, used to qualify relative resource paths.
    fn origin(&self) -> &Url;
}

/// Media playback error.
#[derive(Debug, Error)]
#[error("Playback failed: {0}")]
pub struct MediaError(pub String);

/// Plays a supportive audio resource.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Start playback of `url`.
    async fn play(&self, url: &Url) -> Result<(), MediaError>;
}

/// Player that does nothing. Used when no audio sink is wired up.
#[derive(Debug, Default, Clone)]
pub struct SilentPlayer;

#[async_trait]
impl MediaPlayer for SilentPlayer {
    async fn play(&self, url: &Url) -> Result<(), MediaError> {
        tracing::debug!(%url, "no media sink, skipping playback");
        Ok(())
    }
}

/// Outcome of a destructive-action prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Granted,
    Withheld,
}

impl Confirmation {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

impl From<bool> for Confirmation {
    fn from(granted: bool) -> Self {
        if granted { Self::Granted } else { Self::Withheld }
    }
}

/// Asks the user to confirm a destructive action.
///
/// Implement this trait to integrate with your prompt UI.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    /// Ask whether `guardian` may be removed.
    async fn confirm_removal(&self, guardian: &GuardianRecord) -> Confirmation;
}

/// Prompt that grants everything.
#[derive(Debug, Default, Clone)]
pub struct AutoConfirm;

#[async_trait]
impl ConfirmPrompt for AutoConfirm {
    async fn confirm_removal(&self, _guardian: &GuardianRecord) -> Confirmation {
        Confirmation::Granted
    }
}

/// Prompt that refuses everything.
#[derive(Debug, Default, Clone)]
pub struct DenyAll;

#[async_trait]
impl ConfirmPrompt for DenyAll {
    async fn confirm_removal(&self, _guardian: &GuardianRecord) -> Confirmation {
        Confirmation::Withheld
    }
}
