//! Domain types shared by the client components.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Guardian identifier, assigned by the remote service.
pub type GuardianId = i64;

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Typed by the local user.
    User,
    /// Produced by the support agent (or synthesized locally on failure).
    Assistant,
}

/// One entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the entry.
    pub origin: Origin,
    /// Display text.
    pub text: String,
    /// Creation timestamp (Unix epoch seconds).
    pub timestamp: i64,
    /// Optional annotation supplied by the server (e.g. the reply mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl Message {
    /// A message typed by the user.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            origin: Origin::User,
            text: text.into(),
            timestamp: now(),
            mode: None,
        }
    }

    /// An assistant message, optionally annotated.
    #[must_use]
    pub fn assistant(text: impl Into<String>, mode: Option<String>) -> Self {
        Self {
            origin: Origin::Assistant,
            text: text.into(),
            timestamp: now(),
            mode,
        }
    }

    /// Rough size used for logging.
    #[must_use]
    pub fn approx_bytes(&self) -> usize {
        self.text.len() + self.mode.as_ref().map_or(0, String::len)
    }
}

/// A guardian (emergency contact) as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianRecord {
    /// Server-assigned identifier.
    pub id: GuardianId,
    pub name: String,
    pub email: String,
    /// When the guardian was added, if the server reports it.
    #[serde(
        default,
        alias = "addedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub added_at: Option<String>,
}

/// Editable guardian fields, used as the create/update request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianFields {
    pub name: String,
    pub email: String,
}

impl GuardianFields {
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Username/password pair for login and registration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which authentication endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

impl AuthMode {
    /// Endpoint name under `/api/`.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }
}

/// Body of a 2xx login/register response. Both fields may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthReply {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of a 2xx chat response. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub play_song: Option<bool>,
    #[serde(default)]
    pub song_url: Option<String>,
}

impl ChatReply {
    /// The media resource the server asked to play, if any.
    ///
    /// Requires both the `play_song` flag and a non-blank `song_url`.
    #[must_use]
    pub fn requested_song(&self) -> Option<&str> {
        if self.play_song != Some(true) {
            return None;
        }
        self.song_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Current Unix time in seconds.
#[must_use]
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
