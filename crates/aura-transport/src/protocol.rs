//! JSON request and error bodies exchanged with the service.
//!
//! Success bodies (`AuthReply`, `ChatReply`, `GuardianRecord`) live in
//! `aura_core::types` because the session components consume them.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

/// Body of `POST /api/clear_history`. Always the empty object.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ClearHistoryRequest {}

/// Structured error payload returned with a non-success status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Extract the `error` text from a raw response body.
    ///
    /// Returns `None` for non-JSON bodies and for a missing or blank field.
    #[must_use]
    pub fn message_from(raw: &str) -> Option<String> {
        serde_json::from_str::<Self>(raw)
            .ok()
            .and_then(|body| body.error)
            .filter(|e| !e.trim().is_empty())
    }
}

/// Path of a single guardian resource.
#[must_use]
pub fn guardian_path(id: i64) -> String {
    format!("api/guardians/{id}")
}
