//! Client-side session state for the Aura companion service.
//!
//! Provides:
//! - `AuraClient` - Composition root and cross-component flows
//! - `SessionStore` - Authentication token with write-through persistence
//! - `TranscriptSession` - Chat transcript, history reset and media playback
//! - `RosterCache` - Token-partitioned guardian cache
//! - Storage implementations (memory, SQLite)

pub mod chat;
pub mod gate;
pub mod manager;
pub mod roster;
pub mod session_store;
pub mod storage;

#[cfg(all(test, feature = "memory"))]
mod testing;

pub use chat::{ResetOutcome, SendOutcome, TranscriptSession, TranscriptState};
pub use manager::{AuraClient, AuthError};
pub use roster::{RosterCache, RosterError};
pub use session_store::{SessionError, SessionStore};
