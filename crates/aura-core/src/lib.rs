//! Core abstractions for the Aura support client.
//!
//! This crate provides the fundamental building blocks:
//! - `Transcript` - Ordered chat log with live broadcast
//! - `Message`, `GuardianRecord` - Domain types
//! - `ClientConfig` - Layered client settings
//! - Storage, remote API, media and confirmation traits

pub mod config;
pub mod traits;
pub mod transcript;
pub mod types;

pub use config::ClientConfig;
pub use traits::{
    ApiError, AutoConfirm, ConfirmPrompt, Confirmation, DenyAll, KeyValueStore, MediaError,
    MediaPlayer, RemoteApi, SilentPlayer, StorageError,
};
pub use transcript::{Transcript, TranscriptEvent};
pub use types::{
    AuthMode, AuthReply, ChatReply, Credentials, GuardianFields, GuardianId, GuardianRecord,
    Message, Origin,
};
