//! Transport layer for the Aura support service.
//!
//! Provides:
//! - Wire protocol (JSON request and error bodies)
//! - HTTP implementation of `RemoteApi` (feature: http)

pub mod protocol;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HttpApi, TransportError};
