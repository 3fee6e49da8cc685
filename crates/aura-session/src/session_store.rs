//! Current session token with write-through persistence.

use std::sync::Arc;

use aura_core::traits::{KeyValueStore, StorageError};
use tokio::sync::watch;

/// Session store error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session token must not be empty")]
    EmptyToken,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Owns the authentication token.
///
/// Every mutation is written to the durable slot before it becomes visible
/// in memory, so the two never disagree. Observers subscribe to a `watch`
/// channel instead of listening for a global login event.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    slot: String,
    token: watch::Sender<Option<String>>,
}

impl SessionStore {
    /// Load the token persisted in `slot`, if any.
    ///
    /// A blank persisted value is treated as absent and removed.
    ///
    /// # Errors
    /// Returns error if the durable store cannot be read.
    pub async fn restore(
        store: Arc<dyn KeyValueStore>,
        slot: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let slot = slot.into();
        let persisted = store.get(&slot).await?;
        let token = match persisted {
            Some(t) if !t.trim().is_empty() => Some(t),
            Some(_) => {
                store.remove(&slot).await?;
                None
            }
            None => None,
        };
        tracing::debug!(restored = token.is_some(), "session store ready");

        let (token, _) = watch::channel(token);
        Ok(Self { store, slot, token })
    }

    /// Set the current token and persist it.
    ///
    /// # Errors
    /// Returns [`SessionError::EmptyToken`] for a blank token and
    /// [`SessionError::Storage`] if the durable write fails; in both cases
    /// the previous token stays current.
    pub async fn establish(&self, token: &str) -> Result<(), SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::EmptyToken);
        }
        self.store.set(&self.slot, token).await?;
        self.token.send_replace(Some(token.to_string()));
        tracing::info!("session established");
        Ok(())
    }

    /// Drop the current token and remove it from durable storage.
    ///
    /// The in-memory token is cleared even if the durable removal fails, so
    /// a failed logout never leaves the old credential in use.
    ///
    /// # Errors
    /// Returns error if the durable slot could not be removed.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let removed = self.store.remove(&self.slot).await;
        self.token.send_replace(None);
        tracing::info!("session cleared");
        if let Err(e) = &removed {
            tracing::error!(error = %e, "failed to remove persisted session token");
        }
        removed.map_err(SessionError::from)
    }

    /// Current token, if any.
    #[must_use]
    pub fn current_token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    /// Whether a session is established.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.borrow().is_some()
    }

    /// Observe token changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token.subscribe()
    }
}
