//! Composition root wiring session, transcript and roster together.

use std::sync::Arc;

use aura_core::{
    ClientConfig,
    traits::{ApiError, ConfirmPrompt, KeyValueStore, MediaPlayer, RemoteApi, StorageError},
    types::{AuthMode, Credentials, GuardianId},
};

use crate::{
    chat::TranscriptSession,
    roster::{RosterCache, RosterError},
    session_store::{SessionError, SessionStore},
};

const UNEXPECTED_RESPONSE: &str = "Unexpected response";

/// Login/registration error, shown inline by the caller.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The server answered without a token.
    #[error("{0}")]
    Rejected(String),
    #[error("{}", .0.detail())]
    Api(#[from] ApiError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl AuthError {
    fn from_api(err: ApiError) -> Self {
        match err {
            ApiError::Server { message, .. } => Self::Rejected(message),
            other => Self::Api(other),
        }
    }
}

/// Owns the components and runs the cross-component flows.
///
/// Components never call each other; the flows that touch several of them
/// (login, logout, confirmed removal) live here.
pub struct AuraClient {
    api: Arc<dyn RemoteApi>,
    session: Arc<SessionStore>,
    chat: TranscriptSession,
    roster: RosterCache,
    prompt: Arc<dyn ConfirmPrompt>,
}

impl AuraClient {
    /// Build the client, restoring any persisted session.
    ///
    /// A restored session counts as newly established: the remote history
    /// is cleared and the transcript starts from the greeting.
    ///
    /// # Errors
    /// Returns error if the persisted session cannot be read.
    pub async fn connect(
        config: &ClientConfig,
        api: Arc<dyn RemoteApi>,
        store: Arc<dyn KeyValueStore>,
        player: Arc<dyn MediaPlayer>,
        prompt: Arc<dyn ConfirmPrompt>,
    ) -> Result<Self, StorageError> {
        let session = Arc::new(SessionStore::restore(Arc::clone(&store), &config.token_slot).await?);
        let chat = TranscriptSession::new(config, Arc::clone(&api), Arc::clone(&session), player);
        let roster = RosterCache::new(config, Arc::clone(&api), Arc::clone(&session), store);

        let client = Self {
            api,
            session,
            chat,
            roster,
            prompt,
        };
        if client.session.is_authenticated() {
            client.chat.restart().await;
        }
        Ok(client)
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub const fn chat(&self) -> &TranscriptSession {
        &self.chat
    }

    #[must_use]
    pub const fn roster(&self) -> &RosterCache {
        &self.roster
    }

    /// Log in with existing credentials.
    ///
    /// # Errors
    /// Returns error if the credentials are rejected or the call fails.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.authenticate(AuthMode::Login, &Credentials::new(username, password))
            .await
    }

    /// Create an account and log in.
    ///
    /// # Errors
    /// Returns error if registration is rejected or the call fails.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.authenticate(AuthMode::Register, &Credentials::new(username, password))
            .await
    }

    async fn authenticate(
        &self,
        mode: AuthMode,
        credentials: &Credentials,
    ) -> Result<(), AuthError> {
        let reply = self
            .api
            .authenticate(mode, credentials)
            .await
            .map_err(AuthError::from_api)?;

        let Some(token) = reply.token.filter(|t| !t.trim().is_empty()) else {
            let message = reply.error.unwrap_or_else(|| UNEXPECTED_RESPONSE.to_string());
            tracing::info!(mode = mode.endpoint(), "authentication rejected");
            return Err(AuthError::Rejected(message));
        };

        self.session.establish(&token).await?;
        self.roster.forget();
        self.chat.restart().await;
        tracing::info!(mode = mode.endpoint(), "authenticated");
        Ok(())
    }

    /// End the session.
    ///
    /// The token's cached roster stays on disk but becomes unreachable.
    ///
    /// # Errors
    /// Returns error if the persisted token could not be removed; the
    /// in-memory session is cleared regardless.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let cleared = self.session.clear().await;
        self.roster.forget();
        self.chat.reset_local();
        cleared
    }

    /// Ask the prompt, then delete the guardian if the user agreed.
    ///
    /// # Errors
    /// Returns [`RosterError::NotFound`] for an id missing from the loaded
    /// roster, [`RosterError::NotConfirmed`] when the user declines, or
    /// the delete failure.
    pub async fn remove_guardian(&self, id: GuardianId) -> Result<(), RosterError> {
        let record = self
            .roster
            .records()
            .into_iter()
            .find(|g| g.id == id)
            .ok_or(RosterError::NotFound(id))?;

        let confirmation = self.prompt.confirm_removal(&record).await;
        self.roster.delete(id, confirmation).await
    }
}
