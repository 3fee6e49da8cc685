//! Guardian roster with cache-first reads and confirm-then-apply writes.

use std::sync::{Arc, Mutex, PoisonError};

use aura_core::{
    ClientConfig,
    traits::{ApiError, Confirmation, KeyValueStore, RemoteApi, StorageError},
    types::{GuardianFields, GuardianId, GuardianRecord},
};
use sha2::{Digest, Sha256};

use crate::{gate::MutationGate, session_store::SessionStore};

/// Roster operation error.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Another roster operation is in progress")]
    Busy,
    #[error("Not logged in")]
    NoSession,
    #[error("Session changed while the request was in flight")]
    SessionChanged,
    #[error("Removal was not confirmed")]
    NotConfirmed,
    #[error("Guardian not found: {0}")]
    NotFound(GuardianId),
    #[error("{}", .0.detail())]
    Api(#[from] ApiError),
    #[error("Cache error: {0}")]
    Storage(#[from] StorageError),
}

/// Durable slot name for the roster owned by `token`.
///
/// The token is hashed so the raw credential never appears in a key.
#[must_use]
pub fn partition_key(prefix: &str, token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("{prefix}:{hex}")
}

#[derive(Debug, Default)]
struct RosterState {
    /// Partition the in-memory records belong to.
    owner: Option<String>,
    records: Vec<GuardianRecord>,
    error: Option<String>,
}

/// Client-side snapshot of the guardian collection.
///
/// Writes are applied only after the server confirms them, so a failed
/// call leaves both the list and the cache exactly as they were.
pub struct RosterCache {
    api: Arc<dyn RemoteApi>,
    session: Arc<SessionStore>,
    store: Arc<dyn KeyValueStore>,
    slot_prefix: String,
    gate: MutationGate,
    state: Mutex<RosterState>,
}

impl RosterCache {
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        api: Arc<dyn RemoteApi>,
        session: Arc<SessionStore>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            api,
            session,
            store,
            slot_prefix: config.roster_slot_prefix.clone(),
            gate: MutationGate::new(),
            state: Mutex::new(RosterState::default()),
        }
    }

    /// Guardians for the current session; empty when nothing is loaded or
    /// the loaded snapshot belongs to another token.
    #[must_use]
    pub fn records(&self) -> Vec<GuardianRecord> {
        let Some(key) = self.current_key() else {
            return Vec::new();
        };
        let state = self.lock();
        if state.owner.as_deref() == Some(key.as_str()) {
            state.records.clone()
        } else {
            Vec::new()
        }
    }

    /// Last recorded failure, for an error banner.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Whether a mutating call is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Drop the in-memory snapshot. The durable partitions are untouched.
    pub fn forget(&self) {
        *self.lock() = RosterState::default();
    }

    /// Return the roster, from cache when possible.
    ///
    /// Without `force`, a non-empty cached partition is returned with no
    /// remote call. Otherwise the full collection is fetched and replaces
    /// both the list and the partition.
    ///
    /// # Errors
    /// Returns error if there is no session, the gate is closed, or the
    /// fetch fails. Prior state is kept on failure.
    pub async fn list(&self, force: bool) -> Result<Vec<GuardianRecord>, RosterError> {
        let (token, key) = self.session_key()?;

        if !force {
            let cached = self.load_partition(&key).await;
            if self.current_key().as_deref() != Some(key.as_str()) {
                tracing::warn!("session changed during guardian cache read, discarding it");
                return Err(RosterError::SessionChanged);
            }
            match cached {
                Ok(Some(records)) if !records.is_empty() => {
                    tracing::debug!(count = records.len(), "guardian cache hit");
                    self.adopt(&key, records.clone());
                    return Ok(records);
                }
                Ok(_) => tracing::debug!("guardian cache miss"),
                Err(e) => tracing::warn!(error = %e, "unreadable guardian cache, refetching"),
            }
        }

        let _guard = self.gate.try_acquire().ok_or(RosterError::Busy)?;
        let fetched = self.api.list_guardians(&token).await;
        let records = self.confirmed(&key, fetched)?;

        self.commit(&key, records.clone()).await?;
        Ok(records)
    }

    /// Bypass and overwrite the cache.
    ///
    /// # Errors
    /// See [`RosterCache::list`].
    pub async fn force_refresh(&self) -> Result<Vec<GuardianRecord>, RosterError> {
        self.list(true).await
    }

    /// Create a guardian; append it once the server returns the record.
    ///
    /// # Errors
    /// Returns error if there is no session, the gate is closed, or the
    /// call fails. Nothing is inserted on failure.
    pub async fn create(&self, name: &str, email: &str) -> Result<GuardianRecord, RosterError> {
        let (token, key) = self.session_key()?;
        let _guard = self.gate.try_acquire().ok_or(RosterError::Busy)?;

        let fields = GuardianFields::new(name, email);
        let created = self.api.create_guardian(&token, &fields).await;
        let record = self.confirmed(&key, created)?;

        let mut records = self.base_records(&key).await;
        records.push(record.clone());
        self.commit(&key, records).await?;
        Ok(record)
    }

    /// Update a guardian in place (matched by id) once the server confirms.
    ///
    /// A confirmed record missing from the local snapshot is appended.
    ///
    /// # Errors
    /// Returns error if there is no session, the gate is closed, or the
    /// call fails. Nothing changes on failure.
    pub async fn update(
        &self,
        id: GuardianId,
        fields: &GuardianFields,
    ) -> Result<GuardianRecord, RosterError> {
        let (token, key) = self.session_key()?;
        let _guard = self.gate.try_acquire().ok_or(RosterError::Busy)?;

        let updated = self.api.update_guardian(&token, id, fields).await;
        let record = self.confirmed(&key, updated)?;

        let mut records = self.base_records(&key).await;
        match records.iter_mut().find(|g| g.id == id) {
            Some(slot) => *slot = record.clone(),
            None => records.push(record.clone()),
        }
        self.commit(&key, records).await?;
        Ok(record)
    }

    /// Delete a guardian once the server confirms.
    ///
    /// The caller must already hold the user's confirmation; a withheld
    /// confirmation is a no-op that issues no remote call.
    ///
    /// # Errors
    /// Returns [`RosterError::NotConfirmed`] without confirmation, otherwise
    /// as for the other writes.
    pub async fn delete(
        &self,
        id: GuardianId,
        confirmation: Confirmation,
    ) -> Result<(), RosterError> {
        if !confirmation.is_granted() {
            tracing::debug!(id, "guardian removal not confirmed");
            return Err(RosterError::NotConfirmed);
        }
        let (token, key) = self.session_key()?;
        let _guard = self.gate.try_acquire().ok_or(RosterError::Busy)?;

        let deleted = self.api.delete_guardian(&token, id).await;
        self.confirmed(&key, deleted)?;

        let mut records = self.base_records(&key).await;
        records.retain(|g| g.id != id);
        self.commit(&key, records).await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RosterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_key(&self) -> Option<String> {
        self.session
            .current_token()
            .map(|t| partition_key(&self.slot_prefix, &t))
    }

    fn session_key(&self) -> Result<(String, String), RosterError> {
        let token = self.session.current_token().ok_or(RosterError::NoSession)?;
        let key = partition_key(&self.slot_prefix, &token);
        Ok((token, key))
    }

    /// Unwrap a remote result, recording failures and refusing results that
    /// arrive after the session changed.
    fn confirmed<T>(&self, key: &str, result: Result<T, ApiError>) -> Result<T, RosterError> {
        if self.current_key().as_deref() != Some(key) {
            tracing::warn!("session changed during guardian request, discarding result");
            return Err(RosterError::SessionChanged);
        }
        result.map_err(|e| {
            tracing::warn!(error = %e, "guardian request failed");
            self.lock().error = Some(e.detail().to_string());
            RosterError::Api(e)
        })
    }

    async fn load_partition(&self, key: &str) -> Result<Option<Vec<GuardianRecord>>, StorageError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Records to apply a confirmed write to: the in-memory snapshot when it
    /// belongs to `key`, else the cached partition, else nothing.
    async fn base_records(&self, key: &str) -> Vec<GuardianRecord> {
        {
            let state = self.lock();
            if state.owner.as_deref() == Some(key) {
                return state.records.clone();
            }
        }
        self.load_partition(key).await.ok().flatten().unwrap_or_default()
    }

    fn adopt(&self, key: &str, records: Vec<GuardianRecord>) {
        let mut state = self.lock();
        state.owner = Some(key.to_string());
        state.records = records;
        state.error = None;
    }

    /// Overwrite the partition, then replace the in-memory list.
    ///
    /// A failed write leaves both untouched so they never disagree; the
    /// remote change is picked up by the next forced refresh.
    async fn commit(&self, key: &str, records: Vec<GuardianRecord>) -> Result<(), RosterError> {
        let serialized = serde_json::to_string(&records).map_err(StorageError::from)?;

        if let Err(e) = self.store.set(key, &serialized).await {
            tracing::error!(error = %e, "failed to persist guardian cache");
            self.lock().error = Some(e.to_string());
            return Err(RosterError::Storage(e));
        }
        self.adopt(key, records);
        Ok(())
    }
}
