//! Mock collaborators for component tests.
//!
//! These mocks enable testing without real I/O.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use aura_core::{
    traits::{ApiError, KeyValueStore, MediaError, MediaPlayer, RemoteApi, StorageError},
    types::{
        AuthMode, AuthReply, ChatReply, Credentials, GuardianFields, GuardianId, GuardianRecord,
    },
};
use tokio::sync::Notify;
use url::Url;

use crate::storage::MemoryStore;

pub const ORIGIN: &str = "http://api.test";

// ============================================================================
// Mock Remote API
// ============================================================================

/// In-process stand-in for the remote service.
///
/// Guardians live in a per-token map so tests can check partition isolation.
pub struct MockApi {
    origin: Url,
    /// Record of every call, by operation name.
    calls: Mutex<Vec<&'static str>>,
    guardians: Mutex<HashMap<String, Vec<GuardianRecord>>>,
    next_id: Mutex<GuardianId>,
    chat_replies: Mutex<VecDeque<Result<ChatReply, ApiError>>>,
    auth_replies: Mutex<VecDeque<Result<AuthReply, ApiError>>>,
    failures: Mutex<HashMap<&'static str, ApiError>>,
    chat_gate: Mutex<Option<Arc<Notify>>>,
    guardian_gate: Mutex<Option<Arc<Notify>>>,
}

/// Wait on the installed gate, if any.
async fn pass(gate: &Mutex<Option<Arc<Notify>>>) {
    let gate = gate.lock().unwrap().clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            origin: Url::parse(ORIGIN).unwrap(),
            calls: Mutex::new(Vec::new()),
            guardians: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
            chat_replies: Mutex::new(VecDeque::new()),
            auth_replies: Mutex::new(VecDeque::new()),
            failures: Mutex::new(HashMap::new()),
            chat_gate: Mutex::new(None),
            guardian_gate: Mutex::new(None),
        }
    }

    /// Seed the remote collection for `token`.
    pub fn seed_guardians(&self, token: &str, records: Vec<GuardianRecord>) {
        let mut next = self.next_id.lock().unwrap();
        if let Some(max) = records.iter().map(|g| g.id).max() {
            *next = (*next).max(max + 1);
        }
        self.guardians
            .lock()
            .unwrap()
            .insert(token.to_string(), records);
    }

    /// Remote collection for `token`.
    pub fn remote_guardians(&self, token: &str) -> Vec<GuardianRecord> {
        self.guardians
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or_default()
    }

    pub fn queue_chat(&self, reply: Result<ChatReply, ApiError>) {
        self.chat_replies.lock().unwrap().push_back(reply);
    }

    pub fn queue_auth(&self, reply: Result<AuthReply, ApiError>) {
        self.auth_replies.lock().unwrap().push_back(reply);
    }

    /// Make every call of `op` fail with `err` until [`MockApi::heal`].
    pub fn fail(&self, op: &'static str, err: ApiError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    pub fn heal(&self, op: &'static str) {
        self.failures.lock().unwrap().remove(op);
    }

    /// Hold every chat call until the returned `Notify` is signalled.
    pub fn hold_chat(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.chat_gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Hold every guardian call until the returned `Notify` is signalled.
    pub fn hold_guardians(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.guardian_gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, op: &'static str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(op);
        self.failures
            .lock()
            .unwrap()
            .get(op)
            .cloned()
            .map_or(Ok(()), Err)
    }
}

pub fn server_error(message: &str) -> ApiError {
    ApiError::Server {
        status: 400,
        message: message.to_string(),
    }
}

pub fn guardian(id: GuardianId, name: &str) -> GuardianRecord {
    GuardianRecord {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        added_at: None,
    }
}

#[async_trait]
impl RemoteApi for MockApi {
    async fn authenticate(
        &self,
        mode: AuthMode,
        _credentials: &Credentials,
    ) -> Result<AuthReply, ApiError> {
        self.record(mode.endpoint())?;
        self.auth_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("No mock auth reply queued".into())))
    }

    async fn chat(&self, _token: Option<&str>, _message: &str) -> Result<ChatReply, ApiError> {
        self.record("chat")?;
        pass(&self.chat_gate).await;
        self.chat_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("No mock chat reply queued".into())))
    }

    async fn clear_history(&self, _token: &str) -> Result<(), ApiError> {
        self.record("clear_history")
    }

    async fn list_guardians(&self, token: &str) -> Result<Vec<GuardianRecord>, ApiError> {
        self.record("list_guardians")?;
        pass(&self.guardian_gate).await;
        Ok(self.remote_guardians(token))
    }

    async fn create_guardian(
        &self,
        token: &str,
        fields: &GuardianFields,
    ) -> Result<GuardianRecord, ApiError> {
        self.record("create_guardian")?;
        pass(&self.guardian_gate).await;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        let record = GuardianRecord {
            id,
            name: fields.name.clone(),
            email: fields.email.clone(),
            added_at: Some("2024-05-01T10:00:00Z".into()),
        };
        self.guardians
            .lock()
            .unwrap()
            .entry(token.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update_guardian(
        &self,
        token: &str,
        id: GuardianId,
        fields: &GuardianFields,
    ) -> Result<GuardianRecord, ApiError> {
        self.record("update_guardian")?;
        pass(&self.guardian_gate).await;
        let mut all = self.guardians.lock().unwrap();
        let record = all
            .get_mut(token)
            .and_then(|list| list.iter_mut().find(|g| g.id == id))
            .ok_or_else(|| ApiError::Server {
                status: 404,
                message: "Guardian not found".into(),
            })?;
        record.name.clone_from(&fields.name);
        record.email.clone_from(&fields.email);
        Ok(record.clone())
    }

    async fn delete_guardian(&self, token: &str, id: GuardianId) -> Result<(), ApiError> {
        self.record("delete_guardian")?;
        pass(&self.guardian_gate).await;
        if let Some(list) = self.guardians.lock().unwrap().get_mut(token) {
            list.retain(|g| g.id != id);
        }
        Ok(())
    }

    fn origin(&self) -> &Url {
        &self.origin
    }
}

// ============================================================================
// Scripted key-value store
// ============================================================================

/// In-memory store whose reads can be held open and whose writes can fail.
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    get_gate: Mutex<Option<Arc<Notify>>>,
    waiting: AtomicUsize,
    fail_writes: AtomicBool,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every `get` until the returned `Notify` is signalled.
    pub fn hold_gets(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.get_gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Number of `get` calls currently held.
    pub fn waiting_gets(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for ScriptedStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let gate = self.get_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            gate.notified().await;
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".into()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}

// ============================================================================
// Mock media player
// ============================================================================

/// Records playback attempts; optionally fails them.
#[derive(Default)]
pub struct RecordingPlayer {
    pub played: Mutex<Vec<Url>>,
    pub fail: bool,
}

impl RecordingPlayer {
    pub fn failing() -> Self {
        Self {
            played: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn attempts(&self) -> Vec<Url> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaPlayer for RecordingPlayer {
    async fn play(&self, url: &Url) -> Result<(), MediaError> {
        self.played.lock().unwrap().push(url.clone());
        if self.fail {
            Err(MediaError("autoplay blocked".into()))
        } else {
            Ok(())
        }
    }
}
