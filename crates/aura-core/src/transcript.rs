//! Ordered, append-only chat transcript with live broadcast.

use std::sync::{PoisonError, RwLock};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::types::Message;

/// Change notification for renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// A message was appended.
    Appended(Message),
    /// The transcript was replaced by a single greeting.
    Reset(Message),
}

/// In-memory transcript.
///
/// Always holds at least one entry: it starts from an assistant greeting
/// and every reset replaces it with a fresh one. Renderers attach late via
/// [`Transcript::history_plus_stream`] and receive the history first, then
/// live updates.
pub struct Transcript {
    history: RwLock<Vec<Message>>,
    sender: broadcast::Sender<TranscriptEvent>,
}

impl Transcript {
    /// Create a transcript holding one assistant greeting.
    #[must_use]
    pub fn new(greeting: &str) -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            history: RwLock::new(vec![Message::assistant(greeting, None)]),
            sender,
        }
    }

    /// Append a message and notify live listeners.
    pub fn push(&self, msg: Message) {
        tracing::trace!(origin = ?msg.origin, bytes = msg.approx_bytes(), "transcript append");
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        history.push(msg.clone());
        let _ = self.sender.send(TranscriptEvent::Appended(msg));
    }

    /// Replace the whole transcript by a fresh greeting.
    pub fn reset(&self, greeting: &str) {
        let msg = Message::assistant(greeting, None);
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        *history = vec![msg.clone()];
        let _ = self.sender.send(TranscriptEvent::Reset(msg));
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Never true once constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the history.
    #[must_use]
    pub fn get_history(&self) -> Vec<Message> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver for live updates.
    #[must_use]
    pub fn get_receiver(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.sender.subscribe()
    }

    /// Stream that yields the history (as `Appended` events) then live updates.
    ///
    /// Lagged receivers silently skip the events they missed.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, TranscriptEvent> {
        // Writers broadcast while holding the write lock, so a snapshot and
        // a subscription taken under one read lock neither miss nor repeat.
        let (history, rx) = {
            let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
            (history.clone(), self.sender.subscribe())
        };

        let hist = futures::stream::iter(history.into_iter().map(TranscriptEvent::Appended));
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }
}
