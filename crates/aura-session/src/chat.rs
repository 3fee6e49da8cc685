//! Chat transcript session: history reset, send, and media side effect.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use aura_core::{
    ClientConfig,
    traits::{ApiError, MediaPlayer, RemoteApi},
    transcript::Transcript,
    types::{ChatReply, Message},
};
use url::Url;

use crate::session_store::SessionStore;

/// Lifecycle of the chat component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptState {
    Idle,
    Resetting,
    AwaitingReply,
}

/// Result of [`TranscriptSession::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Input was blank; nothing happened.
    Empty,
    /// Another call is outstanding; nothing happened.
    Busy,
    /// The reply was appended.
    Replied,
    /// The call failed; a synthetic error entry was appended.
    Failed(ApiError),
    /// The transcript was reset while the call was in flight; the reply was dropped.
    Superseded,
}

/// Result of [`TranscriptSession::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Remote history cleared and local transcript replaced.
    Cleared,
    /// Local transcript replaced; the remote call failed or was skipped.
    LocalOnly,
    /// Another call is outstanding; nothing happened.
    Busy,
}

/// Resolve a media URL returned by the server.
///
/// A URL with a scheme is used as is; anything else is qualified against
/// the API origin.
///
/// # Errors
/// Returns error if the value is neither absolute nor joinable.
pub fn resolve_media_url(origin: &Url, raw: &str) -> Result<Url, url::ParseError> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => origin.join(raw),
        Err(e) => Err(e),
    }
}

/// Manages the ephemeral transcript and its remote calls.
///
/// At most one remote call (reset or chat) is outstanding at a time; a
/// second call is turned away, never queued.
pub struct TranscriptSession {
    api: Arc<dyn RemoteApi>,
    session: Arc<SessionStore>,
    player: Arc<dyn MediaPlayer>,
    transcript: Transcript,
    state: Mutex<TranscriptState>,
    epoch: AtomicU64,
    greeting: String,
    reply_fallback: String,
}

/// Returns the state to `Idle` when dropped.
struct StateGuard<'a> {
    state: &'a Mutex<TranscriptState>,
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = TranscriptState::Idle;
    }
}

impl TranscriptSession {
    /// Create a session holding a single greeting, in state `Idle`.
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        api: Arc<dyn RemoteApi>,
        session: Arc<SessionStore>,
        player: Arc<dyn MediaPlayer>,
    ) -> Self {
        Self {
            api,
            session,
            player,
            transcript: Transcript::new(&config.greeting),
            state: Mutex::new(TranscriptState::Idle),
            epoch: AtomicU64::new(0),
            greeting: config.greeting.clone(),
            reply_fallback: config.reply_fallback.clone(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TranscriptState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The transcript, for rendering and subscriptions.
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Snapshot of the messages.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.transcript.get_history()
    }

    fn enter(&self, next: TranscriptState) -> Option<StateGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != TranscriptState::Idle {
            return None;
        }
        *state = next;
        Some(StateGuard { state: &self.state })
    }

    fn replace_with_greeting(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.transcript.reset(&self.greeting);
    }

    /// Clear the server-side history and start over with a fresh greeting.
    ///
    /// Fail-open: the local transcript is replaced whatever the remote
    /// outcome, and a remote failure is only logged.
    pub async fn reset(&self) -> ResetOutcome {
        let Some(_guard) = self.enter(TranscriptState::Resetting) else {
            tracing::debug!("reset ignored, transcript busy");
            return ResetOutcome::Busy;
        };

        let outcome = self.clear_remote().await;
        self.replace_with_greeting();
        outcome
    }

    /// Start over for a newly established session.
    ///
    /// Unlike [`TranscriptSession::reset`] this is never turned away: with a
    /// reply pending, the transcript is replaced first so that reply is
    /// dropped on arrival, and the remote history is cleared anyway.
    pub async fn restart(&self) -> ResetOutcome {
        match self.reset().await {
            ResetOutcome::Busy => {
                tracing::debug!("reply pending during restart, superseding it");
                self.replace_with_greeting();
                self.clear_remote().await
            }
            outcome => outcome,
        }
    }

    async fn clear_remote(&self) -> ResetOutcome {
        let Some(token) = self.session.current_token() else {
            tracing::debug!("no session, skipping remote history clear");
            return ResetOutcome::LocalOnly;
        };
        match self.api.clear_history(&token).await {
            Ok(()) => ResetOutcome::Cleared,
            Err(e) => {
                tracing::warn!(error = %e, "failed to clear remote history");
                ResetOutcome::LocalOnly
            }
        }
    }

    /// Replace the transcript by a greeting without any remote call.
    ///
    /// Used on logout. A reply still in flight is dropped when it arrives.
    pub fn reset_local(&self) {
        self.replace_with_greeting();
    }

    /// Send a message and append the reply.
    ///
    /// The user's entry is appended immediately. Failures become a
    /// synthetic assistant entry; nothing is retried.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Empty;
        }
        let Some(_guard) = self.enter(TranscriptState::AwaitingReply) else {
            tracing::debug!("send ignored, reply pending");
            return SendOutcome::Busy;
        };

        let epoch = self.epoch.load(Ordering::Acquire);
        self.transcript.push(Message::user(text));

        let token = self.session.current_token();
        let result = self.api.chat(token.as_deref(), text).await;

        if self.epoch.load(Ordering::Acquire) != epoch {
            tracing::debug!("transcript reset while awaiting reply, dropping it");
            return SendOutcome::Superseded;
        }

        match result {
            Ok(reply) => {
                self.append_reply(&reply);
                if let Some(raw) = reply.requested_song() {
                    self.play(raw).await;
                }
                SendOutcome::Replied
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                self.transcript
                    .push(Message::assistant(format!("Error: {}", e.detail()), None));
                SendOutcome::Failed(e)
            }
        }
    }

    fn append_reply(&self, reply: &ChatReply) {
        let text = reply
            .reply
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(self.reply_fallback.as_str());
        self.transcript
            .push(Message::assistant(text, reply.mode.clone()));
    }

    async fn play(&self, raw: &str) {
        let url = match resolve_media_url(self.api.origin(), raw) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, song_url = raw, "unusable song URL");
                return;
            }
        };
        tracing::debug!(%url, "playing supportive song");
        if let Err(e) = self.player.play(&url).await {
            tracing::warn!(error = %e, %url, "song playback failed");
        }
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use aura_core::types::Origin;

    use super::*;
    use crate::{
        storage::MemoryStore,
        testing::{MockApi, RecordingPlayer, server_error},
    };

    struct Fixture {
        api: Arc<MockApi>,
        player: Arc<RecordingPlayer>,
        session: Arc<SessionStore>,
        chat: Arc<TranscriptSession>,
    }

    async fn fixture_with(player: RecordingPlayer) -> Fixture {
        let config = ClientConfig::default();
        let api = Arc::new(MockApi::new());
        let player = Arc::new(player);
        let session = Arc::new(
            SessionStore::restore(Arc::new(MemoryStore::new()), &config.token_slot)
                .await
                .unwrap(),
        );
        session.establish("T1").await.unwrap();
        let chat = Arc::new(TranscriptSession::new(
            &config,
            api.clone(),
            session.clone(),
            player.clone(),
        ));
        Fixture {
            api,
            player,
            session,
            chat,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(RecordingPlayer::default()).await
    }

    fn reply(text: &str) -> ChatReply {
        ChatReply {
            reply: Some(text.to_string()),
            ..ChatReply::default()
        }
    }

    #[tokio::test]
    async fn starts_idle_with_greeting() {
        let f = fixture().await;
        assert_eq!(f.chat.state(), TranscriptState::Idle);
        let messages = f.chat.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].origin, Origin::Assistant);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let f = fixture().await;
        assert_eq!(f.chat.send("").await, SendOutcome::Empty);
        assert_eq!(f.chat.send("   ").await, SendOutcome::Empty);
        assert_eq!(f.chat.messages().len(), 1);
        assert_eq!(f.api.count("chat"), 0);
    }

    #[tokio::test]
    async fn reply_is_appended_after_local_echo() {
        let f = fixture().await;
        f.api.queue_chat(Ok(ChatReply {
            mode: Some("support".into()),
            ..reply("I'm here for you.")
        }));

        assert_eq!(f.chat.send("  hello  ").await, SendOutcome::Replied);

        let messages = f.chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].origin, Origin::User);
        assert_eq!(messages[1].text, "hello");
        assert_eq!(messages[2].origin, Origin::Assistant);
        assert_eq!(messages[2].text, "I'm here for you.");
        assert_eq!(messages[2].mode.as_deref(), Some("support"));
        assert_eq!(f.chat.state(), TranscriptState::Idle);
    }

    #[tokio::test]
    async fn missing_reply_uses_fallback() {
        let f = fixture().await;
        f.api.queue_chat(Ok(ChatReply::default()));
        f.chat.send("hi").await;
        assert_eq!(f.chat.messages().last().unwrap().text, "No reply");
    }

    #[tokio::test]
    async fn failure_becomes_error_entry() {
        let f = fixture().await;
        f.api.queue_chat(Err(server_error("model overloaded")));

        let outcome = f.chat.send("hi").await;
        assert!(matches!(outcome, SendOutcome::Failed(_)));

        let messages = f.chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "hi");
        assert_eq!(messages[2].origin, Origin::Assistant);
        assert_eq!(messages[2].text, "Error: model overloaded");
        assert_eq!(f.chat.state(), TranscriptState::Idle);
    }

    #[tokio::test]
    async fn network_failure_uses_transport_message() {
        let f = fixture().await;
        f.api
            .queue_chat(Err(ApiError::Network("connection refused".into())));
        f.chat.send("hi").await;
        assert_eq!(
            f.chat.messages().last().unwrap().text,
            "Error: connection refused"
        );
    }

    #[tokio::test]
    async fn anonymous_chat_is_allowed() {
        let f = fixture().await;
        f.session.clear().await.unwrap();
        f.api.queue_chat(Ok(reply("hello stranger")));

        assert_eq!(f.chat.send("hi").await, SendOutcome::Replied);
        assert_eq!(f.api.count("chat"), 1);
    }

    #[tokio::test]
    async fn second_send_while_pending_is_rejected() {
        let f = fixture().await;
        let release = f.api.hold_chat();
        f.api.queue_chat(Ok(reply("first answer")));

        let chat = f.chat.clone();
        let pending = tokio::spawn(async move { chat.send("first").await });

        while f.chat.state() != TranscriptState::AwaitingReply {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.chat.send("second").await, SendOutcome::Busy);
        assert_eq!(f.chat.reset().await, ResetOutcome::Busy);

        release.notify_one();
        assert_eq!(pending.await.unwrap(), SendOutcome::Replied);

        let messages = f.chat.messages();
        let users = messages.iter().filter(|m| m.origin == Origin::User).count();
        let assistants = messages
            .iter()
            .filter(|m| m.origin == Origin::Assistant)
            .count();
        assert_eq!(users, 1);
        assert_eq!(assistants, 2); // greeting + one reply
        assert_eq!(f.api.count("chat"), 1);
        assert_eq!(f.chat.state(), TranscriptState::Idle);
    }

    #[tokio::test]
    async fn song_is_played_once_against_origin() {
        let f = fixture().await;
        f.api.queue_chat(Ok(ChatReply {
            play_song: Some(true),
            song_url: Some("/static/song.mp3".into()),
            ..reply("You are not alone.")
        }));

        f.chat.send("I feel sad").await;

        let messages = f.chat.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].text, "You are not alone.");

        let attempts = f.player.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].as_str(), "http://api.test/static/song.mp3");
    }

    #[tokio::test]
    async fn song_flag_without_url_plays_nothing() {
        let f = fixture().await;
        f.api.queue_chat(Ok(ChatReply {
            play_song: Some(true),
            ..reply("ok")
        }));
        f.chat.send("hi").await;
        assert!(f.player.attempts().is_empty());
    }

    #[tokio::test]
    async fn playback_failure_is_swallowed() {
        let f = fixture_with(RecordingPlayer::failing()).await;
        f.api.queue_chat(Ok(ChatReply {
            play_song: Some(true),
            song_url: Some("https://cdn.example.com/calm.mp3".into()),
            ..reply("Breathe with me.")
        }));

        assert_eq!(f.chat.send("help").await, SendOutcome::Replied);
        assert_eq!(f.player.attempts().len(), 1);
        assert_eq!(f.chat.messages().len(), 3);
        assert_eq!(f.chat.state(), TranscriptState::Idle);
    }

    #[tokio::test]
    async fn reset_replaces_transcript_even_on_failure() {
        let f = fixture().await;
        f.api.queue_chat(Ok(reply("hey")));
        f.chat.send("hi").await;
        assert_eq!(f.chat.messages().len(), 3);

        f.api.fail("clear_history", server_error("boom"));
        assert_eq!(f.chat.reset().await, ResetOutcome::LocalOnly);
        assert_eq!(f.chat.messages().len(), 1);
        assert_eq!(f.chat.state(), TranscriptState::Idle);

        f.api.heal("clear_history");
        assert_eq!(f.chat.reset().await, ResetOutcome::Cleared);
        assert_eq!(f.api.count("clear_history"), 2);
    }

    #[tokio::test]
    async fn reply_arriving_after_local_reset_is_dropped() {
        let f = fixture().await;
        let release = f.api.hold_chat();
        f.api.queue_chat(Ok(reply("late")));

        let chat = f.chat.clone();
        let pending = tokio::spawn(async move { chat.send("hi").await });
        while f.chat.state() != TranscriptState::AwaitingReply {
            tokio::task::yield_now().await;
        }

        f.chat.reset_local();
        release.notify_one();

        assert_eq!(pending.await.unwrap(), SendOutcome::Superseded);
        assert_eq!(f.chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn restart_supersedes_pending_reply() {
        let f = fixture().await;
        let release = f.api.hold_chat();
        f.api.queue_chat(Ok(reply("stale")));

        let chat = f.chat.clone();
        let pending = tokio::spawn(async move { chat.send("hi").await });
        while f.chat.state() != TranscriptState::AwaitingReply {
            tokio::task::yield_now().await;
        }

        assert_eq!(f.chat.restart().await, ResetOutcome::Cleared);
        assert_eq!(f.api.count("clear_history"), 1);
        assert_eq!(f.chat.messages().len(), 1);

        release.notify_one();
        assert_eq!(pending.await.unwrap(), SendOutcome::Superseded);
        assert_eq!(f.chat.messages().len(), 1);
        assert_eq!(f.chat.state(), TranscriptState::Idle);
    }

    #[tokio::test]
    async fn restart_when_idle_is_plain_reset() {
        let f = fixture().await;
        f.api.queue_chat(Ok(reply("hey")));
        f.chat.send("hi").await;

        assert_eq!(f.chat.restart().await, ResetOutcome::Cleared);
        assert_eq!(f.api.count("clear_history"), 1);
        assert_eq!(f.chat.messages().len(), 1);
    }

    #[test]
    fn media_url_resolution() {
        let origin = Url::parse("https://api.example.com/base/").unwrap();
        assert_eq!(
            resolve_media_url(&origin, "/static/a.mp3").unwrap().as_str(),
            "https://api.example.com/static/a.mp3"
        );
        assert_eq!(
            resolve_media_url(&origin, "http://cdn.example.com/b.mp3")
                .unwrap()
                .as_str(),
            "http://cdn.example.com/b.mp3"
        );
    }
}
