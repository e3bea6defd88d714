//! Ephemeral per-user state.
//!
//! [`SessionStore`] keeps, for each user, the latest original text, results
//! already computed per [`ProcessingMode`], the active mode, and any
//! document dialogues (document text plus Q&A history).  Everything lives in
//! memory and is gone when the process exits; [`SessionStore::cleanup`]
//! evicts entries idle for longer than a TTL.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::TextConfig;
use crate::llm::{ChatMessage, ProcessingMode};
use crate::text::available_modes;

pub type UserId = u64;
pub type MessageId = u64;

// ---------------------------------------------------------------------------
// UserSession / Dialogue
// ---------------------------------------------------------------------------

/// What the bot remembers about a user's current message.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub original: String,
    pub available_modes: Vec<ProcessingMode>,
    pub cached: HashMap<ProcessingMode, String>,
    pub current_mode: Option<ProcessingMode>,
    last_accessed: Instant,
}

/// A document the user is asking questions about.
#[derive(Debug, Clone)]
pub struct Dialogue {
    pub text: String,
    pub history: Vec<ChatMessage>,
    last_accessed: Instant,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<UserId, UserSession>,
    dialogues: HashMap<(UserId, MessageId), Dialogue>,
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Thread-safe in-memory store shared by all request handlers.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<Inner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every write leaves the maps consistent, so poisoning is ignored.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start over for a new message: drops cached results and computes the
    /// modes offered for `original`.
    pub fn start(&self, user: UserId, original: &str, cfg: &TextConfig) -> Vec<ProcessingMode> {
        let modes = available_modes(original, cfg);
        self.lock().sessions.insert(
            user,
            UserSession {
                original: original.to_string(),
                available_modes: modes.clone(),
                cached: HashMap::new(),
                current_mode: None,
                last_accessed: Instant::now(),
            },
        );
        modes
    }

    pub fn session(&self, user: UserId) -> Option<UserSession> {
        let mut inner = self.lock();
        let session = inner.sessions.get_mut(&user)?;
        session.last_accessed = Instant::now();
        Some(session.clone())
    }

    pub fn available_modes(&self, user: UserId) -> Vec<ProcessingMode> {
        self.lock()
            .sessions
            .get(&user)
            .map(|s| s.available_modes.clone())
            .unwrap_or_default()
    }

    /// Remember `text` as the result for `mode` and make it the active mode.
    /// Ignored when the user has no session.
    pub fn cache_result(&self, user: UserId, mode: ProcessingMode, text: &str) {
        if let Some(session) = self.lock().sessions.get_mut(&user) {
            session.cached.insert(mode, text.to_string());
            session.current_mode = Some(mode);
            session.last_accessed = Instant::now();
        }
    }

    pub fn cached_result(&self, user: UserId, mode: ProcessingMode) -> Option<String> {
        self.lock()
            .sessions
            .get(&user)
            .and_then(|s| s.cached.get(&mode).cloned())
    }

    pub fn current_mode(&self, user: UserId) -> Option<ProcessingMode> {
        self.lock().sessions.get(&user).and_then(|s| s.current_mode)
    }

    pub fn set_current_mode(&self, user: UserId, mode: ProcessingMode) {
        if let Some(session) = self.lock().sessions.get_mut(&user) {
            session.current_mode = Some(mode);
        }
    }

    /// Forget the user's message state.  Dialogues are kept.
    pub fn clear(&self, user: UserId) {
        self.lock().sessions.remove(&user);
    }

    // -----------------------------------------------------------------------
    // Document dialogues
    // -----------------------------------------------------------------------

    pub fn add_document(&self, user: UserId, message: MessageId, text: &str) {
        self.lock().dialogues.insert(
            (user, message),
            Dialogue {
                text: text.to_string(),
                history: Vec::new(),
                last_accessed: Instant::now(),
            },
        );
    }

    pub fn dialogue(&self, user: UserId, message: MessageId) -> Option<Dialogue> {
        let mut inner = self.lock();
        let dialogue = inner.dialogues.get_mut(&(user, message))?;
        dialogue.last_accessed = Instant::now();
        Some(dialogue.clone())
    }

    /// Append a question/answer pair.  Returns `false` when the dialogue no
    /// longer exists.
    pub fn record_exchange(
        &self,
        user: UserId,
        message: MessageId,
        question: &str,
        answer: &str,
    ) -> bool {
        match self.lock().dialogues.get_mut(&(user, message)) {
            Some(dialogue) => {
                dialogue.history.push(ChatMessage::user(question));
                dialogue.history.push(ChatMessage::assistant(answer));
                dialogue.last_accessed = Instant::now();
                true
            }
            None => false,
        }
    }

    pub fn end_dialogue(&self, user: UserId, message: MessageId) {
        self.lock().dialogues.remove(&(user, message));
    }

    /// Drop sessions and dialogues idle for longer than `ttl`.  Returns how
    /// many entries were evicted.
    pub fn cleanup(&self, ttl: Duration) -> usize {
        let mut inner = self.lock();
        let before = inner.sessions.len() + inner.dialogues.len();
        inner.sessions.retain(|_, s| s.last_accessed.elapsed() <= ttl);
        inner.dialogues.retain(|_, d| d.last_accessed.elapsed() <= ttl);
        let evicted = before - (inner.sessions.len() + inner.dialogues.len());
        if evicted > 0 {
            log::info!("evicted {evicted} idle session entries");
        }
        evicted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_computes_modes_and_resets_cache() {
        let store = SessionStore::new();
        let cfg = TextConfig::default();

        let modes = store.start(1, "короткий текст", &cfg);
        assert_eq!(modes, vec![ProcessingMode::Basic, ProcessingMode::Premium]);

        store.cache_result(1, ProcessingMode::Basic, "Короткий текст.");
        assert_eq!(store.current_mode(1), Some(ProcessingMode::Basic));

        let long = vec!["слово"; 100].join(" ");
        let modes = store.start(1, &long, &cfg);
        assert_eq!(modes.len(), 3);
        assert_eq!(store.available_modes(1), modes);
        assert!(store.cached_result(1, ProcessingMode::Basic).is_none());
        assert!(store.current_mode(1).is_none());
    }

    #[test]
    fn cached_results_are_per_user_and_mode() {
        let store = SessionStore::new();
        let cfg = TextConfig::default();
        store.start(1, "a", &cfg);
        store.start(2, "b", &cfg);

        store.cache_result(1, ProcessingMode::Premium, "A!");
        assert_eq!(store.cached_result(1, ProcessingMode::Premium).as_deref(), Some("A!"));
        assert!(store.cached_result(1, ProcessingMode::Basic).is_none());
        assert!(store.cached_result(2, ProcessingMode::Premium).is_none());

        store.set_current_mode(2, ProcessingMode::Basic);
        assert_eq!(store.current_mode(2), Some(ProcessingMode::Basic));
        assert_eq!(store.session(1).unwrap().original, "a");
    }

    #[test]
    fn unknown_user_is_ignored() {
        let store = SessionStore::new();
        store.cache_result(9, ProcessingMode::Basic, "x");
        store.set_current_mode(9, ProcessingMode::Basic);
        assert!(store.session(9).is_none());
        assert!(store.available_modes(9).is_empty());
    }

    #[test]
    fn clear_forgets_user() {
        let store = SessionStore::new();
        store.start(1, "x", &TextConfig::default());
        store.clear(1);
        assert!(store.session(1).is_none());
    }

    #[test]
    fn dialogue_history_accumulates() {
        let store = SessionStore::new();
        store.add_document(1, 10, "документ");

        assert!(store.record_exchange(1, 10, "кто?", "автор"));
        assert!(store.record_exchange(1, 10, "когда?", "вчера"));
        assert!(!store.record_exchange(1, 11, "где?", "—"));

        let dialogue = store.dialogue(1, 10).unwrap();
        assert_eq!(dialogue.text, "документ");
        assert_eq!(dialogue.history.len(), 4);
        assert_eq!(dialogue.history[2], ChatMessage::user("когда?"));

        store.end_dialogue(1, 10);
        assert!(store.dialogue(1, 10).is_none());
    }

    #[test]
    fn cleanup_evicts_only_idle_entries() {
        let store = SessionStore::new();
        store.start(1, "x", &TextConfig::default());
        store.add_document(1, 5, "doc");

        assert_eq!(store.cleanup(Duration::from_secs(3600)), 0);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.cleanup(Duration::from_millis(1)), 2);
        assert!(store.session(1).is_none());
        assert!(store.dialogue(1, 5).is_none());
    }
}
