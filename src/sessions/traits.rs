//! Session storage traits and the per-visitor conversation state.

use crate::providers::ChatMessage;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of the system message that carries a compaction summary.
pub const SUMMARY_PREFIX: &str = "PREVIOUS CONVERSATION SUMMARY: ";

/// Conversation state for one client-supplied session id.
///
/// `messages[0]` is always the system prompt. After compaction the history is
/// exactly `[system prompt, summary]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    /// User turns since the last compaction.
    pub interaction_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: &str, system_prompt: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            messages: vec![ChatMessage::system(system_prompt)],
            interaction_count: 0,
            created_at: now,
            last_activity: now,
        }
    }

    /// Append a user turn and count it toward the compaction threshold.
    pub fn push_user(&mut self, content: String) {
        self.messages.push(ChatMessage::user(content));
        self.interaction_count += 1;
        self.touch();
    }

    pub fn push_assistant(&mut self, content: String) {
        self.messages.push(ChatMessage::assistant(content));
        self.touch();
    }

    /// Replace the whole history with the system prompt plus a summary.
    pub fn replace_with_summary(&mut self, system_prompt: &str, summary: &str) {
        self.messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::system(format!("{SUMMARY_PREFIX}{summary}")),
        ];
        self.interaction_count = 0;
        self.touch();
    }

    pub fn needs_compaction(&self, threshold: u32) -> bool {
        self.interaction_count >= threshold
    }

    pub fn is_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        now - self.last_activity > max_idle
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Storage for conversation sessions.
///
/// Lookups are synchronous and never held across an await. Callers take a
/// snapshot with [`get`](SessionStore::get), mutate it, and write it back with
/// [`put`](SessionStore::put); concurrent requests for one id are not
/// serialized, so the last writer wins.
pub trait SessionStore: Send + Sync {
    /// Snapshot of a session, if it exists.
    fn get(&self, id: &str) -> Option<Session>;

    /// Insert or replace a session.
    fn put(&self, session: Session);

    /// Remove a session. Returns whether it existed.
    fn delete(&self, id: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every session.
    fn clear(&self);

    /// Remove sessions idle for longer than `max_idle`. Returns how many were removed.
    fn sweep_idle(&self, max_idle: Duration) -> usize;

    /// The name of this session store implementation.
    fn name(&self) -> &str;

    /// Fetch a session, creating and storing a fresh one on first sight of `id`.
    fn get_or_create(&self, id: &str, system_prompt: &str) -> Session {
        if let Some(session) = self.get(id) {
            return session;
        }
        let session = Session::new(id, system_prompt);
        self.put(session.clone());
        session
    }
}
