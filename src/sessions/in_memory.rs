//! In-memory session store implementation.

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use super::traits::{Session, SessionStore};

/// An in-memory session store backed by a mutex-protected hash map.
///
/// Contents live only as long as the process. There is no eviction unless the
/// caller runs [`SessionStore::sweep_idle`].
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &str) -> Option<Session> {
        self.sessions.lock().get(id).cloned()
    }

    fn put(&self, session: Session) {
        self.sessions.lock().insert(session.id.clone(), session);
    }

    fn delete(&self, id: &str) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    fn clear(&self) {
        self.sessions.lock().clear();
    }

    fn sweep_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_idle(now, max_idle));
        before - sessions.len()
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
