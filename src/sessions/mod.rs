//! Session management: per-visitor conversation state keyed by an opaque id.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use traits::{Session, SessionStore, SUMMARY_PREFIX};

use std::sync::Arc;

/// Create a default in-memory session store.
pub fn create_session_store() -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::new())
}
