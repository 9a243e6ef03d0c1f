//! Append-only audit trail for mutations made outside an operator session,
//! currently the redirect repair job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::entities::UrlMapId;

/// The identity an audit entry is attributed to. System actors are created on
/// first use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditAction {
    Change,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuditEntry {
    pub actor: Actor,
    pub url_map: UrlMapId,
    pub action: AuditAction,
    pub message: String,
    pub at: SystemTime,
}

pub trait AuditSink: Send + Sync {
    /// Returns the actor with this name, creating it if absent.
    fn ensure_actor(&self, name: &str) -> Actor;
    fn append(&self, entry: AuditEntry);
}

#[derive(Default)]
struct MemoryAuditSinkInner {
    actors: HashMap<String, Actor>,
    next_actor_id: u64,
    entries: Vec<AuditEntry>,
}

#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    inner: Arc<Mutex<MemoryAuditSinkInner>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        MemoryAuditSink::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().entries.clone()
    }

    pub fn entries_for(&self, url_map: UrlMapId) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.url_map == url_map)
            .cloned()
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn ensure_actor(&self, name: &str) -> Actor {
        let mut inner = self.inner.lock();
        if let Some(actor) = inner.actors.get(name) {
            return actor.clone();
        }
        inner.next_actor_id += 1;
        let actor = Actor {
            id: inner.next_actor_id,
            name: name.to_string(),
        };
        inner.actors.insert(name.to_string(), actor.clone());
        actor
    }

    fn append(&self, entry: AuditEntry) {
        self.inner.lock().entries.push(entry);
    }
}
