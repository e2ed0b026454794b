use chrono::{DateTime, Utc};
use fac_audit::{AuditAction, AuditEntry};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Published after every committed mutation, one per audit entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table_name: String,
    pub record_id: Uuid,
    pub action: AuditAction,
    pub actor_name: String,
    pub at: DateTime<Utc>,
}

impl From<&AuditEntry> for ChangeEvent {
    fn from(e: &AuditEntry) -> Self {
        Self {
            table_name: e.table_name.clone(),
            record_id: e.record_id,
            action: e.action,
            actor_name: e.actor_name.clone(),
            at: e.timestamp,
        }
    }
}

/// Cloneable broadcast handle. Publishing never fails: events sent while
/// nobody is subscribed are dropped, slow subscribers see `Lagged`.
#[derive(Clone, Debug)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn publish_all(&self, entries: &[AuditEntry]) {
        for e in entries {
            let _ = self.tx.send(ChangeEvent::from(e));
        }
    }
}
