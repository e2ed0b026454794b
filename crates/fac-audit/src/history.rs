//! Record history reconstruction.
//!
//! Folds the audit entries of one record, oldest first, into the full record
//! state after each entry. Inserts seed the state, updates and status changes
//! overlay their `new_values`, deletes clear it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{AuditAction, AuditEntry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub entry_id: Uuid,
    pub at: DateTime<Utc>,
    pub action: AuditAction,
    pub actor_name: String,
    /// Record state after the entry. `None` once deleted.
    pub state: Option<Value>,
}

/// Reconstruct the state sequence of a single record.
///
/// Entries are ordered by timestamp (stable for equal timestamps). An update
/// seen before any insert overlays onto an empty object, so partial trails
/// still produce the fields they know about.
pub fn reconstruct_history(entries: &[AuditEntry]) -> Vec<HistoryPoint> {
    let mut ordered: Vec<&AuditEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);

    let mut state: Option<Map<String, Value>> = None;
    let mut points = Vec::with_capacity(ordered.len());

    for entry in ordered {
        match entry.action {
            AuditAction::Insert => {
                state = Some(entry.new_values.as_object().cloned().unwrap_or_default());
            }
            AuditAction::Update | AuditAction::StatusChange => {
                let current = state.get_or_insert_with(Map::new);
                if let Some(changes) = entry.new_values.as_object() {
                    for (k, v) in changes {
                        current.insert(k.clone(), v.clone());
                    }
                }
            }
            AuditAction::Delete => state = None,
        }

        points.push(HistoryPoint {
            entry_id: entry.id,
            at: entry.timestamp,
            action: entry.action,
            actor_name: entry.actor_name.clone(),
            state: state.clone().map(Value::Object),
        });
    }

    points
}
