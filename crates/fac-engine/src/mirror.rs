use std::sync::Arc;

use fac_audit::{AuditEntry, AuditWriter};
use tokio::sync::Mutex;

/// Local JSONL copy of committed audit entries.
///
/// Written after the store commit succeeds. A failed append is logged and
/// does not fail the operation: the store's audit table is authoritative.
#[derive(Clone)]
pub struct AuditMirror {
    writer: Arc<Mutex<AuditWriter>>,
}

impl AuditMirror {
    pub fn new(writer: AuditWriter) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub async fn record(&self, entries: &[AuditEntry]) {
        let mut w = self.writer.lock().await;
        for e in entries {
            if let Err(err) = w.append(e) {
                tracing::error!(
                    path = %w.path().display(),
                    entry_id = %e.id,
                    "audit mirror append failed: {err:#}"
                );
                return;
            }
        }
    }
}
