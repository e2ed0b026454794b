//! Audit trail.
//!
//! - [`AuditEntry`]: the append-only row written with every committed mutation.
//! - [`reconstruct_history`]: replay one record's entries into full snapshots.
//! - [`AuditWriter`]: optional local JSON Lines mirror with a SHA-256 hash
//!   chain, checked by [`verify_hash_chain`].
//!
//! The store's audit table is authoritative; the mirror is append-only and
//! never read back by the services.

mod entry;
mod history;
mod writer;

pub use entry::{changed_fields, snapshot, AuditAction, AuditEntry};
pub use history::{reconstruct_history, HistoryPoint};
pub use writer::{
    compute_entry_hash, read_entries, verify_hash_chain, verify_hash_chain_str, AuditWriter,
    ChainedEntry, VerifyResult,
};
