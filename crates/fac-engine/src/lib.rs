//! fac-engine
//!
//! Async services over the pure rule crates.
//!
//! - [`GarnishmentEngine`]: profiles, installments, status, audit history.
//! - [`LoanDesk`]: outstanding balance, withdrawals, repayments, requests.
//! - [`GarnishmentStore`] / [`LoanStore`] / [`AuditLog`]: persistence seams,
//!   implemented by [`MemStore`] here and by the Postgres store in `fac-db`.
//!
//! Write path: role gate, per-entity lock, authoritative read, plan, one
//! conditional commit, then change event and optional audit mirror. A
//! `Conflict` from the commit triggers exactly one re-read and re-plan.

use std::sync::Arc;

use fac_loans::OutstandingPolicy;

mod bus;
mod garnishment;
mod loans;
mod locks;
mod memory;
mod mirror;
mod retry;
mod store;

pub use bus::{ChangeBus, ChangeEvent};
pub use garnishment::GarnishmentEngine;
pub use loans::LoanDesk;
pub use locks::KeyedLocks;
pub use memory::MemStore;
pub use mirror::AuditMirror;
pub use store::{AuditLog, GarnishmentStore, LoanStore, ProfileAggregate};

/// Both services wired to one store and one change bus.
#[derive(Clone)]
pub struct Console {
    pub garnishments: Arc<GarnishmentEngine>,
    pub loans: Arc<LoanDesk>,
    pub bus: ChangeBus,
}

impl Console {
    pub fn new<S>(store: Arc<S>, policy: OutstandingPolicy, mirror: Option<AuditMirror>) -> Self
    where
        S: GarnishmentStore + LoanStore + AuditLog + 'static,
    {
        let bus = ChangeBus::default();
        let garnishments = GarnishmentEngine::new(
            store.clone(),
            store.clone(),
            bus.clone(),
            mirror.clone(),
        );
        let loans = LoanDesk::new(store, bus.clone(), policy, mirror);
        Self {
            garnishments: Arc::new(garnishments),
            loans: Arc::new(loans),
            bus,
        }
    }

    /// Console over a fresh [`MemStore`]; the store handle is returned for
    /// seeding employees and fault injection.
    pub fn in_memory(policy: OutstandingPolicy) -> (Self, Arc<MemStore>) {
        let store = Arc::new(MemStore::new());
        (Self::new(store.clone(), policy, None), store)
    }
}
