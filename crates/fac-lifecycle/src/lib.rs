//! Status Transition Guard.
//!
//! # Design
//!
//! One static table lists every legal `(entity, from, to)` edge. Every
//! status change in the workspace (profile status, withdrawal approval,
//! request approval) is checked against it through [`authorize_transition`].
//! A disallowed move returns
//! `FinanceError::InvalidStateTransition`; callers must not mutate anything
//! in that case.
//!
//! ```text
//! Obligation profile:
//!
//!    active ◄────► suspended
//!       │              │
//!       └──► completed ◄┘        (terminal)
//!
//! Loan withdrawal / loan request:
//!
//!    pending ──► approved_manager ──► approved_admin   (terminal)
//!       │
//!       └──► rejected                                  (terminal)
//! ```
//!
//! Self-edges (`active -> active`) are not transitions and are rejected.

use fac_schemas::{EntityKind, FinanceError, Principal, Role};

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

const PROFILE: EntityKind = EntityKind::ObligationProfile;
const WITHDRAWAL: EntityKind = EntityKind::LoanWithdrawal;
const REQUEST: EntityKind = EntityKind::LoanRequest;

const EDITORS: &[Role] = &[Role::Editor, Role::Manager, Role::Admin];
const MANAGERS: &[Role] = &[Role::Manager, Role::Admin];
const ADMINS: &[Role] = &[Role::Admin];

/// A legal edge and the roles allowed to take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub entity: EntityKind,
    pub from: &'static str,
    pub to: &'static str,
    pub roles: &'static [Role],
}

const fn edge(
    entity: EntityKind,
    from: &'static str,
    to: &'static str,
    roles: &'static [Role],
) -> Edge {
    Edge {
        entity,
        from,
        to,
        roles,
    }
}

static TRANSITIONS: &[Edge] = &[
    // Garnishment profile
    edge(PROFILE, "active", "suspended", EDITORS),
    edge(PROFILE, "suspended", "active", EDITORS),
    edge(PROFILE, "active", "completed", EDITORS),
    edge(PROFILE, "suspended", "completed", EDITORS),
    // Loan withdrawal approval chain
    edge(WITHDRAWAL, "pending", "approved_manager", MANAGERS),
    edge(WITHDRAWAL, "approved_manager", "approved_admin", ADMINS),
    edge(WITHDRAWAL, "pending", "rejected", MANAGERS),
    // Loan request approval chain
    edge(REQUEST, "pending", "approved_manager", MANAGERS),
    edge(REQUEST, "approved_manager", "approved_admin", ADMINS),
    edge(REQUEST, "pending", "rejected", MANAGERS),
];

fn find_edge(entity: EntityKind, from: &str, to: &str) -> Option<&'static Edge> {
    TRANSITIONS
        .iter()
        .find(|e| e.entity == entity && e.from == from && e.to == to)
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Pure table lookup over canonical state strings.
pub fn can_transition(entity: EntityKind, from: &str, to: &str) -> bool {
    find_edge(entity, from, to).is_some()
}

/// States reachable in one step from `from`.
pub fn allowed_targets(entity: EntityKind, from: &str) -> Vec<&'static str> {
    TRANSITIONS
        .iter()
        .filter(|e| e.entity == entity && e.from == from)
        .map(|e| e.to)
        .collect()
}

/// `true` if no edge leaves `state`.
pub fn is_terminal(entity: EntityKind, state: &str) -> bool {
    allowed_targets(entity, state).is_empty()
}

/// Checked lookup. Returns the edge so callers can apply its role gate.
pub fn ensure_transition(
    entity: EntityKind,
    from: &str,
    to: &str,
) -> Result<&'static Edge, FinanceError> {
    find_edge(entity, from, to).ok_or_else(|| FinanceError::transition(entity, from, to))
}

/// Checked lookup plus the role gate for the acting principal.
///
/// The transition check runs first: an illegal move is reported as
/// `InvalidStateTransition` regardless of who asked.
pub fn authorize_transition(
    principal: &Principal,
    entity: EntityKind,
    from: &str,
    to: &str,
) -> Result<(), FinanceError> {
    let edge = ensure_transition(entity, from, to)?;
    principal.require_any(edge.roles, &format!("move a {entity} to '{to}'"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
