use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::FinanceError;

/// Roles handed out by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only.
    Viewer,
    /// May record and edit garnishment and loan data.
    Editor,
    /// Editor plus the manager approval step.
    Manager,
    /// Everything, including the final approval step.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self, FinanceError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(FinanceError::validation(format!("unknown role: {other}"))),
        }
    }

    pub fn can_edit(&self) -> bool {
        !matches!(self, Role::Viewer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The acting user, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }

    /// Gate for every mutating operation.
    pub fn require_edit(&self) -> Result<(), FinanceError> {
        if self.role.can_edit() {
            Ok(())
        } else {
            Err(FinanceError::Forbidden(format!(
                "{} ({}) may not modify records",
                self.name, self.role
            )))
        }
    }

    /// Gate for an explicit role set (approval steps).
    pub fn require_any(&self, roles: &[Role], action: &str) -> Result<(), FinanceError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(FinanceError::Forbidden(format!(
                "{} ({}) may not {action}",
                self.name, self.role
            )))
        }
    }
}
