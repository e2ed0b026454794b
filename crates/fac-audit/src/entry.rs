use std::fmt;

use chrono::{DateTime, Utc};
use fac_schemas::{EntityKind, FinanceError, FinanceResult, Principal};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Bookkeeping columns that move on every write. Never reported as changes.
const BOOKKEEPING_KEYS: &[&str] = &["updated_at", "version"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Insert,
    Update,
    StatusChange,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Insert => "insert",
            AuditAction::Update => "update",
            AuditAction::StatusChange => "status_change",
            AuditAction::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(AuditAction::Insert),
            "update" => Some(AuditAction::Update),
            "status_change" => Some(AuditAction::StatusChange),
            "delete" => Some(AuditAction::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit row.
///
/// `old_values` / `new_values` are JSON objects holding only the fields that
/// changed (inserts carry the full record in `new_values`, deletes carry it in
/// `old_values`). The absent side is `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: Uuid,
    pub old_values: Value,
    pub new_values: Value,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    fn new(
        action: AuditAction,
        entity: EntityKind,
        record_id: Uuid,
        old_values: Value,
        new_values: Value,
        actor: &Principal,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            table_name: entity.table_name().to_string(),
            record_id,
            old_values,
            new_values,
            actor_id: actor.id,
            actor_name: actor.name.clone(),
            timestamp: at,
        }
    }

    pub fn insert<T: Serialize>(
        entity: EntityKind,
        record_id: Uuid,
        record: &T,
        actor: &Principal,
        at: DateTime<Utc>,
    ) -> FinanceResult<Self> {
        let new_values = snapshot(record)?;
        Ok(Self::new(
            AuditAction::Insert,
            entity,
            record_id,
            Value::Null,
            new_values,
            actor,
            at,
        ))
    }

    /// `None` when nothing but bookkeeping columns changed.
    pub fn update<T: Serialize>(
        entity: EntityKind,
        record_id: Uuid,
        before: &T,
        after: &T,
        actor: &Principal,
        at: DateTime<Utc>,
    ) -> FinanceResult<Option<Self>> {
        let (old_values, new_values) = changed_fields(&snapshot(before)?, &snapshot(after)?);
        if old_values.is_empty() && new_values.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::new(
            AuditAction::Update,
            entity,
            record_id,
            Value::Object(old_values),
            Value::Object(new_values),
            actor,
            at,
        )))
    }

    pub fn status_change(
        entity: EntityKind,
        record_id: Uuid,
        from: &str,
        to: &str,
        actor: &Principal,
        at: DateTime<Utc>,
    ) -> Self {
        let mut old_values = Map::new();
        old_values.insert("status".into(), Value::String(from.to_string()));
        let mut new_values = Map::new();
        new_values.insert("status".into(), Value::String(to.to_string()));
        Self::new(
            AuditAction::StatusChange,
            entity,
            record_id,
            Value::Object(old_values),
            Value::Object(new_values),
            actor,
            at,
        )
    }

    pub fn delete<T: Serialize>(
        entity: EntityKind,
        record_id: Uuid,
        record: &T,
        actor: &Principal,
        at: DateTime<Utc>,
    ) -> FinanceResult<Self> {
        let old_values = snapshot(record)?;
        Ok(Self::new(
            AuditAction::Delete,
            entity,
            record_id,
            old_values,
            Value::Null,
            actor,
            at,
        ))
    }

    pub fn entity(&self) -> Option<EntityKind> {
        EntityKind::from_table_name(&self.table_name)
    }
}

/// Serialize a record to a JSON object.
pub fn snapshot<T: Serialize>(record: &T) -> FinanceResult<Value> {
    serde_json::to_value(record)
        .map_err(|e| FinanceError::validation(format!("record is not representable as JSON: {e}")))
}

/// Old/new maps of the keys whose values differ between two JSON objects.
///
/// A key present on one side only is reported with `null` on the other.
/// Non-object inputs are treated as empty objects.
pub fn changed_fields(old: &Value, new: &Value) -> (Map<String, Value>, Map<String, Value>) {
    let empty = Map::new();
    let old_map = old.as_object().unwrap_or(&empty);
    let new_map = new.as_object().unwrap_or(&empty);

    let mut old_out = Map::new();
    let mut new_out = Map::new();

    let keys = old_map.keys().chain(new_map.keys().filter(|k| !old_map.contains_key(*k)));
    for key in keys {
        if BOOKKEEPING_KEYS.contains(&key.as_str()) {
            continue;
        }
        let before = old_map.get(key).unwrap_or(&Value::Null);
        let after = new_map.get(key).unwrap_or(&Value::Null);
        if before != after {
            old_out.insert(key.clone(), before.clone());
            new_out.insert(key.clone(), after.clone());
        }
    }

    (old_out, new_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fac_schemas::Role;
    use serde_json::json;

    fn actor() -> Principal {
        Principal::new(Uuid::new_v4(), "clerk", Role::Editor)
    }

    #[test]
    fn changed_fields_only_reports_differences() {
        let old = json!({"amount": "300.00", "notes": null, "check_number": "C-1"});
        let new = json!({"amount": "250.00", "notes": null, "check_number": "C-1"});
        let (o, n) = changed_fields(&old, &new);
        assert_eq!(Value::Object(o), json!({"amount": "300.00"}));
        assert_eq!(Value::Object(n), json!({"amount": "250.00"}));
    }

    #[test]
    fn changed_fields_ignores_bookkeeping() {
        let old = json!({"amount": "1.00", "version": 3, "updated_at": "a"});
        let new = json!({"amount": "1.00", "version": 4, "updated_at": "b"});
        let (o, n) = changed_fields(&old, &new);
        assert!(o.is_empty());
        assert!(n.is_empty());
    }

    #[test]
    fn one_sided_keys_are_paired_with_null() {
        let (o, n) = changed_fields(&json!({"a": 1}), &json!({"b": 2}));
        assert_eq!(Value::Object(o), json!({"a": 1, "b": null}));
        assert_eq!(Value::Object(n), json!({"a": null, "b": 2}));
    }

    #[test]
    fn update_without_changes_yields_none() {
        let rec = json!({"x": 1, "version": 1});
        let rec2 = json!({"x": 1, "version": 2});
        let out = AuditEntry::update(
            EntityKind::Installment,
            Uuid::new_v4(),
            &rec,
            &rec2,
            &actor(),
            Utc::now(),
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn status_change_records_both_sides() {
        let e = AuditEntry::status_change(
            EntityKind::ObligationProfile,
            Uuid::new_v4(),
            "active",
            "suspended",
            &actor(),
            Utc::now(),
        );
        assert_eq!(e.action, AuditAction::StatusChange);
        assert_eq!(e.table_name, "garnishment_profiles");
        assert_eq!(e.old_values, json!({"status": "active"}));
        assert_eq!(e.new_values, json!({"status": "suspended"}));
        assert_eq!(e.entity(), Some(EntityKind::ObligationProfile));
    }

    #[test]
    fn action_strings_round_trip() {
        for a in [
            AuditAction::Insert,
            AuditAction::Update,
            AuditAction::StatusChange,
            AuditAction::Delete,
        ] {
            assert_eq!(AuditAction::parse(a.as_str()), Some(a));
        }
    }
}
