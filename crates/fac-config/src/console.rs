//! Typed view of the merged configuration.

use anyhow::{Context, Result};
use fac_loans::OutstandingPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Name of the env var holding the connection URL. Never the URL itself.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url_env: "FAC_DATABASE_URL".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    /// Local JSONL mirror of committed audit entries. Absent: no mirror.
    pub jsonl_path: Option<String>,
    pub hash_chain: bool,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            jsonl_path: None,
            hash_chain: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoansSection {
    pub outstanding_policy: String,
}

impl Default for LoansSection {
    fn default() -> Self {
        Self {
            outstanding_policy: OutstandingPolicy::default().as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    pub bind_addr: String,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8899".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub database: DatabaseSection,
    pub audit: AuditSection,
    pub loans: LoansSection,
    pub daemon: DaemonSection,
}

impl ConsoleConfig {
    /// Missing sections and keys take their defaults; a present key with the
    /// wrong type is an error.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: ConsoleConfig =
            serde_json::from_value(config_json.clone()).context("config does not match schema")?;
        cfg.outstanding_policy()?;
        Ok(cfg)
    }

    pub fn outstanding_policy(&self) -> Result<OutstandingPolicy> {
        OutstandingPolicy::parse(&self.loans.outstanding_policy)
            .context("invalid loans.outstanding_policy")
    }
}

/// Read the database URL from the env var the config names.
pub fn resolve_database_url(cfg: &ConsoleConfig) -> Result<String> {
    let name = &cfg.database.url_env;
    let url = std::env::var(name).with_context(|| format!("missing env var {name}"))?;
    if url.trim().is_empty() {
        anyhow::bail!("env var {name} is empty");
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_takes_defaults() {
        let cfg = ConsoleConfig::from_json(&serde_json::json!({})).unwrap();
        assert_eq!(cfg.database.url_env, "FAC_DATABASE_URL");
        assert_eq!(cfg.database.max_connections, 10);
        assert!(cfg.audit.hash_chain);
        assert_eq!(cfg.audit.jsonl_path, None);
        assert_eq!(cfg.outstanding_policy().unwrap(), OutstandingPolicy::ApprovedOnly);
    }

    #[test]
    fn policy_is_validated() {
        let v = serde_json::json!({"loans": {"outstanding_policy": "everything"}});
        assert!(ConsoleConfig::from_json(&v).is_err());

        let v = serde_json::json!({"loans": {"outstanding_policy": "non_rejected"}});
        let cfg = ConsoleConfig::from_json(&v).unwrap();
        assert_eq!(cfg.outstanding_policy().unwrap(), OutstandingPolicy::NonRejected);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let v = serde_json::json!({"database": {"max_connections": "many"}});
        assert!(ConsoleConfig::from_json(&v).is_err());
    }

    #[test]
    fn missing_url_env_names_the_variable() {
        let mut cfg = ConsoleConfig::default();
        cfg.database.url_env = "FAC_TEST_URL_THAT_IS_NEVER_SET".into();
        let err = resolve_database_url(&cfg).unwrap_err();
        assert!(err.to_string().contains("FAC_TEST_URL_THAT_IS_NEVER_SET"));
    }
}
