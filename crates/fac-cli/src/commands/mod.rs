//! Command handler modules for fac-cli.
//!
//! Shared wiring (config, pool, console) lives here; command-specific logic
//! lives in the submodules.

pub mod audit;
pub mod config;
pub mod ledger;

use std::sync::Arc;

use anyhow::Result;
use fac_config::{
    load_layered_yaml, report_unused_keys, resolve_database_url, ConsoleConfig, Consumer,
    UnusedKeyPolicy,
};
use fac_db::{PgPool, PgStore};
use fac_engine::Console;
use tracing::warn;

/// Logs go to stderr so stdout stays machine-readable `key=value` lines.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

/// Merged config from `--config` layers, or defaults when none were given.
pub fn load_config(paths: &[String]) -> Result<ConsoleConfig> {
    if paths.is_empty() {
        return Ok(ConsoleConfig::default());
    }
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&refs)?;
    let report = report_unused_keys(Consumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "config has keys the cli never reads");
    }
    ConsoleConfig::from_json(&loaded.config_json)
}

pub async fn connect(cfg: &ConsoleConfig) -> Result<PgPool> {
    let url = resolve_database_url(cfg)?;
    fac_db::connect(&url, cfg.database.max_connections).await
}

/// Console over Postgres. Read-only commands never touch the audit mirror.
pub async fn console(config_paths: &[String]) -> Result<Console> {
    let cfg = load_config(config_paths)?;
    let policy = cfg.outstanding_policy()?;
    let pool = connect(&cfg).await?;
    Ok(Console::new(Arc::new(PgStore::new(pool)), policy, None))
}
