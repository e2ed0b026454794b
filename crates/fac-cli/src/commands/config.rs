use anyhow::Result;
use fac_config::{load_layered_yaml, report_unused_keys, Consumer, UnusedKeyPolicy};

/// Print `config_hash=...` then the canonical JSON. `strict` fails on any key
/// the daemon never reads.
pub fn hash(paths: &[String], strict: bool) -> Result<()> {
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&refs)?;

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(Consumer::Daemon, &loaded.config_json, policy)?;

    println!("config_hash={}", loaded.config_hash);
    if !report.is_clean() {
        println!("unused_keys={}", report.unused_leaf_pointers.join(","));
    }
    println!("{}", loaded.canonical_json);
    Ok(())
}
