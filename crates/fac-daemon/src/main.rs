//! fac-daemon entry point.
//!
//! Thin: loads config, picks the store, wires middleware and serves. Route
//! handlers live in `routes.rs`; shared state in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use fac_audit::AuditWriter;
use fac_config::{
    load_layered_yaml, report_unused_keys, resolve_database_url, ConsoleConfig, Consumer,
    UnusedKeyPolicy,
};
use fac_daemon::{routes, state};
use fac_db::PgStore;
use fac_engine::{AuditMirror, Console};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_CONFIG_PATHS: &str = "FAC_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/console.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = std::env::var(ENV_CONFIG_PATHS).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let paths: Vec<&str> = paths.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    let loaded = load_layered_yaml(&paths)?;
    let report = report_unused_keys(Consumer::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "config has keys the daemon never reads");
    }
    let cfg = ConsoleConfig::from_json(&loaded.config_json)?;
    let policy = cfg.outstanding_policy()?;

    let mirror = match &cfg.audit.jsonl_path {
        Some(path) => Some(AuditMirror::new(
            AuditWriter::open(path, cfg.audit.hash_chain)
                .with_context(|| format!("open audit mirror {path}"))?,
        )),
        None => None,
    };

    let app_state = match resolve_database_url(&cfg) {
        Ok(url) => {
            let pool = fac_db::connect(&url, cfg.database.max_connections).await?;
            fac_db::migrate(&pool).await?;
            let console = Console::new(Arc::new(PgStore::new(pool)), policy, mirror);
            state::AppState::new(console, "postgres")
        }
        Err(e) => {
            warn!("{e:#}; falling back to the in-memory store (data is not persisted)");
            let console = Console::new(Arc::new(fac_engine::MemStore::new()), policy, mirror);
            state::AppState::new(console, "memory")
        }
    };
    let shared = Arc::new(app_state.with_config_hash(loaded.config_hash.clone()));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(5));
    state::spawn_change_relay(&shared);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr: SocketAddr = match std::env::var("FAC_DAEMON_ADDR") {
        Ok(v) => v.parse().context("FAC_DAEMON_ADDR is not a socket address")?,
        Err(_) => cfg
            .daemon
            .bind_addr
            .parse()
            .context("daemon.bind_addr is not a socket address")?,
    };
    info!(
        config_hash = %loaded.config_hash,
        store = shared.store_kind,
        policy = %policy,
        "fac-daemon listening on http://{}",
        addr
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
