//! fac-db
//!
//! Postgres persistence for the reconciliation core: connection helpers,
//! embedded migrations and [`PgStore`], the `sqlx` implementation of the
//! engine's store seams.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

mod errors;
mod rows;
mod store;

pub use errors::{classify, is_check_violation, is_unique_constraint_violation};
pub use sqlx::PgPool;
pub use store::PgStore;

pub const ENV_DB_URL: &str = "FAC_DATABASE_URL";

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connect to Postgres using FAC_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, DEFAULT_MAX_CONNECTIONS).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='garnishment_profiles'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_profiles_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_profiles_table: bool,
}

/// Register an employee (or refresh name/active flag). The employee registry
/// belongs to the wider console; this exists for seeding and tests.
pub async fn upsert_employee(pool: &PgPool, employee: &fac_schemas::Employee) -> Result<()> {
    sqlx::query(
        r#"
        insert into employees (id, full_name, active)
        values ($1, $2, $3)
        on conflict (id) do update
          set full_name = excluded.full_name,
              active = excluded.active
        "#,
    )
    .bind(employee.id)
    .bind(&employee.full_name)
    .bind(employee.active)
    .execute(pool)
    .await
    .context("upsert_employee failed")?;
    Ok(())
}
