//! Repository layer over the single Postgres store shared by every
//! component in `spec.md` §2 (C2 through C6).
//!
//! Each module below is a flat set of `async fn(&PgPool, ...) ->
//! Result<T, CaptureError>` free functions, mirroring the teacher's
//! `mqk-db` crate rather than a repository trait/object. Row decoding goes
//! through `sqlx::query` + `row.try_get`, not the compile-time `query_as!`
//! macros, since there is no live database at build time here.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod image;
pub mod notification;
pub mod session;

pub use capture_schemas::CaptureError;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Connect using `DATABASE_URL` from the process environment.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DATABASE_URL)
        .with_context(|| format!("missing env var {ENV_DATABASE_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Connectivity + schema presence, for the CLI's `db status` command.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'capture_session'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_capture_session_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_capture_session_table: bool,
}
