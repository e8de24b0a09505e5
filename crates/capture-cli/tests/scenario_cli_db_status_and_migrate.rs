//! `capture-cli db migrate` / `db status` against a real database.
//!
//! This test is DB-backed and is skipped if `DATABASE_URL` is not set.

#[tokio::test]
async fn cli_migrate_then_status_reports_the_capture_session_table() -> anyhow::Result<()> {
    let url = match std::env::var(capture_db::ENV_DATABASE_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: {} not set", capture_db::ENV_DATABASE_URL);
            return Ok(());
        }
    };

    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("SKIP: cannot connect to DB: {e}");
            return Ok(());
        }
    };

    let mut migrate_cmd = assert_cmd::Command::cargo_bin("capture-cli")?;
    migrate_cmd
        .env(capture_db::ENV_DATABASE_URL, &url)
        .args(["db", "migrate"]);
    migrate_cmd
        .assert()
        .success()
        .stdout(predicates::str::contains("migrations_applied=true"));

    let mut status_cmd = assert_cmd::Command::cargo_bin("capture-cli")?;
    status_cmd
        .env(capture_db::ENV_DATABASE_URL, &url)
        .args(["db", "status"]);
    status_cmd
        .assert()
        .success()
        .stdout(predicates::str::contains("db_ok=true"))
        .stdout(predicates::str::contains("has_capture_session_table=true"));

    let status = capture_db::status(&pool).await?;
    assert!(status.ok);
    assert!(status.has_capture_session_table);

    Ok(())
}
