//! `capture-cli` entry point. `spec.md` §4.7: `db migrate`, `db status`,
//! and `serve` (ingress + both dispatcher loops, until Ctrl-C), in the
//! shape of the teacher's `mqk-cli` subcommand tree.

mod fs_uploader;

use std::path::PathBuf;

use anyhow::Context;
use capture_config::CoreConfig;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "capture-cli")]
#[command(about = "Capture-session lifecycle and job-coordination CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands.
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },
    /// Run the ingress adapter and both background dispatchers until Ctrl-C.
    Serve {
        /// Local directory backing the stand-in blob store uploader.
        #[arg(long, default_value = "./capture-blobs")]
        blob_root: PathBuf,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = capture_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = capture_db::status(&pool).await?;
                    println!("db_ok={} has_capture_session_table={}", s.ok, s.has_capture_session_table);
                }
                DbCmd::Migrate => {
                    capture_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }
        Commands::Serve { blob_root } => serve(blob_root).await?,
    }

    Ok(())
}

/// Wires C2-C6: one pool shared by the ingress adapter and both dispatcher
/// loops, run concurrently until Ctrl-C.
async fn serve(blob_root: PathBuf) -> anyhow::Result<()> {
    let config = CoreConfig::from_env();
    let database_url = config
        .require_database_url()
        .context("serve requires DATABASE_URL; the core is disabled without persistence")?;

    let pool = capture_db::connect(database_url).await?;
    capture_db::migrate(&pool).await?;

    let ingress_config = capture_ingress::config::IngressConfig::from_env()
        .context("serve requires TELEGRAM_BOT_TOKEN")?;

    let cancel = CancellationToken::new();

    let session_loop = tokio::spawn(capture_dispatch::run_session_claim_loop(
        pool.clone(),
        config.sessions,
        cancel.clone(),
    ));

    let notification_pool = pool.clone();
    let notification_cancel = cancel.clone();
    let notification_loop = tokio::spawn(async move {
        capture_dispatch::run_notification_loop(
            notification_pool,
            config.notifications,
            notification_cancel,
            |notification| async move {
                // The external chat-API client lives outside this core;
                // logging the delivery attempt is the only thing the core
                // itself is responsible for here.
                info!(notification_id = %notification.id, user_id = notification.user_id, "would deliver notification");
                Ok(())
            },
        )
        .await;
    });

    let uploader = fs_uploader::FilesystemUploader::new(blob_root);
    let ingress_pool = pool.clone();
    let ingress_cancel = cancel.clone();
    let ingress_task = tokio::spawn(async move {
        tokio::select! {
            result = capture_ingress::bot::run(ingress_pool, ingress_config, uploader) => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "ingress adapter exited with error");
                }
            }
            _ = ingress_cancel.cancelled() => {}
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, cancelling background loops");
    cancel.cancel();

    let _ = tokio::join!(session_loop, notification_loop, ingress_task);

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
