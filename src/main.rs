use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod sync;

use config::{AppConfig, Command};
use services::{file_store::FileStore, share_service::ShareService};
use sync::viewer::ViewerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + subcommand ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    match command {
        Command::Serve => serve(cfg).await,
        Command::Watch {
            server,
            interval_ms,
            session_id,
            mirror_dir,
        } => {
            if let Some(dir) = &mirror_dir {
                tokio::fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("creating mirror directory {}", dir.display()))?;
            }
            let config = ViewerConfig {
                poll_interval: Duration::from_millis(interval_ms),
                session_id,
                mirror_dir,
            };
            commands::run_watch(&server, config).await
        }
        Command::Upload {
            server,
            session_id,
            replace,
            files,
        } => commands::run_upload(&server, session_id, replace, &files).await,
    }
}

async fn serve(cfg: AppConfig) -> Result<()> {
    tracing::info!("Starting share server with config: {:?}", cfg);

    // --- Initialize store + audit listener ---
    let store = FileStore::new();
    let audit = store.add_listener(|files| {
        let total: u64 = files.iter().map(|file| file.size).sum();
        tracing::info!(count = files.len(), bytes = total, "shared file set changed");
        Ok(())
    });

    // --- Build router ---
    let service = ShareService::new(store);
    let app: Router = routes::routes::routes().with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal");
            }
        })
        .await?;

    audit.unsubscribe();
    Ok(())
}
