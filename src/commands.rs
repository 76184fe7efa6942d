//! Client-side subcommands: `watch` follows a server as a viewer, `upload`
//! shares local files as the uploader.

use crate::{
    services::{
        data_url::DecodedContent,
        id_gen::{IdGenerator, UuidGenerator},
    },
    sync::{
        cache::CachedFile,
        client::ApiClient,
        reconcile::VisibleFiles,
        source::FileSource,
        viewer::{self, ViewerConfig},
    },
};
use anyhow::{Context, Result};
use reqwest::Url;
use std::path::PathBuf;
use tracing::{info, warn};

const PREVIEW_CHARS: usize = 60;

fn connect(server: &str) -> Result<ApiClient> {
    let remote =
        Url::parse(server).with_context(|| format!("parsing server URL `{}`", server))?;
    Ok(ApiClient::new(&remote)?)
}

/// Run a viewer until ctrl-c, logging the visible list on every change.
pub async fn run_watch(server: &str, config: ViewerConfig) -> Result<()> {
    let client = connect(server)?;
    info!(
        "Watching {} every {:?}",
        client.base_url(),
        config.poll_interval
    );

    let handle = viewer::start(client, config);
    info!(session = handle.session_id(), "viewer started");

    let mut files = handle.subscribe();
    loop {
        tokio::select! {
            changed = files.changed() => {
                if changed.is_err() {
                    break;
                }
                log_visible(&files.borrow_and_update());
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                info!("Received shutdown signal");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Upload `files` under `session_id` (random when absent).
pub async fn run_upload(
    server: &str,
    session_id: Option<String>,
    replace: bool,
    files: &[PathBuf],
) -> Result<()> {
    let client = connect(server)?;
    let session_id = session_id.unwrap_or_else(|| UuidGenerator.next_id());

    if replace {
        client
            .clear()
            .await
            .context("clearing previously shared files")?;
        info!("Cleared previously shared files on {}", client.base_url());
    }

    // A new uploader session invalidates whatever the previous one shared.
    let status = client
        .check_session(&session_id)
        .await
        .context("checking uploader session")?;
    if status.is_cleared() {
        info!(session = %session_id, "previous uploader session's files were cleared");
    }

    let response = client
        .upload(&session_id, files)
        .await
        .with_context(|| format!("uploading to {}", client.base_url()))?;
    info!(session = %session_id, "{}", response.message);

    println!("session {}", session_id);
    for file in &response.files {
        println!(
            "{}\t{}\t{} bytes\t{}",
            file.id, file.name, file.size, file.mime_type
        );
    }
    Ok(())
}

fn log_visible(files: &VisibleFiles) {
    info!(count = files.len(), "shared files updated");
    for file in files {
        if file.placeholder {
            warn!(id = file.id(), name = %file.metadata.name, "content unavailable");
        } else if let Some(handle) = &file.handle {
            info!(id = file.id(), path = %handle.path().display(), "{}", describe(file));
        } else {
            info!(id = file.id(), "{}", describe(file));
        }
    }
}

/// One-line summary of a cached file for the log.
fn describe(file: &CachedFile) -> String {
    let meta = &file.metadata;
    let preview = match &file.content {
        content if content.is_empty() => "<empty>".to_string(),
        DecodedContent::Text(text) => {
            let mut preview: String = text
                .chars()
                .take(PREVIEW_CHARS)
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect();
            if text.chars().count() > PREVIEW_CHARS {
                preview.push_str("...");
            }
            format!("\"{}\"", preview)
        }
        DecodedContent::Binary(bytes) => format!("<{} bytes binary>", bytes.len()),
    };
    format!("{} ({}, {} bytes): {}", meta.name, meta.mime_type, meta.size, preview)
}
