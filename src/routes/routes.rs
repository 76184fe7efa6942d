//! Defines routes for the file-sharing API.
//!
//! ## Structure
//! - `POST   /files`          — multipart upload (`files` fields + `sessionId`)
//! - `GET    /files`          — listing; `?sessionId=S&initial=true` runs the uploader refresh check
//! - `DELETE /files`          — clear everything, or one file with `?id=ID`
//! - `GET    /files/stream`   — Server-Sent Events on every store change
//! - `GET    /files/{id}`     — full file with data-URL content
//! - `GET    /healthz`        — liveness

use crate::{
    handlers::{
        file_handlers::{delete_files, get_file, list_files, upload_files},
        health_handlers::healthz,
        stream_handlers::stream_files,
    },
    services::share_service::ShareService,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};

/// Build the router for all file-sharing routes.
///
/// The router carries shared state (`ShareService`) to all handlers. Upload
/// size is deliberately unbounded, so the default body limit is lifted.
pub fn routes() -> Router<ShareService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/files",
            get(list_files).post(upload_files).delete(delete_files),
        )
        .route("/files/stream", get(stream_files))
        .route("/files/{id}", get(get_file))
        .layer(DefaultBodyLimit::disable())
}
