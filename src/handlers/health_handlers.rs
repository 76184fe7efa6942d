//! Health handler.
//!
//! - GET /healthz -> liveness plus the number of files currently shared and
//!   the number of store listeners (open event streams included)

use crate::services::share_service::ShareService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// `GET /healthz`
///
/// Always returns 200 OK. Reading the file count only takes the store lock
/// briefly and performs no I/O.
pub async fn healthz(State(service): State<ShareService>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
            files: service.store().file_count(),
            listeners: service.store().listener_count(),
        }),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    files: usize,
    listeners: usize,
}
