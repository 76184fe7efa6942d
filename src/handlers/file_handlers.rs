//! HTTP handlers for uploading, listing, fetching and deleting shared files.
//! Storage concerns live in `ShareService`; these handlers only translate
//! between HTTP and the service.

use crate::{
    errors::AppError,
    models::{
        api::{DeleteResponse, FilesResponse, UploadResponse},
        file::FilePayload,
    },
    services::share_service::{SessionCheck, ShareError, ShareService},
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, warn};

const FILES_FIELD: &str = "files";
const SESSION_FIELD: &str = "sessionId";
const DEFAULT_FILE_NAME: &str = "upload.bin";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Query params accepted by `GET /files`.
#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub initial: bool,
}

/// Query params accepted by `DELETE /files`.
#[derive(Debug, Deserialize)]
pub struct DeleteFilesQuery {
    pub id: Option<String>,
}

/// `POST /files`: multipart upload of one or more `files` fields.
///
/// Each file is stored as soon as it has been read. A failure part-way
/// through leaves the earlier files in place.
pub async fn upload_files(
    State(service): State<ShareService>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut uploaded = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(upload_failed)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(SESSION_FIELD) => {
                let session_id = field.text().await.map_err(upload_failed)?;
                service.begin_upload_session(session_id.trim());
            }
            Some(FILES_FIELD) => {
                let name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(DEFAULT_FILE_NAME)
                    .to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_MIME_TYPE)
                    .to_string();
                let bytes = field.bytes().await.map_err(upload_failed)?;
                uploaded.push(service.accept_upload(&name, &mime_type, &bytes));
            }
            other => {
                tracing::debug!(field = ?other, "ignoring unknown multipart field");
            }
        }
    }

    if uploaded.is_empty() {
        return Err(ShareError::NoFiles.into());
    }

    info!(count = uploaded.len(), "files uploaded");
    Ok(Json(UploadResponse {
        message: format!("{} file(s) uploaded successfully", uploaded.len()),
        files: uploaded,
    }))
}

/// `GET /files`: current listing, running the uploader refresh check when
/// `initial=true`.
pub async fn list_files(
    State(service): State<ShareService>,
    Query(q): Query<ListFilesQuery>,
) -> Json<FilesResponse> {
    let response = match service.check_session(q.session_id.as_deref(), q.initial) {
        SessionCheck::Cleared => FilesResponse::cleared(),
        SessionCheck::Current {
            files,
            uploader_session,
        } => FilesResponse::Listing {
            files,
            uploader_session_id: uploader_session,
        },
    };
    Json(response)
}

/// `GET /files/{id}`: full record including data-URL content.
pub async fn get_file(
    State(service): State<ShareService>,
    Path(id): Path<String>,
) -> Result<Json<FilePayload>, AppError> {
    Ok(Json(service.get_payload(&id)?))
}

/// `DELETE /files?id=ID` removes one file; `DELETE /files` clears all files
/// and the uploader session.
pub async fn delete_files(
    State(service): State<ShareService>,
    Query(q): Query<DeleteFilesQuery>,
) -> Json<DeleteResponse> {
    let message = match q.id {
        Some(id) => {
            service.remove_file(&id);
            format!("file {id} removed")
        }
        None => {
            service.clear_all();
            "all files cleared".to_string()
        }
    };

    Json(DeleteResponse {
        success: true,
        message,
    })
}

fn upload_failed(err: axum::extract::multipart::MultipartError) -> ShareError {
    warn!("upload failed: {}", err);
    ShareError::Upload(err.body_text())
}
