//! JSON envelopes exchanged between the HTTP API and viewer clients.

use crate::models::file::FileMetadata;
use serde::{Deserialize, Serialize};

/// Response to `POST /files`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UploadResponse {
    pub files: Vec<FileMetadata>,
    pub message: String,
}

/// Response to `GET /files` and the polling form of `GET /files/stream`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum FilesResponse {
    /// The initial session check found a restarted uploader.
    Cleared {
        files: Vec<FileMetadata>,
        cleared: bool,
    },
    Listing {
        files: Vec<FileMetadata>,
        #[serde(rename = "uploaderSessionId")]
        uploader_session_id: Option<String>,
    },
}

impl FilesResponse {
    pub fn cleared() -> Self {
        FilesResponse::Cleared {
            files: Vec::new(),
            cleared: true,
        }
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, FilesResponse::Cleared { cleared: true, .. })
    }

    pub fn into_files(self) -> Vec<FileMetadata> {
        match self {
            FilesResponse::Cleared { files, .. } | FilesResponse::Listing { files, .. } => files,
        }
    }
}

/// Payload of each server-sent event on `GET /files/stream`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FilesEvent {
    pub files: Vec<FileMetadata>,
}

/// Response to `DELETE /files`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}
