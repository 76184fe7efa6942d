//! Represents a shared file and its wire projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single file currently shared by the uploader.
///
/// Records are immutable once added to the store; the store hands them out
/// behind an `Arc` so snapshots never copy content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// Opaque identifier generated at upload time.
    pub id: String,

    /// Original filename as supplied by the uploader.
    pub name: String,

    /// Size of the decoded content in bytes.
    pub size: u64,

    /// MIME type reported by the uploader.
    pub mime_type: String,

    /// Content encoded as a data URL (see `services::data_url`).
    pub content: String,

    /// When the file was accepted by the server.
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            id: self.id.clone(),
            name: self.name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
            uploaded_at: self.uploaded_at,
        }
    }

    pub fn payload(&self) -> FilePayload {
        FilePayload {
            id: self.id.clone(),
            name: self.name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
            data: self.content.clone(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Listing entry: everything about a file except its content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Full file body returned by `GET /files/{id}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Data-URL encoded content.
    pub data: String,
    pub uploaded_at: DateTime<Utc>,
}
