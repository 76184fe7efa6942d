//! ShareService — request-facing operations over the shared `FileStore`.
//!
//! Handlers receive this as axum state. It owns the id generator used for
//! new uploads, encodes accepted bytes through the data-URL codec, and
//! implements the uploader-session check performed by a client's first
//! status request.

use crate::{
    models::file::{FileMetadata, FilePayload, FileRecord},
    services::{
        data_url,
        file_store::FileStore,
        id_gen::{IdGenerator, UuidGenerator},
    },
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("no files provided")]
    NoFiles,
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("file `{0}` not found")]
    FileNotFound(String),
}

pub type ShareResult<T> = Result<T, ShareError>;

/// Outcome of a session status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// The uploader restarted; every shared file was dropped.
    Cleared,
    /// Nothing was invalidated.
    Current {
        files: Vec<FileMetadata>,
        uploader_session: Option<String>,
    },
}

#[derive(Clone)]
pub struct ShareService {
    store: FileStore,
    ids: Arc<dyn IdGenerator>,
}

impl ShareService {
    pub fn new(store: FileStore) -> Self {
        Self::with_id_generator(store, Arc::new(UuidGenerator))
    }

    pub fn with_id_generator(store: FileStore, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, ids }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Store one uploaded file and return its listing entry.
    ///
    /// Content is never validated: any bytes of any type are accepted.
    pub fn accept_upload(&self, name: &str, mime_type: &str, bytes: &[u8]) -> FileMetadata {
        let record = FileRecord {
            id: self.ids.next_id(),
            name: name.to_string(),
            size: bytes.len() as u64,
            mime_type: mime_type.to_string(),
            content: data_url::encode(bytes, mime_type),
            uploaded_at: Utc::now(),
        };
        let metadata = record.metadata();
        self.store.add_file(record);
        metadata
    }

    /// Mark `session_id` as the current uploader.
    pub fn begin_upload_session(&self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }
        self.store.set_uploader_session(session_id);
    }

    /// Status check used by polling clients.
    ///
    /// Only the `initial` request of a client runs the refresh rule; later
    /// polls just report the current listing.
    pub fn check_session(&self, session_id: Option<&str>, initial: bool) -> SessionCheck {
        if let (true, Some(candidate)) = (initial, session_id) {
            if self.store.clear_if_uploader_refreshed(candidate) {
                info!(session = candidate, "initial check invalidated shared files");
                return SessionCheck::Cleared;
            }
        }

        SessionCheck::Current {
            files: self.list_files(),
            uploader_session: self.store.uploader_session(),
        }
    }

    pub fn list_files(&self) -> Vec<FileMetadata> {
        self.store
            .get_all_files()
            .iter()
            .map(|record| record.metadata())
            .collect()
    }

    pub fn get_payload(&self, id: &str) -> ShareResult<FilePayload> {
        self.store
            .get_file(id)
            .map(|record| record.payload())
            .ok_or_else(|| ShareError::FileNotFound(id.to_string()))
    }

    pub fn remove_file(&self, id: &str) {
        self.store.remove_file(id);
    }

    pub fn clear_all(&self) {
        self.store.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::id_gen::SequentialIds;

    fn service() -> ShareService {
        ShareService::with_id_generator(FileStore::new(), Arc::new(SequentialIds::new("f")))
    }

    #[test]
    fn accepted_upload_is_encoded_and_listed() {
        let service = service();
        let meta = service.accept_upload("a.txt", "text/plain", b"hello");
        assert_eq!(meta.id, "f-1");
        assert_eq!(meta.size, 5);

        let payload = service.get_payload("f-1").unwrap();
        assert_eq!(payload.data, "data:text/plain;base64,aGVsbG8=");
        assert_eq!(service.list_files(), vec![meta]);
    }

    #[test]
    fn missing_payload_is_not_found() {
        assert!(matches!(
            service().get_payload("nope"),
            Err(ShareError::FileNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn empty_session_id_is_ignored() {
        let service = service();
        service.begin_upload_session("");
        assert_eq!(service.store().uploader_session(), None);
    }

    #[test]
    fn same_uploader_session_keeps_files() {
        let service = service();
        service.begin_upload_session("s1");
        service.accept_upload("a.txt", "text/plain", b"hello");

        match service.check_session(Some("s1"), true) {
            SessionCheck::Current {
                files,
                uploader_session,
            } => {
                assert_eq!(files.len(), 1);
                assert_eq!(uploader_session.as_deref(), Some("s1"));
            }
            SessionCheck::Cleared => panic!("same session must not clear"),
        }
    }

    #[test]
    fn new_uploader_session_clears_on_initial_check() {
        let service = service();
        service.begin_upload_session("s1");
        service.accept_upload("a.txt", "text/plain", b"hello");

        assert_eq!(service.check_session(Some("s2"), true), SessionCheck::Cleared);
        assert!(service.list_files().is_empty());
        assert_eq!(service.store().uploader_session(), None);
    }

    #[test]
    fn non_initial_poll_never_clears() {
        let service = service();
        service.begin_upload_session("s1");
        service.accept_upload("a.txt", "text/plain", b"hello");

        assert!(matches!(
            service.check_session(Some("s2"), false),
            SessionCheck::Current { ref files, .. } if files.len() == 1
        ));
    }
}
