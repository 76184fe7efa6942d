//! Where a viewer gets its data from.

use crate::{
    models::{
        api::FilesResponse,
        file::{FileMetadata, FilePayload},
    },
    sync::error::SyncError,
};
use std::{future::Future, sync::Arc};

/// Read-side view of the share server, as seen by a viewer.
///
/// `ApiClient` implements this over HTTP; tests implement it in memory.
pub trait FileSource: Send + Sync {
    /// First status request of a client lifetime. The server clears all
    /// files when `session_id` reveals a restarted uploader.
    fn check_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<FilesResponse, SyncError>> + Send;

    /// Current metadata snapshot.
    fn list_files(&self) -> impl Future<Output = Result<Vec<FileMetadata>, SyncError>> + Send;

    /// Full content for one file.
    fn fetch_file(&self, id: &str) -> impl Future<Output = Result<FilePayload, SyncError>> + Send;
}

impl<S: FileSource> FileSource for Arc<S> {
    fn check_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<FilesResponse, SyncError>> + Send {
        (**self).check_session(session_id)
    }

    fn list_files(&self) -> impl Future<Output = Result<Vec<FileMetadata>, SyncError>> + Send {
        (**self).list_files()
    }

    fn fetch_file(&self, id: &str) -> impl Future<Output = Result<FilePayload, SyncError>> + Send {
        (**self).fetch_file(id)
    }
}
