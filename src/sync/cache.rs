//! Hydrated files held by a viewer.

use crate::{models::file::FileMetadata, services::data_url::DecodedContent};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file the viewer created locally for one cached entry.
///
/// Dropping the handle deletes the file, so eviction, session clears and
/// teardown all release it without extra bookkeeping.
#[derive(Debug)]
pub struct ContentHandle {
    path: PathBuf,
}

impl ContentHandle {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ContentHandle {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released content handle"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), "could not release content handle: {err}"),
        }
    }
}

/// One entry of a viewer's local cache.
#[derive(Debug)]
pub struct CachedFile {
    pub metadata: FileMetadata,
    pub content: DecodedContent,
    /// Set when content could not be fetched; the entry is shown with empty
    /// content and fetched again on the next reconcile.
    pub placeholder: bool,
    pub handle: Option<ContentHandle>,
}

impl CachedFile {
    pub fn hydrated(
        metadata: FileMetadata,
        content: DecodedContent,
        handle: Option<ContentHandle>,
    ) -> Self {
        Self {
            metadata,
            content,
            placeholder: false,
            handle,
        }
    }

    pub fn placeholder(metadata: FileMetadata) -> Self {
        Self {
            metadata,
            content: DecodedContent::Binary(Vec::new()),
            placeholder: true,
            handle: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

/// File name used when mirroring content to disk: `<id>-<name>` with path
/// separators and leading dots neutralised.
pub fn mirror_file_name(metadata: &FileMetadata) -> String {
    let name: String = metadata
        .name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let name = name.trim_start_matches('.');
    let id: String = metadata
        .id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();

    if name.is_empty() {
        id
    } else {
        format!("{id}-{name}")
    }
}
