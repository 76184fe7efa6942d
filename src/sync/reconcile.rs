//! Reconciling a viewer's local cache against a metadata snapshot.
//!
//! Cached entries are immutable once hydrated: an id seen again is reused
//! without fetching or decoding. Ids missing from the snapshot are evicted,
//! which releases their content handles. Ids new to the cache are fetched
//! concurrently. A failed fetch yields a placeholder instead of aborting
//! the pass.

use crate::{
    models::file::FileMetadata,
    services::data_url,
    sync::{
        cache::{CachedFile, ContentHandle, mirror_file_name},
        error::SyncError,
        source::FileSource,
    },
};
use futures::future::join_all;
use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::Arc,
};
use tracing::{debug, warn};

/// The full list a viewer should render, in snapshot order.
pub type VisibleFiles = Vec<Arc<CachedFile>>;

#[derive(Debug, Default)]
pub struct LocalCache {
    entries: HashMap<String, Arc<CachedFile>>,
    mirror_dir: Option<PathBuf>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write every hydrated file into `dir`. The written file lives as
    /// long as its cache entry.
    pub fn with_mirror_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            entries: HashMap::new(),
            mirror_dir: Some(dir.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Drop every entry and release its resources.
    pub fn clear(&mut self) {
        if !self.is_empty() {
            debug!(evicted = self.len(), "discarding local cache");
        }
        self.entries.clear();
    }

    /// Bring the cache in line with `listing` and return the new visible
    /// list. The result always replaces the previous list as a whole.
    pub async fn reconcile<S: FileSource>(
        &mut self,
        source: &S,
        listing: &[FileMetadata],
    ) -> VisibleFiles {
        let wanted: HashSet<&str> = listing.iter().map(|meta| meta.id.as_str()).collect();
        self.entries.retain(|id, _| {
            let keep = wanted.contains(id.as_str());
            if !keep {
                debug!(%id, "evicting file no longer shared");
            }
            keep
        });

        let mut seen = HashSet::new();
        let missing: Vec<&FileMetadata> = listing
            .iter()
            .filter(|meta| !self.contains(&meta.id) && seen.insert(meta.id.as_str()))
            .collect();

        let hydrated = join_all(missing.into_iter().map(|meta| self.hydrate(source, meta))).await;

        let mut placeholders = HashMap::new();
        for file in hydrated {
            let id = file.id().to_string();
            if file.placeholder {
                placeholders.insert(id, file);
            } else {
                self.entries.insert(id, file);
            }
        }

        let visible: VisibleFiles = listing
            .iter()
            .filter_map(|meta| {
                self.entries
                    .get(&meta.id)
                    .or_else(|| placeholders.get(&meta.id))
                    .cloned()
            })
            .collect();
        debug!(
            visible = visible.len(),
            cached = self.len(),
            placeholders = placeholders.len(),
            "reconciled local cache"
        );
        visible
    }

    async fn hydrate<S: FileSource>(&self, source: &S, meta: &FileMetadata) -> Arc<CachedFile> {
        match self.try_hydrate(source, meta).await {
            Ok(file) => Arc::new(file),
            Err(err) => {
                warn!(id = %meta.id, name = %meta.name, "showing placeholder: {err}");
                Arc::new(CachedFile::placeholder(meta.clone()))
            }
        }
    }

    async fn try_hydrate<S: FileSource>(
        &self,
        source: &S,
        meta: &FileMetadata,
    ) -> Result<CachedFile, SyncError> {
        let payload = source.fetch_file(&meta.id).await?;
        let content = data_url::decode_preview(&payload.data)?;

        let handle = match &self.mirror_dir {
            Some(dir) => {
                let path = dir.join(mirror_file_name(meta));
                tokio::fs::write(&path, content.as_bytes()).await?;
                Some(ContentHandle::new(path))
            }
            None => None,
        };

        debug!(id = %meta.id, size = content.as_bytes().len(), "hydrated file");
        Ok(CachedFile::hydrated(meta.clone(), content, handle))
    }
}
