//! Viewer lifecycle: initial session check, then periodic polling.
//!
//! Polls run one at a time inside a single task, so an older snapshot can
//! never be applied after a newer one. Every teardown path (explicit
//! shutdown, dropping the handle, runtime shutdown) cancels the task,
//! and the task releases the whole cache on its way out.

use crate::sync::{
    reconcile::{LocalCache, VisibleFiles},
    source::FileSource,
};
use std::{path::PathBuf, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub poll_interval: Duration,
    /// Token sent with the initial status check. A random one is generated
    /// when absent.
    pub session_id: Option<String>,
    /// Directory to mirror hydrated files into.
    pub mirror_dir: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            session_id: None,
            mirror_dir: None,
        }
    }
}

/// Handle to a running viewer.
pub struct ViewerHandle {
    session_id: String,
    files: watch::Receiver<VisibleFiles>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ViewerHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Receiver for the visible file list. Each value is a full replacement
    /// of the previous one.
    pub fn subscribe(&self) -> watch::Receiver<VisibleFiles> {
        self.files.clone()
    }

    /// Stop polling and wait until every cached resource is released.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("viewer task ended abnormally: {err}");
            }
        }
    }
}

impl Drop for ViewerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start a viewer against `source`.
///
/// Must be called from within a tokio runtime.
pub fn start<S>(source: S, config: ViewerConfig) -> ViewerHandle
where
    S: FileSource + 'static,
{
    let session_id = config
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let cache = match &config.mirror_dir {
        Some(dir) => LocalCache::with_mirror_dir(dir),
        None => LocalCache::new(),
    };
    let poll_interval = config.poll_interval.max(MIN_POLL_INTERVAL);
    let (publisher, files) = watch::channel(VisibleFiles::new());
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run(
        source,
        cache,
        session_id.clone(),
        poll_interval,
        publisher,
        cancel.clone(),
    ));

    ViewerHandle {
        session_id,
        files,
        cancel,
        task: Some(task),
    }
}

async fn run<S: FileSource>(
    source: S,
    mut cache: LocalCache,
    session_id: String,
    poll_interval: Duration,
    publisher: watch::Sender<VisibleFiles>,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = initial_check(&source, &mut cache, &session_id, poll_interval, &publisher) => {
            poll_loop(&source, &mut cache, poll_interval, &publisher, &cancel).await;
        }
    }

    cache.clear();
    publisher.send_replace(VisibleFiles::new());
    debug!(session = %session_id, "viewer stopped");
}

/// Run the session check, retrying on the poll interval until the server
/// answers. Polling must not start before it has succeeded once.
async fn initial_check<S: FileSource>(
    source: &S,
    cache: &mut LocalCache,
    session_id: &str,
    retry_interval: Duration,
    publisher: &watch::Sender<VisibleFiles>,
) {
    let mut ticker = time::interval(retry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match source.check_session(session_id).await {
            Ok(response) if response.is_cleared() => {
                info!(session = session_id, "uploader session invalidated, discarding local cache");
                cache.clear();
                publisher.send_replace(VisibleFiles::new());
                return;
            }
            Ok(response) => {
                let visible = cache.reconcile(source, &response.into_files()).await;
                publisher.send_replace(visible);
                return;
            }
            Err(err) => warn!(session = session_id, "initial session check failed, retrying: {err}"),
        }
    }
}

async fn poll_loop<S: FileSource>(
    source: &S,
    cache: &mut LocalCache,
    poll_interval: Duration,
    publisher: &watch::Sender<VisibleFiles>,
    cancel: &CancellationToken,
) {
    let mut ticker = time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The initial check already produced a listing.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = poll_once(source, cache, publisher) => {}
        }
    }
}

async fn poll_once<S: FileSource>(
    source: &S,
    cache: &mut LocalCache,
    publisher: &watch::Sender<VisibleFiles>,
) {
    match source.list_files().await {
        Ok(listing) => {
            let visible = cache.reconcile(source, &listing).await;
            publisher.send_replace(visible);
        }
        Err(err) => warn!("poll failed, keeping previous file list: {err}"),
    }
}
