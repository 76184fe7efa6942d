//! src/services/file_store.rs
//!
//! FileStore — the process-wide, in-memory registry of shared files.
//!
//! The state mutex guards the file map and the uploader session token.
//! Each mutation queues its post-mutation snapshot while the state lock is
//! still held, so the queue is in mutation order. Listeners are called
//! after the state lock is released, by whichever thread holds the dispatch
//! lock, which drains the queue front to back. Listeners may therefore read
//! or mutate the store themselves. Nothing is persisted: a process restart
//! forgets everything.

use crate::models::file::FileRecord;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Consistent view of every file in the store at one instant.
pub type Snapshot = Vec<Arc<FileRecord>>;

type Listener = dyn Fn(&[Arc<FileRecord>]) -> anyhow::Result<()> + Send + Sync;

struct State {
    files: HashMap<String, Arc<FileRecord>>,
    uploader_session: Option<String>,
    /// Number of notifying mutations so far.
    version: u64,
    pending: VecDeque<(u64, Arc<Snapshot>)>,
}

impl State {
    fn snapshot(&self) -> Snapshot {
        let mut files: Snapshot = self.files.values().cloned().collect();
        files.sort_by(|a, b| {
            a.uploaded_at
                .cmp(&b.uploaded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        files
    }
}

struct Registration {
    id: u64,
    /// Only snapshots newer than this version are delivered.
    since: u64,
    listener: Arc<Listener>,
}

#[derive(Default)]
struct Listeners {
    entries: Vec<Registration>,
    next_id: u64,
}

struct Shared {
    state: Mutex<State>,
    listeners: Mutex<Listeners>,
    dispatch: Mutex<()>,
}

/// Shared handle to the store. Cloning is cheap and every clone refers to
/// the same registry.
#[derive(Clone)]
pub struct FileStore {
    shared: Arc<Shared>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    files: HashMap::new(),
                    uploader_session: None,
                    version: 0,
                    pending: VecDeque::new(),
                }),
                listeners: Mutex::new(Listeners::default()),
                dispatch: Mutex::new(()),
            }),
        }
    }

    /// Insert or overwrite a record keyed by its id.
    pub fn add_file(&self, record: FileRecord) {
        {
            let mut state = self.shared.state.lock();
            debug!(id = %record.id, name = %record.name, size = record.size, "adding file");
            state.files.insert(record.id.clone(), Arc::new(record));
            self.queue_locked(&mut state);
        }
        self.dispatch();
    }

    /// Remove a record if present. Removing an unknown id changes nothing
    /// and notifies nobody.
    pub fn remove_file(&self, id: &str) {
        {
            let mut state = self.shared.state.lock();
            if state.files.remove(id).is_none() {
                debug!(%id, "remove ignored, file not present");
                return;
            }
            debug!(%id, "removed file");
            self.queue_locked(&mut state);
        }
        self.dispatch();
    }

    pub fn get_file(&self, id: &str) -> Option<Arc<FileRecord>> {
        self.shared.state.lock().files.get(id).cloned()
    }

    /// Snapshot of all records, ordered by upload time then id.
    pub fn get_all_files(&self) -> Snapshot {
        self.shared.state.lock().snapshot()
    }

    pub fn file_count(&self) -> usize {
        self.shared.state.lock().files.len()
    }

    /// Drop every record and forget the uploader session. Always emits
    /// exactly one notification.
    pub fn clear_all(&self) {
        {
            let mut state = self.shared.state.lock();
            self.clear_locked(&mut state);
        }
        self.dispatch();
    }

    fn clear_locked(&self, state: &mut State) {
        let removed = state.files.len();
        state.files.clear();
        state.uploader_session = None;
        debug!(removed, "cleared all files");
        self.queue_locked(state);
    }

    /// Record the current uploader session. Existing files are kept.
    pub fn set_uploader_session(&self, token: impl Into<String>) {
        self.shared.state.lock().uploader_session = Some(token.into());
    }

    pub fn uploader_session(&self) -> Option<String> {
        self.shared.state.lock().uploader_session.clone()
    }

    /// Clear everything when the uploader's client has restarted.
    ///
    /// Returns `true` only if the store held at least one file, a session was
    /// set, and that session differs from `candidate`. The check and the
    /// clear happen under one lock acquisition.
    pub fn clear_if_uploader_refreshed(&self, candidate: &str) -> bool {
        let refreshed = {
            let mut state = self.shared.state.lock();
            let refreshed = !state.files.is_empty()
                && state
                    .uploader_session
                    .as_deref()
                    .is_some_and(|current| current != candidate);

            if refreshed {
                info!(
                    previous = state.uploader_session.as_deref().unwrap_or_default(),
                    candidate, "uploader session changed, invalidating shared files"
                );
                self.clear_locked(&mut state);
            }
            refreshed
        };

        if refreshed {
            self.dispatch();
        }
        refreshed
    }

    /// Register a callback invoked with the post-mutation snapshot after
    /// every add, effective remove, and clear.
    ///
    /// Callbacks run outside the store lock and may call back into the
    /// store. The listener stays registered until the returned
    /// `Subscription` is dropped or `unsubscribe` is called.
    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Arc<FileRecord>]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let state = self.shared.state.lock();
        self.register_locked(&state, Arc::new(listener))
    }

    /// Subscribe through a `watch` channel seeded with the current snapshot.
    ///
    /// Registration and seeding happen under one lock, so the receiver sees
    /// every later mutation and nothing older than its seed. A slow reader
    /// only ever sees the latest snapshot.
    pub fn subscribe(&self) -> (watch::Receiver<Snapshot>, Subscription) {
        let state = self.shared.state.lock();
        let (tx, rx) = watch::channel(state.snapshot());
        let subscription = self.register_locked(
            &state,
            Arc::new(move |files: &[Arc<FileRecord>]| -> anyhow::Result<()> {
                tx.send_replace(files.to_vec());
                Ok(())
            }),
        );
        (rx, subscription)
    }

    /// Number of registered listeners, including open event streams.
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().entries.len()
    }

    fn register_locked(&self, state: &State, listener: Arc<Listener>) -> Subscription {
        let mut listeners = self.shared.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push(Registration {
            id,
            since: state.version,
            listener,
        });
        debug!(listener = id, "registered store listener");

        Subscription {
            store: Arc::downgrade(&self.shared),
            id,
        }
    }

    fn queue_locked(&self, state: &mut State) {
        state.version += 1;
        if self.shared.listeners.lock().entries.is_empty() {
            return;
        }
        let snapshot = Arc::new(state.snapshot());
        let version = state.version;
        state.pending.push_back((version, snapshot));
    }

    /// Deliver queued snapshots in order.
    ///
    /// Only one thread drains at a time. A thread that finds the dispatch
    /// lock taken leaves its snapshot to the current holder, which
    /// re-checks the queue after releasing the lock.
    fn dispatch(&self) {
        loop {
            let Some(guard) = self.shared.dispatch.try_lock() else {
                return;
            };

            loop {
                let next = self.shared.state.lock().pending.pop_front();
                let Some((version, snapshot)) = next else {
                    break;
                };
                self.deliver(version, &snapshot);
            }

            drop(guard);
            if self.shared.state.lock().pending.is_empty() {
                return;
            }
        }
    }

    fn deliver(&self, version: u64, snapshot: &[Arc<FileRecord>]) {
        let targets: Vec<(u64, Arc<Listener>)> = self
            .shared
            .listeners
            .lock()
            .entries
            .iter()
            .filter(|registration| registration.since < version)
            .map(|registration| (registration.id, Arc::clone(&registration.listener)))
            .collect();

        for (id, listener) in targets {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(snapshot))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(listener = id, "store listener failed: {err:#}"),
                Err(_) => warn!(listener = id, "store listener panicked"),
            }
        }
    }
}

/// Registration handle returned by `FileStore::add_listener`.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    store: Weak<Shared>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.store.upgrade() {
            let removed = {
                let mut listeners = shared.listeners.lock();
                let pos = listeners
                    .entries
                    .iter()
                    .position(|registration| registration.id == self.id);
                pos.map(|pos| listeners.entries.remove(pos))
            };
            // The callback may own other subscriptions; drop it unlocked.
            drop(removed);
            debug!(listener = self.id, "unregistered store listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(id: &str, offset_secs: i64) -> FileRecord {
        FileRecord {
            id: id.into(),
            name: format!("{id}.txt"),
            size: 5,
            mime_type: "text/plain".into(),
            content: "data:text/plain;base64,aGVsbG8=".into(),
            uploaded_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
        }
    }

    fn ids(store: &FileStore) -> Vec<String> {
        store.get_all_files().iter().map(|f| f.id.clone()).collect()
    }

    fn counting_listener(store: &FileStore) -> (Subscription, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let sub = store.add_listener(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (sub, count)
    }

    #[test]
    fn add_get_remove_scenario() {
        let store = FileStore::new();
        store.add_file(record("a", 0));
        assert_eq!(ids(&store), vec!["a"]);
        assert_eq!(store.get_file("a").unwrap().size, 5);

        store.remove_file("a");
        assert!(store.get_all_files().is_empty());
        store.remove_file("a");
        assert!(store.get_file("a").is_none());
    }

    #[test]
    fn add_overwrites_same_id() {
        let store = FileStore::new();
        store.add_file(record("a", 0));
        let mut replacement = record("a", 1);
        replacement.name = "renamed.txt".into();
        store.add_file(replacement);

        assert_eq!(store.file_count(), 1);
        assert_eq!(store.get_file("a").unwrap().name, "renamed.txt");
    }

    #[test]
    fn snapshot_tracks_added_minus_removed() {
        let store = FileStore::new();
        let mut expected = BTreeSet::new();
        for i in 0..20 {
            let id = format!("f{i}");
            store.add_file(record(&id, i));
            expected.insert(id);
            if i % 3 == 0 {
                let victim = format!("f{}", i / 2);
                store.remove_file(&victim);
                expected.remove(&victim);
            }
        }
        let actual: BTreeSet<String> = ids(&store).into_iter().collect();
        assert_eq!(actual, expected);

        store.clear_all();
        store.add_file(record("late", 100));
        assert_eq!(ids(&store), vec!["late"]);
    }

    #[test]
    fn snapshot_is_ordered_by_upload_time() {
        let store = FileStore::new();
        store.add_file(record("b", 5));
        store.add_file(record("a", 10));
        store.add_file(record("c", 0));
        assert_eq!(ids(&store), vec!["c", "b", "a"]);
    }

    #[test]
    fn removing_absent_id_does_not_notify() {
        let store = FileStore::new();
        store.add_file(record("a", 0));
        let (_sub, count) = counting_listener(&store);

        store.remove_file("missing");
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(ids(&store), vec!["a"]);

        store.remove_file("a");
        store.remove_file("a");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_all_resets_session_and_notifies_once() {
        let store = FileStore::new();
        store.add_file(record("a", 0));
        store.add_file(record("b", 1));
        store.set_uploader_session("s1");
        let (_sub, count) = counting_listener(&store);

        store.clear_all();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(store.get_all_files().is_empty());
        assert_eq!(store.uploader_session(), None);
    }

    #[test]
    fn setting_session_keeps_files() {
        let store = FileStore::new();
        store.add_file(record("a", 0));
        store.set_uploader_session("s1");
        store.set_uploader_session("s2");
        assert_eq!(store.uploader_session().as_deref(), Some("s2"));
        assert_eq!(store.file_count(), 1);
    }

    #[test]
    fn refresh_check_is_noop_when_store_is_empty() {
        let store = FileStore::new();
        store.set_uploader_session("s1");
        assert!(!store.clear_if_uploader_refreshed("s2"));
        assert_eq!(store.uploader_session().as_deref(), Some("s1"));
    }

    #[test]
    fn refresh_check_is_noop_without_session() {
        let store = FileStore::new();
        store.add_file(record("a", 0));
        assert!(!store.clear_if_uploader_refreshed("s2"));
        assert_eq!(store.file_count(), 1);
    }

    #[test]
    fn refresh_check_is_noop_for_same_session() {
        let store = FileStore::new();
        store.add_file(record("a", 0));
        store.set_uploader_session("s1");
        let (_sub, count) = counting_listener(&store);

        assert!(!store.clear_if_uploader_refreshed("s1"));
        assert_eq!(store.file_count(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn refresh_check_clears_for_new_session() {
        let store = FileStore::new();
        store.add_file(record("a", 0));
        store.set_uploader_session("s1");
        let (_sub, count) = counting_listener(&store);

        assert!(store.clear_if_uploader_refreshed("s2"));
        assert!(store.get_all_files().is_empty());
        assert_eq!(store.uploader_session(), None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_listeners_do_not_block_others() {
        let store = FileStore::new();
        let _panicking = store.add_listener(|_| panic!("listener exploded"));
        let _erroring = store.add_listener(|_| anyhow::bail!("listener refused"));

        let received = Arc::new(Mutex::new(Vec::<Vec<String>>::new()));
        let sink = Arc::clone(&received);
        let _healthy = store.add_listener(move |files| {
            sink.lock()
                .push(files.iter().map(|f| f.id.clone()).collect());
            Ok(())
        });

        store.add_file(record("a", 0));
        assert_eq!(ids(&store), vec!["a"]);
        assert_eq!(*received.lock(), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn listeners_see_every_mutation_in_order() {
        let store = FileStore::new();
        let received = Arc::new(Mutex::new(Vec::<usize>::new()));
        let sink = Arc::clone(&received);
        let _sub = store.add_listener(move |files| {
            sink.lock().push(files.len());
            Ok(())
        });

        store.add_file(record("a", 0));
        store.add_file(record("b", 1));
        store.remove_file("a");
        store.clear_all();
        assert_eq!(*received.lock(), vec![1, 2, 1, 0]);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let store = FileStore::new();
        let (sub, count) = counting_listener(&store);
        assert_eq!(store.listener_count(), 1);

        store.add_file(record("a", 0));
        sub.unsubscribe();
        assert_eq!(store.listener_count(), 0);

        store.add_file(record("b", 1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscribe_seeds_and_tracks_latest_snapshot() {
        let store = FileStore::new();
        store.add_file(record("a", 0));
        let (mut rx, sub) = store.subscribe();
        assert_eq!(rx.borrow().len(), 1);

        store.add_file(record("b", 1));
        store.add_file(record("c", 2));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 3);

        drop(sub);
        assert_eq!(store.listener_count(), 0);
        assert!(rx.changed().await.is_err());
    }

    #[test]
    fn listener_can_read_store_during_mutation() {
        let store = FileStore::new();
        let reader = store.clone();
        let seen = Arc::new(Mutex::new(Vec::<usize>::new()));
        let sink = Arc::clone(&seen);
        let _sub = store.add_listener(move |_| {
            sink.lock().push(reader.get_all_files().len());
            Ok(())
        });

        let writer = store.clone();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            writer.add_file(record("a", 0));
            writer.add_file(record("b", 1));
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("add_file must not block on a listener reading the store");
        assert_eq!(*seen.lock(), vec![1, 2]);
        assert_eq!(store.file_count(), 2);
    }

    #[test]
    fn listener_mutations_are_delivered_in_order() {
        let store = FileStore::new();
        let writer = store.clone();
        let _cleanup = store.add_listener(move |files| {
            if files.iter().any(|f| f.id == "temp") {
                writer.remove_file("temp");
            }
            Ok(())
        });
        let received = Arc::new(Mutex::new(Vec::<Vec<String>>::new()));
        let sink = Arc::clone(&received);
        let _recorder = store.add_listener(move |files| {
            sink.lock()
                .push(files.iter().map(|f| f.id.clone()).collect());
            Ok(())
        });

        store.add_file(record("temp", 0));
        assert!(store.get_all_files().is_empty());
        assert_eq!(
            *received.lock(),
            vec![vec!["temp".to_string()], Vec::<String>::new()]
        );
    }

    #[test]
    fn listener_registered_later_skips_older_mutations() {
        let store = FileStore::new();
        let late = Arc::new(Mutex::new(None::<Subscription>));
        let late_count = Arc::new(AtomicUsize::new(0));

        let registrar = store.clone();
        let slot = Arc::clone(&late);
        let counter = Arc::clone(&late_count);
        let _first = store.add_listener(move |_| {
            let mut slot = slot.lock();
            if slot.is_none() {
                let counter = Arc::clone(&counter);
                *slot = Some(registrar.add_listener(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }));
            }
            Ok(())
        });

        store.add_file(record("a", 0));
        assert_eq!(late_count.load(Ordering::SeqCst), 0);
        store.add_file(record("b", 1));
        assert_eq!(late_count.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 2);
    }

    #[test]
    fn concurrent_writers_keep_store_consistent() {
        let store = FileStore::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let id = format!("t{t}-{i}");
                        store.add_file(record(&id, i));
                        if i % 2 == 1 {
                            store.remove_file(&id);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.file_count(), 8 * 25);
    }
}
