use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use common::{Song, SongRecord};
use library::{sweep_orphans, ArchiveStore, CleanupReport, SongIndex};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::fetch::{ChartFetcher, FetchError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Empty,
    Loading,
    Ready,
    Refreshing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheEvent {
    Loaded { songs: usize },
    Fetched { songs: usize },
}

pub type SubscriberId = u64;

type Subscriber = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

#[derive(Debug)]
pub enum LoadOutcome {
    /// The archive was present and is now the live index.
    Restored { songs: usize },
    /// No usable archive; a first fetch is running in the background.
    Fetching(JoinHandle<Result<usize, FetchError>>),
}

impl LoadOutcome {
    pub fn restored(&self) -> bool {
        matches!(self, LoadOutcome::Restored { .. })
    }
}

/// Handle to the cached chart. Clones share the same library.
#[derive(Clone)]
pub struct LibraryCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    documents: PathBuf,
    store: ArchiveStore,
    fetcher: ChartFetcher,
    cleanup_on_refresh: bool,
    state: RwLock<CacheState>,
    index: RwLock<Arc<SongIndex>>,
    subscribers: Mutex<Vec<(SubscriberId, Subscriber)>>,
    next_subscriber: AtomicU64,
    // Serializes fetches so their save-then-notify steps never interleave.
    fetch_gate: tokio::sync::Mutex<()>,
}

impl LibraryCache {
    pub fn new(
        documents: PathBuf,
        store: ArchiveStore,
        fetcher: ChartFetcher,
        cleanup_on_refresh: bool,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                documents,
                store,
                fetcher,
                cleanup_on_refresh,
                state: RwLock::new(CacheState::Empty),
                index: RwLock::new(Arc::new(SongIndex::new())),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                fetch_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn documents(&self) -> &Path {
        &self.inner.documents
    }

    pub fn state(&self) -> CacheState {
        *self.inner.state.read()
    }

    pub fn count(&self) -> usize {
        self.inner.index.read().count()
    }

    pub fn get(&self, ordinal: usize) -> Option<Song> {
        self.inner.index.read().get(ordinal).cloned()
    }

    /// The published index. Later fetches replace it without touching this copy.
    pub fn snapshot(&self) -> Arc<SongIndex> {
        self.inner.index.read().clone()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let subscriber: Subscriber = Arc::new(callback);
        self.inner.subscribers.lock().push((id, subscriber));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Restores the archived chart, or starts a first fetch when there is none.
    pub async fn load(&self) -> LoadOutcome {
        let gate = self.inner.fetch_gate.lock().await;
        let inner = Arc::clone(&self.inner);
        let records = match tokio::task::spawn_blocking(move || inner.store.load()).await {
            Ok(records) => records,
            Err(err) => {
                warn!("Archive load task failed: {}", err);
                None
            }
        };

        if let Some(records) = records {
            let index = SongIndex::from_records(records, &self.inner.documents);
            let songs = index.count();
            self.publish(index);
            info!("Restored {} songs from archive", songs);
            self.notify(CacheEvent::Loaded { songs });
            return LoadOutcome::Restored { songs };
        }

        *self.inner.state.write() = CacheState::Loading;
        drop(gate);
        let cache = self.clone();
        LoadOutcome::Fetching(tokio::spawn(async move { cache.fetch().await }))
    }

    /// Fetches the chart, replaces the ordered songs, saves them and notifies
    /// subscribers. Ids and albums from earlier charts stay in the lookups.
    /// On failure the current index is kept.
    pub async fn fetch(&self) -> Result<usize, FetchError> {
        let _gate = self.inner.fetch_gate.lock().await;

        let previous = {
            let mut state = self.inner.state.write();
            let previous = *state;
            *state = match previous {
                CacheState::Ready | CacheState::Refreshing => CacheState::Refreshing,
                CacheState::Empty | CacheState::Loading => CacheState::Loading,
            };
            previous
        };

        let base = self.snapshot().carry_over();
        let index = match self.inner.fetcher.fetch(base).await {
            Ok(index) => index,
            Err(err) => {
                warn!("Chart fetch from {} failed: {}", self.inner.fetcher.url(), err);
                let restored = match previous {
                    CacheState::Ready | CacheState::Refreshing => CacheState::Ready,
                    CacheState::Empty | CacheState::Loading => CacheState::Empty,
                };
                *self.inner.state.write() = restored;
                return Err(err);
            }
        };

        let songs = index.count();
        let records = index.records();
        self.publish(index);
        self.save(records).await;
        self.notify(CacheEvent::Fetched { songs });

        if self.inner.cleanup_on_refresh {
            let cache = self.clone();
            match tokio::task::spawn_blocking(move || cache.cleanup()).await {
                Ok(Some(report)) => info!(
                    "Post-refresh cleanup removed {} media and {} image files",
                    report.media_deleted, report.image_deleted
                ),
                Ok(None) => {}
                Err(err) => warn!("Cleanup task failed: {}", err),
            }
        }

        Ok(songs)
    }

    /// Removes media and image files that no longer belong to any cached song.
    /// Blocks on filesystem I/O.
    pub fn cleanup(&self) -> Option<CleanupReport> {
        let index = self.snapshot();
        sweep_orphans(&self.inner.documents, &index)
    }

    fn publish(&self, index: SongIndex) {
        *self.inner.index.write() = Arc::new(index);
        *self.inner.state.write() = CacheState::Ready;
    }

    async fn save(&self, records: Vec<SongRecord>) {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || inner.store.save(&records)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Failed to save songs to {:?}: {}", self.inner.store.path(), err),
            Err(err) => warn!("Archive save task failed: {}", err),
        }
    }

    fn notify(&self, event: CacheEvent) {
        let subscribers: Vec<Subscriber> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(&event);
        }
    }
}
