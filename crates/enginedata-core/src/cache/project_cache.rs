//! Project Data Cache
//!
//! In-memory map from project id to its parsed [`EngineProject`]. Entries are
//! created lazily on first use:
//! - `Loading` while the single fetch for that id is in flight
//! - `Ready` once the fetch succeeded
//! - `Failed` once it failed
//!
//! Callers that find a `Loading` entry subscribe to the fetch's completion
//! instead of starting another one. Fetches run on their own task, so a
//! caller that gives up waiting never cancels a fetch other callers share.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::{CacheError, FetchError, ProjectSource, ProjectStore};
use crate::results::EngineProject;

type FetchResult = Result<Arc<EngineProject>, FetchError>;

/// Observable state of a cache entry
#[derive(Debug, Clone, PartialEq)]
pub enum EntryState {
    /// A fetch is in flight
    Loading,
    /// Project is available
    Ready,
    /// The fetch failed; terminal until the entry is invalidated
    Failed(FetchError),
}

enum Slot {
    Loading(watch::Receiver<Option<FetchResult>>),
    Ready(Arc<EngineProject>),
    Failed(FetchError),
}

struct Entry {
    /// Distinguishes this entry from earlier ones for the same id
    epoch: u64,
    slot: Slot,
}

struct Inner {
    source: Arc<dyn ProjectSource>,
    entries: Mutex<HashMap<String, Entry>>,
    next_epoch: AtomicU64,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries are only replaced wholesale, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail a `Loading` entry whose fetch task ended without reporting
    /// (panicked or was aborted with its runtime)
    fn abandon(&self, project_id: &str, epoch: u64) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(project_id) {
            if entry.epoch == epoch && matches!(entry.slot, Slot::Loading(_)) {
                tracing::warn!(
                    project = project_id,
                    epoch,
                    "project fetch ended without a result"
                );
                entry.slot = Slot::Failed(FetchError::Interrupted);
            }
        }
    }

    /// Record the outcome of a fetch, unless its entry was invalidated meanwhile
    fn settle(&self, project_id: &str, epoch: u64, result: &FetchResult) {
        let mut entries = self.entries();
        match entries.get_mut(project_id) {
            Some(entry) if entry.epoch == epoch => {
                entry.slot = match result {
                    Ok(project) => {
                        tracing::info!(
                            project = project_id,
                            calculations = project.calculations.len(),
                            "project loaded"
                        );
                        Slot::Ready(Arc::clone(project))
                    }
                    Err(error) => {
                        tracing::warn!(project = project_id, %error, "project fetch failed");
                        Slot::Failed(error.clone())
                    }
                };
            }
            _ => {
                tracing::warn!(
                    project = project_id,
                    epoch,
                    "discarding result of invalidated fetch"
                );
            }
        }
    }
}

/// Shared, lazily populated project cache.
///
/// Cloning is cheap; clones share the same entries.
#[derive(Clone)]
pub struct ProjectCache {
    inner: Arc<Inner>,
}

impl ProjectCache {
    /// Create an empty cache backed by `source`
    pub fn new(source: Arc<dyn ProjectSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                entries: Mutex::new(HashMap::new()),
                next_epoch: AtomicU64::new(1),
            }),
        }
    }

    /// State of the entry for `project_id`, if one exists
    pub fn state(&self, project_id: &str) -> Option<EntryState> {
        self.inner.entries().get(project_id).map(|entry| match &entry.slot {
            Slot::Loading(_) => EntryState::Loading,
            Slot::Ready(_) => EntryState::Ready,
            Slot::Failed(error) => EntryState::Failed(error.clone()),
        })
    }

    /// Number of entries in any state
    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    /// True when no entry exists
    pub fn is_empty(&self) -> bool {
        self.inner.entries().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.inner.entries().clear();
    }

    /// Create a `Loading` entry and spawn its fetch
    fn start_fetch(
        &self,
        entries: &mut HashMap<String, Entry>,
        project_id: &str,
    ) -> (u64, watch::Receiver<Option<FetchResult>>) {
        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        entries.insert(
            project_id.to_string(),
            Entry {
                epoch,
                slot: Slot::Loading(rx.clone()),
            },
        );

        let inner = Arc::clone(&self.inner);
        let project_id = project_id.to_string();
        tokio::spawn(async move {
            tracing::info!(project = %project_id, epoch, "fetching project");
            let result = match inner.source.fetch_project(&project_id).await {
                Ok(project) => project
                    .validate()
                    .map(|()| Arc::new(project))
                    .map_err(FetchError::from),
                Err(error) => Err(error),
            };
            inner.settle(&project_id, epoch, &result);
            tx.send_replace(Some(result));
        });

        (epoch, rx)
    }
}

#[async_trait]
impl ProjectStore for ProjectCache {
    async fn ensure_loaded(&self, project_id: &str) -> Result<Arc<EngineProject>, CacheError> {
        let (epoch, mut rx) = {
            let mut entries = self.inner.entries();
            match entries.get(project_id) {
                Some(Entry {
                    slot: Slot::Ready(project),
                    ..
                }) => return Ok(Arc::clone(project)),
                Some(Entry {
                    slot: Slot::Failed(error),
                    ..
                }) => return Err(CacheError::fetch_failed(project_id, error.clone())),
                Some(Entry {
                    epoch,
                    slot: Slot::Loading(rx),
                }) => {
                    tracing::debug!(project = project_id, "joining in-flight fetch");
                    (*epoch, rx.clone())
                }
                None => self.start_fetch(&mut entries, project_id),
            }
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        match outcome {
            Some(result) => {
                result.map_err(|reason| CacheError::fetch_failed(project_id, reason))
            }
            None => {
                // Sender dropped without a result: the fetch task died
                self.inner.abandon(project_id, epoch);
                Err(CacheError::fetch_failed(project_id, FetchError::Interrupted))
            }
        }
    }

    fn get(&self, project_id: &str) -> Option<Arc<EngineProject>> {
        match self.inner.entries().get(project_id).map(|entry| &entry.slot) {
            Some(Slot::Ready(project)) => Some(Arc::clone(project)),
            _ => None,
        }
    }

    fn invalidate(&self, project_id: &str) {
        if self.inner.entries().remove(project_id).is_some() {
            tracing::debug!(project = project_id, "invalidated cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::parse_result_file;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    const PROJECT: &str = "2 NATUR\nidx RPM Torque\n$1\n1 2000 150\n";

    /// Counts fetches; each fetch waits for `gate` when one is set
    struct CountingSource {
        fetches: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                gate: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl ProjectSource for CountingSource {
        async fn fetch_project(&self, project_id: &str) -> Result<EngineProject, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(FetchError::NotFound(project_id.to_string()));
            }
            Ok(parse_result_file(PROJECT, project_id).unwrap().value)
        }
    }

    #[tokio::test]
    async fn test_ready_entry_served_from_cache() {
        let source = Arc::new(CountingSource::new());
        let cache = ProjectCache::new(source.clone());

        assert!(cache.get("P1").is_none());
        let first = cache.ensure_loaded("P1").await.unwrap();
        let second = cache.ensure_loaded("P1").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state("P1"), Some(EntryState::Ready));
        assert!(cache.get("P1").is_some());
    }

    #[tokio::test]
    async fn test_failure_is_terminal_until_invalidated() {
        let source = Arc::new(CountingSource {
            fail: true,
            ..CountingSource::new()
        });
        let cache = ProjectCache::new(source.clone());

        let err = cache.ensure_loaded("P1").await.unwrap_err();
        assert_eq!(
            err,
            CacheError::ProjectFetchFailed {
                project_id: "P1".to_string(),
                reason: FetchError::NotFound("P1".to_string()),
            }
        );
        assert!(cache.ensure_loaded("P1").await.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        cache.invalidate("P1");
        assert!(cache.state("P1").is_none());
        assert!(cache.ensure_loaded("P1").await.is_err());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    struct PanickingSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ProjectSource for PanickingSource {
        async fn fetch_project(&self, project_id: &str) -> Result<EngineProject, FetchError> {
            if self.fetches.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("source crashed while fetching {}", project_id);
            }
            Ok(parse_result_file(PROJECT, project_id).unwrap().value)
        }
    }

    #[tokio::test]
    async fn test_dead_fetch_task_fails_entry() {
        let source = Arc::new(PanickingSource {
            fetches: AtomicUsize::new(0),
        });
        let cache = ProjectCache::new(source.clone());

        let interrupted = CacheError::ProjectFetchFailed {
            project_id: "P1".to_string(),
            reason: FetchError::Interrupted,
        };
        assert_eq!(cache.ensure_loaded("P1").await.unwrap_err(), interrupted);
        assert_eq!(
            cache.state("P1"),
            Some(EntryState::Failed(FetchError::Interrupted))
        );
        assert_eq!(cache.ensure_loaded("P1").await.unwrap_err(), interrupted);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        cache.invalidate("P1");
        assert!(cache.ensure_loaded("P1").await.is_ok());
        assert_eq!(cache.state("P1"), Some(EntryState::Ready));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_len_and_clear() {
        let cache = ProjectCache::new(Arc::new(CountingSource::new()));
        assert!(cache.is_empty());

        cache.ensure_loaded("P1").await.unwrap();
        cache.ensure_loaded("P2").await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("P1").is_none());
    }

    #[tokio::test]
    async fn test_stale_fetch_discarded_after_invalidate() {
        let gate = Arc::new(Notify::new());
        let source = Arc::new(CountingSource {
            gate: Some(gate.clone()),
            ..CountingSource::new()
        });
        let cache = ProjectCache::new(source.clone());

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.ensure_loaded("P1").await })
        };
        while source.fetches.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.state("P1"), Some(EntryState::Loading));

        cache.invalidate("P1");
        gate.notify_one();

        // The first waiter still gets its result
        assert!(waiter.await.unwrap().is_ok());
        // The cache did not keep it
        assert!(cache.state("P1").is_none());
        assert!(cache.get("P1").is_none());
    }
}
