//! Coalescing tile retriever.
//!
//! Every uncached tile has at most one fetch in flight. Callers asking for a
//! tile that is already being fetched receive a clone of the same
//! [`FetchHandle`] and observe the same outcome.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::TileCache;
use crate::level::TileKey;
use crate::provider::{ProviderError, TileRequest, UrlBuilder};

use super::absent::AbsentTileList;
use super::service::{RetrievalRequest, RetrievalService};

/// Final state of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The tile was decoded and is in both cache tiers.
    Resident,
    /// The fetch or decode failed; the failure was recorded.
    Absent,
}

/// Shared view of one in-flight fetch.
#[derive(Debug, Clone)]
pub struct FetchHandle {
    key: TileKey,
    outcome: watch::Receiver<Option<FetchOutcome>>,
}

impl FetchHandle {
    fn channel(key: TileKey) -> (watch::Sender<Option<FetchOutcome>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self { key, outcome: rx })
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    /// The outcome if the fetch has finished.
    pub fn outcome(&self) -> Option<FetchOutcome> {
        *self.outcome.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome().is_some()
    }

    /// Wait for the fetch to finish.
    ///
    /// A fetch whose completion was dropped without reporting counts as absent.
    pub async fn wait(&self) -> FetchOutcome {
        let mut rx = self.outcome.clone();
        let result = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).unwrap_or(FetchOutcome::Absent),
            Err(_) => self.outcome().unwrap_or(FetchOutcome::Absent),
        };
        result
    }
}

/// Settings for tile retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieverConfig {
    /// Data format passed to the URL builder.
    pub format: String,
    pub read_timeout: Duration,
    /// When false, tiles are only ever read from the caches.
    pub network_retrieval: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            format: "application/bil16".to_string(),
            read_timeout: crate::provider::DEFAULT_READ_TIMEOUT,
            network_retrieval: true,
        }
    }
}

/// Fetches missing tiles into a [`TileCache`].
pub struct TileRetriever {
    url_builder: Arc<dyn UrlBuilder>,
    service: Arc<dyn RetrievalService>,
    cache: Arc<TileCache>,
    absent: Arc<AbsentTileList>,
    in_flight: Arc<DashMap<TileKey, FetchHandle>>,
    config: RetrieverConfig,
}

impl TileRetriever {
    pub fn new(
        url_builder: Arc<dyn UrlBuilder>,
        service: Arc<dyn RetrievalService>,
        cache: Arc<TileCache>,
        absent: Arc<AbsentTileList>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            url_builder,
            service,
            cache,
            absent,
            in_flight: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn absent(&self) -> &Arc<AbsentTileList> {
        &self.absent
    }

    pub fn url_builder(&self) -> &Arc<dyn UrlBuilder> {
        &self.url_builder
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// True if a fetch for the tile is in flight.
    pub fn is_requested(&self, key: &TileKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Handle of the in-flight fetch for a tile, if any.
    pub fn pending(&self, key: &TileKey) -> Option<FetchHandle> {
        self.in_flight.get(key).map(|h| h.clone())
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Start fetching a tile unless it is resident, quarantined or already
    /// being fetched.
    ///
    /// Returns the handle of the fetch serving the tile, or `None` when no
    /// fetch is needed or allowed.
    pub fn request(&self, key: TileKey) -> Option<FetchHandle> {
        if !self.config.network_retrieval {
            return None;
        }

        let (tx, handle) = match self.in_flight.entry(key) {
            Entry::Occupied(existing) => return Some(existing.get().clone()),
            Entry::Vacant(slot) => {
                // A fetch that finished after our cache miss has already
                // settled the cache and absent list before freeing the slot.
                if self.cache.is_resident(&key) || self.absent.is_absent(&key) {
                    return None;
                }
                let (tx, handle) = FetchHandle::channel(key);
                slot.insert(handle.clone());
                (tx, handle)
            }
        };

        let url = match self.build_url(&key) {
            Ok(url) => url,
            Err(e) => {
                warn!(level = key.level, row = key.row, col = key.col, error = %e, "Cannot build tile URL");
                self.absent.mark_absent(key);
                self.in_flight.remove(&key);
                tx.send_replace(Some(FetchOutcome::Absent));
                return Some(handle);
            }
        };

        debug!(level = key.level, row = key.row, col = key.col, url = %url, "Requesting tile");

        let cache = Arc::clone(&self.cache);
        let absent = Arc::clone(&self.absent);
        let in_flight = Arc::clone(&self.in_flight);
        let request = RetrievalRequest {
            url: url.clone(),
            read_timeout: self.config.read_timeout,
        };

        self.service.submit(
            request,
            Box::new(move |result| {
                let outcome = match result {
                    Ok(payload) => match cache.insert_payload(&key, &payload) {
                        Ok(_) => {
                            absent.unmark(&key);
                            info!(level = key.level, row = key.row, col = key.col, "Tile retrieved");
                            FetchOutcome::Resident
                        }
                        Err(e) => {
                            warn!(
                                level = key.level,
                                row = key.row,
                                col = key.col,
                                url = %url,
                                error = %e,
                                "Retrieved tile could not be decoded"
                            );
                            absent.mark_absent(key);
                            FetchOutcome::Absent
                        }
                    },
                    Err(e) => {
                        warn!(
                            level = key.level,
                            row = key.row,
                            col = key.col,
                            url = %url,
                            error = %e,
                            "Tile retrieval failed"
                        );
                        absent.mark_absent(key);
                        FetchOutcome::Absent
                    }
                };
                // Caches and absent list are settled before the slot frees.
                in_flight.remove(&key);
                tx.send_replace(Some(outcome));
            }),
        );

        Some(handle)
    }

    fn build_url(&self, key: &TileKey) -> Result<String, ProviderError> {
        let levels = self.cache.levels();
        let level = levels
            .level(key.level as usize)
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
        let sector = levels
            .sector_for_tile(key)
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
        let request = TileRequest::new(*key, sector, level.tile_width(), level.tile_height());
        self.url_builder.tile_url(&request, &self.config.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DiskTileCache, FileTileStore, MemoryTileCache, RasterFormat};
    use crate::level::{LevelSet, LevelSetConfig};
    use crate::provider::TiledUrlBuilder;
    use crate::retrieve::RetrievalCallback;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Holds callbacks until the test completes them.
    #[derive(Default)]
    struct DeferredService {
        submitted: AtomicUsize,
        pending: Mutex<Vec<(RetrievalRequest, RetrievalCallback)>>,
    }

    impl DeferredService {
        fn complete_all(&self, result: Result<Vec<u8>, ProviderError>) {
            let pending: Vec<_> = self.pending.lock().drain(..).collect();
            for (_, callback) in pending {
                callback(result.clone().map(bytes::Bytes::from));
            }
        }
    }

    impl RetrievalService for DeferredService {
        fn submit(&self, request: RetrievalRequest, on_complete: RetrievalCallback) {
            self.submitted.fetch_add(1, Ordering::SeqCst);
            self.pending.lock().push((request, on_complete));
        }
    }

    fn setup(dir: &TempDir) -> (TileRetriever, Arc<DeferredService>, Arc<TileCache>) {
        let levels = Arc::new(
            LevelSet::new(&LevelSetConfig::default().with_tile_size(2, 2).with_num_levels(3)).unwrap(),
        );
        let disk = DiskTileCache::new(
            Arc::new(FileTileStore::new(dir.path())),
            "Earth/Test",
            ".bil",
            RasterFormat::default(),
        );
        let cache = Arc::new(TileCache::new(MemoryTileCache::new(1_000_000), disk, levels, None));
        let service = Arc::new(DeferredService::default());
        let retriever = TileRetriever::new(
            Arc::new(TiledUrlBuilder::new("http://tiles.example.com", "test")),
            service.clone(),
            Arc::clone(&cache),
            Arc::new(AbsentTileList::new(1, Duration::from_secs(60))),
            RetrieverConfig::default(),
        );
        (retriever, service, cache)
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let dir = TempDir::new().unwrap();
        let (retriever, service, cache) = setup(&dir);
        let key = TileKey::new(1, 2, 3);

        let handles: Vec<_> = (0..10).filter_map(|_| retriever.request(key)).collect();
        assert_eq!(handles.len(), 10);
        assert_eq!(service.submitted.load(Ordering::SeqCst), 1);
        assert!(retriever.is_requested(&key));
        assert!(handles.iter().all(|h| !h.is_finished()));

        service.complete_all(Ok(RasterFormat::default().encode(&[1.0, 2.0, 3.0, 4.0])));

        for handle in &handles {
            assert_eq!(handle.wait().await, FetchOutcome::Resident);
        }
        assert!(!retriever.is_requested(&key));
        assert!(cache.is_resident(&key));
        assert!(cache.disk().contains(&key));
    }

    #[tokio::test]
    async fn test_failure_marks_absent() {
        let dir = TempDir::new().unwrap();
        let (retriever, service, _cache) = setup(&dir);
        let key = TileKey::new(0, 0, 0);

        let handle = retriever.request(key).unwrap();
        service.complete_all(Err(ProviderError::HttpError("HTTP 404".to_string())));
        assert_eq!(handle.wait().await, FetchOutcome::Absent);
        assert_eq!(retriever.absent().record(&key).unwrap().failures, 1);
        assert!(!retriever.is_requested(&key));

        // One failure does not exceed the max of 1; the second does.
        let handle = retriever.request(key).unwrap();
        service.complete_all(Err(ProviderError::HttpError("HTTP 404".to_string())));
        assert_eq!(handle.wait().await, FetchOutcome::Absent);
        assert!(retriever.request(key).is_none());
        assert_eq!(service.submitted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_waiting_caller_sees_quarantine_after_failed_fetch() {
        let dir = TempDir::new().unwrap();
        let (retriever, service, _cache) = setup(&dir);
        let key = TileKey::new(1, 0, 2);
        retriever.absent().mark_absent(key);

        // Second attempt in flight; a concurrent caller shares it.
        let first = retriever.request(key).unwrap();
        let second = retriever.request(key).unwrap();
        assert!(!retriever.absent().is_absent(&key));

        service.complete_all(Err(ProviderError::Timeout("read".to_string())));
        assert_eq!(first.wait().await, FetchOutcome::Absent);
        assert_eq!(second.wait().await, FetchOutcome::Absent);

        // The slot is free again but the tile is now quarantined.
        assert!(!retriever.is_requested(&key));
        assert!(retriever.request(key).is_none());
        assert!(retriever.pending(&key).is_none());
        assert_eq!(service.submitted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_absent() {
        let dir = TempDir::new().unwrap();
        let (retriever, service, cache) = setup(&dir);
        let key = TileKey::new(0, 0, 1);

        let handle = retriever.request(key).unwrap();
        service.complete_all(Ok(vec![0u8; 3]));
        assert_eq!(handle.wait().await, FetchOutcome::Absent);
        assert!(!cache.is_resident(&key));
        assert!(retriever.absent().record(&key).is_some());
    }

    #[test]
    fn test_resident_tile_is_not_requested() {
        let dir = TempDir::new().unwrap();
        let (retriever, service, cache) = setup(&dir);
        let key = TileKey::new(0, 1, 1);
        cache.insert_samples(&key, vec![0.0; 4]).unwrap();

        assert!(retriever.request(key).is_none());
        assert_eq!(service.submitted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_network_retrieval_disabled() {
        let dir = TempDir::new().unwrap();
        let (mut retriever, service, _cache) = setup(&dir);
        retriever.config.network_retrieval = false;
        assert!(retriever.request(TileKey::new(0, 0, 0)).is_none());
        assert_eq!(service.submitted.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_request_url_uses_builder() {
        let dir = TempDir::new().unwrap();
        let (retriever, service, _cache) = setup(&dir);
        retriever.request(TileKey::new(2, 5, 9));
        let pending = service.pending.lock();
        assert_eq!(
            pending[0].0.url,
            "http://tiles.example.com?T=test&L=2&X=9&Y=5&F=application/bil16"
        );
    }
}
