//! Integration tests for the elevation model.
//!
//! These tests drive the model through its public API with counting
//! retrieval services:
//! - many concurrent callers share one fetch per tile
//! - failing tiles are quarantined and retried after the check interval
//! - missing-data samples map to the replacement value
//! - extremes come from the precomputed table without any I/O
//! - a local tile tree is fetched end to end through an owned runtime
//!
//! Run with: `cargo test --test elevation_model_integration`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use globeterrain::app::{ContextConfig, EngineContext};
use globeterrain::cache::{FileTileStore, RasterFormat};
use globeterrain::coord::Sector;
use globeterrain::elevation::{ElevationModel, ElevationModelConfig, ModelServices, TileState};
use globeterrain::level::TileKey;
use globeterrain::provider::{HttpClient, ProviderError, ProviderKind};
use globeterrain::retrieve::{FetchOutcome, RetrievalCallback, RetrievalRequest, RetrievalService};

// ============================================================================
// Helpers
// ============================================================================

const SIGNAL: f64 = -9999.0;
const REPLACEMENT: f64 = 0.0;

/// Holds completions until the test releases them.
#[derive(Default)]
struct DeferredService {
    submitted: AtomicUsize,
    pending: Mutex<Vec<RetrievalCallback>>,
}

impl DeferredService {
    fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    fn complete_all(&self, result: Result<Vec<u8>, ProviderError>) {
        let callbacks: Vec<_> = self.pending.lock().drain(..).collect();
        for callback in callbacks {
            callback(result.clone().map(Bytes::from));
        }
    }
}

impl RetrievalService for DeferredService {
    fn submit(&self, _request: RetrievalRequest, on_complete: RetrievalCallback) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().push(on_complete);
    }
}

/// Completes every request immediately with the same response.
struct ImmediateService {
    response: Result<Vec<u8>, ProviderError>,
    submitted: AtomicUsize,
}

impl ImmediateService {
    fn new(response: Result<Vec<u8>, ProviderError>) -> Self {
        Self {
            response,
            submitted: AtomicUsize::new(0),
        }
    }

    fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

impl RetrievalService for ImmediateService {
    fn submit(&self, _request: RetrievalRequest, on_complete: RetrievalCallback) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        on_complete(self.response.clone().map(Bytes::from));
    }
}

struct RefusingClient;

impl HttpClient for RefusingClient {
    fn get(&self, url: &str, _read_timeout: Duration) -> Result<Vec<u8>, ProviderError> {
        Err(ProviderError::HttpError(format!("unexpected request {}", url)))
    }
}

/// Two levels of 90° and 45° tiles with 3x3 samples.
fn dataset() -> ElevationModelConfig {
    ElevationModelConfig::new(
        "testdem",
        "Earth/TestDEM",
        "https://tiles.example.com/dem",
        "EPSG:4326",
    )
    .with_level_zero_tile_delta(90.0, 90.0)
    .with_tile_size(3, 3)
    .with_num_levels(2)
    .with_missing_data(Some(SIGNAL), REPLACEMENT)
}

fn build_model(
    config: ElevationModelConfig,
    dir: &TempDir,
    retrieval: Arc<dyn RetrievalService>,
) -> ElevationModel {
    let services = ModelServices {
        store: Arc::new(FileTileStore::new(dir.path())),
        retrieval,
        compose_client: Arc::new(RefusingClient),
        memory_cache_bytes: 4 * 1024 * 1024,
    };
    ElevationModel::new(config, services).expect("model")
}

fn encode(samples: &[f32]) -> Vec<u8> {
    RasterFormat::default().encode(samples)
}

fn fine_key(model: &ElevationModel, lat: f64, lon: f64) -> TileKey {
    model.level_set().tile_for_location(1, lat, lon).unwrap()
}

// ============================================================================
// Request coalescing
// ============================================================================

#[test]
fn test_hundred_callers_share_one_fetch() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(DeferredService::default());
    let model = build_model(dataset(), &dir, service.clone());
    let key = fine_key(&model, 10.0, 10.0);

    let barrier = Barrier::new(100);
    let handles: Vec<_> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..100)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    let value = model.get_elevation(10.0, 10.0).unwrap();
                    assert_eq!(value, REPLACEMENT);
                    model.retriever().request(key)
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(service.submitted(), 1);
    assert_eq!(model.tile_state(&key), TileState::Requested);
    assert!(handles.iter().all(|h| h.is_some()));

    service.complete_all(Ok(encode(&[250.0; 9])));

    for handle in handles.into_iter().flatten() {
        assert_eq!(handle.outcome(), Some(FetchOutcome::Resident));
    }
    assert_eq!(model.tile_state(&key), TileState::Resident);
    assert_eq!(model.get_elevation(10.0, 10.0).unwrap(), 250.0);
    assert_eq!(service.submitted(), 1);
    assert_eq!(model.retriever().in_flight_count(), 0);
}

#[test]
fn test_batch_query_matches_point_queries() {
    let dir = TempDir::new().unwrap();
    let ramp: Vec<f32> = (0..9).map(|i| i as f32 * 100.0).collect();
    let service = Arc::new(ImmediateService::new(Ok(encode(&ramp))));
    let model = build_model(dataset(), &dir, service);

    // Make the level 1 tile over [0,45] x [0,45] resident.
    model.get_elevation(10.0, 10.0).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let points: Vec<(f64, f64)> = (0..200)
        .map(|_| (rng.random_range(0.5..44.5), rng.random_range(0.5..44.5)))
        .collect();
    let sector = Sector::new(0.0, 45.0, 0.0, 45.0).unwrap();
    let mut out = vec![0.0; points.len()];
    let achieved = model.get_elevations(&sector, &points, &[15.0], &mut out).unwrap();

    assert_eq!(achieved, vec![15.0]);
    for (value, &(lat, lon)) in out.iter().zip(&points) {
        assert_eq!(*value, model.get_elevation(lat, lon).unwrap());
    }
}

// ============================================================================
// Absent-tile quarantine
// ============================================================================

#[test]
fn test_failing_tile_is_quarantined() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(ImmediateService::new(Err(ProviderError::HttpError(
        "HTTP 404".to_string(),
    ))));
    let model = build_model(
        dataset().with_absent_policy(2, Duration::from_secs(3600)),
        &dir,
        service.clone(),
    );
    let key = fine_key(&model, 10.0, 10.0);

    // Failures up to the attempt limit keep the tile eligible.
    for _ in 0..3 {
        let handle = model.retriever().request(key).expect("fetch started");
        assert_eq!(handle.outcome(), Some(FetchOutcome::Absent));
    }
    assert_eq!(service.submitted(), 3);
    assert_eq!(model.tile_state(&key), TileState::Absent);

    // Quarantined: no further fetches, queries still answer.
    assert!(model.retriever().request(key).is_none());
    assert_eq!(service.submitted(), 3);
    assert_eq!(model.get_elevation(10.0, 10.0).unwrap(), REPLACEMENT);
    assert!(model.retriever().request(key).is_none());
}

#[test]
fn test_quarantine_expires_after_interval() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(ImmediateService::new(Err(ProviderError::Timeout(
        "read".to_string(),
    ))));
    let model = build_model(
        dataset().with_absent_policy(0, Duration::from_millis(50)),
        &dir,
        service.clone(),
    );
    let key = fine_key(&model, 10.0, 10.0);

    model.retriever().request(key);
    assert_eq!(model.tile_state(&key), TileState::Absent);
    assert!(model.retriever().request(key).is_none());

    std::thread::sleep(Duration::from_millis(120));
    assert_eq!(model.tile_state(&key), TileState::Unrequested);
    assert!(model.retriever().request(key).is_some());
    assert_eq!(service.submitted(), 2);
}

// ============================================================================
// Missing-data mapping
// ============================================================================

#[test]
fn test_signal_samples_report_replacement() {
    let dir = TempDir::new().unwrap();
    // Every sample is the signal except the south-east corner.
    let mut samples = [SIGNAL as f32; 9];
    samples[8] = 1200.0;
    let service = Arc::new(ImmediateService::new(Ok(encode(&samples))));
    let model = build_model(dataset().with_bilinear(false), &dir, service);

    // Level 1 tile for (10, 10) spans [0,45] x [0,45].
    assert_eq!(model.get_elevation(40.0, 5.0).unwrap(), REPLACEMENT);
    assert_eq!(model.get_elevation(1.0, 44.0).unwrap(), 1200.0);

    let tile_sector = Sector::new(0.0, 45.0, 0.0, 45.0).unwrap();
    model.cache().memory().run_pending_tasks();
    assert_eq!(
        model.get_extreme_elevations(&tile_sector).unwrap(),
        (1200.0, 1200.0)
    );
}

// ============================================================================
// Extremes table
// ============================================================================

#[test]
fn test_extremes_from_table_are_stable_and_free_of_io() {
    let dir = TempDir::new().unwrap();
    let table_path = dir.path().join("extremes").join("testdem.bin");

    // Populate the disk cache at level 0 and build the table from it.
    {
        let builder = build_model(dataset(), &dir, Arc::new(DeferredService::default()));
        let key = builder.level_set().tile_for_location(0, 45.0, 45.0).unwrap();
        builder
            .cache()
            .insert_samples(&key, vec![-20.0, 15.0, SIGNAL as f32, 300.0, 2500.0, 40.0, 0.0, 1.0, 2.0])
            .unwrap();
        builder.build_extremes().unwrap().save(&table_path).unwrap();
    }

    let service = Arc::new(DeferredService::default());
    let model = build_model(
        dataset().with_extremes_file(table_path, 0),
        &dir,
        service.clone(),
    );
    assert!(model.extremes_table().is_some());

    let sector = Sector::new(10.0, 20.0, 10.0, 20.0).unwrap();
    let first = model.get_extreme_elevations(&sector).unwrap();
    let second = model.get_extreme_elevations(&sector).unwrap();
    assert_eq!(first, (-20.0, 2500.0));
    assert_eq!(first, second);
    assert_eq!(model.get_extreme_elevations_at(15.0, 15.0).unwrap(), first);

    let stats = model.cache_stats();
    assert_eq!(service.submitted(), 0);
    assert_eq!(stats.disk_hits + stats.disk_misses, 0);
}

// ============================================================================
// End to end over a local tile tree
// ============================================================================

#[test]
fn test_local_tiles_fetched_through_owned_runtime() {
    let source = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();

    let mut config = dataset()
        .with_provider(ProviderKind::Local)
        .with_missing_data(Some(SIGNAL), REPLACEMENT);
    config.service_url = format!("file://{}", source.path().display());
    config.local_root = Some(source.path().to_path_buf());

    let context = EngineContext::start(ContextConfig::new(cache.path()), vec![config]).unwrap();
    let model = context.model("testdem").unwrap();
    let key = fine_key(&model, 10.0, 10.0);

    let tile_dir = source.path().join("1").join(key.row.to_string());
    std::fs::create_dir_all(&tile_dir).unwrap();
    std::fs::write(
        tile_dir.join(format!("{}_{}.bil", key.row, key.col)),
        encode(&[812.0; 9]),
    )
    .unwrap();

    let handle = model.retriever().request(key).expect("fetch started");
    let runtime = context.runtime_handle().expect("owned runtime");
    assert_eq!(runtime.block_on(handle.wait()), FetchOutcome::Resident);

    assert_eq!(model.get_elevation(10.0, 10.0).unwrap(), 812.0);
    assert!(model.cache().disk().contains(&key));
}
