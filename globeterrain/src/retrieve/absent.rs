//! Absent-tile bookkeeping.
//!
//! Tiles that repeatedly fail to retrieve are quarantined so the model stops
//! hammering the service for data that does not exist. A quarantined tile is
//! retried once `min_check_interval` has passed since its last attempt; a
//! success clears the record.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::level::TileKey;

/// Default number of failures tolerated before a tile is quarantined.
pub const DEFAULT_MAX_ABSENT_ATTEMPTS: u32 = 2;

/// Default quarantine duration.
pub const DEFAULT_MIN_ABSENT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Default upper bound on tracked tiles.
pub const DEFAULT_ABSENT_CAPACITY: usize = 2000;

/// Failure history of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsentTileRecord {
    pub key: TileKey,
    pub failures: u32,
    pub last_attempt: Instant,
}

/// Concurrent set of tiles that failed to retrieve.
#[derive(Debug)]
pub struct AbsentTileList {
    records: DashMap<TileKey, AbsentTileRecord>,
    max_attempts: u32,
    min_check_interval: Duration,
    capacity: usize,
}

impl AbsentTileList {
    pub fn new(max_attempts: u32, min_check_interval: Duration) -> Self {
        Self {
            records: DashMap::new(),
            max_attempts,
            min_check_interval,
            capacity: DEFAULT_ABSENT_CAPACITY,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn min_check_interval(&self) -> Duration {
        self.min_check_interval
    }

    /// Record a failed attempt now.
    pub fn mark_absent(&self, key: TileKey) {
        self.mark_absent_at(key, Instant::now());
    }

    /// Record a failed attempt at `now`.
    pub fn mark_absent_at(&self, key: TileKey, now: Instant) {
        let failures = {
            let mut record = self.records.entry(key).or_insert(AbsentTileRecord {
                key,
                failures: 0,
                last_attempt: now,
            });
            record.failures = record.failures.saturating_add(1);
            record.last_attempt = now;
            record.failures
        };
        debug!(
            level = key.level,
            row = key.row,
            col = key.col,
            failures,
            "Tile marked absent"
        );

        if self.records.len() > self.capacity {
            self.evict_oldest();
        }
    }

    /// Forget a tile's failures, typically after a successful fetch.
    pub fn unmark(&self, key: &TileKey) {
        self.records.remove(key);
    }

    /// True if the tile must not be requested now.
    pub fn is_absent(&self, key: &TileKey) -> bool {
        self.is_absent_at(key, Instant::now())
    }

    /// True if the tile must not be requested at `now`.
    ///
    /// A tile is quarantined once its failures exceed the maximum, until the
    /// check interval has elapsed since the last attempt.
    pub fn is_absent_at(&self, key: &TileKey, now: Instant) -> bool {
        match self.records.get(key) {
            Some(record) => {
                record.failures > self.max_attempts
                    && now.saturating_duration_since(record.last_attempt) < self.min_check_interval
            }
            None => false,
        }
    }

    pub fn record(&self, key: &TileKey) -> Option<AbsentTileRecord> {
        self.records.get(key).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    fn evict_oldest(&self) {
        let oldest = self
            .records
            .iter()
            .min_by_key(|entry| entry.last_attempt)
            .map(|entry| *entry.key());
        if let Some(key) = oldest {
            self.records.remove(&key);
        }
    }
}

impl Default for AbsentTileList {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ABSENT_ATTEMPTS, DEFAULT_MIN_ABSENT_CHECK_INTERVAL)
    }
}
