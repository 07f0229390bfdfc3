//! Tile retrieval
//!
//! Missing tiles are fetched asynchronously through a [`RetrievalService`]
//! using URLs from the dataset's URL builder. Repeated failures are tracked
//! in an [`AbsentTileList`]; concurrent requests for one tile share a single
//! fetch through a [`FetchHandle`].

mod absent;
mod retriever;
mod service;

pub use absent::{
    AbsentTileList, AbsentTileRecord, DEFAULT_ABSENT_CAPACITY, DEFAULT_MAX_ABSENT_ATTEMPTS,
    DEFAULT_MIN_ABSENT_CHECK_INTERVAL,
};
pub use retriever::{FetchHandle, FetchOutcome, RetrieverConfig, TileRetriever};
pub use service::{
    PooledRetrievalService, RetrievalCallback, RetrievalRequest, RetrievalService,
    DEFAULT_MAX_CONCURRENT_FETCHES,
};
