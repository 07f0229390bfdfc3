//! Retrieval services: where tile requests are executed.
//!
//! The service decides how and where a URL is fetched; the retriever only
//! hands over a request and a completion callback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::provider::{HttpClient, ProviderError};

/// Default maximum number of concurrent fetches.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// One fetch to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub url: String,
    pub read_timeout: Duration,
}

/// Invoked exactly once with the fetched bytes or the failure.
pub type RetrievalCallback = Box<dyn FnOnce(Result<Bytes, ProviderError>) + Send + 'static>;

/// Executes retrieval requests asynchronously.
pub trait RetrievalService: Send + Sync {
    /// Queue a request. `on_complete` runs when it finishes, possibly on
    /// another thread.
    fn submit(&self, request: RetrievalRequest, on_complete: RetrievalCallback);

    /// Requests queued or running.
    fn active_count(&self) -> usize {
        0
    }
}

/// Retrieval service running blocking HTTP fetches on a tokio runtime.
///
/// Concurrency is bounded by a semaphore; each fetch and its completion
/// callback run on the blocking pool so decoding and disk writes never stall
/// async workers.
pub struct PooledRetrievalService {
    handle: Handle,
    client: Arc<dyn HttpClient>,
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
}

impl PooledRetrievalService {
    pub fn new(handle: Handle, client: Arc<dyn HttpClient>, max_concurrent: usize) -> Self {
        Self {
            handle,
            client,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl RetrievalService for PooledRetrievalService {
    fn submit(&self, request: RetrievalRequest, on_complete: RetrievalCallback) {
        let client = Arc::clone(&self.client);
        let permits = Arc::clone(&self.permits);
        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::Relaxed);

        self.handle.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let url = request.url.clone();
            debug!(url = %url, "Retrieving");

            let result = tokio::task::spawn_blocking(move || {
                client.get(&request.url, request.read_timeout)
            })
            .await
            .unwrap_or_else(|e| Err(ProviderError::HttpError(format!("Retrieval task failed: {}", e))));

            if let Err(e) = &result {
                debug!(url = %url, error = %e, "Retrieval failed");
            }

            let completion =
                tokio::task::spawn_blocking(move || on_complete(result.map(Bytes::from))).await;
            if let Err(e) = completion {
                warn!(url = %url, error = %e, "Retrieval callback panicked");
            }
            active.fetch_sub(1, Ordering::Relaxed);
        });
    }

    fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockHttpClient;
    use tokio::sync::oneshot;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_delivers_bytes() {
        let client = Arc::new(MockHttpClient::new(Ok(vec![1, 2, 3])));
        let service = PooledRetrievalService::new(Handle::current(), client.clone(), 2);

        let (tx, rx) = oneshot::channel();
        service.submit(
            RetrievalRequest {
                url: "http://example.com/tile".to_string(),
                read_timeout: Duration::from_secs(1),
            },
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );

        let result = rx.await.unwrap();
        assert_eq!(result.unwrap(), Bytes::from_static(&[1, 2, 3]));
        assert_eq!(
            client.last_url.lock().unwrap().as_deref(),
            Some("http://example.com/tile")
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_delivers_failure() {
        let client = Arc::new(MockHttpClient::new(Err(ProviderError::Timeout(
            "http://example.com".to_string(),
        ))));
        let service = PooledRetrievalService::new(Handle::current(), client, 1);

        let (tx, rx) = oneshot::channel();
        service.submit(
            RetrievalRequest {
                url: "http://example.com".to_string(),
                read_timeout: Duration::from_secs(1),
            },
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );

        assert!(matches!(rx.await.unwrap(), Err(ProviderError::Timeout(_))));
    }
}
