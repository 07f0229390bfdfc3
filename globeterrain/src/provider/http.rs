//! Blocking transport for tile and composite requests.

use std::time::Duration;

use super::types::ProviderError;

/// Default time allowed to establish a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed to read a tile response.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Fetches the body behind a URL.
///
/// Retrieval services and composite requests go through this trait so tests
/// can substitute canned responses.
pub trait HttpClient: Send + Sync {
    /// Performs a GET request, failing if the body has not arrived within
    /// `read_timeout`.
    fn get(&self, url: &str, read_timeout: Duration) -> Result<Vec<u8>, ProviderError>;
}

/// [`HttpClient`] backed by a blocking reqwest client.
///
/// `file://` URLs are served from the local filesystem so local raster
/// sources share the same retrieval path as network ones.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Client with [`DEFAULT_CONNECT_TIMEOUT`].
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Client that gives up connecting after `connect_timeout`.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("globeterrain/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ProviderError::HttpError(format!("cannot build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, read_timeout: Duration) -> Result<Vec<u8>, ProviderError> {
        if let Some(path) = url.strip_prefix("file://") {
            return read_local(path);
        }

        let response = self
            .client
            .get(url)
            .timeout(read_timeout)
            .send()
            .map_err(|e| request_error(url, e))?;

        if !response.status().is_success() {
            return Err(ProviderError::HttpError(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| request_error(url, e))
    }
}

fn request_error(url: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(url.to_string())
    } else {
        ProviderError::HttpError(format!("{}: {}", url, e))
    }
}

fn read_local(path: &str) -> Result<Vec<u8>, ProviderError> {
    std::fs::read(path).map_err(|e| ProviderError::Io(format!("{}: {}", path, e)))
}
