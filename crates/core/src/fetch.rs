//! Byte transports for the comic API, the what-if pages and images.
//!
//! Every network access goes through the [`Transport`] trait: open a URL,
//! get a readable stream, drop it to release the connection. The default
//! [`HttpTransport`] is a blocking reqwest client; [`MemoryTransport`]
//! serves canned bodies and counts requests, which makes it the transport of
//! choice for tests and for replaying offline snapshots.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{Result, XkcdError};

/// HTTP client configuration for fetching pages and images.
///
/// This struct controls timeout and user agent settings for HTTP requests.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            user_agent: concat!("xxkcd/", env!("CARGO_PKG_VERSION"), " (+https://github.com/MitalAshok/xxkcd)")
                .to_string(),
        }
    }
}

/// Something that can open a URL as a byte stream.
///
/// The returned reader owns the underlying connection; dropping it releases
/// the connection on every exit path. Implementations must be shareable
/// across threads because bulk loading fans requests out over workers.
pub trait Transport: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>>;
}

/// Blocking reqwest transport.
#[cfg(feature = "fetch")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    timeout: u64,
}

#[cfg(feature = "fetch")]
impl HttpTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .user_agent(&config.user_agent)
            .build()
            .map_err(XkcdError::HttpError)?;

        Ok(Self { client, timeout: config.timeout })
    }
}

#[cfg(feature = "fetch")]
impl Transport for HttpTransport {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        let parsed_url = url::Url::parse(url).map_err(|e| XkcdError::InvalidUrl(e.to_string()))?;

        debug!(%url, "opening connection");
        let response = self.client.get(parsed_url).send().map_err(|e| {
            if e.is_timeout() { XkcdError::Timeout { timeout: self.timeout } } else { XkcdError::HttpError(e) }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(XkcdError::Status { url: url.to_string(), status: status.as_u16() });
        }

        Ok(Box::new(response))
    }
}

/// In-memory transport mapping URLs to fixed bodies.
///
/// Each `open` is counted per URL, including misses, so tests can assert
/// exactly how many requests a cache produced.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    routes: RwLock<HashMap<String, Arc<[u8]>>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`, replacing any previous body.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        let body: Vec<u8> = body.into();
        self.routes.write().insert(url.into(), Arc::from(body));
    }

    /// Stop serving `url`; later opens fail with [`XkcdError::Unavailable`].
    pub fn remove(&self, url: &str) {
        self.routes.write().remove(url);
    }

    /// Number of times `url` was opened.
    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().get(url).copied().unwrap_or(0)
    }

    /// Number of opens across all URLs.
    pub fn total_hits(&self) -> usize {
        self.hits.lock().values().sum()
    }

    pub fn reset_hits(&self) {
        self.hits.lock().clear();
    }
}

impl Transport for MemoryTransport {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        *self.hits.lock().entry(url.to_string()).or_default() += 1;

        let body = self
            .routes
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| XkcdError::Unavailable { url: url.to_string() })?;

        Ok(Box::new(Cursor::new(body)))
    }
}

/// A response body read lazily in fixed-size chunks.
///
/// Not restartable. The connection is released as soon as the body is
/// exhausted, a read fails, or the stream is dropped.
pub struct ImageStream {
    reader: Option<Box<dyn Read + Send>>,
    chunk_size: usize,
}

impl ImageStream {
    pub fn new(reader: Box<dyn Read + Send>, chunk_size: usize) -> Self {
        Self { reader: Some(reader), chunk_size: chunk_size.max(1) }
    }
}

impl Iterator for ImageStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let mut chunk = Vec::with_capacity(self.chunk_size);

        let read = reader.take(self.chunk_size as u64).read_to_end(&mut chunk);

        match read {
            Ok(0) => {
                self.reader = None;
                None
            }
            Ok(_) => Some(Ok(chunk)),
            Err(err) => {
                self.reader = None;
                Some(Err(err.into()))
            }
        }
    }
}

impl std::iter::FusedIterator for ImageStream {}

/// Reads the whole body at `url`.
pub fn read_bytes(transport: &dyn Transport, url: &str) -> Result<Vec<u8>> {
    let mut reader = transport.open(url)?;
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    debug!(%url, bytes = buffer.len(), "fetched");
    Ok(buffer)
}

/// Reads the body at `url` as text, replacing invalid UTF-8.
pub fn read_text(transport: &dyn Transport, url: &str) -> Result<String> {
    let bytes = read_bytes(transport, url)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads and decodes a JSON document at `url`.
pub fn read_json<T: DeserializeOwned>(transport: &dyn Transport, url: &str) -> Result<T> {
    let bytes = read_bytes(transport, url)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, 30);
        assert!(config.user_agent.starts_with("xxkcd/"));
    }

    #[test]
    fn test_memory_transport_serves_and_counts() {
        let transport = MemoryTransport::new();
        transport.insert("https://example.com/a", "hello");

        let body = read_text(&transport, "https://example.com/a").unwrap();
        assert_eq!(body, "hello");
        assert_eq!(transport.hits("https://example.com/a"), 1);

        read_bytes(&transport, "https://example.com/a").unwrap();
        assert_eq!(transport.hits("https://example.com/a"), 2);
        assert_eq!(transport.total_hits(), 2);
    }

    #[test]
    fn test_memory_transport_miss() {
        let transport = MemoryTransport::new();
        let result = read_bytes(&transport, "https://example.com/missing");

        assert!(matches!(result, Err(XkcdError::Unavailable { .. })));
        assert_eq!(transport.hits("https://example.com/missing"), 1);
    }

    #[test]
    fn test_read_json_malformed() {
        let transport = MemoryTransport::new();
        transport.insert("https://example.com/x.json", "{not json");

        let result: Result<serde_json::Value> = read_json(&transport, "https://example.com/x.json");
        assert!(matches!(result, Err(XkcdError::Json(_))));
    }

    #[test]
    fn test_image_stream() {
        let transport = MemoryTransport::new();
        transport.insert("https://example.com/img.png", (0u8..10).collect::<Vec<_>>());

        let reader = transport.open("https://example.com/img.png").unwrap();
        let chunks: Vec<Vec<u8>> = ImageStream::new(reader, 4).collect::<Result<_>>().unwrap();

        assert_eq!(chunks, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9]]);
    }

    #[test]
    fn test_image_stream_empty_body() {
        let mut stream = ImageStream::new(Box::new(std::io::empty()), 16);
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn test_http_transport_invalid_url() {
        let transport = HttpTransport::new(&FetchConfig::default()).unwrap();
        let result = transport.open("not-a-url");

        assert!(matches!(result, Err(XkcdError::InvalidUrl(_))));
    }
}
