//! Client configuration.
//!
//! # Example
//!
//! ```rust
//! use xxkcd_core::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .workers(8)
//!     .chunk_size(4096)
//!     .timeout(10)
//!     .build();
//! assert_eq!(config.workers, 8);
//! ```

use crate::constants::{DEFAULT_CHUNK_SIZE, DEFAULT_SAFE_THRESHOLD, DEFAULT_WORKERS};
use crate::fetch::FetchConfig;

/// Settings shared by [`Xkcd`](crate::Xkcd) and [`WhatIf`](crate::WhatIf).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Comic numbers below this are used as-is without asking for the
    /// latest number (default: 1951). `None` always asks.
    pub safe_threshold: Option<u32>,

    /// Worker threads used by parallel bulk loads (default: 4).
    pub workers: usize,

    /// Chunk size for image streaming (default: 16384).
    pub chunk_size: usize,

    /// HTTP settings for the default transport.
    pub fetch: FetchConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            safe_threshold: Some(DEFAULT_SAFE_THRESHOLD),
            workers: DEFAULT_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            fetch: FetchConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a new builder for ClientConfig.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

/// Builder for ClientConfig.
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: ClientConfig::default() }
    }

    /// Sets the safe threshold; `None` disables the shortcut.
    pub fn safe_threshold(mut self, value: Option<u32>) -> Self {
        self.config.safe_threshold = value;
        self
    }

    /// Sets the bulk-load worker count. Zero is treated as one.
    pub fn workers(mut self, value: usize) -> Self {
        self.config.workers = value.max(1);
        self
    }

    /// Sets the image streaming chunk size. Zero is treated as one.
    pub fn chunk_size(mut self, value: usize) -> Self {
        self.config.chunk_size = value.max(1);
        self
    }

    /// Sets the HTTP timeout in seconds.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.config.fetch.timeout = secs;
        self
    }

    /// Sets the HTTP User-Agent.
    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.config.fetch.user_agent = value.into();
        self
    }

    /// Builds the config.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.safe_threshold, Some(1951));
        assert_eq!(config.workers, 4);
        assert_eq!(config.chunk_size, 16384);
        assert_eq!(config.fetch.timeout, 30);
    }

    #[test]
    fn test_builder_clamps_zero() {
        let config = ClientConfig::builder().workers(0).chunk_size(0).build();
        assert_eq!(config.workers, 1);
        assert_eq!(config.chunk_size, 1);
    }

    #[test]
    fn test_builder_fetch_settings() {
        let config = ClientConfig::builder()
            .safe_threshold(None)
            .timeout(5)
            .user_agent("test-agent")
            .build();
        assert_eq!(config.safe_threshold, None);
        assert_eq!(config.fetch.timeout, 5);
        assert_eq!(config.fetch.user_agent, "test-agent");
    }
}
