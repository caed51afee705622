//! Remote market data API abstraction.
//!
//! [`MarketDataApi`] is a single HTTP call through a given proxy: no retries,
//! no parsing. The scheduler owns retry policy and hands the raw body to the
//! pure parser in [`binance_rest::parser`].
//!
//! # Example
//!
//! ```rust
//! # use async_trait::async_trait;
//! # use history_ingestor::models::{ProxyEndpoint, Resource, TimeWindow};
//! # use history_ingestor::providers::{FetchError, MarketDataApi, RawResponse};
//! struct Canned;
//!
//! #[async_trait]
//! impl MarketDataApi for Canned {
//!     async fn fetch(
//!         &self,
//!         _resource: &Resource,
//!         _window: &TimeWindow,
//!         _proxy: &ProxyEndpoint,
//!     ) -> Result<RawResponse, FetchError> {
//!         Ok(RawResponse::ok("[]"))
//!     }
//! }
//! ```

pub mod binance_rest;

use async_trait::async_trait;
use shared_utils::env::EnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{ProxyEndpoint, Resource, TimeWindow};

pub use binance_rest::parser::MalformedResponse;

/// Body of a successful (2xx) remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FetchError {
    /// Connection reset, timeout, throttling. Worth another go through a different proxy.
    #[snafu(display("transient failure via {proxy}: {message}"))]
    Transient { proxy: String, message: String },

    /// The remote answered, but not with something usable. Never retried.
    #[snafu(display("malformed response: {source}"))]
    Malformed { source: MalformedResponse },

    /// The request could not even be built (bad proxy url, missing credentials).
    #[snafu(display("cannot build request via {proxy}: {message}"))]
    Setup { proxy: String, message: String },

    /// Full pages kept coming but paging forward made no progress. Never retried.
    #[snafu(display("{window} capped at {limit} rows and paging cannot advance past {cursor}"))]
    Truncated {
        window: String,
        limit: u16,
        cursor: String,
    },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<MalformedResponse> for FetchError {
    fn from(source: MalformedResponse) -> Self {
        Self::Malformed { source }
    }
}

/// Errors constructing a provider.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    #[snafu(display("Missing environment variable"), context(false))]
    MissingEnvVar {
        source: EnvVarError,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid API key header value"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid base url {url:?}"))]
    InvalidBaseUrl { url: String, backtrace: Backtrace },
}

#[async_trait]
pub trait MarketDataApi: Send + Sync {
    /// Issues one call for `window` of `resource`, routed through `proxy`.
    async fn fetch(
        &self,
        resource: &Resource,
        window: &TimeWindow,
        proxy: &ProxyEndpoint,
    ) -> Result<RawResponse, FetchError>;
}
