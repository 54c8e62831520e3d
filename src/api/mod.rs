//! Client side of the scanning service.
//!
//! [`ScanApi`] is the seam every context talks through; [`HttpScanApi`] is
//! the reqwest implementation used against the local service.

mod http;

pub use http::{HttpScanApi, DEFAULT_BASE_URL};

use crate::model::{RateLimitStatus, ScanMode, ScanResult};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The service answered with a non-success status.
    #[error("API Error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Connection to scanner failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from scanner: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid API address: {0}")]
    Address(String),

    #[error("API not available on any URL")]
    Unavailable,
}

impl ApiError {
    /// Body text of a non-success response, if any.
    pub fn details(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ScanApi: Send + Sync {
    /// Liveness probe against the service root.
    async fn probe(&self) -> Result<(), ApiError>;

    async fn scan(&self, url: &str, mode: ScanMode) -> Result<ScanResult, ApiError>;

    async fn rate_limits(&self) -> Result<RateLimitStatus, ApiError>;
}
