//! Error types for enrichment lookups.
//!
//! These stay internal to the lookup plumbing; the public lookup APIs
//! absorb failures into absent values so a trace always completes.

use thiserror::Error;

/// Enrichment lookup errors.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error.
    #[error("API error: {0}")]
    Api(String),
}

/// Result type for enrichment operations.
pub type EnrichResult<T> = Result<T, EnrichError>;
