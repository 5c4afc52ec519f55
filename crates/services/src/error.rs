//! Shared error types for the services crate.

use thiserror::Error;

/// Errors emitted by quiz gateway adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("quiz gateway is not configured")]
    Disabled,
    #[error("gateway request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("gateway returned an empty payload")]
    EmptyPayload,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
