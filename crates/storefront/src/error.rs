//! Unified error handling for storefront operations.
//!
//! Every public query and command returns [`Result<T>`]. API failures have
//! already been shown to the user by the time the caller sees them; the
//! remaining variants are local.

use std::sync::Arc;

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::forms::FieldErrors;
use crate::storage::StorageError;

/// Storefront-level error type.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Remote API call failed. Shared because deduplicated query readers all
    /// observe the same failure.
    #[error(transparent)]
    Api(Arc<ApiError>),

    /// Local durable storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Form input was rejected before anything was sent.
    #[error("Validation failed: {0}")]
    Validation(#[from] FieldErrors),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StorefrontError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    /// The underlying API error, if this came from the network.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApiError> for StorefrontError {
    fn from(e: ApiError) -> Self {
        Self::Api(Arc::new(e))
    }
}

impl From<Arc<ApiError>> for StorefrontError {
    fn from(e: Arc<ApiError>) -> Self {
        Self::Api(e)
    }
}

/// Result type alias for storefront operations.
pub type Result<T> = std::result::Result<T, StorefrontError>;
