//! Gateway to the remote storefront REST API.
//!
//! # Architecture
//!
//! - One `reqwest` client per [`Storefront`](crate::state::Storefront), with a
//!   base URL and request timeout fixed at construction
//! - The bearer token is read from the session on every request, so logging
//!   in or out takes effect immediately without rebuilding the client
//! - Every request carries a fresh `x-request-id`
//! - Error responses are reduced to the server's human-readable `message`
//!   and surfaced as a user notification (the "interceptor")
//! - A 401 on an authenticated request clears the session

mod client;
pub mod types;

pub use client::{ApiClient, REQUEST_ID_HEADER, SESSION_EXPIRED_MESSAGE};
pub use types::*;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Fallback text when neither the server nor the transport explains a failure.
pub const GENERIC_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Errors that can occur when calling the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request never produced a response (DNS, connect, TLS, timeout).
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Server { status: StatusCode, message: String },

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Decode(String),

    /// Endpoint path could not be joined onto the base URL.
    #[error("Invalid endpoint '{path}': {source}")]
    InvalidEndpoint {
        path: String,
        #[source]
        source: url::ParseError,
    },

    /// Response was successful but lacked something the client needs.
    #[error("{0}")]
    Unexpected(String),
}

impl ApiError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Server { message, .. } | Self::Unexpected(message) => message.clone(),
            Self::Transport(e) if e.is_timeout() => "The request timed out".to_string(),
            Self::Transport(e) => e.to_string(),
            Self::Decode(_) | Self::InvalidEndpoint { .. } => GENERIC_ERROR_MESSAGE.to_string(),
        };
        if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }

    /// HTTP status, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Server { status, .. } => {
                status.is_server_error()
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Whether the server rejected the credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Whether the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Error payload shape. ASP.NET problem details use `title`; the storefront
/// endpoints use `message`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    title: Option<String>,
}

/// Extract the human-readable message from an error response body.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.title))
        .filter(|m| !m.trim().is_empty());

    from_json.unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_message_field() {
        let body = r#"{"message":"Product is out of stock","title":"Bad Request"}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "Product is out of stock"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_title() {
        let body = r#"{"title":"One or more validation errors occurred.","status":400}"#;
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, body),
            "One or more validation errors occurred."
        );
    }

    #[test]
    fn test_error_message_falls_back_to_status() {
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, "<html>nope</html>"),
            "Request failed with status code 404"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"message":"  "}"#),
            "Request failed with status code 500"
        );
    }

    #[test]
    fn test_transient_classification() {
        let server = |status| ApiError::Server {
            status,
            message: String::new(),
        };
        assert!(server(StatusCode::BAD_GATEWAY).is_transient());
        assert!(server(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!server(StatusCode::BAD_REQUEST).is_transient());
        assert!(!server(StatusCode::UNAUTHORIZED).is_transient());
        assert!(!ApiError::Decode("x".to_string()).is_transient());
    }

    #[test]
    fn test_user_message_never_blank() {
        let err = ApiError::Server {
            status: StatusCode::BAD_REQUEST,
            message: String::new(),
        };
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);

        let err = ApiError::Decode("expected array".to_string());
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);

        let err = ApiError::Unexpected("Payment URL not found".to_string());
        assert_eq!(err.user_message(), "Payment URL not found");
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::Server {
            status: StatusCode::NOT_FOUND,
            message: "Category not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 404 Not Found - Category not found");
        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());
    }
}
