//! Storefront REST client implementation.
//!
//! Uses `reqwest` with a fixed base URL and timeout. The bearer token is read
//! from the [`SessionStore`] for every request.

use std::sync::Arc;

use reqwest::header::{ACCEPT, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{Span, debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::{ApiError, error_message};
use crate::config::StorefrontConfig;
use crate::notify::Notifier;
use crate::session::SessionStore;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Notification shown when the API rejects the stored token.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront REST API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: Arc<SessionStore>,
    notifier: Notifier,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(
        config: &StorefrontConfig,
        session: Arc<SessionStore>,
        notifier: Notifier,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_base_url.clone(),
                session,
                notifier,
            }),
        })
    }

    /// The base URL every endpoint path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve an endpoint path (leading `/` optional) against the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidEndpoint` if the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| ApiError::InvalidEndpoint {
                path: path.to_string(),
                source,
            })
    }

    // =========================================================================
    // Interceptor-wrapped helpers (failures are surfaced to the user)
    // =========================================================================

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body does not decode.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let result = self.fetch(Method::GET, path).await;
        self.intercept(result)
    }

    /// Send `body` as JSON and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body does not decode.
    pub async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let result = match self.execute(method, path, body).await {
            Ok(text) => parse_body(&text),
            Err(e) => Err(e),
        };
        self.intercept(result)
    }

    /// Send `body` as JSON and ignore whatever the server answers on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn send_ignoring_body<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let result = self.execute(method, path, body).await.map(drop);
        self.intercept(result)
    }

    /// Surface a failure to the user, as the interceptor does.
    pub fn surface(&self, error: &ApiError) {
        self.inner.notifier.error(error.user_message());
    }

    fn intercept<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result {
            self.surface(e);
        }
        result
    }

    // =========================================================================
    // Raw requests (no user notification; used by the query layer's retries)
    // =========================================================================

    /// `GET` a JSON resource without surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body does not decode.
    pub async fn fetch<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, ApiError> {
        let text = self.execute::<()>(method, path, None).await?;
        parse_body(&text)
    }

    /// Issue one request and return the raw success body.
    #[instrument(skip(self, body), fields(request_id = tracing::field::Empty))]
    async fn execute<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String, ApiError>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.endpoint(path)?;
        let request_id = Uuid::new_v4().to_string();
        Span::current().record("request_id", request_id.as_str());

        let mut request = self
            .inner
            .client
            .request(method, url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(REQUEST_ID_HEADER, request_id.as_str());

        // Token is read per request so login/logout apply without a rebuild
        let token = self.inner.session.token();
        if let Some(token) = &token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.inspect_err(|e| {
            warn!(error = %e, timeout = e.is_timeout(), "Request did not complete");
        })?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            debug!(%status, "Request succeeded");
            return Ok(text);
        }

        let message = error_message(status, &text);
        warn!(
            %status,
            message = %message,
            body = %text.chars().take(500).collect::<String>(),
            "API returned non-success status"
        );

        if status == StatusCode::UNAUTHORIZED
            && let Some(token) = &token
            && self.inner.session.expire(token)
        {
            self.inner.notifier.info(SESSION_EXPIRED_MESSAGE);
        }

        Err(ApiError::Server { status, message })
    }
}

/// Decode a success body; an empty body decodes as JSON `null`.
fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let text = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(text).map_err(|e| {
        warn!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse API response"
        );
        ApiError::Decode(e.to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn client(base: &str) -> ApiClient {
        let config = StorefrontConfig::with_base_url(base, ".").unwrap();
        let session = Arc::new(SessionStore::initialize_from_storage(Arc::new(
            MemoryStore::new(),
        )));
        let (notifier, _rx) = Notifier::channel();
        ApiClient::new(&config, session, notifier).unwrap()
    }

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let api = client("https://shop.example/api");
        assert_eq!(
            api.endpoint("/Carts/increaseCount/7").unwrap().as_str(),
            "https://shop.example/api/Carts/increaseCount/7"
        );
        assert_eq!(
            api.endpoint("Account/login").unwrap().as_str(),
            "https://shop.example/api/Account/login"
        );
    }

    #[test]
    fn test_parse_body_empty_is_null() {
        let value: serde_json::Value = parse_body("  ").unwrap();
        assert!(value.is_null());
        let (): () = parse_body("").unwrap();
    }

    #[test]
    fn test_parse_body_mismatch_is_decode_error() {
        let err = parse_body::<Vec<u32>>(r#"{"oops":true}"#).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn test_debug_shows_base_url_only() {
        let api = client("https://shop.example/api/");
        assert!(format!("{api:?}").contains("https://shop.example/api/"));
    }
}
