//! Integration test harness for the tshop storefront client.
//!
//! [`FakeApi`] serves a small in-memory imitation of the tshop REST API on an
//! ephemeral local port. It records every request it receives so tests can
//! assert on headers, request counts and bodies.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tshop-integration-tests
//! ```
//!
//! # Catalog
//!
//! | id | product | price | category |
//! |----|---------|-------|----------|
//! | 1  | Mug     | 4.50  | 1 Kitchen |
//! | 2  | Cap     | 10.00 | 1 Kitchen |
//! | 3  | Poster  | 7.25  | 2 Archive (inactive) |
//!
//! Category 3 (Empty) is active and answers 404 for its product list.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use tshop_storefront::Storefront;
use tshop_storefront::api::REQUEST_ID_HEADER;
use tshop_storefront::config::StorefrontConfig;
use tshop_storefront::notify::NotificationReceiver;
use tshop_storefront::storage::{KeyValueStore, MemoryStore, keys};

/// Token the fake API issues and accepts.
pub const VALID_TOKEN: &str = "jwt-token-1";

/// Password the fake API accepts for any e-mail.
pub const VALID_PASSWORD: &str = "correct-horse";

/// Verification code the fake API accepts.
pub const VALID_CODE: &str = "123456";

/// Address the fake API does not know.
pub const UNKNOWN_EMAIL: &str = "nobody@example.com";

/// Default payment page returned by checkout.
pub const PAYMENT_URL: &str = "https://pay.example/session/1";

/// (id, name, price in cents, category id)
const PRODUCTS: [(i64, &str, i64, i64); 3] = [
    (1, "Mug", 450, 1),
    (2, "Cap", 1000, 1),
    (3, "Poster", 725, 2),
];

/// (id, name, active)
const CATEGORIES: [(i64, &str, bool); 3] = [
    (1, "Kitchen", true),
    (2, "Archive", false),
    (3, "Empty", true),
];

/// One request as the fake API saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path below `/api/`, e.g. `Carts/7`.
    pub path: String,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
    pub body: Value,
}

/// Mutable state behind the fake API.
#[derive(Debug, Default)]
pub struct FakeState {
    requests: Mutex<Vec<RecordedRequest>>,
    scripted: Mutex<HashMap<String, VecDeque<StatusCode>>>,
    latency: Mutex<Option<Duration>>,
    tokens_revoked: AtomicBool,
    cart: Mutex<Vec<(i64, u32)>>,
    reviews: Mutex<HashMap<i64, Vec<Value>>>,
    orders: Mutex<Vec<Value>>,
    next_order_id: AtomicI64,
    checkout_response: Mutex<Option<Value>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeState {
    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// How many `method` requests hit `path` (below `/api/`).
    pub fn hits(&self, method: &Method, path: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Answer the next requests to `path` with `statuses`, in order, before
    /// behaving normally again.
    pub fn fail_next(&self, path: &str, statuses: impl IntoIterator<Item = StatusCode>) {
        lock(&self.scripted)
            .entry(path.to_string())
            .or_default()
            .extend(statuses);
    }

    /// Delay every response.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = Some(latency);
    }

    /// Make the server reject every token from now on.
    pub fn revoke_tokens(&self) {
        self.tokens_revoked.store(true, Ordering::SeqCst);
    }

    /// Replace the body `POST /CheckOuts/Pay` answers with.
    pub fn set_checkout_response(&self, body: Value) {
        *lock(&self.checkout_response) = Some(body);
    }

    /// Product id and count of each server-side cart line.
    pub fn cart_lines(&self) -> Vec<(i64, u32)> {
        lock(&self.cart).clone()
    }

    fn record(&self, request: RecordedRequest) {
        lock(&self.requests).push(request);
    }

    fn next_scripted(&self, path: &str) -> Option<StatusCode> {
        lock(&self.scripted).get_mut(path).and_then(VecDeque::pop_front)
    }
}

/// A running fake API.
#[derive(Debug)]
pub struct FakeApi {
    addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeApi {
    /// Bind to an ephemeral local port and start serving.
    ///
    /// The server lives as long as the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(FakeState::default());
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake API stopped");
            }
        });

        Ok(Self { addr, state })
    }

    /// Base URL clients should be configured with.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api/", self.addr)
    }

    #[must_use]
    pub fn state(&self) -> &FakeState {
        &self.state
    }

    /// Client configuration pointing at this server, with fast retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is rejected.
    pub fn config(
        &self,
        data_dir: impl Into<std::path::PathBuf>,
    ) -> Result<StorefrontConfig, tshop_storefront::config::ConfigError> {
        let mut config = StorefrontConfig::with_base_url(&self.base_url(), data_dir)?;
        config.query_retry_delay = Duration::from_millis(10);
        config.request_timeout = Duration::from_secs(5);
        Ok(config)
    }

    /// A storefront over `storage`, talking to this server.
    ///
    /// # Errors
    ///
    /// Returns an error if the storefront cannot be built.
    pub fn storefront(
        &self,
        storage: Arc<dyn KeyValueStore>,
    ) -> tshop_storefront::Result<(Storefront, NotificationReceiver)> {
        Storefront::new(self.config(".")?, storage)
    }

    /// A logged-out storefront with in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the storefront cannot be built.
    pub fn guest(&self) -> tshop_storefront::Result<(Storefront, NotificationReceiver)> {
        self.storefront(Arc::new(MemoryStore::new()))
    }

    /// A storefront that already holds a valid session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storefront cannot be built.
    pub fn customer(&self) -> tshop_storefront::Result<(Storefront, NotificationReceiver)> {
        self.storefront(Arc::new(MemoryStore::with_entries([
            (keys::TOKEN, VALID_TOKEN),
            (keys::ROLE, "Customer"),
        ])))
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn ok(body: Value) -> Response {
    Json(body).into_response()
}

fn empty() -> Response {
    StatusCode::OK.into_response()
}

#[allow(clippy::cast_precision_loss)]
fn amount(cents: i64) -> Value {
    json!(cents as f64 / 100.0)
}

fn product_row(id: i64) -> Option<(i64, &'static str, i64, i64)> {
    PRODUCTS.iter().copied().find(|(pid, ..)| *pid == id)
}

fn product_json(state: &FakeState, id: i64) -> Option<Value> {
    let (id, name, cents, category) = product_row(id)?;
    let reviews = lock(&state.reviews).get(&id).cloned().unwrap_or_default();
    Some(json!({
        "id": id,
        "name": name,
        "description": format!("A fine {name}"),
        "price": amount(cents),
        "images": null,
        "image": format!("https://img.example/{id}.png"),
        "stock": 10,
        "categoryId": category,
        "reviews": reviews,
    }))
}

fn catalog_in(state: &FakeState, category: Option<i64>) -> Value {
    PRODUCTS
        .iter()
        .filter(|(.., c)| category.is_none_or(|wanted| *c == wanted))
        .filter_map(|(id, ..)| product_json(state, *id))
        .collect()
}

fn category_json(id: i64) -> Option<Value> {
    CATEGORIES
        .iter()
        .find(|(cid, ..)| *cid == id)
        .map(|(id, name, status)| json!({ "id": id, "name": name, "status": status }))
}

fn cart_json(state: &FakeState) -> Value {
    let lines = lock(&state.cart).clone();
    let mut total = 0;
    let rows: Vec<Value> = lines
        .iter()
        .filter_map(|(id, count)| {
            let (id, name, cents, _) = product_row(*id)?;
            total += cents * i64::from(*count);
            Some(json!({
                "productId": id,
                "productName": name,
                "price": amount(cents),
                "count": count,
                "quantity": count,
            }))
        })
        .collect();
    json!({ "cartResponse": rows, "totalPrice": amount(total) })
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

fn change_count(state: &FakeState, id: i64, delta: i64) -> Response {
    let mut cart = lock(&state.cart);
    let Some(line) = cart.iter_mut().find(|(pid, _)| *pid == id) else {
        return message(StatusCode::NOT_FOUND, "Item not in cart");
    };
    let count = (i64::from(line.1) + delta).max(0);
    line.1 = u32::try_from(count).unwrap_or(0);
    cart.retain(|(_, count)| *count > 0);
    empty()
}

fn checkout(state: &FakeState) -> Response {
    let cart = cart_json(state);
    lock(&state.cart).clear();

    let id = state.next_order_id.fetch_add(1, Ordering::SeqCst) + 1;
    lock(&state.orders).push(json!({
        "id": id,
        "orderDate": "2025-03-01T10:15:00Z",
        "status": "Pending",
        "totalAmount": cart.get("totalPrice").cloned().unwrap_or(Value::Null),
        "orderItems": cart.get("cartResponse").cloned().unwrap_or(Value::Null),
    }));

    let body = lock(&state.checkout_response)
        .clone()
        .unwrap_or_else(|| json!({ "url": PAYMENT_URL }));
    ok(body)
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches("/api/").to_string();
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let authorization = header(AUTHORIZATION.as_str());
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    state.record(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        authorization: authorization.clone(),
        request_id: header(REQUEST_ID_HEADER),
        body: body.clone(),
    });

    let latency = *lock(&state.latency);
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
    if let Some(status) = state.next_scripted(&path) {
        return message(status, &format!("Scripted failure {}", status.as_u16()));
    }

    let authorized = !state.tokens_revoked.load(Ordering::SeqCst)
        && authorization.as_deref() == Some(format!("Bearer {VALID_TOKEN}").as_str());
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    let segments: Vec<&str> = path.split('/').collect();

    match (method.as_str(), segments.as_slice()) {
        // Account (public)
        ("POST", ["Account", "login"]) => {
            if body.get("password").and_then(Value::as_str) == Some(VALID_PASSWORD) {
                ok(json!({ "token": VALID_TOKEN, "role": "Customer" }))
            } else {
                message(StatusCode::BAD_REQUEST, "Invalid email or password")
            }
        }
        ("POST", ["Account", "register"]) => {
            if email == UNKNOWN_EMAIL {
                message(StatusCode::BAD_REQUEST, "Email is already registered")
            } else {
                empty()
            }
        }
        ("POST", ["Account", "ForgotPassword" | "SendCode"]) => {
            if email == UNKNOWN_EMAIL {
                message(StatusCode::NOT_FOUND, "User not found")
            } else {
                empty()
            }
        }
        ("POST", ["Account", "VerifyCode"]) => {
            if body.get("code").and_then(Value::as_str) == Some(VALID_CODE) {
                empty()
            } else {
                message(StatusCode::BAD_REQUEST, "Invalid verification code")
            }
        }

        // Catalog (public)
        ("GET", ["products"]) => ok(catalog_in(&state, None)),
        ("GET", ["products", id]) => parse_id(id)
            .and_then(|id| product_json(&state, id))
            .map_or_else(|| message(StatusCode::NOT_FOUND, "Product not found"), ok),
        ("GET", ["categories"]) => {
            let all: Vec<Value> = CATEGORIES
                .iter()
                .filter_map(|(id, ..)| category_json(*id))
                .collect();
            ok(json!({ "data": all }))
        }
        ("GET", ["categories", id]) => parse_id(id)
            .and_then(category_json)
            .map_or_else(|| message(StatusCode::NOT_FOUND, "Category not found"), ok),
        ("GET", ["categories", id, "products"]) => match parse_id(id) {
            Some(id @ (1 | 2)) => ok(catalog_in(&state, Some(id))),
            _ => message(StatusCode::NOT_FOUND, "No products in this category"),
        },

        // Everything below needs a session
        (
            _,
            ["Carts", ..]
            | ["Orders", ..]
            | ["CheckOuts", ..]
            | ["Auth", ..]
            | ["Account", "userinfo"]
            | ["products", _, "Reviews", "Create"],
        ) if !authorized => message(StatusCode::UNAUTHORIZED, "Unauthorized"),

        ("GET", ["Carts"]) => ok(cart_json(&state)),
        ("POST", ["Carts", id]) => {
            let Some(id) = parse_id(id).filter(|id| product_row(*id).is_some()) else {
                return message(StatusCode::NOT_FOUND, "Product not found");
            };
            let count = body
                .get("count")
                .and_then(Value::as_u64)
                .and_then(|c| u32::try_from(c).ok())
                .unwrap_or(1);
            let mut cart = lock(&state.cart);
            match cart.iter_mut().find(|(pid, _)| *pid == id) {
                Some(line) => line.1 += count,
                None => cart.push((id, count)),
            }
            empty()
        }
        ("PATCH", ["Carts", direction @ ("increaseCount" | "decreaseCount"), id]) => {
            let delta = if *direction == "increaseCount" { 1 } else { -1 };
            parse_id(id).map_or_else(
                || message(StatusCode::BAD_REQUEST, "Invalid product id"),
                |id| change_count(&state, id, delta),
            )
        }
        ("DELETE", ["Carts", "clearCart"]) => {
            lock(&state.cart).clear();
            empty()
        }
        ("DELETE", ["Carts", id]) => {
            let id = parse_id(id);
            lock(&state.cart).retain(|(pid, _)| Some(*pid) != id);
            empty()
        }
        ("POST", ["CheckOuts", "Pay"]) => checkout(&state),
        ("GET", ["Orders"]) => ok(Value::Array(lock(&state.orders).clone())),
        ("GET", ["Orders", id]) => {
            let id = parse_id(id);
            lock(&state.orders)
                .iter()
                .find(|o| o.get("id").and_then(Value::as_i64) == id)
                .cloned()
                .map_or_else(|| message(StatusCode::NOT_FOUND, "Order not found"), ok)
        }
        ("GET", ["Account", "userinfo"]) => ok(json!({
            "userName": "shopper",
            "email": "shopper@example.com",
            "firstName": "Sam",
            "lastName": "Shopper",
            "phoneNumber": null,
        })),
        ("POST", ["Auth", "change-password"]) => {
            if body.get("oldPassword").and_then(Value::as_str) == Some(VALID_PASSWORD) {
                empty()
            } else {
                message(StatusCode::BAD_REQUEST, "Current password is incorrect")
            }
        }
        ("POST", ["products", id, "Reviews", "Create"]) => {
            let Some(id) = parse_id(id).filter(|id| product_row(*id).is_some()) else {
                return message(StatusCode::NOT_FOUND, "Product not found");
            };
            let review = json!({
                "author": "shopper",
                "rate": body.get("Rate").cloned().unwrap_or(Value::Null),
                "comment": body.get("Comment").cloned().unwrap_or(Value::Null),
            });
            lock(&state.reviews).entry(id).or_default().push(review);
            empty()
        }

        _ => message(StatusCode::NOT_FOUND, "Not found"),
    }
}
