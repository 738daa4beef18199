//! Request and response types for the storefront REST API.
//!
//! The API is loosely specified: list endpoints sometimes wrap their payload
//! in `{ "data": [...] }`, optional collections arrive as `null`, and a few
//! fields have two spellings. These types accept all observed shapes and
//! expose one clean view.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use tshop_core::{CategoryId, OrderId, OrderStatus, Price, ProductId};

// =============================================================================
// Deserialization helpers
// =============================================================================

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept RFC 3339 timestamps and offset-less ISO timestamps (read as UTC).
/// Anything unparseable becomes `None` rather than failing the whole payload.
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    Ok(raw
        .parse::<NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc()))
}

/// A list endpoint payload, bare or wrapped in `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListEnvelope<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
        data: Vec<T>,
    },
}

impl<T> ListEnvelope<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items) | Self::Wrapped { data: items } => items,
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A customer review attached to a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "Rate")]
    pub rate: Option<f64>,
    #[serde(default, alias = "Comment", alias = "content")]
    pub comment: Option<String>,
    #[serde(default, alias = "date", deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /products/:id/Reviews/Create`.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewInput {
    #[serde(rename = "Rate")]
    pub rate: u8,
    #[serde(rename = "Comment")]
    pub comment: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub rate: Option<f64>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reviews: Vec<Review>,
}

impl Product {
    /// Image to show first: the gallery's first entry, else the main image.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images
            .first()
            .map(String::as_str)
            .or(self.image.as_deref())
    }

    /// Whether the API reports stock, and it is exhausted.
    #[must_use]
    pub fn is_out_of_stock(&self) -> bool {
        self.stock.is_some_and(|stock| stock <= 0)
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the category is active and should be shown.
    #[serde(default)]
    pub status: bool,
}

// =============================================================================
// Server-side cart
// =============================================================================

/// One line of the server-side cart.
///
/// The API has shipped both `id`/`name` and `productId`/`productName`, so both
/// spellings are kept and resolved by the accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCartLine {
    #[serde(default)]
    id: Option<ProductId>,
    #[serde(default)]
    product_id: Option<ProductId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
    pub price: Decimal,
    pub count: u32,
    #[serde(default)]
    pub image: Option<String>,
}

impl ServerCartLine {
    /// The product this line refers to.
    #[must_use]
    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id.or(self.id)
    }

    /// Display name of the product.
    #[must_use]
    pub fn name(&self) -> &str {
        self.product_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }

    /// `price × count`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.count)
    }
}

/// Body of `GET /Carts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCart {
    #[serde(rename = "cartResponse", default, deserialize_with = "null_as_default")]
    pub lines: Vec<ServerCartLine>,
    #[serde(default)]
    pub total_price: Decimal,
}

impl ServerCart {
    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.count).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Body of `POST /Carts/:productId`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AddToCartRequest {
    pub count: u32,
}

// =============================================================================
// Checkout
// =============================================================================

/// Payment method accepted by `POST /CheckOuts/Pay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PaymentMethod {
    #[default]
    Visa,
    Cash,
}

/// Body of `POST /CheckOuts/Pay`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CheckoutRequest {
    #[serde(rename = "PaymentMethod")]
    pub payment_method: PaymentMethod,
}

/// Response of `POST /CheckOuts/Pay`; the redirect arrives under one of three names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    session_url: Option<String>,
    #[serde(default)]
    redirect_url: Option<String>,
}

impl CheckoutResponse {
    /// The payment page to send the user to.
    #[must_use]
    pub fn payment_url(&self) -> Option<&str> {
        [&self.url, &self.session_url, &self.redirect_url]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|u| !u.trim().is_empty())
    }
}

// =============================================================================
// Orders
// =============================================================================

/// A row of `GET /Orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    total_amount: Option<Decimal>,
    #[serde(default)]
    total: Option<Decimal>,
}

impl OrderSummary {
    /// Order total, whichever field the API used.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.total_amount.or(self.total).unwrap_or_default()
    }
}

/// A line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub price: Decimal,
}

/// Body of `GET /Orders/:id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub id: OrderId,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub order_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    total_amount: Option<Decimal>,
    #[serde(default)]
    total: Option<Decimal>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub order_items: Vec<OrderItem>,
}

impl OrderDetails {
    /// Order total, whichever field the API used.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.total_amount.or(self.total).unwrap_or_default()
    }
}

// =============================================================================
// Account
// =============================================================================

/// Body of `GET /Account/userinfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Body of `POST /Account/login`.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response of `POST /Account/login`.
#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Body of `POST /Account/register`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub user_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
    pub birth_of_date: chrono::NaiveDate,
}

/// Body of `POST /Auth/change-password`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordRequest<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
    pub confirm_password: &'a str,
}

/// Body of `POST /Account/ForgotPassword` and `POST /Account/SendCode`.
#[derive(Serialize)]
pub(crate) struct EmailRequest<'a> {
    pub email: &'a str,
}

/// Body of `POST /Account/VerifyCode`.
#[derive(Serialize)]
pub(crate) struct VerifyCodeRequest<'a> {
    pub email: &'a str,
    pub code: &'a str,
}
