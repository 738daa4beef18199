//! Declarative remote data queries.
//!
//! # Architecture
//!
//! - Every remote read is identified by a [`QueryKey`]; the key alone decides
//!   the endpoint and the [`QueryPolicy`] (staleness and retry budget)
//! - Results live in a `moka` cache whose per-entry lifetime is the key's
//!   staleness, so a stale entry is simply absent and the next read refetches
//! - Concurrent reads of one key share a single in-flight request
//! - Mutations invalidate by key, by predicate, or everything

mod cache;
mod client;
mod scope;

use std::fmt;
use std::time::Duration;

pub use cache::CacheValue;
pub use client::QueryClient;
pub use scope::ViewScope;

use tshop_core::{CategoryId, OrderId, ProductId};

/// How long a successful result stays fresh when the key does not say otherwise.
pub const FIVE_MINUTES: Duration = Duration::from_secs(300);

/// Retry budget for keys without an explicit one.
pub const DEFAULT_RETRIES: u32 = 3;

/// Identity of a remote read.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum QueryKey {
    Categories,
    Category(CategoryId),
    CategoryProducts(CategoryId),
    Products,
    Product(ProductId),
    Cart,
    Orders,
    Order(OrderId),
    UserInfo,
}

/// Freshness and retry rules for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// Time a result may be served from cache. Zero means always refetch.
    pub staleness: Duration,
    /// Extra attempts after a transient failure.
    pub retries: u32,
}

impl QueryKey {
    /// Endpoint path relative to the API base URL.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Categories => "categories".to_string(),
            Self::Category(id) => format!("categories/{id}"),
            Self::CategoryProducts(id) => format!("categories/{id}/products"),
            Self::Products => "products".to_string(),
            Self::Product(id) => format!("products/{id}"),
            Self::Cart => "Carts".to_string(),
            Self::Orders => "Orders".to_string(),
            Self::Order(id) => format!("Orders/{id}"),
            Self::UserInfo => "Account/userinfo".to_string(),
        }
    }

    /// Caching and retry policy for this key.
    #[must_use]
    pub const fn policy(&self) -> QueryPolicy {
        let (staleness, retries) = match self {
            Self::Categories | Self::Category(_) => (FIVE_MINUTES, DEFAULT_RETRIES),
            Self::CategoryProducts(_) => (Duration::ZERO, 0),
            Self::Product(_) | Self::Cart => (FIVE_MINUTES, 2),
            Self::Products | Self::Orders | Self::Order(_) | Self::UserInfo => {
                (Duration::ZERO, DEFAULT_RETRIES)
            }
        };
        QueryPolicy { staleness, retries }
    }

    /// Whether this key holds data that belongs to the logged-in user.
    #[must_use]
    pub const fn is_user_scoped(&self) -> bool {
        matches!(
            self,
            Self::Cart | Self::Orders | Self::Order(_) | Self::UserInfo
        )
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Categories => f.write_str("categories"),
            Self::Category(id) => write!(f, "category:{id}"),
            Self::CategoryProducts(id) => write!(f, "category-products:{id}"),
            Self::Products => f.write_str("products"),
            Self::Product(id) => write!(f, "product:{id}"),
            Self::Cart => f.write_str("cart"),
            Self::Orders => f.write_str("orders"),
            Self::Order(id) => write!(f, "order:{id}"),
            Self::UserInfo => f.write_str("userinfo"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies() {
        assert_eq!(
            QueryKey::Categories.policy(),
            QueryPolicy {
                staleness: FIVE_MINUTES,
                retries: 3,
            }
        );
        assert_eq!(QueryKey::Product(ProductId::new(1)).policy().retries, 2);
        assert_eq!(QueryKey::Cart.policy().staleness, FIVE_MINUTES);

        let products = QueryKey::CategoryProducts(CategoryId::new(2)).policy();
        assert_eq!(products.staleness, Duration::ZERO);
        assert_eq!(products.retries, 0);

        assert_eq!(QueryKey::Orders.policy().staleness, Duration::ZERO);
        assert_eq!(QueryKey::UserInfo.policy().retries, DEFAULT_RETRIES);
    }

    #[test]
    fn test_paths() {
        assert_eq!(QueryKey::Cart.path(), "Carts");
        assert_eq!(
            QueryKey::CategoryProducts(CategoryId::new(4)).path(),
            "categories/4/products"
        );
        assert_eq!(QueryKey::Order(OrderId::new(12)).path(), "Orders/12");
        assert_eq!(QueryKey::UserInfo.path(), "Account/userinfo");
    }

    #[test]
    fn test_user_scoped_keys() {
        assert!(QueryKey::Cart.is_user_scoped());
        assert!(QueryKey::Order(OrderId::new(1)).is_user_scoped());
        assert!(!QueryKey::Products.is_user_scoped());
    }
}
