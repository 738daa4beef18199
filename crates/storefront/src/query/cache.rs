//! Cache types for query results.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use moka::Expiry;

use super::QueryKey;
use crate::api::{Category, OrderDetails, OrderSummary, Product, ServerCart, UserInfo};

/// Cached value types. One variant per [`QueryKey`] family.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Category(Arc<Category>),
    Products(Arc<Vec<Product>>),
    Product(Arc<Product>),
    Cart(Arc<ServerCart>),
    Orders(Arc<Vec<OrderSummary>>),
    Order(Arc<OrderDetails>),
    UserInfo(Arc<UserInfo>),
}

impl CacheValue {
    /// Variant name, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Categories(_) => "categories",
            Self::Category(_) => "category",
            Self::Products(_) => "products",
            Self::Product(_) => "product",
            Self::Cart(_) => "cart",
            Self::Orders(_) => "orders",
            Self::Order(_) => "order",
            Self::UserInfo(_) => "userinfo",
        }
    }
}

/// A cached value tagged with the invalidation generation its fetch started in.
#[derive(Debug, Clone)]
pub(super) struct CacheEntry {
    pub generation: u64,
    pub value: CacheValue,
}

/// Per-key invalidation counters.
///
/// Every key that has been read has a counter; invalidating a key bumps it, so
/// a fetch that started before the bump can tell its result is outdated.
#[derive(Debug, Default)]
pub(super) struct Generations(Mutex<HashMap<QueryKey, u64>>);

impl Generations {
    pub fn current(&self, key: QueryKey) -> u64 {
        *self.lock().entry(key).or_default()
    }

    pub fn bump(&self, key: QueryKey) {
        *self.lock().entry(key).or_default() += 1;
    }

    pub fn bump_matching(&self, predicate: impl Fn(&QueryKey) -> bool) {
        for (key, generation) in self.lock().iter_mut() {
            if predicate(key) {
                *generation += 1;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, u64>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Gives each entry the staleness of its key.
pub(super) struct PolicyExpiry;

impl Expiry<QueryKey, CacheEntry> for PolicyExpiry {
    fn expire_after_create(
        &self,
        key: &QueryKey,
        _value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(key.policy().staleness)
    }
}
