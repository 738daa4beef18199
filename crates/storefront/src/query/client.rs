//! Query client: cached, deduplicated, retried remote reads.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::ops::compute::Op;
use reqwest::Method;
use tracing::{debug, instrument, warn};

use tshop_core::{CategoryId, OrderId, ProductId};

use super::cache::{CacheEntry, CacheValue, Generations, PolicyExpiry};
use super::scope::ViewScope;
use super::QueryKey;
use crate::api::types::ListEnvelope;
use crate::api::{
    ApiClient, ApiError, Category, OrderDetails, OrderSummary, Product, ServerCart, UserInfo,
};
use crate::config::StorefrontConfig;
use crate::error::{Result, StorefrontError};

// =============================================================================
// QueryClient
// =============================================================================

/// Cache-backed reader for every [`QueryKey`].
///
/// Cheap to clone; all clones share one cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<QueryClientInner>,
}

struct QueryClientInner {
    api: ApiClient,
    cache: Cache<QueryKey, CacheEntry>,
    generations: Generations,
    retry_delay: Duration,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.inner.cache.entry_count())
            .field("retry_delay", &self.inner.retry_delay)
            .finish_non_exhaustive()
    }
}

impl QueryClient {
    /// Create a query client reading through `api`.
    #[must_use]
    pub fn new(api: ApiClient, config: &StorefrontConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .expire_after(PolicyExpiry)
            .support_invalidation_closures()
            .build();

        Self {
            inner: Arc::new(QueryClientInner {
                api,
                cache,
                generations: Generations::default(),
                retry_delay: config.query_retry_delay,
            }),
        }
    }

    // =========================================================================
    // Generic reads
    // =========================================================================

    /// Read `key`, from cache while fresh, otherwise from the API.
    ///
    /// # Errors
    ///
    /// Returns the API error once retries are exhausted. The error has already
    /// been shown to the user.
    pub async fn fetch(&self, key: QueryKey) -> Result<CacheValue> {
        self.load_with(key, move |api| fetch_remote(api, key)).await
    }

    /// Read `key` on behalf of a view; `None` if the view closed meanwhile.
    pub async fn fetch_scoped(&self, scope: &ViewScope, key: QueryKey) -> Option<Result<CacheValue>> {
        scope.run(self.fetch(key)).await
    }

    /// Shared read path: dedup through the cache, retry transient failures,
    /// surface the final failure once.
    ///
    /// A result whose fetch started before the key was last invalidated is
    /// discarded and fetched again.
    #[instrument(skip(self, fetch))]
    async fn load_with<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<CacheValue>
    where
        F: Fn(ApiClient) -> Fut,
        Fut: Future<Output = std::result::Result<CacheValue, ApiError>>,
    {
        loop {
            let generation = self.inner.generations.current(key);
            let init = async {
                let value = self.fetch_with_retries(key, &fetch).await?;
                Ok::<_, ApiError>(CacheEntry { generation, value })
            };
            let entry = self.inner.cache.try_get_with(key, init).await?;

            if entry.generation == self.inner.generations.current(key) {
                return Ok(entry.value);
            }

            debug!(%key, "Invalidated while in flight, fetching again");
            // Only evict the outdated entry, not a newer one another reader stored
            let outdated = entry.generation;
            self.inner
                .cache
                .entry(key)
                .and_compute_with(|current| {
                    std::future::ready(match current {
                        Some(current) if current.value().generation == outdated => Op::Remove,
                        _ => Op::Nop,
                    })
                })
                .await;
        }
    }

    async fn fetch_with_retries<F, Fut>(
        &self,
        key: QueryKey,
        fetch: &F,
    ) -> std::result::Result<CacheValue, ApiError>
    where
        F: Fn(ApiClient) -> Fut,
        Fut: Future<Output = std::result::Result<CacheValue, ApiError>>,
    {
        let policy = key.policy();
        let api = &self.inner.api;

        debug!("Cache miss, fetching");
        let mut attempt = 0;
        loop {
            match fetch(api.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < policy.retries => {
                    attempt += 1;
                    debug!(attempt, error = %e, "Retrying after transient failure");
                    tokio::time::sleep(self.inner.retry_delay).await;
                }
                Err(e) => {
                    api.surface(&e);
                    return Err(e);
                }
            }
        }
    }

    // =========================================================================
    // Typed reads
    // =========================================================================

    /// Active categories (inactive ones are filtered out).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn categories(&self) -> Result<Arc<Vec<Category>>> {
        let key = QueryKey::Categories;
        match self.fetch(key).await? {
            CacheValue::Categories(categories) => Ok(categories),
            other => Err(mismatch(key, &other)),
        }
    }

    /// One category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn category(&self, id: CategoryId) -> Result<Arc<Category>> {
        let key = QueryKey::Category(id);
        match self.fetch(key).await? {
            CacheValue::Category(category) => Ok(category),
            other => Err(mismatch(key, &other)),
        }
    }

    /// Products of a category. An unknown category yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails for any reason but 404.
    pub async fn category_products(&self, id: CategoryId) -> Result<Arc<Vec<Product>>> {
        let key = QueryKey::CategoryProducts(id);
        match self.fetch(key).await? {
            CacheValue::Products(products) => Ok(products),
            other => Err(mismatch(key, &other)),
        }
    }

    /// The full catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn products(&self) -> Result<Arc<Vec<Product>>> {
        let key = QueryKey::Products;
        match self.fetch(key).await? {
            CacheValue::Products(products) => Ok(products),
            other => Err(mismatch(key, &other)),
        }
    }

    /// One product with its reviews.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist or the request fails.
    pub async fn product(&self, id: ProductId) -> Result<Arc<Product>> {
        let key = QueryKey::Product(id);
        match self.fetch(key).await? {
            CacheValue::Product(product) => Ok(product),
            other => Err(mismatch(key, &other)),
        }
    }

    /// The logged-in user's server-side cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn cart(&self) -> Result<Arc<ServerCart>> {
        let key = QueryKey::Cart;
        match self.fetch(key).await? {
            CacheValue::Cart(cart) => Ok(cart),
            other => Err(mismatch(key, &other)),
        }
    }

    /// The logged-in user's order history.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn orders(&self) -> Result<Arc<Vec<OrderSummary>>> {
        let key = QueryKey::Orders;
        match self.fetch(key).await? {
            CacheValue::Orders(orders) => Ok(orders),
            other => Err(mismatch(key, &other)),
        }
    }

    /// One order with its lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the order does not exist or the request fails.
    pub async fn order(&self, id: OrderId) -> Result<Arc<OrderDetails>> {
        let key = QueryKey::Order(id);
        match self.fetch(key).await? {
            CacheValue::Order(order) => Ok(order),
            other => Err(mismatch(key, &other)),
        }
    }

    /// Profile of the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn user_info(&self) -> Result<Arc<UserInfo>> {
        let key = QueryKey::UserInfo;
        match self.fetch(key).await? {
            CacheValue::UserInfo(info) => Ok(info),
            other => Err(mismatch(key, &other)),
        }
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Drop the cached result for `key`. A read of `key` still in flight will
    /// not be served afterwards.
    pub async fn invalidate(&self, key: QueryKey) {
        debug!(%key, "Invalidating query");
        self.inner.generations.bump(key);
        self.inner.cache.invalidate(&key).await;
    }

    /// Drop every cached result whose key matches `predicate`.
    pub fn invalidate_matching<P>(&self, predicate: P)
    where
        P: Fn(&QueryKey) -> bool + Send + Sync + 'static,
    {
        self.inner.generations.bump_matching(&predicate);
        if let Err(e) = self
            .inner
            .cache
            .invalidate_entries_if(move |key, _value| predicate(key))
        {
            // Only possible if the cache was built without invalidation closures
            warn!(error = %e, "Predicate invalidation unavailable, clearing all queries");
            self.inner.cache.invalidate_all();
        }
    }

    /// Drop every cached result.
    pub fn invalidate_all(&self) {
        debug!("Invalidating all queries");
        self.inner.generations.bump_matching(|_| true);
        self.inner.cache.invalidate_all();
    }
}

fn mismatch(key: QueryKey, value: &CacheValue) -> StorefrontError {
    ApiError::Unexpected(format!("cached {} value under key {key}", value.kind())).into()
}

/// Issue the request behind `key` and decode it into its cache value.
async fn fetch_remote(api: ApiClient, key: QueryKey) -> std::result::Result<CacheValue, ApiError> {
    let path = key.path();
    let value = match key {
        QueryKey::Categories => {
            let list: ListEnvelope<Category> = api.fetch(Method::GET, &path).await?;
            let active = list.into_vec().into_iter().filter(|c| c.status).collect();
            CacheValue::Categories(Arc::new(active))
        }
        QueryKey::Category(_) => CacheValue::Category(Arc::new(api.fetch(Method::GET, &path).await?)),
        QueryKey::CategoryProducts(_) => {
            match api.fetch::<ListEnvelope<Product>>(Method::GET, &path).await {
                Ok(list) => CacheValue::Products(Arc::new(list.into_vec())),
                Err(e) if e.is_not_found() => {
                    debug!(%key, "Category has no products");
                    CacheValue::Products(Arc::new(Vec::new()))
                }
                Err(e) => return Err(e),
            }
        }
        QueryKey::Products => {
            let list: ListEnvelope<Product> = api.fetch(Method::GET, &path).await?;
            CacheValue::Products(Arc::new(list.into_vec()))
        }
        QueryKey::Product(_) => CacheValue::Product(Arc::new(api.fetch(Method::GET, &path).await?)),
        QueryKey::Cart => {
            let cart: Option<ServerCart> = api.fetch(Method::GET, &path).await?;
            CacheValue::Cart(Arc::new(cart.unwrap_or_default()))
        }
        QueryKey::Orders => {
            let list: ListEnvelope<OrderSummary> = api.fetch(Method::GET, &path).await?;
            CacheValue::Orders(Arc::new(list.into_vec()))
        }
        QueryKey::Order(_) => CacheValue::Order(Arc::new(api.fetch(Method::GET, &path).await?)),
        QueryKey::UserInfo => {
            let info: Option<UserInfo> = api.fetch(Method::GET, &path).await?;
            CacheValue::UserInfo(Arc::new(info.unwrap_or_default()))
        }
    };
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use reqwest::StatusCode;

    use super::*;
    use crate::notify::{self, NotificationLevel, NotificationReceiver, Notifier};
    use crate::session::SessionStore;
    use crate::storage::MemoryStore;

    fn queries() -> (QueryClient, NotificationReceiver) {
        let mut config = StorefrontConfig::with_base_url("http://127.0.0.1:9/api/", ".").unwrap();
        config.query_retry_delay = Duration::from_millis(1);
        let session = Arc::new(SessionStore::initialize_from_storage(Arc::new(
            MemoryStore::new(),
        )));
        let (notifier, rx) = Notifier::channel();
        let api = ApiClient::new(&config, session, notifier).unwrap();
        (QueryClient::new(api, &config), rx)
    }

    fn unavailable() -> ApiError {
        ApiError::Server {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "Try again later".to_string(),
        }
    }

    fn user_info() -> CacheValue {
        CacheValue::UserInfo(Arc::new(UserInfo::default()))
    }

    /// Fetcher that counts calls and fails the first `failures` of them.
    fn flaky(
        hits: &Arc<AtomicUsize>,
        failures: usize,
        error: fn() -> ApiError,
    ) -> impl Fn(ApiClient) -> std::future::Ready<std::result::Result<CacheValue, ApiError>> {
        let hits = Arc::clone(hits);
        move |_api| {
            let n = hits.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < failures { Err(error()) } else { Ok(user_info()) })
        }
    }

    fn counting(
        hits: &Arc<AtomicUsize>,
    ) -> impl Fn(ApiClient) -> std::future::Ready<std::result::Result<CacheValue, ApiError>> {
        flaky(hits, 0, unavailable)
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_request() {
        let (queries, _rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));
        let slow = |hits: Arc<AtomicUsize>| {
            move |_api: ApiClient| {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, ApiError>(CacheValue::Products(Arc::new(Vec::new())))
                }
            }
        };

        let (a, b) = tokio::join!(
            queries.load_with(QueryKey::Products, slow(Arc::clone(&hits))),
            queries.load_with(QueryKey::Products, slow(Arc::clone(&hits))),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_result_is_served_from_cache() {
        let (queries, _rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::Product(ProductId::new(1));

        queries.load_with(key, counting(&hits)).await.unwrap();
        queries.load_with(key, counting(&hits)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_staleness_always_refetches() {
        let (queries, _rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));

        queries.load_with(QueryKey::Orders, counting(&hits)).await.unwrap();
        queries.load_with(QueryKey::Orders, counting(&hits)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_key_forces_refetch() {
        let (queries, _rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));

        queries.load_with(QueryKey::Cart, counting(&hits)).await.unwrap();
        queries.invalidate(QueryKey::Cart).await;
        queries.load_with(QueryKey::Cart, counting(&hits)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    type BoxedFetch =
        std::pin::Pin<Box<dyn Future<Output = std::result::Result<CacheValue, ApiError>> + Send>>;

    /// Fetcher that counts calls and answers an empty cart after 100ms.
    fn slow_cart(hits: Arc<AtomicUsize>) -> impl Fn(ApiClient) -> BoxedFetch {
        move |_api: ApiClient| -> BoxedFetch {
            let hits = Arc::clone(&hits);
            Box::pin(async move {
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, ApiError>(CacheValue::Cart(Arc::new(ServerCart::default())))
            })
        }
    }

    #[tokio::test]
    async fn test_invalidate_during_fetch_discards_outdated_result() {
        let (queries, _rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));

        let (first, ()) = tokio::join!(
            queries.load_with(QueryKey::Cart, slow_cart(Arc::clone(&hits))),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                queries.invalidate(QueryKey::Cart).await;
            }
        );
        first.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // The refetched result is the one cached
        queries
            .load_with(QueryKey::Cart, slow_cart(Arc::clone(&hits)))
            .await
            .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reader_joining_after_invalidation_gets_fresh_result() {
        let (queries, _rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));

        let (first, (), second) = tokio::join!(
            queries.load_with(QueryKey::Cart, slow_cart(Arc::clone(&hits))),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                queries.invalidate_all();
            },
            async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                queries
                    .load_with(QueryKey::Cart, slow_cart(Arc::clone(&hits)))
                    .await
            }
        );
        first.unwrap();
        second.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_matching_leaves_other_keys() {
        let (queries, _rx) = queries();
        let products = Arc::new(AtomicUsize::new(0));
        let categories = Arc::new(AtomicUsize::new(0));
        let product = QueryKey::Product(ProductId::new(9));

        queries.load_with(product, counting(&products)).await.unwrap();
        queries
            .load_with(QueryKey::Categories, counting(&categories))
            .await
            .unwrap();

        queries.invalidate_matching(|key| matches!(key, QueryKey::Product(_)));

        queries.load_with(product, counting(&products)).await.unwrap();
        queries
            .load_with(QueryKey::Categories, counting(&categories))
            .await
            .unwrap();
        assert_eq!(products.load(Ordering::SeqCst), 2);
        assert_eq!(categories.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let (queries, _rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));

        queries.load_with(QueryKey::Categories, counting(&hits)).await.unwrap();
        queries.invalidate_all();
        queries.load_with(QueryKey::Categories, counting(&hits)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (queries, mut rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));

        // Product allows two retries
        let key = QueryKey::Product(ProductId::new(3));
        queries.load_with(key, flaky(&hits, 2, unavailable)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(notify::drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_once() {
        let (queries, mut rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));

        let key = QueryKey::Product(ProductId::new(3));
        let err = queries
            .load_with(key, flaky(&hits, 10, unavailable))
            .await
            .unwrap_err();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(err.user_message(), "Try again later");

        let shown = notify::drain(&mut rx);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].level, NotificationLevel::Error);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried_or_cached() {
        let (queries, _rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));
        let bad_request = || ApiError::Server {
            status: StatusCode::BAD_REQUEST,
            message: "nope".to_string(),
        };

        let key = QueryKey::Category(CategoryId::new(1));
        assert!(queries.load_with(key, flaky(&hits, 1, bad_request)).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // The failure was not cached; the next read goes out again and succeeds
        assert!(queries.load_with(key, flaky(&hits, 1, bad_request)).await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_retry_budget() {
        let (queries, _rx) = queries();
        let hits = Arc::new(AtomicUsize::new(0));

        let key = QueryKey::CategoryProducts(CategoryId::new(5));
        assert!(queries.load_with(key, flaky(&hits, 1, unavailable)).await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_scoped_discards_after_close() {
        let (queries, _rx) = queries();
        let scope = ViewScope::new();
        scope.close();
        // The request fails (nothing listens on port 9) but the view is gone,
        // so the caller sees nothing at all
        assert!(queries.fetch_scoped(&scope, QueryKey::Products).await.is_none());
    }
}
