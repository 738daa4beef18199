//! Storefront root container shared by every front end.

use std::sync::Arc;

use tracing::info;

use crate::api::ApiClient;
use crate::cart::CartStore;
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::notify::{NotificationReceiver, Notifier};
use crate::query::QueryClient;
use crate::session::{SessionState, SessionStore};
use crate::storage::{FileStore, KeyValueStore};

/// Everything a storefront front end talks to.
///
/// Constructed once and cheaply cloneable via `Arc`. Consumers receive a
/// handle; they never build their own clients or stores.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    session: Arc<SessionStore>,
    api: ApiClient,
    queries: QueryClient,
    cart: CartStore,
    notifier: Notifier,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api", &self.inner.api)
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Create a storefront over `storage`.
    ///
    /// Reads the session and hydrates the cart before returning. The receiver
    /// yields every notification the storefront produces.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<(Self, NotificationReceiver)> {
        let (notifier, receiver) = Notifier::channel();

        let session = Arc::new(SessionStore::initialize_from_storage(Arc::clone(&storage)));
        let api = ApiClient::new(&config, Arc::clone(&session), notifier.clone())?;
        let queries = QueryClient::new(api.clone(), &config);
        let cart = CartStore::hydrate(storage, notifier.clone());

        info!(
            api = %config.api_base_url,
            logged_in = session.state().is_logged_in,
            cart_lines = cart.snapshot().items.len(),
            "Storefront ready"
        );

        let storefront = Self {
            inner: Arc::new(StorefrontInner {
                config,
                session,
                api,
                queries,
                cart,
                notifier,
            }),
        };
        Ok((storefront, receiver))
    }

    /// Create a storefront persisting to files under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn open(config: StorefrontConfig) -> Result<(Self, NotificationReceiver)> {
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(config.data_dir.clone()));
        Self::new(config, storage)
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the session store.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Current login/admin snapshot.
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.inner.session.state()
    }

    /// Get a reference to the API gateway client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the query client.
    #[must_use]
    pub fn queries(&self) -> &QueryClient {
        &self.inner.queries
    }

    /// Get a reference to the local cart.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the notification sender.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}
