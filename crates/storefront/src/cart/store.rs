//! Owner of the cart state and its durable record.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, warn};

use tshop_core::Price;

use super::{CartAction, CartLineItem, CartState};
use crate::notify::{NotificationLevel, Notifier};
use crate::storage::{KeyValueStore, StorageError, keys};

/// Notification shown after a line is removed.
pub const ITEM_REMOVED_MESSAGE: &str = "Item removed from cart.";

/// Holds the one [`CartState`] of a storefront.
///
/// All mutation goes through [`CartStore::dispatch`]; the store is the only
/// writer of the `cart` storage key.
pub struct CartStore {
    state: Mutex<CartState>,
    storage: Arc<dyn KeyValueStore>,
    notifier: Notifier,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Restore the cart persisted in `storage`.
    ///
    /// A missing record is an empty cart. So is an unreadable or corrupt one,
    /// after a warning.
    #[must_use]
    pub fn hydrate(storage: Arc<dyn KeyValueStore>, notifier: Notifier) -> Self {
        let items = load_items(storage.as_ref());
        debug!(lines = items.len(), "Cart hydrated");
        let state = CartState::default().reduce(CartAction::LoadCart { items });

        Self {
            state: Mutex::new(state),
            storage,
            notifier,
        }
    }

    /// Apply `action`, notify the user, and persist if the items changed.
    ///
    /// Returns the new state.
    pub fn dispatch(&self, action: CartAction) -> CartState {
        let notice = match &action {
            CartAction::AddItem { product, .. } => Some((
                NotificationLevel::Success,
                format!("{} added to cart!", product.name),
            )),
            CartAction::RemoveItem { .. } => {
                Some((NotificationLevel::Info, ITEM_REMOVED_MESSAGE.to_string()))
            }
            _ => None,
        };

        let next = {
            let mut state = self.lock();
            let next = state.clone().reduce(action);
            let changed = next.items != state.items;
            state.clone_from(&next);

            if changed && let Err(e) = self.save(&next.items) {
                error!(error = %e, "Failed to persist cart");
            }
            next
        };

        if let Some((level, message)) = notice {
            self.notifier.notify(level, message);
        }
        next
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.lock().clone()
    }

    /// Sum of `price × quantity` over the current items.
    #[must_use]
    pub fn cart_total(&self) -> Price {
        self.lock().cart_total()
    }

    /// Sum of quantities over the current items.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lock().item_count()
    }

    fn save(&self, items: &[CartLineItem]) -> Result<(), StorageError> {
        let json = serde_json::to_string(items)?;
        self.storage.set(keys::CART, &json)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_items(storage: &dyn KeyValueStore) -> Vec<CartLineItem> {
    let raw = match storage.get(keys::CART) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read saved cart, starting empty");
            return Vec::new();
        }
    };

    // Older records may hold `null`
    match serde_json::from_str::<Option<Vec<CartLineItem>>>(&raw) {
        Ok(items) => items.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "Saved cart is corrupt, starting empty");
            Vec::new()
        }
    }
}
