//! Local cart state: line items, the reducer over [`CartAction`], and derived
//! totals.
//!
//! The reducer is pure and never fails. Side effects (notifications and the
//! durable write) belong to [`CartStore`].

mod store;

pub use store::CartStore;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tshop_core::{Price, ProductId};

use crate::api::Product;

/// One product in the local cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    /// Product metadata captured when the item was added (image, brand, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CartLineItem {
    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// What gets added to the cart: a product without a quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub extra: Map<String, Value>,
}

impl CartProduct {
    #[must_use]
    pub fn new(id: ProductId, name: impl Into<String>, price: Price) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            extra: Map::new(),
        }
    }

    /// Attach a metadata field that is carried into the line item.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    fn into_line(self, quantity: u32) -> CartLineItem {
        CartLineItem {
            id: self.id,
            name: self.name,
            price: self.price,
            quantity,
            extra: self.extra,
        }
    }
}

impl From<&Product> for CartProduct {
    fn from(product: &Product) -> Self {
        let mut cart_product = Self::new(product.id, product.name.clone(), product.price);
        if let Some(image) = product.primary_image() {
            cart_product = cart_product.with_extra("image", image);
        }
        if let Some(brand) = &product.brand {
            cart_product = cart_product.with_extra("brand", brand.as_str());
        }
        cart_product
    }
}

/// Every transition the cart supports.
#[derive(Debug, Clone, PartialEq)]
pub enum CartAction {
    /// Add `quantity` units, merging into an existing line for the same id.
    AddItem { product: CartProduct, quantity: u32 },
    /// Drop the line for `id`. Unknown ids are ignored.
    RemoveItem { id: ProductId },
    /// Set the quantity of `id`, never below one.
    UpdateQuantity { id: ProductId, quantity: i64 },
    ClearCart,
    /// Replace everything; used for startup hydration.
    LoadCart { items: Vec<CartLineItem> },
}

/// The local cart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub items: Vec<CartLineItem>,
}

impl CartState {
    /// Apply `action` and return the next state.
    #[must_use]
    pub fn reduce(mut self, action: CartAction) -> Self {
        match action {
            CartAction::AddItem { product, quantity } => {
                if let Some(line) = self.items.iter_mut().find(|line| line.id == product.id) {
                    line.quantity = line.quantity.saturating_add(quantity);
                } else {
                    self.items.push(product.into_line(quantity));
                }
            }
            CartAction::RemoveItem { id } => {
                self.items.retain(|line| line.id != id);
            }
            CartAction::UpdateQuantity { id, quantity } => {
                let clamped = u32::try_from(quantity.max(1)).unwrap_or(u32::MAX);
                if let Some(line) = self.items.iter_mut().find(|line| line.id == id) {
                    line.quantity = clamped;
                }
            }
            CartAction::ClearCart => self.items.clear(),
            CartAction::LoadCart { items } => {
                self.items = Vec::with_capacity(items.len());
                for item in items {
                    match self.items.iter_mut().find(|line| line.id == item.id) {
                        Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
                        None => self.items.push(item),
                    }
                }
            }
        }

        // A line never stays in the cart with zero units
        self.items.retain(|line| line.quantity > 0);
        self
    }

    /// Sum of `price × quantity`, recomputed on every call.
    #[must_use]
    pub fn cart_total(&self) -> Price {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    /// Sum of quantities, recomputed on every call.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.quantity)).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line for `id`, if present.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|line| line.id == id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use core::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;

    fn price(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap()).unwrap()
    }

    fn widget() -> CartProduct {
        CartProduct::new(ProductId::new(7), "Widget", price("9.99"))
    }

    fn add(state: CartState, product: CartProduct, quantity: u32) -> CartState {
        state.reduce(CartAction::AddItem { product, quantity })
    }

    fn sample() -> CartState {
        let state = add(CartState::default(), widget(), 2);
        let state = add(state, CartProduct::new(ProductId::new(8), "Gadget", price("0.50")), 3);
        add(state, CartProduct::new(ProductId::new(9), "Gizmo", price("12")), 1)
    }

    #[test]
    fn test_add_to_empty_cart() {
        let state = add(CartState::default(), widget(), 2);

        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].id, ProductId::new(7));
        assert_eq!(state.items[0].quantity, 2);
        assert_eq!(state.cart_total(), price("19.98"));
        assert_eq!(state.item_count(), 2);
    }

    #[test]
    fn test_add_existing_merges() {
        let state = add(CartState::default(), widget(), 2);
        let state = add(state, widget(), 3);

        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].quantity, 5);
    }

    #[test]
    fn test_add_existing_keeps_length_and_order_for_every_line() {
        let base = sample();
        for line in &base.items {
            let product = CartProduct::new(line.id, line.name.clone(), line.price);
            let next = add(base.clone(), product, 4);

            assert_eq!(next.items.len(), base.items.len());
            assert_eq!(next.get(line.id).unwrap().quantity, line.quantity + 4);
            let ids: Vec<_> = next.items.iter().map(|l| l.id).collect();
            let base_ids: Vec<_> = base.items.iter().map(|l| l.id).collect();
            assert_eq!(ids, base_ids);
        }
    }

    #[test]
    fn test_add_zero_of_new_product_adds_nothing() {
        let state = add(CartState::default(), widget(), 0);
        assert!(state.is_empty());
    }

    #[test]
    fn test_update_quantity_to_zero_clamps_to_one() {
        let state = add(CartState::default(), widget(), 1);
        let state = state.reduce(CartAction::UpdateQuantity {
            id: ProductId::new(7),
            quantity: 0,
        });

        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].quantity, 1);
    }

    #[test]
    fn test_update_quantity_floor_for_any_non_positive() {
        for q in [0, -1, -7, i64::MIN] {
            let state = sample().reduce(CartAction::UpdateQuantity {
                id: ProductId::new(8),
                quantity: q,
            });
            assert_eq!(state.get(ProductId::new(8)).unwrap().quantity, 1);
        }
    }

    #[test]
    fn test_update_quantity_sets_value() {
        let state = sample().reduce(CartAction::UpdateQuantity {
            id: ProductId::new(9),
            quantity: 6,
        });
        assert_eq!(state.get(ProductId::new(9)).unwrap().quantity, 6);

        let huge = sample().reduce(CartAction::UpdateQuantity {
            id: ProductId::new(9),
            quantity: i64::MAX,
        });
        assert_eq!(huge.get(ProductId::new(9)).unwrap().quantity, u32::MAX);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let base = sample();
        let next = base.clone().reduce(CartAction::UpdateQuantity {
            id: ProductId::new(404),
            quantity: 3,
        });
        assert_eq!(next, base);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let base = sample();
        let next = base.clone().reduce(CartAction::RemoveItem {
            id: ProductId::new(404),
        });
        assert_eq!(next, base);
    }

    #[test]
    fn test_remove_existing() {
        let state = sample().reduce(CartAction::RemoveItem {
            id: ProductId::new(8),
        });
        assert_eq!(state.items.len(), 2);
        assert!(state.get(ProductId::new(8)).is_none());
    }

    #[test]
    fn test_clear_cart() {
        let state = sample().reduce(CartAction::ClearCart);
        assert!(state.items.is_empty());
        assert_eq!(state.cart_total(), Price::ZERO);
        assert_eq!(state.item_count(), 0);
    }

    #[test]
    fn test_totals_follow_every_transition() {
        let actions = [
            CartAction::AddItem {
                product: widget(),
                quantity: 1,
            },
            CartAction::UpdateQuantity {
                id: ProductId::new(8),
                quantity: 10,
            },
            CartAction::RemoveItem {
                id: ProductId::new(9),
            },
            CartAction::AddItem {
                product: CartProduct::new(ProductId::new(10), "Thing", price("1.25")),
                quantity: 4,
            },
        ];

        let mut state = sample();
        for action in actions {
            state = state.reduce(action);
            let total: Decimal = state
                .items
                .iter()
                .map(|l| l.price.amount() * Decimal::from(l.quantity))
                .sum();
            let count: u64 = state.items.iter().map(|l| u64::from(l.quantity)).sum();
            assert_eq!(state.cart_total().amount(), total);
            assert_eq!(state.item_count(), count);
        }
        // 7: 3 × 9.99, 8: 10 × 0.50, 10: 4 × 1.25
        assert_eq!(state.cart_total(), price("39.97"));
        assert_eq!(state.item_count(), 17);
    }

    #[test]
    fn test_load_replaces_and_normalizes() {
        let line = |id, quantity| CartLineItem {
            id: ProductId::new(id),
            name: format!("p{id}"),
            price: price("1"),
            quantity,
            extra: Map::new(),
        };
        let state = sample().reduce(CartAction::LoadCart {
            items: vec![line(1, 2), line(2, 0), line(1, 3), line(3, 1)],
        });

        let got: Vec<_> = state.items.iter().map(|l| (l.id.as_i64(), l.quantity)).collect();
        assert_eq!(got, vec![(1, 5), (3, 1)]);
    }

    #[test]
    fn test_extra_metadata_flattens_on_the_wire() {
        let product = widget().with_extra("image", "w.png");
        let state = add(CartState::default(), product, 1);

        let json = serde_json::to_value(&state.items).unwrap();
        assert_eq!(json[0]["image"], "w.png");
        assert_eq!(json[0]["quantity"], 1);

        let back: Vec<CartLineItem> = serde_json::from_value(json).unwrap();
        assert_eq!(back, state.items);
    }

    #[test]
    fn test_from_api_product_captures_metadata() {
        let product: Product = serde_json::from_str(
            r#"{"id":3,"name":"Lamp","price":20,"image":"lamp.png","brand":"Lumo"}"#,
        )
        .unwrap();
        let cart_product = CartProduct::from(&product);
        assert_eq!(cart_product.id, ProductId::new(3));
        assert_eq!(cart_product.extra["image"], "lamp.png");
        assert_eq!(cart_product.extra["brand"], "Lumo");
    }
}
