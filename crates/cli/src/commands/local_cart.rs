//! Local cart commands.
//!
//! The local cart lives in the data directory and never touches the API,
//! except for `add`, which looks the product up in the catalog first.

use std::io::Write;

use tshop_core::ProductId;
use tshop_storefront::Storefront;
use tshop_storefront::cart::{CartAction, CartProduct, CartState};
use tshop_storefront::forms;

use super::CliError;

pub fn show(storefront: &Storefront, out: &mut impl Write) -> Result<(), CliError> {
    write_cart(out, &storefront.cart().snapshot())
}

/// Look up a product and add `quantity` of it.
pub async fn add(
    storefront: &Storefront,
    out: &mut impl Write,
    product_id: ProductId,
    quantity: u32,
) -> Result<(), CliError> {
    forms::validate_add_quantity(quantity).map_err(tshop_storefront::StorefrontError::from)?;

    let product = storefront.queries().product(product_id).await?;
    let state = storefront.cart().dispatch(CartAction::AddItem {
        product: CartProduct::from(product.as_ref()),
        quantity,
    });
    write_cart(out, &state)
}

pub fn update(
    storefront: &Storefront,
    out: &mut impl Write,
    product_id: ProductId,
    quantity: i64,
) -> Result<(), CliError> {
    let state = storefront.cart().dispatch(CartAction::UpdateQuantity {
        id: product_id,
        quantity,
    });
    write_cart(out, &state)
}

pub fn remove(
    storefront: &Storefront,
    out: &mut impl Write,
    product_id: ProductId,
) -> Result<(), CliError> {
    let state = storefront
        .cart()
        .dispatch(CartAction::RemoveItem { id: product_id });
    write_cart(out, &state)
}

pub fn clear(storefront: &Storefront, out: &mut impl Write) -> Result<(), CliError> {
    let state = storefront.cart().dispatch(CartAction::ClearCart);
    write_cart(out, &state)
}

fn write_cart(out: &mut impl Write, state: &CartState) -> Result<(), CliError> {
    if state.is_empty() {
        writeln!(out, "Your cart is empty.")?;
        return Ok(());
    }

    for item in &state.items {
        writeln!(
            out,
            "{:>5}  {:<40} {:>3} x {:>8} = {:>10}",
            item.id.as_i64(),
            item.name,
            item.quantity,
            item.price.to_string(),
            item.line_total().to_string()
        )?;
    }
    writeln!(out)?;
    writeln!(out, "Items: {}", state.item_count())?;
    writeln!(out, "Total: {}", state.cart_total())?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use tshop_core::Price;

    use super::*;

    #[test]
    fn test_write_cart_lists_lines_and_totals() {
        let price = Price::new(Decimal::from_str("4.50").unwrap()).unwrap();
        let state = CartState::default().reduce(CartAction::AddItem {
            product: CartProduct::new(ProductId::new(3), "Mug", price),
            quantity: 2,
        });

        let mut out = Vec::new();
        write_cart(&mut out, &state).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Mug"));
        assert!(text.contains("9.00"));
        assert!(text.contains("Items: 2"));
        assert!(text.ends_with("Total: 9.00\n"));
    }

    #[test]
    fn test_write_empty_cart() {
        let mut out = Vec::new();
        write_cart(&mut out, &CartState::default()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Your cart is empty.\n");
    }
}
