//! Server-side cart commands. All of them require a logged-in session.
//!
//! # Usage
//!
//! ```bash
//! tshop cart show
//! tshop cart add 7 --quantity 2
//! tshop cart increase 7
//! tshop cart checkout --method cash
//! ```

use std::io::Write;

use tshop_core::ProductId;
use tshop_storefront::Storefront;
use tshop_storefront::api::PaymentMethod;

use super::CliError;

/// Print the cart lines and total.
pub async fn show(storefront: &Storefront, out: &mut impl Write) -> Result<(), CliError> {
    let cart = storefront.queries().cart().await?;
    if cart.is_empty() {
        writeln!(out, "Your cart is empty.")?;
        return Ok(());
    }

    for line in &cart.lines {
        let id = line
            .product_id()
            .map_or_else(|| "?".to_string(), |id| id.to_string());
        let price = format!("{:.2}", line.price);
        let total = format!("{:.2}", line.line_total());
        writeln!(
            out,
            "{id:>5}  {:<40} {:>3} x {price:>8} = {total:>10}",
            line.name(),
            line.count,
        )?;
    }
    writeln!(out)?;
    writeln!(out, "Items: {}", cart.item_count())?;
    writeln!(out, "Total: {:.2}", cart.total_price)?;
    Ok(())
}

pub async fn add(storefront: &Storefront, product_id: ProductId, quantity: u32) -> Result<(), CliError> {
    storefront.add_to_cart(product_id, quantity).await?;
    Ok(())
}

/// Add one unit and print the updated cart.
pub async fn increase(
    storefront: &Storefront,
    out: &mut impl Write,
    product_id: ProductId,
) -> Result<(), CliError> {
    storefront.increase_quantity(product_id).await?;
    show(storefront, out).await
}

/// Remove one unit and print the updated cart.
pub async fn decrease(
    storefront: &Storefront,
    out: &mut impl Write,
    product_id: ProductId,
) -> Result<(), CliError> {
    storefront.decrease_quantity(product_id).await?;
    show(storefront, out).await
}

pub async fn remove(storefront: &Storefront, product_id: ProductId) -> Result<(), CliError> {
    storefront.remove_from_cart(product_id).await?;
    Ok(())
}

pub async fn clear(storefront: &Storefront) -> Result<(), CliError> {
    storefront.clear_cart().await?;
    Ok(())
}

/// Start payment and print where to complete it.
pub async fn checkout(
    storefront: &Storefront,
    out: &mut impl Write,
    method: PaymentMethod,
) -> Result<(), CliError> {
    let route = storefront.checkout(method).await?;
    writeln!(out, "Complete your payment at: {route}")?;
    Ok(())
}
