//! Order history commands.

use std::io::Write;

use chrono::{DateTime, Utc};

use tshop_core::OrderId;
use tshop_storefront::Storefront;

use super::CliError;

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string())
}

/// List the user's orders.
pub async fn list(storefront: &Storefront, out: &mut impl Write) -> Result<(), CliError> {
    let orders = storefront.queries().orders().await?;
    if orders.is_empty() {
        writeln!(out, "You have no orders yet.")?;
        return Ok(());
    }

    for order in orders.iter() {
        let total = format!("{:.2}", order.total());
        writeln!(
            out,
            "{:>6}  {:<16}  {:<12} {total:>10}",
            order.id.as_i64(),
            format_date(order.order_date),
            order.status.as_str(),
        )?;
    }
    Ok(())
}

/// Show one order with its lines.
pub async fn show(storefront: &Storefront, out: &mut impl Write, id: OrderId) -> Result<(), CliError> {
    let order = storefront.queries().order(id).await?;

    writeln!(out, "Order #{}", order.id)?;
    writeln!(out, "  Date:   {}", format_date(order.order_date))?;
    writeln!(out, "  Status: {}", order.status)?;
    if let Some(address) = order.shipping_address.as_deref().filter(|a| !a.is_empty()) {
        writeln!(out, "  Ship to: {address}")?;
    }
    writeln!(out)?;
    for item in &order.order_items {
        let name = item.product_name.as_deref().unwrap_or("Unknown product");
        let price = format!("{:.2}", item.price);
        writeln!(out, "  {name:<40} {:>3} x {price:>8}", item.quantity)?;
    }
    writeln!(out)?;
    writeln!(out, "Total: {:.2}", order.total())?;
    Ok(())
}
