//! Catalog browsing commands.
//!
//! # Usage
//!
//! ```bash
//! tshop products
//! tshop product 7
//! tshop categories
//! tshop category 3
//! tshop review 7 --rate 4 --comment "Solid"
//! ```

use std::io::Write;

use tshop_core::{CategoryId, ProductId};
use tshop_storefront::Storefront;
use tshop_storefront::api::Product;
use tshop_storefront::forms::ReviewForm;

use super::CliError;

/// List every product.
pub async fn products(storefront: &Storefront, out: &mut impl Write) -> Result<(), CliError> {
    let products = storefront.queries().products().await?;
    write_products(out, &products)
}

/// Show one product, its details and its reviews.
pub async fn product(
    storefront: &Storefront,
    out: &mut impl Write,
    id: ProductId,
) -> Result<(), CliError> {
    let product = storefront.queries().product(id).await?;

    writeln!(out, "{} (#{})", product.name, product.id)?;
    writeln!(out, "  Price:  {}", product.price)?;
    if let Some(discount) = product.discount.filter(|d| !d.is_zero()) {
        writeln!(out, "  Discount: {discount}")?;
    }
    if let Some(brand) = &product.brand {
        writeln!(out, "  Brand:  {brand}")?;
    }
    match product.stock {
        Some(_) if product.is_out_of_stock() => writeln!(out, "  Stock:  out of stock")?,
        Some(stock) => writeln!(out, "  Stock:  {stock}")?,
        None => {}
    }
    if let Some(rate) = product.rate {
        writeln!(out, "  Rating: {rate:.1}/5")?;
    }
    if let Some(image) = product.primary_image() {
        writeln!(out, "  Image:  {image}")?;
    }
    if let Some(description) = product.description.as_deref().filter(|d| !d.is_empty()) {
        writeln!(out)?;
        writeln!(out, "{description}")?;
    }

    writeln!(out)?;
    if product.reviews.is_empty() {
        writeln!(out, "No reviews yet.")?;
    } else {
        writeln!(out, "Reviews ({}):", product.reviews.len())?;
        for review in &product.reviews {
            let author = review.author.as_deref().unwrap_or("Anonymous");
            let rate = review
                .rate
                .map_or_else(|| "-".to_string(), |r| format!("{r:.0}/5"));
            let date = review
                .created_at
                .map(|d| d.format(" on %Y-%m-%d").to_string())
                .unwrap_or_default();
            writeln!(out, "  {rate} by {author}{date}")?;
            if let Some(comment) = review.comment.as_deref().filter(|c| !c.is_empty()) {
                writeln!(out, "    {comment}")?;
            }
        }
    }
    Ok(())
}

/// List active categories.
pub async fn categories(storefront: &Storefront, out: &mut impl Write) -> Result<(), CliError> {
    let categories = storefront.queries().categories().await?;
    if categories.is_empty() {
        writeln!(out, "No categories found.")?;
        return Ok(());
    }
    for category in categories.iter() {
        writeln!(out, "{:>5}  {}", category.id.as_i64(), category.name)?;
    }
    Ok(())
}

/// Show a category and the products in it.
pub async fn category(
    storefront: &Storefront,
    out: &mut impl Write,
    id: CategoryId,
) -> Result<(), CliError> {
    let queries = storefront.queries();
    let (category, products) = tokio::join!(queries.category(id), queries.category_products(id));
    let category = category?;
    let products = products?;

    writeln!(out, "{} (#{})", category.name, category.id)?;
    if let Some(description) = category.description.as_deref().filter(|d| !d.is_empty()) {
        writeln!(out, "{description}")?;
    }
    writeln!(out)?;
    write_products(out, &products)
}

/// Post a review.
pub async fn review(
    storefront: &Storefront,
    product_id: ProductId,
    rate: u8,
    comment: String,
) -> Result<(), CliError> {
    let form = ReviewForm { rate, comment };
    storefront.submit_review(product_id, &form).await?;
    Ok(())
}

fn write_products(out: &mut impl Write, products: &[Product]) -> Result<(), CliError> {
    if products.is_empty() {
        writeln!(out, "No products found.")?;
        return Ok(());
    }
    for product in products {
        let stock = if product.is_out_of_stock() {
            "  (out of stock)"
        } else {
            ""
        };
        writeln!(
            out,
            "{:>5}  {:<40} {:>10}{stock}",
            product.id.as_i64(),
            product.name,
            product.price.to_string()
        )?;
    }
    Ok(())
}
