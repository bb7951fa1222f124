//! Catalog commands.
//!
//! The catalog records failures instead of returning them; these commands
//! turn a recorded failure into a [`CommandError::Catalog`].

use std::io::{self, Write};

use rust_decimal::Decimal;
use store_hub_core::{NewProduct, Product, ProductFilter, ProductId};
use store_hub_storefront::Storefront;

use super::CommandError;

/// Field overrides for `products update`.
pub struct ProductChanges {
    pub title: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image: Option<String>,
}

impl ProductChanges {
    fn apply(self, product: &mut NewProduct) {
        if let Some(title) = self.title {
            product.title = title;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(image) = self.image {
            product.image = image;
        }
    }
}

fn recorded_failure(storefront: &Storefront) -> CommandError {
    CommandError::Catalog(
        storefront
            .catalog()
            .error()
            .unwrap_or_else(|| "catalog request failed".to_string()),
    )
}

fn print_row(out: &mut impl Write, product: &Product) -> io::Result<()> {
    writeln!(
        out,
        "{:>4}  {:>10}  {:>3.1}  {:<14} {}",
        product.id,
        product.unit_price().to_string(),
        product.rating.rate,
        product.category,
        product.title
    )
}

pub async fn list(
    storefront: &Storefront,
    search: Option<String>,
    category: Option<String>,
    min_rating: Option<f64>,
) -> Result<(), CommandError> {
    let catalog = storefront.catalog();
    catalog.load_products().await;
    if catalog.error().is_some() {
        return Err(recorded_failure(storefront));
    }

    let filter = ProductFilter {
        text_search: search,
        category,
        min_rating,
    };
    let products = catalog.apply_filters(&filter);

    let mut out = io::stdout().lock();
    for product in &products {
        print_row(&mut out, product)?;
    }
    writeln!(out, "{} product(s)", products.len())?;
    Ok(())
}

pub async fn show(storefront: &Storefront, id: ProductId) -> Result<(), Box<dyn std::error::Error>> {
    let product = storefront.catalog().get_product(id).await?;

    let mut out = io::stdout().lock();
    writeln!(out, "{} (#{})", product.title, product.id)?;
    writeln!(out, "price:    {}", product.unit_price())?;
    writeln!(out, "category: {}", product.category)?;
    writeln!(
        out,
        "rating:   {:.1} ({} reviews)",
        product.rating.rate, product.rating.count
    )?;
    if !product.image.is_empty() {
        writeln!(out, "image:    {}", product.image)?;
    }
    if !product.description.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", product.description)?;
    }
    Ok(())
}

pub async fn add(storefront: &Storefront, product: &NewProduct) -> Result<(), CommandError> {
    let created = storefront
        .catalog()
        .add_product(product)
        .await
        .ok_or_else(|| recorded_failure(storefront))?;

    writeln!(io::stdout().lock(), "Created product #{}", created.id)?;
    Ok(())
}

pub async fn update(
    storefront: &Storefront,
    id: ProductId,
    changes: ProductChanges,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = storefront.catalog();
    let mut product = catalog.get_product(id).await?.to_new_product();
    changes.apply(&mut product);

    let updated = catalog
        .update_product(id, &product)
        .await
        .ok_or_else(|| recorded_failure(storefront))?;

    let mut out = io::stdout().lock();
    writeln!(out, "Updated product #{}", updated.id)?;
    print_row(&mut out, &updated)?;
    Ok(())
}

pub async fn delete(storefront: &Storefront, id: ProductId) -> Result<(), CommandError> {
    if !storefront.catalog().delete_product(id).await {
        return Err(recorded_failure(storefront));
    }
    writeln!(io::stdout().lock(), "Deleted product #{id}")?;
    Ok(())
}
