//! Cart commands.
//!
//! When signed in, every command first folds the process-local cart into
//! the server cart so it acts on the user's real cart. Signed out, the cart
//! only lives for the duration of the command.

use std::io::{self, Write};

use store_hub_core::ProductId;
use store_hub_storefront::Storefront;
use store_hub_storefront::cart::CartPhase;

use super::{CommandError, print_items};

/// Load the signed-in user's cart.
///
/// A user without a server cart yet is not an error: the first `add`
/// creates one.
async fn prepare(storefront: &Storefront) {
    if !storefront.session().is_authenticated() {
        return;
    }
    if let Err(e) = storefront.sync_cart_after_login().await {
        tracing::warn!("Server cart not loaded: {e}");
    }
}

fn print_cart(storefront: &Storefront) -> Result<(), CommandError> {
    let cart = storefront.cart();
    if cart.phase() == CartPhase::ServerCart
        && let Some(resident) = cart.cart()
    {
        writeln!(io::stdout().lock(), "Cart #{} ({})", resident.id, resident.date)?;
    }
    print_items(&cart.items())
}

pub async fn show(storefront: &Storefront) -> Result<(), CommandError> {
    prepare(storefront).await;
    print_cart(storefront)
}

pub async fn add(
    storefront: &Storefront,
    product_id: ProductId,
) -> Result<(), Box<dyn std::error::Error>> {
    prepare(storefront).await;
    let product = storefront.catalog().get_product(product_id).await?;

    let cart = storefront.cart().add_item(&product).await?;
    if cart.is_transient() {
        tracing::warn!("Not signed in: the cart is not saved");
    }

    writeln!(io::stdout().lock(), "Added {}", product.title)?;
    print_cart(storefront)?;
    Ok(())
}

pub async fn increment(
    storefront: &Storefront,
    product_id: ProductId,
) -> Result<(), Box<dyn std::error::Error>> {
    prepare(storefront).await;
    if storefront
        .cart()
        .increment_quantity(product_id)
        .await?
        .is_none()
    {
        writeln!(io::stdout().lock(), "Product #{product_id} is not in the cart")?;
        return Ok(());
    }
    print_cart(storefront)?;
    Ok(())
}

pub async fn decrement(
    storefront: &Storefront,
    product_id: ProductId,
) -> Result<(), Box<dyn std::error::Error>> {
    prepare(storefront).await;
    if storefront
        .cart()
        .decrement_quantity(product_id)
        .await?
        .is_none()
    {
        writeln!(
            io::stdout().lock(),
            "Nothing to change: product #{product_id} is missing or already at quantity 1"
        )?;
        return Ok(());
    }
    print_cart(storefront)?;
    Ok(())
}

pub async fn remove(
    storefront: &Storefront,
    product_id: ProductId,
) -> Result<(), Box<dyn std::error::Error>> {
    prepare(storefront).await;
    storefront.cart().remove_item(product_id).await?;
    print_cart(storefront)?;
    Ok(())
}

/// Empty the local cart. The server cart is not deleted.
pub fn clear(storefront: &Storefront) -> Result<(), CommandError> {
    storefront.cart().clear_cart();
    writeln!(io::stdout().lock(), "Cart cleared")?;
    Ok(())
}
