//! Command implementations.

pub mod auth;
pub mod cart;
pub mod consent;
pub mod products;

use std::io::{self, Write};

use store_hub_core::{CartItem, Price, cart_total};
use thiserror::Error;

/// Errors raised by the commands themselves.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The catalog recorded a failure instead of returning one.
    #[error("{0}")]
    Catalog(String),

    /// The command needs a signed-in user.
    #[error("Not signed in. Run `store-hub login` first.")]
    NotSignedIn,

    /// Writing to stdout failed.
    #[error("Output error: {0}")]
    Io(#[from] io::Error),
}

/// Print the item list with line totals and the cart total.
pub fn print_items(items: &[CartItem]) -> Result<(), CommandError> {
    let mut out = io::stdout().lock();

    if items.is_empty() {
        writeln!(out, "Cart is empty")?;
        return Ok(());
    }

    for item in items {
        writeln!(
            out,
            "{:>4}  {:>3} x {:<40} {:>10}",
            item.product.id,
            item.quantity,
            item.product.title,
            Price::usd(item.line_total()).to_string()
        )?;
    }
    writeln!(
        out,
        "{} line(s), total {}",
        items.len(),
        cart_total(items)
    )?;
    Ok(())
}
