//! Account commands.
//!
//! # Usage
//!
//! ```bash
//! store-hub login -u mor_2314 -p 83r5^_
//! store-hub whoami
//! store-hub register -u newbie -e newbie@example.com -p secret
//! store-hub logout
//! ```

use std::io::{self, Write};

use store_hub_core::{LoginRequest, RegisterRequest};
use store_hub_storefront::Storefront;

use super::{CommandError, print_items};

/// Sign in, then merge the local cart into the server cart.
///
/// A failed merge is reported but does not undo the sign-in.
pub async fn login(
    storefront: &Storefront,
    username: &str,
    password: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    storefront
        .session()
        .login(&LoginRequest::new(username, password))
        .await?;

    let mut out = io::stdout().lock();
    writeln!(out, "Signed in as {username}")?;
    drop(out);

    match storefront.sync_cart_after_login().await {
        Ok(items) => print_items(&items)?,
        Err(e) => tracing::warn!("Cart not synchronized: {e}"),
    }
    Ok(())
}

pub fn logout(storefront: &Storefront) -> Result<(), CommandError> {
    storefront.logout();
    writeln!(io::stdout().lock(), "Signed out")?;
    Ok(())
}

/// Print the signed-in profile.
pub async fn whoami(storefront: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    if !storefront.session().is_authenticated() {
        return Err(CommandError::NotSignedIn.into());
    }

    let user = storefront.profile().get_user_info().await?;
    let roles: Vec<String> = user.roles.iter().map(ToString::to_string).collect();

    let mut out = io::stdout().lock();
    writeln!(out, "{} (#{})", user.display_name(), user.id)?;
    writeln!(out, "username: {}", user.username)?;
    writeln!(out, "email:    {}", user.email)?;
    if !user.phone.is_empty() {
        writeln!(out, "phone:    {}", user.phone)?;
    }
    writeln!(out, "roles:    {}", roles.join(", "))?;
    Ok(())
}

pub async fn register(
    storefront: &Storefront,
    username: String,
    email: String,
    password: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = RegisterRequest {
        username,
        email,
        password,
    };
    let user = storefront.profile().register(&request).await?;

    writeln!(
        io::stdout().lock(),
        "Created account #{} for {}. Sign in with `store-hub login`.",
        user.id,
        request.username
    )?;
    Ok(())
}

pub fn reset_password(storefront: &Storefront, email: &str) -> Result<(), CommandError> {
    let message = storefront.session().request_password_reset(email);
    writeln!(io::stdout().lock(), "{message}")?;
    Ok(())
}
