//! Cookie-consent commands.

use std::io::{self, Write};

use store_hub_storefront::Storefront;

pub fn accept_all(storefront: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    storefront.consent().accept_all()?;
    writeln!(io::stdout().lock(), "Accepted all cookies")?;
    Ok(())
}

pub fn essential(storefront: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    storefront.consent().accept_essential_only()?;
    writeln!(io::stdout().lock(), "Accepted essential cookies only")?;
    Ok(())
}

pub fn revoke(storefront: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    storefront.consent().revoke_consent()?;
    writeln!(io::stdout().lock(), "Consent withdrawn")?;
    Ok(())
}

pub fn status(storefront: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    let consent = storefront.consent();
    let analytics = consent.check_consent_status()?;
    let view = consent.view();

    let mut out = io::stdout().lock();
    if view.show_banner {
        writeln!(out, "No consent recorded")?;
        return Ok(());
    }
    writeln!(out, "consent:   {}", yes_no(view.consent_given))?;
    writeln!(out, "analytics: {}", yes_no(analytics))?;
    Ok(())
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
