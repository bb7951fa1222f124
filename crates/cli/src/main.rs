//! Store Hub CLI - catalog, cart and account from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (merges the session's cart into the server cart)
//! store-hub login -u mor_2314 -p 83r5^_
//!
//! # Browse the catalog
//! store-hub products list --category electronics --min-rating 4
//!
//! # Work with the cart
//! store-hub cart add 7
//! store-hub cart show
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `whoami` / `register` / `reset-password` - Account
//! - `products` - Browse and manage the catalog
//! - `cart` - Inspect and change the cart
//! - `consent` - Cookie-consent preference
//!
//! Configuration comes from the environment, see
//! [`store_hub_storefront::config`].

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use store_hub_core::ProductId;
use store_hub_storefront::Storefront;
use store_hub_storefront::config::StorefrontConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "store-hub")]
#[command(author, version, about = "Store Hub storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and synchronize the cart
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in profile
    Whoami,
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Request a password reset email
    ResetPassword {
        #[arg(short, long)]
        email: String,
    },
    /// Browse and manage products
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Inspect and change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the cookie-consent preference
    Consent {
        #[command(subcommand)]
        action: ConsentAction,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List products, optionally filtered
    List {
        /// Case-insensitive text matched against title and description
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        /// Minimum rating (inclusive)
        #[arg(short, long)]
        min_rating: Option<f64>,
    },
    /// Show one product
    Show { id: ProductId },
    /// Create a product
    Add {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        price: Decimal,

        #[arg(short, long, default_value = "")]
        description: String,

        #[arg(short, long, default_value = "")]
        category: String,

        #[arg(short, long, default_value = "")]
        image: String,
    },
    /// Change fields of a product
    Update {
        id: ProductId,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        price: Option<Decimal>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        image: Option<String>,
    },
    /// Delete a product
    Delete { id: ProductId },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add one unit of a product
    Add { product_id: ProductId },
    /// Increase a line's quantity by one
    Inc { product_id: ProductId },
    /// Decrease a line's quantity by one (never below one)
    Dec { product_id: ProductId },
    /// Remove a line
    Remove { product_id: ProductId },
    /// Empty the local cart
    Clear,
}

#[derive(Subcommand)]
enum ConsentAction {
    /// Accept essential and analytics cookies
    AcceptAll,
    /// Accept essential cookies only
    Essential,
    /// Withdraw consent
    Revoke,
    /// Show the current preference
    Status,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so command output stays pipeable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "store_hub=warn,store_hub_storefront=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    let storefront = Storefront::new(config)?;
    let _tasks = storefront.start_background_tasks();

    match cli.command {
        Commands::Login { username, password } => {
            commands::auth::login(&storefront, &username, &password).await?;
        }
        Commands::Logout => commands::auth::logout(&storefront)?,
        Commands::Whoami => commands::auth::whoami(&storefront).await?,
        Commands::Register {
            username,
            email,
            password,
        } => commands::auth::register(&storefront, username, email, password).await?,
        Commands::ResetPassword { email } => {
            commands::auth::reset_password(&storefront, &email)?;
        }
        Commands::Products { action } => match action {
            ProductAction::List {
                search,
                category,
                min_rating,
            } => commands::products::list(&storefront, search, category, min_rating).await?,
            ProductAction::Show { id } => commands::products::show(&storefront, id).await?,
            ProductAction::Add {
                title,
                price,
                description,
                category,
                image,
            } => {
                let product = store_hub_core::NewProduct {
                    title,
                    price,
                    description,
                    category,
                    image,
                };
                commands::products::add(&storefront, &product).await?;
            }
            ProductAction::Update {
                id,
                title,
                price,
                description,
                category,
                image,
            } => {
                let changes = commands::products::ProductChanges {
                    title,
                    price,
                    description,
                    category,
                    image,
                };
                commands::products::update(&storefront, id, changes).await?;
            }
            ProductAction::Delete { id } => commands::products::delete(&storefront, id).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&storefront).await?,
            CartAction::Add { product_id } => commands::cart::add(&storefront, product_id).await?,
            CartAction::Inc { product_id } => {
                commands::cart::increment(&storefront, product_id).await?;
            }
            CartAction::Dec { product_id } => {
                commands::cart::decrement(&storefront, product_id).await?;
            }
            CartAction::Remove { product_id } => {
                commands::cart::remove(&storefront, product_id).await?;
            }
            CartAction::Clear => commands::cart::clear(&storefront)?,
        },
        Commands::Consent { action } => match action {
            ConsentAction::AcceptAll => commands::consent::accept_all(&storefront)?,
            ConsentAction::Essential => commands::consent::essential(&storefront)?,
            ConsentAction::Revoke => commands::consent::revoke(&storefront)?,
            ConsentAction::Status => commands::consent::status(&storefront)?,
        },
    }
    Ok(())
}
