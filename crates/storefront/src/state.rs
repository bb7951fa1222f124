//! Storefront state shared across the application.

use std::sync::Arc;

use store_hub_core::{CartItem, LoginRequest};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::api::ApiClient;
use crate::cart::CartState;
use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::consent::ConsentState;
use crate::error::Result;
use crate::session::Session;
use crate::storage::{FileStore, KeyValueStore};
use crate::user::UserProfile;

/// Every state service wired to one backend and one store.
///
/// This struct is cheaply cloneable via `Arc`. The session owns the
/// credential; the HTTP client, profile and cart only observe it.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    api: Arc<ApiClient>,
    session: Arc<Session<ApiClient>>,
    profile: Arc<UserProfile<ApiClient>>,
    catalog: Catalog<ApiClient>,
    cart: CartState<ApiClient>,
    consent: ConsentState,
}

impl Storefront {
    /// Create the storefront with a file store under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the persisted
    /// session cannot be restored.
    pub fn new(config: StorefrontConfig) -> Result<Self> {
        let store = FileStore::open(&config.data_dir)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Create the storefront on top of an existing store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or persisted
    /// state cannot be restored.
    pub fn with_store(config: StorefrontConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let token = watch::Sender::new(None);
        let api = Arc::new(ApiClient::new(&config.api, token.subscribe())?);

        let session = Arc::new(Session::new(api.clone(), store.clone(), token)?);
        let profile = Arc::new(UserProfile::new(api.clone(), session.credentials()));
        let catalog = Catalog::new(api.clone(), config.catalog_ttl);
        let cart = CartState::new(api.clone(), profile.user_id_receiver());
        let consent = ConsentState::new(store)?;

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                session,
                profile,
                catalog,
                cart,
                consent,
            }),
        })
    }

    /// Start the tasks that react to credential changes.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start_background_tasks(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.inner
                .session
                .watch_unauthorized(self.inner.api.unauthorized_events()),
            self.inner.profile.watch_session(),
        ]
    }

    /// Sign in, then merge the transient cart into the user's server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication, the profile fetch or the cart
    /// merge fails. A failed merge leaves the user signed in.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Vec<CartItem>> {
        self.inner.session.login(credentials).await?;
        self.sync_cart_after_login().await
    }

    /// Resolve the profile and fold the transient cart into the server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile or the server cart cannot be loaded.
    pub async fn sync_cart_after_login(&self) -> Result<Vec<CartItem>> {
        let user = self.inner.profile.get_user_info().await?;
        let items = self
            .inner
            .cart
            .merge_on_login(user.id, &self.inner.catalog)
            .await?;
        info!(user_id = %user.id, lines = items.len(), "Cart synchronized");
        Ok(items)
    }

    /// Sign out and drop everything tied to the user.
    pub fn logout(&self) {
        self.inner.session.logout();
        self.inner.profile.clear();
        self.inner.cart.clear_cart();
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn session(&self) -> &Session<ApiClient> {
        &self.inner.session
    }

    #[must_use]
    pub fn profile(&self) -> &UserProfile<ApiClient> {
        &self.inner.profile
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog<ApiClient> {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartState<ApiClient> {
        &self.inner.cart
    }

    #[must_use]
    pub fn consent(&self) -> &ConsentState {
        &self.inner.consent
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::storage::{MemoryStore, keys};

    fn offline_config() -> StorefrontConfig {
        StorefrontConfig::new(ApiConfig::new("http://127.0.0.1:9").unwrap(), "unused")
    }

    #[test]
    fn test_fresh_storefront_is_signed_out() {
        let storefront =
            Storefront::with_store(offline_config(), Arc::new(MemoryStore::new())).unwrap();

        assert!(!storefront.session().is_authenticated());
        assert_eq!(storefront.profile().user_id(), None);
        assert!(storefront.cart().items().is_empty());
    }

    #[test]
    fn test_restores_persisted_session() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::AUTH, r#"{"token":"abc.def.ghi"}"#).unwrap();

        let storefront = Storefront::with_store(offline_config(), store.clone()).unwrap();
        assert!(storefront.session().is_authenticated());

        storefront.logout();
        assert!(!storefront.session().is_authenticated());
        assert_eq!(store.get(keys::AUTH).unwrap(), None);
    }

    #[test]
    fn test_unreadable_stored_state_starts_signed_out() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::AUTH, "{truncated").unwrap();
        store.set(keys::CONSENT, "[]").unwrap();

        let storefront = Storefront::with_store(offline_config(), store.clone()).unwrap();

        assert!(!storefront.session().is_authenticated());
        assert!(!storefront.consent().can_load_analytics());
        assert_eq!(store.get(keys::AUTH).unwrap(), None);
        assert_eq!(store.get(keys::CONSENT).unwrap(), None);
    }

    #[test]
    fn test_file_store_is_created_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorefrontConfig::new(
            ApiConfig::new("http://127.0.0.1:9").unwrap(),
            dir.path().join("data"),
        );

        let storefront = Storefront::new(config).unwrap();
        storefront.consent().accept_all().unwrap();

        assert!(dir.path().join("data").join("storage.json").exists());
    }
}
