//! Integration tests for the session over HTTP.
//!
//! Covers login and logout, credential persistence, bearer attachment and
//! the automatic logout on a rejected credential, and recovery from a
//! corrupt stored credential.

use std::sync::Arc;
use std::time::Duration;

use store_hub_core::{CartId, LoginRequest, ProductId, UserId};
use store_hub_integration_tests::{FakeBackend, PASSWORD, USERNAME, USER_WITH_CART, token_for};
use store_hub_storefront::Storefront;
use store_hub_storefront::session::{PASSWORD_RESET_MESSAGE, Route, SessionError};
use store_hub_storefront::storage::{FileStore, KeyValueStore, keys};

fn credentials() -> LoginRequest {
    LoginRequest::new(USERNAME, PASSWORD)
}

// =============================================================================
// Login / Logout
// =============================================================================

#[tokio::test]
async fn test_login_sets_token_and_routes_home() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();

    storefront.session().login(&credentials()).await.unwrap();

    let session = storefront.session();
    assert!(session.is_authenticated());
    assert!(!session.is_loading());
    assert_eq!(*session.route().borrow(), Route::Home);
    assert_eq!(
        session.token_data().unwrap().unwrap().sub,
        UserId::new(USER_WITH_CART)
    );
}

#[tokio::test]
async fn test_rejected_login_is_normalized() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();

    let err = storefront
        .session()
        .login(&LoginRequest::new(USERNAME, "wrong"))
        .await
        .unwrap_err();

    let api = match err {
        SessionError::Api(api) => api,
        other => panic!("expected an API error, got {other:?}"),
    };
    assert_eq!(api.message, "failed to authenticate");
    assert_eq!(api.code, 401);
    assert!(!storefront.session().is_authenticated());
    assert!(!storefront.session().is_loading());
}

#[tokio::test]
async fn test_credential_survives_restart() {
    let backend = FakeBackend::start().await;
    let dir = tempfile::tempdir().unwrap();

    {
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let storefront = Storefront::with_store(backend.config(), store).unwrap();
        storefront.session().login(&credentials()).await.unwrap();
    }

    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let raw = store.get(keys::AUTH).unwrap().unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored["token"], token_for(USER_WITH_CART));

    let storefront = Storefront::with_store(backend.config(), store.clone()).unwrap();
    assert!(storefront.session().is_authenticated());

    storefront.logout();
    assert!(!storefront.session().is_authenticated());
    assert_eq!(*storefront.session().route().borrow(), Route::SignIn);
    assert_eq!(store.get(keys::AUTH).unwrap(), None);
}

#[tokio::test]
async fn test_password_reset_makes_no_request() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();

    let message = storefront
        .session()
        .request_password_reset("john@example.com");

    assert_eq!(message, PASSWORD_RESET_MESSAGE);
    assert!(backend.calls().is_empty());
}

// =============================================================================
// Bearer handling
// =============================================================================

#[tokio::test]
async fn test_bearer_is_attached_except_on_public_paths() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    storefront.session().login(&credentials()).await.unwrap();

    storefront.profile().get_user_info().await.unwrap();
    storefront.catalog().load_products().await;

    let token = token_for(USER_WITH_CART);
    assert_eq!(backend.last("POST", "/auth/login").unwrap().bearer, None);
    assert_eq!(backend.last("GET", "/products").unwrap().bearer, None);
    assert_eq!(
        backend.last("GET", "/users/2").unwrap().bearer.as_deref(),
        Some(token.as_str())
    );
}

#[tokio::test]
async fn test_no_bearer_when_signed_out() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();

    storefront
        .cart()
        .load_cart_by_id(UserId::new(USER_WITH_CART))
        .await
        .unwrap();

    assert_eq!(backend.last("GET", "/carts/2").unwrap().bearer, None);
}

#[tokio::test]
async fn test_rejected_bearer_logs_out() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    storefront.session().login(&credentials()).await.unwrap();

    let mut authenticated = storefront.session().authenticated();
    authenticated.borrow_and_update();
    backend.set_reject_bearer(true);

    let err = storefront.profile().get_user_info().await.unwrap_err();
    assert!(err.to_string().contains("HTTP 401"));

    tokio::time::timeout(Duration::from_secs(5), authenticated.changed())
        .await
        .expect("logout was not triggered")
        .unwrap();
    assert!(!*authenticated.borrow());
    assert_eq!(*storefront.session().route().borrow(), Route::SignIn);
}

#[tokio::test]
async fn test_rejected_bearer_stops_cart_writes() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    storefront.login(&credentials()).await.unwrap();
    assert!(storefront.cart().cart().is_some());

    let mut user_id = storefront.profile().user_id_receiver();
    backend.set_reject_bearer(true);
    storefront.profile().get_user_info().await.unwrap_err();

    tokio::time::timeout(Duration::from_secs(5), user_id.wait_for(Option::is_none))
        .await
        .expect("profile was not cleared")
        .unwrap();
    backend.clear_calls();

    let cart = storefront
        .cart()
        .increment_quantity(ProductId::new(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(cart.id, CartId::ANONYMOUS);
    assert_eq!(backend.count("PUT", "/carts/2"), 0);
    assert!(backend.calls().is_empty());
    assert_eq!(storefront.cart().cart(), None);
    let stored = backend.cart(USER_WITH_CART).unwrap();
    assert_eq!(stored.line(ProductId::new(1)).unwrap().quantity, 2);
}

#[tokio::test]
async fn test_profile_is_cleared_after_logout() {
    let backend = FakeBackend::start().await;
    let storefront = backend.storefront();
    storefront.session().login(&credentials()).await.unwrap();
    storefront.profile().get_user_info().await.unwrap();

    let mut profile = storefront.profile().subscribe();
    profile.borrow_and_update();
    storefront.session().logout();

    tokio::time::timeout(Duration::from_secs(5), profile.changed())
        .await
        .expect("profile was not cleared")
        .unwrap();
    assert!(profile.borrow().is_none());
    assert_eq!(storefront.profile().is_admin(), None);
}
