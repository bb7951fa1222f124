//! Session state: the bearer credential and everything derived from it.
//!
//! The session is the only writer of the credential container. Other
//! components (the HTTP client, the user profile) hold read-only
//! `watch::Receiver`s and react to changes.

use std::sync::{Arc, Weak};

use jsonwebtoken::{DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use store_hub_core::{LoginRequest, TokenClaims};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, AuthApi};
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::storage::{KeyValueStore, StorageError, keys, read_json_or_discard, write_json};

/// Acknowledgement returned by [`Session::request_password_reset`].
pub const PASSWORD_RESET_MESSAGE: &str =
    "If an account exists for this address, a recovery email will be sent";

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend rejected or never answered the request.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The credential could not be persisted or read back.
    #[error("credential storage failed: {0}")]
    Storage(#[from] StorageError),

    /// The stored token payload could not be decoded.
    #[error("invalid credential: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// View the application should show.
///
/// Routing itself happens elsewhere; the session only announces where the
/// user belongs after a login or logout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Route {
    #[default]
    Home,
    SignIn,
}

/// Durable representation of the credential.
#[derive(Serialize, Deserialize)]
struct StoredAuth {
    token: String,
}

/// Bearer credential holder.
pub struct Session<A> {
    auth: Arc<A>,
    store: Arc<dyn KeyValueStore>,
    token: watch::Sender<Option<SecretString>>,
    authenticated: watch::Sender<bool>,
    loading: watch::Sender<bool>,
    route: watch::Sender<Route>,
}

impl<A: AuthApi> Session<A> {
    /// Create the session, restoring any credential found in `store`.
    ///
    /// `token` is the credential container; the session becomes its only
    /// writer, so receivers should be created from it before it is handed
    /// over.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read. A stored credential
    /// that cannot be decoded is discarded and the session starts signed
    /// out.
    pub fn new(
        auth: Arc<A>,
        store: Arc<dyn KeyValueStore>,
        token: watch::Sender<Option<SecretString>>,
    ) -> Result<Self, SessionError> {
        let restored = read_json_or_discard::<StoredAuth>(store.as_ref(), keys::AUTH)?
            .map(|stored| stored.token)
            .filter(|t| !t.is_empty());

        if restored.is_some() {
            debug!("Restored credential from storage");
        }

        let session = Self {
            auth,
            store,
            token,
            authenticated: watch::Sender::new(false),
            loading: watch::Sender::new(false),
            route: watch::Sender::new(Route::default()),
        };
        session.set_token(restored.map(SecretString::from));
        Ok(session)
    }

    /// Exchange credentials for a bearer token.
    ///
    /// On success the token is stored in memory and durably, and the route
    /// moves to [`Route::Home`]. On failure nothing about the existing
    /// session changes. Concurrent calls are not coalesced.
    ///
    /// # Errors
    ///
    /// Returns the normalized backend error, or a storage error if the token
    /// could not be persisted.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &LoginRequest) -> Result<(), SessionError> {
        self.loading.send_replace(true);
        let result = self.auth.login(credentials).await;
        self.loading.send_replace(false);

        let response = result.inspect_err(|e| {
            warn!(code = e.code, "Login rejected");
        })?;

        write_json(
            self.store.as_ref(),
            keys::AUTH,
            &StoredAuth {
                token: response.token.clone(),
            },
        )?;

        let claims = decode_claims(&response.token).ok();
        self.set_token(Some(SecretString::from(response.token)));
        self.route.send_replace(Route::Home);

        if let Some(claims) = claims {
            set_sentry_user(&claims.sub, claims.user.as_deref());
        }
        add_breadcrumb("auth", "Signed in", None);
        info!("Signed in");
        Ok(())
    }

    /// Forget the credential in memory and in storage, then route to sign-in.
    ///
    /// Idempotent.
    #[instrument(skip(self))]
    pub fn logout(&self) {
        self.set_token(None);

        if let Err(e) = self.store.remove(keys::AUTH) {
            warn!(error = %e, "Failed to remove stored credential");
        }

        self.route.send_replace(Route::SignIn);
        clear_sentry_user();
        add_breadcrumb("auth", "Signed out", None);
    }

    /// Acknowledge a password reset request.
    ///
    /// The backend has no reset endpoint, so nothing is sent.
    #[must_use]
    pub fn request_password_reset(&self, email: &str) -> &'static str {
        debug!(email = %email, "Password reset requested");
        PASSWORD_RESET_MESSAGE
    }
}

impl<A> Session<A> {
    fn set_token(&self, token: Option<SecretString>) {
        let authenticated = token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty());
        self.token.send_replace(token);
        self.authenticated.send_replace(authenticated);
    }

    /// Whether a non-empty credential is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    /// Authentication flag, recomputed on every credential change.
    #[must_use]
    pub fn authenticated(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    /// Read-only view of the credential.
    #[must_use]
    pub fn credentials(&self) -> watch::Receiver<Option<SecretString>> {
        self.token.subscribe()
    }

    /// Whether a login request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Where the user should be.
    #[must_use]
    pub fn route(&self) -> watch::Receiver<Route> {
        self.route.subscribe()
    }

    /// Decode the claims of the held credential without verifying it.
    ///
    /// Returns `Ok(None)` when there is no credential.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidToken`] if the token payload cannot be
    /// decoded.
    pub fn token_data(&self) -> Result<Option<TokenClaims>, SessionError> {
        let token = self
            .token
            .borrow()
            .as_ref()
            .map(|t| t.expose_secret().to_string());

        token
            .map(|t| decode_claims(&t))
            .transpose()
            .map_err(SessionError::from)
    }
}

impl<A: AuthApi + 'static> Session<A> {
    /// Log out whenever the HTTP client reports a rejected credential.
    ///
    /// The task ends when the session is dropped or the client goes away.
    #[must_use]
    pub fn watch_unauthorized(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let session: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        if session.is_authenticated() {
                            warn!("Credential rejected by backend, signing out");
                            session.logout();
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Decode a bearer token payload.
///
/// The signature is not verified: the backend is the trust boundary and
/// the client only needs the subject.
///
/// # Errors
///
/// Returns an error if the token is not a well-formed JWT with the
/// expected claims.
pub fn decode_claims(token: &str) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use store_hub_core::UserId;

    use super::*;
    use crate::storage::{MemoryStore, read_json};
    use crate::testing::{FakeBackend, PASSWORD, USERNAME, token_for};

    fn session_with(store: Arc<MemoryStore>) -> (Arc<FakeBackend>, Session<FakeBackend>) {
        let backend = Arc::new(FakeBackend::new());
        let session = Session::new(backend.clone(), store, watch::Sender::new(None)).unwrap();
        (backend, session)
    }

    fn stored_token(store: &MemoryStore) -> Option<String> {
        read_json::<StoredAuth>(store, keys::AUTH)
            .unwrap()
            .map(|s| s.token)
    }

    #[tokio::test]
    async fn test_login_stores_token_and_routes_home() {
        let store = Arc::new(MemoryStore::new());
        let (_, session) = session_with(store.clone());
        let route = session.route();
        assert!(!session.is_authenticated());

        session
            .login(&LoginRequest::new(USERNAME, PASSWORD))
            .await
            .unwrap();

        assert!(session.is_authenticated());
        assert!(!session.is_loading());
        assert_eq!(*route.borrow(), Route::Home);
        assert_eq!(stored_token(&store), Some(token_for(2)));
        assert_eq!(session.token_data().unwrap().unwrap().sub, UserId::new(2));
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_session() {
        let store = Arc::new(MemoryStore::new());
        write_json(store.as_ref(), keys::AUTH, &StoredAuth { token: token_for(5) }).unwrap();
        let (_, session) = session_with(store.clone());

        let err = session
            .login(&LoginRequest::new(USERNAME, "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Api(ref e) if e.message == "failed to authenticate"));
        assert!(session.is_authenticated());
        assert!(!session.is_loading());
        assert_eq!(stored_token(&store), Some(token_for(5)));
    }

    #[tokio::test]
    async fn test_restores_credential_from_storage() {
        let store = Arc::new(MemoryStore::new());
        write_json(store.as_ref(), keys::AUTH, &StoredAuth { token: token_for(9) }).unwrap();

        let (_, session) = session_with(store);
        assert!(session.is_authenticated());
        assert_eq!(session.token_data().unwrap().unwrap().sub, UserId::new(9));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let (_, session) = session_with(store.clone());
        let mut authenticated = session.authenticated();
        session
            .login(&LoginRequest::new(USERNAME, PASSWORD))
            .await
            .unwrap();
        assert!(*authenticated.borrow_and_update());

        session.logout();
        session.logout();

        assert!(!*authenticated.borrow_and_update());
        assert_eq!(*session.route().borrow(), Route::SignIn);
        assert_eq!(stored_token(&store), None);
        assert!(session.token_data().unwrap().is_none());
    }

    #[test]
    fn test_token_data_rejects_garbage() {
        let store = Arc::new(MemoryStore::new());
        write_json(
            store.as_ref(),
            keys::AUTH,
            &StoredAuth {
                token: "not-a-jwt".to_string(),
            },
        )
        .unwrap();
        let (_, session) = session_with(store);

        assert!(session.is_authenticated());
        assert!(matches!(
            session.token_data(),
            Err(SessionError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_empty_stored_token_is_unauthenticated() {
        let store = Arc::new(MemoryStore::new());
        write_json(store.as_ref(), keys::AUTH, &StoredAuth { token: String::new() }).unwrap();
        let (_, session) = session_with(store);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_unreadable_stored_credential_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::AUTH, "{truncated").unwrap();

        let (_, session) = session_with(store.clone());

        assert!(!session.is_authenticated());
        assert_eq!(store.get(keys::AUTH).unwrap(), None);
    }

    #[test]
    fn test_password_reset_is_acknowledged_locally() {
        let (backend, session) = session_with(Arc::new(MemoryStore::new()));
        assert_eq!(
            session.request_password_reset("someone@example.com"),
            PASSWORD_RESET_MESSAGE
        );
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_event_logs_out() {
        let (_, session) = session_with(Arc::new(MemoryStore::new()));
        let session = Arc::new(session);
        session
            .login(&LoginRequest::new(USERNAME, PASSWORD))
            .await
            .unwrap();

        let (events, rx) = broadcast::channel(4);
        let mut authenticated = session.authenticated();
        authenticated.borrow_and_update();
        let task = session.watch_unauthorized(rx);

        events.send(()).unwrap();
        authenticated.changed().await.unwrap();
        assert!(!*authenticated.borrow());

        drop(events);
        task.await.unwrap();
    }
}
