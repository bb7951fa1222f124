//! Profile of the signed-in user.
//!
//! Resolves the profile from the session credential and clears it when the
//! credential goes away. Role data sent by the backend is ignored: every
//! loaded profile is assigned [`ASSIGNED_ROLES`].

use std::sync::{Arc, Weak};

use secrecy::{ExposeSecret, SecretString};
use store_hub_core::{RegisterRequest, Role, User, UserId};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, UsersApi};
use crate::session::decode_claims;

/// Roles attached to every loaded profile.
// TODO: derive roles from the user resource once the backend exposes them.
pub const ASSIGNED_ROLES: &[Role] = &[Role::Admin];

/// Errors that can occur while resolving the profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No credential is held.
    #[error("no credential to resolve profile")]
    NoCredential,

    /// The credential payload could not be decoded.
    #[error("credential could not be decoded: {0}")]
    InvalidCredential(#[source] jsonwebtoken::errors::Error),

    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Profile service.
pub struct UserProfile<U> {
    users: Arc<U>,
    credentials: watch::Receiver<Option<SecretString>>,
    profile: watch::Sender<Option<User>>,
    user_id: watch::Sender<Option<UserId>>,
    loaded: watch::Sender<bool>,
}

impl<U: UsersApi> UserProfile<U> {
    #[must_use]
    pub fn new(users: Arc<U>, credentials: watch::Receiver<Option<SecretString>>) -> Self {
        Self {
            users,
            credentials,
            profile: watch::Sender::new(None),
            user_id: watch::Sender::new(None),
            loaded: watch::Sender::new(false),
        }
    }

    /// Fetch and publish the profile of the credential's subject.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NoCredential`] or
    /// [`ProfileError::InvalidCredential`] without touching the published
    /// profile, or [`ProfileError::Api`] if the fetch fails.
    #[instrument(skip(self))]
    pub async fn get_user_info(&self) -> Result<User, ProfileError> {
        let token = self
            .credentials
            .borrow()
            .as_ref()
            .map(|t| t.expose_secret().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ProfileError::NoCredential)?;

        let claims = decode_claims(&token).map_err(|e| {
            warn!(error = %e, "Stored credential is not decodable");
            ProfileError::InvalidCredential(e)
        })?;

        let mut user = self.users.get_by_id(claims.sub).await?;
        user.roles = ASSIGNED_ROLES.to_vec();
        debug!(user_id = %user.id, "Loaded profile");

        self.publish(Some(user.clone()));
        self.loaded.send_replace(true);
        Ok(user)
    }

    /// Create an account.
    ///
    /// Registration does not sign the new user in.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Api`] with the message
    /// "failed to create account" if the backend rejects the request.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, ProfileError> {
        let user = self.users.create(request).await?;
        info!(user_id = %user.id, "Account created");
        Ok(user)
    }
}

impl<U> UserProfile<U> {
    fn publish(&self, user: Option<User>) {
        self.user_id.send_replace(user.as_ref().map(|u| u.id));
        self.profile.send_replace(user);
    }

    /// Forget the loaded profile.
    pub fn clear(&self) {
        self.publish(None);
        self.loaded.send_replace(false);
    }

    /// Current profile, if loaded.
    #[must_use]
    pub fn profile(&self) -> Option<User> {
        self.profile.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.profile.subscribe()
    }

    /// Read-only view of the signed-in user's id.
    #[must_use]
    pub fn user_id_receiver(&self) -> watch::Receiver<Option<UserId>> {
        self.user_id.subscribe()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    #[must_use]
    pub fn roles(&self) -> Option<Vec<Role>> {
        self.profile.borrow().as_ref().map(|u| u.roles.clone())
    }

    #[must_use]
    pub fn is_admin(&self) -> Option<bool> {
        self.profile
            .borrow()
            .as_ref()
            .map(|u| u.has_role(Role::Admin))
    }

    /// Whether the user holds an elevated role (admin or manager).
    #[must_use]
    pub fn has_admin_or_manager_role(&self) -> Option<bool> {
        self.profile
            .borrow()
            .as_ref()
            .map(|u| u.has_role(Role::Admin) || u.has_role(Role::Manager))
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        *self.user_id.borrow()
    }
}

impl<U: UsersApi + 'static> UserProfile<U> {
    /// Clear the profile whenever the credential is dropped.
    ///
    /// The task ends when the profile or the credential container goes away.
    #[must_use]
    pub fn watch_session(self: &Arc<Self>) -> JoinHandle<()> {
        let profile: Weak<Self> = Arc::downgrade(self);
        let mut credentials = self.credentials.clone();

        tokio::spawn(async move {
            while credentials.changed().await.is_ok() {
                let signed_out = credentials.borrow_and_update().is_none();
                if !signed_out {
                    continue;
                }
                let Some(profile) = profile.upgrade() else {
                    break;
                };
                debug!("Credential cleared, dropping profile");
                profile.clear();
            }
        })
    }
}
