//! Authentication payloads and bearer token claims.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::id::UserId;

/// Body of `POST /auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Successful login response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Body of `POST /users` (account registration).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Claims carried in the bearer token payload.
///
/// Only the subject is relied upon; it identifies the user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(deserialize_with = "deserialize_subject")]
    pub sub: UserId,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Accept the subject as a JSON number or a numeric string.
fn deserialize_subject<'de, D>(deserializer: D) -> Result<UserId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Subject {
        Number(i32),
        Text(String),
    }

    match Subject::deserialize(deserializer)? {
        Subject::Number(id) => Ok(UserId::new(id)),
        Subject::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_as_number_or_string() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"sub": 2, "user": "mor_2314", "iat": 1700000000}"#).unwrap();
        assert_eq!(claims.sub, UserId::new(2));
        assert_eq!(claims.user.as_deref(), Some("mor_2314"));

        let claims: TokenClaims = serde_json::from_str(r#"{"sub": "14"}"#).unwrap();
        assert_eq!(claims.sub, UserId::new(14));
        assert_eq!(claims.user, None);

        assert!(serde_json::from_str::<TokenClaims>(r#"{"sub": "abc"}"#).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let request = LoginRequest::new("mor_2314", "83r5^_");
        assert!(!format!("{request:?}").contains("83r5^_"));

        let response = LoginResponse {
            token: "eyJhbGciOi".to_string(),
        };
        assert!(!format!("{response:?}").contains("eyJ"));
    }
}
