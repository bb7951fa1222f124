//! User profile types.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// A user resource (`/users/{id}`).
///
/// Everything except `id` is optional on the wire; missing fields default.
/// `roles` is never sent by the backend and is assigned locally.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: PersonName,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl User {
    /// Whether the profile carries `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// "Firstname Lastname", or the username when no name is known.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.name.firstname, self.name.lastname);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name)
            .field("address", &self.address)
            .field("phone", &self.phone)
            .field("roles", &self.roles)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub zipcode: String,
    #[serde(default)]
    pub geolocation: Geolocation,
}

/// Coordinates as the backend sends them (decimal strings).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geolocation {
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub long: String,
}

/// Storefront role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Manager,
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Admin => "Admin",
            Self::Manager => "Manager",
            Self::Customer => "Customer",
        };
        f.write_str(name)
    }
}
