//! Staff user types.
//!
//! Users are the people who log into the admin dashboard. They are unrelated
//! to checkout customers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use widget_store_core::{Email, UserId};

/// A staff user (domain type).
///
/// The password hash is never part of this type; repositories return it
/// separately where a login needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin create/update payload.
///
/// An empty `password` on update leaves the stored hash alone.
#[derive(Clone, Deserialize)]
pub struct UserInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for UserInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserInput")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
