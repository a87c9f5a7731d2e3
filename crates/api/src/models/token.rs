//! Bearer tokens.

use chrono::{DateTime, Utc};
use serde::Serialize;

use widget_store_core::{TokenScope, UserId};

/// A freshly issued bearer token.
///
/// Only `token` and `expiry` are serialized. The plain text exists only in
/// the response that hands it to the client; the store keeps the SHA-256
/// hash.
#[derive(Clone, Serialize)]
pub struct AuthToken {
    #[serde(rename = "token")]
    pub plain_text: String,
    #[serde(skip)]
    pub hash: [u8; 32],
    #[serde(skip)]
    pub user_id: UserId,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("plain_text", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("expiry", &self.expiry)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
