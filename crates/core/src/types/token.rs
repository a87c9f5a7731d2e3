//! Token scopes.

use serde::{Deserialize, Serialize};

/// What a bearer token may be used for.
///
/// Only authentication tokens exist today; the scope column keeps room for
/// others without a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    #[default]
    Authentication,
}

impl TokenScope {
    /// Value stored in `tokens.scope`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
        }
    }
}

impl core::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
