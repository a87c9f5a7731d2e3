//! HMAC-SHA256 signed links.
//!
//! A signed link is the original URL plus `expires=<unix seconds>` and
//! `hash=<hex mac>`, in that order. The MAC covers the exact text before
//! `&hash=`, so verification works on the string the client sends back
//! rather than a re-encoded URL.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const HASH_PARAM: &str = "&hash=";

/// Why a link was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("link is not a valid URL: {0}")]
    Malformed(String),

    #[error("link is not signed")]
    MissingSignature,

    #[error("link signature does not match")]
    InvalidSignature,

    #[error("link has expired")]
    Expired,

    #[error("signing key rejected")]
    InvalidKey,
}

/// Signs and verifies links with a shared secret.
#[derive(Clone)]
pub struct UrlSigner {
    secret: SecretString,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl UrlSigner {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Sign `url` so it is valid until `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::Malformed` if `url` does not parse.
    pub fn sign(&self, url: &str, expires_at: DateTime<Utc>) -> Result<String, SignerError> {
        Url::parse(url).map_err(|e| SignerError::Malformed(e.to_string()))?;

        let separator = if url.contains('?') { '&' } else { '?' };
        let payload = format!("{url}{separator}expires={}", expires_at.timestamp());
        let mac = self.mac(payload.as_bytes())?.finalize().into_bytes();

        Ok(format!("{payload}{HASH_PARAM}{}", hex::encode(mac)))
    }

    /// Check the signature and expiry of `link`, returning the parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::MissingSignature` or `SignerError::InvalidSignature`
    /// if the MAC is absent or wrong, and `SignerError::Expired` once `now` is
    /// past the embedded expiry.
    pub fn verify(&self, link: &str, now: DateTime<Utc>) -> Result<Url, SignerError> {
        let split = link.rfind(HASH_PARAM).ok_or(SignerError::MissingSignature)?;
        let (payload, signature) = link.split_at(split);
        let signature = signature.trim_start_matches(HASH_PARAM);

        let signature = hex::decode(signature).map_err(|_| SignerError::InvalidSignature)?;
        self.mac(payload.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| SignerError::InvalidSignature)?;

        let url = Url::parse(payload).map_err(|e| SignerError::Malformed(e.to_string()))?;
        let expires = url
            .query_pairs()
            .find(|(k, _)| k == "expires")
            .and_then(|(_, v)| v.parse::<i64>().ok())
            .ok_or_else(|| SignerError::Malformed("missing expires parameter".to_owned()))?;

        if now.timestamp() > expires {
            return Err(SignerError::Expired);
        }

        Ok(url)
    }

    fn mac(&self, payload: &[u8]) -> Result<HmacSha256, SignerError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignerError::InvalidKey)?;
        mac.update(payload);
        Ok(mac)
    }
}

/// Value of the first `name` query parameter.
#[must_use]
pub fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn signer() -> UrlSigner {
        UrlSigner::new(SecretString::from("kX9#mP2$vL5@nQ8&wR3*jT6^yB4!cF7%"))
    }

    fn reset_url() -> String {
        Url::parse_with_params(
            "http://localhost:4000/reset-password",
            &[("email", "jo+admin@example.com")],
        )
        .unwrap()
        .to_string()
    }

    #[test]
    fn test_sign_then_verify() {
        let now = Utc::now();
        let link = signer().sign(&reset_url(), now + TimeDelta::hours(1)).unwrap();

        assert!(link.contains("&expires="));
        assert!(link.contains("&hash="));

        let url = signer().verify(&link, now).unwrap();
        assert_eq!(
            query_param(&url, "email").as_deref(),
            Some("jo+admin@example.com")
        );
    }

    #[test]
    fn test_tampered_link_is_rejected() {
        let now = Utc::now();
        let link = signer().sign(&reset_url(), now + TimeDelta::hours(1)).unwrap();
        let tampered = link.replace("jo%2Badmin", "mallory");

        assert_eq!(
            signer().verify(&tampered, now),
            Err(SignerError::InvalidSignature)
        );
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let now = Utc::now();
        let link = signer().sign(&reset_url(), now + TimeDelta::hours(1)).unwrap();
        let other = UrlSigner::new(SecretString::from("a-completely-different-signing-key!"));

        assert_eq!(other.verify(&link, now), Err(SignerError::InvalidSignature));
    }

    #[test]
    fn test_expired_link_is_rejected() {
        let now = Utc::now();
        let link = signer().sign(&reset_url(), now - TimeDelta::minutes(1)).unwrap();

        assert_eq!(signer().verify(&link, now), Err(SignerError::Expired));
    }

    #[test]
    fn test_unsigned_link_is_rejected() {
        assert_eq!(
            signer().verify(&reset_url(), Utc::now()),
            Err(SignerError::MissingSignature)
        );
    }
}
