//! Bearer token issue and verification against an in-memory store.
//!
//! Run with: cargo test -p widget-store-integration-tests --test tokens

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::TimeDelta;

use widget_store_api::services::{AuthError, TokenService};
use widget_store_core::UserId;
use widget_store_integration_tests::{InMemoryTokenStore, staff_user};

fn service() -> (TokenService, Arc<InMemoryTokenStore>) {
    let store = Arc::new(InMemoryTokenStore::default());
    (TokenService::new(store.clone(), TimeDelta::hours(24)), store)
}

#[tokio::test]
async fn test_issued_token_authenticates_its_user() {
    let (tokens, _) = service();
    let user = staff_user(3, "admin@example.com");

    let token = tokens.issue(&user).await.unwrap();
    let header = format!("Bearer {}", token.plain_text);

    let found = tokens.authenticate(Some(&header)).await.unwrap();
    assert_eq!(found.id, UserId::new(3));
}

#[tokio::test]
async fn test_reissue_replaces_previous_token() {
    let (tokens, store) = service();
    let user = staff_user(3, "admin@example.com");

    let first = tokens.issue(&user).await.unwrap();
    let second = tokens.issue(&user).await.unwrap();

    assert_eq!(store.count_for(user.id), 1);
    let stale = format!("Bearer {}", first.plain_text);
    assert!(matches!(
        tokens.authenticate(Some(&stale)).await,
        Err(AuthError::InvalidToken)
    ));
    let fresh = format!("Bearer {}", second.plain_text);
    assert!(tokens.authenticate(Some(&fresh)).await.is_ok());
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (tokens, _) = service();
    let user = staff_user(3, "admin@example.com");

    let token = tokens
        .issue_with_ttl(&user, TimeDelta::seconds(-1))
        .await
        .unwrap();
    let header = format!("Bearer {}", token.plain_text);

    assert!(matches!(
        tokens.authenticate(Some(&header)).await,
        Err(AuthError::InvalidToken)
    ));
}

#[tokio::test]
async fn test_malformed_headers_are_rejected() {
    let (tokens, _) = service();
    let user = staff_user(3, "admin@example.com");
    let token = tokens.issue(&user).await.unwrap();

    let headers = [
        None,
        Some(String::new()),
        Some(token.plain_text.clone()),
        Some(format!("bearer {}", token.plain_text)),
        Some(format!("Bearer  {}", token.plain_text)),
        Some(format!("Bearer {} extra", token.plain_text)),
        Some(format!("Bearer {}X", token.plain_text)),
        Some("Bearer SHORT".to_owned()),
    ];

    for header in headers {
        assert!(
            matches!(
                tokens.authenticate(header.as_deref()).await,
                Err(AuthError::InvalidToken)
            ),
            "header {header:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_store_failure_reads_as_invalid_token() {
    let (tokens, store) = service();
    let user = staff_user(3, "admin@example.com");
    let token = tokens.issue(&user).await.unwrap();
    store.fail();

    let header = format!("Bearer {}", token.plain_text);
    assert!(matches!(
        tokens.authenticate(Some(&header)).await,
        Err(AuthError::InvalidToken)
    ));
}
