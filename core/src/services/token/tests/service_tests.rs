//! Unit tests for the rotation service

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::entities::token::TokenStatus;
use crate::errors::{DomainError, TokenError};
use crate::repositories::token::{InMemoryTokenStore, TokenStore};
use crate::services::token::{
    hash_token, ClientMetadata, RotationConfig, RotationService, SecurityAlertSink,
};

use super::mocks::CapturingAlertSink;

fn create_test_service() -> (
    Arc<InMemoryTokenStore>,
    Arc<CapturingAlertSink>,
    RotationService<InMemoryTokenStore>,
) {
    let store = Arc::new(InMemoryTokenStore::new());
    let alerts = Arc::new(CapturingAlertSink::new());
    let service = RotationService::new(
        Arc::clone(&store),
        Arc::clone(&alerts) as Arc<dyn SecurityAlertSink>,
        RotationConfig::default(),
    );
    (store, alerts, service)
}

fn meta() -> ClientMetadata {
    ClientMetadata {
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("test-agent".to_string()),
    }
}

#[tokio::test]
async fn test_issue_returns_secret_and_stores_only_hash() {
    let (store, _, service) = create_test_service();
    let user_id = Uuid::new_v4();

    let issued = service.issue(user_id, "device-1", &meta()).await.unwrap();

    assert_eq!(issued.secret.len(), 48);

    // The store knows the hash, never the raw value
    let stored = store
        .find_token(&hash_token(&issued.secret))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.jti, issued.jti);
    assert_ne!(stored.token_hash, issued.secret);
    assert!(store.find_token(&issued.secret).await.unwrap().is_none());
}

#[tokio::test]
async fn test_rotation_chain_keeps_single_active_head() {
    let (store, _, service) = create_test_service();

    let first = service
        .issue(Uuid::new_v4(), "device-1", &meta())
        .await
        .unwrap();

    let mut current = first.secret.clone();
    for _ in 0..4 {
        let next = service.rotate(&current, &meta()).await.unwrap();
        assert_eq!(next.family_id, first.family_id);
        current = next.secret;
    }

    // issue + 4 rotations: a chain of 5 tokens, 4 rotated and 1 active
    let chain = store.tokens_in_family(first.family_id).await.unwrap();
    assert_eq!(chain.len(), 5);
    assert_eq!(
        chain
            .iter()
            .filter(|t| t.status == TokenStatus::Rotated)
            .count(),
        4
    );
    assert_eq!(store.count_active_tokens(first.family_id).await.unwrap(), 1);

    // The surviving head is the last secret we were handed
    let head = store
        .find_token(&hash_token(&current))
        .await
        .unwrap()
        .unwrap();
    assert!(head.is_active());
}

#[tokio::test]
async fn test_reuse_revokes_family_and_alerts() {
    let (store, alerts, service) = create_test_service();
    let user_id = Uuid::new_v4();

    let t0 = service.issue(user_id, "device-1", &meta()).await.unwrap();
    let t1 = service.rotate(&t0.secret, &meta()).await.unwrap();

    // Presenting the retired token is treated as replay
    let err = service.rotate(&t0.secret, &meta()).await.unwrap_err();
    assert!(matches!(err, DomainError::Token(TokenError::ReuseDetected)));

    let family = store.find_family(t0.family_id).await.unwrap().unwrap();
    assert!(family.is_revoked());
    for token in store.tokens_in_family(t0.family_id).await.unwrap() {
        assert_eq!(token.status, TokenStatus::Revoked);
    }

    // The still-fresh successor dies with its family
    let err = service.rotate(&t1.secret, &meta()).await.unwrap_err();
    assert!(matches!(err, DomainError::Token(TokenError::FamilyRevoked)));

    let published = alerts.alerts();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].user_id, user_id);
    assert_eq!(published[0].device_id, "device-1");
    assert_eq!(published[0].family_id, t0.family_id);
}

#[tokio::test]
async fn test_repeat_reuse_keeps_family_revoked() {
    let (store, _, service) = create_test_service();

    let t0 = service
        .issue(Uuid::new_v4(), "device-1", &meta())
        .await
        .unwrap();
    service.rotate(&t0.secret, &meta()).await.unwrap();

    service.rotate(&t0.secret, &meta()).await.unwrap_err();
    let first_revoked_at = store
        .find_family(t0.family_id)
        .await
        .unwrap()
        .unwrap()
        .revoked_at;

    // Replaying yet again changes nothing; the family check now wins
    let err = service.rotate(&t0.secret, &meta()).await.unwrap_err();
    assert!(matches!(err, DomainError::Token(TokenError::FamilyRevoked)));
    let family = store.find_family(t0.family_id).await.unwrap().unwrap();
    assert_eq!(family.revoked_at, first_revoked_at);
}

#[tokio::test]
async fn test_unknown_secret_is_invalid_token() {
    let (_store, alerts, service) = create_test_service();

    let err = service
        .rotate("never-issued-secret", &meta())
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Token(TokenError::InvalidToken)));
    assert!(alerts.alerts().is_empty());
}

#[tokio::test]
async fn test_expired_token_rotation_mutates_nothing() {
    let (store, alerts, service) = create_test_service();
    let now = chrono::Utc::now();

    // Plant an already-expired token behind a known secret
    let secret = "expired-secret";
    let (family, _) = store
        .issue_token(
            Uuid::new_v4(),
            "device-1",
            &hash_token(secret),
            chrono::Duration::days(-1),
            now,
        )
        .await
        .unwrap();

    let before = store.tokens_in_family(family.family_id).await.unwrap();
    let err = service.rotate(secret, &meta()).await.unwrap_err();
    let after = store.tokens_in_family(family.family_id).await.unwrap();

    assert!(matches!(err, DomainError::Token(TokenError::ExpiredToken)));
    assert_eq!(before, after);
    assert!(!store
        .find_family(family.family_id)
        .await
        .unwrap()
        .unwrap()
        .is_revoked());
    assert!(alerts.alerts().is_empty());
}

#[tokio::test]
async fn test_reissue_supersedes_previous_token() {
    let (store, _, service) = create_test_service();
    let user_id = Uuid::new_v4();

    let first = service.issue(user_id, "device-1", &meta()).await.unwrap();
    let second = service.issue(user_id, "device-1", &meta()).await.unwrap();

    assert_eq!(first.family_id, second.family_id);
    assert_eq!(store.count_active_tokens(first.family_id).await.unwrap(), 1);

    // The superseded secret is now a replay signal
    let err = service.rotate(&first.secret, &meta()).await.unwrap_err();
    assert!(matches!(err, DomainError::Token(TokenError::ReuseDetected)));
}

#[tokio::test]
async fn test_revoke_family_logout() {
    let (_store, alerts, service) = create_test_service();

    let issued = service
        .issue(Uuid::new_v4(), "device-1", &meta())
        .await
        .unwrap();

    service.revoke_family(issued.family_id).await.unwrap();

    let err = service.rotate(&issued.secret, &meta()).await.unwrap_err();
    assert!(matches!(err, DomainError::Token(TokenError::FamilyRevoked)));

    // Logout is not an attack signal
    assert!(alerts.alerts().is_empty());

    // Idempotent, and unknown families are a no-op
    service.revoke_family(issued.family_id).await.unwrap();
    service.revoke_family(Uuid::new_v4()).await.unwrap();
}

#[tokio::test]
async fn test_families_are_isolated_per_device() {
    let (store, _, service) = create_test_service();
    let user_id = Uuid::new_v4();

    let phone = service.issue(user_id, "phone", &meta()).await.unwrap();
    let laptop = service.issue(user_id, "laptop", &meta()).await.unwrap();
    assert_ne!(phone.family_id, laptop.family_id);

    // Burning the phone family leaves the laptop session alive
    service.rotate(&phone.secret, &meta()).await.unwrap();
    service.rotate(&phone.secret, &meta()).await.unwrap_err();

    assert!(store
        .find_family(phone.family_id)
        .await
        .unwrap()
        .unwrap()
        .is_revoked());
    let rotated = service.rotate(&laptop.secret, &meta()).await.unwrap();
    assert_eq!(rotated.family_id, laptop.family_id);
}
