use std::sync::Arc;

use chrono::Duration;
use keymaster::{
    Capabilities, Clock, CredentialError, CredentialManager, KeyMaterial, ManualClock,
    MemoryRevocationStore, SigningAlgorithm,
};

fn manager(algorithm: SigningAlgorithm, material: KeyMaterial) -> (CredentialManager, ManualClock) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = ManualClock::from_recent();
    let revocations = Arc::new(MemoryRevocationStore::new(Arc::new(clock.clone())));
    let manager =
        CredentialManager::configure(algorithm, &material, revocations, Arc::new(clock.clone()))
            .unwrap();
    (manager, clock)
}

fn hs256() -> (CredentialManager, ManualClock) {
    manager(
        SigningAlgorithm::HS256,
        KeyMaterial::secret("integration-secret"),
    )
}

#[tokio::test]
async fn test_alice_revocation_window() {
    let (manager, clock) = hs256();

    let credential = manager
        .issue("alice@example.com", "Alice", Capabilities::admin())
        .unwrap();
    assert_eq!(
        credential.expires_at(),
        clock.now() + Duration::minutes(15)
    );
    assert!(!manager.is_revoked("alice@example.com").await);

    clock.advance(Duration::seconds(1));
    manager.revoke(&credential).await.unwrap();
    assert!(manager.is_revoked("alice@example.com").await);
    assert!(matches!(
        manager.verify_access(credential.token()).await,
        Err(CredentialError::Revoked)
    ));

    clock.advance(Duration::minutes(16));
    assert!(!manager.is_revoked("alice@example.com").await);
}

#[tokio::test]
async fn test_revoking_expired_credential_changes_nothing() {
    let (manager, clock) = hs256();
    let credential = manager
        .issue("bob@example.com", "Bob", Capabilities::default())
        .unwrap();

    clock.advance(Duration::minutes(20));
    manager.revoke(&credential).await.unwrap();
    assert!(!manager.is_revoked("bob@example.com").await);
}

#[tokio::test]
async fn test_revocation_is_identity_scoped() {
    let (manager, _clock) = hs256();
    let first = manager
        .issue("carol@example.com", "Carol", Capabilities::default())
        .unwrap();
    let refresh = manager.issue_refresh("carol@example.com").unwrap();
    let other = manager
        .issue("dave@example.com", "Dave", Capabilities::default())
        .unwrap();

    manager.revoke(&first).await.unwrap();

    assert!(matches!(
        manager.verify_refresh(refresh.token()).await,
        Err(CredentialError::Revoked)
    ));
    assert!(manager.verify_access(other.token()).await.is_ok());
}

#[tokio::test]
async fn test_refresh_after_access_expiry() {
    let (manager, clock) = hs256();
    let access = manager
        .issue("erin@example.com", "Erin", Capabilities::admin())
        .unwrap();
    let refresh = manager.issue_refresh("erin@example.com").unwrap();
    assert_eq!(refresh.expires_at(), clock.now() + Duration::hours(4));

    clock.advance(Duration::minutes(30));
    assert!(matches!(
        manager.verify_access(access.token()).await,
        Err(CredentialError::Expired(_))
    ));

    let renewed = manager
        .refresh(access.token(), refresh.token())
        .await
        .unwrap();
    assert_eq!(renewed.claims().name, "Erin");
    assert!(renewed.claims().admin);
    assert_eq!(renewed.expires_at(), clock.now() + Duration::minutes(15));
    assert!(manager.verify_access(renewed.token()).await.is_ok());
}

#[tokio::test]
async fn test_refresh_rejects_foreign_subject() {
    let (manager, _clock) = hs256();
    let access = manager
        .issue("frank@example.com", "Frank", Capabilities::default())
        .unwrap();
    let refresh = manager.issue_refresh("grace@example.com").unwrap();

    assert!(matches!(
        manager.refresh(access.token(), refresh.token()).await,
        Err(CredentialError::SubjectMismatch { .. })
    ));
}

#[tokio::test]
async fn test_asymmetric_lifecycle() {
    let testdata = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata");
    let material = KeyMaterial::pem(
        std::fs::read(format!("{}/ec384_private.pem", testdata)).unwrap(),
        Some(std::fs::read(format!("{}/ec384_public.pem", testdata)).unwrap()),
    );
    let (manager, _clock) = manager(SigningAlgorithm::ES384, material);

    let credential = manager
        .issue("heidi@example.com", "Heidi", Capabilities::default())
        .unwrap();
    let verified = manager.verify_access(credential.token()).await.unwrap();
    assert_eq!(verified.claims(), credential.claims());

    manager.revoke(&verified).await.unwrap();
    assert!(manager.is_revoked("heidi@example.com").await);
}

#[tokio::test]
async fn test_tokens_from_another_key_rejected() {
    let (manager, _clock) = hs256();
    let (impostor, _) = manager_with_secret("other-secret");
    let forged = impostor
        .issue("ivan@example.com", "Ivan", Capabilities::admin())
        .unwrap();

    assert!(matches!(
        manager.verify_access(forged.token()).await,
        Err(CredentialError::Malformed(_))
    ));
}

fn manager_with_secret(secret: &str) -> (CredentialManager, ManualClock) {
    manager(SigningAlgorithm::HS256, KeyMaterial::secret(secret))
}

#[tokio::test]
async fn test_revoke_from_expired_token_string() {
    let (manager, clock) = hs256();
    let token = manager
        .issue("judy@example.com", "Judy", Capabilities::default())
        .unwrap()
        .into_token();

    clock.advance(Duration::minutes(20));
    assert!(matches!(
        manager.verify_access(&token).await,
        Err(CredentialError::Expired(_))
    ));

    let credential = manager.decode_access(&token).unwrap();
    manager.revoke(&credential).await.unwrap();
    assert!(!manager.is_revoked("judy@example.com").await);
}

#[tokio::test]
async fn test_second_revocation_of_same_token_succeeds() {
    let (manager, clock) = hs256();
    let token = manager
        .issue("mallory@example.com", "Mallory", Capabilities::default())
        .unwrap()
        .into_token();

    manager
        .revoke(&manager.decode_access(&token).unwrap())
        .await
        .unwrap();
    clock.advance(Duration::minutes(1));

    let again = manager.decode_access(&token).unwrap();
    manager.revoke(&again).await.unwrap();
    assert!(manager.is_revoked("mallory@example.com").await);

    clock.advance(Duration::minutes(15));
    assert!(!manager.is_revoked("mallory@example.com").await);
}

#[tokio::test]
async fn test_decode_still_checks_signature() {
    let (manager, _clock) = hs256();
    let (impostor, _) = manager_with_secret("other-secret");
    let forged = impostor.issue_refresh("niaj@example.com").unwrap();

    assert!(matches!(
        manager.decode_refresh(forged.token()),
        Err(CredentialError::Malformed(_))
    ));
}
