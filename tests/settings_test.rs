use std::sync::Arc;
use std::time::Duration;

use keymaster::{
    CredentialManager, KeySource, ManualClock, MemoryRevocationStore, Settings, SigningAlgorithm,
};

fn testdata(file: &str) -> String {
    format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), file)
}

#[test]
fn test_settings_from_vars() {
    let settings = Settings::from_vars([
        ("REDIS_URL", "redis://cache:6380/2"),
        ("DOCUMENT_NAMESPACE", "km-test"),
        ("STORE_TIMEOUT_SECS", "3"),
        ("JWT_SIGNING_METHOD", "hs512"),
        ("JWT_SIGNING_KEY", "s3cret"),
    ])
    .unwrap();

    assert_eq!(settings.redis_url, "redis://cache:6380/2");
    assert_eq!(settings.namespace, "km-test");
    assert_eq!(settings.store_timeout, Duration::from_secs(3));
    assert_eq!(settings.signing_method, SigningAlgorithm::HS512);

    let material = settings.key_material().unwrap();
    assert_eq!(material.signing, b"s3cret".to_vec());
    assert!(material.verification.is_none());
}

#[test]
fn test_key_paths_load_usable_material() {
    let settings = Settings::from_vars([
        ("JWT_SIGNING_METHOD", "RS256".to_string()),
        ("JWT_SIGNING_KEY_PATH", testdata("rsa_private.pem")),
        ("JWT_VERIFICATION_KEY_PATH", testdata("rsa_public.pem")),
    ])
    .unwrap();
    assert!(matches!(settings.signing_key, KeySource::File(_)));

    let material = settings.key_material().unwrap();
    let clock = Arc::new(ManualClock::from_recent());
    let manager = CredentialManager::configure(
        settings.signing_method,
        &material,
        Arc::new(MemoryRevocationStore::new(clock.clone())),
        clock,
    );
    assert!(manager.is_ok());
}

#[test]
fn test_missing_key_file_reported() {
    let settings = Settings::from_vars([
        ("JWT_SIGNING_METHOD", "ES256".to_string()),
        ("JWT_SIGNING_KEY_PATH", testdata("does_not_exist.pem")),
    ])
    .unwrap();
    assert!(settings.key_material().is_err());
}
