//! Credential issuance, verification and revocation.

use super::{
    AccessClaims, Capabilities, Claims, Credential, CredentialError, KeyMaterial, RefreshClaims,
    Signer, SigningAlgorithm, ACCESS_TTL, REFRESH_TTL,
};
use crate::clock::Clock;
use crate::deadline::{bounded, DEFAULT_STORE_TIMEOUT};
use crate::revocation::{RevocationError, RevocationStore};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Issues and revokes credentials for subjects.
///
/// The signer is immutable after construction and the revocation store is
/// shared, so a single manager can be used from any number of tasks.
pub struct CredentialManager {
    signer: Arc<Signer>,
    revocations: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl CredentialManager {
    pub fn new(
        signer: Signer,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            signer: Arc::new(signer),
            revocations,
            clock,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Parse `material` for `algorithm` and build a manager around it.
    ///
    /// An error here means the process must not start.
    pub fn configure(
        algorithm: SigningAlgorithm,
        material: &KeyMaterial,
        revocations: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CredentialError> {
        let signer = Signer::configure(algorithm, material)?;
        Ok(Self::new(signer, revocations, clock))
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.signer.algorithm()
    }

    /// Issue a fifteen-minute access credential.
    pub fn issue(
        &self,
        subject: &str,
        display_name: &str,
        capabilities: Capabilities,
    ) -> Result<Credential<AccessClaims>, CredentialError> {
        let claims = AccessClaims {
            name: display_name.to_string(),
            email: subject.to_string(),
            admin: capabilities.admin,
            exp: self.expiry_after(ACCESS_TTL),
        };
        let token = self.signer.sign(&claims)?;
        info!("Issued access credential for {}", subject);
        Ok(Credential::new(token, claims))
    }

    /// Issue a four-hour refresh credential carrying only the subject.
    pub fn issue_refresh(&self, subject: &str) -> Result<Credential<RefreshClaims>, CredentialError> {
        let claims = RefreshClaims {
            email: subject.to_string(),
            exp: self.expiry_after(REFRESH_TTL),
        };
        let token = self.signer.sign(&claims)?;
        info!("Issued refresh credential for {}", subject);
        Ok(Credential::new(token, claims))
    }

    /// Denylist the credential's subject for the rest of its validity window.
    ///
    /// Revoking a credential that has already expired is a successful no-op.
    pub async fn revoke<C: Claims>(&self, credential: &Credential<C>) -> Result<(), CredentialError> {
        let subject = credential.subject();
        let remaining = credential.expires_at() - self.clock.now();
        let ttl = match remaining.to_std() {
            Ok(ttl) if !ttl.is_zero() => ttl,
            _ => {
                debug!("Credential for {} already expired; nothing to revoke", subject);
                return Ok(());
            }
        };

        bounded(
            self.store_timeout,
            self.revocations.put(subject, ttl),
            || self.timed_out(),
        )
        .await?;
        info!("Revoked credentials for {} for {:?}", subject, ttl);
        Ok(())
    }

    /// Whether `subject` is denylisted, surfacing store failures.
    pub async fn try_is_revoked(&self, subject: &str) -> Result<bool, CredentialError> {
        bounded(
            self.store_timeout,
            self.revocations.exists(subject),
            || self.timed_out(),
        )
        .await
        .map_err(CredentialError::RevocationCheck)
    }

    /// Whether `subject` is denylisted.
    ///
    /// Fails closed: if the revocation store cannot be consulted the subject
    /// is reported as revoked.
    pub async fn is_revoked(&self, subject: &str) -> bool {
        match self.try_is_revoked(subject).await {
            Ok(revoked) => revoked,
            Err(e) => {
                error!("Treating {} as revoked: {}", subject, e);
                true
            }
        }
    }

    /// Verify an access token: signature, expiry, then the denylist.
    pub async fn verify_access(
        &self,
        token: &str,
    ) -> Result<Credential<AccessClaims>, CredentialError> {
        self.verify(token).await
    }

    /// Verify a refresh token: signature, expiry, then the denylist.
    pub async fn verify_refresh(
        &self,
        token: &str,
    ) -> Result<Credential<RefreshClaims>, CredentialError> {
        self.verify(token).await
    }

    /// Check only the signature of an access token. Expired and denylisted
    /// tokens decode successfully, so this is what [`revoke`](Self::revoke)
    /// callers holding a raw token should use.
    pub fn decode_access(&self, token: &str) -> Result<Credential<AccessClaims>, CredentialError> {
        self.decode(token)
    }

    /// Signature-only counterpart of [`verify_refresh`](Self::verify_refresh).
    pub fn decode_refresh(
        &self,
        token: &str,
    ) -> Result<Credential<RefreshClaims>, CredentialError> {
        self.decode(token)
    }

    /// Exchange a valid refresh token for a new access credential.
    ///
    /// `access_token` supplies the name and admin flag and only needs a valid
    /// signature; it is normally already expired. Both tokens must name the
    /// same subject.
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Credential<AccessClaims>, CredentialError> {
        let refresh = self.verify_refresh(refresh_token).await?;
        let previous = self.decode_access(access_token)?.claims().clone();

        if previous.email != refresh.claims().email {
            warn!(
                "Refresh rejected: access subject {} does not match refresh subject {}",
                previous.email,
                refresh.claims().email
            );
            return Err(CredentialError::SubjectMismatch {
                access: previous.email,
                refresh: refresh.claims().email.clone(),
            });
        }

        self.issue(
            &previous.email,
            &previous.name,
            Capabilities {
                admin: previous.admin,
            },
        )
    }

    fn decode<C: Claims>(&self, token: &str) -> Result<Credential<C>, CredentialError> {
        let claims: C = self.signer.verify(token)?;
        Ok(Credential::new(token.to_string(), claims))
    }

    async fn verify<C: Claims>(&self, token: &str) -> Result<Credential<C>, CredentialError> {
        let credential: Credential<C> = self.decode(token)?;
        let claims = credential.claims();

        if claims.exp() <= self.clock.now().timestamp() {
            return Err(CredentialError::Expired(claims.exp()));
        }

        if self.is_revoked(claims.subject()).await {
            warn!("Rejected credential for revoked subject {}", claims.subject());
            return Err(CredentialError::Revoked);
        }

        Ok(credential)
    }

    fn expiry_after(&self, ttl: Duration) -> i64 {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self.clock.now().timestamp().saturating_add(ttl)
    }

    fn timed_out(&self) -> RevocationError {
        RevocationError::Connectivity(format!(
            "no response within {:?}",
            self.store_timeout
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::revocation::MemoryRevocationStore;
    use async_trait::async_trait;

    struct UnreachableStore;

    #[async_trait]
    impl RevocationStore for UnreachableStore {
        async fn put(&self, _key: &str, _ttl: Duration) -> Result<(), RevocationError> {
            Err(RevocationError::Connectivity("connection refused".to_string()))
        }

        async fn exists(&self, _key: &str) -> Result<bool, RevocationError> {
            Err(RevocationError::Connectivity("connection refused".to_string()))
        }
    }

    struct StalledStore;

    #[async_trait]
    impl RevocationStore for StalledStore {
        async fn put(&self, _key: &str, _ttl: Duration) -> Result<(), RevocationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn exists(&self, _key: &str) -> Result<bool, RevocationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(false)
        }
    }

    fn manager_with(store: Arc<dyn RevocationStore>, clock: ManualClock) -> CredentialManager {
        CredentialManager::configure(
            SigningAlgorithm::HS256,
            &KeyMaterial::secret(b"manager-test-secret".to_vec()),
            store,
            Arc::new(clock),
        )
        .unwrap()
    }

    fn manager(clock: &ManualClock) -> CredentialManager {
        let store = Arc::new(MemoryRevocationStore::new(Arc::new(clock.clone())));
        manager_with(store, clock.clone())
    }

    #[test]
    fn test_issue_sets_fifteen_minute_expiry() {
        let clock = ManualClock::from_recent();
        let credential = manager(&clock)
            .issue("alice@example.com", "Alice", Capabilities::admin())
            .unwrap();

        assert_eq!(credential.claims().exp, clock.now().timestamp() + 15 * 60);
        assert_eq!(credential.subject(), "alice@example.com");
        assert!(credential.claims().admin);
    }

    #[test]
    fn test_issue_refresh_sets_four_hour_expiry() {
        let clock = ManualClock::from_recent();
        let credential = manager(&clock).issue_refresh("alice@example.com").unwrap();
        assert_eq!(credential.claims().exp, clock.now().timestamp() + 4 * 60 * 60);
    }

    #[tokio::test]
    async fn test_revoke_expired_is_noop() {
        let clock = ManualClock::from_recent();
        let manager = manager(&clock);
        let credential = manager.issue("alice@example.com", "Alice", Capabilities::default()).unwrap();

        clock.advance(chrono::Duration::minutes(15));
        manager.revoke(&credential).await.unwrap();

        assert!(!manager.is_revoked("alice@example.com").await);
    }

    #[tokio::test]
    async fn test_revocation_check_fails_closed() {
        let clock = ManualClock::from_recent();
        let manager = manager_with(Arc::new(UnreachableStore), clock);

        assert!(manager.is_revoked("alice@example.com").await);
        assert!(matches!(
            manager.try_is_revoked("alice@example.com").await,
            Err(CredentialError::RevocationCheck(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_rejects_when_store_unreachable() {
        let clock = ManualClock::from_recent();
        let manager = manager_with(Arc::new(UnreachableStore), clock);
        let credential = manager.issue("alice@example.com", "Alice", Capabilities::default()).unwrap();

        assert!(matches!(
            manager.verify_access(credential.token()).await,
            Err(CredentialError::Revoked)
        ));
    }

    #[tokio::test]
    async fn test_revoke_surfaces_connectivity_error() {
        let clock = ManualClock::from_recent();
        let manager = manager_with(Arc::new(UnreachableStore), clock);
        let credential = manager.issue("alice@example.com", "Alice", Capabilities::default()).unwrap();

        assert!(matches!(
            manager.revoke(&credential).await,
            Err(CredentialError::Revocation(RevocationError::Connectivity(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_times_out() {
        let clock = ManualClock::from_recent();
        let manager = manager_with(Arc::new(StalledStore), clock);
        let credential = manager.issue("alice@example.com", "Alice", Capabilities::default()).unwrap();

        assert!(matches!(
            manager.revoke(&credential).await,
            Err(CredentialError::Revocation(RevocationError::Connectivity(_)))
        ));
        assert!(manager.is_revoked("alice@example.com").await);
    }

    #[tokio::test]
    async fn test_verify_rejects_expired() {
        let clock = ManualClock::from_recent();
        let manager = manager(&clock);
        let credential = manager.issue("alice@example.com", "Alice", Capabilities::default()).unwrap();

        clock.advance(chrono::Duration::minutes(15));

        assert!(matches!(
            manager.verify_access(credential.token()).await,
            Err(CredentialError::Expired(_))
        ));
    }
}
