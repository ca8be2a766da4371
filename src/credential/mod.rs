//! Short-lived signed credentials.
//!
//! Access credentials carry `{name, email, admin, exp}` and live for fifteen
//! minutes; refresh credentials carry only `{email, exp}` and live for four
//! hours. Both are compact JWS tokens signed with the single algorithm the
//! [`Signer`] was configured with.
//!
//! Revocation is identity-scoped: revoking any credential for a subject
//! denylists the subject's email, which invalidates every credential issued to
//! that subject until the revoked credential would have expired anyway.

pub mod algorithm;
pub mod manager;
pub mod signer;

pub use algorithm::{KeyFamily, SigningAlgorithm};
pub use manager::CredentialManager;
pub use signer::{KeyMaterial, Signer};

use crate::revocation::RevocationError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Lifetime of an access credential.
pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Lifetime of a refresh credential.
pub const REFRESH_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Errors raised while configuring, issuing, verifying or revoking credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Unknown signing algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Signing key unusable for {algorithm}: {reason}")]
    Signing { algorithm: String, reason: String },

    #[error("Malformed credential: {0}")]
    Malformed(String),

    #[error("Credential expired at {0}")]
    Expired(i64),

    #[error("Credential subject has been revoked")]
    Revoked,

    #[error("Credential subjects differ: {access} vs {refresh}")]
    SubjectMismatch { access: String, refresh: String },

    #[error("Revocation check failed: {0}")]
    RevocationCheck(#[source] RevocationError),

    #[error("Revocation store error: {0}")]
    Revocation(#[from] RevocationError),
}

/// Claim sets a [`Credential`] can carry.
pub trait Claims: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Subject identity; the revocation key.
    fn subject(&self) -> &str;

    /// Expiry as Unix seconds.
    fn exp(&self) -> i64;

    fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp(), 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Claims of an access credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub name: String,
    pub email: String,
    pub admin: bool,
    pub exp: i64,
}

impl Claims for AccessClaims {
    fn subject(&self) -> &str {
        &self.email
    }

    fn exp(&self) -> i64 {
        self.exp
    }
}

/// Claims of a refresh credential. Deliberately carries no capability flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub email: String,
    pub exp: i64,
}

impl Claims for RefreshClaims {
    fn subject(&self) -> &str {
        &self.email
    }

    fn exp(&self) -> i64 {
        self.exp
    }
}

/// Capabilities granted to an access credential.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub admin: bool,
}

impl Capabilities {
    pub fn admin() -> Self {
        Self { admin: true }
    }
}

/// A signed token together with the claims it was signed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential<C> {
    token: String,
    claims: C,
}

impl<C: Claims> Credential<C> {
    pub(crate) fn new(token: String, claims: C) -> Self {
        Self { token, claims }
    }

    /// Compact JWS representation.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &C {
        &self.claims
    }

    pub fn subject(&self) -> &str {
        self.claims.subject()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }

    pub fn into_token(self) -> String {
        self.token
    }
}
