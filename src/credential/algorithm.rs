//! Closed set of supported signing algorithms.

use std::fmt;
use std::str::FromStr;

use super::CredentialError;

/// JWS algorithm a [`Signer`](super::Signer) is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    ES512,
    PS256,
    PS384,
    PS512,
}

/// Key family an algorithm draws its material from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
}

impl SigningAlgorithm {
    pub const ALL: [SigningAlgorithm; 12] = [
        SigningAlgorithm::HS256,
        SigningAlgorithm::HS384,
        SigningAlgorithm::HS512,
        SigningAlgorithm::RS256,
        SigningAlgorithm::RS384,
        SigningAlgorithm::RS512,
        SigningAlgorithm::ES256,
        SigningAlgorithm::ES384,
        SigningAlgorithm::ES512,
        SigningAlgorithm::PS256,
        SigningAlgorithm::PS384,
        SigningAlgorithm::PS512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::HS256 => "HS256",
            SigningAlgorithm::HS384 => "HS384",
            SigningAlgorithm::HS512 => "HS512",
            SigningAlgorithm::RS256 => "RS256",
            SigningAlgorithm::RS384 => "RS384",
            SigningAlgorithm::RS512 => "RS512",
            SigningAlgorithm::ES256 => "ES256",
            SigningAlgorithm::ES384 => "ES384",
            SigningAlgorithm::ES512 => "ES512",
            SigningAlgorithm::PS256 => "PS256",
            SigningAlgorithm::PS384 => "PS384",
            SigningAlgorithm::PS512 => "PS512",
        }
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            SigningAlgorithm::HS256 | SigningAlgorithm::HS384 | SigningAlgorithm::HS512 => {
                KeyFamily::Hmac
            }
            SigningAlgorithm::ES256 | SigningAlgorithm::ES384 | SigningAlgorithm::ES512 => {
                KeyFamily::Ec
            }
            _ => KeyFamily::Rsa,
        }
    }

    /// The `jsonwebtoken` counterpart. `None` for ES512, which that crate
    /// does not implement.
    pub(crate) fn to_jwt(self) -> Option<jsonwebtoken::Algorithm> {
        use jsonwebtoken::Algorithm;
        match self {
            SigningAlgorithm::HS256 => Some(Algorithm::HS256),
            SigningAlgorithm::HS384 => Some(Algorithm::HS384),
            SigningAlgorithm::HS512 => Some(Algorithm::HS512),
            SigningAlgorithm::RS256 => Some(Algorithm::RS256),
            SigningAlgorithm::RS384 => Some(Algorithm::RS384),
            SigningAlgorithm::RS512 => Some(Algorithm::RS512),
            SigningAlgorithm::ES256 => Some(Algorithm::ES256),
            SigningAlgorithm::ES384 => Some(Algorithm::ES384),
            SigningAlgorithm::ES512 => None,
            SigningAlgorithm::PS256 => Some(Algorithm::PS256),
            SigningAlgorithm::PS384 => Some(Algorithm::PS384),
            SigningAlgorithm::PS512 => Some(Algorithm::PS512),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SigningAlgorithm::ALL
            .into_iter()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CredentialError::UnknownAlgorithm(s.to_string()))
    }
}
