//! Signing and verification with the one configured algorithm.
//!
//! Everything except ES512 goes through `jsonwebtoken`. ES512 is assembled
//! here from the P-521 primitives because `jsonwebtoken` does not offer it;
//! the wire format is the same compact JWS.

use super::{CredentialError, KeyFamily, RefreshClaims, SigningAlgorithm};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ecdsa::signature::{Signer as _, Verifier as _};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::info;
use p521::elliptic_curve::sec1::ToEncodedPoint;
use p521::pkcs8::DecodePrivateKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

const ES512_HEADER: &[u8] = br#"{"typ":"JWT","alg":"ES512"}"#;

/// Raw key bytes as loaded from configuration.
///
/// HMAC algorithms read `signing` as the shared secret. RSA/PSS and
/// ES256/ES384 read `signing` as a PEM private key and need `verification` as
/// a PEM public key. ES512 derives its verifying key from the private key.
#[derive(Clone, Default)]
pub struct KeyMaterial {
    pub signing: Vec<u8>,
    pub verification: Option<Vec<u8>>,
}

impl KeyMaterial {
    pub fn secret(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            signing: secret.into(),
            verification: None,
        }
    }

    pub fn pem(private_pem: impl Into<Vec<u8>>, public_pem: Option<Vec<u8>>) -> Self {
        Self {
            signing: private_pem.into(),
            verification: public_pem,
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("signing", &"<redacted>")
            .field("verification", &self.verification.as_ref().map(|v| v.len()))
            .finish()
    }
}

enum Keys {
    Jwt {
        algorithm: jsonwebtoken::Algorithm,
        encoding: EncodingKey,
        decoding: DecodingKey,
    },
    Es512 {
        signing: p521::ecdsa::SigningKey,
        verifying: p521::ecdsa::VerifyingKey,
    },
}

/// Parsed key material bound to a single algorithm. Read-only after
/// construction.
pub struct Signer {
    algorithm: SigningAlgorithm,
    keys: Keys,
}

impl Signer {
    /// Parse `material` for `algorithm`.
    ///
    /// A probe token is signed and verified before returning, so a key that
    /// parses but belongs to a different curve or family is rejected here
    /// rather than on first issuance.
    pub fn configure(
        algorithm: SigningAlgorithm,
        material: &KeyMaterial,
    ) -> Result<Self, CredentialError> {
        let keys = match algorithm.to_jwt() {
            Some(jwt_algorithm) => jwt_keys(algorithm, jwt_algorithm, material)?,
            None => es512_keys(material)?,
        };
        let signer = Signer { algorithm, keys };
        signer.probe()?;
        info!("Credential signer configured with {}", algorithm);
        Ok(signer)
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Produce a compact JWS over `claims`.
    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, CredentialError> {
        match &self.keys {
            Keys::Jwt {
                algorithm,
                encoding,
                ..
            } => encode(&Header::new(*algorithm), claims, encoding)
                .map_err(|e| signing_error(self.algorithm, e)),
            Keys::Es512 { signing, .. } => {
                let payload =
                    serde_json::to_vec(claims).map_err(|e| signing_error(self.algorithm, e))?;
                let message = format!(
                    "{}.{}",
                    URL_SAFE_NO_PAD.encode(ES512_HEADER),
                    URL_SAFE_NO_PAD.encode(payload)
                );
                let signature: p521::ecdsa::Signature = signing.sign(message.as_bytes());
                Ok(format!(
                    "{}.{}",
                    message,
                    URL_SAFE_NO_PAD.encode(signature.to_bytes())
                ))
            }
        }
    }

    /// Check the signature and header algorithm of `token` and decode its
    /// claims. Expiry is not checked here; callers compare `exp` against their
    /// own clock.
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, CredentialError> {
        match &self.keys {
            Keys::Jwt {
                algorithm,
                decoding,
                ..
            } => {
                let mut validation = Validation::new(*algorithm);
                validation.validate_exp = false;
                validation.validate_aud = false;
                validation.set_required_spec_claims(&["exp"]);
                decode::<C>(token, decoding, &validation)
                    .map(|data| data.claims)
                    .map_err(|e| CredentialError::Malformed(e.to_string()))
            }
            Keys::Es512 { verifying, .. } => {
                let mut segments = token.split('.');
                let (header, payload, signature) = match (
                    segments.next(),
                    segments.next(),
                    segments.next(),
                    segments.next(),
                ) {
                    (Some(h), Some(p), Some(s), None) => (h, p, s),
                    _ => {
                        return Err(CredentialError::Malformed(
                            "expected three token segments".to_string(),
                        ))
                    }
                };

                let header_json: serde_json::Value =
                    serde_json::from_slice(&decode_segment(header)?)
                        .map_err(|e| CredentialError::Malformed(e.to_string()))?;
                if header_json.get("alg").and_then(|v| v.as_str()) != Some("ES512") {
                    return Err(CredentialError::Malformed(
                        "token algorithm does not match ES512".to_string(),
                    ));
                }

                let signature = p521::ecdsa::Signature::from_slice(&decode_segment(signature)?)
                    .map_err(|e| CredentialError::Malformed(e.to_string()))?;
                let message = format!("{}.{}", header, payload);
                verifying
                    .verify(message.as_bytes(), &signature)
                    .map_err(|_| CredentialError::Malformed("invalid signature".to_string()))?;

                serde_json::from_slice(&decode_segment(payload)?)
                    .map_err(|e| CredentialError::Malformed(e.to_string()))
            }
        }
    }

    fn probe(&self) -> Result<(), CredentialError> {
        let claims = RefreshClaims {
            email: "signer-probe".to_string(),
            exp: 0,
        };
        let token = self.sign(&claims)?;
        let decoded: RefreshClaims = self
            .verify(&token)
            .map_err(|e| signing_error(self.algorithm, e))?;
        if decoded != claims {
            return Err(signing_error(self.algorithm, "probe claims did not round-trip"));
        }
        Ok(())
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

fn jwt_keys(
    algorithm: SigningAlgorithm,
    jwt_algorithm: jsonwebtoken::Algorithm,
    material: &KeyMaterial,
) -> Result<Keys, CredentialError> {
    let (encoding, decoding) = match algorithm.family() {
        KeyFamily::Hmac => {
            if material.signing.is_empty() {
                return Err(signing_error(algorithm, "shared secret is empty"));
            }
            (
                EncodingKey::from_secret(&material.signing),
                DecodingKey::from_secret(&material.signing),
            )
        }
        KeyFamily::Rsa => {
            let public = verification_key(algorithm, material)?;
            (
                EncodingKey::from_rsa_pem(&material.signing)
                    .map_err(|e| signing_error(algorithm, e))?,
                DecodingKey::from_rsa_pem(public).map_err(|e| signing_error(algorithm, e))?,
            )
        }
        KeyFamily::Ec => {
            let public = verification_key(algorithm, material)?;
            (
                EncodingKey::from_ec_pem(&material.signing)
                    .map_err(|e| signing_error(algorithm, e))?,
                DecodingKey::from_ec_pem(public).map_err(|e| signing_error(algorithm, e))?,
            )
        }
    };

    Ok(Keys::Jwt {
        algorithm: jwt_algorithm,
        encoding,
        decoding,
    })
}

fn es512_keys(material: &KeyMaterial) -> Result<Keys, CredentialError> {
    let algorithm = SigningAlgorithm::ES512;
    let pem = std::str::from_utf8(&material.signing).map_err(|e| signing_error(algorithm, e))?;
    let secret = p521::SecretKey::from_pkcs8_pem(pem).map_err(|e| signing_error(algorithm, e))?;
    let signing = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes())
        .map_err(|e| signing_error(algorithm, e))?;
    let verifying =
        p521::ecdsa::VerifyingKey::from_encoded_point(&secret.public_key().to_encoded_point(false))
            .map_err(|e| signing_error(algorithm, e))?;
    Ok(Keys::Es512 { signing, verifying })
}

fn verification_key(
    algorithm: SigningAlgorithm,
    material: &KeyMaterial,
) -> Result<&[u8], CredentialError> {
    material
        .verification
        .as_deref()
        .ok_or_else(|| signing_error(algorithm, "a PEM public key is required for verification"))
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, CredentialError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CredentialError::Malformed(e.to_string()))
}

fn signing_error(algorithm: SigningAlgorithm, reason: impl fmt::Display) -> CredentialError {
    CredentialError::Signing {
        algorithm: algorithm.to_string(),
        reason: reason.to_string(),
    }
}
