//! Environment-driven settings.

use crate::credential::{KeyFamily, KeyMaterial, SigningAlgorithm};
use crate::deadline::DEFAULT_STORE_TIMEOUT;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where key bytes come from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    Inline(Vec<u8>),
    File(PathBuf),
}

impl KeySource {
    pub fn load(&self) -> Result<Vec<u8>, ConfigError> {
        match self {
            KeySource::Inline(bytes) => Ok(bytes.clone()),
            KeySource::File(path) => std::fs::read(path).map_err(|source| ConfigError::KeyFile {
                path: path.clone(),
                source,
            }),
        }
    }
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Inline(_) => write!(f, "Inline(<redacted>)"),
            KeySource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    /// Prefix for every document key.
    pub namespace: String,
    pub store_timeout: Duration,
    pub signing_method: SigningAlgorithm,
    pub signing_key: KeySource,
    pub verification_key: Option<KeySource>,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars())
    }

    /// Read settings from explicit `(name, value)` pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let var = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();

        let store_timeout = match var("STORE_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    var: "STORE_TIMEOUT_SECS",
                    reason: format!("{}", e),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: "STORE_TIMEOUT_SECS",
                        reason: "must be at least 1".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_STORE_TIMEOUT,
        };

        let signing_method = var("JWT_SIGNING_METHOD")
            .unwrap_or_else(|| "RS256".to_string())
            .parse::<SigningAlgorithm>()
            .map_err(|e| ConfigError::Invalid {
                var: "JWT_SIGNING_METHOD",
                reason: e.to_string(),
            })?;

        let signing_key = key_source(var("JWT_SIGNING_KEY"), var("JWT_SIGNING_KEY_PATH"))
            .ok_or(ConfigError::Missing("JWT_SIGNING_KEY or JWT_SIGNING_KEY_PATH"))?;
        let verification_key = key_source(
            var("JWT_VERIFICATION_KEY"),
            var("JWT_VERIFICATION_KEY_PATH"),
        );

        Ok(Settings {
            redis_url: var("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
            namespace: var("DOCUMENT_NAMESPACE").unwrap_or_else(|| "key-master".to_string()),
            store_timeout,
            signing_method,
            signing_key,
            verification_key,
        })
    }

    /// Load the configured key bytes for [`Settings::signing_method`].
    pub fn key_material(&self) -> Result<KeyMaterial, ConfigError> {
        let signing = self.signing_key.load()?;
        match self.signing_method.family() {
            KeyFamily::Hmac => Ok(KeyMaterial::secret(signing)),
            KeyFamily::Rsa | KeyFamily::Ec => {
                let verification = self
                    .verification_key
                    .as_ref()
                    .map(KeySource::load)
                    .transpose()?;
                Ok(KeyMaterial::pem(signing, verification))
            }
        }
    }
}

/// Inline values win over paths.
fn key_source(inline: Option<String>, path: Option<String>) -> Option<KeySource> {
    match (inline, path) {
        (Some(inline), _) => Some(KeySource::Inline(inline.into_bytes())),
        (None, Some(path)) => Some(KeySource::File(PathBuf::from(path))),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_vars([("JWT_SIGNING_KEY", "secret")]).unwrap();

        assert_eq!(settings.redis_url, "redis://localhost:6379");
        assert_eq!(settings.namespace, "key-master");
        assert_eq!(settings.store_timeout, Duration::from_secs(10));
        assert_eq!(settings.signing_method, SigningAlgorithm::RS256);
        assert_eq!(settings.signing_key, KeySource::Inline(b"secret".to_vec()));
        assert!(settings.verification_key.is_none());
    }

    #[test]
    fn test_inline_key_preferred_over_path() {
        let source = key_source(Some("k".to_string()), Some("/tmp/k.pem".to_string()));
        assert_eq!(source, Some(KeySource::Inline(b"k".to_vec())));
        assert_eq!(key_source(None, None), None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Settings::from_vars([("JWT_SIGNING_KEY", "k"), ("STORE_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { var: "STORE_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            Settings::from_vars([("JWT_SIGNING_KEY", "k"), ("STORE_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { var: "STORE_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            Settings::from_vars([("JWT_SIGNING_KEY", "k"), ("JWT_SIGNING_METHOD", "none")]),
            Err(ConfigError::Invalid { var: "JWT_SIGNING_METHOD", .. })
        ));
        assert!(matches!(
            Settings::from_vars(Vec::<(String, String)>::new()),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_debug_redacts_inline_key() {
        let settings = Settings::from_vars([("JWT_SIGNING_KEY", "hunter2")]).unwrap();
        assert!(!format!("{:?}", settings).contains("hunter2"));
    }
}
