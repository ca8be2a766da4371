//! Persisted domain records.

pub mod secret;
pub mod user;

pub use secret::{EncryptedKey, Secret};
pub use user::{User, UserKey};
