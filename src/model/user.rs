use crate::entity::{Audit, ChangeSet, Checks, Entity, Validate, Violation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Key pair held on behalf of a user. The private half is stored encrypted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKey {
    pub encrypted_private_key: Vec<u8>,
    pub public_key: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub audit: Audit,
    pub email: String,
    #[serde(default)]
    pub is_remote: bool,
    /// Salted digest, never the password itself. See [`User::set_password`].
    #[serde(default)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub keys: Vec<UserKey>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// Store `hex(sha256(email + hex(sha256(password))))`.
    ///
    /// The email acts as the salt, so changing the email invalidates the
    /// stored digest.
    pub fn set_password(&mut self, password: &str) {
        self.password = password_digest(&self.email, password);
    }

    pub fn check_password(&self, password: &str) -> bool {
        if self.password.is_empty() {
            return false;
        }
        let candidate = password_digest(&self.email, password);
        constant_time_eq(candidate.as_bytes(), self.password.as_bytes())
    }

    /// Change set writing the current password digest.
    pub fn password_change(&self) -> ChangeSet {
        ChangeSet::new().set("password", self.password.clone())
    }
}

impl Validate for User {
    fn validate(&self) -> Vec<Violation> {
        Checks::new()
            .email("email", &self.email)
            .required("first_name", &self.first_name)
            .required("last_name", &self.last_name)
            .finish()
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "User";

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}

fn password_digest(email: &str, password: &str) -> String {
    let inner = hex::encode(Sha256::digest(password.as_bytes()));
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(inner.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Rule;

    #[test]
    fn test_password_digest_salted_with_email() {
        let mut user = User::new("alice@example.com", "Alice", "Liddell");
        user.set_password("wonderland");

        let inner = hex::encode(Sha256::digest(b"wonderland"));
        let expected = hex::encode(Sha256::digest(format!("alice@example.com{}", inner)));
        assert_eq!(user.password, expected);
        assert_eq!(user.password.len(), 64);
    }

    #[test]
    fn test_check_password() {
        let mut user = User::new("alice@example.com", "Alice", "Liddell");
        assert!(!user.check_password(""));

        user.set_password("wonderland");
        assert!(user.check_password("wonderland"));
        assert!(!user.check_password("looking-glass"));

        user.email = "alice@example.org".to_string();
        assert!(!user.check_password("wonderland"));
    }

    #[test]
    fn test_validation() {
        assert!(User::new("alice@example.com", "Alice", "Liddell")
            .validate()
            .is_empty());

        let violations = User::new("alice", "", "Liddell").validate();
        assert_eq!(
            violations,
            vec![
                Violation::new("email", Rule::Email),
                Violation::new("first_name", Rule::Required),
            ]
        );
    }

    #[test]
    fn test_document_shape() {
        let mut user = User::new("alice@example.com", "Alice", "Liddell");
        user.keys.push(UserKey {
            encrypted_private_key: vec![1, 2],
            public_key: vec![3],
        });
        let json = serde_json::to_value(&user).unwrap();

        assert!(json["id"].is_null());
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["is_remote"], false);
        assert_eq!(json["keys"][0]["public_key"], serde_json::json!([3]));

        let back: User = serde_json::from_value(json).unwrap();
        assert_eq!(back, user);
    }
}
