//! Pre-write constraint checks.

use std::fmt;

/// Constraint a field failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    Email,
    /// The field is owned by the store and cannot be changed by callers.
    Immutable,
    /// The entity type has no such field.
    Unknown,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "required"),
            Rule::Email => write!(f, "email"),
            Rule::Immutable => write!(f, "immutable"),
            Rule::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub rule: Rule,
}

impl Violation {
    pub fn new(field: impl Into<String>, rule: Rule) -> Self {
        Self {
            field: field.into(),
            rule,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.rule)
    }
}

/// Declared constraints of an entity type. An empty result means valid.
pub trait Validate {
    fn validate(&self) -> Vec<Violation>;
}

/// Accumulates violations for a [`Validate`] implementation.
#[derive(Debug, Default)]
pub struct Checks {
    violations: Vec<Violation>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.violations.push(Violation::new(field, Rule::Required));
        }
        self
    }

    pub fn required_bytes(mut self, field: &str, value: &[u8]) -> Self {
        if value.is_empty() {
            self.violations.push(Violation::new(field, Rule::Required));
        }
        self
    }

    /// Required, and shaped like `local@domain.tld`.
    pub fn email(mut self, field: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.violations.push(Violation::new(field, Rule::Required));
        } else if !looks_like_email(value) {
            self.violations.push(Violation::new(field, Rule::Email));
        }
        self
    }

    pub fn finish(self) -> Vec<Violation> {
        self.violations
    }
}

fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}
