//! Login accounts.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use rocktools_core::{DomainError, DomainResult, Entity, UserId, max_len};

use crate::Role;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"));

/// Whether an account belongs to a customer or to staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Client,
    Employee,
}

impl AccountKind {
    pub fn role(self) -> Role {
        match self {
            AccountKind::Client => Role::CLIENT,
            AccountKind::Employee => Role::EMPLOYEE,
        }
    }
}

/// A login identity. Exactly one client or employee profile points at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub kind: AccountKind,
}

impl User {
    pub fn create(
        id: UserId,
        email: &str,
        password_hash: String,
        kind: AccountKind,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            email: normalize_email(email)?,
            password_hash,
            kind,
        })
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Trim, lowercase and validate an email address (≤50 characters).
pub fn normalize_email(email: &str) -> DomainResult<String> {
    let email = email.trim().to_lowercase();
    max_len("email", &email, 50)?;
    if !EMAIL.is_match(&email) {
        return Err(DomainError::validation("email is not a valid address"));
    }
    Ok(email)
}

/// Decides which registrations become staff accounts.
///
/// An address qualifies when its local part is letters followed by letters or
/// digits and its domain is exactly the staff domain.
#[derive(Debug, Clone)]
pub struct StaffEmailPolicy {
    pattern: Regex,
}

impl StaffEmailPolicy {
    pub fn new(domain: &str) -> DomainResult<Self> {
        let pattern = Regex::new(&format!(
            "^[a-zA-Z]+[a-zA-Z0-9]*@{}$",
            regex::escape(domain.trim())
        ))
        .map_err(|e| DomainError::validation(format!("invalid staff domain: {e}")))?;
        Ok(Self { pattern })
    }

    pub fn classify(&self, email: &str) -> AccountKind {
        if self.pattern.is_match(email.trim()) {
            AccountKind::Employee
        } else {
            AccountKind::Client
        }
    }
}

impl Default for StaffEmailPolicy {
    fn default() -> Self {
        Self::new("rocktools.com").expect("default staff domain is a valid pattern")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_domain_emails_become_employees() {
        let policy = StaffEmailPolicy::default();
        assert_eq!(policy.classify("jdoe@rocktools.com"), AccountKind::Employee);
        assert_eq!(policy.classify("jdoe2@rocktools.com"), AccountKind::Employee);
    }

    #[test]
    fn other_emails_become_clients() {
        let policy = StaffEmailPolicy::default();
        assert_eq!(policy.classify("jdoe@gmail.com"), AccountKind::Client);
        assert_eq!(policy.classify("2jdoe@rocktools.com"), AccountKind::Client);
        assert_eq!(policy.classify("j.doe@rocktools.com"), AccountKind::Client);
        assert_eq!(policy.classify("jdoe@rocktoolsxcom"), AccountKind::Client);
    }

    #[test]
    fn custom_staff_domain() {
        let policy = StaffEmailPolicy::new("example.org").unwrap();
        assert_eq!(policy.classify("ops@example.org"), AccountKind::Employee);
        assert_eq!(policy.classify("ops@rocktools.com"), AccountKind::Client);
    }

    #[test]
    fn emails_are_normalized_and_validated() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email(&format!("{}@x.io", "a".repeat(50))).is_err());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User::create(UserId::new(), "a@b.co", "sha256$00$00".into(), AccountKind::Client).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["kind"], "client");
    }
}
