//! Password hashing.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

const SCHEME: &str = "pbkdf2:sha256";
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Work factor for new hashes unless configured otherwise.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must be at least {0} characters")]
    TooShort(usize),

    #[error("malformed password hash")]
    MalformedHash,
}

/// Hashes and verifies account passwords.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    fn verify(&self, password: &str, stored: &str) -> Result<bool, PasswordError>;
}

/// PBKDF2-HMAC-SHA256, stored as `pbkdf2:sha256:<iterations>$<salt hex>$<key hex>`.
///
/// Verification reads the iteration count from the stored hash, so raising the
/// work factor never locks out existing accounts.
#[derive(Debug, Clone)]
pub struct Pbkdf2PasswordHasher {
    min_len: usize,
    iterations: u32,
}

impl Pbkdf2PasswordHasher {
    pub fn new(min_len: usize, iterations: u32) -> Self {
        Self {
            min_len,
            iterations: iterations.max(1),
        }
    }

    fn derive(salt: &[u8], password: &str, iterations: u32) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
        key
    }
}

impl Default for Pbkdf2PasswordHasher {
    fn default() -> Self {
        Self::new(1, DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher for Pbkdf2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        if password.chars().count() < self.min_len {
            return Err(PasswordError::TooShort(self.min_len));
        }
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let key = Self::derive(&salt, password, self.iterations);
        Ok(format!(
            "{SCHEME}:{}${}${}",
            self.iterations,
            hex::encode(salt),
            hex::encode(key)
        ))
    }

    fn verify(&self, password: &str, stored: &str) -> Result<bool, PasswordError> {
        let mut parts = stored.split('$');
        let (Some(method), Some(salt), Some(expected), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(PasswordError::MalformedHash);
        };
        let iterations: u32 = method
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .and_then(|n| n.parse().ok())
            .filter(|n| *n > 0)
            .ok_or(PasswordError::MalformedHash)?;
        let salt = hex::decode(salt).map_err(|_| PasswordError::MalformedHash)?;
        let expected = hex::decode(expected).map_err(|_| PasswordError::MalformedHash)?;
        let actual = Self::derive(&salt, password, iterations);

        // Constant-time comparison.
        Ok(actual.len() == expected.len()
            && actual
                .iter()
                .zip(expected.iter())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Pbkdf2PasswordHasher {
        Pbkdf2PasswordHasher::new(1, 1_000)
    }

    #[test]
    fn hash_then_verify() {
        let h = hasher();
        let stored = h.hash("hunter22").unwrap();
        assert!(stored.starts_with("pbkdf2:sha256:1000$"));
        assert!(h.verify("hunter22", &stored).unwrap());
        assert!(!h.verify("hunter23", &stored).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let h = hasher();
        assert_ne!(h.hash("same").unwrap(), h.hash("same").unwrap());
    }

    #[test]
    fn work_factor_comes_from_the_stored_hash() {
        let stored = Pbkdf2PasswordHasher::new(1, 2_000).hash("hunter22").unwrap();
        assert!(hasher().verify("hunter22", &stored).unwrap());

        let weakened = stored.replacen("pbkdf2:sha256:2000", "pbkdf2:sha256:1000", 1);
        assert!(!hasher().verify("hunter22", &weakened).unwrap());
    }

    #[test]
    fn matches_the_published_pbkdf2_vector() {
        // RFC 7914 section 11, first 32 bytes.
        let key = Pbkdf2PasswordHasher::derive(b"salt", "passwd", 1);
        assert_eq!(
            hex::encode(key),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn empty_password_rejected_and_malformed_hash_detected() {
        let h = hasher();
        assert_eq!(h.hash(""), Err(PasswordError::TooShort(1)));
        assert_eq!(h.verify("x", "plaintext"), Err(PasswordError::MalformedHash));
        assert_eq!(h.verify("x", "pbkdf2:sha256:1000$zz$00"), Err(PasswordError::MalformedHash));
        assert_eq!(h.verify("x", "sha256$00$00"), Err(PasswordError::MalformedHash));
        assert_eq!(h.verify("x", "pbkdf2:sha256:0$00$00"), Err(PasswordError::MalformedHash));
    }
}
