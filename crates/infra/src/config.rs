//! Process configuration, read once from the environment at startup.

use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use rocktools_auth::DEFAULT_ITERATIONS;
use thiserror::Error;
use tracing::{info, warn};

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("{0} must be set when USE_PERSISTENT_STORES is enabled")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    /// Absent: checkout runs against the in-memory gateway.
    pub stripe_secret_key: Option<String>,
    /// Base URL clients return to after hosted checkout.
    pub storefront_domain: String,
    pub staff_email_domain: String,
    /// PBKDF2 rounds for newly hashed passwords.
    pub password_hash_iterations: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let use_persistent_stores = flag("USE_PERSISTENT_STORES");
        let database_url = optional("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let jwt_secret = optional("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        let stripe_secret_key = optional("STRIPE_SECRET_KEY");
        if stripe_secret_key.is_none() {
            warn!("STRIPE_SECRET_KEY not set, checkout sessions will not reach a payment provider");
        }

        Ok(Self {
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:8080")?,
            jwt_secret,
            token_ttl_minutes: try_load("TOKEN_TTL_MINUTES", "60")?,
            use_persistent_stores,
            database_url,
            stripe_secret_key,
            storefront_domain: try_load::<String>("STOREFRONT_DOMAIN", "http://127.0.0.1:8080")?
                .trim_end_matches('/')
                .to_string(),
            staff_email_domain: try_load("STAFF_EMAIL_DOMAIN", "rocktools.com")?,
            password_hash_iterations: try_load(
                "PASSWORD_HASH_ITERATIONS",
                &DEFAULT_ITERATIONS.to_string(),
            )?,
        })
    }
}

impl Default for AppConfig {
    /// Development defaults: in-memory stores and gateway.
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_minutes: 60,
            use_persistent_stores: false,
            database_url: None,
            stripe_secret_key: None,
            storefront_domain: "http://127.0.0.1:8080".to_string(),
            staff_email_domain: "rocktools.com".to_string(),
            password_hash_iterations: DEFAULT_ITERATIONS,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn flag(key: &str) -> bool {
    optional(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    optional(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                message: e.to_string(),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_used_for_unset_keys() {
        let port: u16 = try_load("ROCKTOOLS_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn bad_defaults_surface_as_errors() {
        let err = try_load::<u16>("ROCKTOOLS_TEST_UNSET_PORT", "not-a-port").unwrap_err();
        assert!(err.to_string().contains("ROCKTOOLS_TEST_UNSET_PORT"));
    }
}
