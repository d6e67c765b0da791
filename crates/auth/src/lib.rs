//! `rocktools-auth`: authentication/authorization boundary.
//!
//! Accounts, credentials, clearance codes, RBAC and token handling. Decoupled
//! from HTTP and storage.

pub mod authorize;
pub mod claims;
pub mod clearance;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use clearance::ClearanceCode;
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use password::{DEFAULT_ITERATIONS, PasswordError, PasswordHasher, Pbkdf2PasswordHasher};
pub use permissions::Permission;
pub use principal::TenantMembership;
pub use roles::Role;
pub use user::{AccountKind, StaffEmailPolicy, User, normalize_email};
