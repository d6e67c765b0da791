//! Account registration, login and profile lookups.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use rocktools_auth::{
    AccountKind, ClearanceCode, JwtClaims, JwtError, JwtValidator, PasswordError, PasswordHasher,
    StaffEmailPolicy, User, normalize_email,
};
use rocktools_core::{DomainError, TenantId, UserId};
use rocktools_parties::{Address, AddressDetails, AddressId, AddressOwner, Client, ClientId, Employee, EmployeeId, PersonName};

use crate::store::{DynRetailStore, StoreError};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error("You've already registered with that email, log in instead!")]
    AlreadyRegistered,

    #[error("This email does not exist, please try again or register.")]
    UnknownEmail,

    #[error("Password incorrect, please try again.")]
    WrongPassword,

    #[error("account profile not found")]
    MissingProfile,
}

impl From<DomainError> for IdentityError {
    fn from(err: DomainError) -> Self {
        Self::Store(StoreError::Domain(err))
    }
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// Registration form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub document_id: Option<String>,
}

/// A signed bearer token and what it was issued for.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub user_id: UserId,
    pub kind: AccountKind,
    pub expires_at: DateTime<Utc>,
}

/// The profile behind a login.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    Client(Client),
    Employee(Employee),
}

impl Profile {
    pub fn address_owner(&self) -> AddressOwner {
        match self {
            Profile::Client(c) => AddressOwner::Client(c.id),
            Profile::Employee(e) => AddressOwner::Employee(e.id),
        }
    }
}

pub struct IdentityService {
    store: DynRetailStore,
    hasher: Arc<dyn PasswordHasher>,
    jwt: Arc<dyn JwtValidator>,
    staff_policy: StaffEmailPolicy,
    token_ttl: Duration,
}

impl IdentityService {
    pub fn new(
        store: DynRetailStore,
        hasher: Arc<dyn PasswordHasher>,
        jwt: Arc<dyn JwtValidator>,
        staff_policy: StaffEmailPolicy,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            jwt,
            staff_policy,
            token_ttl,
        }
    }

    /// Create a client (with its cart) or, for staff-domain emails, an employee.
    #[instrument(skip(self, form), fields(tenant_id = %tenant_id), err)]
    pub async fn register(&self, tenant_id: TenantId, form: Registration) -> IdentityResult<IssuedToken> {
        let email = normalize_email(&form.email)?;
        if self.store.find_user_by_email(tenant_id, &email).await?.is_some() {
            return Err(IdentityError::AlreadyRegistered);
        }

        let name = PersonName::new(&form.first_name, &form.last_name, form.document_id.as_deref())?;
        let kind = self.staff_policy.classify(&email);
        let user = User::create(UserId::new(), &email, self.hasher.hash(&form.password)?, kind)?;
        let now = Utc::now();

        let stored = match kind {
            AccountKind::Client => {
                let client = Client::register(ClientId::new(), user.id, name, now)?;
                self.store.register_client(tenant_id, &user, &client).await.map(|_| ())
            }
            AccountKind::Employee => {
                // The store assigns the real clearance code.
                let employee =
                    Employee::hire(EmployeeId::new(), user.id, name, "", ClearanceCode::unactivated(), now)?;
                self.store
                    .register_employee(tenant_id, &user, employee)
                    .await
                    .inspect(|e| info!(clearance = e.clearance_code.as_str(), "employee registered"))
                    .map(|_| ())
            }
        };
        match stored {
            Err(StoreError::Conflict(msg)) if msg.contains("email") => return Err(IdentityError::AlreadyRegistered),
            other => other?,
        }

        self.issue(tenant_id, &user, now)
    }

    /// Which kind of account an email would register as.
    pub fn account_kind(&self, email: &str) -> AccountKind {
        self.staff_policy.classify(&email.trim().to_ascii_lowercase())
    }

    #[instrument(skip(self, password), fields(tenant_id = %tenant_id), err)]
    pub async fn login(&self, tenant_id: TenantId, email: &str, password: &str) -> IdentityResult<IssuedToken> {
        let user = self
            .store
            .find_user_by_email(tenant_id, email)
            .await?
            .ok_or(IdentityError::UnknownEmail)?;
        if !self.hasher.verify(password, &user.password_hash)? {
            return Err(IdentityError::WrongPassword);
        }
        self.issue(tenant_id, &user, Utc::now())
    }

    pub async fn profile(&self, tenant_id: TenantId, user_id: UserId) -> IdentityResult<Profile> {
        if let Some(client) = self.store.client_by_user(tenant_id, user_id).await? {
            return Ok(Profile::Client(client));
        }
        self.store
            .employee_by_user(tenant_id, user_id)
            .await?
            .map(Profile::Employee)
            .ok_or(IdentityError::MissingProfile)
    }

    pub async fn address(&self, tenant_id: TenantId, user_id: UserId) -> IdentityResult<Option<Address>> {
        let owner = self.profile(tenant_id, user_id).await?.address_owner();
        Ok(self.store.address_of(tenant_id, owner).await?)
    }

    /// Create or replace the caller's address.
    pub async fn save_address(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        details: AddressDetails,
    ) -> IdentityResult<Address> {
        let owner = self.profile(tenant_id, user_id).await?.address_owner();
        let address = match self.store.address_of(tenant_id, owner).await? {
            Some(mut existing) => {
                existing.update(details)?;
                existing
            }
            None => Address::create(AddressId::new(), owner, details)?,
        };
        self.store.save_address(tenant_id, &address).await?;
        Ok(address)
    }

    fn issue(&self, tenant_id: TenantId, user: &User, now: DateTime<Utc>) -> IdentityResult<IssuedToken> {
        let claims = JwtClaims::new(user.id, tenant_id, vec![user.kind.role()], now, self.token_ttl);
        Ok(IssuedToken {
            token: self.jwt.issue(&claims)?,
            user_id: user.id,
            kind: user.kind,
            expires_at: claims.expires_at,
        })
    }
}
