use std::sync::Arc;

use anyhow::Context;

use rocktools_auth::{JwtValidator, PasswordHasher, Pbkdf2PasswordHasher, StaffEmailPolicy};
use rocktools_core::{TenantId, UserId};
use rocktools_infra::{
    AppConfig, CheckoutService, DynRetailStore, IdentityService, InMemoryPaymentGateway, InMemoryRetailStore,
    PaymentGateway, PostgresRetailStore, RetailStore, StoreResult, StorefrontService, StripeCheckoutGateway,
};
use rocktools_parties::{Client, Employee};

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub store: DynRetailStore,
    pub identity: IdentityService,
    pub storefront: StorefrontService,
    pub checkout: CheckoutService,
}

impl AppServices {
    pub fn new(
        store: DynRetailStore,
        gateway: Arc<dyn PaymentGateway>,
        jwt: Arc<dyn JwtValidator>,
        config: &AppConfig,
    ) -> anyhow::Result<Self> {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(Pbkdf2PasswordHasher::new(1, config.password_hash_iterations));
        let staff_policy = StaffEmailPolicy::new(&config.staff_email_domain)
            .context("invalid STAFF_EMAIL_DOMAIN")?;

        Ok(Self {
            identity: IdentityService::new(
                store.clone(),
                hasher,
                jwt,
                staff_policy,
                chrono::Duration::minutes(config.token_ttl_minutes),
            ),
            storefront: StorefrontService::new(store.clone()),
            checkout: CheckoutService::new(store.clone(), gateway, format!("{}/", config.storefront_domain)),
            store,
        })
    }

    /// The caller's client profile, if they have one in this tenant.
    pub async fn client_of(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<Client>> {
        self.store.client_by_user(tenant_id, user_id).await
    }

    /// The caller's employee profile, loaded fresh so clearance changes apply at once.
    pub async fn staff_of(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<Employee>> {
        self.store.employee_by_user(tenant_id, user_id).await
    }
}

/// Wire the store and payment gateway selected by the configuration.
pub async fn build_services(config: &AppConfig, jwt: Arc<dyn JwtValidator>) -> anyhow::Result<AppServices> {
    let store = build_store(config).await?;

    let gateway: Arc<dyn PaymentGateway> = match &config.stripe_secret_key {
        Some(key) => Arc::new(StripeCheckoutGateway::new(key.clone())),
        None => {
            tracing::warn!("using the in-memory payment gateway");
            Arc::new(InMemoryPaymentGateway::new())
        }
    };

    AppServices::new(store, gateway, jwt, config)
}

async fn build_store(config: &AppConfig) -> anyhow::Result<DynRetailStore> {
    if !config.use_persistent_stores {
        tracing::info!("using in-memory stores");
        return Ok(Arc::new(InMemoryRetailStore::new()));
    }

    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set when USE_PERSISTENT_STORES is enabled")?;
    let store = PostgresRetailStore::connect(url)
        .await
        .context("failed to connect to Postgres")?;
    store.migrate().await.context("failed to apply schema")?;
    tracing::info!("using Postgres stores");
    Ok(Arc::new(store))
}
