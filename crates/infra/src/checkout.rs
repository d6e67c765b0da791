//! Cart checkout through a hosted payment session.
//!
//! The flow never leaves a half-finished order behind:
//! 1. the cart is converted to a draft sell transaction and the adjuster is
//!    dry-run against current stock;
//! 2. the gateway opens a hosted session (nothing is mutated if it fails);
//! 3. one store unit of work records the transaction, its card payment and the
//!    stock decrement, and clears the cart;
//! 4. if that commit fails the session is expired so the client cannot pay for
//!    an order that was never recorded.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use rocktools_core::{DomainError, TenantId};
use rocktools_inventory::InventoryAdjuster;
use rocktools_parties::ClientId;
use rocktools_sales::{Payment, PaymentId, PaymentType, TransactionId};

use crate::payment::{CheckoutLine, PaymentError, PaymentGateway};
use crate::store::{DynRetailStore, LedgerCommit, StoreError};

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl From<DomainError> for CheckoutError {
    fn from(err: DomainError) -> Self {
        Self::Store(StoreError::Domain(err))
    }
}

/// Where to send the client, and the order that was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub transaction_id: TransactionId,
    pub session_id: String,
    pub redirect_url: String,
}

pub struct CheckoutService {
    store: DynRetailStore,
    gateway: Arc<dyn PaymentGateway>,
    return_url: String,
}

impl CheckoutService {
    /// `return_url` is used as both the success and the cancel URL.
    pub fn new(store: DynRetailStore, gateway: Arc<dyn PaymentGateway>, return_url: impl Into<String>) -> Self {
        Self {
            store,
            gateway,
            return_url: return_url.into(),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, client_id = %client_id), err)]
    pub async fn checkout(&self, tenant_id: TenantId, client_id: ClientId) -> Result<CheckoutOutcome, CheckoutError> {
        let cart = self.store.cart_for(tenant_id, client_id).await?;
        let transaction = cart.to_sell_transaction(TransactionId::new(), Utc::now())?;

        // Dry run: fail before the gateway is involved.
        let mut stock = Vec::with_capacity(transaction.items().len());
        for item in transaction.items() {
            let quantity = self
                .store
                .inventory_for(tenant_id, item.product_id)
                .await?
                .map(|i| i.quantity());
            stock.push((item.product_id, quantity));
        }
        InventoryAdjuster::plan(&transaction.stock_movements(), |p| {
            stock.iter().find(|(id, _)| *id == p).and_then(|(_, q)| *q)
        })?;

        let mut lines = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            let product = self
                .store
                .get_product(tenant_id, item.product_id)
                .await?
                .ok_or(StoreError::NotFound("product"))?;
            lines.push(CheckoutLine {
                price_code: product.checkout_price_code()?.to_string(),
                quantity: item.quantity,
            });
        }

        let session = self
            .gateway
            .create_checkout_session(&lines, &self.return_url, &self.return_url)
            .await?;

        let payment = Payment::record(
            PaymentId::new(),
            transaction.id,
            PaymentType::CreditCard,
            transaction.total_amount(),
            Some(session.id.clone()),
            Utc::now(),
        )?;
        let commit = LedgerCommit::new(transaction).with_payment(payment).consuming(cart);

        match self.store.commit_transaction(tenant_id, commit).await {
            Ok(recorded) => {
                info!(transaction_id = %recorded.id, total = %recorded.total_amount(), "checkout recorded");
                Ok(CheckoutOutcome {
                    transaction_id: recorded.id,
                    session_id: session.id,
                    redirect_url: session.url,
                })
            }
            Err(err) => {
                if let Err(expire_err) = self.gateway.expire_session(&session.id).await {
                    warn!(session_id = %session.id, error = %expire_err, "failed to expire orphaned checkout session");
                }
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rocktools_auth::{AccountKind, User};
    use rocktools_core::{Money, UserId};
    use rocktools_parties::{Client, PersonName};
    use rocktools_products::{Product, ProductDetails, ProductId};

    use super::*;
    use crate::payment::InMemoryPaymentGateway;
    use crate::store::{InMemoryRetailStore, RetailStore};

    struct Fixture {
        store: Arc<InMemoryRetailStore>,
        gateway: Arc<InMemoryPaymentGateway>,
        service: CheckoutService,
        tenant: TenantId,
        client: ClientId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRetailStore::new());
        let gateway = Arc::new(InMemoryPaymentGateway::new());
        let tenant = TenantId::new();
        let user = User::create(UserId::new(), "ada@example.com", "hash".to_string(), AccountKind::Client).unwrap();
        let client = Client::register(
            ClientId::new(),
            user.id,
            PersonName::new("Ada", "Lovelace", None).unwrap(),
            Utc::now(),
        )
        .unwrap();
        store.register_client(tenant, &user, &client).await.unwrap();
        let service = CheckoutService::new(store.clone(), gateway.clone(), "http://127.0.0.1:8080/");
        Fixture {
            store,
            gateway,
            service,
            tenant,
            client: client.id,
        }
    }

    async fn product(f: &Fixture, stock: i64, price_code: Option<&str>) -> Product {
        let product = Product::create(
            ProductId::new(),
            ProductDetails {
                department_id: None,
                description: "Level".to_string(),
                brand: "Rock".to_string(),
                website_url: "https://rocktools.example/level".to_string(),
                image_url: "level.png".to_string(),
                price: Money::from_cents(2_000),
                cost: Money::from_cents(900),
                product_family: String::new(),
                stripe_product_code: None,
                stripe_price_code: price_code.map(str::to_string),
            },
        )
        .unwrap();
        f.store.save_product(f.tenant, &product).await.unwrap();
        f.store.recount_inventory(f.tenant, product.id, stock).await.unwrap();
        product
    }

    async fn stage(f: &Fixture, product: &Product, qty: i64) {
        let mut cart = f.store.cart_for(f.tenant, f.client).await.unwrap();
        cart.add(product.id, qty, product.price()).unwrap();
        f.store.save_cart(f.tenant, &cart).await.unwrap();
    }

    #[tokio::test]
    async fn checkout_records_sale_and_clears_cart() {
        let f = fixture().await;
        let p = product(&f, 5, Some("price_level")).await;
        stage(&f, &p, 2).await;

        let outcome = f.service.checkout(f.tenant, f.client).await.unwrap();

        let tx = f.store.get_transaction(f.tenant, outcome.transaction_id).await.unwrap().unwrap();
        assert_eq!(tx.total_amount(), Money::from_cents(4_000));
        let payments = f.store.payments_for(f.tenant, tx.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].reference.as_deref(), Some(outcome.session_id.as_str()));
        assert!(f.store.cart_for(f.tenant, f.client).await.unwrap().is_empty());
        assert_eq!(
            f.store.inventory_for(f.tenant, p.id).await.unwrap().unwrap().quantity(),
            3
        );
        assert_eq!(f.gateway.sessions()[0].1[0].price_code, "price_level");
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let f = fixture().await;
        let err = f.service.checkout(f.tenant, f.client).await.unwrap_err();
        assert!(err.to_string().contains("Your cart is empty!"));
        assert!(f.gateway.sessions().is_empty());
    }

    #[tokio::test]
    async fn insufficient_stock_never_reaches_the_gateway() {
        let f = fixture().await;
        let p = product(&f, 5, Some("price_level")).await;
        stage(&f, &p, 4).await;
        f.store.recount_inventory(f.tenant, p.id, 1).await.unwrap();

        let err = f.service.checkout(f.tenant, f.client).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Store(StoreError::Domain(DomainError::InvariantViolation(_)))
        ));
        assert!(f.gateway.sessions().is_empty());
        assert_eq!(f.store.cart_for(f.tenant, f.client).await.unwrap().items().len(), 1);
    }

    #[tokio::test]
    async fn gateway_failure_leaves_everything_untouched() {
        let f = fixture().await;
        let p = product(&f, 5, Some("price_level")).await;
        stage(&f, &p, 1).await;
        f.gateway.fail_requests(true);

        let err = f.service.checkout(f.tenant, f.client).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Payment(PaymentError::Unavailable)));
        assert!(f.store.list_transactions(f.tenant).await.unwrap().is_empty());
        assert_eq!(f.store.cart_for(f.tenant, f.client).await.unwrap().items().len(), 1);
    }

    #[tokio::test]
    async fn products_without_price_code_cannot_be_checked_out() {
        let f = fixture().await;
        let p = product(&f, 5, None).await;
        stage(&f, &p, 1).await;

        let err = f.service.checkout(f.tenant, f.client).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Store(StoreError::Domain(DomainError::Validation(_)))));
    }

    /// Opens real sessions, but lets another sale drain the stock while the
    /// client is being handed off.
    struct DrainingGateway {
        inner: Arc<InMemoryPaymentGateway>,
        store: Arc<InMemoryRetailStore>,
        tenant: TenantId,
        product: ProductId,
    }

    #[async_trait::async_trait]
    impl PaymentGateway for DrainingGateway {
        async fn create_checkout_session(
            &self,
            lines: &[CheckoutLine],
            success_url: &str,
            cancel_url: &str,
        ) -> Result<crate::payment::CheckoutSession, PaymentError> {
            let session = self.inner.create_checkout_session(lines, success_url, cancel_url).await?;
            self.store
                .recount_inventory(self.tenant, self.product, 0)
                .await
                .map_err(|e| PaymentError::Transport(e.to_string()))?;
            Ok(session)
        }

        async fn expire_session(&self, session_id: &str) -> Result<(), PaymentError> {
            self.inner.expire_session(session_id).await
        }
    }

    #[tokio::test]
    async fn failed_commit_expires_the_opened_session() {
        let f = fixture().await;
        let p = product(&f, 5, Some("price_level")).await;
        stage(&f, &p, 2).await;
        let gateway = Arc::new(DrainingGateway {
            inner: f.gateway.clone(),
            store: f.store.clone(),
            tenant: f.tenant,
            product: p.id,
        });
        let service = CheckoutService::new(f.store.clone(), gateway, "http://127.0.0.1:8080/");

        let err = service.checkout(f.tenant, f.client).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Store(StoreError::Domain(DomainError::InvariantViolation(_)))
        ));
        let opened = f.gateway.sessions();
        assert_eq!(opened.len(), 1);
        assert_eq!(f.gateway.expired(), vec![opened[0].0.id.clone()]);
        assert!(f.store.list_transactions(f.tenant).await.unwrap().is_empty());
        assert!(f.store.list_payments(f.tenant).await.unwrap().is_empty());
        let cart = f.store.cart_for(f.tenant, f.client).await.unwrap();
        assert_eq!(cart.quantity_of(p.id), 2);
        assert_eq!(
            f.store.inventory_for(f.tenant, p.id).await.unwrap().unwrap().quantity(),
            0
        );
    }
}
