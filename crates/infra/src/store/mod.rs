//! Tenant-isolated persistence for the storefront.
//!
//! Every operation takes a [`TenantId`] and can never observe another tenant's
//! rows. Operations that touch stock (ledger commits, voids, recounts) are single
//! units of work: the adjuster plans against the locked stock snapshot and the
//! plan is applied together with the ledger rows, or nothing is written.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use rocktools_auth::User;
use rocktools_core::{DomainError, TenantId, UserId};
use rocktools_inventory::{Inventory, InventoryId};
use rocktools_parties::{Address, AddressOwner, Client, ClientId, Employee, EmployeeId};
use rocktools_products::{Department, DepartmentId, Product, ProductId};
use rocktools_sales::{Cart, Payment, Transaction, TransactionId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRetailStore;
pub use postgres::PostgresRetailStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A product with stock on hand, as shown on a department page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: i64,
}

/// Everything one ledger commit writes.
#[derive(Debug, Clone)]
pub struct LedgerCommit {
    pub transaction: Transaction,
    pub payments: Vec<Payment>,
    /// Checkout only: the cart the transaction was built from. The commit fails
    /// with a conflict if the stored cart no longer matches, and clears it on
    /// success.
    pub consumed_cart: Option<Cart>,
}

impl LedgerCommit {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            payments: Vec::new(),
            consumed_cart: None,
        }
    }

    pub fn with_payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn consuming(mut self, cart: Cart) -> Self {
        self.consumed_cart = Some(cart);
        self
    }
}

#[async_trait]
pub trait RetailStore: Send + Sync {
    // Departments

    async fn list_departments(&self, tenant_id: TenantId) -> StoreResult<Vec<Department>>;
    async fn get_department(&self, tenant_id: TenantId, id: DepartmentId) -> StoreResult<Option<Department>>;
    /// Case-insensitive lookup by name.
    async fn find_department(&self, tenant_id: TenantId, name: &str) -> StoreResult<Option<Department>>;
    /// Insert or replace. Names are unique per tenant (case-insensitively).
    async fn save_department(&self, tenant_id: TenantId, department: &Department) -> StoreResult<()>;
    /// Delete and leave its products uncategorized.
    async fn delete_department(&self, tenant_id: TenantId, id: DepartmentId) -> StoreResult<()>;

    // Products

    async fn list_products(&self, tenant_id: TenantId) -> StoreResult<Vec<Product>>;
    async fn get_product(&self, tenant_id: TenantId, id: ProductId) -> StoreResult<Option<Product>>;
    /// Insert or replace. The referenced department must exist.
    async fn save_product(&self, tenant_id: TenantId, product: &Product) -> StoreResult<()>;
    /// Delete with its inventory row and cart lines. Products with ledger history
    /// cannot be deleted.
    async fn delete_product(&self, tenant_id: TenantId, id: ProductId) -> StoreResult<()>;
    /// Products of a department with `quantity > 0`.
    async fn stocked_products(
        &self,
        tenant_id: TenantId,
        department_id: DepartmentId,
    ) -> StoreResult<Vec<StockedProduct>>;

    // Inventory

    async fn list_inventory(&self, tenant_id: TenantId) -> StoreResult<Vec<Inventory>>;
    async fn get_inventory(&self, tenant_id: TenantId, id: InventoryId) -> StoreResult<Option<Inventory>>;
    async fn inventory_for(&self, tenant_id: TenantId, product_id: ProductId) -> StoreResult<Option<Inventory>>;
    /// Set the counted quantity through the adjuster, creating the row if absent.
    async fn recount_inventory(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        counted: i64,
    ) -> StoreResult<Inventory>;
    async fn delete_inventory(&self, tenant_id: TenantId, id: InventoryId) -> StoreResult<()>;

    // Accounts

    async fn find_user_by_email(&self, tenant_id: TenantId, email: &str) -> StoreResult<Option<User>>;
    async fn get_user(&self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>>;
    /// Create the user, the client profile and the client's empty cart.
    async fn register_client(&self, tenant_id: TenantId, user: &User, client: &Client) -> StoreResult<Cart>;
    /// Create the user and employee profile. The clearance code is assigned here:
    /// the tenant's first employee becomes admin, later ones start unactivated.
    async fn register_employee(
        &self,
        tenant_id: TenantId,
        user: &User,
        employee: Employee,
    ) -> StoreResult<Employee>;

    async fn list_clients(&self, tenant_id: TenantId) -> StoreResult<Vec<Client>>;
    async fn get_client(&self, tenant_id: TenantId, id: ClientId) -> StoreResult<Option<Client>>;
    async fn client_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<Client>>;
    async fn update_client(&self, tenant_id: TenantId, client: &Client) -> StoreResult<()>;
    /// Delete with its login, address and cart; its transactions keep no client.
    async fn delete_client(&self, tenant_id: TenantId, id: ClientId) -> StoreResult<()>;

    async fn list_employees(&self, tenant_id: TenantId) -> StoreResult<Vec<Employee>>;
    async fn get_employee(&self, tenant_id: TenantId, id: EmployeeId) -> StoreResult<Option<Employee>>;
    async fn employee_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<Employee>>;
    async fn update_employee(&self, tenant_id: TenantId, employee: &Employee) -> StoreResult<()>;
    /// Delete with its login and address.
    async fn delete_employee(&self, tenant_id: TenantId, id: EmployeeId) -> StoreResult<()>;

    async fn address_of(&self, tenant_id: TenantId, owner: AddressOwner) -> StoreResult<Option<Address>>;
    /// Insert or replace; one address per owner.
    async fn save_address(&self, tenant_id: TenantId, address: &Address) -> StoreResult<()>;

    // Carts

    async fn cart_for(&self, tenant_id: TenantId, client_id: ClientId) -> StoreResult<Cart>;
    async fn save_cart(&self, tenant_id: TenantId, cart: &Cart) -> StoreResult<()>;

    // Ledger

    /// Commit a transaction with its items and payments and apply its stock
    /// effect, in one unit of work.
    async fn commit_transaction(&self, tenant_id: TenantId, commit: LedgerCommit) -> StoreResult<Transaction>;
    /// Flip `is_voided` and reverse the stock effect, in one unit of work.
    async fn void_transaction(&self, tenant_id: TenantId, id: TransactionId) -> StoreResult<Transaction>;
    async fn list_transactions(&self, tenant_id: TenantId) -> StoreResult<Vec<Transaction>>;
    async fn get_transaction(&self, tenant_id: TenantId, id: TransactionId) -> StoreResult<Option<Transaction>>;
    async fn list_payments(&self, tenant_id: TenantId) -> StoreResult<Vec<Payment>>;
    async fn payments_for(&self, tenant_id: TenantId, transaction_id: TransactionId) -> StoreResult<Vec<Payment>>;
}

pub type DynRetailStore = Arc<dyn RetailStore>;

#[cfg(test)]
mod tests;
