//! In-memory store for tests/dev.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rocktools_auth::{ClearanceCode, User};
use rocktools_core::{DomainError, Entity, TenantId, UserId};
use rocktools_inventory::{AdjustmentPlan, Inventory, InventoryAdjuster, InventoryId};
use rocktools_parties::{Address, AddressId, AddressOwner, Client, ClientId, Employee, EmployeeId};
use rocktools_products::{Department, DepartmentId, Product, ProductId};
use rocktools_sales::{Cart, CartId, Payment, PaymentId, Transaction, TransactionId};

use super::{LedgerCommit, RetailStore, StockedProduct, StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct TenantData {
    departments: BTreeMap<DepartmentId, Department>,
    products: BTreeMap<ProductId, Product>,
    inventory: BTreeMap<InventoryId, Inventory>,
    users: BTreeMap<UserId, User>,
    clients: BTreeMap<ClientId, Client>,
    employees: BTreeMap<EmployeeId, Employee>,
    addresses: BTreeMap<AddressId, Address>,
    carts: BTreeMap<CartId, Cart>,
    transactions: BTreeMap<TransactionId, Transaction>,
    payments: BTreeMap<PaymentId, Payment>,
}

impl TenantData {
    fn stock_row(&self, product_id: ProductId) -> Option<&Inventory> {
        self.inventory.values().find(|i| i.product_id == product_id)
    }

    fn stock_of(&self, product_id: ProductId) -> Option<i64> {
        self.stock_row(product_id).map(Inventory::quantity)
    }

    fn require_product(&self, product_id: ProductId) -> StoreResult<&Product> {
        self.products
            .get(&product_id)
            .ok_or(StoreError::NotFound("product"))
    }

    fn apply_plan(&mut self, plan: &AdjustmentPlan, now: DateTime<Utc>) -> StoreResult<()> {
        for change in plan.changes() {
            if change.creates_row() {
                let row = Inventory::receive(InventoryId::new(), change.product_id, change.after, now)?;
                self.inventory.insert(row.id, row);
                continue;
            }
            let row = self
                .inventory
                .values_mut()
                .find(|i| i.product_id == change.product_id)
                .ok_or(StoreError::NotFound("inventory"))?;
            row.apply(change, now)?;
        }
        Ok(())
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }

    fn owner_exists(&self, owner: AddressOwner) -> bool {
        match owner {
            AddressOwner::Client(id) => self.clients.contains_key(&id),
            AddressOwner::Employee(id) => self.employees.contains_key(&id),
        }
    }

    fn drop_address_of(&mut self, owner: AddressOwner) {
        self.addresses.retain(|_, a| a.owner != owner);
    }
}

/// In-memory [`RetailStore`] for tests/dev.
///
/// One `RwLock` guards all tenants. A write runs against a copy of the
/// tenant's data that replaces the original only when the whole unit of work
/// succeeds, so a failed checkout or commit leaves nothing behind.
#[derive(Debug, Default)]
pub struct InMemoryRetailStore {
    inner: RwLock<HashMap<TenantId, TenantData>>,
}

impl InMemoryRetailStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, tenant_id: TenantId, f: impl FnOnce(&TenantData) -> T) -> StoreResult<T> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(match map.get(&tenant_id) {
            Some(data) => f(data),
            None => f(&TenantData::default()),
        })
    }

    fn write<T>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&mut TenantData) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let mut draft = map.get(&tenant_id).cloned().unwrap_or_default();
        let out = f(&mut draft)?;
        map.insert(tenant_id, draft);
        Ok(out)
    }
}

/// Insert or replace a row under its own id.
fn upsert<E>(rows: &mut BTreeMap<E::Id, E>, row: E)
where
    E: Entity,
    E::Id: Ord,
{
    rows.insert(row.id().clone(), row);
}

fn poisoned() -> StoreError {
    StoreError::Database("store lock poisoned".to_string())
}

#[async_trait]
impl RetailStore for InMemoryRetailStore {
    async fn list_departments(&self, tenant_id: TenantId) -> StoreResult<Vec<Department>> {
        self.read(tenant_id, |d| {
            let mut out: Vec<_> = d.departments.values().cloned().collect();
            out.sort_by_key(|dep| dep.name.to_lowercase());
            out
        })
    }

    async fn get_department(&self, tenant_id: TenantId, id: DepartmentId) -> StoreResult<Option<Department>> {
        self.read(tenant_id, |d| d.departments.get(&id).cloned())
    }

    async fn find_department(&self, tenant_id: TenantId, name: &str) -> StoreResult<Option<Department>> {
        self.read(tenant_id, |d| d.departments.values().find(|dep| dep.matches(name)).cloned())
    }

    async fn save_department(&self, tenant_id: TenantId, department: &Department) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            if d
                .departments
                .values()
                .any(|other| other.id != department.id && other.matches(&department.name))
            {
                return Err(StoreError::Conflict(format!(
                    "department '{}' already exists",
                    department.name
                )));
            }
            upsert(&mut d.departments, department.clone());
            Ok(())
        })
    }

    async fn delete_department(&self, tenant_id: TenantId, id: DepartmentId) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            d.departments
                .remove(&id)
                .ok_or(StoreError::NotFound("department"))?;
            d.products
                .values_mut()
                .filter(|p| p.department_id() == Some(id))
                .for_each(Product::detach_department);
            Ok(())
        })
    }

    async fn list_products(&self, tenant_id: TenantId) -> StoreResult<Vec<Product>> {
        self.read(tenant_id, |d| d.products.values().cloned().collect())
    }

    async fn get_product(&self, tenant_id: TenantId, id: ProductId) -> StoreResult<Option<Product>> {
        self.read(tenant_id, |d| d.products.get(&id).cloned())
    }

    async fn save_product(&self, tenant_id: TenantId, product: &Product) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            if let Some(dep) = product.department_id() {
                if !d.departments.contains_key(&dep) {
                    return Err(StoreError::NotFound("department"));
                }
            }
            upsert(&mut d.products, product.clone());
            Ok(())
        })
    }

    async fn delete_product(&self, tenant_id: TenantId, id: ProductId) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            d.require_product(id)?;
            if d
                .transactions
                .values()
                .any(|t| t.items().iter().any(|i| i.product_id == id))
            {
                return Err(StoreError::Conflict(
                    "product has ledger history and cannot be deleted".to_string(),
                ));
            }
            d.products.remove(&id);
            d.inventory.retain(|_, i| i.product_id != id);
            for cart in d.carts.values_mut() {
                cart.discard(id);
            }
            Ok(())
        })
    }

    async fn stocked_products(
        &self,
        tenant_id: TenantId,
        department_id: DepartmentId,
    ) -> StoreResult<Vec<StockedProduct>> {
        self.read(tenant_id, |d| {
            d.products
                .values()
                .filter(|p| p.department_id() == Some(department_id))
                .filter_map(|p| {
                    let quantity = d.stock_of(p.id)?;
                    (quantity > 0).then(|| StockedProduct {
                        product: p.clone(),
                        quantity,
                    })
                })
                .collect()
        })
    }

    async fn list_inventory(&self, tenant_id: TenantId) -> StoreResult<Vec<Inventory>> {
        self.read(tenant_id, |d| d.inventory.values().cloned().collect())
    }

    async fn get_inventory(&self, tenant_id: TenantId, id: InventoryId) -> StoreResult<Option<Inventory>> {
        self.read(tenant_id, |d| d.inventory.get(&id).cloned())
    }

    async fn inventory_for(&self, tenant_id: TenantId, product_id: ProductId) -> StoreResult<Option<Inventory>> {
        self.read(tenant_id, |d| d.stock_row(product_id).cloned())
    }

    async fn recount_inventory(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        counted: i64,
    ) -> StoreResult<Inventory> {
        self.write(tenant_id, |d| {
            d.require_product(product_id)?;
            let plan = InventoryAdjuster::plan_recount(product_id, d.stock_of(product_id), counted)?;
            d.apply_plan(&plan, Utc::now())?;
            d.stock_row(product_id)
                .cloned()
                .ok_or(StoreError::NotFound("inventory"))
        })
    }

    /// Removes the row outright; quantities only move through the adjuster.
    async fn delete_inventory(&self, tenant_id: TenantId, id: InventoryId) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            d.inventory
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::NotFound("inventory"))
        })
    }

    async fn find_user_by_email(&self, tenant_id: TenantId, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        self.read(tenant_id, |d| d.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user(&self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>> {
        self.read(tenant_id, |d| d.users.get(&id).cloned())
    }

    async fn register_client(&self, tenant_id: TenantId, user: &User, client: &Client) -> StoreResult<Cart> {
        self.write(tenant_id, |d| {
            if d.email_taken(&user.email) {
                return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
            }
            if let Some(doc) = &client.name.document_id {
                if d.clients.values().any(|c| c.name.document_id.as_ref() == Some(doc)) {
                    return Err(StoreError::Conflict("document_id already registered".to_string()));
                }
            }
            let cart = Cart::open(CartId::new(), client.id);
            upsert(&mut d.users, user.clone());
            upsert(&mut d.clients, client.clone());
            upsert(&mut d.carts, cart.clone());
            Ok(cart)
        })
    }

    async fn register_employee(
        &self,
        tenant_id: TenantId,
        user: &User,
        mut employee: Employee,
    ) -> StoreResult<Employee> {
        self.write(tenant_id, |d| {
            if d.email_taken(&user.email) {
                return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
            }
            if let Some(doc) = &employee.name.document_id {
                if d.employees.values().any(|e| e.name.document_id.as_ref() == Some(doc)) {
                    return Err(StoreError::Conflict("document_id already registered".to_string()));
                }
            }
            employee.clearance_code = ClearanceCode::for_new_employee(d.employees.is_empty());
            upsert(&mut d.users, user.clone());
            upsert(&mut d.employees, employee.clone());
            Ok(employee)
        })
    }

    async fn list_clients(&self, tenant_id: TenantId) -> StoreResult<Vec<Client>> {
        self.read(tenant_id, |d| d.clients.values().cloned().collect())
    }

    async fn get_client(&self, tenant_id: TenantId, id: ClientId) -> StoreResult<Option<Client>> {
        self.read(tenant_id, |d| d.clients.get(&id).cloned())
    }

    async fn client_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<Client>> {
        self.read(tenant_id, |d| d.clients.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn update_client(&self, tenant_id: TenantId, client: &Client) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            if !d.clients.contains_key(&client.id) {
                return Err(StoreError::NotFound("client"));
            }
            if let Some(doc) = &client.name.document_id {
                if d
                    .clients
                    .values()
                    .any(|c| c.id != client.id && c.name.document_id.as_ref() == Some(doc))
                {
                    return Err(StoreError::Conflict("document_id already registered".to_string()));
                }
            }
            upsert(&mut d.clients, client.clone());
            Ok(())
        })
    }

    async fn delete_client(&self, tenant_id: TenantId, id: ClientId) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            let client = d.clients.remove(&id).ok_or(StoreError::NotFound("client"))?;
            d.users.remove(&client.user_id);
            d.drop_address_of(AddressOwner::Client(id));
            d.carts.retain(|_, c| c.client_id != id);
            d.transactions
                .values_mut()
                .filter(|t| t.client_id == Some(id))
                .for_each(|t| t.client_id = None);
            Ok(())
        })
    }

    async fn list_employees(&self, tenant_id: TenantId) -> StoreResult<Vec<Employee>> {
        self.read(tenant_id, |d| d.employees.values().cloned().collect())
    }

    async fn get_employee(&self, tenant_id: TenantId, id: EmployeeId) -> StoreResult<Option<Employee>> {
        self.read(tenant_id, |d| d.employees.get(&id).cloned())
    }

    async fn employee_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<Employee>> {
        self.read(tenant_id, |d| d.employees.values().find(|e| e.user_id == user_id).cloned())
    }

    async fn update_employee(&self, tenant_id: TenantId, employee: &Employee) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            if !d.employees.contains_key(&employee.id) {
                return Err(StoreError::NotFound("employee"));
            }
            if let Some(doc) = &employee.name.document_id {
                if d
                    .employees
                    .values()
                    .any(|e| e.id != employee.id && e.name.document_id.as_ref() == Some(doc))
                {
                    return Err(StoreError::Conflict("document_id already registered".to_string()));
                }
            }
            upsert(&mut d.employees, employee.clone());
            Ok(())
        })
    }

    async fn delete_employee(&self, tenant_id: TenantId, id: EmployeeId) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            let employee = d.employees.remove(&id).ok_or(StoreError::NotFound("employee"))?;
            d.users.remove(&employee.user_id);
            d.drop_address_of(AddressOwner::Employee(id));
            Ok(())
        })
    }

    async fn address_of(&self, tenant_id: TenantId, owner: AddressOwner) -> StoreResult<Option<Address>> {
        self.read(tenant_id, |d| d.addresses.values().find(|a| a.owner == owner).cloned())
    }

    async fn save_address(&self, tenant_id: TenantId, address: &Address) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            if !d.owner_exists(address.owner) {
                return Err(StoreError::NotFound("address owner"));
            }
            d.drop_address_of(address.owner);
            upsert(&mut d.addresses, address.clone());
            Ok(())
        })
    }

    async fn cart_for(&self, tenant_id: TenantId, client_id: ClientId) -> StoreResult<Cart> {
        self.read(tenant_id, |d| d.carts.values().find(|c| c.client_id == client_id).cloned())?
            .ok_or(StoreError::NotFound("cart"))
    }

    async fn save_cart(&self, tenant_id: TenantId, cart: &Cart) -> StoreResult<()> {
        self.write(tenant_id, |d| {
            if !d.carts.contains_key(&cart.id) {
                return Err(StoreError::NotFound("cart"));
            }
            for item in cart.items() {
                d.require_product(item.product_id)?;
            }
            upsert(&mut d.carts, cart.clone());
            Ok(())
        })
    }

    async fn commit_transaction(&self, tenant_id: TenantId, commit: LedgerCommit) -> StoreResult<Transaction> {
        let LedgerCommit {
            transaction,
            payments,
            consumed_cart,
        } = commit;

        self.write(tenant_id, |d| {
            if d.transactions.contains_key(&transaction.id) {
                return Err(StoreError::Conflict(format!(
                    "transaction {} already recorded",
                    transaction.id
                )));
            }
            if let Some(client_id) = transaction.client_id {
                if !d.clients.contains_key(&client_id) {
                    return Err(StoreError::NotFound("client"));
                }
            }
            for item in transaction.items() {
                d.require_product(item.product_id)?;
            }
            if payments.iter().any(|p| p.transaction_id != transaction.id) {
                return Err(DomainError::invariant("payment belongs to another transaction").into());
            }
            if let Some(cart) = &consumed_cart {
                let stored = d.carts.get(&cart.id).ok_or(StoreError::NotFound("cart"))?;
                if stored.items() != cart.items() {
                    return Err(StoreError::Conflict("cart changed during checkout".to_string()));
                }
            }

            let plan = InventoryAdjuster::plan(&transaction.stock_movements(), |p| d.stock_of(p))?;
            d.apply_plan(&plan, Utc::now())?;

            if let Some(cart) = consumed_cart {
                if let Some(stored) = d.carts.get_mut(&cart.id) {
                    stored.clear();
                }
            }
            for payment in payments {
                d.payments.insert(payment.id, payment);
            }
            upsert(&mut d.transactions, transaction.clone());
            Ok(transaction)
        })
    }

    async fn void_transaction(&self, tenant_id: TenantId, id: TransactionId) -> StoreResult<Transaction> {
        self.write(tenant_id, |d| {
            let mut transaction = d
                .transactions
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound("transaction"))?;
            let movements = transaction.void()?;
            let plan = InventoryAdjuster::plan_reversal(&movements, |p| d.stock_of(p))?;
            d.apply_plan(&plan, Utc::now())?;
            d.transactions.insert(id, transaction.clone());
            Ok(transaction)
        })
    }

    async fn list_transactions(&self, tenant_id: TenantId) -> StoreResult<Vec<Transaction>> {
        self.read(tenant_id, |d| d.transactions.values().cloned().collect())
    }

    async fn get_transaction(&self, tenant_id: TenantId, id: TransactionId) -> StoreResult<Option<Transaction>> {
        self.read(tenant_id, |d| d.transactions.get(&id).cloned())
    }

    async fn list_payments(&self, tenant_id: TenantId) -> StoreResult<Vec<Payment>> {
        self.read(tenant_id, |d| d.payments.values().cloned().collect())
    }

    async fn payments_for(&self, tenant_id: TenantId, transaction_id: TransactionId) -> StoreResult<Vec<Payment>> {
        self.read(tenant_id, |d| {
            d.payments
                .values()
                .filter(|p| p.transaction_id == transaction_id)
                .cloned()
                .collect()
        })
    }
}
