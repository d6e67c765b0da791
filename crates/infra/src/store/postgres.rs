//! Postgres-backed store implementation.
//!
//! Each unit of work is one SQL transaction. Ledger commits, voids and recounts
//! lock the affected inventory rows with `SELECT ... FOR UPDATE` (in product id
//! order) before the adjuster plans, so check-then-decrement cannot race. The
//! schema's `CHECK (quantity >= 0)` backs the adjuster's guard.
//!
//! ## Error Mapping
//!
//! | PostgreSQL error code | StoreError |
//! |-----------------------|------------|
//! | `23505` unique violation | `Conflict` |
//! | `23503` foreign key violation | `Conflict` |
//! | `23514` check violation | `Conflict` |
//! | anything else | `Database` |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row};
use tracing::instrument;
use uuid::Uuid;

use rocktools_auth::{AccountKind, ClearanceCode, User};
use rocktools_core::{DomainError, Money, TenantId, UserId};
use rocktools_inventory::{AdjustmentPlan, Inventory, InventoryAdjuster, InventoryId};
use rocktools_parties::{
    Address, AddressDetails, AddressId, AddressOwner, Client, ClientId, Employee, EmployeeId, PersonName,
};
use rocktools_products::{Department, DepartmentId, Product, ProductDetails, ProductId};
use rocktools_sales::{
    Cart, CartId, CartItem, Payment, PaymentId, Transaction, TransactionId, TransactionItem,
};

use super::{LedgerCommit, RetailStore, StockedProduct, StoreError, StoreResult};

type PgTx<'c> = sqlx::Transaction<'c, Postgres>;

const SCHEMA: &str = include_str!("../../../../migrations/0001_init.sql");

/// Postgres-backed [`RetailStore`].
///
/// Every query filters on `tenant_id` (and every foreign key includes it), so
/// cross-tenant access is impossible by construction.
#[derive(Debug, Clone)]
pub struct PostgresRetailStore {
    pool: Arc<PgPool>,
}

impl PostgresRetailStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema (idempotent).
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<PgTx<'static>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

async fn commit(tx: PgTx<'_>) -> StoreResult<()> {
    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| map_sqlx_error("decode_row", e))
}

fn money(row: &PgRow, name: &str) -> StoreResult<Money> {
    Ok(Money::new(col::<Decimal>(row, name)?))
}

// Row mapping

fn department_from_row(row: &PgRow) -> StoreResult<Department> {
    Ok(Department {
        id: DepartmentId::from_uuid(col(row, "id")?),
        name: col(row, "name")?,
    })
}

fn product_from_row(row: &PgRow) -> StoreResult<Product> {
    Ok(Product {
        id: ProductId::from_uuid(col(row, "id")?),
        details: ProductDetails {
            department_id: col::<Option<Uuid>>(row, "department_id")?.map(DepartmentId::from_uuid),
            description: col(row, "description")?,
            brand: col(row, "brand")?,
            website_url: col(row, "website_url")?,
            image_url: col(row, "image_url")?,
            price: money(row, "price")?,
            cost: money(row, "cost")?,
            product_family: col(row, "product_family")?,
            stripe_product_code: col(row, "stripe_product_code")?,
            stripe_price_code: col(row, "stripe_price_code")?,
        },
    })
}

fn inventory_from_row(row: &PgRow) -> StoreResult<Inventory> {
    Ok(Inventory::from_parts(
        InventoryId::from_uuid(col(row, "id")?),
        ProductId::from_uuid(col(row, "product_id")?),
        col(row, "quantity")?,
        col(row, "acquired_date")?,
        col(row, "last_updated")?,
    ))
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let kind = match col::<String>(row, "kind")?.as_str() {
        "client" => AccountKind::Client,
        "employee" => AccountKind::Employee,
        other => return Err(StoreError::Database(format!("unknown account kind '{other}'"))),
    };
    Ok(User {
        id: UserId::from_uuid(col(row, "id")?),
        email: col(row, "email")?,
        password_hash: col(row, "password_hash")?,
        kind,
    })
}

fn person_from_row(row: &PgRow) -> StoreResult<PersonName> {
    Ok(PersonName {
        first_name: col(row, "first_name")?,
        last_name: col(row, "last_name")?,
        document_id: col(row, "document_id")?,
    })
}

fn client_from_row(row: &PgRow) -> StoreResult<Client> {
    Ok(Client {
        id: ClientId::from_uuid(col(row, "id")?),
        user_id: UserId::from_uuid(col(row, "user_id")?),
        name: person_from_row(row)?,
        created_at: col(row, "created_at")?,
    })
}

fn employee_from_row(row: &PgRow) -> StoreResult<Employee> {
    Ok(Employee {
        id: EmployeeId::from_uuid(col(row, "id")?),
        user_id: UserId::from_uuid(col(row, "user_id")?),
        name: person_from_row(row)?,
        job_title: col(row, "job_title")?,
        clearance_code: ClearanceCode::parse(&col::<String>(row, "clearance_code")?)?,
        created_at: col(row, "created_at")?,
    })
}

fn address_from_row(row: &PgRow) -> StoreResult<Address> {
    let owner = match (
        col::<Option<Uuid>>(row, "client_id")?,
        col::<Option<Uuid>>(row, "employee_id")?,
    ) {
        (Some(c), None) => AddressOwner::Client(ClientId::from_uuid(c)),
        (None, Some(e)) => AddressOwner::Employee(EmployeeId::from_uuid(e)),
        _ => return Err(StoreError::Database("address without a single owner".to_string())),
    };
    Ok(Address {
        id: AddressId::from_uuid(col(row, "id")?),
        owner,
        details: AddressDetails {
            street: col(row, "street")?,
            number: col(row, "number")?,
            complement: col(row, "complement")?,
            city: col(row, "city")?,
            zip_code: col(row, "zip_code")?,
        },
    })
}

fn payment_from_row(row: &PgRow) -> StoreResult<Payment> {
    Ok(Payment {
        id: PaymentId::from_uuid(col(row, "id")?),
        transaction_id: TransactionId::from_uuid(col(row, "transaction_id")?),
        payment_type: col::<String>(row, "payment_type")?.parse()?,
        amount: money(row, "amount")?,
        processed_at: col(row, "processed_at")?,
        reference: col(row, "reference")?,
    })
}

fn item_from_row(row: &PgRow) -> StoreResult<TransactionItem> {
    Ok(TransactionItem {
        product_id: ProductId::from_uuid(col(row, "product_id")?),
        quantity: col(row, "quantity")?,
        price: money(row, "price")?,
    })
}

fn transaction_from_row(row: &PgRow, items: Vec<TransactionItem>) -> StoreResult<Transaction> {
    Ok(Transaction::from_parts(
        TransactionId::from_uuid(col(row, "id")?),
        col::<Option<Uuid>>(row, "client_id")?.map(ClientId::from_uuid),
        col::<String>(row, "transaction_type")?.parse()?,
        items,
        col(row, "transaction_date")?,
        col(row, "is_voided")?,
    )?)
}

fn cart_item_from_row(row: &PgRow) -> StoreResult<CartItem> {
    Ok(CartItem {
        product_id: ProductId::from_uuid(col(row, "product_id")?),
        quantity: col(row, "quantity")?,
        price: money(row, "price")?,
    })
}

// Unit-of-work helpers

async fn ensure_products_exist(tx: &mut PgTx<'_>, tenant: &Uuid, ids: &[Uuid]) -> StoreResult<()> {
    let found: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products WHERE tenant_id = $1 AND id = ANY($2)",
    )
    .bind(tenant)
    .bind(ids)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("ensure_products_exist", e))?;
    if found as usize != ids.len() {
        return Err(StoreError::NotFound("product"));
    }
    Ok(())
}

/// Lock the inventory rows of `ids` and return their quantities.
async fn lock_stock(
    tx: &mut PgTx<'_>,
    tenant: &Uuid,
    ids: &[Uuid],
) -> StoreResult<HashMap<ProductId, i64>> {
    let rows = sqlx::query(
        r#"
        SELECT product_id, quantity
        FROM inventory
        WHERE tenant_id = $1 AND product_id = ANY($2)
        ORDER BY product_id
        FOR UPDATE
        "#,
    )
    .bind(tenant)
    .bind(ids)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_stock", e))?;

    rows.iter()
        .map(|r| -> StoreResult<(ProductId, i64)> {
            Ok((ProductId::from_uuid(col(r, "product_id")?), col(r, "quantity")?))
        })
        .collect()
}

async fn apply_plan(
    tx: &mut PgTx<'_>,
    tenant: &Uuid,
    plan: &AdjustmentPlan,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    for change in plan.changes() {
        match change.before {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO inventory (tenant_id, id, product_id, quantity, acquired_date, last_updated)
                    VALUES ($1, $2, $3, $4, $5, $5)
                    "#,
                )
                .bind(tenant)
                .bind(*InventoryId::new().as_uuid())
                .bind(change.product_id.as_uuid())
                .bind(change.after)
                .bind(now)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("insert_inventory", e))?;
            }
            Some(before) => {
                let res = sqlx::query(
                    r#"
                    UPDATE inventory
                    SET quantity = $3, last_updated = $4
                    WHERE tenant_id = $1 AND product_id = $2 AND quantity = $5
                    "#,
                )
                .bind(tenant)
                .bind(change.product_id.as_uuid())
                .bind(change.after)
                .bind(now)
                .bind(before)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("update_inventory", e))?;
                if res.rows_affected() != 1 {
                    return Err(StoreError::Conflict(format!(
                        "stock for product {} changed concurrently",
                        change.product_id
                    )));
                }
            }
        }
    }
    Ok(())
}

async fn load_items(tx: &mut PgTx<'_>, tenant: &Uuid, id: &Uuid) -> StoreResult<Vec<TransactionItem>> {
    let rows = sqlx::query(
        "SELECT * FROM transaction_items WHERE tenant_id = $1 AND transaction_id = $2 ORDER BY line_no",
    )
    .bind(tenant)
    .bind(id)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_items", e))?;
    rows.iter().map(item_from_row).collect()
}

async fn load_cart_items(tx: &mut PgTx<'_>, tenant: &Uuid, cart_id: &Uuid) -> StoreResult<Vec<CartItem>> {
    let rows = sqlx::query(
        "SELECT * FROM cart_items WHERE tenant_id = $1 AND cart_id = $2 ORDER BY position",
    )
    .bind(tenant)
    .bind(cart_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_cart_items", e))?;
    rows.iter().map(cart_item_from_row).collect()
}

async fn insert_user(tx: &mut PgTx<'_>, tenant: &Uuid, user: &User) -> StoreResult<()> {
    let kind = match user.kind {
        AccountKind::Client => "client",
        AccountKind::Employee => "employee",
    };
    sqlx::query(
        "INSERT INTO users (tenant_id, id, email, password_hash, kind) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(tenant)
    .bind(user.id.as_uuid())
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(kind)
    .execute(&mut **tx)
    .await
    .map_err(|e| match map_sqlx_error("insert_user", e) {
        StoreError::Conflict(_) => StoreError::Conflict(format!("email {} already registered", user.email)),
        other => other,
    })?;
    Ok(())
}

fn product_uuids(movements: &[rocktools_inventory::StockMovement]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = movements.iter().map(|m| *m.product_id.as_uuid()).collect();
    ids.sort();
    ids.dedup();
    ids
}

#[async_trait]
impl RetailStore for PostgresRetailStore {
    async fn list_departments(&self, tenant_id: TenantId) -> StoreResult<Vec<Department>> {
        let rows = sqlx::query("SELECT * FROM departments WHERE tenant_id = $1 ORDER BY lower(name)")
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_departments", e))?;
        rows.iter().map(department_from_row).collect()
    }

    async fn get_department(&self, tenant_id: TenantId, id: DepartmentId) -> StoreResult<Option<Department>> {
        let row = sqlx::query("SELECT * FROM departments WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_department", e))?;
        row.as_ref().map(department_from_row).transpose()
    }

    async fn find_department(&self, tenant_id: TenantId, name: &str) -> StoreResult<Option<Department>> {
        let row = sqlx::query("SELECT * FROM departments WHERE tenant_id = $1 AND lower(name) = lower($2)")
            .bind(tenant_id.as_uuid())
            .bind(name.trim())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_department", e))?;
        row.as_ref().map(department_from_row).transpose()
    }

    async fn save_department(&self, tenant_id: TenantId, department: &Department) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO departments (tenant_id, id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(department.id.as_uuid())
        .bind(&department.name)
        .execute(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("save_department", e) {
            StoreError::Conflict(_) => {
                StoreError::Conflict(format!("department '{}' already exists", department.name))
            }
            other => other,
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_department(&self, tenant_id: TenantId, id: DepartmentId) -> StoreResult<()> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        sqlx::query("UPDATE products SET department_id = NULL WHERE tenant_id = $1 AND department_id = $2")
            .bind(t)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("detach_products", e))?;
        let res = sqlx::query("DELETE FROM departments WHERE tenant_id = $1 AND id = $2")
            .bind(t)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_department", e))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("department"));
        }
        commit(tx).await
    }

    async fn list_products(&self, tenant_id: TenantId) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query("SELECT * FROM products WHERE tenant_id = $1 ORDER BY id")
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn get_product(&self, tenant_id: TenantId, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn save_product(&self, tenant_id: TenantId, product: &Product) -> StoreResult<()> {
        if let Some(dep) = product.department_id() {
            if self.get_department(tenant_id, dep).await?.is_none() {
                return Err(StoreError::NotFound("department"));
            }
        }
        let d = &product.details;
        sqlx::query(
            r#"
            INSERT INTO products (
                tenant_id, id, department_id, description, brand, website_url, image_url,
                price, cost, product_family, stripe_product_code, stripe_price_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tenant_id, id) DO UPDATE SET
                department_id = EXCLUDED.department_id,
                description = EXCLUDED.description,
                brand = EXCLUDED.brand,
                website_url = EXCLUDED.website_url,
                image_url = EXCLUDED.image_url,
                price = EXCLUDED.price,
                cost = EXCLUDED.cost,
                product_family = EXCLUDED.product_family,
                stripe_product_code = EXCLUDED.stripe_product_code,
                stripe_price_code = EXCLUDED.stripe_price_code
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(product.id.as_uuid())
        .bind(d.department_id.map(Uuid::from))
        .bind(&d.description)
        .bind(&d.brand)
        .bind(&d.website_url)
        .bind(&d.image_url)
        .bind(d.price.amount())
        .bind(d.cost.amount())
        .bind(&d.product_family)
        .bind(&d.stripe_product_code)
        .bind(&d.stripe_price_code)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_product", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_product(&self, tenant_id: TenantId, id: ProductId) -> StoreResult<()> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        ensure_products_exist(&mut tx, t, &[*id.as_uuid()]).await?;
        let has_history: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM transaction_items WHERE tenant_id = $1 AND product_id = $2)",
        )
        .bind(t)
        .bind(id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("product_history", e))?;
        if has_history {
            return Err(StoreError::Conflict(
                "product has ledger history and cannot be deleted".to_string(),
            ));
        }
        // Inventory row and cart lines go with it (ON DELETE CASCADE).
        sqlx::query("DELETE FROM products WHERE tenant_id = $1 AND id = $2")
            .bind(t)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        commit(tx).await
    }

    async fn stocked_products(
        &self,
        tenant_id: TenantId,
        department_id: DepartmentId,
    ) -> StoreResult<Vec<StockedProduct>> {
        let rows = sqlx::query(
            r#"
            SELECT p.*, i.quantity
            FROM products p
            JOIN inventory i ON i.tenant_id = p.tenant_id AND i.product_id = p.id
            WHERE p.tenant_id = $1 AND p.department_id = $2 AND i.quantity > 0
            ORDER BY p.id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(department_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stocked_products", e))?;
        rows.iter()
            .map(|r| -> StoreResult<StockedProduct> {
                Ok(StockedProduct {
                    product: product_from_row(r)?,
                    quantity: col(r, "quantity")?,
                })
            })
            .collect()
    }

    async fn list_inventory(&self, tenant_id: TenantId) -> StoreResult<Vec<Inventory>> {
        let rows = sqlx::query("SELECT * FROM inventory WHERE tenant_id = $1 ORDER BY id")
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_inventory", e))?;
        rows.iter().map(inventory_from_row).collect()
    }

    async fn get_inventory(&self, tenant_id: TenantId, id: InventoryId) -> StoreResult<Option<Inventory>> {
        let row = sqlx::query("SELECT * FROM inventory WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_inventory", e))?;
        row.as_ref().map(inventory_from_row).transpose()
    }

    async fn inventory_for(&self, tenant_id: TenantId, product_id: ProductId) -> StoreResult<Option<Inventory>> {
        let row = sqlx::query("SELECT * FROM inventory WHERE tenant_id = $1 AND product_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(product_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("inventory_for", e))?;
        row.as_ref().map(inventory_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, product_id = %product_id), err)]
    async fn recount_inventory(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        counted: i64,
    ) -> StoreResult<Inventory> {
        let t = tenant_id.as_uuid();
        let ids = [*product_id.as_uuid()];
        let mut tx = self.begin().await?;
        ensure_products_exist(&mut tx, t, &ids).await?;
        let stock = lock_stock(&mut tx, t, &ids).await?;
        let plan = InventoryAdjuster::plan_recount(product_id, stock.get(&product_id).copied(), counted)?;
        apply_plan(&mut tx, t, &plan, Utc::now()).await?;

        let row = sqlx::query("SELECT * FROM inventory WHERE tenant_id = $1 AND product_id = $2")
            .bind(t)
            .bind(product_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_inventory", e))?;
        let inventory = inventory_from_row(&row)?;
        commit(tx).await?;
        Ok(inventory)
    }

    /// Removes the row outright; quantities only move through the adjuster.
    async fn delete_inventory(&self, tenant_id: TenantId, id: InventoryId) -> StoreResult<()> {
        let res = sqlx::query("DELETE FROM inventory WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_inventory", e))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("inventory"));
        }
        Ok(())
    }

    async fn find_user_by_email(&self, tenant_id: TenantId, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE tenant_id = $1 AND email = $2")
            .bind(tenant_id.as_uuid())
            .bind(email.trim().to_lowercase())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user(&self, tenant_id: TenantId, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, user, client), fields(tenant_id = %tenant_id), err)]
    async fn register_client(&self, tenant_id: TenantId, user: &User, client: &Client) -> StoreResult<Cart> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        insert_user(&mut tx, t, user).await?;
        sqlx::query(
            r#"
            INSERT INTO clients (tenant_id, id, user_id, first_name, last_name, document_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(t)
        .bind(client.id.as_uuid())
        .bind(client.user_id.as_uuid())
        .bind(&client.name.first_name)
        .bind(&client.name.last_name)
        .bind(&client.name.document_id)
        .bind(client.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_client", e))?;

        let cart = Cart::open(CartId::new(), client.id);
        sqlx::query("INSERT INTO user_carts (tenant_id, id, client_id) VALUES ($1, $2, $3)")
            .bind(t)
            .bind(cart.id.as_uuid())
            .bind(client.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_cart", e))?;
        commit(tx).await?;
        Ok(cart)
    }

    #[instrument(skip(self, user, employee), fields(tenant_id = %tenant_id), err)]
    async fn register_employee(
        &self,
        tenant_id: TenantId,
        user: &User,
        mut employee: Employee,
    ) -> StoreResult<Employee> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        // Serializes "first employee" decisions per tenant.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
            .bind(tenant_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("employee_lock", e))?;
        insert_user(&mut tx, t, user).await?;

        let first: bool = sqlx::query_scalar("SELECT NOT EXISTS (SELECT 1 FROM employees WHERE tenant_id = $1)")
            .bind(t)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_employees", e))?;
        employee.clearance_code = ClearanceCode::for_new_employee(first);

        sqlx::query(
            r#"
            INSERT INTO employees (
                tenant_id, id, user_id, first_name, last_name, document_id,
                job_title, clearance_code, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(t)
        .bind(employee.id.as_uuid())
        .bind(employee.user_id.as_uuid())
        .bind(&employee.name.first_name)
        .bind(&employee.name.last_name)
        .bind(&employee.name.document_id)
        .bind(&employee.job_title)
        .bind(employee.clearance_code.as_str())
        .bind(employee.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_employee", e))?;
        commit(tx).await?;
        Ok(employee)
    }

    async fn list_clients(&self, tenant_id: TenantId) -> StoreResult<Vec<Client>> {
        let rows = sqlx::query("SELECT * FROM clients WHERE tenant_id = $1 ORDER BY id")
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_clients", e))?;
        rows.iter().map(client_from_row).collect()
    }

    async fn get_client(&self, tenant_id: TenantId, id: ClientId) -> StoreResult<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_client", e))?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn client_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<Client>> {
        let row = sqlx::query("SELECT * FROM clients WHERE tenant_id = $1 AND user_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("client_by_user", e))?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn update_client(&self, tenant_id: TenantId, client: &Client) -> StoreResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE clients SET first_name = $3, last_name = $4, document_id = $5
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(client.id.as_uuid())
        .bind(&client.name.first_name)
        .bind(&client.name.last_name)
        .bind(&client.name.document_id)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_client", e))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("client"));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_client(&self, tenant_id: TenantId, id: ClientId) -> StoreResult<()> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        let user_id: Uuid = sqlx::query_scalar("SELECT user_id FROM clients WHERE tenant_id = $1 AND id = $2")
            .bind(t)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_client", e))?
            .ok_or(StoreError::NotFound("client"))?;
        sqlx::query("UPDATE transactions SET client_id = NULL WHERE tenant_id = $1 AND client_id = $2")
            .bind(t)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("detach_transactions", e))?;
        // Client, address, cart and cart lines cascade from the login.
        sqlx::query("DELETE FROM users WHERE tenant_id = $1 AND id = $2")
            .bind(t)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        commit(tx).await
    }

    async fn list_employees(&self, tenant_id: TenantId) -> StoreResult<Vec<Employee>> {
        let rows = sqlx::query("SELECT * FROM employees WHERE tenant_id = $1 ORDER BY id")
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_employees", e))?;
        rows.iter().map(employee_from_row).collect()
    }

    async fn get_employee(&self, tenant_id: TenantId, id: EmployeeId) -> StoreResult<Option<Employee>> {
        let row = sqlx::query("SELECT * FROM employees WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_employee", e))?;
        row.as_ref().map(employee_from_row).transpose()
    }

    async fn employee_by_user(&self, tenant_id: TenantId, user_id: UserId) -> StoreResult<Option<Employee>> {
        let row = sqlx::query("SELECT * FROM employees WHERE tenant_id = $1 AND user_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("employee_by_user", e))?;
        row.as_ref().map(employee_from_row).transpose()
    }

    async fn update_employee(&self, tenant_id: TenantId, employee: &Employee) -> StoreResult<()> {
        let res = sqlx::query(
            r#"
            UPDATE employees
            SET first_name = $3, last_name = $4, document_id = $5, job_title = $6, clearance_code = $7
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(employee.id.as_uuid())
        .bind(&employee.name.first_name)
        .bind(&employee.name.last_name)
        .bind(&employee.name.document_id)
        .bind(&employee.job_title)
        .bind(employee.clearance_code.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_employee", e))?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("employee"));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_employee(&self, tenant_id: TenantId, id: EmployeeId) -> StoreResult<()> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        let user_id: Uuid = sqlx::query_scalar("SELECT user_id FROM employees WHERE tenant_id = $1 AND id = $2")
            .bind(t)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("load_employee", e))?
            .ok_or(StoreError::NotFound("employee"))?;
        sqlx::query("DELETE FROM users WHERE tenant_id = $1 AND id = $2")
            .bind(t)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        commit(tx).await
    }

    async fn address_of(&self, tenant_id: TenantId, owner: AddressOwner) -> StoreResult<Option<Address>> {
        let (sql, owner_id) = match owner {
            AddressOwner::Client(id) => ("SELECT * FROM addresses WHERE tenant_id = $1 AND client_id = $2", *id.as_uuid()),
            AddressOwner::Employee(id) => (
                "SELECT * FROM addresses WHERE tenant_id = $1 AND employee_id = $2",
                *id.as_uuid(),
            ),
        };
        let row = sqlx::query(sql)
            .bind(tenant_id.as_uuid())
            .bind(owner_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("address_of", e))?;
        row.as_ref().map(address_from_row).transpose()
    }

    async fn save_address(&self, tenant_id: TenantId, address: &Address) -> StoreResult<()> {
        let t = tenant_id.as_uuid();
        let (client_id, employee_id) = match address.owner {
            AddressOwner::Client(id) => (Some(*id.as_uuid()), None),
            AddressOwner::Employee(id) => (None, Some(*id.as_uuid())),
        };
        let owner_exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM clients WHERE tenant_id = $1 AND id = $2)
                OR EXISTS (SELECT 1 FROM employees WHERE tenant_id = $1 AND id = $3)
            "#,
        )
        .bind(t)
        .bind(client_id)
        .bind(employee_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("address_owner", e))?;
        if !owner_exists {
            return Err(StoreError::NotFound("address owner"));
        }

        let mut tx = self.begin().await?;
        sqlx::query(
            r#"
            DELETE FROM addresses
            WHERE tenant_id = $1 AND id <> $2
              AND (client_id IS NOT DISTINCT FROM $3 AND employee_id IS NOT DISTINCT FROM $4)
            "#,
        )
        .bind(t)
        .bind(address.id.as_uuid())
        .bind(client_id)
        .bind(employee_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("replace_address", e))?;

        let d = &address.details;
        sqlx::query(
            r#"
            INSERT INTO addresses (
                tenant_id, id, client_id, employee_id, street, number, complement, city, zip_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (tenant_id, id) DO UPDATE SET
                street = EXCLUDED.street,
                number = EXCLUDED.number,
                complement = EXCLUDED.complement,
                city = EXCLUDED.city,
                zip_code = EXCLUDED.zip_code
            "#,
        )
        .bind(t)
        .bind(address.id.as_uuid())
        .bind(client_id)
        .bind(employee_id)
        .bind(&d.street)
        .bind(&d.number)
        .bind(&d.complement)
        .bind(&d.city)
        .bind(&d.zip_code)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("save_address", e))?;
        commit(tx).await
    }

    async fn cart_for(&self, tenant_id: TenantId, client_id: ClientId) -> StoreResult<Cart> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        let cart_id: Uuid = sqlx::query_scalar("SELECT id FROM user_carts WHERE tenant_id = $1 AND client_id = $2")
            .bind(t)
            .bind(client_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("cart_for", e))?
            .ok_or(StoreError::NotFound("cart"))?;
        let items = load_cart_items(&mut tx, t, &cart_id).await?;
        commit(tx).await?;
        Ok(Cart::from_parts(CartId::from_uuid(cart_id), client_id, items))
    }

    async fn save_cart(&self, tenant_id: TenantId, cart: &Cart) -> StoreResult<()> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM user_carts WHERE tenant_id = $1 AND id = $2)",
        )
        .bind(t)
        .bind(cart.id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("cart_exists", e))?;
        if !exists {
            return Err(StoreError::NotFound("cart"));
        }
        let mut ids: Vec<Uuid> = cart.items().iter().map(|i| *i.product_id.as_uuid()).collect();
        ids.sort();
        ids.dedup();
        ensure_products_exist(&mut tx, t, &ids).await?;

        sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND cart_id = $2")
            .bind(t)
            .bind(cart.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_cart", e))?;
        for (position, item) in cart.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_items (tenant_id, cart_id, product_id, position, quantity, price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(t)
            .bind(cart.id.as_uuid())
            .bind(item.product_id.as_uuid())
            .bind(position as i32)
            .bind(item.quantity)
            .bind(item.price.amount())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_cart_item", e))?;
        }
        commit(tx).await
    }

    #[instrument(
        skip(self, commit_req),
        fields(
            tenant_id = %tenant_id,
            transaction_id = %commit_req.transaction.id,
            item_count = commit_req.transaction.items().len()
        ),
        err
    )]
    async fn commit_transaction(&self, tenant_id: TenantId, commit_req: LedgerCommit) -> StoreResult<Transaction> {
        let LedgerCommit {
            transaction,
            payments,
            consumed_cart,
        } = commit_req;
        let t = tenant_id.as_uuid();
        let now = Utc::now();

        if payments.iter().any(|p| p.transaction_id != transaction.id) {
            return Err(DomainError::invariant("payment belongs to another transaction").into());
        }

        let mut tx = self.begin().await?;

        if let Some(client_id) = transaction.client_id {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM clients WHERE tenant_id = $1 AND id = $2)",
            )
            .bind(t)
            .bind(client_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("client_exists", e))?;
            if !exists {
                return Err(StoreError::NotFound("client"));
            }
        }

        if let Some(cart) = &consumed_cart {
            let locked: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM user_carts WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
            )
            .bind(t)
            .bind(cart.id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_cart", e))?;
            if locked.is_none() {
                return Err(StoreError::NotFound("cart"));
            }
            if load_cart_items(&mut tx, t, cart.id.as_uuid()).await? != cart.items() {
                return Err(StoreError::Conflict("cart changed during checkout".to_string()));
            }
        }

        let movements = transaction.stock_movements();
        let ids = product_uuids(&movements);
        ensure_products_exist(&mut tx, t, &ids).await?;
        let stock = lock_stock(&mut tx, t, &ids).await?;
        let plan = InventoryAdjuster::plan(&movements, |p| stock.get(&p).copied())?;

        sqlx::query(
            r#"
            INSERT INTO transactions (
                tenant_id, id, client_id, transaction_type, total_amount, transaction_date, is_voided
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(t)
        .bind(transaction.id.as_uuid())
        .bind(transaction.client_id.map(Uuid::from))
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.total_amount().amount())
        .bind(transaction.transaction_date)
        .bind(transaction.is_voided())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        for (line_no, item) in transaction.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO transaction_items (tenant_id, transaction_id, line_no, product_id, quantity, price)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(t)
            .bind(transaction.id.as_uuid())
            .bind(line_no as i32)
            .bind(item.product_id.as_uuid())
            .bind(item.quantity)
            .bind(item.price.amount())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_transaction_item", e))?;
        }

        for payment in &payments {
            sqlx::query(
                r#"
                INSERT INTO payments (tenant_id, id, transaction_id, payment_type, amount, processed_at, reference)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(t)
            .bind(payment.id.as_uuid())
            .bind(payment.transaction_id.as_uuid())
            .bind(payment.payment_type.as_str())
            .bind(payment.amount.amount())
            .bind(payment.processed_at)
            .bind(&payment.reference)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_payment", e))?;
        }

        apply_plan(&mut tx, t, &plan, now).await?;

        if let Some(cart) = &consumed_cart {
            sqlx::query("DELETE FROM cart_items WHERE tenant_id = $1 AND cart_id = $2")
                .bind(t)
                .bind(cart.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("clear_cart", e))?;
        }

        commit(tx).await?;
        tracing::info!(total = %transaction.total_amount(), "transaction committed");
        Ok(transaction)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, transaction_id = %id), err)]
    async fn void_transaction(&self, tenant_id: TenantId, id: TransactionId) -> StoreResult<Transaction> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        let row = sqlx::query("SELECT * FROM transactions WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
            .bind(t)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_transaction", e))?
            .ok_or(StoreError::NotFound("transaction"))?;
        let items = load_items(&mut tx, t, id.as_uuid()).await?;
        let mut transaction = transaction_from_row(&row, items)?;

        let movements = transaction.void()?;
        let ids = product_uuids(&movements);
        let stock = lock_stock(&mut tx, t, &ids).await?;
        let plan = InventoryAdjuster::plan_reversal(&movements, |p| stock.get(&p).copied())?;
        apply_plan(&mut tx, t, &plan, Utc::now()).await?;

        sqlx::query("UPDATE transactions SET is_voided = TRUE WHERE tenant_id = $1 AND id = $2")
            .bind(t)
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("void_transaction", e))?;
        commit(tx).await?;
        Ok(transaction)
    }

    async fn list_transactions(&self, tenant_id: TenantId) -> StoreResult<Vec<Transaction>> {
        let t = tenant_id.as_uuid();
        let headers = sqlx::query("SELECT * FROM transactions WHERE tenant_id = $1 ORDER BY id")
            .bind(t)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_transactions", e))?;
        let item_rows = sqlx::query(
            "SELECT * FROM transaction_items WHERE tenant_id = $1 ORDER BY transaction_id, line_no",
        )
        .bind(t)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transaction_items", e))?;

        let mut items: HashMap<Uuid, Vec<TransactionItem>> = HashMap::new();
        for row in &item_rows {
            items
                .entry(col(row, "transaction_id")?)
                .or_default()
                .push(item_from_row(row)?);
        }
        headers
            .iter()
            .map(|row| -> StoreResult<Transaction> {
                let id: Uuid = col(row, "id")?;
                transaction_from_row(row, items.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn get_transaction(&self, tenant_id: TenantId, id: TransactionId) -> StoreResult<Option<Transaction>> {
        let t = tenant_id.as_uuid();
        let mut tx = self.begin().await?;
        let Some(row) = sqlx::query("SELECT * FROM transactions WHERE tenant_id = $1 AND id = $2")
            .bind(t)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("get_transaction", e))?
        else {
            return Ok(None);
        };
        let items = load_items(&mut tx, t, id.as_uuid()).await?;
        commit(tx).await?;
        transaction_from_row(&row, items).map(Some)
    }

    async fn list_payments(&self, tenant_id: TenantId) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query("SELECT * FROM payments WHERE tenant_id = $1 ORDER BY id")
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_payments", e))?;
        rows.iter().map(payment_from_row).collect()
    }

    async fn payments_for(&self, tenant_id: TenantId, transaction_id: TransactionId) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query("SELECT * FROM payments WHERE tenant_id = $1 AND transaction_id = $2 ORDER BY id")
            .bind(tenant_id.as_uuid())
            .bind(transaction_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("payments_for", e))?;
        rows.iter().map(payment_from_row).collect()
    }
}
