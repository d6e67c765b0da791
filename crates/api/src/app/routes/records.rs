//! Back-office record management.
//!
//! Staff browse and edit the tenant's tables through one generic surface:
//! list a table, add a row, fetch a row, then update, delete or cancel.
//! Clearance is checked per request against the employee's current code.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use rocktools_auth::{AccountKind, ClearanceCode, Permission};
use rocktools_core::DomainError;
use rocktools_infra::{LedgerCommit, RetailStore};
use rocktools_parties::PersonName;
use rocktools_products::{Department, DepartmentId, Product, ProductDetails, ProductId};
use rocktools_sales::{Payment, PaymentId, PaymentType, Transaction, TransactionId, TransactionItem, TransactionType};

use crate::app::routes::common::{CmdAuth, require_staff};
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

const ADMIN_ONLY: &str = "Access Denied: Only Admins can update clearance levels";

type Reply = Result<Response, Response>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTable {
    Employees,
    Departments,
    Products,
    Transactions,
    Clients,
    Inventory,
    Payments,
}

impl RecordTable {
    pub fn name(self) -> &'static str {
        match self {
            RecordTable::Employees => "employees",
            RecordTable::Departments => "departments",
            RecordTable::Products => "products",
            RecordTable::Transactions => "transactions",
            RecordTable::Clients => "clients",
            RecordTable::Inventory => "inventory",
            RecordTable::Payments => "payments",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            RecordTable::Employees => "Employees",
            RecordTable::Departments => "Departments",
            RecordTable::Products => "Products",
            RecordTable::Transactions => "Transactions",
            RecordTable::Clients => "Clients",
            RecordTable::Inventory => "Inventory",
            RecordTable::Payments => "Payments",
        }
    }

    /// Permission needed to change rows, and the message shown when it is missing.
    fn write_permission(self) -> (Permission, &'static str) {
        match self {
            RecordTable::Employees => (Permission::EMPLOYEES_WRITE, ADMIN_ONLY),
            _ => (Permission::RECORDS_WRITE, "Access Denied: You cannot modify records"),
        }
    }
}

impl FromStr for RecordTable {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "employees" => Ok(RecordTable::Employees),
            "departments" => Ok(RecordTable::Departments),
            "products" => Ok(RecordTable::Products),
            "transactions" => Ok(RecordTable::Transactions),
            "clients" => Ok(RecordTable::Clients),
            "inventory" => Ok(RecordTable::Inventory),
            "payments" => Ok(RecordTable::Payments),
            _ => Err(DomainError::not_found("table")),
        }
    }
}

/// GET /employees?table=... (defaults to transactions).
pub async fn list_records(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(req): Query<dto::TableRequest>,
) -> Response {
    list(&services, &tenant, &principal, req).await.unwrap_or_else(|e| e)
}

/// POST /employees with a `{table}` body.
pub async fn list_records_post(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(req): Json<dto::TableRequest>,
) -> Response {
    list(&services, &tenant, &principal, req).await.unwrap_or_else(|e| e)
}

pub async fn add_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(table): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    add(&services, &tenant, &principal, &table, body).await.unwrap_or_else(|e| e)
}

pub async fn get_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((table, id)): Path<(String, String)>,
) -> Response {
    fetch(&services, &tenant, &principal, &table, &id).await.unwrap_or_else(|e| e)
}

pub async fn update_record(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((table, id)): Path<(String, String)>,
    Json(body): Json<dto::UpdateRecordRequest>,
) -> Response {
    edit(&services, &tenant, &principal, &table, &id, body).await.unwrap_or_else(|e| e)
}

/// Void a ledger entry and put its stock back.
pub async fn void_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    void(&services, &tenant, &principal, &id).await.unwrap_or_else(|e| e)
}

async fn void(services: &AppServices, tenant: &TenantContext, principal: &PrincipalContext, id: &str) -> Reply {
    let (permission, denied) = RecordTable::Transactions.write_permission();
    authorize(services, tenant, principal, permission, denied).await?;
    let id: TransactionId = parse_id(id)?;
    let voided = services
        .store
        .void_transaction(tenant.tenant_id(), id)
        .await
        .map_err(errors::store_error_to_response)?;
    tracing::info!(transaction_id = %voided.id, "transaction voided");
    Ok(Json(voided).into_response())
}

async fn list(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    req: dto::TableRequest,
) -> Reply {
    let table = match req.table.as_deref() {
        Some(name) => parse_table(name)?,
        None => RecordTable::Transactions,
    };
    authorize(services, tenant, principal, Permission::RECORDS_READ, "Access Denied").await?;

    let t = tenant.tenant_id();
    let store = &services.store;
    let records = match table {
        RecordTable::Employees => rows(store.list_employees(t).await),
        RecordTable::Departments => rows(store.list_departments(t).await),
        RecordTable::Products => rows(store.list_products(t).await),
        RecordTable::Transactions => rows(store.list_transactions(t).await),
        RecordTable::Clients => rows(store.list_clients(t).await),
        RecordTable::Inventory => rows(store.list_inventory(t).await),
        RecordTable::Payments => rows(store.list_payments(t).await),
    }?;

    Ok(Json(dto::RecordTableResponse::new(table.name(), table.title(), records)).into_response())
}

async fn add(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    table: &str,
    body: Value,
) -> Reply {
    let table = parse_table(table)?;
    let (permission, denied) = table.write_permission();
    authorize(services, tenant, principal, permission, denied).await?;

    let t = tenant.tenant_id();
    let store = &services.store;
    let created = match table {
        RecordTable::Departments => {
            let rec: dto::DepartmentRecord = parse_body(body)?;
            let department = Department::create(DepartmentId::new(), &rec.name).map_err(errors::domain_error_to_response)?;
            store
                .save_department(t, &department)
                .await
                .map_err(errors::store_error_to_response)?;
            to_row(&department)?
        }
        RecordTable::Products => {
            let details: ProductDetails = parse_body(body)?;
            ensure_department(services, tenant, details.department_id).await?;
            let product = Product::create(ProductId::new(), details).map_err(errors::domain_error_to_response)?;
            store
                .save_product(t, &product)
                .await
                .map_err(errors::store_error_to_response)?;
            to_row(&product)?
        }
        RecordTable::Inventory => {
            let rec: dto::InventoryRecord = parse_body(body)?;
            found(
                store
                    .get_product(t, rec.product_id)
                    .await
                    .map_err(errors::store_error_to_response)?,
            )?;
            let inventory = store
                .recount_inventory(t, rec.product_id, rec.quantity)
                .await
                .map_err(errors::store_error_to_response)?;
            to_row(&inventory)?
        }
        RecordTable::Transactions => {
            let rec: dto::TransactionRecord = parse_body(body)?;
            let recorded = record_transaction(services, tenant, rec)
                .await
                .map_err(errors::store_error_to_response)?;
            to_row(&recorded)?
        }
        RecordTable::Clients | RecordTable::Employees => {
            let rec: dto::AccountRecord = parse_body(body)?;
            add_account(services, tenant, table, rec).await?
        }
        RecordTable::Payments => {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "payments are recorded with their transaction",
            ));
        }
    };

    tracing::info!(table = table.name(), "record added");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Record added successfully!",
            "record": created,
        })),
    )
        .into_response())
}

/// One-line ledger entry: the transaction, its payment and the stock change
/// commit together.
async fn record_transaction(
    services: &AppServices,
    tenant: &TenantContext,
    rec: dto::TransactionRecord,
) -> rocktools_infra::StoreResult<Transaction> {
    let transaction_type: TransactionType = rec.transaction_type.parse()?;
    let payment_type: PaymentType = rec.payment_method.parse()?;
    let now = Utc::now();

    let item = TransactionItem::new(rec.product_id, rec.quantity, rec.price)?;
    let transaction = Transaction::record(TransactionId::new(), rec.client_id, transaction_type, vec![item], now)?;
    let payment = Payment::record(
        PaymentId::new(),
        transaction.id,
        payment_type,
        transaction.total_amount(),
        None,
        now,
    )?;

    services
        .store
        .commit_transaction(tenant.tenant_id(), LedgerCommit::new(transaction).with_payment(payment))
        .await
}

async fn add_account(
    services: &AppServices,
    tenant: &TenantContext,
    table: RecordTable,
    rec: dto::AccountRecord,
) -> Result<Value, Response> {
    let expected = match table {
        RecordTable::Employees => AccountKind::Employee,
        _ => AccountKind::Client,
    };
    if services.identity.account_kind(&rec.email) != expected {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("email does not belong to the {} table", table.name()),
        ));
    }

    let t = tenant.tenant_id();
    let issued = services
        .identity
        .register(t, rec.registration())
        .await
        .map_err(errors::identity_error_to_response)?;

    if expected == AccountKind::Client {
        let client = found(
            services
                .store
                .client_by_user(t, issued.user_id)
                .await
                .map_err(errors::store_error_to_response)?,
        )?;
        return to_row(&client);
    }

    let mut employee = found(
        services
            .store
            .employee_by_user(t, issued.user_id)
            .await
            .map_err(errors::store_error_to_response)?,
    )?;
    if rec.job_title.is_some() || rec.clearance_code.is_some() {
        let clearance = match rec.clearance_code.as_deref() {
            Some(code) => ClearanceCode::parse(code).map_err(errors::domain_error_to_response)?,
            None => employee.clearance_code.clone(),
        };
        let job_title = rec.job_title.unwrap_or_else(|| employee.job_title.clone());
        let name = employee.name.clone();
        employee
            .update(name, &job_title, clearance)
            .map_err(errors::domain_error_to_response)?;
        services
            .store
            .update_employee(t, &employee)
            .await
            .map_err(errors::store_error_to_response)?;
    }
    to_row(&employee)
}

async fn fetch(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    table: &str,
    id: &str,
) -> Reply {
    let table = parse_table(table)?;
    match table {
        // Employee rows carry clearance codes.
        RecordTable::Employees => authorize(services, tenant, principal, Permission::EMPLOYEES_WRITE, ADMIN_ONLY).await?,
        _ => authorize(services, tenant, principal, Permission::RECORDS_READ, "Access Denied").await?,
    }

    let record = load_record(services, tenant, table, id).await?;
    Ok(Json(json!({
        "table": table.name(),
        "primary_key": "id",
        "record": record,
    }))
    .into_response())
}

async fn load_record(
    services: &AppServices,
    tenant: &TenantContext,
    table: RecordTable,
    id: &str,
) -> Result<Value, Response> {
    let t = tenant.tenant_id();
    let store = &services.store;
    match table {
        RecordTable::Employees => to_row(&found(db(store.get_employee(t, parse_id(id)?).await)?)?),
        RecordTable::Departments => to_row(&found(db(store.get_department(t, parse_id(id)?).await)?)?),
        RecordTable::Products => to_row(&found(db(store.get_product(t, parse_id(id)?).await)?)?),
        RecordTable::Clients => to_row(&found(db(store.get_client(t, parse_id(id)?).await)?)?),
        RecordTable::Inventory => to_row(&found(db(store.get_inventory(t, parse_id(id)?).await)?)?),
        RecordTable::Transactions => {
            let id: TransactionId = parse_id(id)?;
            let transaction = found(db(store.get_transaction(t, id).await)?)?;
            let payments = db(store.payments_for(t, id).await)?;
            let mut row = to_row(&transaction)?;
            if let Some(obj) = row.as_object_mut() {
                obj.insert("payments".to_string(), to_row(&payments)?);
            }
            Ok(row)
        }
        RecordTable::Payments => {
            let id: PaymentId = parse_id(id)?;
            let payments = db(store.list_payments(t).await)?;
            to_row(&found(payments.into_iter().find(|p| p.id == id))?)
        }
    }
}

async fn edit(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    table: &str,
    id: &str,
    req: dto::UpdateRecordRequest,
) -> Reply {
    let table = parse_table(table)?;
    let (permission, denied) = table.write_permission();
    authorize(services, tenant, principal, permission, denied).await?;

    match req.action {
        dto::RecordAction::Cancel => Ok(Json(json!({ "message": "Record Unchanged!" })).into_response()),
        dto::RecordAction::Delete => {
            delete_record(services, tenant, table, id).await?;
            tracing::info!(table = table.name(), id, "record deleted");
            Ok(Json(json!({ "message": "Record deleted successfully!" })).into_response())
        }
        dto::RecordAction::Update => {
            let fields = Value::Object(req.fields);
            let record = update_fields(services, tenant, table, id, fields).await?;
            tracing::info!(table = table.name(), id, "record updated");
            Ok(Json(json!({
                "message": "Record updated successfully!",
                "record": record,
            }))
            .into_response())
        }
    }
}

async fn delete_record(services: &AppServices, tenant: &TenantContext, table: RecordTable, id: &str) -> Result<(), Response> {
    let t = tenant.tenant_id();
    let store = &services.store;
    let result = match table {
        RecordTable::Employees => store.delete_employee(t, parse_id(id)?).await,
        RecordTable::Departments => store.delete_department(t, parse_id(id)?).await,
        RecordTable::Products => store.delete_product(t, parse_id(id)?).await,
        RecordTable::Clients => store.delete_client(t, parse_id(id)?).await,
        RecordTable::Inventory => store.delete_inventory(t, parse_id(id)?).await,
        // Ledger rows are never removed; deleting one voids it.
        RecordTable::Transactions => store.void_transaction(t, parse_id(id)?).await.map(|_| ()),
        RecordTable::Payments => {
            return Err(errors::json_error(
                StatusCode::CONFLICT,
                "conflict",
                "payments cannot be deleted, void the transaction instead",
            ));
        }
    };
    result.map_err(errors::store_error_to_response)
}

async fn update_fields(
    services: &AppServices,
    tenant: &TenantContext,
    table: RecordTable,
    id: &str,
    fields: Value,
) -> Result<Value, Response> {
    let t = tenant.tenant_id();
    let store = &services.store;
    match table {
        RecordTable::Departments => {
            let rec: dto::DepartmentRecord = parse_body(fields)?;
            let mut department = found(db(store.get_department(t, parse_id(id)?).await)?)?;
            department.rename(&rec.name).map_err(errors::domain_error_to_response)?;
            store
                .save_department(t, &department)
                .await
                .map_err(errors::store_error_to_response)?;
            to_row(&department)
        }
        RecordTable::Products => {
            let details: ProductDetails = parse_body(fields)?;
            ensure_department(services, tenant, details.department_id).await?;
            let mut product = found(db(store.get_product(t, parse_id(id)?).await)?)?;
            product.update(details).map_err(errors::domain_error_to_response)?;
            db(store.save_product(t, &product).await)?;
            to_row(&product)
        }
        RecordTable::Inventory => {
            let rec: dto::InventoryUpdate = parse_body(fields)?;
            let inventory = found(db(store.get_inventory(t, parse_id(id)?).await)?)?;
            let recounted = store
                .recount_inventory(t, inventory.product_id, rec.quantity)
                .await
                .map_err(errors::store_error_to_response)?;
            to_row(&recounted)
        }
        RecordTable::Clients => {
            let rec: dto::ClientUpdate = parse_body(fields)?;
            let mut client = found(db(store.get_client(t, parse_id(id)?).await)?)?;
            let name = PersonName::new(&rec.first_name, &rec.last_name, rec.document_id.as_deref())
                .map_err(errors::domain_error_to_response)?;
            client.rename(name).map_err(errors::domain_error_to_response)?;
            db(store.update_client(t, &client).await)?;
            to_row(&client)
        }
        RecordTable::Employees => {
            let rec: dto::EmployeeUpdate = parse_body(fields)?;
            let mut employee = found(db(store.get_employee(t, parse_id(id)?).await)?)?;
            let name = PersonName::new(&rec.first_name, &rec.last_name, rec.document_id.as_deref())
                .map_err(errors::domain_error_to_response)?;
            let clearance = ClearanceCode::parse(&rec.clearance_code).map_err(errors::domain_error_to_response)?;
            employee
                .update(name, &rec.job_title, clearance)
                .map_err(errors::domain_error_to_response)?;
            db(store.update_employee(t, &employee).await)?;
            to_row(&employee)
        }
        RecordTable::Transactions | RecordTable::Payments => Err(errors::json_error(
            StatusCode::CONFLICT,
            "conflict",
            "ledger entries cannot be edited, void the transaction instead",
        )),
    }
}

/// Staff guard plus the clearance check for `required`.
async fn authorize(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    required: Permission,
    denied: &'static str,
) -> Result<(), Response> {
    let employee = require_staff(services, tenant, principal).await?;
    let cmd = CmdAuth {
        inner: (),
        required: vec![required],
    };
    crate::authz::authorize_command(tenant, principal, &employee.clearance_code, &cmd).map_err(|e| {
        tracing::debug!(error = %e, employee_id = %employee.id, "back-office access denied");
        errors::json_error(StatusCode::FORBIDDEN, "forbidden", denied)
    })
}

async fn ensure_department(
    services: &AppServices,
    tenant: &TenantContext,
    department_id: Option<DepartmentId>,
) -> Result<(), Response> {
    let Some(id) = department_id else {
        return Ok(());
    };
    match services.store.get_department(tenant.tenant_id(), id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(errors::json_error(StatusCode::NOT_FOUND, "not_found", "department not found")),
        Err(e) => Err(errors::store_error_to_response(e)),
    }
}

fn parse_table(name: &str) -> Result<RecordTable, Response> {
    name.parse().map_err(errors::domain_error_to_response)
}

fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(errors::domain_error_to_response)
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, Response> {
    serde_json::from_value(body)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))
}

fn db<T>(result: rocktools_infra::StoreResult<T>) -> Result<T, Response> {
    result.map_err(errors::store_error_to_response)
}

fn found<T>(record: Option<T>) -> Result<T, Response> {
    record.ok_or_else(|| errors::json_error(StatusCode::NOT_FOUND, "not_found", "record not found"))
}

fn to_row<T: Serialize>(record: &T) -> Result<Value, Response> {
    serde_json::to_value(record).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize record");
        errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "serialization_error", e.to_string())
    })
}

fn rows<T: Serialize>(records: rocktools_infra::StoreResult<Vec<T>>) -> Result<Vec<Value>, Response> {
    records
        .map_err(errors::store_error_to_response)?
        .iter()
        .map(to_row)
        .collect()
}
