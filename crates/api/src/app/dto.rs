use serde::{Deserialize, Serialize};
use serde_json::Value;

use rocktools_core::Money;
use rocktools_infra::Registration;
use rocktools_parties::ClientId;
use rocktools_products::ProductId;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub document_id: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(body: RegisterRequest) -> Self {
        Registration {
            email: body.email,
            password: body.password,
            first_name: body.first_name,
            last_name: body.last_name,
            document_id: body.document_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

/// `table` as a query string (GET) or a JSON body (POST).
#[derive(Debug, Default, Deserialize)]
pub struct TableRequest {
    #[serde(default)]
    pub table: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Update,
    Delete,
    Cancel,
}

/// Back-office edit: an action plus the table-specific fields.
#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    pub action: RecordAction,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentRecord {
    pub name: String,
}

/// Client or employee created from the back office.
#[derive(Debug, Deserialize)]
pub struct AccountRecord {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub clearance_code: Option<String>,
}

impl AccountRecord {
    pub fn registration(&self) -> Registration {
        Registration {
            email: self.email.clone(),
            password: self.password.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            document_id: self.document_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClientUpdate {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub document_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmployeeUpdate {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub job_title: String,
    pub clearance_code: String,
}

/// Single-line ledger entry keyed in by staff.
#[derive(Debug, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub client_id: Option<ClientId>,
    pub product_id: ProductId,
    pub transaction_type: String,
    pub quantity: i64,
    pub price: Money,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

fn default_payment_method() -> String {
    "cash".to_string()
}

#[derive(Debug, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct InventoryUpdate {
    pub quantity: i64,
}

/// Tabular listing returned by the back-office endpoints.
#[derive(Debug, Serialize)]
pub struct RecordTableResponse {
    pub table: &'static str,
    pub title: &'static str,
    pub primary_key: &'static str,
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
}

impl RecordTableResponse {
    /// Columns are taken from the first row's keys.
    pub fn new(table: &'static str, title: &'static str, rows: Vec<Value>) -> Self {
        let columns = rows
            .first()
            .and_then(Value::as_object)
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            table,
            title,
            primary_key: "id",
            columns,
            rows,
        }
    }
}
