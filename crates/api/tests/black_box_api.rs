use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use rocktools_auth::{JwtClaims, Role};
use rocktools_core::{TenantId, UserId};
use rocktools_infra::AppConfig;
use serde_json::{Value, json};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store and gateway, ephemeral port.
        let config = AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            password_hash_iterations: 1_000,
            ..AppConfig::default()
        };
        let app = rocktools_api::app::build_app(config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn register(&self, tenant: TenantId, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/register_user"))
            .header("x-tenant-id", tenant.to_string())
            .json(&json!({
                "email": email,
                "password": "hunter22",
                "first_name": "Ada",
                "last_name": "Lovelace",
            }))
            .send()
            .await
            .unwrap()
    }

    /// Register and return the bearer token.
    async fn token(&self, tenant: TenantId, email: &str) -> String {
        let res = self.register(tenant, email).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    async fn add_record(&self, token: &str, table: &str, body: Value) -> Value {
        let res = self.post(&format!("/add_record/{table}"), token, body).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["record"].clone()
    }

    /// Department "Chisels" with one product in stock; returns the product id.
    async fn stock_catalog(&self, admin: &str, quantity: i64) -> String {
        let department = self.add_record(admin, "departments", json!({ "name": "Chisels" })).await;
        let product = self
            .add_record(
                admin,
                "products",
                json!({
                    "department_id": department["id"],
                    "description": "Bevel edge chisel",
                    "brand": "Rock",
                    "website_url": "https://rocktools.example/chisel",
                    "image_url": "chisel.png",
                    "price": "12.50",
                    "cost": "6.00",
                    "stripe_price_code": "price_chisel",
                }),
            )
            .await;
        let product_id = product["id"].as_str().unwrap().to_string();
        self.add_record(admin, "inventory", json!({ "product_id": product_id, "quantity": quantity }))
            .await;
        product_id
    }

    async fn stock_of(&self, admin: &str, product_id: &str) -> i64 {
        let res = self.get("/employees?table=inventory", admin).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["rows"]
            .as_array()
            .unwrap()
            .iter()
            .find(|row| row["product_id"] == product_id)
            .map(|row| row["quantity"].as_i64().unwrap())
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        tenant_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.client.get(srv.url("/cart")).bearer_auth("not-a-jwt").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn storefront_requires_a_tenant_header() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/departments")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(tenant_id, vec![Role::CLIENT]);

    let res = srv.get("/whoami", &token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "client"));
}

#[tokio::test]
async fn register_then_login() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();

    let res = srv.register(tenant, "ada@example.com").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let again = srv.register(tenant, "ada@example.com").await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let login = |password: &'static str, email: &'static str| {
        srv.client
            .post(srv.url("/login"))
            .header("x-tenant-id", tenant.to_string())
            .json(&json!({ "email": email, "password": password }))
            .send()
    };

    let ok = login("hunter22", "ada@example.com").await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["kind"], "client");

    let wrong = login("nope", "ada@example.com").await.unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let unknown = login("hunter22", "nobody@example.com").await.unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shopping_and_checkout_flow() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let admin = srv.token(tenant, "boss@rocktools.com").await;
    let product_id = srv.stock_catalog(&admin, 5).await;
    let shopper = srv.token(tenant, "ada@example.com").await;

    let page: Value = srv
        .client
        .get(srv.url("/department/chisels"))
        .header("x-tenant-id", tenant.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["products"][0]["id"], product_id.as_str());
    assert_eq!(page["products"][0]["quantity"], 5);

    let res = srv
        .post(&format!("/add_to_cart/chisels/{product_id}"), &shopper, json!({ "quantity": 2 }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let cart: Value = res.json().await.unwrap();
    assert_eq!(cart["items"][0]["quantity"], 2);

    let res = srv.post("/create-checkout-session", &shopper, json!({})).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let outcome: Value = res.json().await.unwrap();
    assert!(outcome["session_id"].as_str().unwrap().starts_with("cs_test_"));

    let cart: Value = srv.get("/cart", &shopper).await.json().await.unwrap();
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(srv.stock_of(&admin, &product_id).await, 3);

    let tx_id = outcome["transaction_id"].as_str().unwrap();
    let record: Value = srv
        .get(&format!("/update_record/transactions/{tx_id}"), &admin)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(record["record"]["payments"][0]["payment_type"], "credit_card");
}

#[tokio::test]
async fn cart_rejects_bad_quantities() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let admin = srv.token(tenant, "boss@rocktools.com").await;
    let product_id = srv.stock_catalog(&admin, 1).await;
    let shopper = srv.token(tenant, "ada@example.com").await;
    let path = format!("/add_to_cart/chisels/{product_id}");

    let res = srv.post(&path, &shopper, json!({ "quantity": 0 })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.post(&path, &shopper, json!({ "quantity": 2 })).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Insufficient stock available.");

    let res = srv.post("/create-checkout-session", &shopper, json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn back_office_is_gated_by_clearance() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let admin = srv.token(tenant, "boss@rocktools.com").await;
    let clerk = srv.token(tenant, "clerk@rocktools.com").await;
    let shopper = srv.token(tenant, "ada@example.com").await;

    let res = srv.get("/employees", &shopper).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("/employees", &clerk).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Access Denied: Your account is not activated");

    // Activate the clerk with a non-admin code.
    let staff: Value = srv.get("/employees?table=employees", &admin).await.json().await.unwrap();
    let clerk_row = staff["rows"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["clearance_code"] == "00")
        .unwrap()
        .clone();
    let res = srv
        .post(
            &format!("/update_record/employees/{}", clerk_row["id"].as_str().unwrap()),
            &admin,
            json!({
                "action": "update",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "job_title": "Clerk",
                "clearance_code": "10",
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.get("/employees", &clerk).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["table"], "transactions");

    let res = srv.post("/add_record/departments", &clerk, json!({ "name": "Saws" })).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = srv
        .post(
            &format!("/update_record/employees/{}", clerk_row["id"].as_str().unwrap()),
            &clerk,
            json!({ "action": "cancel" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Access Denied: Only Admins can update clearance levels");
}

#[tokio::test]
async fn manual_ledger_entries_move_stock_and_void_reverses() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let admin = srv.token(tenant, "boss@rocktools.com").await;
    let product_id = srv.stock_catalog(&admin, 2).await;

    let restock = srv
        .add_record(
            &admin,
            "transactions",
            json!({
                "product_id": product_id,
                "transaction_type": "buy",
                "quantity": 4,
                "price": "6.00",
                "payment_method": "bank_transfer",
            }),
        )
        .await;
    assert_eq!(srv.stock_of(&admin, &product_id).await, 6);

    let res = srv
        .post(
            "/add_record/transactions",
            &admin,
            json!({
                "product_id": product_id,
                "transaction_type": "sell",
                "quantity": 7,
                "price": "12.50",
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(srv.stock_of(&admin, &product_id).await, 6);

    let tx_id = restock["id"].as_str().unwrap();
    let res = srv.post(&format!("/transactions/{tx_id}/void"), &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(srv.stock_of(&admin, &product_id).await, 2);

    let res = srv.post(&format!("/transactions/{tx_id}/void"), &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv
        .post(
            &format!("/update_record/transactions/{tx_id}"),
            &admin,
            json!({ "action": "update", "quantity": 1 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn ledger_prices_are_rounded_and_range_checked() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let admin = srv.token(tenant, "boss@rocktools.com").await;
    let product_id = srv.stock_catalog(&admin, 2).await;

    let restock = srv
        .add_record(
            &admin,
            "transactions",
            json!({
                "product_id": product_id,
                "transaction_type": "buy",
                "quantity": 1,
                "price": "10.005",
            }),
        )
        .await;
    assert_eq!(restock["items"][0]["price"], "10.01");
    assert_eq!(restock["total_amount"], "10.01");
    assert_eq!(srv.stock_of(&admin, &product_id).await, 3);

    for (price, quantity) in [("79228162514264337593543950335", 2), ("60000000.00", 2)] {
        let res = srv
            .post(
                "/add_record/transactions",
                &admin,
                json!({
                    "product_id": product_id,
                    "transaction_type": "buy",
                    "quantity": quantity,
                    "price": price,
                }),
            )
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(srv.stock_of(&admin, &product_id).await, 3);
}

#[tokio::test]
async fn tenants_are_isolated() {
    let srv = TestServer::spawn().await;
    let acme = TenantId::new();
    let globex = TenantId::new();

    let acme_admin = srv.token(acme, "boss@rocktools.com").await;
    srv.stock_catalog(&acme_admin, 3).await;

    // Same email registers independently in another tenant, and is its first (admin) employee.
    let globex_admin = srv.token(globex, "boss@rocktools.com").await;
    let body: Value = srv
        .get("/employees?table=products", &globex_admin)
        .await
        .json()
        .await
        .unwrap();
    assert!(body["rows"].as_array().unwrap().is_empty());

    let departments: Value = srv
        .client
        .get(srv.url("/departments"))
        .header("x-tenant-id", globex.to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(departments.as_array().unwrap().is_empty());
}
