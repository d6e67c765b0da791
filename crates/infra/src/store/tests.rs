use chrono::Utc;

use rocktools_auth::{AccountKind, ClearanceCode, User};
use rocktools_core::{DomainError, Money, TenantId, UserId};
use rocktools_parties::{Address, AddressDetails, AddressId, AddressOwner, Client, ClientId, Employee, EmployeeId, PersonName};
use rocktools_products::{Department, DepartmentId, Product, ProductDetails, ProductId};
use rocktools_sales::{Cart, Transaction, TransactionId, TransactionItem, TransactionType};

use super::{InMemoryRetailStore, LedgerCommit, RetailStore, StoreError};

fn details(department_id: Option<DepartmentId>, cents: i64) -> ProductDetails {
    ProductDetails {
        department_id,
        description: "Claw hammer".to_string(),
        brand: "Rock".to_string(),
        website_url: "https://rocktools.example/hammer".to_string(),
        image_url: "hammer.png".to_string(),
        price: Money::from_cents(cents),
        cost: Money::from_cents(cents / 2),
        product_family: String::new(),
        stripe_product_code: None,
        stripe_price_code: Some("price_hammer".to_string()),
    }
}

async fn seed_product(store: &InMemoryRetailStore, tenant: TenantId, stock: Option<i64>) -> Product {
    let dep = Department::create(DepartmentId::new(), &format!("Tools {}", DepartmentId::new())).unwrap();
    store.save_department(tenant, &dep).await.unwrap();
    let product = Product::create(ProductId::new(), details(Some(dep.id), 1_000)).unwrap();
    store.save_product(tenant, &product).await.unwrap();
    if let Some(qty) = stock {
        store.recount_inventory(tenant, product.id, qty).await.unwrap();
    }
    product
}

async fn seed_client(store: &InMemoryRetailStore, tenant: TenantId, email: &str) -> (Client, Cart) {
    let user = User::create(UserId::new(), email, "hash".to_string(), AccountKind::Client).unwrap();
    let name = PersonName::new("Ada", "Lovelace", None).unwrap();
    let client = Client::register(ClientId::new(), user.id, name, Utc::now()).unwrap();
    let cart = store.register_client(tenant, &user, &client).await.unwrap();
    (client, cart)
}

fn sell(client: Option<ClientId>, product: &Product, qty: i64) -> Transaction {
    let item = TransactionItem::new(product.id, qty, product.price()).unwrap();
    Transaction::record(TransactionId::new(), client, TransactionType::Sell, vec![item], Utc::now()).unwrap()
}

async fn stock(store: &InMemoryRetailStore, tenant: TenantId, product: ProductId) -> Option<i64> {
    store
        .inventory_for(tenant, product)
        .await
        .unwrap()
        .map(|i| i.quantity())
}

#[tokio::test]
async fn sell_within_stock_decrements() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(5)).await;

    store
        .commit_transaction(tenant, LedgerCommit::new(sell(None, &product, 3)))
        .await
        .unwrap();

    assert_eq!(stock(&store, tenant, product.id).await, Some(2));
}

#[tokio::test]
async fn sell_beyond_stock_changes_nothing() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(2)).await;

    let err = store
        .commit_transaction(tenant, LedgerCommit::new(sell(None, &product, 3)))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Domain(DomainError::InvariantViolation(_))));
    assert!(err.to_string().contains("Not enough stock"));
    assert_eq!(stock(&store, tenant, product.id).await, Some(2));
    assert!(store.list_transactions(tenant).await.unwrap().is_empty());
}

#[tokio::test]
async fn buy_creates_missing_inventory_row() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, None).await;
    let item = TransactionItem::new(product.id, 4, Money::from_cents(500)).unwrap();
    let buy = Transaction::record(TransactionId::new(), None, TransactionType::Buy, vec![item], Utc::now()).unwrap();

    store.commit_transaction(tenant, LedgerCommit::new(buy)).await.unwrap();

    assert_eq!(stock(&store, tenant, product.id).await, Some(4));
}

#[tokio::test]
async fn consuming_commit_clears_the_cart() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(10)).await;
    let (client, mut cart) = seed_client(&store, tenant, "ada@example.com").await;
    cart.add(product.id, 2, product.price()).unwrap();
    store.save_cart(tenant, &cart).await.unwrap();

    let tx = cart.to_sell_transaction(TransactionId::new(), Utc::now()).unwrap();
    store
        .commit_transaction(tenant, LedgerCommit::new(tx).consuming(cart))
        .await
        .unwrap();

    assert!(store.cart_for(tenant, client.id).await.unwrap().is_empty());
    assert_eq!(stock(&store, tenant, product.id).await, Some(8));
}

#[tokio::test]
async fn stale_cart_is_rejected() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(10)).await;
    let (_, mut cart) = seed_client(&store, tenant, "ada@example.com").await;
    cart.add(product.id, 2, product.price()).unwrap();
    store.save_cart(tenant, &cart).await.unwrap();

    let snapshot = cart.clone();
    cart.add(product.id, 1, product.price()).unwrap();
    store.save_cart(tenant, &cart).await.unwrap();

    let tx = snapshot.to_sell_transaction(TransactionId::new(), Utc::now()).unwrap();
    let err = store
        .commit_transaction(tenant, LedgerCommit::new(tx).consuming(snapshot))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(stock(&store, tenant, product.id).await, Some(10));
}

#[tokio::test]
async fn void_reverses_stock_exactly_once() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(5)).await;
    let tx = store
        .commit_transaction(tenant, LedgerCommit::new(sell(None, &product, 3)))
        .await
        .unwrap();

    let voided = store.void_transaction(tenant, tx.id).await.unwrap();
    assert!(voided.is_voided());
    assert_eq!(stock(&store, tenant, product.id).await, Some(5));

    let err = store.void_transaction(tenant, tx.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));
    assert_eq!(stock(&store, tenant, product.id).await, Some(5));
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let store = InMemoryRetailStore::new();
    let a = TenantId::new();
    let b = TenantId::new();
    let product = seed_product(&store, a, Some(3)).await;

    assert!(store.get_product(b, product.id).await.unwrap().is_none());
    assert!(store.list_departments(b).await.unwrap().is_empty());

    let err = store
        .commit_transaction(b, LedgerCommit::new(sell(None, &product, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound("product")));
    assert_eq!(stock(&store, a, product.id).await, Some(3));
}

#[tokio::test]
async fn first_employee_is_admin_later_ones_unactivated() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();

    let mut codes = Vec::new();
    for email in ["boss@rocktools.com", "clerk@rocktools.com"] {
        let user = User::create(UserId::new(), email, "hash".to_string(), AccountKind::Employee).unwrap();
        let name = PersonName::new("Grace", "Hopper", None).unwrap();
        let employee = Employee::hire(
            EmployeeId::new(),
            user.id,
            name,
            "",
            ClearanceCode::unactivated(),
            Utc::now(),
        )
        .unwrap();
        codes.push(store.register_employee(tenant, &user, employee).await.unwrap().clearance_code);
    }

    assert!(codes[0].is_admin());
    assert!(!codes[1].is_activated());
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    seed_client(&store, tenant, "ada@example.com").await;

    let user = User::create(UserId::new(), "ADA@example.com", "hash".to_string(), AccountKind::Client).unwrap();
    let name = PersonName::new("Ada", "Byron", None).unwrap();
    let client = Client::register(ClientId::new(), user.id, name, Utc::now()).unwrap();
    let err = store.register_client(tenant, &user, &client).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn deleting_a_department_uncategorizes_its_products() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(1)).await;
    let dep = product.department_id().unwrap();

    store.delete_department(tenant, dep).await.unwrap();

    let reloaded = store.get_product(tenant, product.id).await.unwrap().unwrap();
    assert_eq!(reloaded.department_id(), None);
}

#[tokio::test]
async fn products_with_history_cannot_be_deleted() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(5)).await;
    store
        .commit_transaction(tenant, LedgerCommit::new(sell(None, &product, 1)))
        .await
        .unwrap();

    let err = store.delete_product(tenant, product.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn deleting_a_client_keeps_its_ledger() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(5)).await;
    let (client, _) = seed_client(&store, tenant, "ada@example.com").await;
    let address = Address::create(
        AddressId::new(),
        AddressOwner::Client(client.id),
        AddressDetails {
            street: "Main St".to_string(),
            number: "1".to_string(),
            complement: String::new(),
            city: "Springfield".to_string(),
            zip_code: "12345".to_string(),
        },
    )
    .unwrap();
    store.save_address(tenant, &address).await.unwrap();
    let tx = store
        .commit_transaction(tenant, LedgerCommit::new(sell(Some(client.id), &product, 1)))
        .await
        .unwrap();

    store.delete_client(tenant, client.id).await.unwrap();

    let kept = store.get_transaction(tenant, tx.id).await.unwrap().unwrap();
    assert_eq!(kept.client_id, None);
    assert!(store.address_of(tenant, AddressOwner::Client(client.id)).await.unwrap().is_none());
    assert!(store.find_user_by_email(tenant, "ada@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn recount_to_negative_is_rejected() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(5)).await;

    let err = store.recount_inventory(tenant, product.id, -1).await.unwrap_err();
    assert!(matches!(err, StoreError::Domain(DomainError::Validation(_))));
    assert_eq!(stock(&store, tenant, product.id).await, Some(5));
}

#[tokio::test]
async fn deleting_a_product_drops_it_from_carts_only() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let gone = seed_product(&store, tenant, Some(5)).await;
    let kept = seed_product(&store, tenant, Some(5)).await;
    let (client, mut cart) = seed_client(&store, tenant, "ada@example.com").await;
    cart.add(gone.id, 1, gone.price()).unwrap();
    cart.add(kept.id, 2, kept.price()).unwrap();
    store.save_cart(tenant, &cart).await.unwrap();
    let (other, _) = seed_client(&store, tenant, "grace@example.com").await;

    store.delete_product(tenant, gone.id).await.unwrap();

    let cart = store.cart_for(tenant, client.id).await.unwrap();
    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.quantity_of(kept.id), 2);
    assert!(store.cart_for(tenant, other.id).await.unwrap().is_empty());
    assert_eq!(stock(&store, tenant, gone.id).await, None);
}

#[tokio::test]
async fn deleted_inventory_row_is_recreated_by_the_next_recount() {
    let store = InMemoryRetailStore::new();
    let tenant = TenantId::new();
    let product = seed_product(&store, tenant, Some(5)).await;
    let row = store.inventory_for(tenant, product.id).await.unwrap().unwrap();

    store.delete_inventory(tenant, row.id).await.unwrap();
    assert_eq!(stock(&store, tenant, product.id).await, None);
    assert!(matches!(
        store.delete_inventory(tenant, row.id).await,
        Err(StoreError::NotFound("inventory"))
    ));

    store.recount_inventory(tenant, product.id, 3).await.unwrap();
    assert_eq!(stock(&store, tenant, product.id).await, Some(3));
}
