use axum::{
    Router,
    routing::{get, post},
};

pub mod cart;
pub mod common;
pub mod identity;
pub mod records;
pub mod storefront;
pub mod system;

/// Anonymous endpoints (tenant from the `x-tenant-id` header).
pub fn public_router() -> Router {
    Router::new()
        .route("/departments", get(storefront::list_departments))
        .route("/department/:name", get(storefront::department_page))
        .route("/register_user", post(identity::register_user))
        .route("/login", post(identity::login))
}

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/address", get(identity::get_address).post(identity::save_address))
        .route("/cart", get(cart::view_cart))
        .route("/add_to_cart/:department/:product_id", post(cart::add_to_cart))
        .route("/remove_from_cart/:product_id", post(cart::remove_from_cart))
        .route("/create-checkout-session", post(cart::create_checkout_session))
        .route("/employees", get(records::list_records).post(records::list_records_post))
        .route("/add_record/:table", post(records::add_record))
        .route(
            "/update_record/:table/:id",
            get(records::get_record).post(records::update_record),
        )
        .route("/transactions/:id/void", post(records::void_transaction))
}
