use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use rocktools_products::ProductId;

use crate::app::routes::common::require_client;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub async fn view_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let client = match require_client(&services, &tenant, &principal).await {
        Ok(c) => c,
        Err(res) => return res,
    };
    match services.storefront.view_cart(tenant.tenant_id(), client.id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// `department` only mirrors the storefront URL the client came from.
pub async fn add_to_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((_department, product_id)): Path<(String, String)>,
    Json(body): Json<dto::QuantityRequest>,
) -> axum::response::Response {
    let client = match require_client(&services, &tenant, &principal).await {
        Ok(c) => c,
        Err(res) => return res,
    };
    let product_id: ProductId = match product_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .storefront
        .add_to_cart(tenant.tenant_id(), client.id, product_id, body.quantity)
        .await
    {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn remove_from_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let client = match require_client(&services, &tenant, &principal).await {
        Ok(c) => c,
        Err(res) => return res,
    };
    let product_id: ProductId = match product_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .storefront
        .remove_from_cart(tenant.tenant_id(), client.id, product_id)
        .await
    {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Record the order and hand back the hosted payment page to redirect to.
pub async fn create_checkout_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let client = match require_client(&services, &tenant, &principal).await {
        Ok(c) => c,
        Err(res) => return res,
    };
    match services.checkout.checkout(tenant.tenant_id(), client.id).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => errors::checkout_error_to_response(e),
    }
}
