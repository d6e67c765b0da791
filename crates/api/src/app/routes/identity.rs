use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};

use rocktools_parties::AddressDetails;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub async fn register_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    match services.identity.register(tenant.tenant_id(), body.into()).await {
        Ok(issued) => (StatusCode::CREATED, Json(issued)).into_response(),
        Err(e) => errors::identity_error_to_response(e),
    }
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    match services
        .identity
        .login(tenant.tenant_id(), &body.email, &body.password)
        .await
    {
        Ok(issued) => Json(issued).into_response(),
        Err(e) => errors::identity_error_to_response(e),
    }
}

pub async fn get_address(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    match services.identity.address(tenant.tenant_id(), principal.user_id()).await {
        Ok(Some(address)) => Json(address).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "address not found"),
        Err(e) => errors::identity_error_to_response(e),
    }
}

pub async fn save_address(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<AddressDetails>,
) -> axum::response::Response {
    match services
        .identity
        .save_address(tenant.tenant_id(), principal.user_id(), body)
        .await
    {
        Ok(address) => Json(address).into_response(),
        Err(e) => errors::identity_error_to_response(e),
    }
}
