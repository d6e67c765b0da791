use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    response::IntoResponse,
};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub async fn list_departments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match services.storefront.departments(tenant.tenant_id()).await {
        Ok(departments) => Json(departments).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Department by name (case-insensitive) with its in-stock products.
pub async fn department_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(name): Path<String>,
) -> axum::response::Response {
    match services.storefront.department_page(tenant.tenant_id(), &name).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
