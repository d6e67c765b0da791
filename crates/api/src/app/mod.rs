//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store and gateway selection, shared services
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use rocktools_auth::{Hs256JwtValidator, JwtValidator};
use rocktools_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: AppConfig) -> anyhow::Result<Router> {
    let jwt: Arc<dyn JwtValidator> = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let services = Arc::new(services::build_services(&config, jwt.clone()).await?);
    Ok(app_router(services, jwt))
}

/// Router over already-built services.
pub fn app_router(services: Arc<services::AppServices>, jwt: Arc<dyn JwtValidator>) -> Router {
    let auth_state = middleware::AuthState { jwt };

    // Storefront and sign-in: anonymous, tenant from the header.
    let public = routes::public_router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn(middleware::tenant_header_middleware));

    // Everything else: bearer token carries tenant and principal.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(public)
        .merge(protected)
        .layer(ServiceBuilder::new())
}
