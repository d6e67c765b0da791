use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use rocktools_auth::PasswordError;
use rocktools_core::DomainError;
use rocktools_infra::{CheckoutError, IdentityError, StoreError};

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized"),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Domain(e) => domain_error_to_response(e),
        StoreError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Database(msg) => {
            tracing::error!(error = %msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn identity_error_to_response(err: IdentityError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        IdentityError::Store(e) => store_error_to_response(e),
        IdentityError::Password(PasswordError::TooShort(_)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", message)
        }
        IdentityError::Password(PasswordError::MalformedHash) | IdentityError::Token(_) => {
            tracing::error!(error = %message, "credential failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "auth_error", message)
        }
        IdentityError::AlreadyRegistered => json_error(StatusCode::CONFLICT, "already_registered", message),
        IdentityError::UnknownEmail => json_error(StatusCode::NOT_FOUND, "unknown_email", message),
        IdentityError::WrongPassword => json_error(StatusCode::UNAUTHORIZED, "wrong_password", message),
        IdentityError::MissingProfile => json_error(StatusCode::NOT_FOUND, "not_found", message),
    }
}

pub fn checkout_error_to_response(err: CheckoutError) -> axum::response::Response {
    match err {
        CheckoutError::Store(e) => store_error_to_response(e),
        CheckoutError::Payment(e) => json_error(StatusCode::BAD_GATEWAY, "payment_gateway_error", e.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_is_unprocessable() {
        let res = store_error_to_response(StoreError::Domain(DomainError::invariant("Not enough stock")));
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn gateway_failures_are_bad_gateway() {
        let res = checkout_error_to_response(CheckoutError::Payment(rocktools_infra::PaymentError::Unavailable));
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn login_failures_keep_their_status() {
        assert_eq!(
            identity_error_to_response(IdentityError::WrongPassword).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            identity_error_to_response(IdentityError::UnknownEmail).status(),
            StatusCode::NOT_FOUND
        );
    }
}
