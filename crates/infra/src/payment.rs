//! Hosted checkout gateway.
//!
//! Checkout hands the client off to a hosted payment page. The gateway only
//! needs two calls: open a session for a set of priced lines, and expire a
//! session whose order could not be recorded.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// One line of a hosted checkout: a gateway price code and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLine {
    pub price_code: String,
    pub quantity: i64,
}

/// A hosted checkout session the client is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway request failed: {0}")]
    Transport(String),

    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("payment gateway unavailable")]
    Unavailable,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        lines: &[CheckoutLine],
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, PaymentError>;

    async fn expire_session(&self, session_id: &str) -> Result<(), PaymentError>;
}

/// Stripe Checkout over its form-encoded REST API.
#[derive(Debug, Clone)]
pub struct StripeCheckoutGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeCheckoutGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_base_url(secret_key, STRIPE_API_BASE)
    }

    pub fn with_base_url(secret_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, path: &str, form: &[(String, String)]) -> Result<reqwest::Response, PaymentError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected { status, message });
        }
        Ok(resp)
    }
}

/// Form fields for a payment-mode session (`line_items[i][price]` style).
fn session_form(lines: &[CheckoutLine], success_url: &str, cancel_url: &str) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), success_url.to_string()),
        ("cancel_url".to_string(), cancel_url.to_string()),
    ];
    for (i, line) in lines.iter().enumerate() {
        form.push((format!("line_items[{i}][price]"), line.price_code.clone()));
        form.push((format!("line_items[{i}][quantity]"), line.quantity.to_string()));
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeCheckoutGateway {
    #[instrument(skip(self, lines), fields(line_count = lines.len()), err)]
    async fn create_checkout_session(
        &self,
        lines: &[CheckoutLine],
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let form = session_form(lines, success_url, cancel_url);
        let session: CheckoutSession = self
            .post("/checkout/sessions", &form)
            .await?
            .json()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        info!(session_id = %session.id, "checkout session created");
        Ok(session)
    }

    #[instrument(skip(self), err)]
    async fn expire_session(&self, session_id: &str) -> Result<(), PaymentError> {
        self.post(&format!("/checkout/sessions/{session_id}/expire"), &[])
            .await?;
        Ok(())
    }
}

/// Records sessions instead of calling out. Used for dev and tests.
#[derive(Debug, Default)]
pub struct InMemoryPaymentGateway {
    state: Mutex<GatewayState>,
}

#[derive(Debug, Default)]
struct GatewayState {
    sessions: Vec<(CheckoutSession, Vec<CheckoutLine>)>,
    expired: Vec<String>,
    failing: bool,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following session request fail with [`PaymentError::Unavailable`].
    pub fn fail_requests(&self, failing: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.failing = failing;
        }
    }

    pub fn sessions(&self) -> Vec<(CheckoutSession, Vec<CheckoutLine>)> {
        self.state
            .lock()
            .map(|s| s.sessions.clone())
            .unwrap_or_default()
    }

    pub fn expired(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.expired.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_checkout_session(
        &self,
        lines: &[CheckoutLine],
        success_url: &str,
        _cancel_url: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut state = self.state.lock().map_err(|_| PaymentError::Unavailable)?;
        if state.failing {
            return Err(PaymentError::Unavailable);
        }
        let id = format!("cs_test_{}", Uuid::now_v7().simple());
        let session = CheckoutSession {
            url: format!("{}#{}", success_url, id),
            id,
        };
        state.sessions.push((session.clone(), lines.to_vec()));
        Ok(session)
    }

    async fn expire_session(&self, session_id: &str) -> Result<(), PaymentError> {
        let mut state = self.state.lock().map_err(|_| PaymentError::Unavailable)?;
        state.expired.push(session_id.to_string());
        Ok(())
    }
}
