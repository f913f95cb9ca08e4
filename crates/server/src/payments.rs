//! Client for the third-party payment processor.

use crate::config::PaymentConfig;
use crate::error::{ServerError, ServerResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Creates payment intents on behalf of donors.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for `amount` in the smallest currency unit and return
    /// its client secret.
    async fn create_payment_intent(&self, amount: u64) -> ServerResult<String>;
}

/// Stripe-compatible payment intents API.
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: Option<String>,
    api_base: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProcessorError {
    error: ProcessorErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProcessorErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig, timeout: Duration) -> ServerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Config(format!("payment client: {e}")))?;
        Ok(Self {
            client,
            secret_key: config.secret_key.clone().filter(|k| !k.is_empty()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(&self, amount: u64) -> ServerResult<String> {
        let secret_key = self.secret_key.as_deref().ok_or_else(|| {
            ServerError::Unavailable("payment processor is not configured".to_string())
        })?;

        let amount = amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", self.currency.as_str()),
            ("payment_method_types[]", "card"),
        ];
        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServerError::PaymentGateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ProcessorError>()
                .await
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| format!("processor returned {status}"));
            tracing::warn!(%status, %message, "payment intent rejected");
            return Err(ServerError::PaymentGateway(message));
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|e| ServerError::PaymentGateway(e.to_string()))?;
        intent.client_secret.ok_or_else(|| {
            ServerError::PaymentGateway("payment intent has no client secret".to_string())
        })
    }
}

/// Convert a price in major units to the smallest currency unit.
///
/// Rejects non-finite, zero and negative prices.
pub fn amount_in_minor_units(price: f64) -> ServerResult<u64> {
    if !price.is_finite() || price <= 0.0 {
        return Err(ServerError::BadRequest(
            "price must be a positive number".to_string(),
        ));
    }
    let amount = (price * 100.0).round();
    if amount < 1.0 || amount > u64::MAX as f64 {
        return Err(ServerError::BadRequest("price is out of range".to_string()));
    }
    Ok(amount as u64)
}
