// ABOUTME: Stripe client that creates a customer and a payment intent for a checkout
// ABOUTME: Requests are form-encoded; amounts are integer minor units
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::http::{build_client, decode_response, map_send_error};
use crate::config::PaymentsConfig;
use crate::errors::{AppError, AppResult};
use atelier_core::constants::service_names::PAYMENTS;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

/// A checkout the client wants to start
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntent {
    /// Amount in the currency's minor unit (cents for USD)
    pub amount: i64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Plan being purchased, stored as metadata
    #[serde(default)]
    pub plan: Option<String>,
}

impl CreatePaymentIntent {
    /// Check amount and currency before anything is sent to the provider
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for a non-positive amount or a malformed currency
    pub fn validate(&self) -> AppResult<()> {
        if self.amount <= 0 {
            return Err(AppError::invalid_input("Amount must be a positive integer"));
        }
        let currency = self.currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::invalid_input(
                "Currency must be a three-letter ISO code",
            ));
        }
        Ok(())
    }
}

/// What the browser needs to confirm the payment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Secret the payment widget confirms with
    pub client_secret: String,
    /// Provider customer created for the account
    pub customer_id: String,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: String,
}

/// Stripe REST client
pub struct PaymentsClient {
    client: Client,
    secret_key: Option<String>,
    base_url: String,
}

impl PaymentsClient {
    /// Create a client; a missing secret key only fails when a payment is attempted
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &PaymentsConfig, timeout_secs: u64) -> AppResult<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            secret_key: config.secret_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Whether a secret key is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Create a customer for the account, then a payment intent charged to it
    ///
    /// # Errors
    ///
    /// Returns `CONFIG_MISSING` without a secret key, `INVALID_INPUT` for a bad
    /// request, the provider's status for a rejected one, and a 503 when the
    /// provider fails or times out
    #[instrument(skip(self, request), fields(amount = request.amount, currency = %request.currency))]
    pub async fn create_payment_intent(
        &self,
        account_id: Uuid,
        email: &str,
        request: &CreatePaymentIntent,
    ) -> AppResult<PaymentIntent> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::config_missing("STRIPE_SECRET_KEY"))?;
        request.validate()?;

        let account = account_id.to_string();
        let customer: StripeCustomer = self
            .post_form(
                secret_key,
                "/v1/customers",
                &[("email", email), ("metadata[account_id]", &account)],
            )
            .await?;

        let amount = request.amount.to_string();
        let currency = request.currency.trim().to_ascii_lowercase();
        let mut form = vec![
            ("amount", amount.as_str()),
            ("currency", currency.as_str()),
            ("customer", customer.id.as_str()),
            ("automatic_payment_methods[enabled]", "true"),
            ("metadata[account_id]", account.as_str()),
        ];
        if let Some(plan) = request.plan.as_deref() {
            form.push(("metadata[plan]", plan));
        }
        let intent: StripePaymentIntent = self
            .post_form(secret_key, "/v1/payment_intents", &form)
            .await?;

        info!(
            %account_id,
            customer_id = %customer.id,
            payment_intent_id = %intent.id,
            "Created payment intent"
        );
        Ok(PaymentIntent {
            client_secret: intent.client_secret,
            customer_id: customer.id,
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        secret_key: &str,
        path: &str,
        form: &[(&str, &str)],
    ) -> AppResult<T> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| map_send_error(PAYMENTS, &e))?;
        decode_response(PAYMENTS, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: i64, currency: &str) -> CreatePaymentIntent {
        CreatePaymentIntent {
            amount,
            currency: currency.to_owned(),
            plan: None,
        }
    }

    #[test]
    fn test_validate_rejects_bad_amounts_and_currencies() {
        assert!(request(4900, "usd").validate().is_ok());
        assert!(request(4900, "EUR").validate().is_ok());
        assert!(request(0, "usd").validate().is_err());
        assert!(request(-1, "usd").validate().is_err());
        assert!(request(100, "us").validate().is_err());
        assert!(request(100, "u$d").validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_secret_key_fails_before_network() {
        let client = PaymentsClient::new(
            &PaymentsConfig {
                secret_key: None,
                base_url: "http://127.0.0.1:9".to_owned(),
            },
            1,
        )
        .unwrap();
        assert!(!client.is_configured());
        let err = client
            .create_payment_intent(Uuid::new_v4(), "a@example.com", &request(100, "usd"))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 500);
    }
}
