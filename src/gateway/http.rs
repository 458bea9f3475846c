//! HTTP client for the hosted payment gateway.
//!
//! Speaks the gateway's v3 REST API: `POST /customers` then `POST /payments`,
//! authenticated with an `access_token` header.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{CreatePaymentRequest, PaymentError, PaymentGateway, PaymentIntent};
use crate::domain::Buyer;

/// Longest error body kept in [`PaymentError::Rejected`].
const MAX_ERROR_BODY: usize = 512;

/// Gateway client over `reqwest`.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for HttpPaymentGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPaymentGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerBody<'a> {
    name: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile_phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpf_cnpj: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentBody<'a> {
    customer: &'a str,
    billing_type: &'static str,
    value: f64,
    due_date: String,
    external_reference: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponse {
    id: String,
    invoice_url: String,
}

impl HttpPaymentGateway {
    /// Builds a client. `request_timeout` bounds each individual HTTP call;
    /// the checkout pipeline applies its own overall deadline on top.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Transport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, PaymentError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("access_token", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            tracing::warn!(%url, status = status.as_u16(), "gateway rejected request");
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn register_customer(&self, buyer: &Buyer) -> Result<String, PaymentError> {
        let body = CustomerBody {
            name: &buyer.name,
            email: &buyer.email,
            mobile_phone: buyer.phone.as_deref(),
            cpf_cnpj: buyer.document.as_deref(),
        };
        let customer: CustomerResponse = self.post_json("/customers", &body).await?;
        Ok(customer.id)
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        let body = PaymentBody {
            customer: &request.customer_ref,
            billing_type: "UNDEFINED",
            value: request.amount.as_major_units(),
            due_date: request.due_date.format("%Y-%m-%d").to_string(),
            external_reference: &request.external_reference,
            description: &request.description,
        };
        let payment: PaymentResponse = self.post_json("/payments", &body).await?;
        tracing::debug!(payment_id = %payment.id, "gateway payment created");
        Ok(PaymentIntent {
            payment_id: payment.id,
            invoice_url: payment.invoice_url,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Money;
    use chrono::NaiveDate;

    #[test]
    fn debug_redacts_api_key() {
        let Ok(gateway) =
            HttpPaymentGateway::new("https://sandbox.example/v3/", "secret-key", Duration::from_secs(5))
        else {
            panic!("client should build");
        };
        let debug = format!("{gateway:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("https://sandbox.example/v3"));
        assert!(!debug.contains("v3/\""));
    }

    #[test]
    fn payment_body_uses_gateway_field_names() {
        let Some(due_date) = NaiveDate::from_ymd_opt(2026, 3, 9) else {
            panic!("valid date");
        };
        let request = CreatePaymentRequest {
            customer_ref: "cus_1".to_string(),
            amount: Money::from_cents(15_050),
            due_date,
            external_reference: "sale-1".to_string(),
            description: "2x General".to_string(),
        };
        let body = PaymentBody {
            customer: &request.customer_ref,
            billing_type: "UNDEFINED",
            value: request.amount.as_major_units(),
            due_date: request.due_date.format("%Y-%m-%d").to_string(),
            external_reference: &request.external_reference,
            description: &request.description,
        };
        let json = serde_json::to_value(&body).unwrap_or_default();
        assert_eq!(json["billingType"], "UNDEFINED");
        assert_eq!(json["dueDate"], "2026-03-09");
        assert_eq!(json["externalReference"], "sale-1");
        assert_eq!(json["value"], 150.5);
    }
}
