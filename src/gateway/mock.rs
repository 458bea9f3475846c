//! Scriptable in-process gateway for tests and local development.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CreatePaymentRequest, PaymentError, PaymentGateway, PaymentIntent};
use crate::domain::Buyer;

/// How the mock answers `create_payment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Return a fresh payment intent.
    Succeed,
    /// Return [`PaymentError::Rejected`].
    Reject,
    /// Never answer (exercises the caller's timeout).
    Hang,
}

/// Gateway double that records every payment request.
#[derive(Debug)]
pub struct MockGateway {
    behavior: Mutex<MockBehavior>,
    latency: Duration,
    counter: AtomicU64,
    requests: Mutex<Vec<CreatePaymentRequest>>,
}

impl MockGateway {
    /// Creates a mock with the given behavior and no added latency.
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            latency: Duration::ZERO,
            counter: AtomicU64::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Adds a fixed delay before every answer.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Changes the behavior for subsequent calls.
    pub async fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().await = behavior;
    }

    /// Payment requests received so far.
    pub async fn requests(&self) -> Vec<CreatePaymentRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn register_customer(&self, buyer: &Buyer) -> Result<String, PaymentError> {
        Ok(format!("cus_{}", buyer.email.replace(['@', '.'], "_")))
    }

    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let behavior = *self.behavior.lock().await;
        match behavior {
            MockBehavior::Succeed => {
                self.requests.lock().await.push(request.clone());
                let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
                let payment_id = format!("pay_mock_{n:06}");
                Ok(PaymentIntent {
                    invoice_url: format!("https://pay.invalid/i/{payment_id}"),
                    payment_id,
                })
            }
            MockBehavior::Reject => Err(PaymentError::Rejected {
                status: 400,
                body: "invalid_customer".to_string(),
            }),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(PaymentError::Transport("unreachable".to_string()))
            }
        }
    }
}
