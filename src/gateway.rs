use serde::Serialize;
use std::env;

use crate::database::idgen;

/// Explicitly constructed payment-gateway handle, injected into the handlers
/// at startup. The settlement code never talks to the gateway directly; it
/// only ever sees [`WebhookEvent`].
#[derive(Debug, Clone)]
pub struct PaymentGateway {
    name: String,
    checkout_base_url: String,
}

#[derive(Serialize, Debug)]
pub struct CheckoutSession {
    pub session_id: String,
    pub redirect_url: String,
}

impl PaymentGateway {
    pub fn from_env() -> Self {
        let checkout_base_url =
            env::var("PAYMENT_GATEWAY_URL").unwrap_or_else(|_| "https://pay.example.com/checkout".to_string());
        let name = env::var("PAYMENT_GATEWAY_NAME").unwrap_or_else(|_| "cashfree".to_string());
        Self {
            name,
            checkout_base_url,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Opens a hosted checkout session for an order.
    // TODO: call the gateway's create-session API with PAYMENT_GATEWAY_KEY;
    // for now the session id is minted locally and the redirect URL is
    // composed from the configured checkout base.
    pub fn create_checkout_session(&self, order_id: &str, _amount: i64, _currency: &str) -> CheckoutSession {
        let session_id = format!("cs_{}", idgen::next());
        let redirect_url = format!("{}/{}?order={}", self.checkout_base_url, session_id, order_id);
        CheckoutSession {
            session_id,
            redirect_url,
        }
    }
}

/// The gateway's webhook payload, normalized. Gateways disagree on field names
/// between API versions, so the adapter looks fields up tolerantly and the
/// settlement logic stays shape-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub transaction_id: Option<String>,
    pub session_id: Option<String>,
    pub outcome: WebhookOutcome,
    pub failure_reason: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WebhookOutcome {
    Succeeded,
    Failed,
    /// Informational event types (session opened, payment authorized but not
    /// captured, ...) that settle nothing.
    Ignored,
}

fn lookup<'a>(payload: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    // fields may sit at the top level or under a `data`/`payment` envelope
    let scopes = [Some(payload), payload.get("data"), payload.get("payment")];
    for scope in scopes.into_iter().flatten() {
        for key in keys {
            if let Some(v) = scope.get(key).and_then(|v| v.as_str()) {
                return Some(v);
            }
        }
    }
    None
}

impl WebhookEvent {
    pub fn from_payload(payload: serde_json::Value) -> Self {
        let transaction_id =
            lookup(&payload, &["transaction_id", "payment_id", "txn_id", "id"]).map(str::to_string);
        let session_id =
            lookup(&payload, &["session_id", "checkout_session_id", "order_session_id"]).map(str::to_string);
        let status = lookup(&payload, &["event", "status", "payment_status", "txStatus"])
            .map(str::to_uppercase)
            .unwrap_or_default();
        let outcome = match status.as_str() {
            "PAYMENT.SUCCESS" | "PAYMENT_SUCCESS" | "SUCCESS" | "PAID" | "COMPLETED" | "CAPTURED" => {
                WebhookOutcome::Succeeded
            }
            "PAYMENT.FAILED" | "PAYMENT_FAILED" | "FAILED" | "CANCELLED" | "EXPIRED" => WebhookOutcome::Failed,
            _ => WebhookOutcome::Ignored,
        };
        let failure_reason =
            lookup(&payload, &["failure_reason", "error_message", "failure_message"]).map(str::to_string);
        Self {
            transaction_id,
            session_id,
            outcome,
            failure_reason,
            raw: payload,
        }
    }
}
