use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProcessorApiError;

/// Request body for opening a hosted checkout session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCheckoutSession {
    /// Our transaction id. The processor echoes it back on the session and in every webhook about it.
    pub client_reference_id: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Unix timestamp after which the processor expires the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_data: Option<TransferData>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Route the charge to a connected account, keeping `application_fee_amount` for the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferData {
    pub destination: String,
    pub application_fee_amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatusCode {
    Open,
    Complete,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub status: SessionStatusCode,
    pub payment_status: PaymentStatus,
    pub amount_total: i64,
    pub currency: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    /// Money has been captured. A completed session with a delayed payment method may still be unpaid.
    pub fn is_paid(&self) -> bool {
        self.status == SessionStatusCode::Complete && self.payment_status == PaymentStatus::Paid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefund {
    pub checkout_session: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundObject {
    pub id: String,
    pub amount: i64,
    pub status: String,
}

/// A paid subscription invoice. The business and plan travel in the metadata set when the subscription was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<String>,
    pub period_start: i64,
    pub period_end: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl InvoiceObject {
    pub fn business_id(&self) -> Option<&str> {
        self.metadata.get("business_id").map(String::as_str)
    }

    pub fn plan_tier(&self) -> Option<&str> {
        self.metadata.get("plan_tier").map(String::as_str)
    }

    pub fn period(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ProcessorApiError> {
        let start = DateTime::<Utc>::from_timestamp(self.period_start, 0)
            .ok_or_else(|| ProcessorApiError::JsonError(format!("Invalid period_start: {}", self.period_start)))?;
        let end = DateTime::<Utc>::from_timestamp(self.period_end, 0)
            .ok_or_else(|| ProcessorApiError::JsonError(format!("Invalid period_end: {}", self.period_end)))?;
        Ok((start, end))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// The outer shape of every webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

/// The event types we act on, with their payloads decoded.
#[derive(Debug, Clone)]
pub enum EventPayload {
    CheckoutCompleted(CheckoutSessionObject),
    CheckoutExpired(CheckoutSessionObject),
    InvoicePaid(InvoiceObject),
    Other,
}

impl EventEnvelope {
    pub fn from_slice(payload: &[u8]) -> Result<Self, ProcessorApiError> {
        serde_json::from_slice(payload).map_err(|e| ProcessorApiError::JsonError(e.to_string()))
    }

    pub fn payload(&self) -> Result<EventPayload, ProcessorApiError> {
        let payload = match self.event_type.as_str() {
            "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
                EventPayload::CheckoutCompleted(self.object()?)
            },
            "checkout.session.expired" => EventPayload::CheckoutExpired(self.object()?),
            "invoice.paid" => EventPayload::InvoicePaid(self.object()?),
            _ => EventPayload::Other,
        };
        Ok(payload)
    }

    fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProcessorApiError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| ProcessorApiError::JsonError(format!("Event {} has an invalid payload. {e}", self.id)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const COMPLETED: &str = r#"{
        "id": "evt_1",
        "type": "checkout.session.completed",
        "created": 1718000000,
        "data": { "object": {
            "id": "cs_123",
            "url": null,
            "status": "complete",
            "payment_status": "paid",
            "amount_total": 2500,
            "currency": "usd",
            "client_reference_id": "f3a1c5c2-0000-4000-8000-000000000001"
        }}
    }"#;

    #[test]
    fn completed_session_event() {
        let event = EventEnvelope::from_slice(COMPLETED.as_bytes()).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        let EventPayload::CheckoutCompleted(session) = event.payload().unwrap() else {
            panic!("Expected a completed session");
        };
        assert!(session.is_paid());
        assert_eq!(session.amount_total, 2500);
        assert_eq!(session.client_reference_id.as_deref(), Some("f3a1c5c2-0000-4000-8000-000000000001"));
    }

    #[test]
    fn delayed_payment_is_not_paid() {
        let json = COMPLETED.replace("\"paid\"", "\"unpaid\"");
        let event = EventEnvelope::from_slice(json.as_bytes()).unwrap();
        let EventPayload::CheckoutCompleted(session) = event.payload().unwrap() else {
            panic!("Expected a completed session");
        };
        assert!(!session.is_paid());
    }

    #[test]
    fn unknown_events_are_other() {
        let json = r#"{"id": "evt_2", "type": "customer.created", "data": {"object": {"id": "cus_1"}}}"#;
        let event = EventEnvelope::from_slice(json.as_bytes()).unwrap();
        assert!(matches!(event.payload().unwrap(), EventPayload::Other));
    }

    #[test]
    fn invoice_metadata() {
        let json = r#"{"id": "evt_3", "type": "invoice.paid", "data": {"object": {
            "id": "in_1", "subscription": "sub_1", "period_start": 1717200000, "period_end": 1719792000,
            "metadata": {"business_id": "bistro", "plan_tier": "pro"}
        }}}"#;
        let event = EventEnvelope::from_slice(json.as_bytes()).unwrap();
        let EventPayload::InvoicePaid(invoice) = event.payload().unwrap() else {
            panic!("Expected an invoice");
        };
        assert_eq!(invoice.business_id(), Some("bistro"));
        assert_eq!(invoice.plan_tier(), Some("pro"));
        let (start, end) = invoice.period().unwrap();
        assert_eq!(start.timestamp(), 1717200000);
        assert!(end > start);
    }

    #[test]
    fn malformed_payload() {
        let json = r#"{"id": "evt_4", "type": "checkout.session.expired", "data": {"object": {"id": 5}}}"#;
        let event = EventEnvelope::from_slice(json.as_bytes()).unwrap();
        assert!(matches!(event.payload(), Err(ProcessorApiError::JsonError(_))));
        assert!(EventEnvelope::from_slice(b"not json").is_err());
    }
}
