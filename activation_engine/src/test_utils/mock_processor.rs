//! An in-memory payment processor for tests.
//!
//! Sessions live in a shared map so that a test can "pay" or expire them behind the engine's back, the way a real
//! payer would. Webhook payloads are plain JSON [`ProcessorEvent`]s signed with [`MockProcessor::SIGNATURE`].
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    db_types::{Cents, TransactionId},
    traits::{
        CheckoutSession,
        CheckoutSessionRequest,
        PaymentProcessor,
        ProcessorError,
        ProcessorEvent,
        ProcessorEventKind,
        SessionState,
        SessionStatus,
    },
};

#[derive(Debug, Clone)]
pub struct MockSession {
    pub request: CheckoutSessionRequest,
    pub status: SessionStatus,
}

#[derive(Debug, Default)]
struct MockState {
    sessions: HashMap<String, MockSession>,
    refunds: Vec<(String, Cents)>,
    counter: u64,
    fail_next: bool,
    lookups_fail: bool,
    delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct MockProcessor {
    state: Arc<Mutex<MockState>>,
}

impl MockProcessor {
    pub const SIGNATURE: &'static str = "mock-signature";

    pub fn new() -> Self {
        Self::default()
    }

    /// The next session request fails as if the processor were down.
    pub fn fail_next_session(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    /// Every session lookup fails until switched off again.
    pub fn fail_lookups(&self, fail: bool) {
        self.state.lock().unwrap().lookups_fail = fail;
    }

    /// Makes session creation take this long.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().delay = delay;
    }

    /// The payer completes the hosted checkout for the full amount.
    pub fn pay(&self, reference: &str) -> Option<SessionStatus> {
        self.set_state(reference, SessionState::Paid)
    }

    /// The payer completes the hosted checkout, but the processor reports `amount`.
    pub fn pay_amount(&self, reference: &str, amount: Cents) -> Option<SessionStatus> {
        let mut state = self.state.lock().unwrap();
        let session = state.sessions.get_mut(reference)?;
        session.status.state = SessionState::Paid;
        session.status.amount_total = amount;
        Some(session.status.clone())
    }

    pub fn expire(&self, reference: &str) -> Option<SessionStatus> {
        self.set_state(reference, SessionState::Expired)
    }

    fn set_state(&self, reference: &str, new_state: SessionState) -> Option<SessionStatus> {
        let mut state = self.state.lock().unwrap();
        let session = state.sessions.get_mut(reference)?;
        session.status.state = new_state;
        Some(session.status.clone())
    }

    pub fn session(&self, reference: &str) -> Option<MockSession> {
        self.state.lock().unwrap().sessions.get(reference).cloned()
    }

    pub fn session_for(&self, id: &TransactionId) -> Option<MockSession> {
        let state = self.state.lock().unwrap();
        state.sessions.values().find(|s| &s.request.transaction_id == id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn refunds(&self) -> Vec<(String, Cents)> {
        self.state.lock().unwrap().refunds.clone()
    }

    /// A signed `checkout.session.completed` delivery for the session, as the processor would send it.
    pub fn completed_event(&self, event_id: &str, reference: &str) -> Option<Vec<u8>> {
        let session = self.session(reference)?;
        let event = ProcessorEvent {
            id: event_id.to_string(),
            event_type: "checkout.session.completed".to_string(),
            kind: ProcessorEventKind::CheckoutCompleted {
                transaction_id: session.request.transaction_id,
                external_reference: reference.to_string(),
                amount: session.status.amount_total,
                paid: session.status.state == SessionState::Paid,
            },
        };
        serde_json::to_vec(&event).ok()
    }

    pub fn expired_event(&self, event_id: &str, reference: &str) -> Option<Vec<u8>> {
        let session = self.session(reference)?;
        let event = ProcessorEvent {
            id: event_id.to_string(),
            event_type: "checkout.session.expired".to_string(),
            kind: ProcessorEventKind::CheckoutExpired {
                transaction_id: session.request.transaction_id,
                external_reference: reference.to_string(),
            },
        };
        serde_json::to_vec(&event).ok()
    }
}

impl PaymentProcessor for MockProcessor {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ProcessorError> {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_next {
            state.fail_next = false;
            return Err(ProcessorError::Unavailable("Mock processor is down".into()));
        }
        state.counter += 1;
        let reference = format!("cs_test_{:04}", state.counter);
        let status = SessionStatus {
            reference: reference.clone(),
            transaction_id: Some(request.transaction_id.clone()),
            state: SessionState::Open,
            amount_total: request.amount,
        };
        state.sessions.insert(reference.clone(), MockSession { request: request.clone(), status });
        let url = format!("https://pay.example.test/{reference}");
        Ok(CheckoutSession { reference, url })
    }

    async fn retrieve_session(&self, reference: &str) -> Result<SessionStatus, ProcessorError> {
        let state = self.state.lock().unwrap();
        if state.lookups_fail {
            return Err(ProcessorError::Unavailable("Mock processor is down".into()));
        }
        state
            .sessions
            .get(reference)
            .map(|s| s.status.clone())
            .ok_or_else(|| ProcessorError::Rejected(format!("No such session: {reference}")))
    }

    async fn expire_session(&self, reference: &str) -> Result<SessionStatus, ProcessorError> {
        let mut state = self.state.lock().unwrap();
        if state.lookups_fail {
            return Err(ProcessorError::Unavailable("Mock processor is down".into()));
        }
        let session = state
            .sessions
            .get_mut(reference)
            .ok_or_else(|| ProcessorError::Rejected(format!("No such session: {reference}")))?;
        if session.status.state == SessionState::Open {
            session.status.state = SessionState::Expired;
        }
        Ok(session.status.clone())
    }

    async fn request_refund(&self, reference: &str, amount: Cents) -> Result<(), ProcessorError> {
        self.state.lock().unwrap().refunds.push((reference.to_string(), amount));
        Ok(())
    }

    fn parse_webhook(&self, payload: &[u8], signature: &str) -> Result<ProcessorEvent, ProcessorError> {
        if signature != Self::SIGNATURE {
            return Err(ProcessorError::InvalidSignature("Signature does not match".into()));
        }
        serde_json::from_slice(payload).map_err(|e| ProcessorError::MalformedPayload(e.to_string()))
    }
}
