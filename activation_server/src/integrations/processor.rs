//! Adapts the REST client in `checkout_processor` to the engine's [`PaymentProcessor`] contract, and wires the refund
//! hook that returns money for cancelled transactions.
use std::sync::Arc;

use activation_engine::{
    db_types::{Cents, PlanTier, TransactionId},
    events::{EventHandlers, EventHooks, TransactionCancelledEvent},
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
    SqliteDatabase,
    TransactionStore,
};
use checkout_processor::{
    CheckoutSessionObject,
    EventEnvelope,
    EventPayload,
    NewCheckoutSession,
    NewRefund,
    ProcessorApi,
    ProcessorApiError,
    RefundObject,
    SessionStatusCode,
    TransferData,
};
use futures::future::BoxFuture;
use log::*;

pub const REFUND_EVENT_BUFFER_SIZE: usize = 25;

/// The calls the gateway needs from a processor client.
#[allow(async_fn_in_trait)]
pub trait ProcessorClient {
    async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession,
    ) -> Result<CheckoutSessionObject, ProcessorApiError>;
    async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionObject, ProcessorApiError>;
    async fn expire_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionObject, ProcessorApiError>;
    async fn create_refund(&self, refund: &NewRefund) -> Result<RefundObject, ProcessorApiError>;
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<EventEnvelope, ProcessorApiError>;
}

impl ProcessorClient for ProcessorApi {
    async fn create_checkout_session(
        &self,
        session: &NewCheckoutSession,
    ) -> Result<CheckoutSessionObject, ProcessorApiError> {
        ProcessorApi::create_checkout_session(self, session).await
    }

    async fn get_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionObject, ProcessorApiError> {
        ProcessorApi::get_checkout_session(self, session_id).await
    }

    async fn expire_checkout_session(&self, session_id: &str) -> Result<CheckoutSessionObject, ProcessorApiError> {
        ProcessorApi::expire_checkout_session(self, session_id).await
    }

    async fn create_refund(&self, refund: &NewRefund) -> Result<RefundObject, ProcessorApiError> {
        ProcessorApi::create_refund(self, refund).await
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<EventEnvelope, ProcessorApiError> {
        ProcessorApi::verify_webhook(self, payload, signature)
    }
}

pub struct ProcessorGateway<C> {
    client: Arc<C>,
}

impl<C> Clone for ProcessorGateway<C> {
    fn clone(&self) -> Self {
        Self { client: Arc::clone(&self.client) }
    }
}

impl<C> ProcessorGateway<C> {
    pub fn new(client: C) -> Self {
        Self { client: Arc::new(client) }
    }
}

fn to_processor_error(e: ProcessorApiError) -> ProcessorError {
    match e {
        ProcessorApiError::Timeout => ProcessorError::Timeout,
        e if e.is_transient() => ProcessorError::Unavailable(e.to_string()),
        ProcessorApiError::MalformedSignature(_) |
        ProcessorApiError::SignatureMismatch |
        ProcessorApiError::StaleSignature { .. } => ProcessorError::InvalidSignature(e.to_string()),
        ProcessorApiError::JsonError(_) => ProcessorError::MalformedPayload(e.to_string()),
        e => ProcessorError::Rejected(e.to_string()),
    }
}

fn session_state(session: &CheckoutSessionObject) -> SessionState {
    match session.status {
        SessionStatusCode::Complete if session.is_paid() => SessionState::Paid,
        // Completed with a delayed payment method. The money has not arrived yet.
        SessionStatusCode::Complete | SessionStatusCode::Open => SessionState::Open,
        SessionStatusCode::Expired => SessionState::Expired,
    }
}

fn session_status(session: CheckoutSessionObject) -> SessionStatus {
    SessionStatus {
        transaction_id: session.client_reference_id.as_deref().map(TransactionId::from),
        state: session_state(&session),
        amount_total: Cents::from(session.amount_total),
        reference: session.id,
    }
}

fn transaction_id(session: &CheckoutSessionObject) -> Result<TransactionId, ProcessorError> {
    session
        .client_reference_id
        .as_deref()
        .map(TransactionId::from)
        .ok_or_else(|| ProcessorError::MalformedPayload(format!("Session {} has no client reference", session.id)))
}

/// Translates an authenticated processor event into the engine's vocabulary.
pub fn to_engine_event(envelope: EventEnvelope) -> Result<ProcessorEvent, ProcessorError> {
    let payload = envelope.payload().map_err(to_processor_error)?;
    let kind = match payload {
        EventPayload::CheckoutCompleted(session) => ProcessorEventKind::CheckoutCompleted {
            transaction_id: transaction_id(&session)?,
            paid: session.is_paid(),
            amount: Cents::from(session.amount_total),
            external_reference: session.id,
        },
        EventPayload::CheckoutExpired(session) => ProcessorEventKind::CheckoutExpired {
            transaction_id: transaction_id(&session)?,
            external_reference: session.id,
        },
        EventPayload::InvoicePaid(invoice) => {
            let (period_start, period_end) = invoice.period().map_err(to_processor_error)?;
            let business_id = invoice.business_id().map(String::from);
            let plan_tier = invoice.plan_tier().and_then(|p| p.parse::<PlanTier>().ok());
            match (business_id, plan_tier) {
                (Some(business_id), Some(plan_tier)) => {
                    ProcessorEventKind::SubscriptionRenewed { business_id, plan_tier, period_start, period_end }
                },
                _ => {
                    warn!("🪝️ Invoice {} has no usable business_id/plan_tier metadata. Ignoring it.", invoice.id);
                    ProcessorEventKind::Other
                },
            }
        },
        EventPayload::Other => ProcessorEventKind::Other,
    };
    Ok(ProcessorEvent { id: envelope.id, event_type: envelope.event_type, kind })
}

impl<C: ProcessorClient> PaymentProcessor for ProcessorGateway<C> {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ProcessorError> {
        let mut session = NewCheckoutSession {
            client_reference_id: request.transaction_id.to_string(),
            amount: request.amount.value(),
            currency: request.currency.clone(),
            description: request.description.clone(),
            success_url: request.success_url.clone(),
            cancel_url: request.cancel_url.clone(),
            expires_at: request.expires_at.map(|t| t.timestamp()),
            transfer_data: request.split.as_ref().map(|s| TransferData {
                destination: s.destination.clone(),
                application_fee_amount: s.application_fee.value(),
            }),
            ..Default::default()
        };
        session.metadata.insert("transaction_id".to_string(), request.transaction_id.to_string());
        let result = self.client.create_checkout_session(&session).await.map_err(to_processor_error)?;
        let url = result
            .url
            .ok_or_else(|| ProcessorError::Rejected(format!("Session {} was created without a URL", result.id)))?;
        Ok(CheckoutSession { reference: result.id, url })
    }

    async fn retrieve_session(&self, reference: &str) -> Result<SessionStatus, ProcessorError> {
        let session = self.client.get_checkout_session(reference).await.map_err(to_processor_error)?;
        Ok(session_status(session))
    }

    async fn expire_session(&self, reference: &str) -> Result<SessionStatus, ProcessorError> {
        let session = match self.client.expire_checkout_session(reference).await {
            Ok(session) => session,
            // Refused because the session is no longer open. Report where it ended up instead.
            Err(e) if !e.is_transient() => {
                debug!("💰️ Session {reference} could not be expired ({e}). Fetching its current state.");
                self.client.get_checkout_session(reference).await.map_err(to_processor_error)?
            },
            Err(e) => return Err(to_processor_error(e)),
        };
        Ok(session_status(session))
    }

    async fn request_refund(&self, reference: &str, amount: Cents) -> Result<(), ProcessorError> {
        let refund = NewRefund { checkout_session: reference.to_string(), amount: amount.value(), reason: None };
        self.client.create_refund(&refund).await.map_err(to_processor_error)?;
        Ok(())
    }

    fn parse_webhook(&self, payload: &[u8], signature: &str) -> Result<ProcessorEvent, ProcessorError> {
        let envelope = self.client.verify_webhook(payload, signature).map_err(to_processor_error)?;
        to_engine_event(envelope)
    }
}

/// Returns captured money for transactions the engine cancelled after payment.
///
/// The refund call is idempotent on the processor side (keyed on the session), so a retried cancellation does not
/// refund twice. Accepted refunds are recorded; the reconciliation sweep asks again for any that are not, including
/// those whose event was lost with a restart.
pub fn create_refund_handlers(gateway: ProcessorGateway<ProcessorApi>, db: SqliteDatabase) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_transaction_cancelled(move |ev: TransactionCancelledEvent| {
        let Some(refund) = ev.refund else {
            trace!("💰️ Transaction {} was cancelled without a refund", ev.transaction.id);
            return no_op();
        };
        let gateway = gateway.clone();
        let db = db.clone();
        let id = ev.transaction.id;
        Box::pin(async move {
            if let Err(e) = gateway.request_refund(&refund.external_reference, refund.amount).await {
                error!(
                    "💰️ Could not refund {} on session {} for transaction {id}. The sweep will try again. {e}",
                    refund.amount, refund.external_reference
                );
                return;
            }
            info!("💰️ Refund of {} requested for transaction {id}", refund.amount);
            if let Err(e) = db.confirm_refund(&id).await {
                warn!("💰️ Refund for transaction {id} could not be recorded. The sweep will ask again. {e}");
            }
        })
    });
    EventHandlers::new(REFUND_EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
