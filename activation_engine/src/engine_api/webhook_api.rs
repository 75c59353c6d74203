use std::fmt::Debug;

use log::*;

use crate::{
    db_types::TransactionStatus,
    engine_api::{
        completion_api::CompletionApi,
        engine_objects::{VerifiedPaymentFact, WebhookAck},
        errors::{CompletionError, LedgerError, WebhookError},
        ledger_api::LedgerApi,
    },
    traits::{PaymentProcessor, ProcessorError, ProcessorEvent, ProcessorEventKind, TransactionStore},
};

/// `WebhookApi` authenticates and acts on processor push notifications.
///
/// Deliveries are at-least-once. Redeliveries of an event that was fully handled are acknowledged from the
/// `webhook_events` table; anything that slips past that (a crash between handling and recording) is absorbed by the
/// completion handler's own idempotency.
pub struct WebhookApi<B, P> {
    db: B,
    processor: P,
    completion: CompletionApi<B>,
    ledger: LedgerApi<B>,
}

impl<B, P> Debug for WebhookApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B, P> WebhookApi<B, P>
where
    B: TransactionStore,
    P: PaymentProcessor,
{
    pub fn new(processor: P, completion: CompletionApi<B>, ledger: LedgerApi<B>) -> Self {
        Self { db: completion.db().clone(), processor, completion, ledger }
    }

    /// Verifies, decodes and handles one delivery.
    ///
    /// Nothing in the payload is trusted until the signature checks out. Errors that a redelivery could fix are
    /// reported as [`WebhookError::Transient`] so that the processor retries.
    pub async fn handle_webhook_event(&self, payload: &[u8], signature: &str) -> Result<WebhookAck, WebhookError> {
        let event = self.processor.parse_webhook(payload, signature).map_err(|e| match e {
            ProcessorError::InvalidSignature(s) => WebhookError::InvalidSignature(s),
            ProcessorError::MalformedPayload(s) => WebhookError::MalformedPayload(s),
            e => WebhookError::Transient(e.to_string()),
        })?;
        let seen = self.db.webhook_event_seen(&event.id).await.map_err(|e| WebhookError::Transient(e.to_string()))?;
        if seen {
            debug!("🪝️ Event {} ({}) was already handled", event.id, event.event_type);
            return Ok(WebhookAck::Duplicate);
        }
        let ack = self.dispatch(&event).await?;
        match self.db.record_webhook_event(&event.id, &event.event_type).await {
            Ok(true) => trace!("🪝️ Event {} recorded", event.id),
            Ok(false) => debug!("🪝️ Event {} was handled concurrently by another delivery", event.id),
            Err(e) => warn!("🪝️ Event {} was handled but could not be recorded. {e}", event.id),
        }
        Ok(ack)
    }

    async fn dispatch(&self, event: &ProcessorEvent) -> Result<WebhookAck, WebhookError> {
        match &event.kind {
            ProcessorEventKind::CheckoutCompleted { paid: false, transaction_id, .. } => {
                debug!("🪝️ Checkout for [{transaction_id}] finished, but the payment has not been captured yet");
                Ok(WebhookAck::Ignored)
            },
            ProcessorEventKind::CheckoutCompleted { transaction_id, external_reference, amount, .. } => {
                let fact = VerifiedPaymentFact::new(*amount, external_reference);
                match self.completion.complete(transaction_id, fact).await {
                    Ok(outcome) => {
                        debug!("🪝️ [{transaction_id}] is {}", outcome.transaction().status);
                        Ok(WebhookAck::Processed)
                    },
                    Err(CompletionError::TransactionNotFound(id)) => {
                        warn!("🪝️ Payment event {} refers to unknown transaction [{id}]", event.id);
                        Ok(WebhookAck::Ignored)
                    },
                    Err(CompletionError::Store(e)) => {
                        error!("🪝️ Could not complete [{transaction_id}]. The processor will redeliver. {e}");
                        Err(WebhookError::Transient(e.to_string()))
                    },
                    // Integrity failures and cancellations are final outcomes. Redelivering would not change them.
                    Err(e) => {
                        warn!("🪝️ Payment event {} for [{transaction_id}] was not applied. {e}", event.id);
                        Ok(WebhookAck::Processed)
                    },
                }
            },
            ProcessorEventKind::CheckoutExpired { transaction_id, external_reference } => {
                let tx = self
                    .db
                    .fetch_transaction(transaction_id)
                    .await
                    .map_err(|e| WebhookError::Transient(e.to_string()))?;
                let Some(tx) = tx else {
                    warn!("🪝️ Expiry event {} refers to unknown transaction [{transaction_id}]", event.id);
                    return Ok(WebhookAck::Ignored);
                };
                let ours = tx.external_reference.as_deref() == Some(external_reference.as_str());
                if !ours || tx.status != TransactionStatus::AwaitingExternalPayment {
                    debug!("🪝️ Session {external_reference} expired, but [{transaction_id}] is {}", tx.status);
                    return Ok(WebhookAck::Ignored);
                }
                self.completion
                    .expire(transaction_id, "Checkout session expired without payment")
                    .await
                    .map_err(|e| WebhookError::Transient(e.to_string()))?;
                Ok(WebhookAck::Processed)
            },
            ProcessorEventKind::SubscriptionRenewed { business_id, plan_tier, period_start, period_end } => {
                match self.ledger.renew(business_id, *plan_tier, *period_start, *period_end).await {
                    Ok(outcome) => {
                        debug!("🪝️ Renewal for {business_id}: {}", outcome.entry().monthly_budget_remaining_cents);
                        Ok(WebhookAck::Processed)
                    },
                    Err(LedgerError::Store(e)) => Err(WebhookError::Transient(e.to_string())),
                    Err(e) => {
                        warn!("🪝️ Renewal event {} was not applied. {e}", event.id);
                        Ok(WebhookAck::Ignored)
                    },
                }
            },
            ProcessorEventKind::Other => {
                trace!("🪝️ Ignoring {} event {}", event.event_type, event.id);
                Ok(WebhookAck::Ignored)
            },
        }
    }
}
