use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    commission::{BoostRates, CommissionSchedule, CommissionSplit},
    db_types::{
        Business,
        Cents,
        FundingMode,
        FundingPreference,
        NewTransaction,
        ReservationStatus,
        Transaction,
        TransactionId,
        TransactionKind,
        TransactionStatus,
    },
    engine_api::{
        completion_api::CompletionApi,
        engine_objects::{CheckoutConfig, CheckoutOutcome, CheckoutRequest, CompletionOutcome},
        errors::{CheckoutError, CompletionError, FundingError, ValidationError},
    },
    traits::{BudgetReservation, CheckoutSessionRequest, PaymentProcessor, SplitDirective, TransactionStore},
};

/// The payee of boosts, which are platform revenue.
pub const PLATFORM_PAYEE: &str = "platform";

/// `CheckoutApi` turns purchase requests into transactions.
///
/// Every kind follows the same template: validate the subject, price it, store a `pending` transaction, then either
/// complete it on the spot (nothing to collect externally) or open a processor session and hand back its URL.
///
/// Validation failures never create a row. Funding failures leave at most a `pending` row, which the sweeper expires.
pub struct CheckoutApi<B, P> {
    db: B,
    processor: P,
    completion: CompletionApi<B>,
    commission: CommissionSchedule,
    boost_rates: BoostRates,
    config: CheckoutConfig,
}

impl<B, P> Debug for CheckoutApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi ({})", self.config.currency)
    }
}

impl<B, P> CheckoutApi<B, P>
where
    B: TransactionStore,
    P: PaymentProcessor,
{
    pub fn new(processor: P, completion: CompletionApi<B>) -> Self {
        Self {
            db: completion.db().clone(),
            processor,
            completion,
            commission: CommissionSchedule::default(),
            boost_rates: BoostRates::default(),
            config: CheckoutConfig::default(),
        }
    }

    pub fn with_commission(mut self, commission: CommissionSchedule) -> Self {
        self.commission = commission;
        self
    }

    pub fn with_boost_rates(mut self, rates: BoostRates) -> Self {
        self.boost_rates = rates;
        self
    }

    pub fn with_config(mut self, config: CheckoutConfig) -> Self {
        self.config = config;
        self
    }

    pub fn commission(&self) -> &CommissionSchedule {
        &self.commission
    }

    pub async fn initiate_checkout(&self, request: CheckoutRequest) -> Result<CheckoutOutcome, CheckoutError> {
        match request {
            CheckoutRequest::TicketOrder { tier_id, payer, quantity } => {
                self.checkout_ticket_order(&tier_id, &payer, quantity).await
            },
            CheckoutRequest::Reservation { reservation_id, payer } => {
                self.checkout_reservation(&reservation_id, &payer).await
            },
            CheckoutRequest::OfferPurchase { offer_id, payer } => self.checkout_offer_purchase(&offer_id, &payer).await,
            CheckoutRequest::Boost { boost, business_id, target_id, starts_at, days, funding } => {
                self.checkout_boost(boost, &business_id, &target_id, starts_at, days, funding).await
            },
        }
    }

    /// Ticket capacity is validated here, not held. Two buyers may race for the last ticket; the loser is cancelled and
    /// refunded at completion.
    pub async fn checkout_ticket_order(
        &self,
        tier_id: &str,
        payer: &str,
        quantity: i64,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        if quantity < 1 {
            return Err(ValidationError::InvalidQuantity(quantity).into());
        }
        let subject = format!("Ticket tier {tier_id}");
        let tier = self
            .db
            .fetch_ticket_tier(tier_id)
            .await?
            .ok_or_else(|| ValidationError::SubjectNotFound(subject.clone()))?;
        let now = Utc::now();
        check_window(&subject, tier.sales_start, tier.sales_end, now)?;
        if tier.remaining() < quantity {
            return Err(ValidationError::SoldOut(subject).into());
        }
        if let Some(limit) = tier.per_user_limit {
            let committed = self.db.tickets_committed_to_payer(tier_id, payer).await?;
            if committed + quantity > limit {
                return Err(ValidationError::PurchaseLimitExceeded { subject, limit }.into());
            }
        }
        let gross = tier.price_cents * quantity;
        let business = self.payee(&tier.business_id, gross).await?;
        let split = self.commission.split(business.plan_tier, TransactionKind::TicketOrder, gross);
        let tx = self
            .priced(NewTransaction::new(TransactionKind::TicketOrder, tier_id, payer, &business.id), split, now)
            .with_parent(&tier.event_id)
            .with_quantity(quantity);
        self.open(tx).await
    }

    pub async fn checkout_reservation(
        &self,
        reservation_id: &str,
        payer: &str,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let subject = format!("Reservation {reservation_id}");
        let reservation = self
            .db
            .fetch_reservation(reservation_id)
            .await?
            .ok_or_else(|| ValidationError::SubjectNotFound(subject.clone()))?;
        if reservation.customer != payer {
            return Err(ValidationError::WrongPayer(reservation.customer).into());
        }
        if reservation.status != ReservationStatus::Requested {
            return Err(ValidationError::NotOnSale(format!("{subject} ({})", reservation.status)).into());
        }
        let gross = reservation.deposit_cents;
        let business = self.payee(&reservation.business_id, gross).await?;
        let split = self.commission.split(business.plan_tier, TransactionKind::Reservation, gross);
        let now = Utc::now();
        let tx = NewTransaction::new(TransactionKind::Reservation, reservation_id, payer, &business.id);
        let tx = self.priced(tx, split, now);
        self.open(tx).await
    }

    /// Pending purchases count against stock until they expire, so an offer cannot be oversold by open checkouts.
    pub async fn checkout_offer_purchase(&self, offer_id: &str, payer: &str) -> Result<CheckoutOutcome, CheckoutError> {
        let subject = format!("Offer {offer_id}");
        let offer =
            self.db.fetch_offer(offer_id).await?.ok_or_else(|| ValidationError::SubjectNotFound(subject.clone()))?;
        let now = Utc::now();
        check_window(&subject, offer.valid_from, offer.valid_until, now)?;
        if let Some(stock) = offer.stock {
            let pending = self.db.pending_offer_purchases(offer_id).await?;
            if offer.quantity_sold + pending >= stock {
                return Err(ValidationError::SoldOut(subject).into());
            }
        }
        if let Some(limit) = offer.per_user_limit {
            let bought = self.db.offer_purchases_by_payer(offer_id, payer).await?;
            if bought >= limit {
                return Err(ValidationError::PurchaseLimitExceeded { subject, limit }.into());
            }
        }
        let gross = offer.discounted_price();
        let business = self.payee(&offer.business_id, gross).await?;
        let split = if offer.commission_free {
            CommissionSplit::commission_free(gross)
        } else {
            self.commission.split(business.plan_tier, TransactionKind::OfferPurchase, gross)
        };
        let tx = NewTransaction::new(TransactionKind::OfferPurchase, offer_id, payer, &business.id);
        let tx = self.priced(tx, split, now);
        self.open(tx).await
    }

    /// Boosts are bought by a business for one of its own profile, events or offers. With
    /// [`FundingPreference::BudgetFirst`] the business's promotion budget pays for as much as it can cover.
    pub async fn checkout_boost(
        &self,
        kind: TransactionKind,
        business_id: &str,
        target_id: &str,
        starts_at: DateTime<Utc>,
        days: u32,
        funding: FundingPreference,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        if !kind.is_boost() {
            return Err(ValidationError::NotABoost(kind.to_string()).into());
        }
        if days == 0 {
            return Err(ValidationError::InvalidWindow("A boost must run for at least one day".to_string()).into());
        }
        let now = Utc::now();
        let ends_at = starts_at + Duration::days(i64::from(days));
        if ends_at <= now {
            return Err(ValidationError::InvalidWindow(format!("The window ending {ends_at} is in the past")).into());
        }
        let business = self
            .db
            .fetch_business(business_id)
            .await?
            .ok_or_else(|| ValidationError::SubjectNotFound(format!("Business {business_id}")))?;
        self.check_boost_target(kind, &business, target_id).await?;
        let gross = self.boost_rates.price(kind, days).unwrap_or_default();
        let split = self.commission.split(business.plan_tier, kind, gross);
        let (mode, partial) = self.boost_funding(business_id, gross, funding).await?;
        let tx = self
            .priced(NewTransaction::new(kind, target_id, business_id, PLATFORM_PAYEE), split, now)
            .with_funding(mode, partial)
            .with_window(starts_at, ends_at);
        self.open(tx).await
    }

    /// Opens a processor session for an external transaction whose first attempt failed or timed out.
    pub async fn retry_session(&self, id: &TransactionId) -> Result<CheckoutOutcome, CheckoutError> {
        let tx = self.db.fetch_transaction(id).await?.ok_or_else(|| ValidationError::TransactionNotFound(id.clone()))?;
        let retryable = tx.status == TransactionStatus::Pending &&
            tx.external_reference.is_none() &&
            tx.funding_mode.needs_processor();
        if !retryable {
            return Err(ValidationError::NotRetryable { id: id.clone(), status: tx.status }.into());
        }
        info!("🛒️ Retrying payment session for [{id}]");
        self.open_session(tx).await
    }

    pub async fn transaction(&self, id: &TransactionId) -> Result<Option<Transaction>, CheckoutError> {
        Ok(self.db.fetch_transaction(id).await?)
    }

    //-----------------------------------------   Helpers   --------------------------------------------------------

    fn priced(&self, tx: NewTransaction, split: CommissionSplit, now: DateTime<Utc>) -> NewTransaction {
        let mode = if split.gross.is_zero() { FundingMode::Free } else { FundingMode::ExternalCharge };
        tx.with_amounts(split.gross, split.commission)
            .with_funding(mode, Cents::zero())
            .with_created_at(now)
            .with_expires_at(now + self.config.session_lifetime)
    }

    /// The business being paid. It needs a payout account unless there is nothing to pay out.
    async fn payee(&self, business_id: &str, gross: Cents) -> Result<Business, CheckoutError> {
        let business = self
            .db
            .fetch_business(business_id)
            .await?
            .ok_or_else(|| ValidationError::SubjectNotFound(format!("Business {business_id}")))?;
        if business.payout_account.is_none() && !gross.is_zero() {
            return Err(ValidationError::NoPayoutAccount(business_id.to_string()).into());
        }
        Ok(business)
    }

    async fn check_boost_target(
        &self,
        kind: TransactionKind,
        business: &Business,
        target_id: &str,
    ) -> Result<(), CheckoutError> {
        let owner = match kind {
            TransactionKind::ProfileBoost => Some(target_id.to_string()),
            TransactionKind::EventBoost => self.db.fetch_event(target_id).await?.map(|e| e.business_id),
            TransactionKind::OfferBoost => self.db.fetch_offer(target_id).await?.map(|o| o.business_id),
            _ => None,
        };
        match owner {
            None => Err(ValidationError::SubjectNotFound(format!("{kind} target {target_id}")).into()),
            Some(owner) if owner != business.id => {
                Err(ValidationError::WrongBusiness(target_id.to_string(), business.id.clone()).into())
            },
            Some(_) => Ok(()),
        }
    }

    async fn boost_funding(
        &self,
        business_id: &str,
        gross: Cents,
        preference: FundingPreference,
    ) -> Result<(FundingMode, Cents), CheckoutError> {
        if gross.is_zero() {
            return Ok((FundingMode::Free, Cents::zero()));
        }
        if preference == FundingPreference::External {
            return Ok((FundingMode::ExternalCharge, Cents::zero()));
        }
        let remaining =
            self.db.fetch_ledger(business_id).await?.map(|l| l.monthly_budget_remaining_cents).unwrap_or_default();
        let funding = if remaining >= gross {
            (FundingMode::InternalBudget, gross)
        } else if remaining > Cents::zero() {
            (FundingMode::Mixed, remaining)
        } else {
            (FundingMode::ExternalCharge, Cents::zero())
        };
        debug!("🛒️ {business_id} has {remaining} of budget. A boost of {gross} is funded as {}", funding.0);
        Ok(funding)
    }

    async fn open(&self, new_tx: NewTransaction) -> Result<CheckoutOutcome, CheckoutError> {
        let tx = self.db.insert_transaction(new_tx).await?;
        let id = tx.id.clone();
        info!("🛒️ {} [{id}] created for {}: {} ({})", tx.kind, tx.payer_ref, tx.amount_gross_cents, tx.funding_mode);
        match tx.funding_mode {
            FundingMode::Free => self.complete_now(&id).await,
            FundingMode::InternalBudget => match self.db.reserve_budget_for_transaction(&id).await? {
                BudgetReservation::Reserved(_) | BudgetReservation::AlreadyReserved(_) => self.complete_now(&id).await,
                BudgetReservation::Insufficient => {
                    info!("🛒️ [{id}] could not be funded from the budget of {}", tx.payer_ref);
                    Err(FundingError::InsufficientBudget {
                        business_id: tx.payer_ref.clone(),
                        required: tx.partial_budget_cents,
                    }
                    .into())
                },
            },
            FundingMode::ExternalCharge | FundingMode::Mixed => self.open_session(tx).await,
        }
    }

    async fn complete_now(&self, id: &TransactionId) -> Result<CheckoutOutcome, CheckoutError> {
        match self.completion.complete_funded(id).await {
            Ok(CompletionOutcome::Completed(tx)) | Ok(CompletionOutcome::AlreadyTerminal(tx)) => {
                Ok(CheckoutOutcome::Completed(tx))
            },
            Err(CompletionError::InventoryExhausted { reason, .. }) => Err(ValidationError::SoldOut(reason).into()),
            Err(CompletionError::SubjectUnavailable { reason, .. }) => Err(ValidationError::NotOnSale(reason).into()),
            Err(e) => Err(CheckoutError::Internal(e.to_string())),
        }
    }

    /// Opens the processor session and moves the transaction to `awaiting_external_payment`. If the processor fails or
    /// does not answer in time, the transaction stays `pending`.
    async fn open_session(&self, tx: Transaction) -> Result<CheckoutOutcome, CheckoutError> {
        let id = tx.id.clone();
        let split = if tx.kind.is_boost() {
            None
        } else {
            let business = self.payee(&tx.payee_ref, tx.amount_gross_cents).await?;
            let application_fee = tx.commission_cents;
            business.payout_account.map(|destination| SplitDirective { destination, application_fee })
        };
        let request = CheckoutSessionRequest {
            transaction_id: id.clone(),
            amount: tx.external_amount(),
            currency: self.config.currency.clone(),
            description: format!("{} {}", tx.kind, tx.subject_id),
            success_url: self.config.success_url.replace("{TRANSACTION_ID}", id.as_str()),
            cancel_url: self.config.cancel_url.replace("{TRANSACTION_ID}", id.as_str()),
            split,
            expires_at: tx.expires_at,
        };
        let session =
            match tokio::time::timeout(self.config.session_timeout, self.processor.create_checkout_session(&request))
                .await
            {
                Ok(Ok(session)) => session,
                Ok(Err(e)) => {
                    warn!("🛒️ Payment session for [{id}] could not be opened. {e}");
                    return Err(FundingError::SessionUnavailable { id, reason: e.to_string() }.into());
                },
                Err(_) => {
                    warn!("🛒️ Payment session for [{id}] timed out. The transaction stays pending.");
                    let reason = "The payment processor did not answer in time".to_string();
                    return Err(FundingError::SessionUnavailable { id, reason }.into());
                },
            };
        let tx = self.db.attach_external_reference(&id, &session.reference).await?;
        debug!("🛒️ [{id}] is awaiting payment of {} on session {}", tx.external_amount(), session.reference);
        Ok(CheckoutOutcome::Redirect { transaction: tx, url: session.url })
    }
}

fn check_window(
    subject: &str,
    opens: Option<DateTime<Utc>>,
    closes: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    let open = opens.map(|t| t <= now).unwrap_or(true) && closes.map(|t| now < t).unwrap_or(true);
    if open {
        Ok(())
    } else {
        Err(ValidationError::NotOnSale(subject.to_string()))
    }
}
