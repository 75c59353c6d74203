use crate::{
    db_types::{Business, Event, Offer, OfferPurchase, Reservation, Ticket, TicketTier, TransactionId},
    traits::StoreError,
};

/// Read access to the purchasable subjects, plus the upserts the domain layer uses to keep them current.
///
/// The engine only ever mutates inventory inside [`crate::traits::TransactionStore`] transitions. The upserts here
/// belong to the domain CRUD layer (and tests).
#[allow(async_fn_in_trait)]
pub trait CatalogManagement: Clone {
    async fn fetch_business(&self, id: &str) -> Result<Option<Business>, StoreError>;
    async fn fetch_event(&self, id: &str) -> Result<Option<Event>, StoreError>;
    async fn fetch_ticket_tier(&self, id: &str) -> Result<Option<TicketTier>, StoreError>;
    async fn fetch_reservation(&self, id: &str) -> Result<Option<Reservation>, StoreError>;
    async fn fetch_offer(&self, id: &str) -> Result<Option<Offer>, StoreError>;
    async fn fetch_offer_purchase(&self, transaction_id: &TransactionId) -> Result<Option<OfferPurchase>, StoreError>;
    async fn fetch_tickets(&self, transaction_id: &TransactionId) -> Result<Vec<Ticket>, StoreError>;

    /// Tickets the payer already holds for the tier, plus those in their still-open orders for it.
    async fn tickets_committed_to_payer(&self, tier_id: &str, payer: &str) -> Result<i64, StoreError>;

    /// Pending and paid purchases of the offer by the payer.
    async fn offer_purchases_by_payer(&self, offer_id: &str, payer: &str) -> Result<i64, StoreError>;

    /// Purchases of the offer still waiting for payment. They count against stock until they expire.
    async fn pending_offer_purchases(&self, offer_id: &str) -> Result<i64, StoreError>;

    async fn upsert_business(&self, business: Business) -> Result<(), StoreError>;
    async fn upsert_event(&self, event: Event) -> Result<(), StoreError>;
    async fn upsert_ticket_tier(&self, tier: TicketTier) -> Result<(), StoreError>;
    async fn upsert_reservation(&self, reservation: Reservation) -> Result<(), StoreError>;
    async fn upsert_offer(&self, offer: Offer) -> Result<(), StoreError>;
}
