use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{EffectRecord, SettlementEntry, Transaction, TransactionId, TransactionStatus},
    engine_api::{completion_api::CompletionApi, engine_objects::Resolution, errors::AdminError},
    traits::{TransactionQueryFilter, TransactionStore},
};

/// Operator tooling: inspecting transactions and clearing the integrity fence on flagged ones.
pub struct AdminApi<B> {
    db: B,
    completion: CompletionApi<B>,
}

impl<B> Debug for AdminApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdminApi")
    }
}

impl<B> AdminApi<B>
where B: TransactionStore
{
    pub fn new(completion: CompletionApi<B>) -> Self {
        Self { db: completion.db().clone(), completion }
    }

    pub async fn flagged_transactions(&self) -> Result<Vec<Transaction>, AdminError> {
        let query = TransactionQueryFilter::default().with_status(TransactionStatus::Flagged);
        Ok(self.db.search_transactions(query).await?)
    }

    pub async fn search(&self, query: TransactionQueryFilter) -> Result<Vec<Transaction>, AdminError> {
        Ok(self.db.search_transactions(query).await?)
    }

    pub async fn transaction(&self, id: &TransactionId) -> Result<Transaction, AdminError> {
        self.db.fetch_transaction(id).await?.ok_or_else(|| AdminError::TransactionNotFound(id.clone()))
    }

    pub async fn effects(&self, id: &TransactionId) -> Result<Vec<EffectRecord>, AdminError> {
        Ok(self.db.effects_for_transaction(id).await?)
    }

    pub async fn settlements(&self, business_id: &str) -> Result<Vec<SettlementEntry>, AdminError> {
        Ok(self.db.settlements_for_business(business_id).await?)
    }

    /// Resolves a flagged transaction.
    ///
    /// `Retry` puts it back in the open status it was fenced from, after which the next webhook redelivery or sweep
    /// re-evaluates it. `Cancel` closes it, optionally requesting a refund of anything captured.
    pub async fn resolve_flagged(&self, id: &TransactionId, resolution: Resolution) -> Result<Transaction, AdminError> {
        let tx = self.transaction(id).await?;
        if tx.status != TransactionStatus::Flagged {
            return Err(AdminError::NotFlagged { id: id.clone(), status: tx.status });
        }
        let resolved = match resolution {
            Resolution::Retry => self.db.reopen_flagged(id).await?,
            Resolution::Cancel { refund } => {
                let reason = tx.status_reason.as_deref().unwrap_or("Flagged transaction cancelled by an operator");
                self.completion.cancel(id, reason, refund).await?
            },
        };
        match resolved {
            Some(tx) => {
                info!("✅️ Flagged transaction [{id}] resolved ({resolution:?}). It is now {}", tx.status);
                Ok(tx)
            },
            None => {
                let latest = self.transaction(id).await?;
                Err(AdminError::NotFlagged { id: id.clone(), status: latest.status })
            },
        }
    }
}
