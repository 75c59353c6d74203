use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{Transaction, TransactionStatus},
    engine_api::engine_objects::ActivationSummary,
    events::{BoostActivatedEvent, EventProducers},
    traits::{ActivationResult, TransactionStore},
};

/// `ActivationApi` moves paid boosts through their time window: `scheduled → active` once `starts_at` passes, and
/// `active → ended` once `ends_at` passes.
///
/// Both transitions are guarded updates, so overlapping runs of the scheduler are harmless.
pub struct ActivationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ActivationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActivationApi")
    }
}

impl<B: Clone> Clone for ActivationApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> ActivationApi<B>
where B: TransactionStore
{
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub async fn schedule_activations(&self, now: DateTime<Utc>) -> ActivationSummary {
        let mut summary = ActivationSummary::default();
        let due = match self.db.due_boosts(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("⏰️ Could not fetch due boosts. {e}");
                summary.errors += 1;
                return summary;
            },
        };
        for tx in due {
            summary.examined += 1;
            match tx.status {
                TransactionStatus::Scheduled => self.activate(&tx, now, &mut summary).await,
                TransactionStatus::Active => self.end(&tx, now, &mut summary).await,
                status => warn!("⏰️ Boost [{}] was returned as due but is {status}", tx.id),
            }
        }
        if summary.examined > 0 {
            info!("⏰️ Activation run finished. {summary:?}");
        }
        summary
    }

    async fn activate(&self, tx: &Transaction, now: DateTime<Utc>, summary: &mut ActivationSummary) {
        match self.db.activate_boost(&tx.id, now).await {
            Ok(ActivationResult::Activated(active)) => {
                info!("⏰️ {} [{}] on {} is now active", active.kind, active.id, active.subject_id);
                summary.activated += 1;
                self.producers.publish_activated(BoostActivatedEvent::new(active.clone())).await;
                // A boost whose whole window passed while it was waiting is closed in the same run.
                if active.ends_at.map(|end| end <= now).unwrap_or(false) {
                    self.end(&active, now, summary).await;
                }
            },
            Ok(ActivationResult::Deferred(reason)) => {
                warn!("⏰️ Boost [{}] is due but cannot start yet. {reason}", tx.id);
                summary.deferred += 1;
                summary.errors += 1;
            },
            Ok(ActivationResult::NotDue) => {
                debug!("⏰️ Boost [{}] was activated by another run", tx.id);
            },
            Err(e) => {
                error!("⏰️ Could not activate boost [{}]. {e}", tx.id);
                summary.errors += 1;
            },
        }
    }

    async fn end(&self, tx: &Transaction, now: DateTime<Utc>, summary: &mut ActivationSummary) {
        match self.db.end_boost(&tx.id, now).await {
            Ok(Some(ended)) => {
                info!("⏰️ {} [{}] on {} has ended", ended.kind, ended.id, ended.subject_id);
                summary.ended += 1;
            },
            Ok(None) => debug!("⏰️ Boost [{}] was ended by another run", tx.id),
            Err(e) => {
                error!("⏰️ Could not end boost [{}]. {e}", tx.id);
                summary.errors += 1;
            },
        }
    }
}
