#![allow(dead_code)]

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};

use activation_engine::{
    db_types::PlanTier,
    engine_objects::SweepConfig,
    events::{
        EventHandlers,
        EventHooks,
        TransactionCancelledEvent,
        TransactionFlaggedEvent,
        TransactionFulfilledEvent,
    },
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::seed_business,
        MockProcessor,
    },
    ActivationApi,
    AdminApi,
    CheckoutApi,
    CompletionApi,
    LedgerApi,
    ReconciliationApi,
    SqliteDatabase,
    WebhookApi,
};

pub type Captured<E> = Arc<Mutex<Vec<E>>>;

/// A fully wired engine on a fresh database, with every published event captured.
pub struct Harness {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub processor: MockProcessor,
    pub completion: CompletionApi<SqliteDatabase>,
    pub checkout: CheckoutApi<SqliteDatabase, MockProcessor>,
    pub webhooks: WebhookApi<SqliteDatabase, MockProcessor>,
    pub sweeper: ReconciliationApi<SqliteDatabase, MockProcessor>,
    pub activations: ActivationApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
    pub admin: AdminApi<SqliteDatabase>,
    pub fulfilled: Captured<TransactionFulfilledEvent>,
    pub cancelled: Captured<TransactionCancelledEvent>,
    pub flagged: Captured<TransactionFlaggedEvent>,
}

fn capture<E: Clone + Send + 'static>(
    store: &Captured<E>,
) -> impl Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
    let store = Arc::clone(store);
    move |ev: E| {
        let store = Arc::clone(&store);
        Box::pin(async move {
            store.lock().unwrap().push(ev);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Harness ({})", self.db_path)
    }
}

impl Harness {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let processor = MockProcessor::new();
        let fulfilled = Captured::default();
        let cancelled = Captured::default();
        let flagged = Captured::default();
        let mut hooks = EventHooks::default();
        hooks
            .on_transaction_fulfilled(capture(&fulfilled))
            .on_transaction_cancelled(capture(&cancelled))
            .on_transaction_flagged(capture(&flagged));
        let handlers = EventHandlers::new(64, hooks);
        let producers = handlers.producers();
        handlers.start_handlers();

        let completion = CompletionApi::new(db.clone(), producers.clone());
        let checkout = CheckoutApi::new(processor.clone(), completion.clone());
        let ledger = LedgerApi::new(db.clone());
        let webhooks = WebhookApi::new(processor.clone(), completion.clone(), ledger.clone());
        let config = SweepConfig { min_age: chrono::Duration::zero(), ..SweepConfig::default() };
        let sweeper = ReconciliationApi::new(processor.clone(), completion.clone()).with_config(config);
        let activations = ActivationApi::new(db.clone(), producers);
        let admin = AdminApi::new(completion.clone());
        Self {
            db_path: url,
            db,
            processor,
            completion,
            checkout,
            webhooks,
            sweeper,
            activations,
            ledger,
            admin,
            fulfilled,
            cancelled,
            flagged,
        }
    }

    pub async fn with_business(self, id: &str, plan: PlanTier) -> Self {
        seed_business(&self.db, id, plan).await;
        self
    }
}

/// Waits for the event handlers to catch up.
pub async fn wait_for<E>(store: &Captured<E>, count: usize) -> Vec<E>
where E: Clone {
    for _ in 0..100 {
        if store.lock().unwrap().len() >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    store.lock().unwrap().clone()
}
