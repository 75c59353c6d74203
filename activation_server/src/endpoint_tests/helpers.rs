use activation_engine::{
    db_types::PlanTier,
    events::EventProducers,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_business, seed_event, seed_ticket_tier},
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
use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use tae_common::Secret;

use crate::{
    middleware::AdminAuthMiddlewareFactory,
    routes::{
        health,
        CheckoutRoute,
        FlaggedRoute,
        LedgerRoute,
        ProcessorWebhookRoute,
        ResetLedgerRoute,
        ResolveFlaggedRoute,
        RetryCheckoutRoute,
        RunActivationsRoute,
        RunSweepRoute,
        TransactionByIdRoute,
    },
};

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// A fresh database with one business ("biz", basic plan, with a payout account) selling the "floor" tier of the
/// "gig" event at 25.00 with a capacity of 10.
pub struct TestServer {
    pub db: SqliteDatabase,
    pub processor: MockProcessor,
}

impl TestServer {
    pub async fn new() -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        seed_business(&db, "biz", PlanTier::Basic).await;
        seed_event(&db, "gig", "biz").await;
        seed_ticket_tier(&db, "floor", "gig", "biz", 2500, 10).await;
        Self { db, processor: MockProcessor::new() }
    }

    /// Runs the request against an app wired the same way as the real server, with the mock processor standing in
    /// for the payment processor. Errors raised by middleware are rendered into their status and message.
    pub async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        let db = self.db.clone();
        let processor = self.processor.clone();
        let completion = CompletionApi::new(db.clone(), EventProducers::default());
        let ledger_api = LedgerApi::new(db.clone());
        let checkout_api = CheckoutApi::new(processor.clone(), completion.clone());
        let webhook_api = WebhookApi::new(processor.clone(), completion.clone(), ledger_api.clone());
        let sweep_api = ReconciliationApi::new(processor, completion.clone());
        let activation_api = ActivationApi::new(db, EventProducers::default());
        let admin_scope = web::scope("/admin")
            .wrap(AdminAuthMiddlewareFactory::new(Secret::new(ADMIN_TOKEN.to_string())))
            .app_data(web::Data::new(sweep_api))
            .app_data(web::Data::new(activation_api))
            .app_data(web::Data::new(AdminApi::new(completion)))
            .service(RunSweepRoute::<SqliteDatabase, MockProcessor>::new())
            .service(RunActivationsRoute::<SqliteDatabase>::new())
            .service(FlaggedRoute::<SqliteDatabase>::new())
            .service(ResolveFlaggedRoute::<SqliteDatabase>::new())
            .service(LedgerRoute::<SqliteDatabase>::new())
            .service(ResetLedgerRoute::<SqliteDatabase>::new());
        let app = App::new()
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(ledger_api))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase, MockProcessor>::new())
            .service(TransactionByIdRoute::<SqliteDatabase, MockProcessor>::new())
            .service(RetryCheckoutRoute::<SqliteDatabase, MockProcessor>::new())
            .service(ProcessorWebhookRoute::<SqliteDatabase, MockProcessor>::new())
            .service(admin_scope);
        let service = test::init_service(app).await;
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                let body = String::from_utf8_lossy(&body).into_owned();
                debug!("🚀️ {status} {body}");
                (status, body)
            },
            Err(e) => (e.as_response_error().status_code(), e.to_string()),
        }
    }
}

pub fn admin_request(req: TestRequest) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {ADMIN_TOKEN}")))
}
