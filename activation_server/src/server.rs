use std::time::Duration;

use activation_engine::{
    events::EventProducers,
    ActivationApi,
    AdminApi,
    CheckoutApi,
    CompletionApi,
    LedgerApi,
    ReconciliationApi,
    SqliteDatabase,
    WebhookApi,
};
use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use checkout_processor::ProcessorApi;
use log::*;

use crate::{
    activation_worker::start_activation_worker,
    config::ServerConfig,
    errors::ServerError,
    integrations::{
        notifications::{create_notification_handlers, NotificationDispatcher},
        processor::{create_refund_handlers, ProcessorGateway},
    },
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
    sweep_worker::start_sweep_worker,
};

pub type Gateway = ProcessorGateway<ProcessorApi>;

const DB_MAX_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, DB_MAX_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let client = ProcessorApi::new(config.processor.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = ProcessorGateway::new(client);
    let producers = start_event_handlers(&config, gateway.clone(), db.clone())?;

    let completion = CompletionApi::new(db.clone(), producers.clone());
    let sweeper = ReconciliationApi::new(gateway.clone(), completion).with_config(config.sweep);
    let _sweep = start_sweep_worker(sweeper, config.sweep_interval);
    let activations = ActivationApi::new(db.clone(), producers.clone());
    let _activations = start_activation_worker(activations, config.activation_interval);

    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Spawns the refund and notification event handlers and returns the producers that feed them.
pub fn start_event_handlers(
    config: &ServerConfig,
    gateway: Gateway,
    db: SqliteDatabase,
) -> Result<EventProducers, ServerError> {
    let refunds = create_refund_handlers(gateway, db);
    let mut producers = refunds.producers();
    refunds.start_handlers();
    if let Some(url) = &config.notification_url {
        let dispatcher = NotificationDispatcher::new(url).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        let notifications = create_notification_handlers(dispatcher);
        producers.extend(notifications.producers());
        notifications.start_handlers();
        info!("📬️ Engine events will be forwarded to {url}");
    }
    Ok(producers)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: Gateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let completion = CompletionApi::new(db.clone(), producers.clone());
        let ledger_api = LedgerApi::new(db.clone()).with_allowances(config.allowances);
        let checkout_api = CheckoutApi::new(gateway.clone(), completion.clone())
            .with_commission(config.commission)
            .with_boost_rates(config.boost_rates)
            .with_config(config.checkout.clone());
        let webhook_api = WebhookApi::new(gateway.clone(), completion.clone(), ledger_api.clone());
        let sweep_api = ReconciliationApi::new(gateway.clone(), completion.clone()).with_config(config.sweep);
        let activation_api = ActivationApi::new(db.clone(), producers.clone());
        let admin_api = AdminApi::new(completion);
        let admin_scope = web::scope("/admin")
            .wrap(AdminAuthMiddlewareFactory::new(config.admin_token.clone()))
            .app_data(web::Data::new(sweep_api))
            .app_data(web::Data::new(activation_api))
            .app_data(web::Data::new(admin_api))
            .service(RunSweepRoute::<SqliteDatabase, Gateway>::new())
            .service(RunActivationsRoute::<SqliteDatabase>::new())
            .service(FlaggedRoute::<SqliteDatabase>::new())
            .service(ResolveFlaggedRoute::<SqliteDatabase>::new())
            .service(LedgerRoute::<SqliteDatabase>::new())
            .service(ResetLedgerRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tae::access_log"))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(ledger_api))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase, Gateway>::new())
            .service(TransactionByIdRoute::<SqliteDatabase, Gateway>::new())
            .service(RetryCheckoutRoute::<SqliteDatabase, Gateway>::new())
            .service(ProcessorWebhookRoute::<SqliteDatabase, Gateway>::new())
            .service(admin_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
