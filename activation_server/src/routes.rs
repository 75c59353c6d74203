//! Request handler definitions
//!
//! Define each route and its handler here. Handlers should stay short: anything with real logic belongs in the
//! engine, not in this module.
//!
//! A note about performance:
//! Each worker thread processes its requests sequentially, so a handler that blocks the thread stalls every other
//! request on that worker. Database and processor calls are all async; keep it that way.
use activation_engine::{
    db_types::TransactionId,
    engine_objects::{CheckoutRequest, Resolution},
    traits::ResetOutcome,
    ActivationApi,
    AdminApi,
    CheckoutApi,
    LedgerApi,
    PaymentProcessor,
    ReconciliationApi,
    TransactionStore,
    WebhookApi,
};
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use log::*;
use serde_json::json;

use crate::{
    data_objects::{CheckoutResponse, LedgerResetRequest, LedgerResetResponse},
    errors::ServerError,
};

pub const SIGNATURE_HEADER: &str = checkout_processor::webhook::SIGNATURE_HEADER;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl TransactionStore, PaymentProcessor);
/// Starts a purchase.
///
/// The body is a [`CheckoutRequest`], tagged by `kind`. If the purchase needs an external payment, the response
/// carries the processor's `redirect_url` and the transaction stays `pending` until the payment is confirmed.
/// Purchases funded entirely from a business budget complete immediately and come back `fulfilled`.
pub async fn checkout<B, P>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<CheckoutApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    P: PaymentProcessor,
{
    let request = body.into_inner();
    debug!("💻️ POST checkout for {request:?}");
    let outcome = api.initiate_checkout(request).await.map_err(|e| {
        debug!("💻️ Checkout was refused. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(CheckoutResponse::from(outcome)))
}

route!(transaction_by_id => Get "/transactions/{id}" impl TransactionStore, PaymentProcessor);
/// Lets a client poll a transaction after returning from the processor's hosted page.
pub async fn transaction_by_id<B, P>(
    path: web::Path<String>,
    api: web::Data<CheckoutApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    P: PaymentProcessor,
{
    let id = TransactionId::from(path.into_inner());
    trace!("💻️ GET transaction {id}");
    let tx = api.transaction(&id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Transaction {id}")))?;
    Ok(HttpResponse::Ok().json(tx))
}

route!(retry_checkout => Post "/transactions/{id}/retry" impl TransactionStore, PaymentProcessor);
/// Opens a fresh processor session for a transaction whose session could not be created the first time.
pub async fn retry_checkout<B, P>(
    path: web::Path<String>,
    api: web::Data<CheckoutApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    P: PaymentProcessor,
{
    let id = TransactionId::from(path.into_inner());
    debug!("💻️ POST retry for transaction {id}");
    let outcome = api.retry_session(&id).await?;
    Ok(HttpResponse::Ok().json(CheckoutResponse::from(outcome)))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(processor_webhook => Post "/webhook/processor" impl TransactionStore, PaymentProcessor);
/// Receives event notifications from the payment processor.
///
/// The raw body is handed to the engine untouched since the signature covers the exact bytes. Anything other than a
/// 2xx makes the processor redeliver, so we only answer with an error when redelivery could help (a transient
/// failure), or when the request is not from the processor at all.
pub async fn processor_webhook<B, P>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    P: PaymentProcessor,
{
    trace!("💻️ Received processor webhook ({} bytes)", body.len());
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::InvalidRequestBody(format!("Missing {SIGNATURE_HEADER} header")))?;
    let ack = api.handle_webhook_event(body.as_ref(), signature).await.map_err(|e| {
        warn!("💻️ Webhook could not be handled. {e}");
        ServerError::from(e)
    })?;
    debug!("💻️ Webhook acknowledged as {ack:?}");
    Ok(HttpResponse::Ok().json(json!({ "ack": ack })))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(run_sweep => Post "/sweep" impl TransactionStore, PaymentProcessor);
/// Runs a reconciliation sweep now, outside the worker's schedule.
pub async fn run_sweep<B, P>(api: web::Data<ReconciliationApi<B, P>>) -> Result<HttpResponse, ServerError>
where
    B: TransactionStore,
    P: PaymentProcessor,
{
    info!("💻️ Manual reconciliation sweep requested");
    let summary = api.run_sweep(Utc::now()).await;
    Ok(HttpResponse::Ok().json(summary))
}

route!(run_activations => Post "/activations" impl TransactionStore);
pub async fn run_activations<B: TransactionStore>(
    api: web::Data<ActivationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    info!("💻️ Manual boost activation run requested");
    let summary = api.schedule_activations(Utc::now()).await;
    Ok(HttpResponse::Ok().json(summary))
}

route!(flagged => Get "/flagged" impl TransactionStore);
pub async fn flagged<B: TransactionStore>(api: web::Data<AdminApi<B>>) -> Result<HttpResponse, ServerError> {
    let flagged = api.flagged_transactions().await?;
    debug!("💻️ {} flagged transactions", flagged.len());
    Ok(HttpResponse::Ok().json(flagged))
}

route!(resolve_flagged => Post "/transactions/{id}/resolve" impl TransactionStore);
/// Clears the integrity fence on a flagged transaction.
///
/// The body is `{"action": "retry"}` or `{"action": "cancel", "refund": true|false}`.
pub async fn resolve_flagged<B: TransactionStore>(
    path: web::Path<String>,
    body: web::Json<Resolution>,
    api: web::Data<AdminApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = TransactionId::from(path.into_inner());
    let resolution = body.into_inner();
    info!("💻️ Resolving flagged transaction {id} with {resolution:?}");
    let tx = api.resolve_flagged(&id, resolution).await?;
    Ok(HttpResponse::Ok().json(tx))
}

route!(ledger => Get "/ledger/{business_id}" impl TransactionStore);
pub async fn ledger<B: TransactionStore>(
    path: web::Path<String>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let business_id = path.into_inner();
    let entry =
        api.ledger(&business_id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("Ledger {business_id}")))?;
    Ok(HttpResponse::Ok().json(entry))
}

route!(reset_ledger => Post "/ledger/{business_id}/reset" impl TransactionStore);
/// Starts a new billing period for a business. Replaying the same period is harmless and reports `reset: false`.
pub async fn reset_ledger<B: TransactionStore>(
    path: web::Path<String>,
    body: web::Json<LedgerResetRequest>,
    api: web::Data<LedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let business_id = path.into_inner();
    let req = body.into_inner();
    info!("💻️ Ledger reset requested for {business_id}");
    let outcome = api
        .reset(&business_id, req.budget, req.commission_free_offers, req.period_start, req.period_end)
        .await?;
    let response = LedgerResetResponse {
        reset: matches!(outcome, ResetOutcome::Reset(_)),
        ledger: outcome.entry().clone(),
    };
    Ok(HttpResponse::Ok().json(response))
}
