use activation_engine::{
    db_types::TransactionStatus,
    traits::{TransactionQueryFilter, TransactionStore},
};
use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::TestServer;
use crate::data_objects::CheckoutResponse;

fn ticket_request(quantity: i64) -> TestRequest {
    TestRequest::post()
        .uri("/checkout")
        .set_json(json!({ "kind": "ticket_order", "tier_id": "floor", "payer": "alice", "quantity": quantity }))
}

#[actix_web::test]
async fn health_check() {
    let server = TestServer::new().await;
    let (status, body) = server.call(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn ticket_checkout_opens_a_session() {
    let server = TestServer::new().await;
    let (status, body) = server.call(ticket_request(2)).await;
    assert_eq!(status, StatusCode::OK);
    let res: CheckoutResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(res.status, TransactionStatus::AwaitingExternalPayment);
    let url = res.redirect_url.expect("Expected a redirect url");
    assert!(url.starts_with("https://pay.example.test/cs_test_"));
    let session = server.processor.session_for(&res.transaction_id).expect("No session was opened");
    assert_eq!(session.request.amount.value(), 5000);

    let uri = format!("/transactions/{}", res.transaction_id);
    let (status, body) = server.call(TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let tx: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(tx["status"], "awaiting_external_payment");
    assert_eq!(tx["quantity"], 2);
}

#[actix_web::test]
async fn sold_out_is_unprocessable() {
    let server = TestServer::new().await;
    let (status, body) = server.call(ticket_request(11)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("sold out"), "{body}");
    assert_eq!(server.processor.session_count(), 0);
}

#[actix_web::test]
async fn unknown_subject_is_not_found() {
    let server = TestServer::new().await;
    let req = TestRequest::post()
        .uri("/checkout")
        .set_json(json!({ "kind": "ticket_order", "tier_id": "balcony", "payer": "alice", "quantity": 1 }));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn malformed_checkout_request() {
    let server = TestServer::new().await;
    let req = TestRequest::post().uri("/checkout").set_json(json!({ "kind": "raffle", "payer": "alice" }));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_transaction() {
    let server = TestServer::new().await;
    let (status, body) = server.call(TestRequest::get().uri("/transactions/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("error"));
}

#[actix_web::test]
async fn retry_after_the_processor_was_down() {
    let server = TestServer::new().await;
    server.processor.fail_next_session();
    let (status, _) = server.call(ticket_request(1)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let query = TransactionQueryFilter::default().with_status(TransactionStatus::Pending);
    let pending = server.db.search_transactions(query).await.unwrap();
    assert_eq!(pending.len(), 1);
    let uri = format!("/transactions/{}/retry", pending[0].id);
    let (status, body) = server.call(TestRequest::post().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let res: CheckoutResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(res.status, TransactionStatus::AwaitingExternalPayment);
    assert!(res.redirect_url.is_some());

    // The session is open now, so another retry is refused
    let (status, _) = server.call(TestRequest::post().uri(&uri)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
