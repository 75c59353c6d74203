use activation_engine::{db_types::TransactionStatus, test_utils::MockProcessor};
use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::{json, Value};

use super::helpers::TestServer;
use crate::{data_objects::CheckoutResponse, routes::SIGNATURE_HEADER};

/// Buys two floor tickets and returns the transaction id and the processor's session reference.
async fn open_checkout(server: &TestServer) -> (String, String) {
    let req = TestRequest::post()
        .uri("/checkout")
        .set_json(json!({ "kind": "ticket_order", "tier_id": "floor", "payer": "bob", "quantity": 2 }));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let res: CheckoutResponse = serde_json::from_str(&body).unwrap();
    let session = server.processor.session_for(&res.transaction_id).expect("No session");
    (res.transaction_id.to_string(), session.status.reference)
}

fn webhook(payload: Vec<u8>, signature: &str) -> TestRequest {
    TestRequest::post().uri("/webhook/processor").insert_header((SIGNATURE_HEADER, signature)).set_payload(payload)
}

async fn status_of(server: &TestServer, id: &str) -> String {
    let (_, body) = server.call(TestRequest::get().uri(&format!("/transactions/{id}"))).await;
    let tx: Value = serde_json::from_str(&body).unwrap();
    tx["status"].as_str().unwrap_or_default().to_string()
}

#[actix_web::test]
async fn paid_checkout_is_fulfilled_once() {
    let server = TestServer::new().await;
    let (id, reference) = open_checkout(&server).await;
    server.processor.pay(&reference);
    let payload = server.processor.completed_event("evt_1", &reference).unwrap();

    let (status, body) = server.call(webhook(payload.clone(), MockProcessor::SIGNATURE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"ack":"processed"}"#);
    assert_eq!(status_of(&server, &id).await, "fulfilled");

    let (status, body) = server.call(webhook(payload, MockProcessor::SIGNATURE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"ack":"duplicate"}"#);
    assert_eq!(status_of(&server, &id).await, "fulfilled");
}

#[actix_web::test]
async fn unpaid_completion_is_ignored() {
    let server = TestServer::new().await;
    let (id, reference) = open_checkout(&server).await;
    let payload = server.processor.completed_event("evt_2", &reference).unwrap();
    let (status, body) = server.call(webhook(payload, MockProcessor::SIGNATURE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"ack":"ignored"}"#);
    assert_eq!(status_of(&server, &id).await, "awaiting_external_payment");
}

#[actix_web::test]
async fn expired_session() {
    let server = TestServer::new().await;
    let (id, reference) = open_checkout(&server).await;
    server.processor.expire(&reference);
    let payload = server.processor.expired_event("evt_3", &reference).unwrap();
    let (status, body) = server.call(webhook(payload, MockProcessor::SIGNATURE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"ack":"processed"}"#);
    assert_eq!(status_of(&server, &id).await, TransactionStatus::Expired.to_string());
}

#[actix_web::test]
async fn bad_signature_is_rejected() {
    let server = TestServer::new().await;
    let (id, reference) = open_checkout(&server).await;
    server.processor.pay(&reference);
    let payload = server.processor.completed_event("evt_4", &reference).unwrap();
    let (status, _) = server.call(webhook(payload, "forged")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(status_of(&server, &id).await, "awaiting_external_payment");
}

#[actix_web::test]
async fn missing_signature_header() {
    let server = TestServer::new().await;
    let req = TestRequest::post().uri("/webhook/processor").set_payload("{}");
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains(SIGNATURE_HEADER), "{body}");
}

#[actix_web::test]
async fn malformed_payload() {
    let server = TestServer::new().await;
    let (status, _) = server.call(webhook(b"not json".to_vec(), MockProcessor::SIGNATURE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
