use activation_engine::{db_types::Cents, test_utils::MockProcessor};
use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::{json, Value};

use super::helpers::{admin_request, TestServer};
use crate::{data_objects::CheckoutResponse, routes::SIGNATURE_HEADER};

#[actix_web::test]
async fn admin_requires_a_token() {
    let server = TestServer::new().await;
    let (status, _) = server.call(TestRequest::get().uri("/admin/flagged")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::get().uri("/admin/flagged").insert_header(("Authorization", "Bearer guess"));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = server.call(admin_request(TestRequest::get().uri("/admin/flagged"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn manual_runs() {
    let server = TestServer::new().await;
    let (status, body) = server.call(admin_request(TestRequest::post().uri("/admin/sweep"))).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["examined"], 0);
    assert_eq!(summary["errors"], 0);

    let (status, body) = server.call(admin_request(TestRequest::post().uri("/admin/activations"))).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["activated"], 0);
}

#[actix_web::test]
async fn ledger_reset_is_idempotent() {
    let server = TestServer::new().await;
    let body = json!({
        "budget": 5000,
        "commission_free_offers": 2,
        "period_start": "2026-10-01T00:00:00Z",
        "period_end": "2026-11-01T00:00:00Z"
    });
    let reset = || admin_request(TestRequest::post().uri("/admin/ledger/biz/reset").set_json(body.clone()));

    let (status, res) = server.call(reset()).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["reset"], true);
    assert_eq!(res["ledger"]["monthly_budget_remaining_cents"], 5000);

    let (status, res) = server.call(reset()).await;
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(res["reset"], false);

    let (status, res) = server.call(admin_request(TestRequest::get().uri("/admin/ledger/biz"))).await;
    assert_eq!(status, StatusCode::OK);
    let ledger: Value = serde_json::from_str(&res).unwrap();
    assert_eq!(ledger["commission_free_offers_remaining"], 2);
}

#[actix_web::test]
async fn ledger_errors() {
    let server = TestServer::new().await;
    let (status, _) = server.call(admin_request(TestRequest::get().uri("/admin/ledger/biz"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let body = json!({
        "budget": 5000,
        "period_start": "2026-10-01T00:00:00Z",
        "period_end": "2026-11-01T00:00:00Z"
    });
    let req = TestRequest::post().uri("/admin/ledger/nobody/reset").set_json(body);
    let (status, _) = server.call(admin_request(req)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let backwards = json!({
        "budget": 5000,
        "period_start": "2026-11-01T00:00:00Z",
        "period_end": "2026-10-01T00:00:00Z"
    });
    let req = TestRequest::post().uri("/admin/ledger/biz/reset").set_json(backwards);
    let (status, _) = server.call(admin_request(req)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn resolve_a_flagged_transaction() {
    let server = TestServer::new().await;
    let req = TestRequest::post()
        .uri("/checkout")
        .set_json(json!({ "kind": "ticket_order", "tier_id": "floor", "payer": "dave", "quantity": 1 }));
    let (_, body) = server.call(req).await;
    let res: CheckoutResponse = serde_json::from_str(&body).unwrap();
    let id = res.transaction_id.to_string();
    let resolve_uri = format!("/admin/transactions/{id}/resolve");

    // Not flagged yet
    let req = TestRequest::post().uri(&resolve_uri).set_json(json!({ "action": "retry" }));
    let (status, _) = server.call(admin_request(req)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The processor reports the wrong amount
    let reference = server.processor.session_for(&res.transaction_id).unwrap().status.reference;
    server.processor.pay_amount(&reference, Cents::from(100));
    let payload = server.processor.completed_event("evt_short", &reference).unwrap();
    let req = TestRequest::post()
        .uri("/webhook/processor")
        .insert_header((SIGNATURE_HEADER, MockProcessor::SIGNATURE))
        .set_payload(payload);
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server.call(admin_request(TestRequest::get().uri("/admin/flagged"))).await;
    let flagged: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0]["id"], id.as_str());

    let req = TestRequest::post().uri(&resolve_uri).set_json(json!({ "action": "cancel", "refund": true }));
    let (status, body) = server.call(admin_request(req)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let tx: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(tx["status"], "cancelled");

    let (_, body) = server.call(admin_request(TestRequest::get().uri("/admin/flagged"))).await;
    assert_eq!(body, "[]");
}
