use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use settlement_engine::{
    db_types::{OrderNo, OrderStatusType},
    test_utils::{fake_upstream::UpstreamBehaviour, requests::bank_payout_params},
};
use sg_common::Money;

use super::helpers::{json_post, parse, signed_admin_get, signed_admin_post, TestContext, ADMIN_SECRET};

const PROCESS_PAYOUT: &str = "/api/admin/process-payout";

async fn pending_payout(ctx: &TestContext, amount: &str) -> String {
    let params = bank_payout_params(&ctx.merchant, &ctx.gateway, "W-ADMIN", amount);
    let (status, body) = ctx.send(json_post("/payout", &json!(params))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    parse(&body)["order_no"].as_str().unwrap().to_string()
}

#[actix_web::test]
async fn unsigned_admin_requests_are_unauthorized() {
    let ctx = TestContext::new().await;
    let order_no = pending_payout(&ctx, "2000.00").await;
    let body = json!({ "transaction_id": order_no, "action": "approve" });
    let (status, _) = ctx.send(json_post(PROCESS_PAYOUT, &body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.upstream.payout_count(), 0);
}

#[actix_web::test]
async fn admin_requests_signed_with_the_wrong_secret_are_forbidden() {
    let ctx = TestContext::new().await;
    let order_no = pending_payout(&ctx, "2000.00").await;
    let body = json!({ "transaction_id": order_no, "action": "approve" });
    let (status, _) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &body, "not-the-secret")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(ctx.upstream.payout_count(), 0);
}

#[actix_web::test]
async fn approving_twice_dispatches_once() {
    let ctx = TestContext::new().await;
    let order_no = pending_payout(&ctx, "2000.00").await;
    let body = json!({ "transaction_id": order_no, "action": "approve" });
    let (status, response) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(parse(&response)["status"], "pending");
    let (status, _) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(ctx.upstream.payout_count(), 1);
}

#[actix_web::test]
async fn rejecting_returns_the_funds_once() {
    let ctx = TestContext::new().await;
    let order_no = pending_payout(&ctx, "2000.00").await;
    let body = json!({ "transaction_id": order_no, "action": "reject", "reason": "Suspicious destination" });
    let (status, response) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(parse(&response)["status"], "failed");
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(10_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(0));

    let (status, _) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(ctx.merchant_now().await.balance, Money::from_major(10_000));
}

#[actix_web::test]
async fn provider_timeout_keeps_funds_frozen_until_resolved() {
    let ctx = TestContext::new().await;
    let order_no = pending_payout(&ctx, "2000.00").await;
    ctx.upstream.set_behaviour(UpstreamBehaviour::Timeout);
    let approve = json!({ "transaction_id": order_no, "action": "approve" });
    let (status, _) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &approve, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.frozen_balance, Money::from_major(2_000));

    // Rejecting is no longer possible once the payout may have reached the provider
    let reject = json!({ "transaction_id": order_no, "action": "reject" });
    let (status, _) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &reject, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let confirm = json!({ "transaction_id": order_no, "action": "confirm", "reason": "Paid according to provider" });
    let (status, response) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &confirm, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(parse(&response)["status"], "success");
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(8_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(0));
}

#[actix_web::test]
async fn manual_fail_releases_a_dispatched_payout() {
    let ctx = TestContext::new().await;
    let order_no = pending_payout(&ctx, "2000.00").await;
    ctx.upstream.set_behaviour(UpstreamBehaviour::Timeout);
    let approve = json!({ "transaction_id": order_no, "action": "approve" });
    let (status, _) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &approve, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let fail = json!({ "transaction_id": order_no, "action": "fail", "reason": "Provider has no record" });
    let (status, _) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &fail, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(10_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(0));
    let order = ctx.merchant_api().transaction(&OrderNo::from(order_no)).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Failed);
}

#[actix_web::test]
async fn resolving_an_undispatched_payout_is_a_bad_request() {
    let ctx = TestContext::new().await;
    let order_no = pending_payout(&ctx, "2000.00").await;
    let confirm = json!({ "transaction_id": order_no, "action": "confirm" });
    let (status, _) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &confirm, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_payouts_are_not_found() {
    let ctx = TestContext::new().await;
    let body = json!({ "transaction_id": "PO-NOPE", "action": "approve" });
    let (status, _) = ctx.send(signed_admin_post(PROCESS_PAYOUT, &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn admins_can_look_up_orders_and_merchants() {
    let ctx = TestContext::new().await;
    let order_no = pending_payout(&ctx, "2000.00").await;

    let (status, body) = ctx.send(signed_admin_get(&format!("/api/admin/order/{order_no}"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = parse(&body);
    assert_eq!(order["order_no"], order_no.as_str());
    assert_eq!(order["amount"], 200_000);

    let (status, body) = ctx.send(signed_admin_get("/api/admin/merchant/M100")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let merchant = parse(&body);
    assert_eq!(merchant["balance"], "8000.00");
    assert_eq!(merchant["frozen_balance"], "2000.00");
    assert_eq!(merchant["total_funds"], "10000.00");
    assert_eq!(merchant["recent_transactions"].as_array().map(Vec::len), Some(1));
    assert!(merchant.get("api_key").is_none());

    let (status, _) = ctx.send(signed_admin_get("/api/admin/merchant/M999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = ctx.send(TestRequest::get().uri("/api/admin/merchant/M100")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admins_can_credit_merchants() {
    let ctx = TestContext::new().await;
    let body = json!({ "merchant_id": "M100", "amount": "500.00", "reference": "SLIP-1" });
    let (status, response) = ctx.send(signed_admin_post("/api/admin/credit", &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(parse(&response)["success"], true);
    assert_eq!(ctx.merchant_now().await.balance, Money::from_major(10_500));

    let body = json!({ "merchant_id": "M100", "amount": "lots", "reference": "SLIP-2" });
    let (status, _) = ctx.send(signed_admin_post("/api/admin/credit", &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json!({ "merchant_id": "M100", "amount": "-5.00", "reference": "SLIP-3" });
    let (status, _) = ctx.send(signed_admin_post("/api/admin/credit", &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json!({ "merchant_id": "M100", "amount": "5.00", "reference": " " });
    let (status, _) = ctx.send(signed_admin_post("/api/admin/credit", &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ctx.merchant_now().await.balance, Money::from_major(10_500));
}

#[actix_web::test]
async fn replayed_credits_are_refused() {
    let ctx = TestContext::new().await;
    let body = json!({ "merchant_id": "M100", "amount": "500.00", "reference": "SLIP-7" });
    let (status, response) = ctx.send(signed_admin_post("/api/admin/credit", &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    // The exact same signed request a second time
    let (status, response) = ctx.send(signed_admin_post("/api/admin/credit", &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{response}");
    assert!(parse(&response)["error"].as_str().unwrap().contains("SLIP-7"));
    // A reference is spent even for a different amount
    let body = json!({ "merchant_id": "M100", "amount": "1.00", "reference": "SLIP-7" });
    let (status, _) = ctx.send(signed_admin_post("/api/admin/credit", &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(ctx.merchant_now().await.balance, Money::from_major(10_500));

    let body = json!({ "merchant_id": "M100", "amount": "1.00", "reference": "SLIP-8" });
    let (status, _) = ctx.send(signed_admin_post("/api/admin/credit", &body, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx.merchant_now().await.balance, Money::from_minor(1_050_100));
}
