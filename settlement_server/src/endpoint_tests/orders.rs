use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use settlement_engine::test_utils::{
    fake_upstream::UpstreamBehaviour,
    requests::{bank_payout_params, order_query_params, payin_params},
};
use sg_common::{Money, SIGN_FIELD};

use super::helpers::{json_post, parse, TestContext};

#[actix_web::test]
async fn health_endpoint() {
    let ctx = TestContext::new().await;
    let (status, body) = ctx.send(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn payin_returns_order_no_and_payment_url() {
    let ctx = TestContext::new().await;
    let params = payin_params(&ctx.merchant, &ctx.gateway, "W-1", "1000.00");
    let (status, body) = ctx.send(json_post("/payin", &json!(params))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = parse(&body);
    let order_no = body["order_no"].as_str().expect("order_no missing");
    assert!(order_no.starts_with("PI"));
    assert_eq!(body["payment_url"], format!("https://pay.example.com/UP-{order_no}"));
    // Pay-ins do not touch the balance until the provider confirms them
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(10_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(0));
}

#[actix_web::test]
async fn payin_accepts_form_bodies() {
    let ctx = TestContext::new().await;
    let params = payin_params(&ctx.merchant, &ctx.gateway, "W-FORM", "250.00");
    let req = TestRequest::post().uri("/payin").set_form(&params);
    let (status, body) = ctx.send(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(parse(&body)["order_no"].is_string());
}

#[actix_web::test]
async fn tampered_payin_is_unauthorized() {
    let ctx = TestContext::new().await;
    let mut params = payin_params(&ctx.merchant, &ctx.gateway, "W-1", "1000.00");
    params.insert("amount".into(), "9000.00".into());
    let (status, body) = ctx.send(json_post("/payin", &json!(params))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(parse(&body)["error"].is_string());
    assert_eq!(ctx.upstream.payin_count(), 0);
}

#[actix_web::test]
async fn unsigned_payin_is_unauthorized() {
    let ctx = TestContext::new().await;
    let mut params = payin_params(&ctx.merchant, &ctx.gateway, "W-1", "1000.00");
    params.remove(SIGN_FIELD);
    let (status, _) = ctx.send(json_post("/payin", &json!(params))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn small_payin_is_a_bad_request() {
    let ctx = TestContext::new().await;
    let params = payin_params(&ctx.merchant, &ctx.gateway, "W-1", "0.50");
    let (status, _) = ctx.send(json_post("/payin", &json!(params))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn refused_payin_is_a_bad_gateway() {
    let ctx = TestContext::new().await;
    ctx.upstream.set_behaviour(UpstreamBehaviour::Reject);
    let params = payin_params(&ctx.merchant, &ctx.gateway, "W-1", "1000.00");
    let (status, _) = ctx.send(json_post("/payin", &json!(params))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn payout_freezes_funds() {
    let ctx = TestContext::new().await;
    let params = bank_payout_params(&ctx.merchant, &ctx.gateway, "W-7", "2000.00");
    let (status, body) = ctx.send(json_post("/payout", &json!(params))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = parse(&body);
    assert!(body["order_no"].as_str().unwrap().starts_with("PO"));
    assert!(body.get("payment_url").is_none());
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(8_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(2_000));
    // Nothing goes to the provider before an admin approves it
    assert_eq!(ctx.upstream.payout_count(), 0);
}

#[actix_web::test]
async fn duplicate_payout_is_a_conflict_with_the_existing_order() {
    let ctx = TestContext::new().await;
    let params = bank_payout_params(&ctx.merchant, &ctx.gateway, "W-7", "100.00");
    let (status, body) = ctx.send(json_post("/payout", &json!(params))).await;
    assert_eq!(status, StatusCode::OK);
    let first = parse(&body)["order_no"].clone();
    let (status, body) = ctx.send(json_post("/payout", &json!(params))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(parse(&body)["order_no"], first);
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.frozen_balance, Money::from_major(100));
}

#[actix_web::test]
async fn oversized_payout_needs_payment() {
    let ctx = TestContext::new().await;
    let params = bank_payout_params(&ctx.merchant, &ctx.gateway, "W-8", "10000.01");
    let (status, _) = ctx.send(json_post("/payout", &json!(params))).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(10_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(0));
}

#[actix_web::test]
async fn unknown_merchant_is_not_found() {
    let ctx = TestContext::new().await;
    let mut params = bank_payout_params(&ctx.merchant, &ctx.gateway, "W-9", "10.00");
    params.insert("merchant_id".into(), "M999".into());
    let (status, _) = ctx.send(json_post("/payout", &json!(params))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn inactive_merchant_is_forbidden() {
    let ctx = TestContext::new().await;
    ctx.merchant_api().set_merchant_active("M100", false).await.unwrap();
    let params = bank_payout_params(&ctx.merchant, &ctx.gateway, "W-9", "10.00");
    let (status, _) = ctx.send(json_post("/payout", &json!(params))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn merchants_can_query_their_orders() {
    let ctx = TestContext::new().await;
    let params = bank_payout_params(&ctx.merchant, &ctx.gateway, "W-Q", "2000.00");
    let (status, _) = ctx.send(json_post("/payout", &json!(params))).await;
    assert_eq!(status, StatusCode::OK);

    let query = order_query_params(&ctx.merchant, &ctx.gateway, "W-Q");
    let uri = format!("/order/M100/W-Q?sign={}", query[SIGN_FIELD]);
    let (status, body) = ctx.send(TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = parse(&body);
    assert_eq!(body["merchant_order_no"], "W-Q");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["amount"], "2000.00");
    assert_eq!(body["fee"], "80.00");
    assert_eq!(body["net_amount"], "1920.00");

    let (status, _) = ctx.send(TestRequest::get().uri("/order/M100/W-Q?sign=0000")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let query = order_query_params(&ctx.merchant, &ctx.gateway, "W-NOPE");
    let uri = format!("/order/M100/W-NOPE?sign={}", query[SIGN_FIELD]);
    let (status, _) = ctx.send(TestRequest::get().uri(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
