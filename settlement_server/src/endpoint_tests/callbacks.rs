use actix_web::http::StatusCode;
use serde_json::json;
use settlement_engine::{
    db_types::{OrderNo, OrderStatusType, Transaction},
    test_utils::{
        fake_upstream::signed_callback,
        requests::{bank_payout_params, payin_params},
    },
};
use sg_common::Money;

use super::helpers::{json_post, parse, signed_admin_post, TestContext, ADMIN_SECRET};

async fn approved_payout(ctx: &TestContext, merchant_order_no: &str, amount: &str) -> Transaction {
    let params = bank_payout_params(&ctx.merchant, &ctx.gateway, merchant_order_no, amount);
    let (status, body) = ctx.send(json_post("/payout", &json!(params))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order_no = parse(&body)["order_no"].as_str().unwrap().to_string();
    let approve = json!({ "transaction_id": order_no, "action": "approve" });
    let (status, body) = ctx.send(signed_admin_post("/api/admin/process-payout", &approve, ADMIN_SECRET)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    ctx.merchant_api().transaction(&OrderNo::from(order_no)).await.unwrap()
}

#[actix_web::test]
async fn success_callback_settles_the_payout() {
    let ctx = TestContext::new().await;
    let order = approved_payout(&ctx, "W-CB", "2000.00").await;
    let callback = signed_callback(&ctx.gateway, &order, "SUCCESS");
    let (status, body) = ctx.send(json_post("/callback/bank-inr", &callback)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(8_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(0));

    // Providers retry. Replays are acknowledged and change nothing.
    let (status, body) = ctx.send(json_post("/callback/bank-inr", &callback)).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(8_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(0));
}

#[actix_web::test]
async fn failed_callback_releases_the_payout() {
    let ctx = TestContext::new().await;
    let order = approved_payout(&ctx, "W-CB", "2000.00").await;
    let callback = signed_callback(&ctx.gateway, &order, "FAILED");
    let (status, _) = ctx.send(json_post("/callback/bank-inr", &callback)).await;
    assert_eq!(status, StatusCode::OK);
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(10_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(0));
    let order = ctx.merchant_api().transaction(&order.order_no).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Failed);
}

#[actix_web::test]
async fn payin_callback_credits_the_net_amount() {
    let ctx = TestContext::new().await;
    let params = payin_params(&ctx.merchant, &ctx.gateway, "W-IN", "1000.00");
    let (status, body) = ctx.send(json_post("/payin", &json!(params))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order_no = OrderNo::from(parse(&body)["order_no"].as_str().unwrap());
    let order = ctx.merchant_api().transaction(&order_no).await.unwrap();
    let callback = signed_callback(&ctx.gateway, &order, "SUCCESS");
    let (status, _) = ctx.send(json_post("/callback/bank-inr", &callback)).await;
    assert_eq!(status, StatusCode::OK);
    // 2.5% of 1000.00 is kept as a fee
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_minor(1_097_500));
}

#[actix_web::test]
async fn forged_callbacks_are_acknowledged_but_ignored() {
    let ctx = TestContext::new().await;
    let order = approved_payout(&ctx, "W-CB", "2000.00").await;
    let mut callback = signed_callback(&ctx.gateway, &order, "FAILED");
    callback["sign"] = json!("DEADBEEF");
    let (status, body) = ctx.send(json_post("/callback/bank-inr", &callback)).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));
    let order = ctx.merchant_api().transaction(&order.order_no).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.frozen_balance, Money::from_major(2_000));
}

#[actix_web::test]
async fn callbacks_for_unknown_gateways_are_acknowledged() {
    let ctx = TestContext::new().await;
    let order = approved_payout(&ctx, "W-CB", "2000.00").await;
    let callback = signed_callback(&ctx.gateway, &order, "SUCCESS");
    let (status, body) = ctx.send(json_post("/callback/no-such-gateway", &callback)).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));
    let order = ctx.merchant_api().transaction(&order.order_no).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn callbacks_are_not_acknowledged_until_stored() {
    let ctx = TestContext::new().await;
    let order = approved_payout(&ctx, "W-CB", "2000.00").await;
    // Make every status change fail, as a full disk or a broken database would
    let trigger = "CREATE TRIGGER refuse_status BEFORE UPDATE OF status ON transactions \
                   BEGIN SELECT RAISE(ABORT, 'no space'); END";
    sqlx::query(trigger).execute(ctx.db.pool()).await.unwrap();
    let callback = signed_callback(&ctx.gateway, &order, "SUCCESS");
    let (status, body) = ctx.send(json_post("/callback/bank-inr", &callback)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_ne!(body, "ok");
    assert!(!body.contains("no space"));
    let stored = ctx.merchant_api().transaction(&order.order_no).await.unwrap();
    assert_eq!(stored.status, OrderStatusType::Pending);
    assert_eq!(ctx.merchant_now().await.frozen_balance, Money::from_major(2_000));

    // The provider retries once the database is healthy again
    sqlx::query("DROP TRIGGER refuse_status").execute(ctx.db.pool()).await.unwrap();
    let (status, body) = ctx.send(json_post("/callback/bank-inr", &callback)).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "ok"));
    let merchant = ctx.merchant_now().await;
    assert_eq!(merchant.balance, Money::from_major(8_000));
    assert_eq!(merchant.frozen_balance, Money::from_major(0));
}
