use std::time::Duration;

use cucumber::{then, when};
use futures_util::future::join_all;
use settlement_engine::{
    db_types::{FinalOutcome, OrderStatusType, SettlementEvent},
    test_utils::{
        fake_upstream::{signed_callback, UpstreamBehaviour},
        requests::{bank_payout_params, payin_params},
    },
    EngineConfig,
    OrderFlowApi,
    SettlementDatabase,
    SettlementError,
};
use sg_common::{Money, SIGN_FIELD};

use crate::cucumber::SettlementWorld;

fn error_name(e: &SettlementError) -> &'static str {
    match e {
        SettlementError::InvalidSignature => "InvalidSignature",
        SettlementError::InsufficientBalance { .. } => "InsufficientBalance",
        SettlementError::DuplicateOrder(_) => "DuplicateOrder",
        SettlementError::MerchantInactive(_) => "MerchantInactive",
        SettlementError::UnknownMerchant(_) => "UnknownMerchant",
        SettlementError::BelowMinimumAmount { .. } => "BelowMinimumAmount",
        SettlementError::AlreadyProcessing(_) => "AlreadyProcessing",
        SettlementError::UpstreamSubmissionFailed { .. } => "UpstreamSubmissionFailed",
        SettlementError::UpstreamTimeout { .. } => "UpstreamTimeout",
        SettlementError::CallbackSignatureInvalid => "CallbackSignatureInvalid",
        SettlementError::OrderNotFound(_) => "OrderNotFound",
        SettlementError::OrderAlreadyFinalized(..) => "OrderAlreadyFinalized",
        SettlementError::NotAPayout(_) => "NotAPayout",
        SettlementError::DuplicateCredit(_) => "DuplicateCredit",
        SettlementError::InvalidRequest(_) => "InvalidRequest",
        SettlementError::GatewayUnavailable(_) => "GatewayUnavailable",
        SettlementError::DatabaseError(_) => "DatabaseError",
    }
}

fn event_name(e: &SettlementEvent) -> &'static str {
    match e {
        SettlementEvent::Approved { .. } => "Approved",
        SettlementEvent::SubmittedToUpstream { .. } => "SubmittedToUpstream",
        SettlementEvent::SubmissionFailed { .. } => "SubmissionFailed",
        SettlementEvent::SubmissionOutcomeUnknown { .. } => "SubmissionOutcomeUnknown",
        SettlementEvent::Rejected { .. } => "Rejected",
        SettlementEvent::CallbackReceived { .. } => "CallbackReceived",
        SettlementEvent::ManuallyResolved { .. } => "ManuallyResolved",
        SettlementEvent::Expired { .. } => "Expired",
    }
}

/// After a failed creation there is no order to return, but one may have been stored (e.g. a refused pay-in).
async fn refresh_by_merchant_order(world: &mut SettlementWorld, account: &str, merchant_order_no: &str) {
    let merchant = world.merchant(account).await;
    let order = world
        .system()
        .db
        .fetch_transaction_by_merchant_order(merchant.id, merchant_order_no)
        .await
        .expect("Error fetching order");
    if order.is_some() {
        world.last_order = order;
    }
}

async fn refresh_last_order(world: &mut SettlementWorld) {
    let order_no = world.last_order().order_no.clone();
    let order = world.system().db.fetch_transaction(&order_no).await.expect("Error fetching order");
    world.last_order = order;
}

#[when(expr = "merchant {string} requests a payout of {word} as {string}")]
async fn request_payout(world: &mut SettlementWorld, account: String, amount: String, merchant_order_no: String) {
    let merchant = world.merchant(&account).await;
    let gateway = world.gateway_for(&merchant).await;
    let params = bank_payout_params(&merchant, &gateway, &merchant_order_no, &amount);
    let result = world.system().orders.create_payout(&params).await;
    world.record(result);
    refresh_by_merchant_order(world, &account, &merchant_order_no).await;
}

#[when(expr = "merchant {string} requests a payout of {word} as {string} with a tampered signature")]
async fn request_tampered_payout(world: &mut SettlementWorld, account: String, amount: String, order_no: String) {
    let merchant = world.merchant(&account).await;
    let gateway = world.gateway_for(&merchant).await;
    let mut params = bank_payout_params(&merchant, &gateway, &order_no, &amount);
    // Sign a small amount, then ask for a large one
    params.insert("amount".to_string(), "99999.00".to_string());
    let result = world.system().orders.create_payout(&params).await;
    world.record(result);
}

#[when(expr = "merchant {string} resends payout {string} of {word} relabelled as {string}")]
async fn relabel_payout(world: &mut SettlementWorld, account: String, order_no: String, amount: String, label: String) {
    let merchant = world.merchant(&account).await;
    let gateway = world.gateway_for(&merchant).await;
    // The signed request exactly as it was sent, plus an unsigned order reference
    let mut params = bank_payout_params(&merchant, &gateway, &order_no, &amount);
    params.insert("merchant_order_no".to_string(), label);
    let result = world.system().orders.create_payout(&params).await;
    world.record(result);
}

#[when(expr = "merchant {string} requests a payout of {word} as {string} signed with the api key")]
async fn request_payout_wrong_key(world: &mut SettlementWorld, account: String, amount: String, order_no: String) {
    let mut merchant = world.merchant(&account).await;
    let gateway = world.gateway_for(&merchant).await;
    merchant.payout_key = merchant.api_key.clone();
    let params = bank_payout_params(&merchant, &gateway, &order_no, &amount);
    let result = world.system().orders.create_payout(&params).await;
    world.record(result);
}

#[when(expr = "merchant {string} requests a pay-in of {word} as {string}")]
async fn request_payin(world: &mut SettlementWorld, account: String, amount: String, merchant_order_no: String) {
    let merchant = world.merchant(&account).await;
    let gateway = world.gateway_for(&merchant).await;
    let params = payin_params(&merchant, &gateway, &merchant_order_no, &amount);
    let result = world.system().orders.create_payin(&params).await;
    world.record(result);
    refresh_by_merchant_order(world, &account, &merchant_order_no).await;
}

#[when(expr = "merchant {string} requests a pay-in of {word} as {string} without a signature")]
async fn request_unsigned_payin(world: &mut SettlementWorld, account: String, amount: String, order_no: String) {
    let merchant = world.merchant(&account).await;
    let gateway = world.gateway_for(&merchant).await;
    let mut params = payin_params(&merchant, &gateway, &order_no, &amount);
    params.remove(SIGN_FIELD);
    let result = world.system().orders.create_payin(&params).await;
    world.record(result);
}

#[when(expr = "the provider is {word}")]
async fn provider_behaviour(world: &mut SettlementWorld, behaviour: String) {
    let behaviour = match behaviour.as_str() {
        "accepting" => UpstreamBehaviour::Accept,
        "refusing" => UpstreamBehaviour::Reject,
        "unreachable" => UpstreamBehaviour::Unreachable,
        "slow" => UpstreamBehaviour::Timeout,
        other => panic!("Unknown provider behaviour: {other}"),
    };
    world.system().upstream.set_behaviour(behaviour);
}

#[when("the admin approves the last order")]
async fn approve(world: &mut SettlementWorld) {
    let order_no = world.last_order().order_no.clone();
    let result = world.system().payouts.approve(&order_no).await;
    world.record(result);
    refresh_last_order(world).await;
}

#[when("the admin rejects the last order")]
async fn reject(world: &mut SettlementWorld) {
    let order_no = world.last_order().order_no.clone();
    let result = world.system().payouts.reject(&order_no, "Beneficiary details could not be verified").await;
    world.record(result);
    refresh_last_order(world).await;
}

#[when(expr = "the admin manually marks the last order as {word}")]
async fn resolve(world: &mut SettlementWorld, outcome: String) {
    let outcome = match outcome.as_str() {
        "success" => FinalOutcome::Success,
        "failed" => FinalOutcome::Failed,
        other => panic!("Unknown outcome: {other}"),
    };
    let order_no = world.last_order().order_no.clone();
    let result = world.system().payouts.resolve(&order_no, outcome, "Checked with the provider").await;
    world.record(result);
    refresh_last_order(world).await;
}

#[when(expr = "the provider reports {word} for the last order")]
async fn provider_callback(world: &mut SettlementWorld, status: String) {
    provider_callbacks(world, status, 1).await;
}

#[when(expr = "the provider reports {word} for the last order {int} times at once")]
async fn provider_callbacks(world: &mut SettlementWorld, status: String, count: usize) {
    let merchant = world.merchant_by_id(world.last_order().merchant_id).await;
    let gateway = world.gateway_for(&merchant).await;
    let payload = signed_callback(&gateway, world.last_order(), &status);
    let callbacks = &world.system().callbacks;
    let results = join_all((0..count).map(|_| callbacks.handle_callback(&gateway.code, &payload))).await;
    for result in results {
        if let Err(e) = result {
            world.last_error = Some(e);
        }
    }
    refresh_last_order(world).await;
}

#[when("a forged callback reports SUCCESS for the last order")]
async fn forged_callback(world: &mut SettlementWorld) {
    let merchant = world.merchant_by_id(world.last_order().merchant_id).await;
    let mut gateway = world.gateway_for(&merchant).await;
    let code = gateway.code.clone();
    gateway.api_key = "not-the-gateway-secret".into();
    let payload = signed_callback(&gateway, world.last_order(), "SUCCESS");
    if let Err(e) = world.system().callbacks.handle_callback(&code, &payload).await {
        world.last_error = Some(e);
    }
    refresh_last_order(world).await;
}

#[when(expr = "the pay-in expiry job runs with an expiry of {int} seconds")]
async fn expire_payins(world: &mut SettlementWorld, seconds: i64) {
    let system = world.system();
    let config = EngineConfig::default().with_payin_expiry(chrono::Duration::seconds(seconds));
    let api = OrderFlowApi::new(system.db.clone(), system.upstream.clone(), Default::default(), config);
    api.expire_payins().await.expect("Error expiring pay-ins");
    refresh_last_order(world).await;
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut SettlementWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "merchant {string} has {word} available and {word} frozen")]
async fn check_balances(world: &mut SettlementWorld, account: String, available: String, frozen: String) {
    let merchant = world.merchant(&account).await;
    let available = available.parse::<Money>().expect("Invalid amount");
    let frozen = frozen.parse::<Money>().expect("Invalid amount");
    assert_eq!(merchant.balance, available, "Available balance is incorrect");
    assert_eq!(merchant.frozen_balance, frozen, "Frozen balance is incorrect");
}

#[then(expr = "the last order is {word}")]
async fn check_status(world: &mut SettlementWorld, status: String) {
    let status = status.parse::<OrderStatusType>().expect("Invalid status");
    assert_eq!(world.last_order().status, status);
}

#[then(expr = "the last order has a fee of {word} and a net amount of {word}")]
async fn check_fees(world: &mut SettlementWorld, fee: String, net: String) {
    let order = world.last_order();
    assert_eq!(order.fee, fee.parse::<Money>().expect("Invalid amount"));
    assert_eq!(order.net_amount, net.parse::<Money>().expect("Invalid amount"));
}

#[then("the last order has a payment url")]
async fn check_payment_url(world: &mut SettlementWorld) {
    let url = world.last_order().payment_url.as_deref().unwrap_or_default();
    assert!(url.starts_with("https://pay.example.com/"), "Unexpected payment url: {url}");
}

#[then(expr = "the last order log reads {string}")]
async fn check_event_log(world: &mut SettlementWorld, expected: String) {
    let events = world.last_order().events().iter().map(event_name).collect::<Vec<_>>().join(", ");
    assert_eq!(events, expected);
}

#[then(expr = "the request fails with {word}")]
async fn check_error(world: &mut SettlementWorld, expected: String) {
    let err = world.last_error.take().expect("Expected the last request to fail, but it succeeded");
    assert_eq!(error_name(&err), expected, "Unexpected error: {err}");
}

#[then("the request succeeds")]
async fn check_no_error(world: &mut SettlementWorld) {
    if let Some(e) = world.last_error.take() {
        panic!("Expected success, but got {e}");
    }
}

#[then(expr = "the provider has received {int} payout(s)")]
async fn check_payout_count(world: &mut SettlementWorld, count: usize) {
    assert_eq!(world.system().upstream.payout_count(), count);
}
