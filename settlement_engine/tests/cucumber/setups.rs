use cucumber::given;
use settlement_engine::db_types::{GatewayType, NewMerchant, NewPaymentGateway};
use sg_common::{FeeRate, Money};

use crate::cucumber::{SettlementSystem, SettlementWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut SettlementWorld) {
    let system = SettlementSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a {word} gateway {string} for {word}")]
async fn gateway(world: &mut SettlementWorld, gateway_type: String, code: String, currency: String) {
    let gateway_type = gateway_type.parse::<GatewayType>().expect("Unknown gateway type");
    let new_gateway = NewPaymentGateway::new(&code, gateway_type, "https://provider.example.com", "app-1", "gw-secret")
        .with_currency(&currency);
    let gateway = world.system().merchants.create_gateway(new_gateway).await.expect("Error creating gateway");
    world.system_mut().gateways.insert(code, gateway);
}

#[given(expr = "gateway {string} has a minimum withdrawal of {word}")]
async fn minimum_withdrawal(world: &mut SettlementWorld, code: String, minimum: String) {
    let minimum = minimum.parse::<Money>().expect("Invalid amount");
    sqlx::query("UPDATE gateways SET min_withdrawal = $1 WHERE code = $2")
        .bind(minimum)
        .bind(&code)
        .execute(world.system().db.pool())
        .await
        .expect("Error updating gateway");
    let gateway = world.system().merchants.gateway(&code).await.expect("Error fetching gateway").expect("No gateway");
    world.system_mut().gateways.insert(code, gateway);
}

#[given(expr = "merchant {string} on gateway {string} with a balance of {word} and a fee of {word}%")]
async fn merchant(world: &mut SettlementWorld, account: String, code: String, balance: String, fee: String) {
    let gateway_id = world.system().gateways.get(&code).expect("Gateway has not been set up").id;
    let fee = fee.parse::<FeeRate>().expect("Invalid fee");
    let api_key = format!("{account}-api-key");
    let payout_key = format!("{account}-payout-key");
    let merchant = NewMerchant::new(&account, &format!("Merchant {account}"), &api_key, gateway_id)
        .with_payout_key(&payout_key)
        .with_fees(fee, fee);
    let api = &world.system().merchants;
    api.create_merchant(merchant).await.expect("Error creating merchant");
    let balance = balance.parse::<Money>().expect("Invalid balance");
    if balance.is_positive() {
        api.credit(&account, balance, &format!("opening-{account}")).await.expect("Error crediting merchant");
    }
}

#[given(expr = "merchant {string} is deactivated")]
async fn deactivate(world: &mut SettlementWorld, account: String) {
    world.system().merchants.set_merchant_active(&account, false).await.expect("Error deactivating merchant");
}
