use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    App,
};
use log::debug;
use serde_json::Value;
use settlement_engine::{
    db_types::{GatewayType, Merchant, NewMerchant, NewPaymentGateway, PaymentGateway},
    events::EventProducers,
    test_utils::{fake_upstream::FakeUpstream, prepare_env::fresh_database},
    CallbackApi,
    EngineConfig,
    MerchantApi,
    OrderFlowApi,
    PayoutApi,
    SqliteDatabase,
};
use sg_common::{FeeRate, Money, Secret};

use crate::{helpers::calculate_hmac, server::configure_routes, server::ADMIN_SIGNATURE_HEADER};

pub const ADMIN_SECRET: &str = "endpoint-test-admin-secret";

/// A fresh database with one bank transfer gateway and merchant `M100` holding 10000.00, with a 4% payout fee.
pub struct TestContext {
    pub db: SqliteDatabase,
    pub upstream: FakeUpstream,
    pub gateway: PaymentGateway,
    pub merchant: Merchant,
}

impl TestContext {
    pub async fn new() -> Self {
        let _ = env_logger::try_init();
        let db = fresh_database().await;
        let admin = MerchantApi::new(db.clone(), EngineConfig::default());
        let gateway =
            NewPaymentGateway::new("bank-inr", GatewayType::BankTransfer, "https://bank.example", "1", "gw-key");
        let gateway = admin.create_gateway(gateway).await.expect("Could not create gateway");
        let merchant = NewMerchant::new("M100", "Endpoint Test Merchant", "m100-key", gateway.id)
            .with_fees(FeeRate::from_bps(250).unwrap(), FeeRate::from_bps(400).unwrap());
        admin.create_merchant(merchant).await.expect("Could not create merchant");
        let merchant =
            admin.credit("M100", Money::from_major(10_000), "opening").await.expect("Could not credit merchant");
        Self { db, upstream: FakeUpstream::new(), gateway, merchant }
    }

    pub fn merchant_api(&self) -> MerchantApi<SqliteDatabase> {
        MerchantApi::new(self.db.clone(), EngineConfig::default())
    }

    pub async fn merchant_now(&self) -> Merchant {
        self.merchant_api().merchant("M100").await.expect("Merchant is missing")
    }

    /// Runs `req` through an app wired exactly like the server, except that providers are faked.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let config = EngineConfig::default();
        let producers = EventProducers::default();
        let db = self.db.clone();
        let upstream = self.upstream.clone();
        let app = App::new()
            .app_data(web::Data::new(OrderFlowApi::new(
                db.clone(),
                upstream.clone(),
                producers.clone(),
                config.clone(),
            )))
            .app_data(web::Data::new(PayoutApi::new(db.clone(), upstream.clone(), producers.clone())))
            .app_data(web::Data::new(CallbackApi::new(db.clone(), upstream.clone(), producers)))
            .app_data(web::Data::new(MerchantApi::new(db, config)))
            .configure(configure_routes::<SqliteDatabase, FakeUpstream>(Secret::from(ADMIN_SECRET), true));
        let service = test::init_service(app).await;
        debug!("Making request");
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            Err(e) => {
                let res = e.error_response();
                let status = res.status();
                let body = res.into_body().try_into_bytes().unwrap_or_default();
                (status, String::from_utf8_lossy(&body).into_owned())
            },
        }
    }
}

pub fn json_post(path: &str, body: &Value) -> TestRequest {
    TestRequest::post().uri(path).insert_header(ContentType::json()).set_payload(body.to_string())
}

/// A POST to an admin route, signed with `secret`.
pub fn signed_admin_post(path: &str, body: &Value, secret: &str) -> TestRequest {
    let payload = body.to_string();
    let signature = calculate_hmac(secret, payload.as_bytes());
    TestRequest::post()
        .uri(path)
        .insert_header(ContentType::json())
        .insert_header((ADMIN_SIGNATURE_HEADER, signature))
        .set_payload(payload)
}

pub fn signed_admin_get(path: &str) -> TestRequest {
    TestRequest::get().uri(path).insert_header((ADMIN_SIGNATURE_HEADER, calculate_hmac(ADMIN_SECRET, b"")))
}

pub fn parse(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"))
}
