use std::collections::HashMap;

use cucumber::World;
use log::*;
use settlement_engine::{
    db_types::{Merchant, PaymentGateway, Transaction},
    events::EventProducers,
    test_utils::{
        fake_upstream::FakeUpstream,
        prepare_env::{create_database, random_db_path, run_migrations},
    },
    CallbackApi,
    EngineConfig,
    MerchantApi,
    MerchantManagement,
    OrderFlowApi,
    PayoutApi,
    SettlementError,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct SettlementWorld {
    pub system: Option<SettlementSystem>,
    pub last_order: Option<Transaction>,
    pub last_error: Option<SettlementError>,
}

#[derive(Debug)]
pub struct SettlementSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub upstream: FakeUpstream,
    pub orders: OrderFlowApi<SqliteDatabase, FakeUpstream>,
    pub payouts: PayoutApi<SqliteDatabase, FakeUpstream>,
    pub callbacks: CallbackApi<SqliteDatabase, FakeUpstream>,
    pub merchants: MerchantApi<SqliteDatabase>,
    pub gateways: HashMap<String, PaymentGateway>,
}

impl SettlementWorld {
    pub fn system(&self) -> &SettlementSystem {
        self.system.as_ref().expect("Settlement system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut SettlementSystem {
        self.system.as_mut().expect("Settlement system not initialised")
    }

    pub fn last_order(&self) -> &Transaction {
        self.last_order.as_ref().expect("No order has been created yet")
    }

    /// Stores the outcome of an engine call that produces an order.
    pub fn record(&mut self, result: Result<Transaction, SettlementError>) {
        match result {
            Ok(order) => {
                self.last_order = Some(order);
                self.last_error = None;
            },
            Err(e) => {
                debug!("🥒️ Engine call failed: {e}");
                self.last_error = Some(e);
            },
        }
    }

    pub async fn merchant(&self, account: &str) -> Merchant {
        self.system()
            .db
            .fetch_merchant_by_account(account)
            .await
            .expect("Error fetching merchant")
            .expect("Merchant does not exist")
    }

    pub async fn merchant_by_id(&self, id: i64) -> Merchant {
        self.system().db.fetch_merchant(id).await.expect("Error fetching merchant").expect("Merchant does not exist")
    }

    pub async fn gateway_for(&self, merchant: &Merchant) -> PaymentGateway {
        self.system().db.fetch_gateway(merchant.gateway_id).await.expect("Error fetching gateway").expect("No gateway")
    }
}

impl SettlementSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 10).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let upstream = FakeUpstream::new();
        let producers = EventProducers::default();
        let config = EngineConfig::default();
        Self {
            db_path: url,
            orders: OrderFlowApi::new(db.clone(), upstream.clone(), producers.clone(), config.clone()),
            payouts: PayoutApi::new(db.clone(), upstream.clone(), producers.clone()),
            callbacks: CallbackApi::new(db.clone(), upstream.clone(), producers),
            merchants: MerchantApi::new(db.clone(), config),
            upstream,
            db,
            gateways: HashMap::new(),
        }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
