use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use settlement_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CallbackApi,
    MerchantApi,
    OrderFlowApi,
    PayoutApi,
    SettlementDatabase,
    SqliteDatabase,
    UpstreamGateway,
};
use sg_common::Secret;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    integrations::ProviderGateways,
    middleware::HmacMiddlewareFactory,
    notifier::{HttpTransport, MerchantNotifier},
    routes::{
        health,
        AdminMerchantRoute,
        AdminOrderRoute,
        CreatePayinRoute,
        CreatePayoutRoute,
        CreditMerchantRoute,
        OrderStatusRoute,
        ProcessPayoutRoute,
        ProviderCallbackRoute,
    },
};

pub const ADMIN_SIGNATURE_HEADER: &str = "X-Admin-Signature";
const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.admin_secret.is_empty() && config.admin_auth_checks {
        warn!("🚀️ SGS_ADMIN_SECRET is not set. All admin requests will be refused.");
    }
    let gateways = ProviderGateways::new(&config.public_url, config.gateway_timeout);
    let hooks = create_event_hooks(&config, db.clone())?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let expiry_api = OrderFlowApi::new(db.clone(), gateways.clone(), producers.clone(), config.engine_config());
    let _expiry_worker = start_expiry_worker(expiry_api);

    let srv = create_server_instance(config, db, gateways, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Merchants hear about every order that reaches a final status. Delivery happens on the hook task, so a slow
/// merchant never holds up a request.
pub fn create_event_hooks(config: &ServerConfig, db: SqliteDatabase) -> Result<EventHooks, ServerError> {
    let transport = HttpTransport::new().map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let notifier = MerchantNotifier::new(db, transport, config.notifier);
    let mut hooks = EventHooks::default();
    hooks
        .on_order_settled(move |ev| {
            let notifier = notifier.clone();
            Box::pin(async move {
                notifier.notify(&ev.transaction).await;
            })
        })
        .on_payout_submitted(|ev| {
            Box::pin(async move {
                let order = ev.transaction;
                info!(
                    "📣️ Payout {} for merchant #{} is with the provider as {}",
                    order.order_no,
                    order.merchant_id,
                    order.provider_order_id.as_deref().unwrap_or("(no reference)")
                );
            })
        });
    Ok(hooks)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateways: ProviderGateways,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let engine_config = config.engine_config();
        let orders_api = OrderFlowApi::new(db.clone(), gateways.clone(), producers.clone(), engine_config.clone());
        let payouts_api = PayoutApi::new(db.clone(), gateways.clone(), producers.clone());
        let callbacks_api = CallbackApi::new(db.clone(), gateways.clone(), producers.clone());
        let merchant_api = MerchantApi::new(db.clone(), engine_config);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sgs::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payouts_api))
            .app_data(web::Data::new(callbacks_api))
            .app_data(web::Data::new(merchant_api))
            .configure(configure_routes::<SqliteDatabase, ProviderGateways>(
                config.admin_secret.clone(),
                config.admin_auth_checks,
            ))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Registers every route. The APIs they use must already be in the app data.
///
/// Merchant and provider routes sit at the root. Admin routes live under `/api/admin` and require an
/// `X-Admin-Signature` HMAC of the request body.
pub fn configure_routes<B, G>(
    admin_secret: Secret<String>,
    admin_auth_checks: bool,
) -> impl FnOnce(&mut web::ServiceConfig)
where
    B: SettlementDatabase + 'static,
    G: UpstreamGateway + 'static,
{
    move |cfg| {
        let admin_scope = web::scope("/api/admin")
            .wrap(HmacMiddlewareFactory::new(ADMIN_SIGNATURE_HEADER, admin_secret, admin_auth_checks))
            .service(ProcessPayoutRoute::<B, G>::new())
            .service(AdminOrderRoute::<B>::new())
            .service(AdminMerchantRoute::<B>::new())
            .service(CreditMerchantRoute::<B>::new());
        cfg.service(health)
            .service(CreatePayinRoute::<B, G>::new())
            .service(CreatePayoutRoute::<B, G>::new())
            .service(OrderStatusRoute::<B, G>::new())
            .service(ProviderCallbackRoute::<B, G>::new())
            .service(admin_scope);
    }
}
