//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use std::str::FromStr;

use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use serde::Deserialize;
use settlement_engine::{
    db_types::{FinalOutcome, OrderNo},
    CallbackApi,
    CallbackResult,
    MerchantApi,
    OrderFlowApi,
    PayoutApi,
    SettlementDatabase,
    SettlementError,
    UpstreamGateway,
};
use sg_common::{Money, SignedParams, SIGN_FIELD};

use crate::{
    data_objects::{
        CreditRequest,
        JsonResponse,
        MerchantSummary,
        OrderCreated,
        OrderStatusResponse,
        PayoutAction,
        ProcessPayoutRequest,
    },
    errors::ServerError,
    helpers::{body_to_json, body_to_params, JsonOrForm},
};

/// How many transactions the admin merchant view shows.
const RECENT_TRANSACTIONS: i64 = 20;

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Merchant orders  ----------------------------------------------------
route!(create_payin => Post "/payin" impl SettlementDatabase, UpstreamGateway);
/// Route handler for pay-in (deposit) orders.
///
/// Accepts JSON or form bodies with `merchant_id`, `transaction_id` (or `merchant_order_no`), `amount`, `callback_url`,
/// an optional `extra` and the `sign` computed with the merchant's API key. On success the body carries our order
/// number and, for providers that host a payment page, the `payment_url` to send the payer to.
pub async fn create_payin<B, G>(
    body: JsonOrForm,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: UpstreamGateway,
{
    let params = body_to_params(body);
    debug!("💻️ POST payin for merchant {}", params.get("merchant_id").map(String::as_str).unwrap_or("?"));
    let order = api.create_payin(&params).await.map_err(|e| {
        debug!("💻️ Pay-in was not created. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(OrderCreated::from(order)))
}

route!(create_payout => Post "/payout" impl SettlementDatabase, UpstreamGateway);
/// Route handler for payout (withdrawal) orders.
///
/// The payout amount is frozen on the merchant's balance immediately. Nothing is sent to the provider
/// until an admin approves the payout through `/api/admin/process-payout`.
///
/// The body needs the destination fields for the gateway type: `account_number`, `ifsc_code`, `bank_name` and
/// `account_holder_name` for bank transfers, `wallet` and `phone` for mobile wallets, or `usdt_address` and
/// `network`. It is signed with the merchant's payout secret if one is set, otherwise with the API key.
pub async fn create_payout<B, G>(
    body: JsonOrForm,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: UpstreamGateway,
{
    let params = body_to_params(body);
    debug!("💻️ POST payout for merchant {}", params.get("merchant_id").map(String::as_str).unwrap_or("?"));
    let order = api.create_payout(&params).await.map_err(|e| {
        debug!("💻️ Payout was not created. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(OrderCreated::from(order)))
}

#[derive(Debug, Deserialize)]
pub struct SignatureQuery {
    pub sign: String,
}

route!(order_status => Get "/order/{account_number}/{merchant_order_no}" impl SettlementDatabase, UpstreamGateway);
/// Merchants look up their own orders by their own order number. The query string carries the `sign` over
/// `merchant_id` and `transaction_id`, as for any other merchant request.
pub async fn order_status<B, G>(
    path: web::Path<(String, String)>,
    query: web::Query<SignatureQuery>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: UpstreamGateway,
{
    let (account_number, merchant_order_no) = path.into_inner();
    debug!("💻️ GET order {merchant_order_no} for merchant {account_number}");
    let mut params = SignedParams::new();
    params.insert("merchant_id".into(), account_number);
    params.insert("transaction_id".into(), merchant_order_no);
    params.insert(SIGN_FIELD.into(), query.into_inner().sign);
    let order = api.order_status(&params).await?;
    Ok(HttpResponse::Ok().json(OrderStatusResponse::from(order)))
}

//----------------------------------------------   Provider callbacks  ------------------------------------------------
route!(provider_callback => Post "/callback/{gateway_code}" impl SettlementDatabase, UpstreamGateway);
/// Webhook for the upstream providers.
///
/// Providers retry anything that is not acknowledged, so this answers `200 ok` once the callback has been dealt with,
/// including forged, malformed and replayed callbacks. Those are logged and dropped. If the state change could not be
/// committed, the callback is not acknowledged, and the provider's retry gets another go at it.
pub async fn provider_callback<B, G>(
    path: web::Path<String>,
    body: JsonOrForm,
    api: web::Data<CallbackApi<B, G>>,
) -> HttpResponse
where
    B: SettlementDatabase,
    G: UpstreamGateway,
{
    let gateway_code = path.into_inner();
    let payload = body_to_json(body);
    trace!("💻️ Callback from {gateway_code}: {payload}");
    match api.handle_callback(&gateway_code, &payload).await {
        Ok(CallbackResult::Settled(order)) => {
            info!("💻️ Callback from {gateway_code} settled {} as {}", order.order_no, order.status)
        },
        Ok(CallbackResult::AlreadyFinal(order)) => {
            debug!("💻️ Replayed callback from {gateway_code} for {}. Order is {}", order.order_no, order.status)
        },
        Ok(CallbackResult::Progress(order)) => {
            debug!("💻️ Callback from {gateway_code} reported progress on {}", order.order_no)
        },
        Err(SettlementError::DatabaseError(e)) => {
            error!("💻️ Callback from {gateway_code} could not be stored. Not acknowledging it. {e}");
            return HttpResponse::ServiceUnavailable().body("retry");
        },
        Err(e) => warn!("💻️ Ignoring callback from {gateway_code}. {e}"),
    }
    HttpResponse::Ok().body("ok")
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(process_payout => Post "/process-payout" impl SettlementDatabase, UpstreamGateway);
/// Admin payout workflow.
///
/// * `approve` sends a pending payout to the provider.
/// * `reject` cancels an undispatched payout and returns the frozen funds to the merchant.
/// * `confirm` and `fail` settle a payout that was dispatched but never heard back from, e.g. after a provider
///   timeout. The admin is expected to have checked with the provider first.
pub async fn process_payout<B, G>(
    body: web::Json<ProcessPayoutRequest>,
    api: web::Data<PayoutApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: SettlementDatabase,
    G: UpstreamGateway,
{
    let request = body.into_inner();
    let order_no = OrderNo::from(request.transaction_id.as_str());
    let reason = request.reason.unwrap_or_default();
    info!("💻️ Admin action {:?} on payout {order_no}", request.action);
    let order = match request.action {
        PayoutAction::Approve => api.approve(&order_no).await,
        PayoutAction::Reject => api.reject(&order_no, &reason).await,
        PayoutAction::Confirm => api.resolve(&order_no, FinalOutcome::Success, &reason).await,
        PayoutAction::Fail => api.resolve(&order_no, FinalOutcome::Failed, &reason).await,
    }
    .map_err(|e| {
        warn!("💻️ Admin action {:?} on payout {order_no} failed. {e}", request.action);
        e
    })?;
    Ok(HttpResponse::Ok().json(OrderStatusResponse::from(order)))
}

route!(admin_order => Get "/order/{order_no}" impl SettlementDatabase);
pub async fn admin_order<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<MerchantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_no = OrderNo::from(path.into_inner());
    debug!("💻️ GET admin order {order_no}");
    let order = api.transaction(&order_no).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(admin_merchant => Get "/merchant/{account_number}" impl SettlementDatabase);
/// The merchant's balances and its most recent orders. Keys are never returned.
pub async fn admin_merchant<B: SettlementDatabase>(
    path: web::Path<String>,
    api: web::Data<MerchantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_number = path.into_inner();
    debug!("💻️ GET admin merchant {account_number}");
    let merchant = api.merchant(&account_number).await?;
    let recent = api.recent_transactions(&account_number, RECENT_TRANSACTIONS).await?;
    Ok(HttpResponse::Ok().json(MerchantSummary::new(merchant, recent)))
}

route!(credit_merchant => Post "/credit" impl SettlementDatabase);
/// Manual top-up of a merchant's available balance, e.g. after a deposit made outside the gateway.
///
/// The admin signature only covers the body, so the `reference` is what stops a captured request from being replayed:
/// a reference that was already credited is refused with `409`.
pub async fn credit_merchant<B: SettlementDatabase>(
    body: web::Json<CreditRequest>,
    api: web::Data<MerchantApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    let amount = Money::from_str(&request.amount)
        .map_err(|e| ServerError::InvalidRequestBody(format!("Invalid amount '{}'. {e}", request.amount)))?;
    info!("💻️ Admin credit {} of {amount} to merchant {}", request.reference, request.merchant_id);
    let merchant = api.credit(&request.merchant_id, amount, &request.reference).await?;
    let message = format!("Merchant {} credited with {amount}. Balance is {}", request.merchant_id, merchant.balance);
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}
