use actix_web::web;
use gateway_tools::helpers::params_from_json;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use sg_common::SignedParams;

type HmacSha256 = Hmac<Sha256>;

/// Merchants and providers send either JSON or form-encoded bodies. Both end up as flat string parameters.
pub type JsonOrForm = web::Either<web::Json<Value>, web::Form<SignedParams>>;

pub fn body_to_params(body: JsonOrForm) -> SignedParams {
    match body {
        web::Either::Left(json) => params_from_json(&json),
        web::Either::Right(form) => form.into_inner(),
    }
}

/// Converts a form body into the flat JSON object that the callback translators expect.
pub fn body_to_json(body: JsonOrForm) -> Value {
    match body {
        web::Either::Left(json) => json.into_inner(),
        web::Either::Right(form) => {
            Value::Object(form.into_inner().into_iter().map(|(k, v)| (k, Value::String(v))).collect())
        },
    }
}

fn keyed_mac(secret: &str, data: &[u8]) -> Option<HmacSha256> {
    // HMAC accepts keys of any length, so this only fails if that ever changes
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(data);
    Some(mac)
}

/// Base64-encoded HMAC-SHA256 of `data`.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    keyed_mac(secret, data).map(|mac| base64::encode(mac.finalize().into_bytes())).unwrap_or_default()
}

/// Checks a base64 HMAC-SHA256 `signature` of `data`. The digests are compared in constant time.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    let Ok(signature) = base64::decode(signature.trim()) else {
        return false;
    };
    keyed_mac(secret, data).map(|mac| mac.verify_slice(&signature).is_ok()).unwrap_or(false)
}
