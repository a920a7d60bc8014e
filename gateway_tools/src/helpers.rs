use serde_json::Value;
use sg_common::SignedParams;

/// Flattens a JSON object into string parameters for signature checks. Numbers and booleans are rendered the way the
/// provider would have rendered them before signing, `null` becomes an empty string (and so is dropped by the sorted
/// scheme), and nested values are skipped since no provider signs them.
pub fn params_from_json(value: &Value) -> SignedParams {
    let mut params = SignedParams::new();
    if let Some(obj) = value.as_object() {
        for (k, v) in obj {
            let s = match v {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => continue,
            };
            params.insert(k.clone(), s);
        }
    }
    params
}

/// Reads a string-ish field out of a JSON object. Providers are not consistent about quoting numbers.
pub fn json_str(value: &Value, key: &str) -> Option<String> {
    match &value[key] {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
