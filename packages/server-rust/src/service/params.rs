//! Merges path, query, and body parameters into one request object.
//!
//! Precedence is path < query < body: a key present in a later source
//! overrides the same key from an earlier one. Only provision, update, and
//! bind read the body; for every other operation it is ignored.

use broker_core::{BrokerError, ServicePlanKey};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::operation::BrokerRequest;

/// Query keys the protocol defines as booleans.
const BOOLEAN_QUERY_KEYS: [&str; 1] = ["accepts_incomplete"];

/// Builds the merged parameter object for a request.
///
/// # Errors
///
/// Returns `InvalidParameter` if a body-reading operation carries a body
/// that is not a JSON object.
pub fn assemble(request: &BrokerRequest) -> Result<Map<String, Value>, BrokerError> {
    let mut merged = Map::new();

    for (key, value) in &request.path_params {
        merged.insert(key.clone(), Value::String(value.clone()));
    }
    for (key, value) in &request.query {
        merged.insert(key.clone(), coerce_query_value(key, value));
    }
    if request.operation.reads_body() {
        for (key, value) in parse_body(&request.body)? {
            merged.insert(key, value);
        }
    }
    Ok(merged)
}

/// Extracts the `service_id`/`plan_id` correlation pair.
///
/// # Errors
///
/// Returns `InvalidParameter` naming the first key that is missing, empty,
/// or not a string.
pub fn service_plan_key(params: &Map<String, Value>) -> Result<ServicePlanKey, BrokerError> {
    Ok(ServicePlanKey::new(
        required_str(params, "service_id")?,
        required_str(params, "plan_id")?,
    ))
}

/// Decodes the merged object into an operation's typed request.
///
/// # Errors
///
/// Returns `InvalidParameter` carrying the decoder's message when a field has
/// the wrong shape.
pub fn decode<T: DeserializeOwned>(params: Map<String, Value>) -> Result<T, BrokerError> {
    serde_json::from_value(Value::Object(params))
        .map_err(|e| BrokerError::invalid_parameter(format!("Malformed request: {e}")))
}

fn parse_body(body: &[u8]) -> Result<Map<String, Value>, BrokerError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(BrokerError::invalid_parameter(
            "Request body must be a JSON object",
        )),
        Err(e) => Err(BrokerError::invalid_parameter(format!(
            "Request body is not valid JSON: {e}"
        ))),
    }
}

fn coerce_query_value(key: &str, value: &str) -> Value {
    if BOOLEAN_QUERY_KEYS.contains(&key) {
        match value {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
    }
    Value::String(value.to_owned())
}

fn required_str(params: &Map<String, Value>, key: &str) -> Result<String, BrokerError> {
    match params.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(BrokerError::invalid_parameter(format!(
            "[{key}]: is required"
        ))),
        Some(_) => Err(BrokerError::invalid_parameter(format!(
            "[{key}]: must be a string"
        ))),
    }
}
