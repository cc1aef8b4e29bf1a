//! Core layer: pure request canonicalization and response classification.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::data::{Payload, RawResponse, Request, Shape};
use crate::error::ClientError;

/// Pluggable mapper from a non-2xx response to a recognized domain error.
///
/// Receives the status code, the best-effort parsed body (use `as_object` /
/// `as_array` for the shaped views) and the raw bytes. Returning `None`
/// falls back to [`ClientError::UnknownStatus`].
pub type ErrorMapper = dyn Fn(u16, Option<&Value>, &[u8]) -> Option<ClientError> + Send + Sync;

/// Canonical store key: method, URL, then parameters in sorted order.
///
/// Identical regardless of parameter insertion order or body encoding, so a
/// JSON-bodied request and its query-string twin share one cache slot.
pub fn cache_key(request: &Request) -> String {
    let mut key = format!("{} {}", request.method(), request.url());
    for (i, (name, value)) in request.parameters().iter().enumerate() {
        key.push(if i == 0 { '?' } else { '&' });
        key.push_str(name);
        key.push('=');
        key.push_str(&query_value(value));
    }
    key
}

/// Query-string rendering of a parameter value: strings unquoted, anything
/// else in its JSON form.
pub(crate) fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Classify a raw transport result into a decoded payload or a typed error.
///
/// The body is parsed as generic JSON first, best-effort; an unparseable
/// body is not fatal by itself. A 2xx status then decodes into the shape
/// selected by `fallback`'s variant, and an empty, absent or null body
/// returns `fallback` verbatim — "no content" is not a decode failure. A
/// non-2xx status is offered to `mapper` before degrading to
/// [`ClientError::UnknownStatus`].
pub fn classify<T: DeserializeOwned>(
    response: &RawResponse,
    fallback: Payload<T>,
    mapper: Option<&ErrorMapper>,
) -> Result<Payload<T>, ClientError> {
    let parsed: Option<Value> = serde_json::from_slice(&response.body).ok();

    if (200..300).contains(&response.status) {
        return decode(parsed, fallback);
    }

    if let Some(mapper) = mapper
        && let Some(err) = mapper(response.status, parsed.as_ref(), &response.body)
    {
        return Err(err);
    }
    Err(ClientError::UnknownStatus(response.status))
}

fn decode<T: DeserializeOwned>(
    parsed: Option<Value>,
    fallback: Payload<T>,
) -> Result<Payload<T>, ClientError> {
    let value = match parsed {
        None | Some(Value::Null) => return Ok(fallback),
        Some(value) => value,
    };
    match fallback.shape() {
        Shape::Single => serde_json::from_value(value)
            .map(Payload::Single)
            .map_err(|e| ClientError::InvalidShape(e.to_string())),
        Shape::Many => serde_json::from_value(value)
            .map(Payload::Many)
            .map_err(|e| ClientError::InvalidShape(e.to_string())),
    }
}
