//! Response envelope handling.
//!
//! Every registry response is either a JSON object carrying the payload
//! under a named key, or an object with `error` + `description`. The
//! error form is a failure whatever the HTTP status.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

/// Classified body of a completed response.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Successful response without content.
    Empty,
    /// Successful JSON response.
    Json(Value),
    /// Successful non-JSON response.
    Text(String),
}

/// Turn a raw status/body pair into a [`Body`] or an [`ApiError`].
pub fn classify(status: u16, text: String) -> ApiResult<Body> {
    let success = (200..300).contains(&status);
    if text.trim().is_empty() {
        return if success {
            Ok(Body::Empty)
        } else {
            Err(ApiError::Status { status, body: text })
        };
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) if map.contains_key("error") => Err(envelope_error(&map)),
        Ok(value) if success => Ok(Body::Json(value)),
        Err(_) if success => Ok(Body::Text(text)),
        _ => Err(ApiError::Status { status, body: text }),
    }
}

fn envelope_error(map: &Map<String, Value>) -> ApiError {
    let code = match map.get("error") {
        Some(Value::String(code)) => code.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let description = map
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    ApiError::Api { code, description }
}

impl Body {
    /// Deserialize the payload stored under `key`.
    pub fn field<T: DeserializeOwned>(self, key: &'static str) -> ApiResult<T> {
        match self {
            Body::Json(Value::Object(mut map)) => {
                let value = map.remove(key).ok_or(ApiError::MissingField(key))?;
                Ok(serde_json::from_value(value)?)
            }
            Body::Json(_) | Body::Text(_) => Err(ApiError::Decode(format!(
                "expected an object with `{key}`"
            ))),
            Body::Empty => Err(ApiError::MissingField(key)),
        }
    }

    /// Like [`Body::field`], but `null` or a missing key yields `None`.
    pub fn optional_field<T: DeserializeOwned>(self, key: &'static str) -> ApiResult<Option<T>> {
        match self {
            Body::Json(Value::Object(mut map)) => match map.remove(key) {
                None | Some(Value::Null) => Ok(None),
                Some(value) => Ok(Some(serde_json::from_value(value)?)),
            },
            Body::Empty => Ok(None),
            Body::Json(_) | Body::Text(_) => Err(ApiError::Decode(format!(
                "expected an object with `{key}`"
            ))),
        }
    }

    /// Payload under `key` when present, otherwise the whole document.
    pub fn field_or_bare<T: DeserializeOwned>(self, key: &'static str) -> ApiResult<T> {
        match self {
            Body::Json(Value::Object(mut map)) if map.contains_key(key) => {
                let value = map.remove(key).unwrap_or(Value::Null);
                Ok(serde_json::from_value(value)?)
            }
            Body::Json(value) => Ok(serde_json::from_value(value)?),
            Body::Text(_) => Err(ApiError::Decode(format!("expected JSON for `{key}`"))),
            Body::Empty => Err(ApiError::MissingField(key)),
        }
    }

    /// Text payload under `key`, or the raw body when it is not JSON.
    pub fn text_or_field(self, key: &'static str) -> ApiResult<String> {
        match self {
            Body::Text(text) => Ok(text),
            Body::Json(Value::String(text)) => Ok(text),
            Body::Empty => Ok(String::new()),
            json => json.field(key),
        }
    }
}
