//! Serde types and normalization for league API responses.
//!
//! The API is not consistent about its envelope: lists arrive as
//! `{"tours": [...]}` or wrapped as `{"data": {"tours": [...]}}`, validators
//! come from a header or an embedded field. Everything is normalized here so
//! the cache only ever sees `{payload, validator}`.

use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::types::MutationResult;
use crate::cache::FetchError;

/// Envelope fields that describe the transport, not the resource.
const TRANSPORT_FIELDS: &[&str] = &[
  "success",
  "ok",
  "error",
  "etag",
  "version",
  "confirmed_empty",
  "confirmedEmpty",
  "not_modified",
  "notModified",
];

/// A read response after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
  pub payload: Value,
  /// Validator embedded in the body, if any
  pub embedded_validator: Option<String>,
  pub confirmed_empty: bool,
  pub not_modified: bool,
}

/// Normalize a decoded read response body.
pub fn normalize(body: Value) -> Result<Envelope, FetchError> {
  let mut fields = match body {
    Value::Object(fields) => fields,
    Value::Array(items) => {
      return Ok(Envelope {
        payload: Value::Array(items),
        embedded_validator: None,
        confirmed_empty: false,
        not_modified: false,
      })
    }
    other => {
      return Err(FetchError::Decode(format!(
        "expected a JSON object or array, got {}",
        type_name(&other)
      )))
    }
  };

  if fields.get("success").and_then(Value::as_bool) == Some(false) {
    let message = fields
      .get("error")
      .and_then(Value::as_str)
      .unwrap_or("request failed")
      .to_string();
    return Err(FetchError::Status {
      status: 200,
      message,
    });
  }

  let mut validator = embedded_validator(&fields);
  let mut confirmed_empty = flag(&fields, &["confirmed_empty", "confirmedEmpty"]);
  let not_modified = flag(&fields, &["not_modified", "notModified"]);

  let payload = match fields.remove("data") {
    Some(Value::Object(mut inner)) => {
      validator = validator.or_else(|| embedded_validator(&inner));
      confirmed_empty = confirmed_empty || flag(&inner, &["confirmed_empty", "confirmedEmpty"]);
      strip_transport(&mut inner);
      Value::Object(inner)
    }
    Some(inner) => inner,
    None => {
      strip_transport(&mut fields);
      Value::Object(fields)
    }
  };

  Ok(Envelope {
    payload,
    embedded_validator: validator,
    confirmed_empty,
    not_modified,
  })
}

/// Validator derived from the payload itself, for servers that send none.
pub fn content_validator(payload: &Value) -> String {
  let mut hasher = Sha256::new();
  hasher.update(payload.to_string().as_bytes());
  format!("sha256:{}", hex::encode(hasher.finalize()))
}

fn embedded_validator(fields: &Map<String, Value>) -> Option<String> {
  ["etag", "version"]
    .iter()
    .filter_map(|name| fields.get(*name))
    .find_map(|value| match value {
      Value::String(s) if !s.is_empty() => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    })
}

fn flag(fields: &Map<String, Value>, names: &[&str]) -> bool {
  names
    .iter()
    .any(|name| fields.get(*name).and_then(Value::as_bool) == Some(true))
}

fn strip_transport(fields: &mut Map<String, Value>) {
  for name in TRANSPORT_FIELDS {
    fields.remove(*name);
  }
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

// ============================================================================
// Mutation endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiMutationResponse {
  #[serde(default)]
  pub success: bool,
  pub error: Option<String>,
  // Action-specific result fields
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl From<ApiMutationResponse> for MutationResult {
  fn from(resp: ApiMutationResponse) -> Self {
    MutationResult {
      success: resp.success,
      error: resp.error.filter(|e| !e.is_empty()),
      fields: Value::Object(resp.extra),
    }
  }
}
