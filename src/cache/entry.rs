//! Cache entries and their stored text representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached payload together with its revalidation token.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  /// Resource key the entry belongs to
  pub key: String,
  /// Last known good payload
  pub payload: Value,
  /// Opaque token for conditional revalidation
  pub validator: Option<String>,
  /// When the entry was last written or confirmed unchanged
  pub stored_at: DateTime<Utc>,
}

/// Stored shape: `{ payload, validator, storedAt }` serialized as text.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
  payload: Value,
  validator: Option<String>,
  stored_at: DateTime<Utc>,
}

impl CacheEntry {
  pub fn new(key: impl Into<String>, payload: Value, validator: Option<String>) -> Self {
    Self {
      key: key.into(),
      payload,
      validator,
      stored_at: Utc::now(),
    }
  }

  /// Time since the entry was stored. Never negative.
  pub fn age(&self) -> chrono::Duration {
    (Utc::now() - self.stored_at).max(chrono::Duration::zero())
  }

  /// Serialize to the stored text form.
  pub fn encode(&self) -> serde_json::Result<String> {
    serde_json::to_string(&StoredEntry {
      payload: self.payload.clone(),
      validator: self.validator.clone(),
      stored_at: self.stored_at,
    })
  }

  /// Parse the stored text form back into an entry for `key`.
  pub fn decode(key: &str, text: &str) -> serde_json::Result<Self> {
    let stored: StoredEntry = serde_json::from_str(text)?;
    Ok(Self {
      key: key.to_string(),
      payload: stored.payload,
      validator: stored.validator,
      stored_at: stored.stored_at,
    })
  }
}
