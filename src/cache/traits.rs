//! Core traits and types for the caching system.

use serde_json::Value;
use std::time::Duration;

use super::entry::CacheEntry;

/// Trait for logical resources that can be cached.
///
/// Implementors provide the stable key their payload is stored under. The
/// freshness window is chosen by the caller and passed as a `Freshness`.
pub trait Resource: Send + Sync {
  /// Unique identifier for this resource (e.g., "tours", "match:ab12...")
  fn cache_key(&self) -> String;

  /// Human readable description for logs
  fn description(&self) -> String;
}

/// Error from a network fetch.
///
/// Kept `Clone` so a single coalesced fetch can hand the same result to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
  /// Transport failure (DNS, connect, timeout, reset)
  #[error("network error: {0}")]
  Network(String),
  /// Non-success HTTP status, or a body reporting `success: false`
  #[error("server responded with status {status}: {message}")]
  Status { status: u16, message: String },
  /// Body could not be decoded into the expected envelope
  #[error("invalid response body: {0}")]
  Decode(String),
}

/// Normalized result of a conditional fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
  /// The remote reported the validator still matches.
  NotModified {
    /// Replacement validator, if the remote sent one along
    validator: Option<String>,
  },
  /// A full payload.
  Modified {
    payload: Value,
    validator: Option<String>,
    /// The server explicitly confirmed an empty collection
    confirmed_empty: bool,
  },
}

#[cfg(test)]
impl Fetched {
  /// Full payload without a confirmed-empty flag.
  pub fn modified(payload: Value, validator: Option<String>) -> Self {
    Fetched::Modified {
      payload,
      validator,
      confirmed_empty: false,
    }
  }
}

/// Freshness window of a resource. Outside it the entry is stale and the
/// ticker revalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
  pub window: Duration,
}

impl Freshness {
  pub fn new(window: Duration) -> Self {
    Self { window }
  }

  /// Whether the entry is still inside the window.
  pub fn is_fresh_enough(&self, entry: &CacheEntry) -> bool {
    let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::MAX);
    entry.age() <= window
  }
}

/// Why cached data was kept in place of a network result.
#[derive(Debug, Clone, PartialEq)]
pub enum KeptReason {
  /// Server returned an empty collection over non-empty cached data
  EmptyResponse,
  /// Revalidation failed; the cached copy stays on screen
  FetchFailed(FetchError),
}

/// Result of a `get_or_refresh` round.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
  /// New payload stored
  Fetched(CacheEntry),
  /// Remote reported not modified; cached payload reused
  Unchanged(CacheEntry),
  /// Network result discarded in favour of the cached entry
  Kept { entry: CacheEntry, reason: KeptReason },
  /// No cache and the fetch failed
  Failed(FetchError),
}

impl Outcome {
  /// Entry to display, if any.
  pub fn entry(&self) -> Option<&CacheEntry> {
    match self {
      Outcome::Fetched(entry) | Outcome::Unchanged(entry) => Some(entry),
      Outcome::Kept { entry, .. } => Some(entry),
      Outcome::Failed(_) => None,
    }
  }

  /// Whether the payload on screen changed compared to the cached copy.
  pub fn changed(&self) -> bool {
    matches!(self, Outcome::Fetched(_))
  }
}

/// Whether a payload holds no items.
///
/// `null`, `[]` and `{}` are empty. An object with array fields is empty when
/// every array field is empty, so `{"tours": []}` is empty and a detail object
/// without arrays is not.
pub fn is_empty_payload(payload: &Value) -> bool {
  match payload {
    Value::Null => true,
    Value::Array(items) => items.is_empty(),
    Value::Object(fields) => {
      if fields.is_empty() {
        return true;
      }
      let mut arrays = fields.values().filter_map(Value::as_array).peekable();
      if arrays.peek().is_none() {
        return false;
      }
      arrays.all(|items| items.is_empty())
    }
    _ => false,
  }
}
