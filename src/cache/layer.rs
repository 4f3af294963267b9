//! Cache layer that orchestrates caching logic with network fetching.

use chrono::Utc;
use color_eyre::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::dispatch::Dispatcher;
use super::entry::CacheEntry;
use super::storage::CacheStorage;
use super::traits::{is_empty_payload, FetchError, Fetched, Freshness, KeptReason, Outcome};

type SharedRefresh = Shared<BoxFuture<'static, Outcome>>;
type InFlight = Arc<Mutex<HashMap<String, SharedRefresh>>>;

/// Namespaced entry access on top of a storage backend.
///
/// Writes never fail the caller: a storage error is logged and the entry is
/// still returned, so the current run shows what was fetched.
struct EntryStore<S: CacheStorage> {
  storage: Arc<S>,
  namespace: String,
}

impl<S: CacheStorage> Clone for EntryStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      namespace: self.namespace.clone(),
    }
  }
}

impl<S: CacheStorage> EntryStore<S> {
  fn prefix(&self) -> String {
    format!("{}:cache:", self.namespace)
  }

  fn storage_key(&self, key: &str) -> String {
    format!("{}{}", self.prefix(), key)
  }

  /// Local lookup. Misses, storage errors and corrupt entries all return `None`.
  fn read(&self, key: &str) -> Option<CacheEntry> {
    let text = match self.storage.get_item(&self.storage_key(key)) {
      Ok(Some(text)) => text,
      Ok(None) => return None,
      Err(e) => {
        warn!(key = %key, error = %e, "cache read failed, treating as miss");
        return None;
      }
    };

    match CacheEntry::decode(key, &text) {
      Ok(entry) => Some(entry),
      Err(e) => {
        warn!(key = %key, error = %e, "corrupt cache entry, treating as miss");
        None
      }
    }
  }

  /// Store `payload` under `key` stamped with the current time, replacing
  /// whatever is there. `stored_at` never moves behind `previous`.
  fn write(
    &self,
    key: &str,
    payload: Value,
    validator: Option<String>,
    previous: Option<&CacheEntry>,
  ) -> CacheEntry {
    let mut entry = CacheEntry::new(key, payload, validator);
    if let Some(prev) = previous {
      entry.stored_at = entry.stored_at.max(prev.stored_at);
    }
    self.persist(entry)
  }

  /// Refresh `stored_at` without touching the payload, adopting `validator` if given.
  fn touch(&self, entry: CacheEntry, validator: Option<String>) -> CacheEntry {
    let touched = CacheEntry {
      validator: validator.or_else(|| entry.validator.clone()),
      stored_at: entry.stored_at.max(Utc::now()),
      ..entry
    };
    self.persist(touched)
  }

  /// Replace only the validator of `entry`.
  fn update_validator(&self, entry: CacheEntry, validator: String) -> CacheEntry {
    if entry.validator.as_deref() == Some(validator.as_str()) {
      return entry;
    }
    self.persist(CacheEntry {
      validator: Some(validator),
      ..entry
    })
  }

  fn persist(&self, entry: CacheEntry) -> CacheEntry {
    if let Err(e) = self.put(&entry) {
      warn!(key = %entry.key, error = %e, "failed to persist cache entry");
    }
    entry
  }

  fn put(&self, entry: &CacheEntry) -> Result<()> {
    let text = entry.encode()?;
    self.storage.set_item(&self.storage_key(&entry.key), &text)
  }

  /// Apply a network result to the stored entry for `key`.
  ///
  /// Re-reads the current entry so the non-regression check runs against
  /// whatever is stored right now, not what was seen when the fetch started.
  fn commit(&self, key: &str, result: Result<Fetched, FetchError>) -> Outcome {
    let current = self.read(key);

    match result {
      Err(err) => match current {
        Some(entry) => {
          warn!(key = %key, error = %err, "revalidation failed, keeping cached data");
          Outcome::Kept {
            entry,
            reason: KeptReason::FetchFailed(err),
          }
        }
        None => {
          warn!(key = %key, error = %err, "initial load failed");
          Outcome::Failed(err)
        }
      },

      Ok(Fetched::NotModified { validator }) => match current {
        Some(entry) => {
          debug!(key = %key, "not modified");
          Outcome::Unchanged(self.touch(entry, validator))
        }
        None => {
          warn!(key = %key, "not modified response without a cached copy");
          Outcome::Failed(FetchError::Decode(
            "not modified response without a cached copy".to_string(),
          ))
        }
      },

      Ok(Fetched::Modified {
        payload,
        validator,
        confirmed_empty,
      }) => {
        if let Some(entry) = current.as_ref() {
          if is_empty_payload(&payload) && !confirmed_empty && !is_empty_payload(&entry.payload) {
            info!(key = %key, "discarding empty response over cached data");
            let entry = match validator {
              Some(v) => self.update_validator(entry.clone(), v),
              None => entry.clone(),
            };
            return Outcome::Kept {
              entry,
              reason: KeptReason::EmptyResponse,
            };
          }
        }

        let entry = self.write(key, payload, validator, current.as_ref());
        debug!(key = %key, validator = ?entry.validator, "stored fresh data");
        Outcome::Fetched(entry)
      }
    }
  }
}

/// Revalidating cache layer.
///
/// Serves the last known good payload immediately, revalidates it with the
/// stored validator, and never replaces non-empty data with an empty response.
/// Concurrent refreshes of one key share a single network round-trip.
pub struct RevalidatingCache<S: CacheStorage> {
  store: EntryStore<S>,
  dispatcher: Arc<Dispatcher>,
  inflight: InFlight,
}

impl<S: CacheStorage + 'static> RevalidatingCache<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S, namespace: impl Into<String>) -> Self {
    Self {
      store: EntryStore {
        storage: Arc::new(storage),
        namespace: namespace.into(),
      },
      dispatcher: Arc::new(Dispatcher::default()),
      inflight: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Set the dispatcher used for background revalidations.
  pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
    self.dispatcher = Arc::new(dispatcher);
    self
  }

  /// Local lookup, no network.
  pub fn read(&self, key: &str) -> Option<CacheEntry> {
    self.store.read(key)
  }

  /// Resource keys currently stored in this namespace.
  pub fn keys(&self) -> Result<Vec<String>> {
    let prefix = self.store.prefix();
    Ok(
      self
        .store
        .storage
        .keys(&prefix)?
        .into_iter()
        .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
        .collect(),
    )
  }

  /// Whether the entry for `key` is missing or outside its freshness window,
  /// so the next tick must revalidate it.
  pub fn is_stale(&self, key: &str, freshness: Freshness) -> bool {
    self
      .read(key)
      .map(|entry| !freshness.is_fresh_enough(&entry))
      .unwrap_or(true)
  }

  /// Serve cached data and revalidate it.
  ///
  /// 1. Hand the cached entry (or `None` on a miss) to `render_initial` right away
  /// 2. Fetch, passing the stored validator so the remote can answer "not modified"
  /// 3. Not modified: keep the payload, refresh the timestamp
  /// 4. Full response: store it unless it is empty over non-empty cache
  /// 5. Failure: keep cached data, or report `Outcome::Failed` if there is none
  ///
  /// A call for a key that already has a refresh running joins that refresh
  /// instead of invoking `fetcher`.
  pub async fn get_or_refresh<F, Fut, R>(&self, key: &str, fetcher: F, render_initial: R) -> Outcome
  where
    F: FnOnce(Option<String>) -> Fut,
    Fut: Future<Output = std::result::Result<Fetched, FetchError>> + Send + 'static,
    R: FnOnce(Option<&CacheEntry>),
  {
    let cached = self.read(key);
    render_initial(cached.as_ref());

    let refresh = {
      let mut inflight = lock(&self.inflight);
      match inflight.get(key).cloned() {
        Some(running) => {
          debug!(key = %key, "joining in-flight refresh");
          running
        }
        None => {
          let validator = cached.as_ref().and_then(|entry| entry.validator.clone());
          debug!(key = %key, conditional = validator.is_some(), "starting refresh");

          let fetch = fetcher(validator);
          let background = cached.is_some();
          let store = self.store.clone();
          let dispatcher = Arc::clone(&self.dispatcher);
          let registry = Arc::clone(&self.inflight);
          let owned_key = key.to_string();

          let refresh = async move {
            let result = if background {
              dispatcher.run(fetch).await
            } else {
              fetch.await
            };
            let outcome = store.commit(&owned_key, result);
            lock(&registry).remove(&owned_key);
            outcome
          }
          .boxed()
          .shared();

          inflight.insert(key.to_string(), refresh.clone());
          refresh
        }
      }
    };

    refresh.await
  }
}

fn lock(inflight: &InFlight) -> MutexGuard<'_, HashMap<String, SharedRefresh>> {
  inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<S: CacheStorage> Clone for RevalidatingCache<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
      dispatcher: Arc::clone(&self.dispatcher),
      inflight: Arc::clone(&self.inflight),
    }
  }
}
