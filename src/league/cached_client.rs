//! Cached league client that wraps LeagueClient with transparent revalidation.

use color_eyre::Result;
use std::time::Duration;

use crate::cache::{
  CacheEntry, CacheStorage, Dispatcher, Freshness, NoopStorage, Outcome, Resource,
  RevalidatingCache, SqliteStorage,
};
use crate::config::{Config, FreshnessConfig};

use super::client::LeagueClient;
use super::keys::LeagueKey;
use super::types::{BetForm, MutationResult};

/// League client with transparent caching support.
///
/// Reads go through the revalidating cache; mutations go straight to the
/// network and leave refreshing to the caller.
#[derive(Clone)]
pub struct CachedLeagueClient {
  inner: LeagueClient,
  cache: RevalidatingCache<Box<dyn CacheStorage>>,
  freshness: FreshnessConfig,
}

impl CachedLeagueClient {
  /// Create a new cached league client.
  ///
  /// With `use_cache` off nothing is persisted and every load is a first load.
  pub fn new(config: &Config, use_cache: bool) -> Result<Self> {
    let inner = LeagueClient::new(config)?;
    let storage: Box<dyn CacheStorage> = if use_cache {
      Box::new(SqliteStorage::open(config.cache.path.as_deref())?)
    } else {
      Box::new(NoopStorage)
    };
    let cache = RevalidatingCache::new(storage, config.cache.namespace.clone()).with_dispatcher(
      Dispatcher::new(
        config.dispatch.max_concurrent,
        Duration::from_millis(config.dispatch.min_spacing_ms),
      ),
    );

    Ok(Self::from_parts(inner, cache, config.freshness.clone()))
  }

  pub fn from_parts(
    inner: LeagueClient,
    cache: RevalidatingCache<Box<dyn CacheStorage>>,
    freshness: FreshnessConfig,
  ) -> Self {
    Self {
      inner,
      cache,
      freshness,
    }
  }

  pub fn freshness(&self, resource: &LeagueKey) -> Freshness {
    resource.freshness(&self.freshness)
  }

  /// Cached entry for a resource, without touching the network.
  pub fn cached(&self, resource: &LeagueKey) -> Option<CacheEntry> {
    self.cache.read(&resource.cache_key())
  }

  /// Cached entry by raw resource key.
  pub fn cached_by_key(&self, key: &str) -> Option<CacheEntry> {
    self.cache.read(key)
  }

  /// All resource keys in the local cache.
  pub fn cached_keys(&self) -> Result<Vec<String>> {
    self.cache.keys()
  }

  pub fn is_stale(&self, resource: &LeagueKey) -> bool {
    self
      .cache
      .is_stale(&resource.cache_key(), self.freshness(resource))
  }

  /// Load a resource: hand cached data (or nothing) to `render_initial`, then revalidate.
  pub async fn load<R>(&self, resource: &LeagueKey, render_initial: R) -> Outcome
  where
    R: FnOnce(Option<&CacheEntry>),
  {
    let inner = self.inner.clone();
    let target = resource.clone();

    self
      .cache
      .get_or_refresh(
        &resource.cache_key(),
        move |validator| async move { inner.fetch_fresh(&target, validator.as_deref()).await },
        render_initial,
      )
      .await
  }

  /// Place a bet (not cached - write operation).
  pub async fn place_bet(&self, bet: &BetForm) -> Result<MutationResult> {
    self.inner.place_bet(bet).await
  }

  /// Cancel a bet (not cached - write operation).
  pub async fn cancel_bet(&self, bet_id: &str) -> Result<MutationResult> {
    self.inner.cancel_bet(bet_id).await
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::cache::KeptReason;
  use crate::league::test_server::{Canned, TestServer};
  use serde_json::json;

  pub(crate) fn cached_client(server: &TestServer) -> CachedLeagueClient {
    cached_client_with(server, FreshnessConfig::default())
  }

  pub(crate) fn cached_client_with(server: &TestServer, freshness: FreshnessConfig) -> CachedLeagueClient {
    let inner = LeagueClient::with_base(&server.base_url, None, Duration::from_secs(5)).unwrap();
    let storage: Box<dyn CacheStorage> = Box::new(SqliteStorage::in_memory().unwrap());
    let cache =
      RevalidatingCache::new(storage, "test").with_dispatcher(Dispatcher::new(2, Duration::ZERO));
    CachedLeagueClient::from_parts(inner, cache, freshness)
  }

  #[tokio::test]
  async fn test_load_then_revalidate_not_modified() {
    let server = TestServer::start(vec![
      Canned::json(200, json!({"tours": ["T1"]})).with_header("ETag", "v1"),
      Canned::empty(304),
    ])
    .await;
    let client = cached_client(&server);

    let first = client.load(&LeagueKey::Tours, |_| {}).await;
    assert!(first.changed());

    let second = client.load(&LeagueKey::Tours, |_| {}).await;
    assert!(matches!(second, Outcome::Unchanged(_)));
    assert_eq!(
      client.cached(&LeagueKey::Tours).unwrap().payload,
      json!({"tours": ["T1"]})
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].contains("etag=v1"));
  }

  #[tokio::test]
  async fn test_buggy_empty_response_keeps_tours() {
    let server = TestServer::start(vec![
      Canned::json(200, json!({"tours": ["T1"]})).with_header("ETag", "v1"),
      Canned::json(200, json!({"tours": []})).with_header("ETag", "v2"),
    ])
    .await;
    let client = cached_client(&server);

    client.load(&LeagueKey::Tours, |_| {}).await;
    let outcome = client.load(&LeagueKey::Tours, |_| {}).await;

    assert!(matches!(
      outcome,
      Outcome::Kept {
        reason: KeptReason::EmptyResponse,
        ..
      }
    ));
    let entry = client.cached(&LeagueKey::Tours).unwrap();
    assert_eq!(entry.payload, json!({"tours": ["T1"]}));
    assert_eq!(entry.validator.as_deref(), Some("v2"));
  }

  #[tokio::test]
  async fn test_concurrent_loads_issue_one_request() {
    let server = TestServer::start(vec![Canned::json(200, json!({"bets": [1]}))
      .with_delay(Duration::from_millis(50))])
    .await;
    let client = cached_client(&server);

    let (a, b) = tokio::join!(
      client.load(&LeagueKey::MyBets, |_| {}),
      client.load(&LeagueKey::MyBets, |_| {}),
    );

    assert_eq!(a, b);
    assert_eq!(server.requests().len(), 1);
    assert_eq!(client.cached_keys().unwrap(), vec!["my-bets".to_string()]);
  }
}
