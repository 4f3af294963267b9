//! Per-run session context.
//!
//! One `Session` is built at startup and handed to every front-end handler.
//! It owns what would otherwise be global page state: the resource currently
//! on screen, the view state of each loaded resource, and the render channel.
//!
//! Each resource moves through
//!
//! ```text
//! Empty -> Loading -> Populated | Failed
//! Populated -> Revalidating -> Populated
//! Failed -> Loading
//! ```
//!
//! and never leaves `Populated`/`Revalidating` for `Empty` or `Failed`.

use color_eyre::Result;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cache::{CacheEntry, KeptReason, Outcome, Resource};
use crate::event::Event;
use crate::league::types::{BetForm, MutationResult};
use crate::league::{CachedLeagueClient, LeagueKey};

/// What the front-end should show for one resource
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
  /// Never loaded
  Empty,
  /// First load in progress, nothing to show yet
  Loading,
  /// Showing cached data while a refresh runs
  Revalidating(CacheEntry),
  /// Showing settled data
  Populated(CacheEntry),
  /// First load failed; shown as a "failed to load" placeholder
  Failed(String),
}

impl ViewState {
  pub fn entry(&self) -> Option<&CacheEntry> {
    match self {
      ViewState::Revalidating(entry) | ViewState::Populated(entry) => Some(entry),
      _ => None,
    }
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, ViewState::Failed(_))
  }

  /// State while a refresh starts, given what the cache holds.
  fn begin(self, cached: Option<&CacheEntry>) -> ViewState {
    match (cached, self) {
      (Some(entry), _) => ViewState::Revalidating(entry.clone()),
      (None, ViewState::Populated(entry)) | (None, ViewState::Revalidating(entry)) => {
        ViewState::Revalidating(entry)
      }
      (None, _) => ViewState::Loading,
    }
  }

  /// State once a refresh has finished.
  fn settle(self, outcome: &Outcome) -> ViewState {
    if let Some(entry) = outcome.entry() {
      return ViewState::Populated(entry.clone());
    }
    match (self, outcome) {
      (ViewState::Populated(entry), _) | (ViewState::Revalidating(entry), _) => {
        ViewState::Populated(entry)
      }
      (_, Outcome::Failed(err)) => ViewState::Failed(err.to_string()),
      (state, _) => state,
    }
  }
}

/// Session state shared by all handlers of one run
pub struct Session {
  league: CachedLeagueClient,
  /// Cache key of the resource on screen
  target: Mutex<Option<String>>,
  views: Mutex<HashMap<String, ViewState>>,
  /// Resources kept fresh by the ticker
  watched: Mutex<Vec<LeagueKey>>,
  event_tx: mpsc::UnboundedSender<Event>,
}

impl Session {
  pub fn new(league: CachedLeagueClient, event_tx: mpsc::UnboundedSender<Event>) -> Self {
    Self {
      league,
      target: Mutex::new(None),
      views: Mutex::new(HashMap::new()),
      watched: Mutex::new(Vec::new()),
      event_tx,
    }
  }

  pub fn league(&self) -> &CachedLeagueClient {
    &self.league
  }

  /// Cache key of the resource on screen.
  pub fn target(&self) -> Option<String> {
    lock(&self.target).clone()
  }

  pub fn view(&self, resource: &LeagueKey) -> ViewState {
    lock(&self.views)
      .get(&resource.cache_key())
      .cloned()
      .unwrap_or(ViewState::Empty)
  }

  /// Keep `resource` fresh on every tick.
  pub fn watch(&self, resource: &LeagueKey) {
    let mut watched = lock(&self.watched);
    if !watched.contains(resource) {
      watched.push(resource.clone());
    }
  }

  /// Navigate to `resource` and load it.
  pub async fn open(&self, resource: &LeagueKey) -> ViewState {
    *lock(&self.target) = Some(resource.cache_key());
    self.watch(resource);
    self.refresh(resource).await
  }

  /// Load or revalidate `resource` without changing what is on screen.
  pub async fn refresh(&self, resource: &LeagueKey) -> ViewState {
    let key = resource.cache_key();
    debug!(resource = %resource.description(), "refreshing");

    let outcome = self
      .league
      .load(resource, |cached| {
        self.transition(&key, |view| view.begin(cached));
      })
      .await;

    match &outcome {
      Outcome::Kept {
        reason: KeptReason::FetchFailed(err),
        ..
      } => debug!(key = %key, error = %err, "showing cached data after failed revalidation"),
      Outcome::Kept {
        reason: KeptReason::EmptyResponse,
        ..
      } => debug!(key = %key, "showing cached data over empty response"),
      _ => debug!(key = %key, changed = outcome.changed(), "refresh settled"),
    }
    if self.target().as_deref() != Some(key.as_str()) {
      debug!(key = %key, "result arrived after navigation, not rendering");
    }
    self.transition(&key, |view| view.settle(&outcome))
  }

  /// Refresh every watched resource that is outside its freshness window.
  pub async fn refresh_stale(&self) -> Vec<ViewState> {
    let stale: Vec<LeagueKey> = lock(&self.watched)
      .iter()
      // A failed first load waits for the user to navigate again
      .filter(|resource| !self.view(resource).is_failed() && self.league.is_stale(resource))
      .cloned()
      .collect();

    join_all(stale.iter().map(|resource| self.refresh(resource))).await
  }

  /// Place a bet, then pick up the server-side change to "my bets".
  pub async fn place_bet(&self, bet: &BetForm) -> Result<MutationResult> {
    let result = self.league.place_bet(bet).await?;
    self.after_mutation(&result).await;
    Ok(result)
  }

  /// Cancel a bet, then pick up the server-side change to "my bets".
  pub async fn cancel_bet(&self, bet_id: &str) -> Result<MutationResult> {
    let result = self.league.cancel_bet(bet_id).await?;
    self.after_mutation(&result).await;
    Ok(result)
  }

  async fn after_mutation(&self, result: &MutationResult) {
    if result.success {
      self.refresh(&LeagueKey::MyBets).await;
    } else {
      info!(error = ?result.error, "mutation rejected by server");
    }
  }

  /// Apply a state change and emit a render if `key` is on screen.
  fn transition(&self, key: &str, change: impl FnOnce(ViewState) -> ViewState) -> ViewState {
    let next = {
      let mut views = lock(&self.views);
      let current = views.remove(key).unwrap_or(ViewState::Empty);
      let next = change(current);
      views.insert(key.to_string(), next.clone());
      next
    };

    if self.target().as_deref() == Some(key) {
      let render = Event::Render {
        key: key.to_string(),
        view: next.clone(),
      };
      if self.event_tx.send(render).is_err() {
        debug!(key = %key, "render receiver closed, dropping render");
      }
    }
    next
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
