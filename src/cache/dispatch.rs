//! Bounded dispatch of background revalidations.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

/// Limits how many background requests run at once and how closely they may start.
pub struct Dispatcher {
  permits: Semaphore,
  min_spacing: Duration,
  /// Earliest instant the next dispatch may start
  next_slot: Mutex<Instant>,
}

impl Dispatcher {
  pub fn new(max_concurrent: usize, min_spacing: Duration) -> Self {
    Self {
      permits: Semaphore::new(max_concurrent.max(1)),
      min_spacing,
      next_slot: Mutex::new(Instant::now()),
    }
  }

  /// Run `fut` once a permit is free and the spacing since the previous start has elapsed.
  pub async fn run<F: Future>(&self, fut: F) -> F::Output {
    // The semaphore is never closed, so acquire only fails if that changes.
    let _permit = self.permits.acquire().await.ok();
    self.wait_turn().await;
    fut.await
  }

  async fn wait_turn(&self) {
    let mut next = self.next_slot.lock().await;
    if *next > Instant::now() {
      tokio::time::sleep_until(*next).await;
    }
    *next = Instant::now() + self.min_spacing;
  }
}

impl Default for Dispatcher {
  fn default() -> Self {
    Self::new(2, Duration::from_millis(250))
  }
}
