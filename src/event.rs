use std::time::Duration;
use tokio::sync::mpsc;

use crate::session::ViewState;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Periodic tick driving revalidation of watched resources
  Tick,
  /// The view of the resource on screen changed
  Render { key: String, view: ViewState },
}

/// Event handler that merges renders from the session with a single refresh timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn the ticker
    let ticker_tx = tx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      // The first tick completes immediately; the initial load covers it
      interval.tick().await;
      loop {
        interval.tick().await;
        if ticker_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  /// Sender for session renders
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
