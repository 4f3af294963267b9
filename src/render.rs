//! Plain-text rendering of resource views for the terminal.

use crate::cache::CacheEntry;
use crate::league::types::{parse_list, Bet, Tour};
use crate::session::ViewState;

const TEAM_WIDTH: usize = 20;

/// Render a view. `list_field` selects the list layout; anything else is shown as JSON.
pub fn render_view(title: &str, list_field: Option<&str>, view: &ViewState) -> String {
  match view {
    ViewState::Empty => String::new(),
    ViewState::Loading => format!("Loading {}...", title),
    ViewState::Failed(err) => format!("Failed to load {}: {}", title, err),
    ViewState::Revalidating(entry) => {
      format!("{}\n(refreshing...)", render_entry(list_field, entry))
    }
    ViewState::Populated(entry) => render_entry(list_field, entry),
  }
}

/// Render the payload of a cache entry.
pub fn render_entry(list_field: Option<&str>, entry: &CacheEntry) -> String {
  let body = match list_field {
    Some("tours") => render_tours(&parse_list(&entry.payload, "tours")),
    Some("bets") => render_bets(&parse_list(&entry.payload, "bets")),
    _ => serde_json::to_string_pretty(&entry.payload).unwrap_or_else(|_| entry.payload.to_string()),
  };

  format!(
    "{}\n-- {} updated {}s ago",
    body,
    entry.key,
    entry.age().num_seconds()
  )
}

fn render_tours(tours: &[Tour]) -> String {
  if tours.is_empty() {
    return "No fixtures scheduled".to_string();
  }

  let mut out = Vec::new();
  for tour in tours {
    out.push(tour.name.clone());
    for fixture in &tour.matches {
      let when = match &fixture.time {
        Some(time) => format!("{} {}", fixture.date, time),
        None => fixture.date.clone(),
      };
      out.push(format!(
        "  {:<16} {:>w$} - {:<w$} {}",
        when,
        truncate(&fixture.home, TEAM_WIDTH),
        truncate(&fixture.away, TEAM_WIDTH),
        fixture.score.as_deref().unwrap_or(""),
        w = TEAM_WIDTH
      ));
    }
  }
  out.join("\n")
}

fn render_bets(bets: &[Bet]) -> String {
  if bets.is_empty() {
    return "No bets yet".to_string();
  }

  bets
    .iter()
    .map(|bet| {
      format!(
        "{:<10} {} - {}  pick {}  stake {}  {}",
        bet.date,
        truncate(&bet.home, TEAM_WIDTH),
        truncate(&bet.away, TEAM_WIDTH),
        bet.pick,
        bet.amount,
        bet.status.as_deref().unwrap_or("pending")
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("Динамо Москва", 9), "Динамо...");
  }

  #[test]
  fn test_failed_placeholder() {
    let text = render_view("tours", Some("tours"), &ViewState::Failed("boom".to_string()));
    assert_eq!(text, "Failed to load tours: boom");
  }

  #[test]
  fn test_render_tours() {
    let entry = CacheEntry::new(
      "tours",
      json!({"tours": [{"name": "Round 1", "matches": [
        {"home": "Lions", "away": "Tigers", "date": "2024-05-01", "time": "18:00", "score": "2:1"}
      ]}]}),
      None,
    );

    let text = render_view("tours", Some("tours"), &ViewState::Populated(entry));
    assert!(text.starts_with("Round 1\n"));
    assert!(text.contains("Lions - Tigers"));
    assert!(text.contains("2:1"));
    assert!(text.contains("-- tours updated"));
  }

  #[test]
  fn test_render_empty_bets_while_refreshing() {
    let entry = CacheEntry::new("my-bets", json!({"bets": []}), None);
    let text = render_view("my bets", Some("bets"), &ViewState::Revalidating(entry));
    assert!(text.starts_with("No bets yet"));
    assert!(text.ends_with("(refreshing...)"));
  }

  #[test]
  fn test_detail_renders_as_json() {
    let entry = CacheEntry::new("match:abc", json!({"match": {"home": "Lions"}}), None);
    let text = render_entry(None, &entry);
    assert!(text.contains("\"home\": \"Lions\""));
  }
}
