//! Resource keys for league API calls.

use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::cache::{Freshness, Resource};
use crate::config::FreshnessConfig;

/// Logical resources of the league API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeagueKey {
  /// Full schedule grouped by tour
  Tours,
  /// Bets of the current user
  MyBets,
  /// Detail bundle of a single fixture
  MatchDetail {
    home: String,
    away: String,
    date: String,
  },
}

impl Resource for LeagueKey {
  fn cache_key(&self) -> String {
    match self {
      Self::Tours => "tours".to_string(),
      Self::MyBets => "my-bets".to_string(),
      Self::MatchDetail { home, away, date } => {
        let input = format!("{}|{}|{}", normalize(home), normalize(away), normalize(date));

        // SHA256 hash for stable, fixed-length keys
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("match:{}", &digest[..16])
      }
    }
  }

  fn description(&self) -> String {
    match self {
      Self::Tours => "tours".to_string(),
      Self::MyBets => "my bets".to_string(),
      Self::MatchDetail { home, away, date } => format!("match {} - {} on {}", home, away, date),
    }
  }
}

impl LeagueKey {
  pub fn match_detail(home: &str, away: &str, date: &str) -> Self {
    Self::MatchDetail {
      home: home.trim().to_string(),
      away: away.trim().to_string(),
      date: date.trim().to_string(),
    }
  }

  /// Endpoint path relative to the API base URL.
  pub fn path(&self) -> &'static str {
    match self {
      Self::Tours => "tours",
      Self::MyBets => "my-bets",
      Self::MatchDetail { .. } => "match",
    }
  }

  /// Resource-specific query parameters.
  pub fn query(&self) -> Vec<(&'static str, String)> {
    match self {
      Self::MatchDetail { home, away, date } => vec![
        ("home", home.clone()),
        ("away", away.clone()),
        ("date", date.clone()),
      ],
      _ => Vec::new(),
    }
  }

  /// Name of the list field in the payload, for list resources.
  pub fn list_field(&self) -> Option<&'static str> {
    match self {
      Self::Tours => Some("tours"),
      Self::MyBets => Some("bets"),
      Self::MatchDetail { .. } => None,
    }
  }

  pub fn freshness(&self, config: &FreshnessConfig) -> Freshness {
    let secs = match self {
      Self::Tours => config.tours_secs,
      Self::MyBets => config.my_bets_secs,
      Self::MatchDetail { .. } => config.match_detail_secs,
    };
    Freshness::new(Duration::from_secs(secs))
  }

  /// Parse a list resource name as typed on the command line.
  pub fn parse_list(name: &str) -> Option<Self> {
    match name.trim().to_lowercase().as_str() {
      "tours" | "schedule" => Some(Self::Tours),
      "bets" | "my-bets" | "mybets" => Some(Self::MyBets),
      _ => None,
    }
  }
}

/// Normalize fixture fields for consistent hashing.
/// Trims whitespace and lowercases for case-insensitive matching.
fn normalize(value: &str) -> String {
  value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_list_keys() {
    assert_eq!(LeagueKey::Tours.cache_key(), "tours");
    assert_eq!(LeagueKey::MyBets.cache_key(), "my-bets");
  }

  #[test]
  fn test_match_key_ignores_case_and_whitespace() {
    let a = LeagueKey::match_detail("Lions", "Tigers", "2024-05-01");
    let b = LeagueKey::MatchDetail {
      home: " lions ".to_string(),
      away: "TIGERS".to_string(),
      date: "2024-05-01 ".to_string(),
    };

    assert_eq!(a.cache_key(), b.cache_key());
    assert!(a.cache_key().starts_with("match:"));
    assert_eq!(a.cache_key().len(), "match:".len() + 16);
  }

  #[test]
  fn test_match_key_depends_on_order() {
    let a = LeagueKey::match_detail("Lions", "Tigers", "2024-05-01");
    let b = LeagueKey::match_detail("Tigers", "Lions", "2024-05-01");
    assert_ne!(a.cache_key(), b.cache_key());
  }

  #[test]
  fn test_freshness_per_resource() {
    let config = FreshnessConfig::default();
    assert_eq!(
      LeagueKey::Tours.freshness(&config).window,
      Duration::from_secs(config.tours_secs)
    );
    assert_eq!(
      LeagueKey::MyBets.freshness(&config).window,
      Duration::from_secs(config.my_bets_secs)
    );
  }

  #[test]
  fn test_parse_list_names() {
    assert_eq!(LeagueKey::parse_list("Tours"), Some(LeagueKey::Tours));
    assert_eq!(LeagueKey::parse_list("bets"), Some(LeagueKey::MyBets));
    assert_eq!(LeagueKey::parse_list("match"), None);
  }

  #[test]
  fn test_match_query() {
    let key = LeagueKey::match_detail("Lions", "Tigers", "2024-05-01");
    assert_eq!(key.path(), "match");
    assert_eq!(key.query()[0], ("home", "Lions".to_string()));
  }
}
