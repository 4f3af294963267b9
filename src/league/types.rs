use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// A round of fixtures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
  #[serde(default, alias = "tour", alias = "number")]
  pub id: Option<Value>,
  #[serde(default, alias = "title")]
  pub name: String,
  #[serde(default)]
  pub matches: Vec<Fixture>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// A single match in the schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
  #[serde(alias = "home_team")]
  pub home: String,
  #[serde(alias = "away_team")]
  pub away: String,
  #[serde(default)]
  pub date: String,
  pub time: Option<String>,
  #[serde(alias = "result")]
  pub score: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// A bet placed by the current user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
  pub id: Option<Value>,
  #[serde(default, alias = "home_team")]
  pub home: String,
  #[serde(default, alias = "away_team")]
  pub away: String,
  #[serde(default)]
  pub date: String,
  #[serde(default, alias = "selection")]
  pub pick: String,
  #[serde(default)]
  pub amount: f64,
  pub status: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Form fields for placing a bet
#[derive(Debug, Clone)]
pub struct BetForm {
  pub home: String,
  pub away: String,
  pub date: String,
  pub pick: String,
  pub amount: f64,
}

/// Result of a mutation endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
  pub success: bool,
  pub error: Option<String>,
  /// Action-specific result fields
  pub fields: Value,
}

/// Parse the items of the list field `field` in a payload.
///
/// A bare array payload is accepted as the list itself. Items that don't
/// match `T` are skipped.
pub fn parse_list<T: serde::de::DeserializeOwned>(payload: &Value, field: &str) -> Vec<T> {
  let items = match payload {
    Value::Array(items) => items,
    other => match other.get(field).and_then(Value::as_array) {
      Some(items) => items,
      None => return Vec::new(),
    },
  };

  items
    .iter()
    .filter_map(|item| match serde_json::from_value(item.clone()) {
      Ok(parsed) => Some(parsed),
      Err(e) => {
        debug!(field, error = %e, "skipping unparseable item");
        None
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_tours_with_aliases() {
    let payload = json!({"tours": [
      {"tour": 1, "title": "Round 1", "matches": [
        {"home_team": "Lions", "away_team": "Tigers", "date": "2024-05-01", "result": "2:1"}
      ]},
      {"name": "Round 2"}
    ]});

    let tours: Vec<Tour> = parse_list(&payload, "tours");
    assert_eq!(tours.len(), 2);
    assert_eq!(tours[0].name, "Round 1");
    assert_eq!(tours[0].id, Some(json!(1)));
    assert_eq!(tours[0].matches[0].home, "Lions");
    assert_eq!(tours[0].matches[0].score.as_deref(), Some("2:1"));
    assert!(tours[1].matches.is_empty());
  }

  #[test]
  fn test_parse_list_skips_bad_items() {
    let payload = json!({"bets": [{"id": 1, "pick": "1", "amount": 10}, "garbage"]});
    let bets: Vec<Bet> = parse_list(&payload, "bets");
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].amount, 10.0);
  }

  #[test]
  fn test_parse_list_accepts_bare_arrays_and_missing_fields() {
    let bets: Vec<Bet> = parse_list(&json!([{"pick": "X"}]), "bets");
    assert_eq!(bets[0].pick, "X");

    let tours: Vec<Tour> = parse_list(&json!({"other": []}), "tours");
    assert!(tours.is_empty());
  }
}
