use crate::cache::{FetchError, Fetched};
use crate::config::Config;
use crate::league::api_types::{content_validator, normalize, ApiMutationResponse};
use crate::league::keys::LeagueKey;
use crate::league::types::{BetForm, MutationResult};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// League API client wrapper
#[derive(Clone)]
pub struct LeagueClient {
  http: reqwest::Client,
  base: Url,
  /// Telegram init data sent as identity token
  init_data: Option<String>,
}

impl LeagueClient {
  pub fn new(config: &Config) -> Result<Self> {
    let init_data = Config::get_init_data().ok();
    if init_data.is_none() {
      debug!("no identity token configured, requests are anonymous");
    }

    Self::with_base(
      &config.api.base_url,
      init_data,
      Duration::from_secs(config.api.timeout_secs),
    )
  }

  pub fn with_base(base_url: &str, init_data: Option<String>, timeout: Duration) -> Result<Self> {
    // A trailing slash keeps the last path segment when joining endpoints
    let base_url = if base_url.ends_with('/') {
      base_url.to_string()
    } else {
      format!("{}/", base_url)
    };
    let base =
      Url::parse(&base_url).map_err(|e| eyre!("Invalid API base URL {}: {}", base_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("matchday/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      init_data,
    })
  }

  fn endpoint(&self, path: &str) -> std::result::Result<Url, url::ParseError> {
    self.base.join(path)
  }

  /// Fetch a resource, conditionally when a validator is given.
  ///
  /// The validator travels both as `If-None-Match` and as the `etag` query
  /// parameter, since the league API reads the latter.
  pub async fn fetch_fresh(
    &self,
    resource: &LeagueKey,
    validator: Option<&str>,
  ) -> std::result::Result<Fetched, FetchError> {
    let mut url = self
      .endpoint(resource.path())
      .map_err(|e| FetchError::Network(format!("invalid endpoint URL: {}", e)))?;
    {
      let mut query = url.query_pairs_mut();
      for (name, value) in resource.query() {
        query.append_pair(name, &value);
      }
      if let Some(init_data) = &self.init_data {
        query.append_pair("init_data", init_data);
      }
      if let Some(v) = validator {
        query.append_pair("etag", v);
      }
    }
    if url.query() == Some("") {
      url.set_query(None);
    }

    let mut request = self.http.get(url);
    if let Some(v) = validator {
      request = request.header(IF_NONE_MATCH, v);
    }

    let response = request
      .send()
      .await
      .map_err(|e| FetchError::Network(e.to_string()))?;

    let status = response.status();
    let header_validator = response
      .headers()
      .get(ETAG)
      .and_then(|v| v.to_str().ok())
      .filter(|v| !v.is_empty())
      .map(String::from);

    if status == StatusCode::NOT_MODIFIED {
      return Ok(Fetched::NotModified {
        validator: header_validator,
      });
    }

    if !status.is_success() {
      return Err(FetchError::Status {
        status: status.as_u16(),
        message: status.canonical_reason().unwrap_or("unknown").to_string(),
      });
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::Network(e.to_string()))?;
    let body: serde_json::Value =
      serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
    let envelope = normalize(body)?;

    if envelope.not_modified {
      return Ok(Fetched::NotModified {
        validator: header_validator.or(envelope.embedded_validator),
      });
    }

    let validator = header_validator
      .or(envelope.embedded_validator)
      .unwrap_or_else(|| content_validator(&envelope.payload));

    Ok(Fetched::Modified {
      payload: envelope.payload,
      validator: Some(validator),
      confirmed_empty: envelope.confirmed_empty,
    })
  }

  /// Post a form to a mutation endpoint.
  async fn post_action(&self, path: &str, fields: &[(&str, String)]) -> Result<MutationResult> {
    let url = self
      .endpoint(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))?;

    let mut form: Vec<(&str, String)> = Vec::with_capacity(fields.len() + 1);
    if let Some(init_data) = &self.init_data {
      form.push(("init_data", init_data.clone()));
    }
    form.extend(fields.iter().cloned());

    let response = self
      .http
      .post(url)
      .form(&form)
      .send()
      .await
      .map_err(|e| eyre!("Failed to call {}: {}", path, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("{} failed with status {}", path, status));
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read {} response: {}", path, e))?;
    let parsed: ApiMutationResponse = serde_json::from_slice(&body)
      .map_err(|e| eyre!("Failed to parse {} response: {}", path, e))?;

    Ok(parsed.into())
  }

  /// Place a bet on a fixture
  pub async fn place_bet(&self, bet: &BetForm) -> Result<MutationResult> {
    self
      .post_action(
        "bet",
        &[
          ("home", bet.home.clone()),
          ("away", bet.away.clone()),
          ("date", bet.date.clone()),
          ("pick", bet.pick.clone()),
          ("amount", bet.amount.to_string()),
        ],
      )
      .await
  }

  /// Cancel a previously placed bet
  pub async fn cancel_bet(&self, bet_id: &str) -> Result<MutationResult> {
    self
      .post_action("cancel-bet", &[("bet_id", bet_id.to_string())])
      .await
  }
}
