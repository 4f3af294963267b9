use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub freshness: FreshnessConfig,
  #[serde(default)]
  pub dispatch: DispatchConfig,
  /// Interval of the refresh ticker used by `watch`
  #[serde(default = "default_tick_secs")]
  pub tick_secs: u64,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the league API (e.g., "https://league.example/api/")
  pub base_url: String,
  /// Request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Prefix for stored keys, so several apps can share one store
  #[serde(default = "default_namespace")]
  pub namespace: String,
  /// Database location (defaults to $XDG_DATA_HOME/matchday/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      namespace: default_namespace(),
      path: None,
    }
  }
}

/// Freshness windows per resource, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct FreshnessConfig {
  #[serde(default = "default_tours_secs")]
  pub tours_secs: u64,
  #[serde(default = "default_my_bets_secs")]
  pub my_bets_secs: u64,
  #[serde(default = "default_match_detail_secs")]
  pub match_detail_secs: u64,
}

impl Default for FreshnessConfig {
  fn default() -> Self {
    Self {
      tours_secs: default_tours_secs(),
      my_bets_secs: default_my_bets_secs(),
      match_detail_secs: default_match_detail_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
  /// Maximum number of background revalidations in flight
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Minimum delay between two background dispatches
  #[serde(default = "default_min_spacing_ms")]
  pub min_spacing_ms: u64,
}

impl Default for DispatchConfig {
  fn default() -> Self {
    Self {
      max_concurrent: default_max_concurrent(),
      min_spacing_ms: default_min_spacing_ms(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Default filter directive when RUST_LOG is unset
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Log to a file in the data directory instead of stderr
  #[serde(default = "default_log_to_file")]
  pub file: bool,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      file: default_log_to_file(),
    }
  }
}

fn default_tick_secs() -> u64 {
  30
}

fn default_timeout_secs() -> u64 {
  15
}

fn default_namespace() -> String {
  "matchday".to_string()
}

fn default_tours_secs() -> u64 {
  300
}

fn default_my_bets_secs() -> u64 {
  120
}

fn default_match_detail_secs() -> u64 {
  600
}

fn default_max_concurrent() -> usize {
  2
}

fn default_min_spacing_ms() -> u64 {
  250
}

fn default_log_level() -> String {
  "matchday=info".to_string()
}

fn default_log_to_file() -> bool {
  true
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./matchday.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/matchday/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/matchday/config.yaml\n\
                 with at least:\n  api:\n    base_url: https://league.example/api/"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("matchday.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("matchday").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the Telegram init data used as identity token.
  ///
  /// Checks MATCHDAY_INIT_DATA.
  pub fn get_init_data() -> Result<String> {
    std::env::var("MATCHDAY_INIT_DATA")
      .map_err(|_| eyre!("Identity token not found. Set MATCHDAY_INIT_DATA environment variable."))
  }
}
