mod cache;
mod config;
mod event;
mod league;
mod logging;
mod render;
mod session;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::cache::Resource;
use crate::event::{Event, EventHandler};
use crate::league::types::{BetForm, MutationResult};
use crate::league::{CachedLeagueClient, LeagueKey};
use crate::session::Session;

#[derive(Parser, Debug)]
#[command(name = "matchday")]
#[command(about = "Football league schedule, match details and bets with an offline-first cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/matchday/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Don't read or write the local cache
  #[arg(long, global = true)]
  no_cache: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the schedule grouped by tour
  Tours,
  /// Show your bets
  Bets,
  /// Show details of one match
  Match {
    #[arg(long)]
    home: String,
    #[arg(long)]
    away: String,
    #[arg(long)]
    date: String,
  },
  /// Place a bet on a match
  Bet {
    #[arg(long)]
    home: String,
    #[arg(long)]
    away: String,
    #[arg(long)]
    date: String,
    /// Outcome to bet on (e.g., 1, X, 2)
    #[arg(long)]
    pick: String,
    #[arg(long)]
    amount: f64,
  },
  /// Cancel a bet
  CancelBet {
    #[arg(long)]
    id: String,
  },
  /// Print a cached resource without going to the network (lists keys when omitted)
  Show { key: Option<String> },
  /// Keep a list on screen and refresh it as it goes stale
  Watch {
    /// "tours" or "bets"
    #[arg(default_value = "tours")]
    resource: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.logging)?;
  info!(command = ?args.command, "starting");

  let league = CachedLeagueClient::new(&config, !args.no_cache)?;
  let mut events = EventHandler::new(Duration::from_secs(config.tick_secs.max(1)));
  let session = Session::new(league, events.sender());

  match args.command {
    Command::Tours => print_resource(&session, &LeagueKey::Tours).await,
    Command::Bets => print_resource(&session, &LeagueKey::MyBets).await,
    Command::Match { home, away, date } => {
      print_resource(&session, &LeagueKey::match_detail(&home, &away, &date)).await
    }
    Command::Bet {
      home,
      away,
      date,
      pick,
      amount,
    } => {
      let result = session
        .place_bet(&BetForm {
          home,
          away,
          date,
          pick,
          amount,
        })
        .await?;
      report_mutation("Bet placed", result)
    }
    Command::CancelBet { id } => {
      let result = session.cancel_bet(&id).await?;
      report_mutation("Bet cancelled", result)
    }
    Command::Show { key } => show_cached(session.league(), key.as_deref()),
    Command::Watch { resource } => {
      let resource = LeagueKey::parse_list(&resource)
        .ok_or_else(|| eyre!("Unknown resource '{}', expected tours or bets", resource))?;
      watch(&session, &mut events, &resource).await
    }
  }
}

/// Load a resource and print the settled view.
async fn print_resource(session: &Session, resource: &LeagueKey) -> Result<()> {
  let view = session.open(resource).await;
  println!(
    "{}",
    render::render_view(&resource.description(), resource.list_field(), &view)
  );

  if view.is_failed() {
    return Err(eyre!("{} could not be loaded", resource.description()));
  }
  Ok(())
}

fn report_mutation(done: &str, result: MutationResult) -> Result<()> {
  if !result.success {
    return Err(eyre!(
      "Rejected by server: {}",
      result.error.unwrap_or_else(|| "unknown error".to_string())
    ));
  }

  println!("{}", done);
  if let Some(fields) = result.fields.as_object().filter(|f| !f.is_empty()) {
    for (name, value) in fields {
      println!("  {}: {}", name, value);
    }
  }
  Ok(())
}

fn show_cached(league: &CachedLeagueClient, key: Option<&str>) -> Result<()> {
  let Some(key) = key else {
    for key in league.cached_keys()? {
      println!("{}", key);
    }
    return Ok(());
  };

  let (entry, list_field) = match LeagueKey::parse_list(key) {
    Some(resource) => (league.cached(&resource), resource.list_field()),
    None => (league.cached_by_key(key), None),
  };

  match entry {
    Some(entry) => {
      println!("{}", render::render_entry(list_field, &entry));
      Ok(())
    }
    None => Err(eyre!("Nothing cached for {}", key)),
  }
}

/// Keep `resource` on screen, re-rendering when its payload changes.
async fn watch(session: &Session, events: &mut EventHandler, resource: &LeagueKey) -> Result<()> {
  let title = resource.description();
  let mut shown: Option<serde_json::Value> = None;

  session.open(resource).await;

  while let Some(event) = events.next().await {
    match event {
      Event::Tick => {
        session.refresh_stale().await;
      }
      Event::Render { key, view } => {
        if key != resource.cache_key() {
          continue;
        }
        let payload = view.entry().map(|e| e.payload.clone());
        let print = match (&payload, &shown) {
          (Some(new), Some(old)) => new != old,
          (Some(_), None) => true,
          (None, _) => shown.is_none(),
        };
        if print {
          println!("{}\n", render::render_view(&title, resource.list_field(), &view));
          if payload.is_some() {
            shown = payload;
          }
        }
      }
    }
  }

  Ok(())
}
