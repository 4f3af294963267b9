pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod keys;
pub mod types;

#[cfg(test)]
pub(crate) mod test_server;

pub use cached_client::CachedLeagueClient;
pub use keys::LeagueKey;
