//! Revalidating client cache.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Persists one `{payload, validator, storedAt}` entry per resource key
//! - Serves cached data immediately and revalidates with the stored validator
//! - Never replaces a populated entry with an empty response
//! - Coalesces concurrent refreshes of the same key into one request
//! - Bounds and spaces background revalidations

mod dispatch;
mod entry;
mod layer;
mod storage;
mod traits;

pub use dispatch::Dispatcher;
pub use entry::CacheEntry;
pub use layer::RevalidatingCache;
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{FetchError, Fetched, Freshness, KeptReason, Outcome, Resource};
