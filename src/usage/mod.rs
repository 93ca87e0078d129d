//! Usage aggregation across AI providers.
//!
//! Resolves credentials for each provider, fetches quota or balance data
//! concurrently, normalizes it into [`types::ProviderResult`]s and serves it
//! through a stale-while-revalidate cache.

pub mod coordinator;
pub mod credentials;
pub mod fetcher;
pub mod http_client;
pub mod providers;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{HostCommand, LoadOutcome, RefreshCoordinator, RefreshOutcome, UsageEvent};
pub use fetcher::UsageFetcher;
pub use store::CacheStore;
pub use types::{Payload, ProviderResult, Service};
