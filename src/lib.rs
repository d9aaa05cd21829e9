// library entry
pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod policy;
pub mod store;

#[cfg(test)]
pub mod test_utils;

// Re-export key components for convenience
pub use cache::{CacheClient, CacheStatsReport, ConnectionState};
pub use error::{CacheError, RateGateError, Result};
pub use gate::{AuthenticatedUser, RateGateLayer};
pub use logging::init as init_logging;
pub use policy::{KeyStrategy, Policy, PolicyKind};
pub use store::{CounterStore, RateLimitStore, WindowSlot};
