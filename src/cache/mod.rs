//! Client-side query caching.
//!
//! This module is service-agnostic: it works on canonical string keys and
//! serialized values, and provides
//! - fetch deduplication (identical concurrent reads issue one remote call)
//! - staleness tracking with a configurable stale time
//! - segment-aware prefix invalidation for mutation coordination
//! - bounded exponential retry for reads

mod state;
mod store;

pub use state::{QueryState, RetryPolicy};
pub use store::QueryCache;
