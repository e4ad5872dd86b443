//! Cached data-access layer for an SPP tuition administration service.
//!
//! The crate is organised around three pieces:
//! - [`service`]: the remote service surface ([`service::SppApi`]), its HTTP
//!   implementation, and the cached client that fronts it
//! - [`cache`]: the process-scoped query cache (dedup, staleness, prefix
//!   invalidation)
//! - [`cli`]: the operator commands behind the `sppctl` binary

pub mod cache;
pub mod cli;
pub mod config;
pub mod service;
