//! # Tether Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - HTTP client implementation (reqwest)
//! - Platform API adapters: job status, log cache, OAuth token exchange
//! - Traffic log sinks and tracing subscriber setup
//! - Configuration loading from environment and files
//!
//! ## Architecture
//! - Implements traits defined in `tether-core`
//! - Depends on `tether-domain`, `tether-common` and `tether-core`
//! - Contains all "impure" code (network, files, global subscriber)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod logging;
pub mod logs;
pub mod observability;

// Re-export commonly used items
pub use api::ApiClient;
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use logging::{TracingTrafficSink, WriterTrafficSink};
pub use logs::LogCacheSource;
pub use observability::{init_tracing, LogFormat};
