//! Log tailing sources

pub mod log_cache;

pub use log_cache::LogCacheSource;
