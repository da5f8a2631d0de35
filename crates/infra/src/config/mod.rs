//! Configuration loading
//!
//! `TETHER_*` environment variables take precedence; otherwise the first
//! `tether.{json,toml}` / `config.{json,toml}` found is used.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
