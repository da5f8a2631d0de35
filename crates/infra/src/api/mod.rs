//! Platform API adapters
//!
//! This module wires the core ports to the remote API:
//!
//! - [`ApiClient`] composes the HTTP client, traffic logging and session
//!   handling into one authenticated transport
//! - Job documents and `202 Accepted` locations are decoded in [`jobs`]
//! - Refresh tokens are exchanged at the authorization server by
//!   [`OAuthTokenExchanger`]
//! - Non-2xx responses are classified in [`errors`]

pub mod client;
pub mod errors;
pub mod jobs;
pub mod token;

pub use client::ApiClient;
pub use errors::map_status_error;
pub use jobs::{decode_job, job_handle_from_response, HttpJobStatusSource, RequestJobResolver};
pub use token::OAuthTokenExchanger;
