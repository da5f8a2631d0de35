//! Shared fixtures for infra integration tests

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tether_domain::{Config, TokenGrant};
use wiremock::MockServer;

/// Configuration pointing every endpoint at `server`, with fast pacing.
pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.api.auth_url = server.uri();
    config.api.log_url = server.uri();
    config.api.client_secret = "client-secret".to_string();
    config.polling.interval_ms = 10;
    config.polling.max_backoff_ms = 40;
    config.streaming.idle_interval_ms = 10;
    config.streaming.max_backoff_ms = 40;
    config
}

pub fn grant(access: &str, refresh: &str) -> TokenGrant {
    TokenGrant::new(access, refresh, Duration::from_secs(600), Utc::now())
}

pub fn token_response(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "expires_in": 600
    })
}

/// Writer whose contents stay readable while a sink owns it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
