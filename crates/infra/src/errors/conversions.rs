//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use serde_json::Error as JsonError;
use tether_domain::TetherError;
use thiserror::Error;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct InfraError(#[from] pub TetherError);

impl From<InfraError> for TetherError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoTetherError {
    fn into_tether(self) -> TetherError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TetherError */
/* -------------------------------------------------------------------------- */

impl IntoTetherError for HttpError {
    fn into_tether(self) -> TetherError {
        if self.is_timeout() {
            return TetherError::Transport("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return TetherError::Transport("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message = status.canonical_reason().unwrap_or("unknown status").to_string();
            return match code {
                401 => TetherError::AuthenticationExpired(format!("HTTP {code} {message}")),
                _ => TetherError::Status { status: code, message },
            };
        }

        if self.is_decode() {
            return TetherError::Decode(self.to_string());
        }
        if self.is_builder() {
            return TetherError::InvalidInput(self.to_string());
        }

        TetherError::Transport(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_tether())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → TetherError */
/* -------------------------------------------------------------------------- */

impl IntoTetherError for JsonError {
    fn into_tether(self) -> TetherError {
        TetherError::Decode(format!("invalid JSON at line {} column {}: {self}", self.line(), self.column()))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_tether())
    }
}

/* -------------------------------------------------------------------------- */
/* toml::de::Error → TetherError */
/* -------------------------------------------------------------------------- */

impl IntoTetherError for toml::de::Error {
    fn into_tether(self) -> TetherError {
        TetherError::Config(format!("Invalid TOML format: {}", self.message()))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(value.into_tether())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn status_error(status: StatusCode) -> HttpError {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err()
    }

    #[tokio::test]
    async fn http_status_401_maps_to_authentication_expired() {
        let mapped: TetherError = InfraError::from(status_error(StatusCode::UNAUTHORIZED).await).into();
        match mapped {
            TetherError::AuthenticationExpired(msg) => assert!(msg.contains("401")),
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_status_503_is_retryable() {
        let mapped: TetherError =
            InfraError::from(status_error(StatusCode::SERVICE_UNAVAILABLE).await).into();
        assert_eq!(mapped, TetherError::Status { status: 503, message: "Service Unavailable".into() });
        assert!(mapped.is_retryable());
    }

    #[tokio::test]
    async fn connection_refused_maps_to_transport() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::builder().no_proxy().build().unwrap();
        let err = client.get(format!("http://{addr}")).send().await.unwrap_err();
        let mapped: TetherError = InfraError::from(err).into();
        assert!(matches!(mapped, TetherError::Transport(_)));
    }

    #[test]
    fn json_errors_map_to_decode() {
        let err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let mapped: TetherError = InfraError::from(err).into();
        match mapped {
            TetherError::Decode(msg) => assert!(msg.contains("line 1")),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn toml_errors_map_to_config() {
        let err = toml::from_str::<toml::Table>("= nope").unwrap_err();
        let mapped: TetherError = InfraError::from(err).into();
        assert!(matches!(mapped, TetherError::Config(_)));
    }
}
