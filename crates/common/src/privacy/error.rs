use thiserror::Error;

/// Errors raised while preparing data for display
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrivacyError {
    #[error("invalid redaction pattern: {0}")]
    InvalidPattern(String),

    #[error("malformed JSON body: {0}")]
    MalformedJson(String),
}

pub type PrivacyResult<T> = Result<T, PrivacyError>;
