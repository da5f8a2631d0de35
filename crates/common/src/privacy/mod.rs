//! Privacy Module - Portable Core
//!
//! Domain-independent redaction of credentials in headers, redirect targets
//! and structured bodies before they reach any log or display surface.

pub mod error;
pub mod redaction;

// Re-export commonly used types
pub use error::{PrivacyError, PrivacyResult};
pub use redaction::{
    RedactionPolicy, RedactionPolicyBuilder, DEFAULT_SENSITIVE_KEY_PATTERN, REDACTION_MARKER,
};
