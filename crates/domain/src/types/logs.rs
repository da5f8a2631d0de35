//! Application log lines delivered by tailing streams

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_wire_status_conversions;

/// Output stream a log line was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Out,
    Err,
}

impl_wire_status_conversions!(LogKind {
    Out => "out" | "stdout",
    Err => "err" | "stderr",
});

/// One line of application output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Emitting component, e.g. `APP/PROC/WEB` or `STG`.
    pub source_type: String,
    pub source_instance: String,
    pub kind: LogKind,
}

impl LogLine {
    pub fn new(timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
            source_type: String::new(),
            source_instance: String::new(),
            kind: LogKind::Out,
        }
    }

    #[must_use]
    pub fn from_source(
        mut self,
        source_type: impl Into<String>,
        source_instance: impl Into<String>,
    ) -> Self {
        self.source_type = source_type.into();
        self.source_instance = source_instance.into();
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: LogKind) -> Self {
        self.kind = kind;
        self
    }

    /// Staging output is tagged `STG` by the platform.
    pub fn is_staging(&self) -> bool {
        self.source_type.eq_ignore_ascii_case("STG")
    }
}
