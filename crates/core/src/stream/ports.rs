//! Port interfaces for continuous sources

use async_trait::async_trait;
use tether_domain::{LogLine, Result};

/// Tailing source of log lines.
///
/// Each `read` returns the lines that appeared since the previous read, in
/// order; an empty batch means nothing new yet. The source keeps its own
/// cursor.
#[async_trait]
pub trait LogSource: Send {
    async fn read(&mut self) -> Result<Vec<LogLine>>;
}

#[async_trait]
impl<S: LogSource + ?Sized> LogSource for Box<S> {
    async fn read(&mut self) -> Result<Vec<LogLine>> {
        (**self).read().await
    }
}
