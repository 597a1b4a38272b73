use async_trait::async_trait;
use thiserror::Error;
use wpp_widget_types::{PopularPost, WidgetConfig};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("popular posts query failed: {0}")]
    Query(String),
}

impl ExecutorError {
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }
}

/// Ranks content for a normalized configuration. Implementations must not
/// touch the result cache.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, config: &WidgetConfig) -> Result<Vec<PopularPost>, ExecutorError>;
}
