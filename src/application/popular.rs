//! Render-time coordination: normalize, consult the cache, query, render.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, instrument, warn};
use wpp_widget_types::{PopularPost, WidgetConfig};

use crate::cache::{CacheStatus, METRIC_CACHE_BYPASS, ResultCache, derive_key};

use super::defaults::DefaultsProvider;
use super::normalize::{Normalizer, RawInstance};
use super::query::{ExecutorError, QueryExecutor};
use super::render::RenderPipeline;

const SOURCE: &str = "application::popular";

pub const METRIC_EXECUTOR_FAILURE: &str = "wpp_executor_failure_total";
pub const METRIC_QUERY_MS: &str = "wpp_query_ms";

/// Appended to markup that was served from the result cache.
pub const CACHED_MARKER: &str = "<!-- cached -->";

/// Rendered list plus where its data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopularOutput {
    pub html: String,
    pub status: CacheStatus,
}

impl PopularOutput {
    pub fn is_cached(&self) -> bool {
        self.status.is_cached()
    }

    /// Markup with the cache marker appended on a hit.
    pub fn with_marker(self) -> String {
        if self.is_cached() {
            let mut html = self.html;
            html.push('\n');
            html.push_str(CACHED_MARKER);
            html
        } else {
            self.html
        }
    }
}

#[derive(Clone)]
pub struct PopularPostsService {
    defaults: Arc<DefaultsProvider>,
    normalizer: Normalizer,
    cache: ResultCache,
    executor: Arc<dyn QueryExecutor>,
    renderer: Arc<dyn RenderPipeline>,
}

impl PopularPostsService {
    pub fn new(
        defaults: Arc<DefaultsProvider>,
        normalizer: Normalizer,
        cache: ResultCache,
        executor: Arc<dyn QueryExecutor>,
        renderer: Arc<dyn RenderPipeline>,
    ) -> Self {
        Self {
            defaults,
            normalizer,
            cache,
            executor,
            renderer,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Render the list for a widget instance; `None` for an empty instance.
    ///
    /// Cache and query failures degrade to a miss and an empty list
    /// respectively; a render always completes.
    #[instrument(skip_all, fields(origin = ?raw.origin()))]
    pub async fn get_popular(&self, raw: &RawInstance) -> Option<PopularOutput> {
        if raw.is_empty() {
            debug!("Skipping empty widget instance");
            return None;
        }

        let config = self.resolve(raw);
        Some(self.render(&config).await)
    }

    /// Normalize `raw` against the current defaults snapshot.
    pub fn resolve(&self, raw: &RawInstance) -> WidgetConfig {
        let defaults = self.defaults.snapshot();
        self.normalizer.resolve(raw, &defaults)
    }

    /// Load and render the list for an already resolved configuration.
    pub async fn render(&self, config: &WidgetConfig) -> PopularOutput {
        let (posts, status) = self.load(config).await;
        let html = self.renderer.render(&posts, config);
        PopularOutput { html, status }
    }

    async fn load(&self, config: &WidgetConfig) -> (Vec<PopularPost>, CacheStatus) {
        if !self.cache.is_active() {
            counter!(METRIC_CACHE_BYPASS).increment(1);
            let posts = self.query(config).await.unwrap_or_default();
            return (posts, CacheStatus::Bypass);
        }

        let key = derive_key(config);
        match self.cache.get_or_compute(&key, || self.query(config)).await {
            Ok(outcome) => outcome,
            Err(_) => (Vec::new(), CacheStatus::Miss),
        }
    }

    async fn query(&self, config: &WidgetConfig) -> Result<Vec<PopularPost>, ExecutorError> {
        let started = Instant::now();
        let result = self.executor.execute(config).await;
        histogram!(METRIC_QUERY_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        match &result {
            Ok(posts) => debug!(count = posts.len(), "Popular posts query finished"),
            Err(err) => {
                counter!(METRIC_EXECUTOR_FAILURE).increment(1);
                warn!(
                    op = "execute",
                    target_module = SOURCE,
                    error = %err,
                    result = "empty_list",
                    "Popular posts query failed"
                );
            }
        }
        result
    }
}
