#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use time::macros::datetime;
use wpp_widget::application::{
    defaults::DefaultsProvider,
    normalize::{Normalizer, PayloadOrigin, RawInstance},
    popular::PopularPostsService,
    query::{ExecutorError, QueryExecutor},
    render::RenderPipeline,
};
use wpp_widget::cache::{
    CacheConfig, CacheInterval, Fingerprint, IntervalUnit, ResultCache, ResultStore, StoreError,
};
use wpp_widget_types::{PopularPost, WidgetConfig};

pub fn post(id: u64) -> PopularPost {
    PopularPost {
        id,
        title: format!("Post {id}"),
        permalink: format!("/p/{id}"),
        author_id: 1,
        date: datetime!(2024-06-01 12:00 UTC),
        comment_count: id,
        pageviews: 1000 / id,
        avg_views: 0.0,
        thumbnail_url: None,
    }
}

/// Returns up to three posts, honouring `limit`.
#[derive(Default)]
pub struct FixedExecutor {
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Duration,
}

impl FixedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueryExecutor for FixedExecutor {
    async fn execute(&self, config: &WidgetConfig) -> Result<Vec<PopularPost>, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExecutorError::query("ranking table is locked"));
        }
        Ok((1..=u64::from(config.limit.min(3))).map(post).collect())
    }
}

pub struct ListRenderer;

impl RenderPipeline for ListRenderer {
    fn render(&self, posts: &[PopularPost], _config: &WidgetConfig) -> String {
        let items: String = posts
            .iter()
            .map(|post| format!("<li><a href=\"{}\">{}</a></li>", post.permalink, post.title))
            .collect();
        format!("<ul class=\"wpp-list\">{items}</ul>")
    }
}

/// Store whose every call fails.
pub struct BrokenStore;

#[async_trait]
impl ResultStore for BrokenStore {
    async fn get(&self, _key: &Fingerprint) -> Result<Option<Bytes>, StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }

    async fn set(&self, _key: &Fingerprint, _value: Bytes, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }

    async fn invalidate(&self, _key: &Fingerprint) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }
}

pub fn active_cache_config() -> CacheConfig {
    CacheConfig::enabled(CacheInterval::new(5, IntervalUnit::Minute))
}

pub fn service(
    cache: ResultCache,
    executor: Arc<FixedExecutor>,
    defaults: WidgetConfig,
) -> PopularPostsService {
    PopularPostsService::new(
        Arc::new(DefaultsProvider::new(defaults)),
        Normalizer::default(),
        cache,
        executor,
        Arc::new(ListRenderer),
    )
}

pub fn form(value: Value) -> RawInstance {
    RawInstance::from_value(PayloadOrigin::Form, value)
}

pub fn stored(value: Value) -> RawInstance {
    RawInstance::from_value(PayloadOrigin::Stored, value)
}
