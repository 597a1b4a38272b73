mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use wpp_widget::application::normalize::{RawInstance, normalize};
use wpp_widget::cache::{
    CacheConfig, CacheStatus, ManualClock, MemoryResultStore, ResultCache, derive_key,
};
use wpp_widget_types::{DEFAULT_LIMIT, DEFAULT_WPP_START, TimeRange, WidgetConfig};

use support::{BrokenStore, FixedExecutor, active_cache_config, form, post, service, stored};

fn all_time_defaults() -> WidgetConfig {
    WidgetConfig {
        range: TimeRange::All,
        ..WidgetConfig::default()
    }
}

#[tokio::test]
async fn form_input_misses_then_hits() {
    let executor = FixedExecutor::new();
    let service = service(
        ResultCache::in_memory(active_cache_config()),
        executor.clone(),
        all_time_defaults(),
    );
    let raw = form(json!({"limit": "20", "range": "week"}));

    let config = service.resolve(&raw);
    assert_eq!(config.limit, 20);
    assert_eq!(config.range, TimeRange::Week);
    assert!(!config.thumbnail.active);

    let first = service.get_popular(&raw).await.expect("first render");
    assert_eq!(first.status, CacheStatus::Miss);
    assert!(!first.is_cached());
    assert!(
        service
            .cache()
            .get(&derive_key(&config))
            .await
            .is_some_and(|posts| posts == vec![post(1), post(2), post(3)])
    );

    let second = service.get_popular(&raw).await.expect("second render");
    assert_eq!(second.status, CacheStatus::Hit);
    assert_eq!(second.html, first.html);
    assert!(second.with_marker().ends_with("<!-- cached -->"));
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn cache_failure_renders_like_no_cache() {
    let raw = stored(json!({"limit": 2, "order_by": "comments"}));

    let broken_executor = FixedExecutor::new();
    let broken = service(
        ResultCache::new(active_cache_config(), Arc::new(BrokenStore)),
        broken_executor.clone(),
        WidgetConfig::default(),
    );
    let uncached = service(
        ResultCache::in_memory(CacheConfig::default()),
        FixedExecutor::new(),
        WidgetConfig::default(),
    );

    let degraded = broken.get_popular(&raw).await.expect("render with broken cache");
    let baseline = uncached.get_popular(&raw).await.expect("render without cache");

    assert_eq!(degraded.html, baseline.html);
    assert_eq!(degraded.status, CacheStatus::Miss);
    assert_eq!(baseline.status, CacheStatus::Bypass);

    let again = broken.get_popular(&raw).await.expect("second render");
    assert_eq!(again.status, CacheStatus::Miss);
    assert_eq!(broken_executor.calls(), 2);
}

#[tokio::test]
async fn entries_expire_after_the_interval() {
    let clock = Arc::new(ManualClock::default());
    let config = active_cache_config();
    let store = Arc::new(MemoryResultStore::with_clock(&config, clock.clone()));
    let executor = FixedExecutor::new();
    let service = service(
        ResultCache::new(config, store),
        executor.clone(),
        WidgetConfig::default(),
    );
    let raw = stored(json!({"limit": 1}));

    let statuses = [
        service.get_popular(&raw).await,
        service.get_popular(&raw).await,
    ]
    .map(|output| output.expect("rendered").status);
    assert_eq!(statuses, [CacheStatus::Miss, CacheStatus::Hit]);

    clock.advance(Duration::from_secs(5 * 60));
    let after = service.get_popular(&raw).await.expect("rendered");
    assert_eq!(after.status, CacheStatus::Miss);
    assert_eq!(executor.calls(), 2);
}

#[tokio::test]
async fn failed_queries_are_retried_on_next_render() {
    let executor = FixedExecutor::new();
    let service = service(
        ResultCache::in_memory(active_cache_config()),
        executor.clone(),
        WidgetConfig::default(),
    );
    let raw = stored(json!({"limit": 1}));

    executor.set_failing(true);
    let failed = service.get_popular(&raw).await.expect("rendered");
    assert_eq!(failed.html, "<ul class=\"wpp-list\"></ul>");

    executor.set_failing(false);
    let recovered = service.get_popular(&raw).await.expect("rendered");
    assert_eq!(recovered.status, CacheStatus::Miss);
    assert!(recovered.html.contains("Post 1"));

    let cached = service.get_popular(&raw).await.expect("rendered");
    assert_eq!(cached.status, CacheStatus::Hit);
    assert_eq!(executor.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_renders_query_once() {
    let executor = FixedExecutor::slow(Duration::from_millis(50));
    let service = service(
        ResultCache::in_memory(active_cache_config()),
        executor.clone(),
        WidgetConfig::default(),
    );

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .get_popular(&stored(json!({"limit": 3})))
                .await
                .expect("rendered")
        }));
    }

    let mut misses = 0;
    for task in tasks {
        let output = task.await.expect("task joins");
        assert!(output.html.contains("Post 3"));
        if output.status == CacheStatus::Miss {
            misses += 1;
        }
    }

    assert_eq!(misses, 1);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn broken_backend_does_not_queue_concurrent_renders() {
    let executor = FixedExecutor::slow(Duration::from_millis(100));
    let service = service(
        ResultCache::new(active_cache_config(), Arc::new(BrokenStore)),
        executor.clone(),
        WidgetConfig::default(),
    );
    let started = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service
                .get_popular(&stored(json!({"limit": 2})))
                .await
                .expect("rendered")
        }));
    }

    for task in tasks {
        let output = task.await.expect("task joins");
        assert!(output.html.contains("Post 2"));
    }

    assert_eq!(executor.calls(), 1);
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "renders ran one after another: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn without_single_flight_cold_renders_may_duplicate() {
    let config = CacheConfig {
        single_flight: false,
        ..active_cache_config()
    };
    let executor = FixedExecutor::slow(Duration::from_millis(30));
    let service = service(
        ResultCache::in_memory(config),
        executor.clone(),
        WidgetConfig::default(),
    );
    let raw = stored(json!({"limit": 2}));

    let (first, second) = tokio::join!(service.get_popular(&raw), service.get_popular(&raw));

    assert_eq!(first.expect("rendered").html, second.expect("rendered").html);
    assert_eq!(executor.calls(), 2);
    assert_eq!(
        service.get_popular(&raw).await.expect("rendered").status,
        CacheStatus::Hit
    );
}

#[test]
fn custom_html_defaults_only_on_transition() {
    let defaults = WidgetConfig::default();
    let raw = form(json!({"custom_html": "on", "wpp-start": ""}));

    let mut previous = defaults.clone();
    previous.markup.custom_html = false;
    assert_eq!(
        normalize(&raw, &defaults, &previous).markup.wpp_start,
        DEFAULT_WPP_START
    );

    previous.markup.custom_html = true;
    assert_eq!(normalize(&raw, &defaults, &previous).markup.wpp_start, "");
}

#[test]
fn id_filters_are_canonicalized() {
    let defaults = WidgetConfig::default();

    let config = normalize(&stored(json!({"pid": "12,abc,34,,56"})), &defaults, &defaults);
    assert_eq!(config.pid.to_string(), "12,34,56");

    let config = normalize(&stored(json!({"pid": ",,,"})), &defaults, &defaults);
    assert_eq!(config.pid.to_string(), "");
    assert_eq!(serde_json::to_value(&config).expect("serialize")["pid"], "");
}

#[test]
fn numeric_garbage_falls_back_to_default() {
    let defaults = WidgetConfig::default();
    for bad in [json!("abc"), json!(-5)] {
        let config = normalize(&stored(json!({"limit": bad})), &defaults, &defaults);
        assert_eq!(config.limit, DEFAULT_LIMIT);
    }
}

#[test]
fn leaf_patch_touches_only_that_leaf() {
    let defaults = WidgetConfig::default();
    let config = normalize(
        &stored(json!({"thumbnail": {"width": 240}})),
        &defaults,
        &defaults,
    );

    let mut expected = defaults.clone();
    expected.thumbnail.width = 240;
    assert_eq!(config, expected);
}

#[test]
fn fingerprint_ignores_input_order() {
    let defaults = WidgetConfig::default();
    let parse = |text: &str| -> RawInstance {
        support::form(serde_json::from_str(text).expect("valid json"))
    };

    let first = normalize(
        &parse(r#"{"limit":"11","range":"week","pid":"3,4","views":"on"}"#),
        &defaults,
        &defaults,
    );
    let second = normalize(
        &parse(r#"{"views":"on","pid":"3,4","range":"week","limit":"11"}"#),
        &defaults,
        &defaults,
    );
    assert_eq!(derive_key(&first), derive_key(&second));

    let other = normalize(
        &parse(r#"{"limit":"10","range":"week","pid":"3,4","views":"on"}"#),
        &defaults,
        &defaults,
    );
    assert_ne!(derive_key(&first), derive_key(&other));
}
