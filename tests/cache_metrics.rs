mod support;

use std::collections::HashSet;
use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;
use wpp_widget::application::popular::{METRIC_EXECUTOR_FAILURE, METRIC_QUERY_MS};
use wpp_widget::cache::{
    CacheConfig, METRIC_CACHE_BYPASS, METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
    ResultCache,
};
use wpp_widget::infra::telemetry;
use wpp_widget_types::WidgetConfig;

use support::{BrokenStore, FixedExecutor, active_cache_config, service, stored};

#[tokio::test]
async fn render_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let raw = stored(json!({"limit": 2}));

    // hit + miss
    let cached = service(
        ResultCache::in_memory(active_cache_config()),
        FixedExecutor::new(),
        WidgetConfig::default(),
    );
    cached.get_popular(&raw).await.expect("rendered");
    cached.get_popular(&raw).await.expect("rendered");

    // bypass
    let uncached = service(
        ResultCache::in_memory(CacheConfig::default()),
        FixedExecutor::new(),
        WidgetConfig::default(),
    );
    uncached.get_popular(&raw).await.expect("rendered");

    // backend errors + executor failure
    let failing_executor = FixedExecutor::new();
    failing_executor.set_failing(true);
    let broken = service(
        ResultCache::new(active_cache_config(), Arc::new(BrokenStore)),
        failing_executor,
        WidgetConfig::default(),
    );
    broken.get_popular(&raw).await.expect("rendered");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        METRIC_CACHE_HIT,
        METRIC_CACHE_MISS,
        METRIC_CACHE_BYPASS,
        METRIC_CACHE_ERROR,
        METRIC_EXECUTOR_FAILURE,
        METRIC_QUERY_MS,
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
