use std::sync::LazyLock;
use std::time::Duration;

use prometheus::*;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("ps_search_count", "count of photo searches", &["mode"]).unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "ps_search_duration",
        "duration of the per-query search in seconds",
        &["mode"]
    )
    .unwrap()
});

/// 记录一次搜索及其耗时，mode 为 ann 或 brute
pub fn observe_search(mode: &str, duration: Duration) {
    METRIC_SEARCH_COUNT.with_label_values(&[mode]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[mode]).observe(duration.as_secs_f64());
}
