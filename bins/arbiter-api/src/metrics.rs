// Prometheus metrics for Arbiter API

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Judgings started (path = run | submit | validate)
    pub static ref JUDGINGS: CounterVec = CounterVec::new(
        Opts::new("arbiter_judgings_total", "Total number of judgings started"),
        &["path", "language"]
    )
    .expect("metric can be created");

    // Verdicts produced
    pub static ref VERDICTS: CounterVec = CounterVec::new(
        Opts::new("arbiter_verdicts_total", "Total number of verdicts produced"),
        &["path", "status"]
    )
    .expect("metric can be created");

    // Judgings that ended in a failure instead of a verdict
    pub static ref FAILURES: CounterVec = CounterVec::new(
        Opts::new("arbiter_judging_failures_total", "Total judgings that failed"),
        &["path", "kind"]
    )
    .expect("metric can be created");

    pub static ref JUDGING_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "arbiter_judging_duration_ms",
            "Wall-clock judging time in milliseconds"
        )
        .buckets(vec![100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 120000.0]),
        &["path"]
    )
    .expect("metric can be created");
}

/// Register every collector with the global registry
pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(JUDGINGS.clone()))?;
    REGISTRY.register(Box::new(VERDICTS.clone()))?;
    REGISTRY.register(Box::new(FAILURES.clone()))?;
    REGISTRY.register(Box::new(JUDGING_DURATION.clone()))?;
    Ok(())
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_judging(path: &str, language: &str) {
    JUDGINGS.with_label_values(&[path, language]).inc();
}

pub fn record_verdict(path: &str, status: &str, elapsed: Duration) {
    VERDICTS.with_label_values(&[path, status]).inc();
    JUDGING_DURATION
        .with_label_values(&[path])
        .observe(elapsed.as_secs_f64() * 1000.0);
}

pub fn record_failure(path: &str, kind: &str, elapsed: Duration) {
    FAILURES.with_label_values(&[path, kind]).inc();
    JUDGING_DURATION
        .with_label_values(&[path])
        .observe(elapsed.as_secs_f64() * 1000.0);
}
