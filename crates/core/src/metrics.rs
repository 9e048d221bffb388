//! Prometheus metrics for the compressor.
//!
//! This module provides metrics for:
//! - Compression requests by terminal outcome
//! - Encoder runs by rate-control mode
//!
//! The collectors are process-wide. [`REGISTRY`] holds all of them; embedders
//! that run their own registry can register [`all_metrics`] there instead.

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Registry with every clipfit collector registered.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

/// Compression requests total by outcome.
pub static COMPRESSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipfit_compressions_total", "Total compression requests"),
        &["outcome"], // "success", "rejected", "unconverged", "tool_missing", "encode_failure"
    )
    .unwrap()
});

/// Compression duration in seconds.
pub static COMPRESSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "clipfit_compression_duration_seconds",
            "Duration of a compression request, all attempts included",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Encoder runs total by mode.
pub static ENCODE_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("clipfit_encode_runs_total", "Total encoder invocations"),
        &["mode"], // "single_pass", "two_pass"
    )
    .unwrap()
});

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(COMPRESSIONS_TOTAL.clone()),
        Box::new(COMPRESSION_DURATION.clone()),
        Box::new(ENCODE_RUNS_TOTAL.clone()),
    ]
}

/// Encode the collectors in [`REGISTRY`] as Prometheus text format.
pub fn encode_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
