// Prometheus metrics for the workspace API

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref EVALUATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("codelab_evaluations_total", "Finished evaluations by mode and status"),
        &["mode", "status"]
    )
    .expect("metric can be created");

    pub static ref STALE_RESPONSES_TOTAL: IntCounter = IntCounter::new(
        "codelab_stale_responses_total",
        "Evaluation results discarded because the session changed"
    )
    .expect("metric can be created");

    pub static ref REJECTED_EVALUATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("codelab_rejected_evaluations_total", "Run/Submit requests rejected before dispatch"),
        &["reason"]
    )
    .expect("metric can be created");
}

/// Register all collectors; call once at startup
pub fn register() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(EVALUATIONS_TOTAL.clone()),
        Box::new(STALE_RESPONSES_TOTAL.clone()),
        Box::new(REJECTED_EVALUATIONS_TOTAL.clone()),
    ];
    for collector in collectors {
        // Already registered is fine (tests build several routers)
        let _ = REGISTRY.register(collector);
    }
}

/// Render the registry in the Prometheus text format
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
