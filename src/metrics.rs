use crate::signal::DataSource;
use tracing::trace;

// Lightweight metrics helpers that are safe in demo builds.
// These intentionally avoid pulling in metrics macros to keep deps stable.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "scout.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "scout.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn cache_result(outcome: &'static str) {
    trace!(
        target = "scout.metrics",
        outcome = outcome,
        "signal_cache_lookup"
    );
}

pub fn signal_source(source: DataSource, strategy: &'static str) {
    trace!(
        target = "scout.metrics",
        real = matches!(source, DataSource::Real),
        strategy = strategy,
        "signal_source"
    );
}
