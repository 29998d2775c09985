use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    searches_total: AtomicU64,
    searches_succeeded_total: AtomicU64,
    invalid_inputs_total: AtomicU64,
    service_failures_total: AtomicU64,
    malformed_responses_total: AtomicU64,
    stale_results_dropped_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub searches_total: u64,
    pub searches_succeeded_total: u64,
    pub invalid_inputs_total: u64,
    pub service_failures_total: u64,
    pub malformed_responses_total: u64,
    pub stale_results_dropped_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_search(&self) {
        self.searches_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("bestroute_searches_total").increment(1);
    }

    pub fn inc_success(&self) {
        self.searches_succeeded_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("bestroute_searches_succeeded_total").increment(1);
    }

    pub fn inc_invalid_input(&self) {
        self.invalid_inputs_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("bestroute_invalid_inputs_total").increment(1);
    }

    pub fn inc_service_failure(&self) {
        self.service_failures_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("bestroute_service_failures_total").increment(1);
    }

    pub fn inc_malformed_response(&self) {
        self.malformed_responses_total
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("bestroute_malformed_responses_total").increment(1);
    }

    pub fn inc_stale_dropped(&self) {
        self.stale_results_dropped_total
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!("bestroute_stale_results_dropped_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("bestroute_search_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let searches = self.searches_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            searches_total: searches,
            searches_succeeded_total: self.searches_succeeded_total.load(Ordering::Relaxed),
            invalid_inputs_total: self.invalid_inputs_total.load(Ordering::Relaxed),
            service_failures_total: self.service_failures_total.load(Ordering::Relaxed),
            malformed_responses_total: self.malformed_responses_total.load(Ordering::Relaxed),
            stale_results_dropped_total: self.stale_results_dropped_total.load(Ordering::Relaxed),
            avg_latency_millis: if searches == 0 {
                0.0
            } else {
                latency as f64 / searches as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,bestroute_planner=info,bestroute_completion=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
