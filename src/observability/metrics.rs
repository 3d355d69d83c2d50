//! Run metrics recorded through the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op, so library code and
//! tests can record freely. The binary installs a Prometheus exporter when a
//! port is configured.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    ExtractorRuns,
    ExtractorDuration,
    ListingsExtracted,
    EventsMapped,
    EventsDropped,
    BatchesPosted,
    EventsPosted,
    IngestErrors,
    RunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ExtractorRuns => "scraper_extractor_runs_total",
            MetricName::ExtractorDuration => "scraper_extractor_duration_seconds",
            MetricName::ListingsExtracted => "scraper_listings_total",
            MetricName::EventsMapped => "scraper_events_mapped_total",
            MetricName::EventsDropped => "scraper_events_dropped_total",
            MetricName::BatchesPosted => "scraper_batches_total",
            MetricName::EventsPosted => "scraper_events_posted_total",
            MetricName::IngestErrors => "scraper_ingest_errors_total",
            MetricName::RunDuration => "scraper_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static INIT: Once = Once::new();

/// Install the Prometheus exporter on `0.0.0.0:<port>`. Idempotent.
pub fn init_metrics(port: u16) {
    INIT.call_once(|| {
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
            Err(e) => warn!("Prometheus exporter install failed: {}", e),
        }
    });
}

pub struct RunMetrics;

impl RunMetrics {
    pub fn record_extractor(source: &str, status: &str, listings: usize, events: usize, duration_secs: f64) {
        ::metrics::counter!(MetricName::ExtractorRuns.as_str(), "source" => source.to_string(), "status" => status.to_string())
            .increment(1);
        ::metrics::histogram!(MetricName::ExtractorDuration.as_str(), "source" => source.to_string())
            .record(duration_secs);
        ::metrics::counter!(MetricName::ListingsExtracted.as_str(), "source" => source.to_string())
            .increment(listings as u64);
        ::metrics::counter!(MetricName::EventsMapped.as_str(), "source" => source.to_string())
            .increment(events as u64);
    }

    pub fn record_dropped(source: &str, reason: &'static str) {
        ::metrics::counter!(MetricName::EventsDropped.as_str(), "source" => source.to_string(), "reason" => reason)
            .increment(1);
    }

    pub fn record_batch(outcome: &'static str, size: usize) {
        ::metrics::counter!(MetricName::BatchesPosted.as_str(), "outcome" => outcome).increment(1);
        if outcome == "ok" {
            ::metrics::counter!(MetricName::EventsPosted.as_str()).increment(size as u64);
        } else {
            ::metrics::counter!(MetricName::IngestErrors.as_str()).increment(size as u64);
        }
    }

    pub fn record_run(duration_secs: f64) {
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(duration_secs);
    }
}
