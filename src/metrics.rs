//! Prometheus metrics for the HTTP surface and refresh cycles

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
    pub refresh_cycles_total: IntCounter,
    pub refresh_cycles_superseded_total: IntCounter,
    pub fallback_slices_total: IntCounter,
    pub partial_entity_errors_total: IntCounter,
    pub malformed_records_total: IntCounter,
    pub cycle_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total number of HTTP requests")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let http_requests_in_flight = IntGauge::new(
            "http_requests_in_flight",
            "Number of HTTP requests currently being served",
        )?;
        let refresh_cycles_total =
            IntCounter::new("refresh_cycles_total", "Refresh cycles started")?;
        let refresh_cycles_superseded_total = IntCounter::new(
            "refresh_cycles_superseded_total",
            "Refresh cycles whose results were discarded because a newer cycle started",
        )?;
        let fallback_slices_total = IntCounter::new(
            "fallback_slices_total",
            "Series slices computed locally because the remote aggregate was empty",
        )?;
        let partial_entity_errors_total = IntCounter::new(
            "partial_entity_errors_total",
            "Entities excluded from a series because their fetch failed",
        )?;
        let malformed_records_total = IntCounter::new(
            "malformed_records_total",
            "Raw records excluded from aggregation because they were malformed",
        )?;
        let cycle_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "cycle_duration_seconds",
            "Duration of a series computation, fetches included",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(refresh_cycles_total.clone()))?;
        registry.register(Box::new(refresh_cycles_superseded_total.clone()))?;
        registry.register(Box::new(fallback_slices_total.clone()))?;
        registry.register(Box::new(partial_entity_errors_total.clone()))?;
        registry.register(Box::new(malformed_records_total.clone()))?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            refresh_cycles_total,
            refresh_cycles_superseded_total,
            fallback_slices_total,
            partial_entity_errors_total,
            malformed_records_total,
            cycle_duration_seconds,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
