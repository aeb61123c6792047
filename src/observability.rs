use std::net::SocketAddr;

// ── Query metrics ───────────────────────────────────────────────

/// Counter: queries finished by workers. Labels: kind, status.
pub const QUERIES_TOTAL: &str = "ticketsim_queries_total";

/// Counter: registry claims refused. Labels: reason (busy, conflict).
pub const REGISTRY_REJECTIONS_TOTAL: &str = "ticketsim_registry_rejections_total";

// ── Resource metrics ────────────────────────────────────────────

/// Gauge: workers currently admitted through the gate.
pub const WORKERS_ADMITTED: &str = "ticketsim_workers_admitted";

/// Histogram: time spent blocked in the admission gate, in seconds.
pub const ADMISSION_WAIT_SECONDS: &str = "ticketsim_admission_wait_seconds";

/// Gauge: reserved seats per event. Labels: event.
pub const SEATS_RESERVED: &str = "ticketsim_seats_reserved";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
