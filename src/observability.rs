use std::net::SocketAddr;

// ── Booking metrics (request-driven) ────────────────────────────

/// Counter: reservations committed.
pub const RESERVATIONS_COMMITTED_TOTAL: &str = "pawslot_reservations_committed_total";

/// Counter: commits rejected. Labels: stage (validation, out_of_hours, slot_conflict, ...).
pub const RESERVATION_CONFLICTS_TOTAL: &str = "pawslot_reservation_conflicts_total";

/// Counter: reservations moved to cancelled.
pub const RESERVATIONS_CANCELLED_TOTAL: &str = "pawslot_reservations_cancelled_total";

/// Counter: availability computations served.
pub const SLOT_QUERIES_TOTAL: &str = "pawslot_slot_queries_total";

/// Histogram: end-to-end commit latency in seconds.
pub const COMMIT_DURATION_SECONDS: &str = "pawslot_commit_duration_seconds";

// ── Storage metrics ─────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "pawslot_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "pawslot_wal_flush_batch_size";

/// Gauge: groomers loaded in the store.
pub const GROOMERS_ACTIVE: &str = "pawslot_groomers_active";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
