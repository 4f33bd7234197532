use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservation operations handled. Labels: operation, status.
pub const OPERATIONS_TOTAL: &str = "roombook_operations_total";

/// Histogram: operation latency in seconds. Labels: operation.
pub const OPERATION_DURATION_SECONDS: &str = "roombook_operation_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: reservations currently held across all rooms.
pub const RESERVATIONS_STORED: &str = "roombook_reservations_stored";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roombook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roombook_wal_flush_batch_size";

/// The operations exposed at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    QueryByName,
    QueryByRoom,
    Availability,
    Create,
    Update,
    Cancel,
    Get,
    RescheduleById,
    CancelById,
}

impl Operation {
    /// Short label for metrics.
    pub fn label(self) -> &'static str {
        match self {
            Operation::QueryByName => "query_by_name",
            Operation::QueryByRoom => "query_by_room",
            Operation::Availability => "availability",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Cancel => "cancel",
            Operation::Get => "get",
            Operation::RescheduleById => "reschedule_by_id",
            Operation::CancelById => "cancel_by_id",
        }
    }
}

/// Record one finished operation.
pub fn record(op: Operation, status: &'static str, started: std::time::Instant) {
    metrics::counter!(OPERATIONS_TOTAL, "operation" => op.label(), "status" => status).increment(1);
    metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => op.label())
        .record(started.elapsed().as_secs_f64());
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
