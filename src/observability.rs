use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations accepted into the store.
pub const RESERVATIONS_SUBMITTED_TOTAL: &str = "auditorio_reservations_submitted_total";

/// Counter: submissions rejected by the conflict checker.
pub const SUBMIT_CONFLICTS_TOTAL: &str = "auditorio_submit_conflicts_total";

/// Counter: decisions recorded. Labels: status.
pub const RESERVATIONS_DECIDED_TOTAL: &str = "auditorio_reservations_decided_total";

// ── Notification dispatcher ─────────────────────────────────────

/// Counter: notification emails handed to the transport successfully.
pub const MAIL_SENT_TOTAL: &str = "auditorio_mail_sent_total";

/// Counter: notification emails the transport failed to deliver.
pub const MAIL_FAILED_TOTAL: &str = "auditorio_mail_failed_total";

/// Counter: notifications dropped before dispatch (full/closed channel).
pub const MAIL_DROPPED_TOTAL: &str = "auditorio_mail_dropped_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: live staff sessions.
pub const SESSIONS_ACTIVE: &str = "auditorio_sessions_active";

/// Counter: failed staff logins.
pub const LOGIN_FAILURES_TOTAL: &str = "auditorio_login_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "auditorio_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "auditorio_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
