use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use auditorio::engine::Engine;
use auditorio::http::{AppState, router};
use auditorio::notify::{LogMailer, Mailer, SmtpMailer};
use auditorio::session::SessionStore;
use auditorio::{notify, observability, reaper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("AUDITORIO_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    observability::init(metrics_port);

    let port = std::env::var("AUDITORIO_PORT").unwrap_or_else(|_| "3000".into());
    let bind = std::env::var("AUDITORIO_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("AUDITORIO_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let staff_password =
        std::env::var("AUDITORIO_STAFF_PASSWORD").unwrap_or_else(|_| "auditorio".into());
    let session_ttl_secs: i64 = std::env::var("AUDITORIO_SESSION_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8 * 3600);
    let public_url = std::env::var("AUDITORIO_PUBLIC_URL")
        .unwrap_or_else(|_| "http://localhost:3000".into());

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;

    let mailer: Arc<dyn Mailer> = match std::env::var("AUDITORIO_SMTP_HOST") {
        Ok(host) => {
            let smtp_port: u16 = std::env::var("AUDITORIO_SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(587);
            let from = std::env::var("AUDITORIO_MAIL_FROM")
                .unwrap_or_else(|_| "Auditório <nao-responder@localhost>".into());
            Arc::new(SmtpMailer::new(
                host,
                smtp_port,
                std::env::var("AUDITORIO_SMTP_USER").ok(),
                std::env::var("AUDITORIO_SMTP_PASS").ok(),
                from,
            ))
        }
        Err(_) => Arc::new(LogMailer),
    };
    let notify = notify::spawn_dispatcher(mailer, public_url);

    let wal_path = PathBuf::from(&data_dir).join("reservas.wal");
    let engine = Arc::new(Engine::new(wal_path, notify)?);

    let sessions = Arc::new(SessionStore::new(
        staff_password,
        chrono::Duration::seconds(session_ttl_secs),
    ));
    tokio::spawn(reaper::run_reaper(sessions.clone()));

    let app = router(AppState { engine, sessions });

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("auditorio listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  session_ttl: {session_ttl_secs}s");
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("auditorio stopped");
    Ok(())
}

/// Resolve on SIGTERM or ctrl-c; axum then stops accepting and drains
/// in-flight requests.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
