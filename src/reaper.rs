use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::session::SessionStore;

/// Background task that periodically purges expired staff sessions.
pub async fn run_reaper(sessions: Arc<SessionStore>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let purged = sessions.purge_expired(chrono::Utc::now());
        if purged > 0 {
            info!("reaped {purged} expired sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn reaper_sweep_clears_expired_sessions() {
        let store = Arc::new(SessionStore::new(
            "segredo".into(),
            chrono::Duration::seconds(-1),
        ));
        store.login("Ana", "ana@example.org", "segredo").unwrap();
        store.login("Bia", "bia@example.org", "segredo").unwrap();
        assert_eq!(store.active_count(), 2);

        // One sweep of what the loop runs every tick.
        let purged = store.purge_expired(Utc::now());
        assert_eq!(purged, 2);
        assert_eq!(store.active_count(), 0);
    }
}
