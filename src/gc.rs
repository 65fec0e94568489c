use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::store::DatabaseStore;

/// Start a background task sweeping expired sessions every `period`, along
/// with abandoned lock rows.
///
/// Sessions without an explicit expiry expire once they are older than the
/// configured session lifetime.
pub fn spawn_gc_task(store: DatabaseStore, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(period);

        loop {
            interval_timer.tick().await;
            run_sweep(&store).await;
        }
    })
}

async fn run_sweep(store: &DatabaseStore) {
    debug!("Running session GC");

    match store.garbage_collect(store.config().session_lifetime).await {
        Ok(count) if count > 0 => debug!(sessions_removed = count, "Expired sessions removed"),
        Err(e) => error!(error = %e, "Failed to remove expired sessions"),
        _ => {}
    }

    if let Err(e) = store.purge_stale_locks().await {
        error!(error = %e, "Failed to purge stale session locks");
    }
}
