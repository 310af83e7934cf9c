use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::store::GroomingStore;

/// Background task that rewrites the WAL once enough appends pile up.
pub async fn run_compactor(store: Arc<GroomingStore>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}

/// One compactor pass. Returns true if the log was rewritten.
pub async fn compact_if_due(store: &GroomingStore, threshold: u64) -> bool {
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        debug!("compactor: {appends} appends, below threshold {threshold}");
        return false;
    }
    match store.compact_wal().await {
        Ok(()) => true,
        Err(e) => {
            warn!("compaction failed: {e}");
            false
        }
    }
}
