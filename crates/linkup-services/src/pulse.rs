//! Presence pulse — the heartbeat that keeps our registry entry fresh.
//!
//! Republishes the local user's profile on a fixed interval for as long as
//! the session is alive. Failures are logged and swallowed; the next tick
//! retries on schedule, with no backoff. The session owns the task handle
//! and aborts it on logout — exactly one pulse per session, never leaked
//! across a logout/login cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use linkup_core::types::{now_ms, PeerIdentity};

use crate::directory::DirectoryClient;
use crate::store::LocalStore;

/// Republish the current profile forever. Cancel by aborting the task.
///
/// The first tick fires immediately, so a fresh login is visible to other
/// peers without waiting a full interval.
pub async fn pulse_loop(
    directory: Arc<DirectoryClient>,
    store: LocalStore,
    user_id: String,
    transport_address: String,
    interval: Duration,
) {
    let mut ticker = time::interval(interval);

    tracing::info!(
        user = %user_id,
        interval_secs = interval.as_secs(),
        "presence pulse starting"
    );

    loop {
        ticker.tick().await;

        // re-read every tick so profile edits reach the registry on the
        // next heartbeat
        let Some(profile) = store.get_user_by_id(&user_id) else {
            tracing::warn!(user = %user_id, "profile missing from store, skipping pulse");
            continue;
        };

        let identity = PeerIdentity {
            id: user_id.clone(),
            profile,
            last_seen: now_ms(),
            transport_address: transport_address.clone(),
        };

        match directory.publish_profile(identity).await {
            Ok(()) => tracing::trace!(user = %user_id, "pulse published"),
            Err(e) => tracing::warn!(user = %user_id, error = %e, "pulse publish failed"),
        }
    }
}
