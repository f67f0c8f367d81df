use std::sync::Arc;

use log::{error, info, warn};
use tokio::time::Instant;

use crate::controller::Shared;
use crate::models::events::Notification;

pub(crate) const ROUND_FALLBACK_MESSAGE: &str =
    "Could not load the round, reload the page.";

/// Keeps `loading_next` raised for as long as it lives.
struct RoundInFlight {
    shared: Arc<Shared>,
}

impl RoundInFlight {
    fn acquire(shared: &Arc<Shared>) -> Option<Self> {
        shared.update(|state| state.rounds_in_flight += 1)?;
        Some(Self {
            shared: Arc::clone(shared),
        })
    }
}

impl Drop for RoundInFlight {
    fn drop(&mut self) {
        self.shared.update(|state| {
            state.rounds_in_flight = state.rounds_in_flight.saturating_sub(1);
        });
    }
}

pub(crate) async fn advance(shared: &Arc<Shared>) {
    let Some(_in_flight) = RoundInFlight::acquire(shared) else {
        warn!("Ignoring next round for {}, controller stopped", shared.match_id);
        return;
    };

    let token = shared
        .update(|state| state.reset_round_optimistically(Instant::now()))
        .flatten();
    if let Some(token) = token {
        watch_confirmation(shared, token);
    }

    info!("Starting a new round in {}", shared.match_id);
    if let Err(e) = shared.deps.store.start_new_round(&shared.match_id).await {
        error!("Failed to start a new round in {}: {}", shared.match_id, e);
        if let Some(token) = token {
            // No delivery will confirm a round that was never started.
            shared.update(|state| state.abandon_round_reset(token));
        }
        if shared.is_live() {
            let description = e
                .user_message()
                .unwrap_or_else(|| ROUND_FALLBACK_MESSAGE.to_owned());
            shared.deps.notifier.show(Notification::round_failed(description));
        }
    }
}

/// Warns if the optimistic reset tagged `token` is still unconfirmed after
/// the configured timeout.
fn watch_confirmation(shared: &Arc<Shared>, token: u64) {
    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        tokio::time::sleep(shared.config.round_confirm_timeout).await;

        let stale_since = shared.read(|state| {
            if state.live && state.is_pending(token) {
                state.pending_round_reset.map(|pending| pending.since)
            } else {
                None
            }
        });
        if let Some(since) = stale_since {
            warn!(
                "Round reset in {} unconfirmed after {:?}",
                shared.match_id,
                since.elapsed()
            );
            shared.deps.notifier.show(Notification::round_still_syncing());
        }
    });
}
