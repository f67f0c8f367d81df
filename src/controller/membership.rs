use log::info;

use crate::controller::Shared;
use crate::error::StoreError;

/// Adds the actor to the match. Duplicates are the store's problem; the
/// result only shows up in the next delivery or load.
pub(crate) async fn join(shared: &Shared, actor_id: &str) -> Result<(), StoreError> {
    info!("Joining {} to match {}", actor_id, shared.match_id);
    shared
        .deps
        .store
        .add_participant(&shared.match_id, actor_id)
        .await
}
