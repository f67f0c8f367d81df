use std::sync::Arc;

use log::{debug, error, info};

use crate::controller::{membership, Shared};
use crate::error::LoadError;
use crate::models::identity::Actor;

/// Starts the loader if the current loading activation has not run it yet.
pub(crate) fn trigger(shared: &Arc<Shared>, actor: &Actor) {
    let claimed = shared
        .update(|state| state.take_loader_slot())
        .unwrap_or(false);
    if !claimed {
        return;
    }

    let shared = Arc::clone(shared);
    let actor = actor.clone();
    tokio::spawn(async move {
        run(&shared, &actor).await;
    });
}

pub(crate) async fn run(shared: &Shared, actor: &Actor) {
    match load(shared, actor).await {
        Ok(true) => debug!("Loaded match {}", shared.match_id),
        Ok(false) => debug!(
            "Loaded match {} but the stream already had newer data",
            shared.match_id
        ),
        Err(e) => {
            if e.is_transport() {
                error!("[{}] loading match {} failed: {}", e.code(), shared.match_id, e);
            } else {
                info!("[{}] {}", e.code(), e);
            }
            if shared.is_live() {
                shared.deps.navigator.go_home();
                shared.deps.notifier.show(e.notification());
            }
        }
    }

    shared.update(|state| state.is_loading = false);
}

/// Returns whether the fetched match was published.
async fn load(shared: &Shared, actor: &Actor) -> Result<bool, LoadError> {
    let match_id = shared.match_id.as_str();
    let raw = shared
        .deps
        .store
        .fetch_once(match_id)
        .await
        .map_err(LoadError::Transport)?
        .ok_or_else(|| LoadError::NotFound(match_id.to_owned()))?;
    if raw.is_empty() {
        return Err(LoadError::Empty(match_id.to_owned()));
    }

    let game = shared.deps.normalizer.convert(match_id, raw)?;
    if game.is_terminal_invalid() {
        return Err(LoadError::TerminalInvalid(match_id.to_owned()));
    }

    if !game.has_participant(&actor.id) {
        membership::join(shared, &actor.id)
            .await
            .map_err(LoadError::Join)?;
        shared.update(|state| state.is_first_time = true);
    }

    Ok(shared
        .update(|state| state.publish_loaded(game))
        .unwrap_or(false))
}
