use log::{debug, error, info};

use crate::controller::state::ControllerState;
use crate::controller::{signals, Shared};
use crate::models::events::Notification;
use crate::models::identity::Actor;
use crate::models::match_state::Match;
use crate::models::record::Delivery;

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Reconciled {
    pub new_messages: bool,
    pub first_time_cleared: bool,
    pub confirmed_round: bool,
}

/// Handles one stream delivery. Runs on the driver task only, so two
/// deliveries never interleave.
pub(crate) fn process(shared: &Shared, actor: &Actor, delivery: Delivery) {
    let (id, data) = match delivery {
        Delivery::Missing => {
            debug!("Match {} does not exist, ignoring delivery", shared.match_id);
            return;
        }
        Delivery::Record { id, data } => (id, data),
    };

    let game = match shared.deps.normalizer.convert(&id, data) {
        Ok(game) => game,
        Err(e) => {
            error!("Dropping malformed delivery for {}: {}", id, e);
            return;
        }
    };

    if game.is_terminal_invalid() {
        if shared.is_live() {
            info!("Match {} finished without a winner, leaving", id);
            shared.deps.navigator.go_home();
            shared.deps.notifier.show(Notification::match_finished());
        }
        return;
    }

    let Some(outcome) = shared.update(|state| reconcile(state, actor, game)) else {
        return;
    };
    if outcome.confirmed_round {
        debug!("Stream confirmed the round reset for {}", id);
    }
    if outcome.first_time_cleared {
        debug!("{} now has a deck in {}", actor.id, id);
    }
    if outcome.new_messages {
        debug!("New chat message in {}", id);
    }
}

/// Replaces the snapshot wholesale with `game`, deriving the flags from
/// the snapshot it replaces.
pub(crate) fn reconcile(state: &mut ControllerState, actor: &Actor, game: Match) -> Reconciled {
    let first_time_cleared = state.is_first_time && game.has_deck_for(&actor.id);
    if first_time_cleared {
        state.is_first_time = false;
    }

    let new_messages = signals::has_unread(state.snapshot.as_ref(), &game, actor);
    let confirmed_round = state.pending_round_reset.take().is_some();

    state.snapshot = Some(game);
    state.streamed = true;
    if new_messages {
        state.has_new_messages = true;
    }
    state.is_loading = false;

    Reconciled {
        new_messages,
        first_time_cleared,
        confirmed_round,
    }
}
