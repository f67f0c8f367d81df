//! Flags derived from the controller state for whoever renders the match.

use crate::controller::state::ControllerState;
use crate::models::identity::Actor;
use crate::models::match_state::{Match, MatchStatus};

/// Read-only view handed to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchView {
    pub snapshot: Option<Match>,
    pub is_loading: bool,
    pub is_first_time: bool,
    pub loading_next: bool,
    pub has_new_messages: bool,
    /// The snapshot carries an optimistic round reset awaiting the stream.
    pub round_pending: bool,
}

/// True while a round command is in flight or the remote authority is
/// itself preparing the next round.
pub fn loading_next(rounds_in_flight: u32, snapshot: Option<&Match>) -> bool {
    rounds_in_flight > 0 || snapshot.is_some_and(|game| game.status == MatchStatus::Loading)
}

/// Whether `next` brings a message the actor has not written.
///
/// `previous` must be the snapshot in effect when `next` arrives.
pub fn has_unread(previous: Option<&Match>, next: &Match, actor: &Actor) -> bool {
    let before = previous.map_or(0, |game| game.messages.len());
    if next.messages.len() <= before {
        return false;
    }
    next.last_message()
        .is_some_and(|message| !actor.authored(&message.user_name))
}

pub(crate) fn view(state: &ControllerState) -> MatchView {
    MatchView {
        snapshot: state.snapshot.clone(),
        is_loading: state.is_loading,
        is_first_time: state.is_first_time,
        loading_next: loading_next(state.rounds_in_flight, state.snapshot.as_ref()),
        has_new_messages: state.has_new_messages,
        round_pending: state.pending_round_reset.is_some(),
    }
}
