use tokio::time::Instant;

use crate::models::match_state::Match;

/// Optimistic round reset that has not been confirmed by the stream yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRoundReset {
    pub token: u64,
    pub since: Instant,
}

/// Everything the controller knows about its match.
///
/// Only ever touched through [`super::Shared::update`], which holds the
/// lock for the whole read-modify-publish step.
#[derive(Debug)]
pub struct ControllerState {
    /// Cleared on teardown; late results must not write after that.
    pub live: bool,
    pub snapshot: Option<Match>,
    pub is_loading: bool,
    /// The loader may run once per loading activation.
    pub loader_armed: bool,
    pub is_first_time: bool,
    pub has_new_messages: bool,
    pub rounds_in_flight: u32,
    /// A stream delivery has been published at least once.
    pub streamed: bool,
    pub pending_round_reset: Option<PendingRoundReset>,
    next_pending_token: u64,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            live: true,
            snapshot: None,
            is_loading: true,
            loader_armed: true,
            is_first_time: false,
            has_new_messages: false,
            rounds_in_flight: 0,
            streamed: false,
            pending_round_reset: None,
            next_pending_token: 0,
        }
    }
}

impl ControllerState {
    /// Claims the loader for the current loading activation.
    pub fn take_loader_slot(&mut self) -> bool {
        if self.is_loading && self.loader_armed {
            self.loader_armed = false;
            true
        } else {
            false
        }
    }

    pub fn arm_loader(&mut self) {
        self.is_loading = true;
        self.loader_armed = true;
    }

    /// Publishes a fetched match unless the stream already delivered one at
    /// least as recent. Returns whether the snapshot was replaced.
    pub fn publish_loaded(&mut self, game: Match) -> bool {
        let stale = self.streamed
            && self
                .snapshot
                .as_ref()
                .is_some_and(|current| game.revision <= current.revision);
        if stale {
            return false;
        }
        self.snapshot = Some(game);
        true
    }

    /// Empties the active round's answers ahead of the remote command and
    /// tags the snapshot as pending. `None` when there is no active round.
    pub fn reset_round_optimistically(&mut self, now: Instant) -> Option<u64> {
        let round = self.snapshot.as_mut()?.actual_round.as_mut()?;
        round.answers.clear();

        self.next_pending_token += 1;
        let token = self.next_pending_token;
        self.pending_round_reset = Some(PendingRoundReset { token, since: now });
        Some(token)
    }

    /// Drops the pending tag if it is still `token`. The emptied answers
    /// stay until the next delivery replaces the snapshot.
    pub fn abandon_round_reset(&mut self, token: u64) {
        if self.is_pending(token) {
            self.pending_round_reset = None;
        }
    }

    pub fn is_pending(&self, token: u64) -> bool {
        self.pending_round_reset
            .is_some_and(|pending| pending.token == token)
    }
}
