use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStatus {
    #[default]
    #[serde(rename = "WAITING")]
    Waiting,
    /// Set by the remote authority while it prepares the next round.
    #[serde(rename = "LOADING")]
    Loading,
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "FINISHED")]
    Finished,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    pub owner: Participant,
    pub cards: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub card: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveRound {
    pub number: u32,
    pub decks: Vec<Deck>,
    pub answers: Vec<Answer>,
}

impl ActiveRound {
    pub fn has_deck_for(&self, actor_id: &str) -> bool {
        self.decks.iter().any(|deck| deck.owner.id == actor_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(rename = "userName")]
    pub user_name: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// Normalized match as held in the controller's local snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: String,
    pub status: MatchStatus,
    pub users: Vec<Participant>,
    pub winner: Option<Participant>,
    #[serde(rename = "actualRound")]
    pub actual_round: Option<ActiveRound>,
    pub messages: Vec<ChatMessage>,
    /// Monotonic revision assigned by the remote authority, 0 when it
    /// does not track one.
    pub revision: u64,
}

impl Match {
    /// A finished match without a winner cannot be shown.
    pub fn is_terminal_invalid(&self) -> bool {
        self.status == MatchStatus::Finished && self.winner.is_none()
    }

    pub fn has_participant(&self, actor_id: &str) -> bool {
        self.users.iter().any(|user| user.id == actor_id)
    }

    pub fn has_deck_for(&self, actor_id: &str) -> bool {
        self.actual_round
            .as_ref()
            .is_some_and(|round| round.has_deck_for(actor_id))
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}
