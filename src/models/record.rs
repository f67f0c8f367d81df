use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::match_state::{Answer, ChatMessage, MatchStatus};

/// Match record exactly as the session store hands it out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct RawMatch(pub Map<String, Value>);

impl RawMatch {
    /// Builds a record from a JSON value; anything but an object yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// One push from the session stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// The record does not exist (deleted or never created).
    Missing,
    Record { id: String, data: RawMatch },
}

#[derive(Deserialize, Debug)]
pub struct ParticipantRecord {
    #[serde(alias = "uid")]
    pub id: String,
    #[serde(default, alias = "displayName")]
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct DeckRecord {
    pub user: ParticipantRecord,
    #[serde(default)]
    pub cards: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct ActiveRoundRecord {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub decks: Vec<DeckRecord>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

#[derive(Deserialize, Debug)]
pub struct MatchRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub status: MatchStatus,
    #[serde(default)]
    pub users: Vec<ParticipantRecord>,
    #[serde(default)]
    pub winner: Option<ParticipantRecord>,
    #[serde(rename = "actualRound", default)]
    pub actual_round: Option<ActiveRoundRecord>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub revision: u64,
}
