use crate::collaborators::Normalizer;
use crate::error::NormalizeError;
use crate::models::match_state::{ActiveRound, Deck, Match, Participant};
use crate::models::record::{MatchRecord, ParticipantRecord, RawMatch};

/// Converts the store's JSON records into [`Match`] values.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonNormalizer;

impl Normalizer for JsonNormalizer {
    fn convert(&self, match_id: &str, raw: RawMatch) -> Result<Match, NormalizeError> {
        let record: MatchRecord = serde_json::from_value(raw.into_value())?;

        Ok(Match {
            // The document id wins over whatever id the body carries.
            id: if match_id.is_empty() {
                record.id.unwrap_or_default()
            } else {
                match_id.to_owned()
            },
            status: record.status,
            users: record.users.into_iter().map(participant).collect(),
            winner: record.winner.map(participant),
            actual_round: record.actual_round.map(|round| ActiveRound {
                number: round.number,
                decks: round
                    .decks
                    .into_iter()
                    .map(|deck| Deck {
                        owner: participant(deck.user),
                        cards: deck.cards,
                    })
                    .collect(),
                answers: round.answers,
            }),
            messages: record.messages,
            revision: record.revision,
        })
    }
}

fn participant(record: ParticipantRecord) -> Participant {
    Participant {
        id: record.id,
        name: record.name,
    }
}
