use serde::{Deserialize, Serialize};

use crate::board::{Board, PileId};
use crate::card::{Card, CardId, SuitCount};
use crate::save::SaveData;

/// One entry of the undo log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MoveRecord {
    Deal {
        reserve_pile_index: PileId,
    },
    RunRemoval {
        source_column: PileId,
        foundation_pile: PileId,
        turned_card_beneath: bool,
    },
    Transfer {
        card_id: CardId,
        source_column: PileId,
        target_pile: PileId,
        turned_card_beneath: bool,
    },
}

impl MoveRecord {
    pub fn is_run_removal(&self) -> bool {
        matches!(self, MoveRecord::RunRemoval { .. })
    }
}

/// Effects of a command, in the order they happened, for the render layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    GameStarted {
        suit_count: SuitCount,
    },
    CardMoved {
        card_id: CardId,
        from_pile: PileId,
        to_pile: PileId,
    },
    CardFlipped {
        card_id: CardId,
        face_up: bool,
    },
    RunRemoved {
        foundation_pile: PileId,
        card_ids: Vec<CardId>,
    },
    GameWon {
        score: i32,
    },
    DealDisabled,
    DealEnabled,
    InvalidMove {
        reason: String,
    },
    SaveRejected {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    NewGame { suit_count: SuitCount },
    Deal,
    AttemptMove { card_id: CardId, target_pile: PileId },
    Undo,
    Restore { deck: Vec<Card> },
    Load { save: Box<SaveData> },
}

/// Move history, one numbered line per undo step: the deal or transfer
/// first, then any run removals it set off. A deal is written as the
/// reserve it came from, e.g. `R5:C*`.
pub fn format_moves(moves: &[MoveRecord]) -> String {
    let mut turns: Vec<Vec<String>> = Vec::new();
    for record in moves {
        let step = match *record {
            MoveRecord::Deal { reserve_pile_index } => {
                format!("{}:C*", reserve_pile_index.short_name())
            }
            MoveRecord::RunRemoval {
                source_column,
                foundation_pile,
                ..
            } => format!(
                "{}:{}",
                source_column.short_name(),
                foundation_pile.short_name()
            ),
            MoveRecord::Transfer {
                source_column,
                target_pile,
                ..
            } => format!("{}:{}", source_column.short_name(), target_pile.short_name()),
        };
        match turns.last_mut() {
            Some(turn) if record.is_run_removal() => turn.push(step),
            _ => turns.push(vec![step]),
        }
    }
    turns
        .iter()
        .enumerate()
        .map(|(i, turn)| format!("{:>3}. {}\n", i + 1, turn.join(" ")))
        .collect()
}

pub fn describe_event(board: &Board, event: &Event) -> String {
    let format_card = |card_id: &CardId| -> String {
        board
            .get_card(*card_id)
            .map(|c| c.pretty_print())
            .unwrap_or_else(|| format!("#{card_id}"))
    };

    match event {
        Event::GameStarted { suit_count } => {
            let count = suit_count.count();
            let plural = if count == 1 { "" } else { "s" };
            format!("New game with {count} suit{plural}")
        }
        Event::CardMoved {
            card_id,
            from_pile,
            to_pile,
        } => format!("({from_pile}) {} -> ({to_pile})", format_card(card_id)),
        Event::CardFlipped { card_id, face_up } => {
            let side = if *face_up { "up" } else { "down" };
            format!("Turned {} face {side}", format_card(card_id))
        }
        Event::RunRemoved {
            foundation_pile,
            card_ids,
        } => {
            let cards = card_ids.iter().map(format_card).collect::<Vec<_>>().join("");
            format!("Completed run {cards} -> ({foundation_pile})")
        }
        Event::GameWon { score } => format!("Congratulations, you won with a score of {score}"),
        Event::DealDisabled => "No cards left to deal".to_string(),
        Event::DealEnabled => "Dealing is available again".to_string(),
        Event::InvalidMove { reason } => reason.clone(),
        Event::SaveRejected { reason } => format!("Saved game discarded; {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_moves() {
        let moves = [
            MoveRecord::Deal {
                reserve_pile_index: PileId::Reserve(4),
            },
            MoveRecord::Deal {
                reserve_pile_index: PileId::Reserve(3),
            },
            MoveRecord::Transfer {
                card_id: 7,
                source_column: PileId::Column(2),
                target_pile: PileId::Column(9),
                turned_card_beneath: true,
            },
            MoveRecord::RunRemoval {
                source_column: PileId::Column(9),
                foundation_pile: PileId::Foundation(0),
                turned_card_beneath: false,
            },
        ];
        assert_eq!(
            format_moves(&moves),
            "  1. R5:C*\n  2. R4:C*\n  3. C3:C10 C10:F1\n"
        );
        assert_eq!(format_moves(&[]), "");
    }

    #[test]
    fn test_move_record_json_shape() {
        let record = MoveRecord::Transfer {
            card_id: 42,
            source_column: PileId::Column(0),
            target_pile: PileId::Column(3),
            turned_card_beneath: true,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"transfer","cardId":42,"sourceColumn":13,"targetPile":16,"turnedCardBeneath":true}"#
        );
        assert_eq!(serde_json::from_str::<MoveRecord>(&json).unwrap(), record);

        let deal = MoveRecord::Deal {
            reserve_pile_index: PileId::Reserve(4),
        };
        assert_eq!(
            serde_json::to_string(&deal).unwrap(),
            r#"{"kind":"deal","reservePileIndex":4}"#
        );
    }

    #[test]
    fn test_event_and_command_json() {
        let event = Event::CardFlipped {
            card_id: 3,
            face_up: true,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"cardFlipped","cardId":3,"faceUp":true}"#
        );
        assert_eq!(
            serde_json::to_string(&Event::DealDisabled).unwrap(),
            r#"{"type":"dealDisabled"}"#
        );

        let command: Command =
            serde_json::from_str(r#"{"command":"attemptMove","cardId":12,"targetPile":20}"#)
                .unwrap();
        assert_eq!(
            command,
            Command::AttemptMove {
                card_id: 12,
                target_pile: PileId::Column(7),
            }
        );
        let command: Command = serde_json::from_str(r#"{"command":"newGame","suitCount":2}"#).unwrap();
        assert_eq!(
            command,
            Command::NewGame {
                suit_count: SuitCount::Two
            }
        );
    }
}
