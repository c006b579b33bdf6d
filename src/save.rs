use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::action::{Event, MoveRecord};
use crate::board::{Board, PileId};
use crate::card::{Card, CardId, DECK_SIZE, build_deck};
use crate::error::{GameError, GameResult};
use crate::game::GameEngine;
use crate::score::{HighScore, HighScores, START_SCORE, Stats};

/// Everything a storage collaborator needs to persist a session. Card ids
/// are positions in `deck`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveData {
    pub deck: Vec<Card>,
    pub piles: Vec<Vec<CardId>>,
    pub moves: Vec<MoveRecord>,
    pub score: i32,
    pub high_scores: Vec<HighScore>,
    pub player_name: String,
    pub stat_played: u32,
    pub stat_won: u32,
}

impl SaveData {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse save data")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize save data")
    }

    /// Reads a save file. A missing file is not an error.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content)
                .with_context(|| format!("Invalid save file '{}'", path.display()))
                .map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to read '{}'", path.display()))
            }
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write '{}'", path.display()))
    }

    fn validate_moves(&self) -> GameResult<()> {
        if let Some(MoveRecord::RunRemoval { .. }) = self.moves.first() {
            return Err(GameError::corrupt("move log starts with a run removal"));
        }
        for record in &self.moves {
            let valid = match *record {
                MoveRecord::Deal { reserve_pile_index } => {
                    matches!(reserve_pile_index, PileId::Reserve(_))
                }
                MoveRecord::RunRemoval {
                    source_column,
                    foundation_pile,
                    ..
                } => source_column.is_column() && matches!(foundation_pile, PileId::Foundation(_)),
                MoveRecord::Transfer {
                    card_id,
                    source_column,
                    target_pile,
                    ..
                } => {
                    (card_id as usize) < DECK_SIZE
                        && source_column.is_column()
                        && target_pile.is_column()
                }
            };
            if !valid {
                return Err(GameError::corrupt(format!("malformed move record {record:?}")));
            }
        }
        Ok(())
    }
}

impl GameEngine {
    /// Snapshot of the session in its persistence shape.
    pub fn save_data(&self) -> SaveData {
        SaveData {
            deck: self.board.deck().to_vec(),
            piles: self
                .board
                .piles()
                .iter()
                .map(|pile| pile.cards.to_vec())
                .collect(),
            moves: self.moves.clone(),
            score: self.score,
            high_scores: self.high_scores.entries().to_vec(),
            player_name: self.player_name.clone(),
            stat_played: self.stats.played,
            stat_won: self.stats.won,
        }
    }

    /// Deals a fresh game from a deck given in dealing order.
    pub fn restore(&mut self, deck: Vec<Card>) -> GameResult<Vec<Event>> {
        if deck.len() != DECK_SIZE {
            return Err(GameError::corrupt(format!(
                "expected {DECK_SIZE} cards, found {}",
                deck.len()
            )));
        }
        let board = Board::new_deal(deck);
        if !board.is_valid() {
            return Err(GameError::corrupt("deck is not two full packs"));
        }
        Ok(self.start(board))
    }

    /// Resumes a saved session. The player's records are kept even when the
    /// game itself is rejected; the difficulty always comes from the deck.
    pub fn load(&mut self, save: SaveData) -> GameResult<Vec<Event>> {
        self.high_scores =
            HighScores::from_entries(save.high_scores.clone(), self.options.max_high_scores);
        self.player_name = save.player_name.clone();
        self.stats = Stats {
            played: save.stat_played,
            won: save.stat_won,
        };

        if save.deck.is_empty() && save.piles.is_empty() {
            let deck = build_deck(self.options.suit_count, &mut self.rng);
            return Ok(self.start(Board::new_deal(deck)));
        }
        if save.deck.len() != DECK_SIZE {
            return Err(GameError::corrupt(format!(
                "expected {DECK_SIZE} cards, found {}",
                save.deck.len()
            )));
        }
        save.validate_moves()?;
        let board = Board::from_piles(save.deck, &save.piles)?;
        if !board.is_valid() {
            return Err(GameError::corrupt("deck is not two full packs"));
        }

        self.check_move_log(&board, &save.moves)?;

        let events = self.start(board);
        self.moves = save.moves;
        self.score = if self.moves.is_empty() && save.score == 0 {
            START_SCORE
        } else {
            save.score
        };
        self.playing = !self.moves.is_empty() && !self.is_won();
        Ok(events)
    }

    /// Undoes the whole log on a scratch copy of `board`. A log the piles
    /// could not have come from is corrupt save data.
    fn check_move_log(&self, board: &Board, moves: &[MoveRecord]) -> GameResult<()> {
        let mut scratch = self.clone();
        scratch.board = board.clone();
        scratch.moves = moves.to_vec();
        while !scratch.moves.is_empty() {
            scratch.undo_last().map_err(|err| {
                GameError::corrupt(format!("move log does not match the piles; {err}"))
            })?;
        }
        Ok(())
    }
}
