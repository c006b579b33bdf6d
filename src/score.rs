use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::card::SuitCount;

pub const START_SCORE: i32 = 500;
pub const MOVE_COST: i32 = 1;
pub const RUN_BONUS: i32 = 100;
/// Taken back when a run removal is undone; with the undo of the move that
/// triggered it the pair costs one point more than it earned.
pub const RUN_UNDO_PENALTY: i32 = 99;
pub const DEFAULT_MAX_HIGH_SCORES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScore {
    // entries from before difficulty levels existed were always 4 suits
    #[serde(default, alias = "level")]
    pub suit_count: SuitCount,
    pub score: i32,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub date: u64,
    #[serde(default, alias = "player")]
    pub player_name: String,
}

impl HighScore {
    pub fn new(suit_count: SuitCount, score: i32, player_name: &str) -> Self {
        Self {
            suit_count,
            score,
            date: now_secs(),
            player_name: player_name.to_string(),
        }
    }

    /// Harder games rank first, then higher scores.
    fn beats(&self, other: &HighScore) -> bool {
        let (mine, theirs) = (self.suit_count.count(), other.suit_count.count());
        theirs < mine || (theirs == mine && other.score < self.score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighScores {
    entries: Vec<HighScore>,
    limit: usize,
}

impl HighScores {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
        }
    }

    pub fn from_entries(mut entries: Vec<HighScore>, limit: usize) -> Self {
        entries.truncate(limit);
        Self { entries, limit }
    }

    pub fn entries(&self) -> &[HighScore] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts before the first entry the new one beats, so equal results
    /// keep their earlier entries ahead. Returns the position the entry took,
    /// or `None` when it did not make the table.
    pub fn insert(&mut self, entry: HighScore) -> Option<usize> {
        let position = match self.entries.iter().position(|e| entry.beats(e)) {
            Some(position) => position,
            None if self.entries.len() < self.limit => self.entries.len(),
            None => return None,
        };
        self.entries.insert(position, entry);
        self.entries.truncate(self.limit);
        (position < self.limit).then_some(position)
    }

    /// Gives unnamed entries the player's name.
    pub fn fill_player_name(&mut self, name: &str) {
        for entry in self.entries.iter_mut().filter(|e| e.player_name.is_empty()) {
            entry.player_name = name.to_string();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub played: u32,
    pub won: u32,
}

impl Stats {
    pub fn win_percentage(&self) -> f64 {
        if self.played == 0 {
            0.0
        } else {
            100.0 * self.won as f64 / self.played as f64
        }
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
