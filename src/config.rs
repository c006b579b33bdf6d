use crate::card::SuitCount;
use crate::score::DEFAULT_MAX_HIGH_SCORES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOptions {
    /// Difficulty of the games dealt by [`crate::GameEngine::new`].
    pub suit_count: SuitCount,
    /// Fixes the shuffle so a session's deals can be replayed.
    pub seed: Option<u64>,
    pub max_high_scores: usize,
}

impl GameOptions {
    pub fn with_suit_count(mut self, suit_count: SuitCount) -> Self {
        self.suit_count = suit_count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            suit_count: SuitCount::Four,
            seed: None,
            max_high_scores: DEFAULT_MAX_HIGH_SCORES,
        }
    }
}
