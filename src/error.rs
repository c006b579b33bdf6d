use thiserror::Error;

pub type GameResult<T> = std::result::Result<T, GameError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// An illegal transfer or deal. Nothing was changed.
    #[error("{0}")]
    InvalidMove(String),
    #[error("No more moves to undo")]
    NoMoreMoves,
    #[error("Corrupt save data; {0}")]
    CorruptSaveData(String),
    /// The engine reached a state its own rules should never produce.
    #[error("Invariant violation; {0}")]
    InvariantViolation(String),
}

impl GameError {
    pub fn invalid_move(reason: impl Into<String>) -> Self {
        GameError::InvalidMove(reason.into())
    }

    pub fn corrupt(reason: impl Into<String>) -> Self {
        GameError::CorruptSaveData(reason.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, GameError::InvariantViolation(_))
    }
}
