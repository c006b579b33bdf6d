//! A Spider Solitaire game engine: dealing, move legality, automatic run
//! removal, undo, scoring and the saved-game format.

pub mod action;
pub mod board;
pub mod card;
pub mod config;
pub mod error;
pub mod game;
pub mod save;
pub mod score;
mod undo;

pub use crate::action::{Command, Event, MoveRecord};
pub use crate::board::{Board, PileId};
pub use crate::card::{Card, CardId, Suit, SuitCount};
pub use crate::config::GameOptions;
pub use crate::error::{GameError, GameResult};
pub use crate::game::GameEngine;
pub use crate::save::SaveData;
