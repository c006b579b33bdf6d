use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::action::{Command, Event, MoveRecord};
use crate::board::{Board, PileId, RUN_LENGTH};
use crate::card::{CardId, SuitCount, build_deck};
use crate::config::GameOptions;
use crate::error::{GameError, GameResult};
use crate::score::{HighScore, HighScores, MOVE_COST, RUN_BONUS, START_SCORE, Stats};

/// A Spider Solitaire session: the game in progress plus the player's
/// high scores and statistics.
///
/// Every command runs to completion before returning and takes `&mut self`,
/// so commands can never interleave.
#[derive(Debug, Clone)]
pub struct GameEngine {
    pub(crate) options: GameOptions,
    pub(crate) rng: StdRng,
    pub(crate) board: Board,
    pub(crate) moves: Vec<MoveRecord>,
    pub(crate) score: i32,
    pub(crate) suit_count: SuitCount,
    pub(crate) playing: bool,
    pub(crate) high_scores: HighScores,
    pub(crate) stats: Stats,
    pub(crate) player_name: String,
}

impl GameEngine {
    /// Creates a session and deals its first game.
    pub fn new(options: GameOptions) -> Self {
        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let board = Board::new_deal(build_deck(options.suit_count, &mut rng));
        Self::with_board(options, rng, board)
    }

    /// Creates a session playing a prepared board, e.g. one read with
    /// [`Board::parse`].
    pub fn from_board(options: GameOptions, board: Board) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_board(options, rng, board)
    }

    fn with_board(options: GameOptions, rng: StdRng, board: Board) -> Self {
        Self {
            suit_count: board.suit_count(),
            high_scores: HighScores::new(options.max_high_scores),
            options,
            rng,
            board,
            moves: Vec::new(),
            score: START_SCORE,
            playing: false,
            stats: Stats::default(),
            player_name: String::new(),
        }
    }

    /// Restarts the shuffle sequence used for later games.
    pub fn reseed(&mut self, seed: u64) {
        self.options.seed = Some(seed);
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn suit_count(&self) -> SuitCount {
        self.suit_count
    }

    /// False before the first move of a game and after it has been won.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_won(&self) -> bool {
        self.board.foundations_full()
    }

    pub fn can_deal(&self) -> bool {
        self.board.next_reserve().is_some()
    }

    pub fn high_scores(&self) -> &HighScores {
        &self.high_scores
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn pile_of(&self, card_id: CardId) -> Option<PileId> {
        self.board.location(card_id)
    }

    pub fn is_draggable(&self, card_id: CardId) -> bool {
        self.board.is_draggable(card_id)
    }

    pub fn movable_cards(&self) -> Vec<CardId> {
        self.board.movable_cards()
    }

    /// Runs a collaborator command. Rejected moves come back as
    /// [`Event::InvalidMove`], an unusable save falls back to a fresh game
    /// with [`Event::SaveRejected`]; only engine defects are returned as
    /// errors.
    pub fn handle(&mut self, command: Command) -> GameResult<Vec<Event>> {
        let result = match command {
            Command::NewGame { suit_count } => Ok(self.new_game(suit_count)),
            Command::Deal => self.deal(),
            Command::AttemptMove {
                card_id,
                target_pile,
            } => self.attempt_move(card_id, target_pile),
            Command::Undo => self.undo(),
            Command::Restore { deck } => self.restore(deck),
            Command::Load { save } => self.load(*save),
        };
        match result {
            Ok(events) => Ok(events),
            Err(GameError::CorruptSaveData(reason)) => {
                let mut events = vec![Event::SaveRejected { reason }];
                let deck = build_deck(self.suit_count, &mut self.rng);
                events.extend(self.start(Board::new_deal(deck)));
                Ok(events)
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => Ok(vec![Event::InvalidMove {
                reason: err.to_string(),
            }]),
        }
    }

    /// Shuffles and deals a new game. Abandoning a game in progress counts
    /// it as played.
    pub fn new_game(&mut self, suit_count: SuitCount) -> Vec<Event> {
        let deck = build_deck(suit_count, &mut self.rng);
        self.new_game_from_board(Board::new_deal(deck))
    }

    pub fn new_game_from_board(&mut self, board: Board) -> Vec<Event> {
        if self.playing {
            self.stats.played += 1;
        }
        self.start(board)
    }

    pub(crate) fn start(&mut self, board: Board) -> Vec<Event> {
        self.suit_count = board.suit_count();
        self.board = board;
        self.moves.clear();
        self.score = START_SCORE;
        self.playing = false;
        let mut events = vec![Event::GameStarted {
            suit_count: self.suit_count,
        }];
        if !self.can_deal() {
            events.push(Event::DealDisabled);
        }
        events
    }

    pub fn set_player_name(&mut self, name: &str) {
        self.player_name = name.trim().to_string();
        self.high_scores.fill_player_name(&self.player_name);
    }

    /// Forgets the high scores and the played/won counters.
    pub fn reset_high_scores(&mut self) {
        self.high_scores.clear();
        self.stats = Stats::default();
    }

    pub(crate) fn ensure_not_won(&self) -> GameResult<()> {
        if self.is_won() {
            return Err(GameError::invalid_move("The game is over"));
        }
        Ok(())
    }

    /// Deals one card face up onto every column from the highest reserve
    /// that still holds a row.
    pub fn deal(&mut self) -> GameResult<Vec<Event>> {
        self.ensure_not_won()?;
        if self.board.has_empty_column() {
            return Err(GameError::invalid_move(
                "You cannot deal when there are empty spaces",
            ));
        }
        let Some(reserve) = self.board.next_reserve() else {
            return Err(GameError::invalid_move("No cards left to deal"));
        };

        let mut events = Vec::new();
        for column in PileId::columns() {
            let card_id = self.board.move_top(reserve, column).ok_or_else(|| {
                GameError::InvariantViolation(format!("{reserve} ran out while dealing"))
            })?;
            self.board.set_face_up(card_id, true);
            events.push(Event::CardMoved {
                card_id,
                from_pile: reserve,
                to_pile: column,
            });
            events.push(Event::CardFlipped {
                card_id,
                face_up: true,
            });
        }
        self.record(MoveRecord::Deal {
            reserve_pile_index: reserve,
        });
        if !self.can_deal() {
            events.push(Event::DealDisabled);
        }
        self.remove_completed_runs(&mut events)?;
        Ok(events)
    }

    /// Checks whether `card_id` and the cards above it may be dropped on
    /// `target`. Returns the source pile and the card's position in it.
    pub fn check_move(&self, card_id: CardId, target: PileId) -> GameResult<(PileId, usize)> {
        let card = self
            .board
            .get_card(card_id)
            .ok_or_else(|| GameError::invalid_move(format!("Unknown card {card_id}")))?;
        if !target.is_column() {
            return Err(GameError::invalid_move(format!(
                "Cards cannot be dropped on {target}"
            )));
        }
        let source = self
            .board
            .location(card_id)
            .ok_or_else(|| GameError::InvariantViolation(format!("card {card_id} has no pile")))?;
        if !source.is_column() {
            return Err(GameError::invalid_move(format!(
                "{} is not in play",
                card.pretty_print()
            )));
        }
        if source == target {
            return Err(GameError::invalid_move(format!(
                "{} is already on {target}",
                card.pretty_print()
            )));
        }
        if !card.face_up {
            return Err(GameError::invalid_move("Face-down cards cannot be moved"));
        }
        if let Some(top) = self.board.top_card(target) {
            if top.rank != card.rank + 1 {
                return Err(GameError::invalid_move(format!(
                    "{} cannot go on {}",
                    card.pretty_print(),
                    top.pretty_print()
                )));
            }
        }
        let position = self.board.pile(source).position(card_id).ok_or_else(|| {
            GameError::InvariantViolation(format!("card {card_id} is not on {source}"))
        })?;
        Ok((source, position))
    }

    pub fn can_move(&self, card_id: CardId, target: PileId) -> bool {
        self.check_move(card_id, target).is_ok()
    }

    /// Moves a card and everything above it onto another column.
    pub fn attempt_move(&mut self, card_id: CardId, target: PileId) -> GameResult<Vec<Event>> {
        self.ensure_not_won()?;
        let (source, position) = self.check_move(card_id, target)?;

        let mut events: Vec<Event> = self
            .board
            .move_cards(source, position, target)
            .into_iter()
            .map(|card_id| Event::CardMoved {
                card_id,
                from_pile: source,
                to_pile: target,
            })
            .collect();
        let turned_card_beneath = self.flip_top_card(source, &mut events);
        self.score -= MOVE_COST;
        self.record(MoveRecord::Transfer {
            card_id,
            source_column: source,
            target_pile: target,
            turned_card_beneath,
        });
        self.remove_completed_runs(&mut events)?;
        Ok(events)
    }

    fn record(&mut self, record: MoveRecord) {
        self.playing = true;
        self.moves.push(record);
    }

    fn flip_top_card(&mut self, pile: PileId, events: &mut Vec<Event>) -> bool {
        match self.board.pile(pile).peek_top() {
            Some(card_id) if !self.board.card(card_id).face_up => {
                self.board.set_face_up(card_id, true);
                events.push(Event::CardFlipped {
                    card_id,
                    face_up: true,
                });
                true
            }
            _ => false,
        }
    }

    /// Moves every completed King-to-Ace run sitting on top of a column to
    /// the first free foundation, then checks for a win. Returns whether the
    /// game is still in progress.
    fn remove_completed_runs(&mut self, events: &mut Vec<Event>) -> GameResult<bool> {
        for column in PileId::columns() {
            if !self.board.has_complete_run(column) {
                continue;
            }
            let foundation = self.board.first_empty_foundation().ok_or_else(|| {
                GameError::InvariantViolation(format!(
                    "no free foundation for the run on {column}"
                ))
            })?;
            let start = self.board.pile(column).len() - RUN_LENGTH;
            let card_ids = self.board.move_cards(column, start, foundation);
            events.push(Event::RunRemoved {
                foundation_pile: foundation,
                card_ids,
            });
            self.score += RUN_BONUS;
            let turned_card_beneath = self.flip_top_card(column, events);
            self.record(MoveRecord::RunRemoval {
                source_column: column,
                foundation_pile: foundation,
                turned_card_beneath,
            });
        }

        if self.playing && self.board.foundations_full() {
            self.finish_won_game(events);
        }
        Ok(self.playing)
    }

    fn finish_won_game(&mut self, events: &mut Vec<Event>) {
        self.playing = false;
        self.stats.played += 1;
        self.stats.won += 1;
        let entry = HighScore::new(self.suit_count, self.score, &self.player_name);
        self.high_scores.insert(entry);
        events.push(Event::GameWon { score: self.score });
    }
}
