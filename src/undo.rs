use crate::action::{Event, MoveRecord};
use crate::board::{PileId, RUN_LENGTH};
use crate::card::CardId;
use crate::error::{GameError, GameResult};
use crate::game::GameEngine;
use crate::score::{MOVE_COST, RUN_UNDO_PENALTY};

impl GameEngine {
    /// Takes back the last player action.
    ///
    /// Run removals are never undone on their own: every removal record
    /// popped is reversed and then the transfer or deal that triggered it is
    /// popped and reversed in the same call.
    ///
    /// A failed undo leaves the game exactly as it was.
    pub fn undo(&mut self) -> GameResult<Vec<Event>> {
        self.ensure_not_won()?;
        if self.moves.is_empty() {
            return Err(GameError::NoMoreMoves);
        }
        let (board, moves, score) = (self.board.clone(), self.moves.clone(), self.score);
        let result = self.undo_last();
        if result.is_err() {
            self.board = board;
            self.moves = moves;
            self.score = score;
        }
        result
    }

    /// Pops and reverses one player action. Used by [`GameEngine::undo`] and
    /// to check a saved move log against its piles.
    pub(crate) fn undo_last(&mut self) -> GameResult<Vec<Event>> {
        let mut record = self.moves.pop().ok_or(GameError::NoMoreMoves)?;
        let mut events = Vec::new();
        while let MoveRecord::RunRemoval {
            source_column,
            foundation_pile,
            turned_card_beneath,
        } = record
        {
            self.undo_run_removal(source_column, foundation_pile, turned_card_beneath, &mut events)?;
            record = self.moves.pop().ok_or_else(|| {
                GameError::InvariantViolation(format!(
                    "run removal from {source_column} has no triggering move"
                ))
            })?;
        }
        match record {
            MoveRecord::Transfer {
                card_id,
                source_column,
                target_pile,
                turned_card_beneath,
            } => self.undo_transfer(
                card_id,
                source_column,
                target_pile,
                turned_card_beneath,
                &mut events,
            )?,
            MoveRecord::Deal { reserve_pile_index } => {
                self.undo_deal(reserve_pile_index, &mut events)?
            }
            MoveRecord::RunRemoval { .. } => unreachable!("run removals are drained above"),
        }
        Ok(events)
    }

    fn hide_top_card(&mut self, pile: PileId, events: &mut Vec<Event>) -> GameResult<()> {
        let card_id = self.board.pile(pile).peek_top().ok_or_else(|| {
            GameError::InvariantViolation(format!("no turned card left on {pile}"))
        })?;
        self.board.set_face_up(card_id, false);
        events.push(Event::CardFlipped {
            card_id,
            face_up: false,
        });
        Ok(())
    }

    fn undo_transfer(
        &mut self,
        card_id: CardId,
        source: PileId,
        target: PileId,
        turned_card_beneath: bool,
        events: &mut Vec<Event>,
    ) -> GameResult<()> {
        let position = self.board.pile(target).position(card_id).ok_or_else(|| {
            GameError::InvariantViolation(format!("card {card_id} is no longer on {target}"))
        })?;
        if turned_card_beneath {
            self.hide_top_card(source, events)?;
        }
        let cards = self.board.move_cards(target, position, source);
        push_moves(cards, target, source, events);
        self.score -= MOVE_COST;
        Ok(())
    }

    fn undo_run_removal(
        &mut self,
        column: PileId,
        foundation: PileId,
        turned_card_beneath: bool,
        events: &mut Vec<Event>,
    ) -> GameResult<()> {
        if self.board.pile(foundation).len() != RUN_LENGTH {
            return Err(GameError::InvariantViolation(format!(
                "{foundation} does not hold a complete run"
            )));
        }
        if turned_card_beneath {
            self.hide_top_card(column, events)?;
        }
        let cards = self.board.move_cards(foundation, 0, column);
        push_moves(cards, foundation, column, events);
        self.score -= RUN_UNDO_PENALTY;
        Ok(())
    }

    fn undo_deal(&mut self, reserve: PileId, events: &mut Vec<Event>) -> GameResult<()> {
        if !self.board.pile(reserve).is_empty() {
            return Err(GameError::InvariantViolation(format!(
                "{reserve} still holds cards that were dealt"
            )));
        }
        if self.board.has_empty_column() {
            return Err(GameError::InvariantViolation(
                "a column is empty while undoing a deal".to_string(),
            ));
        }
        let was_disabled = !self.can_deal();
        for column in PileId::columns().rev() {
            let card_id = self.board.move_top(column, reserve).ok_or_else(|| {
                GameError::InvariantViolation(format!("{column} is empty while undoing a deal"))
            })?;
            self.board.set_face_up(card_id, false);
            events.push(Event::CardFlipped {
                card_id,
                face_up: false,
            });
            events.push(Event::CardMoved {
                card_id,
                from_pile: column,
                to_pile: reserve,
            });
        }
        if was_disabled {
            events.push(Event::DealEnabled);
        }
        Ok(())
    }
}

fn push_moves(cards: Vec<CardId>, from: PileId, to: PileId, events: &mut Vec<Event>) {
    events.extend(cards.into_iter().map(|card_id| Event::CardMoved {
        card_id,
        from_pile: from,
        to_pile: to,
    }));
}

#[cfg(test)]
mod tests {
    use crate::action::{Event, MoveRecord};
    use crate::board::{Board, PileId};
    use crate::config::GameOptions;
    use crate::error::GameError;
    use crate::game::GameEngine;
    use crate::score::START_SCORE;

    fn engine(content: &str) -> GameEngine {
        GameEngine::from_board(GameOptions::default().with_seed(4), Board::parse(content).unwrap())
    }

    #[test]
    fn test_undo_empty_log() {
        let mut engine = GameEngine::new(GameOptions::default().with_seed(8));
        let before = engine.board().clone();
        assert_eq!(engine.undo(), Err(GameError::NoMoreMoves));
        assert_eq!(engine.board(), &before);
        assert_eq!(engine.score(), START_SCORE);
    }

    #[test]
    fn test_undo_transfer_restores_board() {
        let mut engine = engine("Column1: |9♠\nColumn2: 4♥Q♦|8♥7♥\nColumn3: |2♣");
        let before = engine.board().clone();
        let eight = engine.board().pile(PileId::Column(1)).cards[2];
        engine.attempt_move(eight, PileId::Column(0)).unwrap();
        assert!(engine.board().card(engine.board().pile(PileId::Column(1)).cards[1]).face_up);

        let events = engine.undo().unwrap();
        assert_eq!(engine.board(), &before);
        assert!(engine.moves().is_empty());
        assert_eq!(engine.score(), START_SCORE - 2);
        assert!(matches!(
            events[0],
            Event::CardFlipped {
                face_up: false,
                ..
            }
        ));
        assert_eq!(events.len(), 3);
        assert_eq!(engine.undo(), Err(GameError::NoMoreMoves));
    }

    #[test]
    fn test_undo_pairs_run_removal_with_its_move() {
        let mut engine = engine(
            "Column1: 3♦|K♠Q♠J♠T♠9♠8♠7♠6♠5♠4♠3♠2♠\nColumn2: 9♣|A♠\nColumn3: |5♥",
        );
        let before = engine.board().clone();
        let ace = engine.board().pile(PileId::Column(1)).peek_top().unwrap();
        engine.attempt_move(ace, PileId::Column(0)).unwrap();
        assert_eq!(engine.moves().len(), 2);

        engine.undo().unwrap();
        assert_eq!(engine.board(), &before);
        assert!(engine.moves().is_empty());
        assert_eq!(engine.score(), START_SCORE - 1 + 100 - 99 - 1);
        assert!(engine.board().pile(PileId::Foundation(0)).is_empty());
    }

    #[test]
    fn test_undo_deal_returns_cards_face_down() {
        let mut engine = GameEngine::new(GameOptions::default().with_seed(21));
        let before = engine.board().clone();
        engine.deal().unwrap();
        let events = engine.undo().unwrap();
        assert_eq!(engine.board(), &before);
        assert_eq!(engine.score(), START_SCORE);
        assert_eq!(events.len(), 20);
        assert!(!events.contains(&Event::DealEnabled));
    }

    #[test]
    fn test_undo_last_deal_enables_dealing() {
        let mut engine = GameEngine::new(GameOptions::default().with_seed(22));
        for _ in 0..5 {
            engine.deal().unwrap();
        }
        assert!(!engine.can_deal());
        // a deal may complete a run; undo takes that back too
        let events = engine.undo().unwrap();
        assert!(events.contains(&Event::DealEnabled));
        assert!(engine.can_deal());
        assert_eq!(engine.board().next_reserve(), Some(PileId::Reserve(0)));
        assert!(
            engine
                .board()
                .pile(PileId::Reserve(0))
                .iter()
                .all(|id| !engine.board().card(id).face_up)
        );
        assert!(engine.board().is_valid());
        assert!(matches!(
            engine.moves().last(),
            Some(MoveRecord::Deal {
                reserve_pile_index: PileId::Reserve(1)
            }) | Some(MoveRecord::RunRemoval { .. })
        ));
    }

    #[test]
    fn test_undo_deal_that_completed_runs() {
        let mut engine = engine(
            "Reserve1: 5♣5♣5♣5♣5♣5♣5♣5♣A♥A♠
Column1: 3♦|K♠Q♠J♠T♠9♠8♠7♠6♠5♠4♠3♠2♠
Column2: |K♥Q♥J♥T♥9♥8♥7♥6♥5♥4♥3♥2♥
Column3: |9♣
Column4: |9♣
Column5: |9♣
Column6: |9♣
Column7: |9♣
Column8: |9♣
Column9: |9♣
Column10: |9♣",
        );
        let before = engine.board().clone();

        let events = engine.deal().unwrap();
        assert!(events.contains(&Event::DealDisabled));
        assert_eq!(
            engine.moves(),
            &[
                MoveRecord::Deal {
                    reserve_pile_index: PileId::Reserve(0)
                },
                MoveRecord::RunRemoval {
                    source_column: PileId::Column(0),
                    foundation_pile: PileId::Foundation(0),
                    turned_card_beneath: true,
                },
                MoveRecord::RunRemoval {
                    source_column: PileId::Column(1),
                    foundation_pile: PileId::Foundation(1),
                    turned_card_beneath: false,
                },
            ]
        );
        assert_eq!(engine.score(), 700);
        assert!(engine.board().pile(PileId::Column(1)).is_empty());

        let events = engine.undo().unwrap();
        assert_eq!(engine.board(), &before);
        assert!(engine.moves().is_empty());
        assert_eq!(engine.score(), 502);
        assert!(events.contains(&Event::DealEnabled));
    }

    #[test]
    fn test_failed_undo_changes_nothing() {
        let mut engine = engine("Column1: |9♠\nColumn2: 4♥|8♥\nColumn3: |2♣");
        let eight = engine.board().pile(PileId::Column(1)).cards[1];
        engine.attempt_move(eight, PileId::Column(0)).unwrap();
        let stray = engine.board().pile(PileId::Column(2)).cards[0];
        engine.moves.push(MoveRecord::Transfer {
            card_id: stray,
            source_column: PileId::Column(1),
            target_pile: PileId::Column(0),
            turned_card_beneath: true,
        });
        let board = engine.board().clone();
        let moves = engine.moves().to_vec();
        let score = engine.score();

        assert!(matches!(engine.undo(), Err(GameError::InvariantViolation(_))));
        assert_eq!(engine.board(), &board);
        assert!(engine.board().top_card(PileId::Column(1)).unwrap().face_up);
        assert_eq!(engine.moves(), moves.as_slice());
        assert_eq!(engine.score(), score);
    }

    #[test]
    fn test_orphan_run_removal_is_fatal() {
        let mut engine = engine("Foundation1: K♠Q♠J♠T♠9♠8♠7♠6♠5♠4♠3♠2♠A♠\nColumn1: |5♥");
        engine.moves.push(MoveRecord::RunRemoval {
            source_column: PileId::Column(1),
            foundation_pile: PileId::Foundation(0),
            turned_card_beneath: false,
        });
        let result = engine.undo();
        assert!(matches!(result, Err(GameError::InvariantViolation(_))));
        assert!(result.unwrap_err().is_fatal());
        assert_eq!(engine.moves().len(), 1);
        assert!(engine.board().pile(PileId::Column(1)).is_empty());
    }
}
