use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::card::{Card, CardId, DECK_SIZE, MAX_RANK, SuitCount, count_suits};
use crate::error::{GameError, GameResult};

pub const TOTAL_RESERVES: usize = 5;
pub const TOTAL_FOUNDATIONS: usize = 8;
pub const TOTAL_COLUMNS: usize = 10;
pub const TOTAL_PILES: usize = TOTAL_RESERVES + TOTAL_FOUNDATIONS + TOTAL_COLUMNS;
pub const RESERVE_SIZE: usize = 10;
pub const RUN_LENGTH: usize = MAX_RANK as usize;

const FIRST_FOUNDATION: usize = TOTAL_RESERVES;
const FIRST_COLUMN: usize = TOTAL_RESERVES + TOTAL_FOUNDATIONS;
const DEALT_TO_RESERVES: usize = TOTAL_RESERVES * RESERVE_SIZE;
const FACE_UP_FROM: usize = DECK_SIZE - TOTAL_COLUMNS;
const PILE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum PileId {
    Reserve(usize),
    Foundation(usize),
    Column(usize),
}

impl PileId {
    pub fn index(self) -> usize {
        match self {
            PileId::Reserve(i) => i,
            PileId::Foundation(i) => FIRST_FOUNDATION + i,
            PileId::Column(i) => FIRST_COLUMN + i,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            i if i < FIRST_FOUNDATION => Some(PileId::Reserve(i)),
            i if i < FIRST_COLUMN => Some(PileId::Foundation(i - FIRST_FOUNDATION)),
            i if i < TOTAL_PILES => Some(PileId::Column(i - FIRST_COLUMN)),
            _ => None,
        }
    }

    pub fn is_column(self) -> bool {
        matches!(self, PileId::Column(_))
    }

    pub fn reserves() -> impl DoubleEndedIterator<Item = PileId> {
        (0..TOTAL_RESERVES).map(PileId::Reserve)
    }

    pub fn foundations() -> impl Iterator<Item = PileId> {
        (0..TOTAL_FOUNDATIONS).map(PileId::Foundation)
    }

    pub fn columns() -> impl DoubleEndedIterator<Item = PileId> {
        (0..TOTAL_COLUMNS).map(PileId::Column)
    }

    pub fn all() -> impl Iterator<Item = PileId> {
        (0..TOTAL_PILES).filter_map(PileId::from_index)
    }

    /// Short form used in move histories, e.g. `C3`.
    pub fn short_name(self) -> String {
        match self {
            PileId::Reserve(i) => format!("R{}", i + 1),
            PileId::Foundation(i) => format!("F{}", i + 1),
            PileId::Column(i) => format!("C{}", i + 1),
        }
    }

    /// Parses `C3`, `F1`, `R5` (1-based). A bare number is a column.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (kind, number) = match s.chars().next() {
            Some(c) if c.is_ascii_alphabetic() => (c.to_ascii_uppercase(), &s[1..]),
            _ => ('C', s),
        };
        let num = number
            .parse::<usize>()
            .with_context(|| format!("Invalid pile index: {number}"))?;
        let (pile, limit) = match kind {
            'R' => (PileId::Reserve(num.wrapping_sub(1)), TOTAL_RESERVES),
            'F' => (PileId::Foundation(num.wrapping_sub(1)), TOTAL_FOUNDATIONS),
            'C' | 'T' => (PileId::Column(num.wrapping_sub(1)), TOTAL_COLUMNS),
            _ => bail!("Invalid pile identifier: {}", s),
        };
        if num == 0 || num > limit {
            bail!("Pile index out of range: {}", s);
        }
        Ok(pile)
    }
}

impl fmt::Display for PileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PileId::Reserve(i) => write!(f, "Reserve{}", i + 1),
            PileId::Foundation(i) => write!(f, "Foundation{}", i + 1),
            PileId::Column(i) => write!(f, "Column{}", i + 1),
        }
    }
}

impl TryFrom<usize> for PileId {
    type Error = String;

    fn try_from(value: usize) -> std::result::Result<Self, Self::Error> {
        PileId::from_index(value).ok_or_else(|| format!("invalid pile index {value}"))
    }
}

impl From<PileId> for usize {
    fn from(value: PileId) -> Self {
        value.index()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pile {
    pub cards: SmallVec<[CardId; PILE_SIZE]>,
}

impl Pile {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn peek_top(&self) -> Option<CardId> {
        self.cards.last().copied()
    }

    pub fn position(&self, card_id: CardId) -> Option<usize> {
        self.cards.iter().position(|&id| id == card_id)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = CardId> + '_ {
        self.cards.iter().copied()
    }

    fn push(&mut self, card_id: CardId) {
        self.cards.push(card_id);
    }

    fn pop(&mut self) -> Option<CardId> {
        self.cards.pop()
    }

    fn drain_from(&mut self, pos: usize) -> Vec<CardId> {
        self.cards.drain(pos..).collect()
    }
}

/// The 23 piles together with the canonical deck they index into.
///
/// `deck[id]` is the single source of truth for a card's face and face-up
/// state; piles only hold ids. Every mutation goes through the methods below
/// so the card-to-pile index stays in step with the piles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    deck: Vec<Card>,
    piles: [Pile; TOTAL_PILES],
    location: Vec<PileId>,
}

impl Board {
    fn with_deck(deck: Vec<Card>) -> Self {
        Self {
            location: vec![PileId::Reserve(0); deck.len()],
            deck,
            piles: std::array::from_fn(|_| Pile::default()),
        }
    }

    /// Lays out a fresh game from a deck in dealing order: the first 50 cards
    /// fill the reserves, the rest go round-robin across the columns and only
    /// the final round lands face up.
    pub fn new_deal(deck: Vec<Card>) -> Self {
        let mut board = Self::with_deck(deck);
        let total = board.deck.len();
        for id in 0..total {
            let pile = if id < DEALT_TO_RESERVES {
                PileId::Reserve(id / RESERVE_SIZE)
            } else {
                PileId::Column((id - DEALT_TO_RESERVES) % TOTAL_COLUMNS)
            };
            board.deck[id].face_up = id >= FACE_UP_FROM;
            board.place(id as CardId, pile);
        }
        board
    }

    /// Rebuilds a board from saved pile contents. Every id of the deck must
    /// appear in exactly one pile.
    pub fn from_piles(deck: Vec<Card>, piles: &[Vec<CardId>]) -> GameResult<Self> {
        if piles.len() != TOTAL_PILES {
            return Err(GameError::corrupt(format!(
                "expected {TOTAL_PILES} piles, found {}",
                piles.len()
            )));
        }
        let mut board = Self::with_deck(deck);
        let mut seen = vec![false; board.deck.len()];
        for (index, ids) in piles.iter().enumerate() {
            let Some(pile) = PileId::from_index(index) else {
                continue;
            };
            for &id in ids {
                let Some(slot) = seen.get_mut(id as usize) else {
                    return Err(GameError::corrupt(format!("unknown card id {id} in {pile}")));
                };
                if *slot {
                    return Err(GameError::corrupt(format!("card id {id} appears twice")));
                }
                *slot = true;
                board.place(id, pile);
            }
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(GameError::corrupt(format!("card id {missing} is in no pile")));
        }
        Ok(board)
    }

    fn place(&mut self, card_id: CardId, pile: PileId) {
        self.piles[pile.index()].push(card_id);
        self.location[card_id as usize] = pile;
    }

    pub fn deck(&self) -> &[Card] {
        &self.deck
    }

    pub fn card(&self, card_id: CardId) -> &Card {
        &self.deck[card_id as usize]
    }

    pub fn get_card(&self, card_id: CardId) -> Option<&Card> {
        self.deck.get(card_id as usize)
    }

    pub fn pile(&self, pile: PileId) -> &Pile {
        &self.piles[pile.index()]
    }

    pub fn piles(&self) -> &[Pile; TOTAL_PILES] {
        &self.piles
    }

    pub fn location(&self, card_id: CardId) -> Option<PileId> {
        self.location.get(card_id as usize).copied()
    }

    pub fn top_card(&self, pile: PileId) -> Option<&Card> {
        self.pile(pile).peek_top().map(|id| self.card(id))
    }

    pub fn suit_count(&self) -> SuitCount {
        SuitCount::from_distinct(count_suits(&self.deck))
    }

    pub fn set_face_up(&mut self, card_id: CardId, face_up: bool) {
        self.deck[card_id as usize].face_up = face_up;
    }

    /// Moves the card at `pos` in `from` and everything above it onto `to`,
    /// keeping their order. Returns the moved ids bottom to top.
    pub fn move_cards(&mut self, from: PileId, pos: usize, to: PileId) -> Vec<CardId> {
        let cards = self.piles[from.index()].drain_from(pos);
        for &id in &cards {
            self.place(id, to);
        }
        cards
    }

    pub fn move_top(&mut self, from: PileId, to: PileId) -> Option<CardId> {
        let id = self.piles[from.index()].pop()?;
        self.place(id, to);
        Some(id)
    }

    pub fn has_empty_column(&self) -> bool {
        PileId::columns().any(|column| self.pile(column).is_empty())
    }

    /// The highest reserve still holding a full row of cards.
    pub fn next_reserve(&self) -> Option<PileId> {
        PileId::reserves()
            .rev()
            .find(|&reserve| self.pile(reserve).len() == RESERVE_SIZE)
    }

    pub fn first_empty_foundation(&self) -> Option<PileId> {
        PileId::foundations().find(|&foundation| self.pile(foundation).is_empty())
    }

    pub fn completed_runs(&self) -> usize {
        PileId::foundations()
            .filter(|&foundation| self.pile(foundation).len() >= RUN_LENGTH)
            .count()
    }

    pub fn foundations_full(&self) -> bool {
        self.completed_runs() == TOTAL_FOUNDATIONS
    }

    /// Whether the top 13 cards of `pile` are a face-up King-to-Ace run of
    /// one suit.
    pub fn has_complete_run(&self, pile: PileId) -> bool {
        let cards = &self.pile(pile).cards;
        if cards.len() < RUN_LENGTH {
            return false;
        }
        let top = self.card(cards[cards.len() - 1]);
        if !top.is_ace() || !top.face_up {
            return false;
        }
        cards[cards.len() - RUN_LENGTH..]
            .windows(2)
            .all(|pair| self.card(pair[1]).extends_run(self.card(pair[0])))
    }

    /// A column card can be picked up when it heads a same-suit run that
    /// reaches the top of its column.
    pub fn is_draggable(&self, card_id: CardId) -> bool {
        let Some(pile) = self.location(card_id).filter(|pile| pile.is_column()) else {
            return false;
        };
        let cards = &self.pile(pile).cards;
        let Some(pos) = self.pile(pile).position(card_id) else {
            return false;
        };
        self.card(card_id).face_up
            && cards[pos..]
                .windows(2)
                .all(|pair| self.card(pair[1]).extends_run(self.card(pair[0])))
    }

    pub fn movable_cards(&self) -> Vec<CardId> {
        let mut movable = Vec::new();
        for column in PileId::columns() {
            let pile = self.pile(column);
            let mut run = Vec::new();
            for (pos, &id) in pile.cards.iter().enumerate().rev() {
                let card = self.card(id);
                if !card.face_up {
                    break;
                }
                if pos + 1 < pile.len() && !self.card(pile.cards[pos + 1]).extends_run(card) {
                    break;
                }
                run.push(id);
            }
            movable.extend(run.into_iter().rev());
        }
        movable
    }

    /// A complete game: 104 distinct cards, each rank 8 times, and the
    /// card-to-pile index agreeing with the piles.
    pub fn is_valid(&self) -> bool {
        if self.deck.len() != DECK_SIZE {
            return false;
        }
        let mut ranks = [0; MAX_RANK as usize];
        for card in &self.deck {
            match ranks.get_mut(card.rank as usize) {
                Some(count) => *count += 1,
                None => return false,
            }
        }
        if ranks.iter().any(|&count| count != DECK_SIZE / MAX_RANK as usize) {
            return false;
        }

        let mut seen = [false; DECK_SIZE];
        for pile in PileId::all() {
            for id in self.pile(pile).iter() {
                let Some(slot) = seen.get_mut(id as usize) else {
                    return false;
                };
                if *slot || self.location(id) != Some(pile) {
                    return false;
                }
                *slot = true;
            }
        }
        seen.iter().all(|&s| s)
    }

    /// Parses the text form printed by [`Board::pretty_print`]. Ids are
    /// assigned pile by pile in pile order, bottom card first.
    pub fn parse(content: &str) -> Result<Self> {
        let mut layout: Vec<(PileId, Vec<Card>)> = Vec::new();

        for line in content
            .split('\n')
            .map(|v| v.trim())
            .filter(|l| !l.is_empty())
        {
            let line_context = || format!("Failed to parse at '{line}'");
            let (kind, rest) = if let Some(rest) = line.strip_prefix("Reserve") {
                ('R', rest)
            } else if let Some(rest) = line.strip_prefix("Foundation") {
                ('F', rest)
            } else if let Some(rest) = line.strip_prefix("Column") {
                ('C', rest)
            } else {
                continue;
            };
            let mut parts = rest.splitn(2, ':');
            let idx = parts.next().unwrap_or("").trim();
            let pile = PileId::parse(&format!("{kind}{idx}")).with_context(line_context)?;
            let cards_str = parts.next().unwrap_or("").trim();

            let cards = match pile {
                PileId::Reserve(_) => Self::parse_cards(cards_str).with_context(line_context)?,
                PileId::Foundation(_) => {
                    let mut cards = Self::parse_cards(cards_str).with_context(line_context)?;
                    for card in &mut cards {
                        card.face_up = true;
                    }
                    cards
                }
                PileId::Column(_) => {
                    let (before, after) = if let Some(split_idx) = cards_str.find('|') {
                        let (b, a) = cards_str.split_at(split_idx);
                        (b, &a[1..])
                    } else {
                        (cards_str, "")
                    };
                    let mut cards = Self::parse_cards(before.trim()).with_context(line_context)?;
                    let mut face_up_cards =
                        Self::parse_cards(after.trim()).with_context(line_context)?;
                    for card in &mut face_up_cards {
                        card.face_up = true;
                    }
                    cards.extend(face_up_cards);
                    cards
                }
            };
            if layout.iter().any(|(p, _)| *p == pile) {
                bail!("Pile {} is listed twice", pile);
            }
            layout.push((pile, cards));
        }

        layout.sort_by_key(|(pile, _)| pile.index());
        let deck: Vec<Card> = layout.iter().flat_map(|(_, cards)| cards.clone()).collect();
        if deck.len() > DECK_SIZE {
            bail!("Too many cards: {}", deck.len());
        }
        let mut board = Self::with_deck(deck);
        let mut next_id = 0;
        for (pile, cards) in &layout {
            for _ in cards {
                board.place(next_id, *pile);
                next_id += 1;
            }
        }
        Ok(board)
    }

    fn parse_cards(s: &str) -> Result<Vec<Card>> {
        let mut cards = Vec::new();
        let mut chars = s.chars().peekable();
        while let Some(&c1) = chars.peek() {
            if c1.is_whitespace() || c1 == '|' {
                chars.next();
                continue;
            }
            let rank = c1;
            chars.next();
            let suit = match chars.next() {
                Some(s) => s,
                None => bail!("Missing suit after '{}'", rank),
            };
            cards.push(Card::parse(rank, suit)?);
        }
        Ok(cards)
    }

    pub fn pretty_print(&self) -> String {
        let mut lines = Vec::new();
        for pile in PileId::all() {
            let cards = self.pile(pile);
            if cards.is_empty() {
                continue;
            }
            let mut line = format!("{pile}: ");
            let mut separated = !pile.is_column();
            for id in cards.iter() {
                let card = self.card(id);
                if !separated && card.face_up {
                    line.push('|');
                    separated = true;
                }
                line.push_str(&card.pretty_print());
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}
