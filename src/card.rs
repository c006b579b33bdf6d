use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

pub type CardId = u8;

pub const MAX_RANK: u8 = 13;
pub const ACE: u8 = 0;
pub const KING: u8 = MAX_RANK - 1;
pub const PACKS: usize = 2;
pub const DECK_SIZE: usize = PACKS * 4 * MAX_RANK as usize;

const SUITS: [char; 4] = ['♣', '♦', '♥', '♠'];
const RANKS: [char; 13] = [
    'A', '2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "c")]
    Clubs,
    #[serde(rename = "d")]
    Diamonds,
    #[serde(rename = "h")]
    Hearts,
    #[serde(rename = "s")]
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    pub fn is_red(self) -> bool {
        matches!(self, Suit::Diamonds | Suit::Hearts)
    }

    pub fn symbol(self) -> char {
        SUITS[self as usize]
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        SUITS
            .iter()
            .position(|&s| s == symbol)
            .map(|idx| Suit::ALL[idx])
    }
}

/// How many distinct suits the two packs are mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SuitCount {
    One,
    Two,
    #[default]
    Four,
}

impl SuitCount {
    pub fn count(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    pub fn from_count(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    /// Difficulty of a deck holding `distinct` different suits.
    pub fn from_distinct(distinct: usize) -> Self {
        match distinct {
            0 | 1 => Self::One,
            2 => Self::Two,
            _ => Self::Four,
        }
    }
}

impl TryFrom<u8> for SuitCount {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        SuitCount::from_count(value).ok_or_else(|| format!("invalid suit count {value}"))
    }
}

impl From<SuitCount> for u8 {
    fn from(value: SuitCount) -> Self {
        value.count()
    }
}

/// A card as stored in the canonical deck. The card's id is its index in
/// the deck, so it is not stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    #[serde(with = "rank_label", alias = "value")]
    pub rank: u8,
    #[serde(rename = "facingUp", default)]
    pub face_up: bool,
}

impl Card {
    pub fn new(rank: u8, suit: Suit) -> Self {
        Self {
            suit,
            rank,
            face_up: false,
        }
    }

    pub fn parse(rank: char, suit: char) -> Result<Self> {
        let order = RANKS
            .iter()
            .position(|&r| r == rank)
            .with_context(|| format!("Invalid rank at card {rank}{suit}"))?;
        let suit = Suit::from_symbol(suit)
            .with_context(|| format!("Invalid suit at card {rank}{suit}"))?;
        Ok(Card::new(order as u8, suit))
    }

    pub fn is_ace(&self) -> bool {
        self.rank == ACE
    }

    pub fn is_king(&self) -> bool {
        self.rank == KING
    }

    /// Whether `self` continues a run sitting on top of `below`.
    pub fn extends_run(&self, below: &Card) -> bool {
        self.face_up && below.face_up && self.suit == below.suit && below.rank == self.rank + 1
    }

    pub fn pretty_print(&self) -> String {
        format!("{}{}", RANKS[self.rank as usize], self.suit.symbol())
    }
}

/// Builds the 104 cards for a game and shuffles them. Every card starts
/// face down; ids are the final positions.
pub fn build_deck<R: Rng>(suit_count: SuitCount, rng: &mut R) -> Vec<Card> {
    let slots = suit_slots(suit_count, rng);
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for _ in 0..PACKS {
        for suit in slots {
            for rank in 0..MAX_RANK {
                deck.push(Card::new(rank, suit));
            }
        }
    }
    deck.shuffle(rng);
    deck
}

fn suit_slots<R: Rng>(suit_count: SuitCount, rng: &mut R) -> [Suit; 4] {
    match suit_count {
        SuitCount::One => {
            let suit = Suit::ALL[rng.random_range(0..Suit::ALL.len())];
            [suit; 4]
        }
        SuitCount::Two => {
            let red = if rng.random_bool(0.5) {
                Suit::Diamonds
            } else {
                Suit::Hearts
            };
            let black = if rng.random_bool(0.5) {
                Suit::Clubs
            } else {
                Suit::Spades
            };
            [black, red, red, black]
        }
        SuitCount::Four => Suit::ALL,
    }
}

pub fn count_suits(deck: &[Card]) -> usize {
    let mut seen = [false; 4];
    for card in deck {
        seen[card.suit as usize] = true;
    }
    seen.iter().filter(|&&s| s).count()
}

mod rank_label {
    use serde::{Deserialize, Deserializer, Serializer};

    const LABELS: [&str; 13] = [
        "A", "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K",
    ];

    pub fn serialize<S: Serializer>(rank: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        let label = LABELS
            .get(*rank as usize)
            .ok_or_else(|| <S::Error as serde::ser::Error>::custom(format!("invalid rank {rank}")))?;
        serializer.serialize_str(label)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let label = String::deserialize(deserializer)?;
        let label = if label == "T" { "10" } else { label.as_str() };
        LABELS
            .iter()
            .position(|&l| l == label)
            .map(|idx| idx as u8)
            .ok_or_else(|| <D::Error as serde::de::Error>::custom(format!("invalid rank '{label}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rank_counts(deck: &[Card]) -> [usize; 13] {
        let mut counts = [0; 13];
        for card in deck {
            counts[card.rank as usize] += 1;
        }
        counts
    }

    #[test]
    fn test_build_deck_four_suits() {
        let mut rng = StdRng::seed_from_u64(7);
        let deck = build_deck(SuitCount::Four, &mut rng);
        assert_eq!(deck.len(), DECK_SIZE);
        assert_eq!(count_suits(&deck), 4);
        assert_eq!(rank_counts(&deck), [8; 13]);
        assert!(deck.iter().all(|card| !card.face_up));
        for suit in Suit::ALL {
            assert_eq!(deck.iter().filter(|c| c.suit == suit).count(), 26);
        }
    }

    #[test]
    fn test_build_deck_two_suits_is_red_and_black() {
        let mut rng = StdRng::seed_from_u64(11);
        let deck = build_deck(SuitCount::Two, &mut rng);
        assert_eq!(count_suits(&deck), 2);
        assert_eq!(deck.iter().filter(|c| c.suit.is_red()).count(), 52);
        assert_eq!(rank_counts(&deck), [8; 13]);
    }

    #[test]
    fn test_build_deck_one_suit() {
        let mut rng = StdRng::seed_from_u64(3);
        let deck = build_deck(SuitCount::One, &mut rng);
        assert_eq!(count_suits(&deck), 1);
        assert_eq!(rank_counts(&deck), [8; 13]);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let a = build_deck(SuitCount::Four, &mut StdRng::seed_from_u64(42));
        let b = build_deck(SuitCount::Four, &mut StdRng::seed_from_u64(42));
        let c = build_deck(SuitCount::Four, &mut StdRng::seed_from_u64(43));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_parse_and_print_card() {
        let card = Card::parse('T', '♥').unwrap();
        assert_eq!(card.rank, 9);
        assert_eq!(card.suit, Suit::Hearts);
        assert_eq!(card.pretty_print(), "T♥");
        assert!(Card::parse('X', '♥').is_err());
        assert!(Card::parse('5', 'x').is_err());
    }

    #[test]
    fn test_card_json_shape() {
        let mut card = Card::new(9, Suit::Spades);
        card.face_up = true;
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, r#"{"suit":"s","rank":"10","facingUp":true}"#);
        let back: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(back, card);

        let legacy: Card =
            serde_json::from_str(r#"{"suit":"h","value":"K","hierarchy":12,"facingUp":false,"canDrag":false}"#)
                .unwrap();
        assert!(legacy.is_king());
        assert_eq!(legacy.suit, Suit::Hearts);
    }

    #[test]
    fn test_extends_run() {
        let mut seven = Card::new(6, Suit::Spades);
        let mut six = Card::new(5, Suit::Spades);
        seven.face_up = true;
        six.face_up = true;
        assert!(six.extends_run(&seven));
        assert!(!seven.extends_run(&six));
        let mut red_six = Card::new(5, Suit::Hearts);
        red_six.face_up = true;
        assert!(!red_six.extends_run(&seven));
    }

    #[test]
    fn test_suit_count_conversions() {
        assert_eq!(SuitCount::try_from(2).unwrap(), SuitCount::Two);
        assert!(SuitCount::try_from(3).is_err());
        assert_eq!(SuitCount::from_distinct(1), SuitCount::One);
        assert_eq!(SuitCount::from_distinct(4), SuitCount::Four);
        assert_eq!(u8::from(SuitCount::Four), 4);
    }
}
