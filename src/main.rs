use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use spider_solitaire::{
    Board, Card, Command, Event, GameEngine, GameOptions, PileId, SaveData, SuitCount,
    action::{describe_event, format_moves},
};

use std::{
    io::{IsTerminal, Read, stdin},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// File the session is kept in between commands
    #[arg(long, default_value = "spider-solitaire.json", value_name = "FILE")]
    save: PathBuf,
    /// Also report every card moved and turned
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shuffle and deal a new game
    New {
        /// Number of suits (1, 2 or 4)
        #[arg(short, long, default_value_t = 4, value_name = "NUM")]
        suits: u8,
        /// Seed for a reproducible shuffle
        #[arg(long, value_name = "SEED")]
        seed: Option<u64>,
        /// Play a board read from a file instead of a shuffled deck
        #[arg(short, long, value_name = "FILE")]
        board: Option<PathBuf>,
    },
    /// Print the current game
    Show,
    /// Deal a row of cards from the reserve
    Deal,
    /// Move the top cards of one column onto another (e.g. `move C3 C7 -n 2`)
    Move {
        from: String,
        to: String,
        /// Number of cards to move
        #[arg(short = 'n', long, default_value_t = 1, value_name = "NUM")]
        count: usize,
    },
    /// Take back the last move
    Undo,
    /// List the moves played so far
    History,
    /// List every legal move
    Hints,
    /// Show the high scores and statistics
    Scores,
    /// Set the name recorded with high scores
    Name { name: String },
    /// Forget the high scores and statistics
    ResetScores,
    /// Print the current deck in dealing order as JSON
    ExportDeck,
    /// Deal a deck exported with `export-deck`
    Restore {
        /// Path to the deck; read from stdin when omitted
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let Cli {
        save,
        verbose,
        command,
    } = Cli::parse();

    let mut engine = GameEngine::new(GameOptions::default());
    if let Some(data) = SaveData::read_from(&save)? {
        let events = engine.handle(Command::Load {
            save: Box::new(data),
        })?;
        report(&engine, &events, false);
    }

    let events = match command {
        Commands::New { suits, seed, board } => {
            let Some(suit_count) = SuitCount::from_count(suits) else {
                bail!("Suit count must be 1, 2 or 4.");
            };
            if let Some(seed) = seed {
                engine.reseed(seed);
            }
            match board {
                Some(file) => {
                    let content = std::fs::read_to_string(&file)
                        .with_context(|| format!("Failed to read '{}'", file.display()))?;
                    let board = Board::parse(&content).context("Failed to parse board")?;
                    if !board.is_valid() {
                        eprintln!("warning: the board does not hold two full packs");
                    }
                    engine.new_game_from_board(board)
                }
                None => engine.handle(Command::NewGame { suit_count })?,
            }
        }
        Commands::Show => vec![],
        Commands::Deal => engine.handle(Command::Deal)?,
        Commands::Move { from, to, count } => {
            let from = PileId::parse(&from)?;
            let to = PileId::parse(&to)?;
            let pile = engine.board().pile(from);
            if count == 0 || count > pile.len() {
                bail!("{from} holds {} cards", pile.len());
            }
            let card_id = pile.cards[pile.len() - count];
            engine.handle(Command::AttemptMove {
                card_id,
                target_pile: to,
            })?
        }
        Commands::Undo => engine.handle(Command::Undo)?,
        Commands::History => {
            print!("{}", format_moves(engine.moves()));
            return Ok(());
        }
        Commands::Hints => {
            print_hints(&engine);
            return Ok(());
        }
        Commands::Scores => {
            print_scores(&engine);
            return Ok(());
        }
        Commands::Name { name } => {
            engine.set_player_name(&name);
            vec![]
        }
        Commands::ResetScores => {
            engine.reset_high_scores();
            vec![]
        }
        Commands::ExportDeck => {
            let deck = serde_json::to_string(engine.board().deck())?;
            println!("{deck}");
            return Ok(());
        }
        Commands::Restore { file } => {
            let deck = read_deck(file.as_deref())?;
            engine.handle(Command::Restore { deck })?
        }
    };

    report(&engine, &events, verbose);
    println!("{}\n", engine.board().pretty_print());
    println!(
        "Score: {}, Suits: {}, Moves: {}",
        engine.score(),
        engine.suit_count().count(),
        engine.moves().len()
    );
    engine.save_data().write_to(&save)?;

    Ok(())
}

fn report(engine: &GameEngine, events: &[Event], verbose: bool) {
    for event in events {
        match event {
            Event::InvalidMove { .. } | Event::SaveRejected { .. } => {
                eprintln!("✗ {}", describe_event(engine.board(), event));
            }
            Event::CardMoved { .. } | Event::CardFlipped { .. } if !verbose => {}
            _ => println!("{}", describe_event(engine.board(), event)),
        }
    }
}

fn print_hints(engine: &GameEngine) {
    let mut found = false;
    for card_id in engine.movable_cards() {
        let Some(from) = engine.pile_of(card_id) else {
            continue;
        };
        let count = engine
            .board()
            .pile(from)
            .iter()
            .rev()
            .position(|id| id == card_id)
            .map_or(1, |c| c + 1);
        let card = engine.board().card(card_id).pretty_print();
        for to in PileId::columns().filter(|&to| engine.can_move(card_id, to)) {
            println!("move {} {} -n {count}  ({card})", from.short_name(), to.short_name());
            found = true;
        }
    }
    if engine.can_deal() {
        println!("deal");
    } else if !found {
        println!("No moves left");
    }
}

fn print_scores(engine: &GameEngine) {
    let entries = engine.high_scores().entries();
    if entries.is_empty() {
        println!("No high scores yet");
    }
    for (i, entry) in entries.iter().enumerate() {
        let name = if entry.player_name.is_empty() {
            "-"
        } else {
            entry.player_name.as_str()
        };
        println!(
            "{:>2}. {:>5}  {} suit(s)  {name}",
            i + 1,
            entry.score,
            entry.suit_count.count()
        );
    }
    let stats = engine.stats();
    println!(
        "Played: {}, Won: {}, Win rate: {:.1}%",
        stats.played,
        stats.won,
        stats.win_percentage()
    );
}

fn read_deck(file: Option<&Path>) -> Result<Vec<Card>> {
    let content = if let Some(file) = file {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read '{}'", file.display()))?
    } else if !stdin().is_terminal() {
        let mut content = String::new();
        stdin()
            .read_to_string(&mut content)
            .context("Failed to read from stdin")?;
        content
    } else {
        bail!("No deck `file` provided.");
    };
    serde_json::from_str(&content).context("Failed to parse deck")
}
