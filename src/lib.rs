pub mod action;
pub mod config;
pub mod deck;
pub mod error;
pub mod game;
pub mod lobby;
pub mod notify;
pub mod player;
pub mod store;
pub mod turn;
pub mod view;

pub use action::{ActionKind, Move};
pub use config::{Config, Rules};
pub use deck::Deck;
pub use error::CoupError;
pub use game::{Board, Game, TurnOutcome};
pub use lobby::{Lobby, Reply};
pub use notify::{Event, Hub};
pub use player::Player;
pub use store::{FileStore, MemoryStore, Store};
pub use turn::{Block, Challenge, PendingLoss, Status, Turn};
pub use view::{Prompt, Seat, View};

use serde::{Deserialize, Serialize};
use crate::Character::{Ambassador, Assassin, Captain, Contessa, Duke};

/// A role card. Cards of the same character are interchangeable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Character {
    Duke,
    Assassin,
    Contessa,
    Captain,
    Ambassador,
}

pub static CHARACTER_VARIANTS: [Character; 5] = [
    Duke,
    Assassin,
    Contessa,
    Captain,
    Ambassador,
];

impl From<Character> for u8 {
    fn from(character: Character) -> u8 {
        character as u8
    }
}

impl TryFrom<u8> for Character {
    type Error = CoupError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        CHARACTER_VARIANTS
            .get(code as usize)
            .copied()
            .ok_or_else(|| CoupError::Validation(format!("unknown card code {code}")))
    }
}
