use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::deck::Deck;
use crate::error::CoupError;
use crate::CHARACTER_VARIANTS;

/// Table rules. Stored with every game so a running game keeps the rules it started with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    pub min_players: usize,
    pub max_players: usize,
    pub starting_money: u32,
    pub income: u32,
    pub foreign_aid: u32,
    pub tax: u32,
    pub steal: u32,
    pub coup_cost: u32,
    pub assassination_cost: u32,
    // at this much money the only legal declaration is a coup
    pub forced_coup_at: u32,
    pub exchange_draw: usize,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 10,
            starting_money: 2,
            income: 1,
            foreign_aid: 2,
            tax: 3,
            steal: 2,
            coup_cost: 7,
            assassination_cost: 3,
            forced_coup_at: 10,
            exchange_draw: 2,
        }
    }
}

impl Rules {
    /// The pile left after dealing must still cover an exchange draw.
    pub fn supports(&self, num_players: usize) -> bool {
        let minted = Deck::quantity_for(num_players) * CHARACTER_VARIANTS.len();
        minted >= 2 * num_players + self.exchange_draw.max(1)
    }

    pub fn validate(&self) -> Result<(), CoupError> {
        if self.min_players < 2 {
            return Err(CoupError::Validation("a game needs at least two players".into()));
        }
        if self.min_players > self.max_players {
            return Err(CoupError::Validation(format!(
                "min_players {} exceeds max_players {}", self.min_players, self.max_players
            )));
        }
        if let Some(n) = (self.min_players..=self.max_players).find(|&n| !self.supports(n)) {
            return Err(CoupError::Validation(format!("the deck is too small for {n} players")));
        }
        if self.forced_coup_at < self.coup_cost {
            return Err(CoupError::Validation("forced_coup_at is below coup_cost".into()));
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rules: Rules,
    pub poll_timeout_secs: u64,
    // games live in memory when unset
    pub store_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules: Rules::default(),
            poll_timeout_secs: 25,
            store_dir: None,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, CoupError> {
        let config: Config = serde_json::from_str(json)?;
        config.rules.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CoupError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|err| CoupError::Storage(format!("reading {}: {err}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}
