use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::deck::Deck;
use crate::error::CoupError;
use crate::Character;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub(crate) name: String,
    pub(crate) money: u32,
    // concealed influence
    pub(crate) hand: Vec<Character>,
    // revealed influence, never comes back
    pub(crate) lost: Vec<Character>,
}

impl Player {
    /// Seats a new player with two concealed cards from the deck.
    pub fn deal<R: Rng + Sized>(name: String, money: u32, deck: &mut Deck, rng: &mut R) -> Result<Self, CoupError> {
        let mut hand = Vec::with_capacity(2);
        for _ in 0..2 {
            let card = deck.draw(rng)
                .ok_or_else(|| CoupError::Invariant(format!("deck ran out while dealing to {name}")))?;
            hand.push(card);
        }

        Ok(Self { name, money, hand, lost: Vec::new() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn money(&self) -> u32 {
        self.money
    }

    pub fn hand(&self) -> &[Character] {
        &self.hand
    }

    pub fn lost(&self) -> &[Character] {
        &self.lost
    }

    pub fn is_alive(&self) -> bool {
        !self.hand.is_empty()
    }

    pub fn find(&self, card: Character) -> Option<usize> {
        self.hand.iter().position(|&c| c == card)
    }

    /// Shuffles a proven card back into the deck and draws a fresh one in its place.
    pub fn replace_card<R: Rng + Sized>(&mut self, card: Character, deck: &mut Deck, rng: &mut R) -> Result<Character, CoupError> {
        let idx = self.find(card)
            .ok_or_else(|| CoupError::Invariant(format!("{} cannot replace {:?} they do not hold", self.name, card)))?;

        deck.put_back(self.hand.remove(idx));
        let fresh = deck.draw(rng)
            .ok_or_else(|| CoupError::Invariant("deck empty right after a card was returned".into()))?;
        self.hand.insert(idx, fresh);

        Ok(fresh)
    }

    /// Reveals one concealed card. The player is out once the hand is empty.
    pub fn lose_life(&mut self, card: Character) -> Result<(), CoupError> {
        if !self.is_alive() {
            return Err(CoupError::Invariant(format!("{} has no influence left to lose", self.name)));
        }

        let idx = self.find(card)
            .ok_or_else(|| CoupError::Invariant(format!("{} does not hold {:?}", self.name, card)))?;
        self.lost.push(self.hand.remove(idx));

        Ok(())
    }
}
