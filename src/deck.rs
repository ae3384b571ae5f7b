use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::Character;

/// The draw pile, an unordered multiset of characters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deck {
    cards: Vec<Character>,
}

impl Deck {
    pub fn new(quantity: usize, characters: &[Character]) -> Self {
        let cards = characters.iter()
            .flat_map(|&card| std::iter::repeat(card).take(quantity))
            .collect();

        Self { cards }
    }

    /// Copies of each character minted for a table of this size.
    pub fn quantity_for(num_players: usize) -> usize {
        match num_players {
            0..=6 => 3,
            7..=8 => 4,
            _ => 5,
        }
    }

    /// Removes a uniformly random card, or `None` once the pile is empty.
    pub fn draw<R: Rng + Sized>(&mut self, rng: &mut R) -> Option<Character> {
        if self.cards.is_empty() {
            return None;
        }

        let idx = rng.gen_range(0..self.cards.len());
        Some(self.cards.swap_remove(idx))
    }

    pub fn put_back(&mut self, card: Character) {
        self.cards.push(card);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn count(&self, card: Character) -> usize {
        self.cards.iter().filter(|&&c| c == card).count()
    }

    #[cfg(test)]
    pub(crate) fn take(&mut self, card: Character) -> bool {
        match self.cards.iter().position(|&c| c == card) {
            Some(idx) => {
                self.cards.swap_remove(idx);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use crate::Character::{Contessa, Duke};
    use crate::deck::Deck;
    use crate::CHARACTER_VARIANTS;

    #[test]
    fn quantity_tiers() {
        assert_eq!(Deck::quantity_for(2), 3);
        assert_eq!(Deck::quantity_for(6), 3);
        assert_eq!(Deck::quantity_for(7), 4);
        assert_eq!(Deck::quantity_for(8), 4);
        assert_eq!(Deck::quantity_for(9), 5);
        assert_eq!(Deck::quantity_for(10), 5);
    }

    #[test]
    fn draws_until_empty() {
        let mut rng = Pcg64::seed_from_u64(1);
        let mut deck = Deck::new(3, &CHARACTER_VARIANTS);
        assert_eq!(deck.len(), 15);

        for remaining in (0..15).rev() {
            assert!(deck.draw(&mut rng).is_some());
            assert_eq!(deck.len(), remaining);
        }

        assert!(deck.draw(&mut rng).is_none());
        assert!(deck.is_empty());
    }

    #[test]
    fn put_back() {
        let mut deck = Deck::new(1, &[Duke]);
        assert!(deck.take(Duke));
        assert!(!deck.take(Duke));

        deck.put_back(Contessa);
        assert_eq!(deck.count(Contessa), 1);
        assert_eq!(deck.count(Duke), 0);
    }
}
