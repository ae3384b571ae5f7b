use std::collections::BTreeSet;
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::action::{ActionKind, Move};
use crate::config::Rules;
use crate::deck::Deck;
use crate::error::CoupError;
use crate::player::Player;
use crate::turn::{Status, Table, Turn};
use crate::view::Prompt;
use crate::{Character, CHARACTER_VARIANTS};

const MAX_NAME_LEN: usize = 15;

/// The seated players and the draw pile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub(crate) deck: Deck,
    // seating order is turn order
    pub(crate) players: Vec<Player>,
}

impl Board {
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn get(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.name == name)
    }

    pub fn player(&self, name: &str) -> Result<&Player, CoupError> {
        self.get(name).ok_or_else(|| CoupError::NotFound(format!("no player named {name}")))
    }

    pub fn player_mut(&mut self, name: &str) -> Result<&mut Player, CoupError> {
        self.players
            .iter_mut()
            .find(|player| player.name == name)
            .ok_or_else(|| CoupError::NotFound(format!("no player named {name}")))
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.get(name).is_some_and(|player| player.is_alive())
    }

    pub fn living(&self) -> impl Iterator<Item=&Player> + '_ {
        self.players.iter().filter(|player| player.is_alive())
    }

    pub(crate) fn replace_card<R: Rng + Sized>(&mut self, name: &str, card: Character, rng: &mut R) -> Result<Character, CoupError> {
        let Board { deck, players } = self;
        players
            .iter_mut()
            .find(|player| player.name == name)
            .ok_or_else(|| CoupError::NotFound(format!("no player named {name}")))?
            .replace_card(card, deck, rng)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Next(String),
    GameOver(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    id: String,
    player_count: usize,
    #[serde(default)]
    rules: Rules,
    #[serde(flatten)]
    board: Board,
    // seat of the current player, None until every seat is taken
    turn_index: Option<usize>,
    #[serde(default)]
    turn_number: usize,
    #[serde(rename = "action")]
    turn: Turn,
    current_player: Option<String>,
    winner: Option<String>,
    #[serde(default)]
    version: u64,
}

impl Game {
    pub fn create(id: impl Into<String>, player_count: usize, rules: Rules) -> Result<Self, CoupError> {
        let id = id.into();
        if player_count < rules.min_players || player_count > rules.max_players {
            return Err(CoupError::Validation(format!(
                "a game takes {} to {} players, not {player_count}", rules.min_players, rules.max_players
            )));
        }
        if !rules.supports(player_count) {
            return Err(CoupError::Validation(format!("the deck is too small for {player_count} players")));
        }

        let deck = Deck::new(Deck::quantity_for(player_count), &CHARACTER_VARIANTS);
        info!("game {id} created for {player_count} players with {} cards", deck.len());

        Ok(Self {
            id,
            player_count,
            rules,
            board: Board { deck, players: Vec::with_capacity(player_count) },
            turn_index: None,
            turn_number: 0,
            turn: Turn::new(String::new()),
            current_player: None,
            winner: None,
            version: 0,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn player_count(&self) -> usize {
        self.player_count
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn turn_index(&self) -> Option<usize> {
        self.turn_index
    }

    pub fn turn_number(&self) -> usize {
        self.turn_number
    }

    pub fn current_player(&self) -> Option<&str> {
        self.current_player.as_deref()
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Bumped by every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_started(&self) -> bool {
        self.turn_index.is_some()
    }

    pub fn player_names(&self) -> impl Iterator<Item=&str> + '_ {
        self.board.players.iter().map(|player| player.name())
    }

    pub fn add_player<R: Rng + Sized>(&mut self, name: &str, rng: &mut R) -> Result<(), CoupError> {
        if self.is_started() {
            return Err(CoupError::Validation(format!("game {} is full", self.id)));
        }
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN || !name.chars().all(char::is_alphanumeric) {
            return Err(CoupError::Validation(format!(
                "names are 1 to {MAX_NAME_LEN} letters or digits, {name:?} is not"
            )));
        }
        if self.board.get(name).is_some() {
            return Err(CoupError::Validation(format!("{name} is already taken")));
        }

        let player = Player::deal(name.to_string(), self.rules.starting_money, &mut self.board.deck, rng)?;
        self.board.players.push(player);
        info!("{name} joined game {} ({}/{})", self.id, self.board.players.len(), self.player_count);

        if self.board.players.len() == self.player_count {
            let first = self.board.players[0].name.clone();
            self.turn_index = Some(0);
            self.current_player = Some(first.clone());
            self.turn = Turn::new(first);
            info!("game {} started", self.id);
        }

        self.version += 1;
        self.check_invariants()
    }

    /// Applies the move to a copy. On error `self` is untouched.
    pub fn apply<R: Rng + Sized>(&self, mv: Move, rng: &mut R) -> Result<Game, CoupError> {
        let mut game = self.clone();
        game.play(mv, rng)?;
        Ok(game)
    }

    /// Applies the move in place. Recoverable errors are raised before anything changes,
    /// use `apply` where a failed move must never leave a trace.
    pub fn play<R: Rng + Sized>(&mut self, mv: Move, rng: &mut R) -> Result<(), CoupError> {
        if let Some(winner) = &self.winner {
            return Err(CoupError::IllegalTransition(format!("{winner} already won")));
        }
        if !self.is_started() {
            return Err(CoupError::IllegalTransition("still waiting for players".into()));
        }
        self.board.player(mv.player())?;
        debug!("game {}: {:?}", self.id, mv);

        let Game { board, rules, turn, .. } = self;
        let mut table = Table { board, rules, rng };
        let status = turn.status();

        let outcome = match mv {
            Move::Declare(player, kind, target) => turn.declare(&mut table, &player, kind, target),
            Move::Pass(player) if status == Status::AwaitingBlock => turn.respond_to_block(&mut table, &player, None),
            Move::Pass(player) => turn.respond_to_action(&mut table, &player, false),
            Move::Challenge(player) if status == Status::AwaitingBlockChallenge => turn.respond_to_block_challenge(&mut table, &player, true),
            Move::Challenge(player) => turn.respond_to_action(&mut table, &player, true),
            Move::Block(player, card) => turn.respond_to_block(&mut table, &player, Some(card)),
            Move::Relent(player) => turn.respond_to_block_challenge(&mut table, &player, false),
            Move::Lose(player, card) => turn.lose(&mut table, &player, card),
            Move::Exchange(player, keep) => turn.exchange(&mut table, &player, keep),
            Move::Acknowledge(player) => turn.acknowledge(&player),
        };
        outcome?;

        if self.turn.is_complete() {
            if let TurnOutcome::GameOver(winner) = self.next_turn()? {
                info!("game {} is over, {winner} wins", self.id);
                self.winner = Some(winner);
            }
        }

        self.version += 1;
        self.check_invariants()
    }

    /// Moves on to the next living seat. With one player left the game is over instead.
    pub fn next_turn(&mut self) -> Result<TurnOutcome, CoupError> {
        match self.board.living().count() {
            0 => Err(CoupError::Invariant("nobody is left alive".into())),
            1 => {
                let winner = self.board.living()
                    .map(|player| player.name.clone())
                    .next()
                    .ok_or_else(|| CoupError::Invariant("the last player vanished".into()))?;
                Ok(TurnOutcome::GameOver(winner))
            }
            _ => {
                let seats = self.board.players.len();
                let from = self.turn_index.unwrap_or(seats - 1);
                let next = (1..=seats)
                    .map(|step| (from + step) % seats)
                    .find(|&idx| self.board.players[idx].is_alive())
                    .ok_or_else(|| CoupError::Invariant("no living seat found".into()))?;

                let name = self.board.players[next].name.clone();
                self.turn_index = Some(next);
                self.current_player = Some(name.clone());
                self.turn = Turn::new(name.clone());
                self.turn_number += 1;
                debug!("game {}: turn {} goes to {name}", self.id, self.turn_number);

                Ok(TurnOutcome::Next(name))
            }
        }
    }

    fn minted(&self) -> usize {
        Deck::quantity_for(self.player_count) * CHARACTER_VARIANTS.len()
    }

    pub fn check_invariants(&self) -> Result<(), CoupError> {
        self.check_roster()?;

        for player in &self.board.players {
            if player.hand.len() + player.lost.len() != 2 {
                return Err(CoupError::Invariant(format!(
                    "{} holds {} cards and lost {}", player.name, player.hand.len(), player.lost.len()
                )));
            }
        }

        let held: usize = self.board.players.iter().map(|player| player.hand.len() + player.lost.len()).sum();
        let total = self.board.deck.len() + held + self.turn.exchange.len();
        if total != self.minted() {
            return Err(CoupError::Invariant(format!("{total} cards in play but {} were minted", self.minted())));
        }

        if self.winner.is_none() && self.turn.status() == Status::AwaitingAction {
            if let Some(current) = &self.current_player {
                if !self.board.is_alive(current) {
                    return Err(CoupError::Invariant(format!("{current} is out but holds the turn")));
                }
            }
        }

        Ok(())
    }

    /// Seats and every name the turn mentions must belong to this game.
    fn check_roster(&self) -> Result<(), CoupError> {
        let players = &self.board.players;
        if players.len() > self.player_count {
            return Err(CoupError::Invariant(format!(
                "{} players seated at a table for {}", players.len(), self.player_count
            )));
        }
        let names: BTreeSet<&str> = players.iter().map(|player| player.name()).collect();
        if names.len() != players.len() {
            return Err(CoupError::Invariant("a name is seated twice".into()));
        }

        match self.turn_index {
            None => {
                if self.current_player.is_some() {
                    return Err(CoupError::Invariant("a turn holder before the game started".into()));
                }
                return Ok(());
            }
            Some(idx) => {
                if players.len() != self.player_count {
                    return Err(CoupError::Invariant("the game started with empty seats".into()));
                }
                let seated = players.get(idx).map(|player| player.name());
                if seated.is_none() || seated != self.current_player.as_deref() || seated != Some(self.turn.actor()) {
                    return Err(CoupError::Invariant(format!("seat {idx} does not hold the turn")));
                }
            }
        }

        let turn = &self.turn;
        let mentioned = turn.target.iter()
            .chain(turn.pending_loss.iter().map(|loss| &loss.who))
            .chain(turn.block.iter().map(|block| &block.blocker))
            .chain(turn.barrier.iter())
            .chain(turn.passed.iter())
            .chain(self.winner.iter());
        for name in mentioned {
            if !names.contains(name.as_str()) {
                return Err(CoupError::Invariant(format!("{name} is not seated in game {}", self.id)));
            }
        }
        if !turn.acknowledged.is_subset(&turn.barrier) {
            return Err(CoupError::Invariant("acknowledged by someone outside the barrier".into()));
        }

        Ok(())
    }

    pub fn to_json(&self) -> Result<String, CoupError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CoupError> {
        let game: Game = serde_json::from_str(json)?;
        game.check_invariants()?;
        Ok(game)
    }

    /// What `name` is expected to do right now.
    pub fn prompt(&self, name: &str) -> Prompt {
        if self.winner.is_some() {
            return Prompt::Finished;
        }
        let Some(player) = self.board.get(name) else {
            return Prompt::Wait;
        };
        if !self.is_started() {
            return Prompt::Wait;
        }

        let turn = &self.turn;
        let alive = player.is_alive();
        match turn.status() {
            Status::AwaitingAction if turn.actor() == name => Prompt::Declare,
            Status::AwaitingActionChallenge if alive && turn.actor() != name && !turn.has_passed(name) => Prompt::Respond,
            Status::AwaitingBlock => {
                let Some(kind) = turn.kind() else {
                    return Prompt::Wait;
                };
                let eligible = if kind == ActionKind::ForeignAid {
                    alive && turn.actor() != name && !turn.has_passed(name)
                } else {
                    alive && turn.target() == Some(name)
                };

                if eligible {
                    Prompt::Block(kind.blockers().to_vec())
                } else {
                    Prompt::Wait
                }
            }
            Status::AwaitingBlockChallenge if turn.actor() == name => Prompt::Contest,
            Status::AwaitingLifeLoss if turn.pending_loss().is_some_and(|loss| loss.who == name) => {
                Prompt::Lose(player.hand.clone())
            }
            Status::AwaitingCardExchange if turn.actor() == name => Prompt::Exchange {
                keep: player.hand.len(),
                offered: player.hand.iter().chain(turn.exchange_candidates()).copied().collect(),
            },
            Status::AwaitingAcknowledgement if turn.barrier().contains(name) && !turn.acknowledged().contains(name) => {
                Prompt::Acknowledge
            }
            _ => Prompt::Wait,
        }
    }

    /// Every legal move for `name`.
    pub fn moves_for(&self, name: &str) -> Vec<Move> {
        let player = name.to_string();
        match self.prompt(name) {
            Prompt::Declare => self.declarations(name),
            Prompt::Respond => vec![Move::Pass(player.clone()), Move::Challenge(player)],
            Prompt::Block(cards) => std::iter::once(Move::Pass(player.clone()))
                .chain(cards.into_iter().map(|card| Move::Block(player.clone(), card)))
                .collect(),
            Prompt::Contest => vec![Move::Relent(player.clone()), Move::Challenge(player)],
            Prompt::Lose(mut cards) => {
                cards.sort();
                cards.dedup();
                cards.into_iter().map(|card| Move::Lose(player.clone(), card)).collect()
            }
            Prompt::Exchange { keep, offered } => selections(&offered, keep)
                .into_iter()
                .map(|selection| Move::Exchange(player.clone(), selection))
                .collect(),
            Prompt::Acknowledge => vec![Move::Acknowledge(player)],
            Prompt::Wait | Prompt::Finished => vec![],
        }
    }

    /// Every legal move for every player.
    pub fn moves(&self) -> Vec<Move> {
        self.player_names().flat_map(|name| self.moves_for(name)).collect()
    }

    fn declarations(&self, name: &str) -> Vec<Move> {
        let Some(player) = self.board.get(name) else {
            return vec![];
        };
        let others: Vec<String> = self.board.living()
            .filter(|other| other.name != name)
            .map(|other| other.name.clone())
            .collect();
        let declare = |kind: ActionKind, target: Option<&String>| Move::Declare(name.to_string(), kind, target.cloned());

        let mut moves = Vec::with_capacity(4 + others.len() * 3);
        if player.money >= self.rules.forced_coup_at {
            moves.extend(others.iter().map(|other| declare(ActionKind::Coup, Some(other))));
            return moves;
        }

        moves.push(declare(ActionKind::Income, None));
        moves.push(declare(ActionKind::ForeignAid, None));
        moves.push(declare(ActionKind::Tax, None));
        moves.push(declare(ActionKind::Exchange, None));
        for other in &others {
            moves.push(declare(ActionKind::Steal, Some(other)));
            if player.money >= self.rules.assassination_cost {
                moves.push(declare(ActionKind::Assassinate, Some(other)));
            }
            if player.money >= self.rules.coup_cost {
                moves.push(declare(ActionKind::Coup, Some(other)));
            }
        }

        moves
    }
}

/// Distinct ways to keep `keep` cards out of `offered`, each sorted.
fn selections(offered: &[Character], keep: usize) -> Vec<Vec<Character>> {
    fn walk(offered: &[Character], keep: usize, start: usize, picked: &mut Vec<Character>, found: &mut Vec<Vec<Character>>) {
        if picked.len() == keep {
            let mut selection = picked.clone();
            selection.sort();
            found.push(selection);
            return;
        }
        for idx in start..offered.len() {
            picked.push(offered[idx]);
            walk(offered, keep, idx + 1, picked, found);
            picked.pop();
        }
    }

    let mut found = Vec::new();
    walk(offered, keep, 0, &mut Vec::with_capacity(keep), &mut found);
    found.sort();
    found.dedup();
    found
}
