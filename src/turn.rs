use std::collections::BTreeSet;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::action::ActionKind;
use crate::config::Rules;
use crate::error::CoupError;
use crate::game::Board;
use crate::Character;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    AwaitingAction,
    AwaitingActionChallenge,
    AwaitingBlock,
    AwaitingBlockChallenge,
    // somebody has to pick a concealed card to reveal
    AwaitingLifeLoss,
    // transient, resolved in the request that enters it
    AwaitingEffectResolution,
    AwaitingAcknowledgement,
    AwaitingCardExchange,
}

static STATUS_VARIANTS: [Status; 8] = [
    Status::AwaitingAction,
    Status::AwaitingActionChallenge,
    Status::AwaitingBlock,
    Status::AwaitingBlockChallenge,
    Status::AwaitingLifeLoss,
    Status::AwaitingEffectResolution,
    Status::AwaitingAcknowledgement,
    Status::AwaitingCardExchange,
];

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for Status {
    type Error = CoupError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        STATUS_VARIANTS
            .get(code as usize)
            .copied()
            .ok_or_else(|| CoupError::Validation(format!("unknown status code {code}")))
    }
}

/// A resolved accusation. `upheld` is true when the claimant really held the card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenger: String,
    pub claimant: String,
    pub card: Character,
    pub upheld: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub blocker: String,
    pub card: Character,
}

/// Who has to give up a card, and the status the turn resumes at afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLoss {
    pub who: String,
    pub resume: Status,
}

/// Everything the turn engine touches besides the turn itself.
pub(crate) struct Table<'a, R: Rng + Sized> {
    pub(crate) board: &'a mut Board,
    pub(crate) rules: &'a Rules,
    pub(crate) rng: &'a mut R,
}

/// The negotiation of a single turn. A fresh one is created for every turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub(crate) kind: Option<ActionKind>,
    pub(crate) actor: String,
    pub(crate) target: Option<String>,
    pub(crate) challenge: Option<Challenge>,
    pub(crate) block: Option<Block>,
    #[serde(rename = "challengeOfBlock")]
    pub(crate) block_challenge: Option<Challenge>,
    #[serde(rename = "pendingLifeLoss")]
    pub(crate) pending_loss: Option<PendingLoss>,
    // players who declined to challenge, or to block foreign aid
    pub(crate) passed: BTreeSet<String>,
    // who must acknowledge, fixed when the barrier is entered
    pub(crate) barrier: BTreeSet<String>,
    #[serde(rename = "acknowledgedBy")]
    pub(crate) acknowledged: BTreeSet<String>,
    // candidates drawn for an exchange, not yet in anyone's hand
    pub(crate) exchange: Vec<Character>,
    pub(crate) status: Status,
    #[serde(rename = "message", with = "message")]
    pub(crate) log: Vec<String>,
}

/// The log travels as one newline separated string.
mod message {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(log: &[String], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&log.join("\n"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(text.lines().map(String::from).collect())
    }
}

impl Turn {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            kind: None,
            actor: actor.into(),
            target: None,
            challenge: None,
            block: None,
            block_challenge: None,
            pending_loss: None,
            passed: BTreeSet::new(),
            barrier: BTreeSet::new(),
            acknowledged: BTreeSet::new(),
            exchange: Vec::new(),
            status: Status::AwaitingAction,
            log: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn kind(&self) -> Option<ActionKind> {
        self.kind
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub fn block(&self) -> Option<&Block> {
        self.block.as_ref()
    }

    pub fn block_challenge(&self) -> Option<&Challenge> {
        self.block_challenge.as_ref()
    }

    pub fn pending_loss(&self) -> Option<&PendingLoss> {
        self.pending_loss.as_ref()
    }

    pub fn acknowledged(&self) -> &BTreeSet<String> {
        &self.acknowledged
    }

    pub fn barrier(&self) -> &BTreeSet<String> {
        &self.barrier
    }

    pub fn exchange_candidates(&self) -> &[Character] {
        &self.exchange
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn has_passed(&self, player: &str) -> bool {
        self.passed.contains(player)
    }

    /// Every player in the barrier has acknowledged the outcome.
    pub fn is_complete(&self) -> bool {
        self.status == Status::AwaitingAcknowledgement && self.barrier.is_subset(&self.acknowledged)
    }

    fn note(&mut self, line: String) {
        debug!("{line}");
        self.log.push(line);
    }

    fn expect(&self, status: Status) -> Result<(), CoupError> {
        if self.status == status {
            Ok(())
        } else {
            Err(CoupError::IllegalTransition(format!("turn is {:?}, not {:?}", self.status, status)))
        }
    }

    fn declared(&self) -> Result<ActionKind, CoupError> {
        self.kind.ok_or_else(|| CoupError::Invariant("no action has been declared".into()))
    }

    fn target_name(&self) -> Result<String, CoupError> {
        self.target.clone().ok_or_else(|| CoupError::Invariant("targeted action has no target".into()))
    }

    /// Living players other than the actor who have not passed yet.
    fn awaiting_passes<'b>(&'b self, board: &'b Board) -> impl Iterator<Item=&'b str> + 'b {
        board.living()
            .map(|player| player.name())
            .filter(move |name| *name != self.actor && !self.passed.contains(*name))
    }

    /// The status an unchallenged claim moves on to.
    fn unchallenged(kind: ActionKind) -> Result<Status, CoupError> {
        match kind {
            ActionKind::Steal | ActionKind::Assassinate => Ok(Status::AwaitingBlock),
            ActionKind::Tax => Ok(Status::AwaitingEffectResolution),
            ActionKind::Exchange => Ok(Status::AwaitingCardExchange),
            _ => Err(CoupError::Invariant(format!("{:?} cannot be challenged", kind))),
        }
    }

    pub(crate) fn declare<R: Rng + Sized>(&mut self, table: &mut Table<R>, actor: &str, kind: ActionKind, target: Option<String>) -> Result<(), CoupError> {
        self.expect(Status::AwaitingAction)?;
        if actor != self.actor {
            return Err(CoupError::IllegalTransition(format!("it is {}'s turn", self.actor)));
        }

        let money = table.board.player(actor)?.money;
        if money >= table.rules.forced_coup_at && kind != ActionKind::Coup {
            return Err(CoupError::Validation(format!("with {money} coins {actor} must coup")));
        }

        let target = match (kind.is_targeted(), target) {
            (true, Some(target)) => {
                let living = table.board.get(&target).is_some_and(|player| player.is_alive());
                if target == actor || !living {
                    return Err(CoupError::Validation(format!("{target} is not a valid target")));
                }
                Some(target)
            }
            (true, None) => return Err(CoupError::Validation(format!("{:?} needs a target", kind))),
            (false, Some(_)) => return Err(CoupError::Validation(format!("{:?} takes no target", kind))),
            (false, None) => None,
        };

        let cost = kind.cost(table.rules);
        if money < cost {
            return Err(CoupError::Validation(format!("{:?} costs {cost} but {actor} has {money}", kind)));
        }
        table.board.player_mut(actor)?.money -= cost;

        self.kind = Some(kind);
        self.target = target;
        let line = match &self.target {
            Some(target) => format!("{actor} declares {:?} against {target}", kind),
            None => format!("{actor} declares {:?}", kind),
        };
        self.note(line);

        match kind {
            ActionKind::Income => {
                table.board.player_mut(actor)?.money += table.rules.income;
                self.enter_acknowledgement(table.board);
                Ok(())
            }
            ActionKind::Coup => {
                let target = self.target_name()?;
                self.schedule_loss(table, &target, Status::AwaitingAcknowledgement)
            }
            ActionKind::ForeignAid => self.enter_block(table),
            _ => {
                self.status = Status::AwaitingActionChallenge;
                Ok(())
            }
        }
    }

    pub(crate) fn respond_to_action<R: Rng + Sized>(&mut self, table: &mut Table<R>, player: &str, challenge: bool) -> Result<(), CoupError> {
        self.expect(Status::AwaitingActionChallenge)?;
        if !self.awaiting_passes(table.board).any(|name| name == player) {
            return Err(CoupError::IllegalTransition(format!("{player} has no say on this action")));
        }

        let kind = self.declared()?;
        if !challenge {
            self.passed.insert(player.to_string());
            self.note(format!("{player} does not challenge"));

            if self.awaiting_passes(table.board).next().is_none() {
                return self.advance(table, Self::unchallenged(kind)?);
            }
            return Ok(());
        }

        let card = kind.claim()
            .ok_or_else(|| CoupError::Invariant(format!("{:?} claims no character", kind)))?;
        let actor = self.actor.clone();
        let upheld = self.test_claim(table, &actor, player, card)?;
        self.challenge = Some(Challenge {
            challenger: player.to_string(),
            claimant: actor.clone(),
            card,
            upheld,
        });

        if upheld {
            self.schedule_loss(table, player, Self::unchallenged(kind)?)
        } else {
            self.schedule_loss(table, &actor, Status::AwaitingAcknowledgement)
        }
    }

    pub(crate) fn respond_to_block<R: Rng + Sized>(&mut self, table: &mut Table<R>, player: &str, block: Option<Character>) -> Result<(), CoupError> {
        self.expect(Status::AwaitingBlock)?;
        let kind = self.declared()?;

        let eligible = if kind == ActionKind::ForeignAid {
            self.awaiting_passes(table.board).any(|name| name == player)
        } else {
            self.target.as_deref() == Some(player) && table.board.is_alive(player)
        };
        if !eligible {
            return Err(CoupError::IllegalTransition(format!("{player} cannot block this action")));
        }

        match block {
            None => {
                self.passed.insert(player.to_string());
                self.note(format!("{player} does not block"));

                if kind != ActionKind::ForeignAid || self.awaiting_passes(table.board).next().is_none() {
                    return self.resolve_effect(table);
                }
                Ok(())
            }
            Some(card) => {
                if !kind.blockers().contains(&card) {
                    return Err(CoupError::Validation(format!("{:?} cannot block {:?}", card, kind)));
                }

                self.note(format!("{player} blocks with {:?}", card));
                self.block = Some(Block { blocker: player.to_string(), card });
                self.status = Status::AwaitingBlockChallenge;
                Ok(())
            }
        }
    }

    pub(crate) fn respond_to_block_challenge<R: Rng + Sized>(&mut self, table: &mut Table<R>, player: &str, challenge: bool) -> Result<(), CoupError> {
        self.expect(Status::AwaitingBlockChallenge)?;
        if player != self.actor {
            return Err(CoupError::IllegalTransition(format!("only {} can answer the block", self.actor)));
        }

        let block = self.block.clone()
            .ok_or_else(|| CoupError::Invariant("block challenge without a block".into()))?;

        if !challenge {
            self.note(format!("{player} accepts the block"));
            self.enter_acknowledgement(table.board);
            return Ok(());
        }

        let upheld = self.test_claim(table, &block.blocker, player, block.card)?;
        self.block_challenge = Some(Challenge {
            challenger: player.to_string(),
            claimant: block.blocker.clone(),
            card: block.card,
            upheld,
        });

        if upheld {
            self.schedule_loss(table, player, Status::AwaitingAcknowledgement)
        } else {
            self.schedule_loss(table, &block.blocker, Status::AwaitingEffectResolution)
        }
    }

    pub(crate) fn lose<R: Rng + Sized>(&mut self, table: &mut Table<R>, player: &str, card: Character) -> Result<(), CoupError> {
        self.expect(Status::AwaitingLifeLoss)?;
        let pending = self.pending_loss.clone()
            .ok_or_else(|| CoupError::Invariant("awaiting a life loss from nobody".into()))?;

        if player != pending.who {
            return Err(CoupError::IllegalTransition(format!("{} has to choose, not {player}", pending.who)));
        }
        if table.board.player(player)?.find(card).is_none() {
            return Err(CoupError::Validation(format!("{player} does not hold {:?}", card)));
        }

        table.board.player_mut(player)?.lose_life(card)?;
        self.note(format!("{player} reveals {:?}", card));
        self.pending_loss = None;
        self.advance(table, pending.resume)
    }

    pub(crate) fn exchange<R: Rng + Sized>(&mut self, table: &mut Table<R>, player: &str, keep: Vec<Character>) -> Result<(), CoupError> {
        self.expect(Status::AwaitingCardExchange)?;
        if player != self.actor {
            return Err(CoupError::IllegalTransition(format!("only {} is exchanging", self.actor)));
        }

        let hand = table.board.player(player)?.hand.clone();
        if keep.len() != hand.len() {
            return Err(CoupError::Validation(format!("keep exactly {} cards, not {}", hand.len(), keep.len())));
        }

        let mut offered: Vec<Character> = hand.iter().chain(self.exchange.iter()).copied().collect();
        for card in &keep {
            let idx = offered.iter().position(|c| c == card)
                .ok_or_else(|| CoupError::Validation(format!("{:?} was not on offer", card)))?;
            offered.swap_remove(idx);
        }

        table.board.player_mut(player)?.hand = keep;
        for card in offered {
            table.board.deck.put_back(card);
        }
        self.exchange.clear();
        self.note(format!("{player} exchanges cards"));
        self.enter_acknowledgement(table.board);

        Ok(())
    }

    pub(crate) fn acknowledge(&mut self, player: &str) -> Result<(), CoupError> {
        self.expect(Status::AwaitingAcknowledgement)?;
        if !self.barrier.contains(player) {
            return Err(CoupError::IllegalTransition(format!("{player} is not part of this turn")));
        }
        if !self.acknowledged.insert(player.to_string()) {
            return Err(CoupError::IllegalTransition(format!("{player} already acknowledged")));
        }

        Ok(())
    }

    /// Reveals whether `claimant` holds `card`. A proven card goes back to the deck and is redrawn.
    fn test_claim<R: Rng + Sized>(&mut self, table: &mut Table<R>, claimant: &str, challenger: &str, card: Character) -> Result<bool, CoupError> {
        self.note(format!("{challenger} challenges {claimant}'s {:?}", card));

        if table.board.player(claimant)?.find(card).is_some() {
            table.board.replace_card(claimant, card, table.rng)?;
            self.note(format!("{claimant} shows {:?} and draws a new card", card));
            Ok(true)
        } else {
            self.note(format!("{claimant} was bluffing"));
            Ok(false)
        }
    }

    /// Takes a life from `who`. With one card left there is nothing to choose.
    fn schedule_loss<R: Rng + Sized>(&mut self, table: &mut Table<R>, who: &str, resume: Status) -> Result<(), CoupError> {
        let player = table.board.player_mut(who)?;
        match player.hand.len() {
            0 => Err(CoupError::Invariant(format!("{who} has no influence left to lose"))),
            1 => {
                let card = player.hand[0];
                player.lose_life(card)?;
                self.note(format!("{who} reveals {:?} and is out", card));
                self.advance(table, resume)
            }
            _ => {
                self.pending_loss = Some(PendingLoss { who: who.to_string(), resume });
                self.status = Status::AwaitingLifeLoss;
                Ok(())
            }
        }
    }

    fn advance<R: Rng + Sized>(&mut self, table: &mut Table<R>, next: Status) -> Result<(), CoupError> {
        match next {
            Status::AwaitingBlock => self.enter_block(table),
            Status::AwaitingEffectResolution => self.resolve_effect(table),
            Status::AwaitingCardExchange => self.enter_exchange(table),
            Status::AwaitingAcknowledgement => {
                self.enter_acknowledgement(table.board);
                Ok(())
            }
            other => Err(CoupError::Invariant(format!("cannot resume a turn at {:?}", other))),
        }
    }

    fn enter_block<R: Rng + Sized>(&mut self, table: &mut Table<R>) -> Result<(), CoupError> {
        let kind = self.declared()?;
        if kind.is_targeted() && !table.board.is_alive(&self.target_name()?) {
            // the target already went out losing a challenge
            return self.resolve_effect(table);
        }

        self.passed.clear();
        self.status = Status::AwaitingBlock;
        Ok(())
    }

    fn enter_exchange<R: Rng + Sized>(&mut self, table: &mut Table<R>) -> Result<(), CoupError> {
        self.status = Status::AwaitingCardExchange;
        for _ in 0..table.rules.exchange_draw {
            let card = table.board.deck.draw(table.rng)
                .ok_or_else(|| CoupError::Invariant("deck ran out during an exchange".into()))?;
            self.exchange.push(card);
        }

        Ok(())
    }

    fn resolve_effect<R: Rng + Sized>(&mut self, table: &mut Table<R>) -> Result<(), CoupError> {
        self.status = Status::AwaitingEffectResolution;
        let kind = self.declared()?;
        let actor = self.actor.clone();

        match kind {
            ActionKind::ForeignAid => {
                table.board.player_mut(&actor)?.money += table.rules.foreign_aid;
                self.note(format!("{actor} takes {} in foreign aid", table.rules.foreign_aid));
            }
            ActionKind::Tax => {
                table.board.player_mut(&actor)?.money += table.rules.tax;
                self.note(format!("{actor} collects {} in tax", table.rules.tax));
            }
            ActionKind::Steal => {
                let target = self.target_name()?;
                let victim = table.board.player_mut(&target)?;
                let taken = victim.money.min(table.rules.steal);
                victim.money -= taken;
                table.board.player_mut(&actor)?.money += taken;
                self.note(format!("{actor} steals {taken} from {target}"));
            }
            ActionKind::Assassinate => {
                let target = self.target_name()?;
                if table.board.is_alive(&target) {
                    return self.schedule_loss(table, &target, Status::AwaitingAcknowledgement);
                }
            }
            _ => return Err(CoupError::Invariant(format!("{:?} has no deferred effect", kind))),
        }

        self.enter_acknowledgement(table.board);
        Ok(())
    }

    fn enter_acknowledgement(&mut self, board: &Board) {
        self.status = Status::AwaitingAcknowledgement;
        self.barrier = board.living().map(|player| player.name().to_string()).collect();
        self.acknowledged.clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::turn::{Status, Turn};

    #[test]
    fn status_codes() {
        assert_eq!(u8::from(Status::AwaitingAction), 0);
        assert_eq!(u8::from(Status::AwaitingLifeLoss), 4);
        assert_eq!(u8::from(Status::AwaitingCardExchange), 7);
        assert_eq!(Status::try_from(6).unwrap(), Status::AwaitingAcknowledgement);
        assert!(Status::try_from(8).is_err());
    }

    #[test]
    fn fresh_turn() {
        let turn = Turn::new("ann");
        assert_eq!(turn.status(), Status::AwaitingAction);
        assert_eq!(turn.actor(), "ann");
        assert!(turn.kind().is_none());
        assert!(turn.log().is_empty());
        assert!(!turn.is_complete());
    }

    #[test]
    fn acknowledge_only_in_barrier() {
        let mut turn = Turn::new("ann");
        assert!(turn.acknowledge("ann").is_err());

        turn.status = Status::AwaitingAcknowledgement;
        turn.barrier = ["ann", "bob"].iter().map(|s| s.to_string()).collect();

        assert!(turn.acknowledge("cat").is_err());
        turn.acknowledge("ann").unwrap();
        assert!(turn.acknowledge("ann").is_err());
        assert!(!turn.is_complete());
        turn.acknowledge("bob").unwrap();
        assert!(turn.is_complete());
    }

    #[test]
    fn serialized_field_names() {
        let json = serde_json::to_value(Turn::new("ann")).unwrap();
        assert_eq!(json["status"], 0);
        assert!(json.get("challengeOfBlock").is_some());
        assert!(json.get("pendingLifeLoss").is_some());
        assert!(json.get("acknowledgedBy").is_some());
        assert_eq!(json["message"], "");
    }

    #[test]
    fn message_is_one_string() {
        let mut turn = Turn::new("ann");
        turn.note("ann declares Tax".into());
        turn.note("bob does not challenge".into());

        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["message"], "ann declares Tax\nbob does not challenge");

        let back: Turn = serde_json::from_value(json).unwrap();
        assert_eq!(back, turn);
    }
}
