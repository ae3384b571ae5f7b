use std::fmt::{Debug, Formatter};
use serde::{Deserialize, Serialize};
use crate::config::Rules;
use crate::error::CoupError;
use crate::Character;
use crate::Character::{Ambassador, Assassin, Captain, Contessa, Duke};

/// What the turn owner declares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ActionKind {
    Income,
    ForeignAid,
    Coup,
    Tax,
    Steal,
    Assassinate,
    Exchange,
}

pub static ACTION_VARIANTS: [ActionKind; 7] = [
    ActionKind::Income,
    ActionKind::ForeignAid,
    ActionKind::Coup,
    ActionKind::Tax,
    ActionKind::Steal,
    ActionKind::Assassinate,
    ActionKind::Exchange,
];

impl ActionKind {
    /// The character the actor implicitly claims, if any. Only claims can be challenged.
    pub fn claim(self) -> Option<Character> {
        match self {
            ActionKind::Tax => Some(Duke),
            ActionKind::Steal => Some(Captain),
            ActionKind::Assassinate => Some(Assassin),
            ActionKind::Exchange => Some(Ambassador),
            ActionKind::Income | ActionKind::ForeignAid | ActionKind::Coup => None,
        }
    }

    pub fn blockers(self) -> &'static [Character] {
        match self {
            ActionKind::ForeignAid => &[Duke],
            ActionKind::Steal => &[Captain, Ambassador],
            ActionKind::Assassinate => &[Contessa],
            _ => &[],
        }
    }

    pub fn is_targeted(self) -> bool {
        matches!(self, ActionKind::Coup | ActionKind::Steal | ActionKind::Assassinate)
    }

    /// Paid up front on declaration.
    pub fn cost(self, rules: &Rules) -> u32 {
        match self {
            ActionKind::Coup => rules.coup_cost,
            ActionKind::Assassinate => rules.assassination_cost,
            _ => 0,
        }
    }
}

impl From<ActionKind> for u8 {
    fn from(kind: ActionKind) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for ActionKind {
    type Error = CoupError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        ACTION_VARIANTS
            .get(code as usize)
            .copied()
            .ok_or_else(|| CoupError::Validation(format!("unknown action code {code}")))
    }
}

/// A submission from one player. Which reply a variant stands for depends on the turn status,
/// `Pass` declines a challenge or a block and `Challenge` contests an action or a block.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum Move {
    Declare(String, ActionKind, Option<String>),
    Pass(String),
    Challenge(String),
    Block(String, Character),
    Relent(String),
    Lose(String, Character),
    Exchange(String, Vec<Character>),
    Acknowledge(String),
}

impl Move {
    pub fn player(&self) -> &str {
        match self {
            Move::Declare(player, _, _)
            | Move::Pass(player)
            | Move::Challenge(player)
            | Move::Block(player, _)
            | Move::Relent(player)
            | Move::Lose(player, _)
            | Move::Exchange(player, _)
            | Move::Acknowledge(player) => player,
        }
    }
}

impl Debug for Move {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Move::Declare(player, kind, None) => {
                f.write_fmt(format_args!("{player} declares {:?}", kind))
            }
            Move::Declare(player, kind, Some(target)) => {
                f.write_fmt(format_args!("{player} declares {:?} against {target}", kind))
            }
            Move::Pass(player) => {
                f.write_fmt(format_args!("{player} passes"))
            }
            Move::Challenge(player) => {
                f.write_fmt(format_args!("{player} challenges"))
            }
            Move::Block(player, character) => {
                f.write_fmt(format_args!("{player} blocks with {:?}", character))
            }
            Move::Relent(player) => {
                f.write_fmt(format_args!("{player} relents to the block"))
            }
            Move::Lose(player, character) => {
                f.write_fmt(format_args!("{player} gives up {:?}", character))
            }
            Move::Exchange(player, keep) => {
                f.write_fmt(format_args!("{player} keeps {:?}", keep))
            }
            Move::Acknowledge(player) => {
                f.write_fmt(format_args!("{player} acknowledges"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::action::{ActionKind, Move, ACTION_VARIANTS};
    use crate::config::Rules;
    use crate::Character::{Ambassador, Captain, Contessa, Duke};

    #[test]
    fn claims_and_blockers() {
        assert_eq!(ActionKind::Income.claim(), None);
        assert_eq!(ActionKind::ForeignAid.claim(), None);
        assert_eq!(ActionKind::Tax.claim(), Some(Duke));
        assert_eq!(ActionKind::ForeignAid.blockers(), &[Duke]);
        assert_eq!(ActionKind::Steal.blockers(), &[Captain, Ambassador]);
        assert_eq!(ActionKind::Assassinate.blockers(), &[Contessa]);
        assert!(ActionKind::Coup.blockers().is_empty());
        assert!(ActionKind::Tax.blockers().is_empty());
    }

    #[test]
    fn costs() {
        let rules = Rules::default();
        assert_eq!(ActionKind::Coup.cost(&rules), 7);
        assert_eq!(ActionKind::Assassinate.cost(&rules), 3);
        assert_eq!(ActionKind::Steal.cost(&rules), 0);
    }

    #[test]
    fn codes() {
        for (code, kind) in ACTION_VARIANTS.iter().enumerate() {
            assert_eq!(ActionKind::try_from(code as u8).unwrap(), *kind);
        }
        assert!(ActionKind::try_from(7).is_err());
    }

    #[test]
    fn describe() {
        let declare = Move::Declare("ann".into(), ActionKind::Steal, Some("bob".into()));
        assert_eq!(format!("{:?}", declare), "ann declares Steal against bob");
        assert_eq!(declare.player(), "ann");
    }
}
