use serde::{Deserialize, Serialize};
use crate::action::ActionKind;
use crate::error::CoupError;
use crate::game::Game;
use crate::turn::{Block, Status};
use crate::Character;

/// What a player is expected to submit next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prompt {
    Wait,
    Declare,
    // pass or challenge the declared action
    Respond,
    // pass or block with one of these
    Block(Vec<Character>),
    // relent to the block or challenge it
    Contest,
    Lose(Vec<Character>),
    Exchange { keep: usize, offered: Vec<Character> },
    Acknowledge,
    Finished,
}

/// An opponent as everybody else sees them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub name: String,
    pub money: u32,
    pub influence: usize,
    pub lost: Vec<Character>,
}

/// The game from one player's chair. Other players' concealed cards are never included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub game_id: String,
    pub version: u64,
    pub player: String,
    pub money: u32,
    pub hand: Vec<Character>,
    pub lost: Vec<Character>,
    pub seats: Vec<Seat>,
    // seats still empty
    pub missing: usize,
    pub status: Status,
    pub action: Option<ActionKind>,
    pub actor: Option<String>,
    pub target: Option<String>,
    pub block: Option<Block>,
    pub current_player: Option<String>,
    pub prompt: Prompt,
    pub log: Vec<String>,
    pub winner: Option<String>,
}

impl View {
    pub fn of(game: &Game, player: &str) -> Result<Self, CoupError> {
        let me = game.board().player(player)?;
        let turn = game.turn();

        let seats = game.board()
            .players()
            .iter()
            .filter(|other| other.name() != player)
            .map(|other| Seat {
                name: other.name().to_string(),
                money: other.money(),
                influence: other.hand().len(),
                lost: other.lost().to_vec(),
            })
            .collect();

        Ok(Self {
            game_id: game.id().to_string(),
            version: game.version(),
            player: player.to_string(),
            money: me.money(),
            hand: me.hand().to_vec(),
            lost: me.lost().to_vec(),
            seats,
            missing: game.player_count().saturating_sub(game.board().players().len()),
            status: turn.status(),
            action: turn.kind(),
            actor: game.current_player().map(|_| turn.actor().to_string()),
            target: turn.target().map(String::from),
            block: turn.block().cloned(),
            current_player: game.current_player().map(String::from),
            prompt: game.prompt(player),
            log: turn.log().to_vec(),
            winner: game.winner().map(String::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use crate::action::{ActionKind, Move};
    use crate::config::Rules;
    use crate::error::CoupError;
    use crate::game::Game;
    use crate::turn::Status;
    use crate::view::{Prompt, View};

    #[test]
    fn lobby_view() {
        let mut rng = Pcg64::seed_from_u64(1);
        let mut game = Game::create("g", 3, Rules::default()).unwrap();
        game.add_player("ann", &mut rng).unwrap();

        let view = View::of(&game, "ann").unwrap();
        assert_eq!(view.missing, 2);
        assert!(view.actor.is_none());
        assert!(view.current_player.is_none());
        assert_eq!(view.prompt, Prompt::Wait);
        assert!(matches!(View::of(&game, "bob"), Err(CoupError::NotFound(_))));
    }

    #[test]
    fn hides_opponent_hands() {
        let mut rng = Pcg64::seed_from_u64(2);
        let mut game = Game::create("g", 2, Rules::default()).unwrap();
        game.add_player("ann", &mut rng).unwrap();
        game.add_player("bob", &mut rng).unwrap();
        let game = game.apply(Move::Declare("ann".into(), ActionKind::Tax, None), &mut rng).unwrap();

        let view = View::of(&game, "bob").unwrap();
        assert_eq!(view.hand, game.board().get("bob").unwrap().hand());
        assert_eq!(view.seats.len(), 1);
        assert_eq!(view.seats[0].name, "ann");
        assert_eq!(view.seats[0].influence, 2);
        assert_eq!(view.status, Status::AwaitingActionChallenge);
        assert_eq!(view.action, Some(ActionKind::Tax));
        assert_eq!(view.actor.as_deref(), Some("ann"));
        assert_eq!(view.prompt, Prompt::Respond);
        assert_eq!(view.log, vec!["ann declares Tax".to_string()]);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["seats"][0].get("hand").is_none());
    }
}
