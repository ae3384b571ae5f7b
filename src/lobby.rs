//! Request level entry points. Each call on a game is serialized:
//! load, mutate a copy, save, then tell everybody at the table.

use std::collections::HashMap;
use std::sync::Arc;
use log::{error, info, warn};
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::action::Move;
use crate::config::Config;
use crate::error::CoupError;
use crate::game::Game;
use crate::notify::{Event, Hub};
use crate::store::Store;
use crate::view::View;

const ID_LEN: usize = 8;

/// The caller's view after a request. `notice` explains a rejected move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub view: View,
    pub notice: Option<String>,
}

pub struct Lobby<S: Store> {
    store: S,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    hub: Hub,
    config: Config,
}

impl<S: Store> Lobby<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            hub: Hub::new(),
            config,
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(id.to_string()).or_default().clone()
    }

    /// Opens an empty game for `player_count` seats and returns its id.
    pub async fn create(&self, player_count: usize) -> Result<String, CoupError> {
        let mut id = new_id();
        while self.store.load(&id)?.is_some() {
            id = new_id();
        }

        let game = Game::create(id.clone(), player_count, self.config.rules.clone())?;
        self.store.save(&id, &game.to_json()?)?;
        info!("created game {id} for {player_count} players");
        Ok(id)
    }

    pub async fn join(&self, id: &str, name: &str) -> Result<Reply, CoupError> {
        self.commit(id, name, |game, rng| game.add_player(name, rng)).await
    }

    /// Submits `mv`. When `seen` is given it must be the version the client last saw,
    /// anything older is rejected so a client never acts on a stale board.
    pub async fn play(&self, id: &str, mv: Move, seen: Option<u64>) -> Result<Reply, CoupError> {
        let name = mv.player().to_string();
        self.commit(id, &name, |game, rng| {
            if let Some(seen) = seen {
                if seen != game.version() {
                    return Err(CoupError::IllegalTransition(format!(
                        "move made against version {seen}, the game is at {}", game.version()
                    )));
                }
            }
            game.play(mv, rng)
        }).await
    }

    pub async fn view(&self, id: &str, name: &str) -> Result<View, CoupError> {
        View::of(&self.snapshot(id)?, name)
    }

    /// Waits for the next change to the game, up to the configured poll timeout.
    /// `None` means nothing happened, the client should ask again.
    /// A finished game answers at once with its final state.
    pub async fn poll(&self, id: &str, name: &str) -> Result<Option<Event>, CoupError> {
        let game = self.snapshot(id)?;
        game.board().player(name)?;
        if game.winner().is_some() {
            return Ok(Some(Event::of(&game)));
        }
        Ok(self.hub.wait(id, name, self.config.poll_timeout()).await)
    }

    pub fn snapshot(&self, id: &str) -> Result<Game, CoupError> {
        match self.store.load(id)? {
            Some(json) => Game::from_json(&json),
            None => Err(CoupError::NotFound(format!("no game {id}"))),
        }
    }

    async fn commit<F>(&self, id: &str, name: &str, change: F) -> Result<Reply, CoupError>
    where
        F: FnOnce(&mut Game, &mut rand::rngs::ThreadRng) -> Result<(), CoupError>,
    {
        // unknown ids stop here, before a lock is registered for them
        let loaded = self.snapshot(id)?;
        // a finished game never changes again, so it needs no lock
        let (current, _guard) = if loaded.winner().is_some() {
            (loaded, None)
        } else {
            let guard = self.lock_for(id).lock_owned().await;
            (self.snapshot(id)?, Some(guard))
        };

        let mut next = current.clone();
        let outcome = change(&mut next, &mut rand::thread_rng());

        match outcome {
            Ok(()) => {
                self.store.save(id, &next.to_json()?)?;
                self.hub.publish(next.player_names(), Event::of(&next));
                if next.winner().is_some() {
                    self.retire(id);
                }
                Ok(Reply { view: View::of(&next, name)?, notice: None })
            }
            Err(err) if err.is_recoverable() => {
                warn!("game {id}: rejected request from {name}: {err}");
                match View::of(&current, name) {
                    Ok(view) => Ok(Reply { view, notice: Some(err.to_string()) }),
                    Err(_) => Err(err),
                }
            }
            Err(err @ CoupError::NotFound(_)) => {
                warn!("game {id}: request from {name} failed: {err}");
                Err(err)
            }
            Err(err) => {
                error!("game {id}: request from {name} failed: {err}");
                Err(err)
            }
        }
    }

    /// Forgets the lock and mailboxes of a finished game. Anyone already waiting still gets the final event.
    fn retire(&self, id: &str) {
        self.locks.lock().remove(id);
        self.hub.retire(id);
        info!("game {id} is finished, retired its lock and mailboxes");
    }
}

fn new_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;
    use crate::action::{ActionKind, Move};
    use crate::config::Config;
    use crate::error::CoupError;
    use crate::lobby::Lobby;
    use crate::store::{MemoryStore, Store};
    use crate::turn::Status;
    use crate::view::Prompt;

    fn quick() -> Config {
        Config { poll_timeout_secs: 1, ..Config::default() }
    }

    async fn seated(lobby: &Lobby<MemoryStore>, names: &[&str]) -> String {
        let id = lobby.create(names.len()).await.unwrap();
        for name in names {
            let reply = lobby.join(&id, name).await.unwrap();
            assert_eq!(reply.notice, None);
        }
        id
    }

    #[tokio::test]
    async fn joining_and_playing() {
        let lobby = Lobby::new(MemoryStore::new(), quick());
        let id = lobby.create(2).await.unwrap();
        assert_eq!(id.len(), 8);

        let reply = lobby.join(&id, "ann").await.unwrap();
        assert_eq!(reply.view.missing, 1);
        assert_eq!(reply.view.prompt, Prompt::Wait);

        let reply = lobby.join(&id, "ann").await.unwrap();
        assert!(reply.notice.unwrap().contains("taken"));
        assert!(matches!(lobby.join(&id, "no one").await, Err(CoupError::Validation(_))));

        lobby.join(&id, "bob").await.unwrap();
        let view = lobby.view(&id, "ann").await.unwrap();
        assert_eq!(view.prompt, Prompt::Declare);

        let reply = lobby.play(&id, Move::Declare("ann".into(), ActionKind::Income, None), Some(view.version)).await.unwrap();
        assert_eq!(reply.notice, None);
        assert_eq!(reply.view.money, 3);
        assert_eq!(reply.view.status, Status::AwaitingAcknowledgement);

        let event = lobby.poll(&id, "bob").await.unwrap().unwrap();
        assert_eq!(event.version, reply.view.version);
        assert_eq!(event.status, Status::AwaitingAcknowledgement);
    }

    #[tokio::test]
    async fn rejected_moves_leave_the_game_alone() {
        let lobby = Lobby::new(MemoryStore::new(), quick());
        let id = seated(&lobby, &["ann", "bob"]).await;
        let before = lobby.snapshot(&id).unwrap();

        let reply = lobby.play(&id, Move::Declare("bob".into(), ActionKind::Income, None), None).await.unwrap();
        assert!(reply.notice.is_some());
        assert_eq!(reply.view.version, before.version());
        assert_eq!(lobby.snapshot(&id).unwrap(), before);

        let stale = before.version() - 1;
        let reply = lobby.play(&id, Move::Declare("ann".into(), ActionKind::Income, None), Some(stale)).await.unwrap();
        assert!(reply.notice.unwrap().contains("version"));
        assert_eq!(lobby.snapshot(&id).unwrap(), before);

        let outsider = lobby.play(&id, Move::Pass("zed".into()), None).await;
        assert!(matches!(outsider, Err(CoupError::NotFound(_))));
    }

    #[tokio::test]
    async fn unknown_games() {
        let lobby = Lobby::new(MemoryStore::new(), quick());
        assert!(matches!(lobby.join("nope", "ann").await, Err(CoupError::NotFound(_))));
        assert!(matches!(lobby.poll("nope", "ann").await, Err(CoupError::NotFound(_))));
        assert!(matches!(lobby.view("nope", "ann").await, Err(CoupError::NotFound(_))));
    }

    #[tokio::test]
    async fn poll_times_out_quietly() {
        let lobby = Lobby::new(MemoryStore::new(), quick());
        let id = seated(&lobby, &["ann", "bob"]).await;
        // drain the join notifications
        lobby.poll(&id, "ann").await.unwrap();

        let started = std::time::Instant::now();
        assert_eq!(lobby.poll(&id, "ann").await.unwrap(), None);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acknowledgements_finish_the_turn_once() {
        let lobby = Arc::new(Lobby::new(MemoryStore::new(), quick()));
        let id = seated(&lobby, &["ann", "bob", "cat"]).await;
        lobby.play(&id, Move::Declare("ann".into(), ActionKind::Income, None), None).await.unwrap();

        let handles: Vec<_> = ["ann", "bob", "cat"]
            .into_iter()
            .map(|name| {
                let lobby = lobby.clone();
                let id = id.clone();
                tokio::spawn(async move { lobby.play(&id, Move::Acknowledge(name.into()), None).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().notice, None);
        }

        let game = lobby.snapshot(&id).unwrap();
        assert_eq!(game.turn_number(), 1);
        assert_eq!(game.current_player(), Some("bob"));
        assert_eq!(game.turn().status(), Status::AwaitingAction);
    }

    #[tokio::test]
    async fn unknown_ids_register_nothing() {
        let lobby = Lobby::new(MemoryStore::new(), quick());
        for n in 0..1000 {
            let id = format!("bogus{n}");
            assert!(matches!(lobby.join(&id, "ann").await, Err(CoupError::NotFound(_))));
            assert!(matches!(lobby.play(&id, Move::Pass("ann".into()), None).await, Err(CoupError::NotFound(_))));
        }
        assert!(lobby.locks.lock().is_empty());
        assert!(lobby.hub().is_empty());
    }

    #[tokio::test]
    async fn finished_games_are_retired() {
        let lobby = Lobby::new(MemoryStore::new(), quick());
        let id = seated(&lobby, &["ann", "bob"]).await;
        assert_eq!(lobby.locks.lock().len(), 1);

        let mut rng = Pcg64::seed_from_u64(7);
        for _ in 0..5000 {
            let game = lobby.snapshot(&id).unwrap();
            if game.winner().is_some() {
                break;
            }
            let mv = game.moves().choose(&mut rng).cloned().unwrap();
            assert_eq!(lobby.play(&id, mv, None).await.unwrap().notice, None);
        }

        let game = lobby.snapshot(&id).unwrap();
        let winner = game.winner().unwrap().to_string();
        assert!(lobby.locks.lock().is_empty());
        assert!(lobby.hub().is_empty());

        let event = lobby.poll(&id, &winner).await.unwrap().unwrap();
        assert_eq!(event.version, game.version());

        let reply = lobby.play(&id, Move::Pass(winner), None).await.unwrap();
        assert!(reply.notice.unwrap().contains("already won"));
        assert!(lobby.locks.lock().is_empty());
        assert!(lobby.hub().is_empty());
        assert_eq!(lobby.snapshot(&id).unwrap(), game);
    }

    struct Broken;

    impl Store for Broken {
        fn load(&self, _id: &str) -> Result<Option<String>, CoupError> {
            Ok(None)
        }

        fn save(&self, _id: &str, _data: &str) -> Result<(), CoupError> {
            Err(CoupError::Storage("disk full".into()))
        }
    }

    #[tokio::test]
    async fn storage_failures_surface() {
        let lobby = Lobby::new(Broken, quick());
        let err = lobby.create(2).await.unwrap_err();
        assert!(matches!(err, CoupError::Storage(_)));
        assert!(!err.is_recoverable());
    }
}
