use std::env;
use anyhow::{bail, Context};
use log::info;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use coup_session::{Config, FileStore, Game, Lobby, MemoryStore, Store};

const MAX_MOVES: usize = 10_000;

/// Random bots play one game through the lobby.
/// Usage: coup-session [players] [seed]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::var("COUP_CONFIG") {
        Ok(path) => Config::load(&path).with_context(|| format!("loading config from {path}"))?,
        Err(_) => Config::default(),
    };

    let mut args = env::args().skip(1);
    let players: usize = args.next().map(|arg| arg.parse()).transpose().context("player count")?.unwrap_or(4);
    let seed: u64 = args.next().map(|arg| arg.parse()).transpose().context("seed")?.unwrap_or(0);

    match config.store_dir.clone() {
        Some(dir) => run(Lobby::new(FileStore::open(dir)?, config), players, seed).await,
        None => run(Lobby::new(MemoryStore::new(), config), players, seed).await,
    }
}

async fn run<S: Store>(lobby: Lobby<S>, players: usize, seed: u64) -> anyhow::Result<()> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let id = lobby.create(players).await?;
    for seat in 0..players {
        lobby.join(&id, &format!("bot{seat}")).await?;
    }

    for _ in 0..MAX_MOVES {
        let game: Game = lobby.snapshot(&id)?;
        if let Some(winner) = game.winner() {
            info!("game {id} finished after {} turns", game.turn_number());
            println!("{winner} wins");
            return Ok(());
        }

        let Some(mv) = game.moves().choose(&mut rng).cloned() else {
            bail!("no legal moves in game {id} at version {}", game.version());
        };
        let reply = lobby.play(&id, mv, Some(game.version())).await?;
        if let Some(notice) = reply.notice {
            bail!("a generated move was rejected: {notice}");
        }
    }

    bail!("game {id} did not finish within {MAX_MOVES} moves")
}
