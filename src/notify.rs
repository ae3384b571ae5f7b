//! Per player mailboxes telling waiting clients that a game changed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Instant;
use crate::game::Game;
use crate::turn::Status;

/// "The game changed, reload it."
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub game_id: String,
    pub version: u64,
    pub status: Status,
}

impl Event {
    pub fn of(game: &Game) -> Self {
        Self {
            game_id: game.id().to_string(),
            version: game.version(),
            status: game.turn().status(),
        }
    }
}

#[derive(Debug, Default)]
struct Mailbox {
    // at most one pending event, a newer one replaces it
    slot: Mutex<Option<Event>>,
    notify: Notify,
}

impl Mailbox {
    fn take(&self) -> Option<Event> {
        self.slot.lock().take()
    }
}

#[derive(Debug, Default)]
pub struct Hub {
    mailboxes: Mutex<HashMap<(String, String), Arc<Mailbox>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn mailbox(&self, game_id: &str, player: &str) -> Arc<Mailbox> {
        self.mailboxes
            .lock()
            .entry((game_id.to_string(), player.to_string()))
            .or_default()
            .clone()
    }

    /// Drops `event` into every listed player's mailbox, replacing anything unread.
    pub fn publish<'a>(&self, players: impl IntoIterator<Item=&'a str>, event: Event) {
        for player in players {
            let mailbox = self.mailbox(&event.game_id, player);
            *mailbox.slot.lock() = Some(event.clone());
            mailbox.notify.notify_waiters();
        }
    }

    /// Waits until an event is delivered or `timeout` passes, then consumes it.
    /// Dropping the future early loses nothing, the event stays in the mailbox.
    pub async fn wait(&self, game_id: &str, player: &str, timeout: Duration) -> Option<Event> {
        let mailbox = self.mailbox(game_id, player);
        let deadline = Instant::now() + timeout;

        loop {
            let notified = mailbox.notify.notified();
            tokio::pin!(notified);
            // register before looking so a publish in between still wakes us
            notified.as_mut().enable();

            if let Some(event) = mailbox.take() {
                return Some(event);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return mailbox.take();
            }
        }
    }

    pub fn pending(&self, game_id: &str, player: &str) -> bool {
        self.mailboxes
            .lock()
            .get(&(game_id.to_string(), player.to_string()))
            .is_some_and(|mailbox| mailbox.slot.lock().is_some())
    }

    /// Drops every mailbox of `game_id`. Waiters already inside `wait` keep theirs until they return.
    pub fn retire(&self, game_id: &str) {
        self.mailboxes.lock().retain(|(game, _), _| game != game_id);
    }

    pub fn len(&self) -> usize {
        self.mailboxes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mailboxes.lock().is_empty()
    }
}
