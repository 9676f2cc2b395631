//! # Watcher Scheduling
//!
//! One cancellable polling task per `(connection, kind)`. Arming a key that
//! is already armed cancels the old task first, so there is never more than
//! one live loop per key.
//!
//! ```text
//!   arm(key) ──▶ tick(token) ──Some(delay)──▶ select! { cancelled, sleep(delay) } ──┐
//!                   ▲                                                              │
//!                   └──────────────────────────────────────────────────────────────┘
//!                   │ None / cancelled
//!                   ▼
//!                  exit
//! ```
//!
//! A loop that stops on its own cancels its token, so it no longer counts
//! as armed. An in-flight tick is never interrupted. A tick receives its loop's
//! token and must check it after every await before applying anything; once
//! the tick returns, a cancelled loop exits without scheduling another.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatcherKind {
    Account,
    Balance,
}

impl std::fmt::Display for WatcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::Balance => write!(f, "balance"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatcherKey {
    pub connection: String,
    pub kind: WatcherKind,
}

impl WatcherKey {
    pub fn new(connection: &str, kind: WatcherKind) -> Self {
        Self {
            connection: connection.to_string(),
            kind,
        }
    }
}

struct Armed {
    token: CancellationToken,
    // Kept so the task is owned; cancellation goes through the token.
    _task: JoinHandle<()>,
}

#[derive(Default)]
pub struct Watchers {
    armed: Mutex<HashMap<WatcherKey, Armed>>,
}

impl Watchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a loop for `key`, superseding any loop already armed for it.
    ///
    /// The first tick runs immediately. Each tick returns the delay until
    /// the next one, or `None` to stop the loop.
    pub fn arm<F, Fut>(&self, key: WatcherKey, mut tick: F)
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let loop_token = token.clone();
        let label = key.clone();

        let task = tokio::spawn(async move {
            while !loop_token.is_cancelled() {
                let Some(delay) = tick(loop_token.clone()).await else {
                    break;
                };
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            // A loop that stopped itself must not read as armed.
            loop_token.cancel();
            debug!(connection = %label.connection, kind = %label.kind, "watcher stopped");
        });

        let mut armed = self.armed.lock();
        armed.retain(|_, entry| !entry.token.is_cancelled());
        if let Some(previous) = armed.insert(
            key,
            Armed {
                token,
                _task: task,
            },
        ) {
            previous.token.cancel();
        }
    }

    pub fn cancel(&self, key: &WatcherKey) -> bool {
        match self.armed.lock().remove(key) {
            Some(armed) => {
                armed.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel both loops of one connection.
    pub fn cancel_connection(&self, connection: &str) {
        self.armed.lock().retain(|key, armed| {
            if key.connection == connection {
                armed.token.cancel();
                false
            } else {
                true
            }
        });
    }

    pub fn cancel_all(&self) {
        for (_, armed) in self.armed.lock().drain() {
            armed.token.cancel();
        }
    }

    pub fn is_armed(&self, key: &WatcherKey) -> bool {
        self.armed
            .lock()
            .get(key)
            .is_some_and(|armed| !armed.token.is_cancelled())
    }

    /// Number of loops still running.
    pub fn len(&self) -> usize {
        self.armed
            .lock()
            .values()
            .filter(|armed| !armed.token.is_cancelled())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Watchers {
    fn drop(&mut self) {
        for (_, armed) in self.armed.get_mut().drain() {
            armed.token.cancel();
        }
    }
}
