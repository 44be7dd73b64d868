//! Small awaitable primitives the engine builds its state machine on.

use std::future::Future;

use tokio::sync::{watch, Mutex};

/// A level-triggered boolean flag tasks can wait on.
///
/// `set`/`clear` report whether the call actually changed state, so callers
/// can emit edge-triggered events exactly once even when handlers race.
#[derive(Debug)]
pub struct Flag {
    tx: watch::Sender<bool>,
}

impl Flag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Raise the flag. Returns `true` iff it was previously clear.
    pub fn set(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Lower the flag. Returns `true` iff it was previously set.
    pub fn clear(&self) -> bool {
        self.tx.send_replace(false)
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the flag is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`; an error here is unreachable
        // while the flag exists, so a silent return is fine.
        let _ = rx.wait_for(|set| *set).await;
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::new()
    }
}

/// Coalesces concurrent invocations of one recovery action into a single
/// in-flight run: the first caller runs the operation, later callers attach
/// to it and resume when the same run finishes.
#[derive(Debug, Default)]
pub struct Singleflight {
    inflight: Mutex<Option<watch::Receiver<bool>>>,
}

enum Role {
    Leader(watch::Sender<bool>),
    Follower(watch::Receiver<bool>),
}

impl Singleflight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<Fut>(&self, op: impl FnOnce() -> Fut)
    where
        Fut: Future<Output = ()>,
    {
        let role = {
            let mut slot = self.inflight.lock().await;
            match slot.as_ref() {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(false);
                    *slot = Some(rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                op().await;
                *self.inflight.lock().await = None;
                let _ = tx.send(true);
            }
            Role::Follower(mut rx) => {
                // If the leader is cancelled mid-run its sender drops and
                // `wait_for` errors; followers resume rather than hang.
                let _ = rx.wait_for(|done| *done).await;
            }
        }
    }
}
