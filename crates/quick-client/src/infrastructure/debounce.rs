//! Trailing-edge debounce timer.
//!
//! Each [`Debouncer::schedule`] call replaces the pending callback, so only
//! the last call of a burst runs, `delay` after it was made.  Dropping the
//! debouncer cancels whatever is still pending.
//!
//! [`ResizeQueue`] applies the timer to console resize events: a burst of
//! sizes comes out as the last one.

use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use quick_core::TerminalSize;

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Runs `callback` after the delay unless another call comes first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            callback();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Debounced console sizes for a session loop.
#[derive(Debug)]
pub struct ResizeQueue {
    debouncer: Debouncer,
    tx: UnboundedSender<TerminalSize>,
    rx: UnboundedReceiver<TerminalSize>,
}

impl ResizeQueue {
    pub fn new(delay: Duration) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            debouncer: Debouncer::new(delay),
            tx,
            rx,
        }
    }

    /// Records a resize.  Replaces any size still waiting for the delay.
    pub fn push(&mut self, size: TerminalSize) {
        let tx = self.tx.clone();
        self.debouncer.schedule(move || {
            let _ = tx.send(size);
        });
    }

    /// The next settled size.  Never resolves to `None` while the queue is
    /// alive, so it can sit in a `select!` branch.
    pub async fn next(&mut self) -> Option<TerminalSize> {
        self.rx.recv().await
    }

    pub fn cancel(&mut self) {
        self.debouncer.cancel();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
