//! Connection lifecycle state machine.
//!
//! Both adapters (graphical tunnel and terminal) drive the same six-state
//! machine.  The numeric codes match the ones the display tunnel reports in
//! its state-change events.
//!
//! ```text
//!  IDLE(0) ──→ CONNECTING(1) ──→ WAITING(2) ──→ CONNECTED(3)
//!                   │                │               │
//!                   └────────────────┴──→ DISCONNECTING(4) ──→ DISCONNECTED(5)
//!                                    (any later state may jump to 5)
//! ```
//!
//! # Rules
//!
//! - From `Idle`, only `Connecting` is accepted.
//! - Otherwise only strictly forward moves are accepted.
//! - `Disconnected` is terminal: the session object cannot be reused.
//! - Re-entering the current state is a silent no-op.
//! - A numeric code outside `0..=5` is ignored.
//!
//! Each accepted transition yields the [`Notice`]s the front end must show.

use thiserror::Error;
use tracing::info;

use crate::notice::Notice;

/// One of the six connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Waiting = 2,
    Connected = 3,
    Disconnecting = 4,
    Disconnected = 5,
}

impl ConnectionState {
    /// Converts a numeric state code.  Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            1 => Some(Self::Connecting),
            2 => Some(Self::Waiting),
            3 => Some(Self::Connected),
            4 => Some(Self::Disconnecting),
            5 => Some(Self::Disconnected),
            _ => None,
        }
    }

    /// The notices shown when this state is entered.
    pub fn entry_notices(self) -> Vec<Notice> {
        match self {
            Self::Idle => vec![Notice::loading("Initializing...")],
            Self::Connecting => vec![Notice::loading("Connecting...")],
            Self::Waiting => vec![Notice::loading("Waiting...")],
            Self::Connected => vec![Notice::DismissModals, Notice::success("Connection success")],
            Self::Disconnecting => Vec::new(),
            Self::Disconnected => vec![Notice::info("Connection closed")],
        }
    }

    /// `true` for the terminal state.
    pub fn is_terminal(self) -> bool {
        self == Self::Disconnected
    }
}

/// A transition that the state machine refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("illegal transition {from:?} → {to:?}")]
    IllegalTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
    #[error("session already disconnected; cannot enter {0:?}")]
    Terminated(ConnectionState),
}

/// The authoritative connection state of one session.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
}

impl Default for ConnectionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionLifecycle {
    /// Creates a lifecycle in `Idle`.
    ///
    /// Call [`ConnectionLifecycle::initial_notices`] once to show the
    /// "Initializing..." message that belongs to the initial state.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// `true` once `Disconnected` has been entered.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Notices for the initial `Idle` state.
    pub fn initial_notices(&self) -> Vec<Notice> {
        ConnectionState::Idle.entry_notices()
    }

    /// Moves to `next` and returns the notices to show.
    ///
    /// Re-entering the current state returns `Ok` with no notices.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::Terminated`] once the session is disconnected.
    /// - [`LifecycleError::IllegalTransition`] for any backward move, or any
    ///   move out of `Idle` other than to `Connecting`.
    pub fn transition(&mut self, next: ConnectionState) -> Result<Vec<Notice>, LifecycleError> {
        let current = self.state;
        if current == next {
            return Ok(Vec::new());
        }
        if current.is_terminal() {
            return Err(LifecycleError::Terminated(next));
        }
        let allowed = match current {
            ConnectionState::Idle => next == ConnectionState::Connecting,
            _ => next > current,
        };
        if !allowed {
            return Err(LifecycleError::IllegalTransition {
                from: current,
                to: next,
            });
        }

        info!("connection state {current:?} → {next:?}");
        self.state = next;
        Ok(next.entry_notices())
    }

    /// Applies a numeric state code reported by a transport.
    ///
    /// Unknown codes are ignored and yield `Ok` with no notices.
    ///
    /// # Errors
    ///
    /// Same as [`ConnectionLifecycle::transition`].
    pub fn apply_code(&mut self, code: i32) -> Result<Vec<Notice>, LifecycleError> {
        match ConnectionState::from_code(code) {
            Some(next) => self.transition(next),
            None => {
                tracing::debug!("ignoring unknown connection state code {code}");
                Ok(Vec::new())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
