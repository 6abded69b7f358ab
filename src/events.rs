use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::domains::diff::entity::DiffSide;

/// Notifications published by the session layer for editor-side consumers
/// (taggers, margins, status bars).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// The current session was replaced or cleared. Carries the pull request
    /// number of the new session, if any.
    SessionChanged { pull_request: Option<u64> },
    /// The session's pull request model changed and cached files were
    /// recomputed.
    PullRequestUpdated { number: u64 },
    /// The set of anchored lines for one file changed. Consumers refresh only
    /// the listed `(line, side)` pairs.
    LinesChanged {
        path: String,
        lines: Vec<(u32, DiffSide)>,
    },
}

impl SessionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEvent::SessionChanged { .. } => "revanchor:session-changed",
            SessionEvent::PullRequestUpdated { .. } => "revanchor:pull-request-updated",
            SessionEvent::LinesChanged { .. } => "revanchor:lines-changed",
        }
    }
}

type Listener = Box<dyn Fn(&SessionEvent) + Send + Sync>;

/// Synchronous listener registry.
///
/// Events are delivered on the emitting task, in registration order, before
/// `emit` returns. There is no cross-process concern here, so a listener list
/// with a documented delivery order replaces a full pub/sub bus.
#[derive(Default)]
pub struct EventHub {
    listeners: Mutex<Vec<Listener>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        let mut listeners = match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.push(Box::new(listener));
    }

    pub fn emit(&self, event: &SessionEvent) {
        let listeners = match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for listener in listeners.iter() {
            listener(event);
        }
    }
}
