//! Presentation seam for streaming sessions.
//!
//! The session controller never touches output directly; it reports
//! through a [`FeedbackSink`], so the pipeline runs unchanged under a
//! terminal, an HTML view, or a test collector.

use std::fmt;
use std::io::Write;

/// Lifecycle states of one feedback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Completed,
    /// Cancelled by the user; an expected, non-exceptional exit
    Stopped,
    Errored,
}

impl SessionState {
    /// Terminal states allow a reset back to `Idle`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Stopped | SessionState::Errored
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Stopped => write!(f, "stopped"),
            SessionState::Errored => write!(f, "errored"),
        }
    }
}

/// Receives session output and status updates
pub trait FeedbackSink: Send + Sync {
    /// A new text delta was appended; `document` is the full
    /// accumulated markdown after the append.
    fn on_content(&self, delta: &str, document: &str);

    /// Human-readable progress text changed
    fn on_status(&self, status: &str);

    /// The session moved to a new lifecycle state
    fn on_state_change(&self, state: SessionState);

    /// Non-blocking warning (e.g. persistence failed after completion)
    fn on_warning(&self, message: &str) {
        let _ = message;
    }
}

/// Writes deltas to stdout as they arrive; status goes to stderr so
/// piped output stays clean markdown.
#[derive(Default)]
pub struct TerminalSink;

impl FeedbackSink for TerminalSink {
    fn on_content(&self, delta: &str, _document: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
    }

    fn on_status(&self, status: &str) {
        eprintln!("[{status}]");
    }

    fn on_state_change(&self, state: SessionState) {
        tracing::debug!(%state, "session state changed");
    }

    fn on_warning(&self, message: &str) {
        eprintln!("warning: {message}");
    }
}

/// Collects everything it receives; test helper.
#[cfg(test)]
#[derive(Default)]
pub struct CollectingSink {
    pub deltas: std::sync::Mutex<Vec<String>>,
    pub statuses: std::sync::Mutex<Vec<String>>,
    pub states: std::sync::Mutex<Vec<SessionState>>,
    pub warnings: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl FeedbackSink for CollectingSink {
    fn on_content(&self, delta: &str, _document: &str) {
        self.deltas.lock().unwrap().push(delta.to_string());
    }

    fn on_status(&self, status: &str) {
        self.statuses.lock().unwrap().push(status.to_string());
    }

    fn on_state_change(&self, state: SessionState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}
