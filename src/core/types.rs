//! Shared types used across Webpilot modules
//!
//! Contains the session snapshot, progress events, and common data types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Browser engine requested from the automation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    /// Wire representation expected by the service
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BrowserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" | "safari" => Ok(BrowserKind::Webkit),
            other => Err(format!("unknown browser type: {}", other)),
        }
    }
}

/// Local snapshot of a server-side automation session
///
/// Created by a successful start call, mutated only by status refreshes,
/// and discarded when stop succeeds or a refresh reports it inactive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Server-assigned opaque identifier
    pub id: String,
    /// Whether the server still considers the session live
    pub is_active: bool,
    /// Browser engine backing the session
    pub browser_type: BrowserKind,
    /// Whether the remote browser runs headless
    pub headless: bool,
    /// URL the remote browser is currently on, if any
    pub current_url: Option<String>,
    /// Unix timestamp of the last server-side activity
    pub last_activity: Option<f64>,
    /// Commands queued server-side that have not completed
    pub pending_commands: u32,
    /// Most recent screenshot captured for this session
    pub screenshot_path: Option<String>,
}

impl Session {
    /// Fresh snapshot as returned by a successful start call
    pub fn started(id: impl Into<String>, browser_type: BrowserKind, headless: bool) -> Self {
        Self {
            id: id.into(),
            is_active: true,
            browser_type,
            headless,
            current_url: None,
            last_activity: None,
            pending_commands: 0,
            screenshot_path: None,
        }
    }
}

/// Options for creating a session, forwarded to the start call
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub browser_type: BrowserKind,
    pub headless: bool,
    /// Global timeout in seconds applied server-side
    pub timeout_secs: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            browser_type: BrowserKind::Chromium,
            headless: false,
            timeout_secs: 30,
        }
    }
}

/// Outcome of a single observed sub-action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    InProgress,
    Completed,
    Failed,
}

/// One entry per observed sub-action during command polling
///
/// The latest poll's full set replaces the previous one; the sequence is
/// causal per command, not strictly append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Action label, e.g. "navigate" or "click"
    pub action: String,
    pub outcome: ActionOutcome,
    /// Optional human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    /// Event for an action still running
    pub fn in_progress(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            outcome: ActionOutcome::InProgress,
            message: None,
        }
    }

    /// Event for a finished sub-action
    pub fn finished(action: impl Into<String>, success: bool, message: Option<String>) -> Self {
        Self {
            action: action.into(),
            outcome: if success {
                ActionOutcome::Completed
            } else {
                ActionOutcome::Failed
            },
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_kind_parse() {
        assert_eq!("chromium".parse::<BrowserKind>(), Ok(BrowserKind::Chromium));
        assert_eq!("Firefox".parse::<BrowserKind>(), Ok(BrowserKind::Firefox));
        assert!("netscape".parse::<BrowserKind>().is_err());
    }

    #[test]
    fn test_session_started_snapshot() {
        let session = Session::started("s-1", BrowserKind::Firefox, true);
        assert!(session.is_active);
        assert_eq!(session.pending_commands, 0);
        assert!(session.current_url.is_none());
    }

    #[test]
    fn test_progress_event_outcomes() {
        let event = ProgressEvent::finished("navigate", false, Some("timed out".into()));
        assert_eq!(event.outcome, ActionOutcome::Failed);
        assert_eq!(ProgressEvent::in_progress("click").outcome, ActionOutcome::InProgress);
    }
}
