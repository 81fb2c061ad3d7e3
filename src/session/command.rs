//! Command orchestration
//!
//! Submits a natural-language command against the active session and drives a
//! serialized polling loop until the command reaches a terminal state:
//!
//! `SUBMITTED -> POLLING -> {COMPLETED, FAILED, ABANDONED}`
//!
//! State transitions are pure functions on [`CommandRecord`]; the async loop
//! only fetches and applies. Each tick performs one command status fetch plus
//! one session status refresh (which feeds the captcha gate). Ticks are
//! serialized per command, so overlapping fetches for the same command cannot
//! occur. A transport error during a tick is a non-fatal progress update;
//! only a terminal status, teardown, or the bounded failure budget stops the
//! loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::wire::{
    ActionResult, CommandStatusResponse, ExecuteCommandRequest, ExecuteCommandResponse,
};
use crate::client::AutomationApi;
use crate::core::{Config, ProgressEvent, Result, WebpilotError};
use crate::session::manager::SessionManager;

/// Lifecycle phase of a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPhase {
    /// Accepted by the server, polling not yet started
    Submitted,
    /// Polling loop active
    Polling,
    /// Terminal: command and task finished successfully
    Completed,
    /// Terminal: explicit failure from the server or exhausted poll budget
    Failed,
    /// Terminal: caller abandoned polling before completion
    Abandoned,
}

impl CommandPhase {
    /// Whether no further transition may occur from this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }
}

/// Recorded state of one submitted command
#[derive(Debug, Clone)]
pub struct CommandRecord {
    /// Server-assigned identifier, absent for synchronous-complete responses
    /// that never entered polling
    pub command_id: Option<String>,
    /// Owning session
    pub session_id: String,
    /// The instruction as submitted
    pub input: String,
    pub phase: CommandPhase,
    /// Running explanation text from the server
    pub explanation: Option<String>,
    /// Latest observed sub-action outcomes; replaced wholesale each tick
    pub progress: Vec<ProgressEvent>,
    /// Most recent screenshot reference, passed through unmodified
    pub screenshot_path: Option<String>,
    /// Failure description for the FAILED phase
    pub error: Option<String>,
}

impl CommandRecord {
    fn new(session_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            command_id: None,
            session_id: session_id.into(),
            input: input.into(),
            phase: CommandPhase::Submitted,
            explanation: None,
            progress: Vec::new(),
            screenshot_path: None,
            error: None,
        }
    }

    /// Apply one poll response. Returns true once the record is terminal.
    ///
    /// Terminal records are never mutated, even by late responses.
    pub fn apply_poll(&mut self, response: &CommandStatusResponse) -> bool {
        if self.phase.is_terminal() {
            return true;
        }

        if response.is_failure() {
            let message = response
                .message
                .clone()
                .or_else(|| response.result.as_ref().and_then(|r| r.explanation.clone()))
                .unwrap_or_else(|| "command failed".to_string());
            if let Some(result) = &response.result {
                self.progress = events_from_results(&result.results);
            }
            self.fail(message);
            return true;
        }

        if let Some(result) = &response.result {
            self.progress = events_from_results(&result.results);
            if result.explanation.is_some() {
                self.explanation = result.explanation.clone();
            }
            if result.screenshot_path.is_some() {
                self.screenshot_path = result.screenshot_path.clone();
            }
        } else if let Some(progress) = &response.progress {
            if let Some(action) = &progress.last_action {
                self.progress = vec![ProgressEvent::in_progress(action)];
            }
            if progress
                .current_explanation
                .as_ref()
                .is_some_and(|e| !e.is_empty())
            {
                self.explanation = progress.current_explanation.clone();
            }
        }

        if response.screenshot_path.is_some() {
            self.screenshot_path = response.screenshot_path.clone();
        }

        if response.is_terminal_success() {
            self.phase = CommandPhase::Completed;
            return true;
        }

        self.phase = CommandPhase::Polling;
        false
    }

    /// Record a failed status fetch as a non-fatal progress update
    pub fn apply_poll_error(&mut self, message: &str) {
        if self.phase.is_terminal() {
            return;
        }
        self.progress = vec![ProgressEvent::finished(
            "status fetch",
            false,
            Some(message.to_string()),
        )];
    }

    /// Transition to FAILED with a description
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = CommandPhase::Failed;
        self.error = Some(message.into());
    }

    /// Transition to ABANDONED unless already terminal
    pub fn abandon(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = CommandPhase::Abandoned;
        }
    }

    /// One-line summary of the latest observed progress, for display
    pub fn progress_line(&self) -> String {
        if let Some(explanation) = self.explanation.as_deref() {
            if !explanation.is_empty() {
                return explanation.to_string();
            }
        }
        match self.progress.last() {
            Some(event) => match event.message.as_deref() {
                Some(message) if !message.is_empty() => {
                    format!("{}: {}", event.action, message)
                }
                _ => event.action.clone(),
            },
            None => String::new(),
        }
    }

    /// Apply a synchronous-complete submission response
    fn complete_sync(&mut self, response: &ExecuteCommandResponse) {
        if let Some(details) = &response.details {
            if let Some(results) = &details.results {
                self.progress = events_from_results(results);
            }
        }
        self.explanation = Some(response.message.clone());
        self.screenshot_path = response.screenshot_path.clone();

        if response.status == "error" {
            self.fail(response.message.clone());
        } else {
            self.phase = CommandPhase::Completed;
        }
    }
}

/// Convert server sub-action results into progress events
fn events_from_results(results: &[ActionResult]) -> Vec<ProgressEvent> {
    results
        .iter()
        .map(|r| {
            ProgressEvent::finished(
                r.command.as_deref().unwrap_or("action"),
                r.success,
                r.message.clone(),
            )
        })
        .collect()
}

/// Orchestrator that submits commands and drives their polling loops
pub struct CommandOrchestrator {
    api: Arc<dyn AutomationApi>,
    sessions: Arc<SessionManager>,
    poll_interval: Duration,
    max_consecutive_failures: u32,
    command_timeout_secs: u64,
}

impl CommandOrchestrator {
    /// Create an orchestrator from configuration
    pub fn new(api: Arc<dyn AutomationApi>, sessions: Arc<SessionManager>, config: &Config) -> Self {
        Self::with_settings(
            api,
            sessions,
            config.command_poll_interval(),
            config.polling.max_consecutive_failures,
            config.browser.command_timeout_secs,
        )
    }

    /// Create an orchestrator with explicit polling settings
    pub fn with_settings(
        api: Arc<dyn AutomationApi>,
        sessions: Arc<SessionManager>,
        poll_interval: Duration,
        max_consecutive_failures: u32,
        command_timeout_secs: u64,
    ) -> Self {
        Self {
            api,
            sessions,
            poll_interval,
            max_consecutive_failures,
            command_timeout_secs,
        }
    }

    /// Submit a natural-language command against the active session
    ///
    /// Rejects empty input and absent sessions with a validation error, and
    /// submission while the captcha gate is set with a captcha-pending error,
    /// all before any network call. If the response carries a command id and
    /// a pending status, a polling loop is spawned; otherwise the returned
    /// handle is already terminal.
    pub async fn submit(&self, text: &str) -> Result<CommandHandle> {
        let text = text.trim();
        if text.is_empty() {
            return Err(WebpilotError::validation("command text is empty"));
        }

        let session_id = self.sessions.ensure_submittable()?;

        let request = ExecuteCommandRequest {
            user_input: text.to_string(),
            timeout: self.command_timeout_secs,
        };

        let response = match self.api.execute_command(&session_id, &request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_session_lost() {
                    self.sessions.clear_if_current(&session_id);
                }
                return Err(e);
            }
        };

        let mut record = CommandRecord::new(&session_id, text);
        record.command_id = response
            .details
            .as_ref()
            .and_then(|d| d.command_id.clone());

        if response.status == "pending" {
            match record.command_id.clone() {
                Some(command_id) => {
                    record.phase = CommandPhase::Polling;
                    return Ok(self.spawn_poller(record, session_id, command_id));
                }
                None => {
                    // Pending without an id can never be polled to completion.
                    record.fail("server accepted the command but returned no command id");
                }
            }
        } else {
            record.complete_sync(&response);
        }

        Ok(CommandHandle {
            record: Arc::new(Mutex::new(record)),
            alive: Arc::new(AtomicBool::new(false)),
            poller: None,
        })
    }

    fn spawn_poller(
        &self,
        record: CommandRecord,
        session_id: String,
        command_id: String,
    ) -> CommandHandle {
        let record = Arc::new(Mutex::new(record));
        let alive = Arc::new(AtomicBool::new(true));

        let api = Arc::clone(&self.api);
        let sessions = Arc::clone(&self.sessions);
        let poll_record = Arc::clone(&record);
        let poll_alive = Arc::clone(&alive);
        let interval = self.poll_interval;
        let max_failures = self.max_consecutive_failures;

        let poller = tokio::spawn(async move {
            let mut consecutive_failures: u32 = 0;

            loop {
                tokio::time::sleep(interval).await;

                if !poll_alive.load(Ordering::SeqCst) {
                    break;
                }

                match api.command_status(&session_id, &command_id).await {
                    Ok(status) => {
                        consecutive_failures = 0;

                        // Re-check the invalidation flag after resuming: the
                        // handle may have been abandoned mid-fetch.
                        if !poll_alive.load(Ordering::SeqCst) {
                            break;
                        }

                        let terminal = lock(&poll_record).apply_poll(&status);
                        if terminal {
                            break;
                        }
                    }
                    Err(e) if e.is_session_lost() => {
                        sessions.clear_if_current(&session_id);
                        if poll_alive.load(Ordering::SeqCst) {
                            lock(&poll_record).fail(e.to_string());
                        }
                        break;
                    }
                    Err(e) => {
                        consecutive_failures += 1;

                        if !poll_alive.load(Ordering::SeqCst) {
                            break;
                        }

                        let mut record = lock(&poll_record);
                        if consecutive_failures >= max_failures {
                            record.fail(format!(
                                "polling gave up after {} consecutive failures: {}",
                                consecutive_failures, e
                            ));
                            break;
                        }
                        record.apply_poll_error(&e.to_string());
                    }
                }

                // Session refresh each tick keeps the captcha gate current.
                if !sessions.is_current(&session_id) {
                    lock(&poll_record).abandon();
                    break;
                }
                if let Err(e) = sessions.refresh().await {
                    if e.is_session_lost() {
                        if poll_alive.load(Ordering::SeqCst) {
                            lock(&poll_record).fail(e.to_string());
                        }
                        break;
                    }
                }
            }
        });

        CommandHandle {
            record,
            alive,
            poller: Some(poller),
        }
    }
}

fn lock(record: &Arc<Mutex<CommandRecord>>) -> MutexGuard<'_, CommandRecord> {
    record.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle to a submitted command and its polling loop
///
/// Dropping the handle abandons polling; a late response can never mutate the
/// record after that.
#[derive(Debug)]
pub struct CommandHandle {
    record: Arc<Mutex<CommandRecord>>,
    alive: Arc<AtomicBool>,
    poller: Option<JoinHandle<()>>,
}

impl CommandHandle {
    /// Snapshot of the current record
    pub fn snapshot(&self) -> CommandRecord {
        lock(&self.record).clone()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> CommandPhase {
        lock(&self.record).phase
    }

    /// Whether the command reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Server-assigned command id, if one was issued
    pub fn command_id(&self) -> Option<String> {
        lock(&self.record).command_id.clone()
    }

    /// Wait for the polling loop to finish and return the final record
    pub async fn wait(&mut self) -> CommandRecord {
        if let Some(poller) = self.poller.take() {
            // Abort shows up as a JoinError; the record already holds the
            // abandoned phase in that case.
            let _ = poller.await;
        }
        self.snapshot()
    }

    /// Abandon polling immediately
    ///
    /// Invalidates the handle and cancels the timer before any further
    /// suspension; the record transitions to ABANDONED unless already
    /// terminal.
    pub fn abandon(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        lock(&self.record).abandon();
    }
}

impl Drop for CommandHandle {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActionOutcome;

    fn poll_response(json: &str) -> CommandStatusResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_pending_then_completed_transitions() {
        let mut record = CommandRecord::new("s-1", "go to example.com");
        record.command_id = Some("c-1".into());
        record.phase = CommandPhase::Polling;

        let terminal = record.apply_poll(&poll_response(r#"{"status": "pending"}"#));
        assert!(!terminal);
        assert_eq!(record.phase, CommandPhase::Polling);

        let terminal = record.apply_poll(&poll_response(
            r#"{"status": "completed", "task_status": "completed",
                "result": {"explanation": "Navigated",
                           "results": [{"command": "navigate", "success": true}]}}"#,
        ));
        assert!(terminal);
        assert_eq!(record.phase, CommandPhase::Completed);
        assert_eq!(record.explanation.as_deref(), Some("Navigated"));
        assert_eq!(record.progress.len(), 1);
        assert_eq!(record.progress[0].outcome, ActionOutcome::Completed);
    }

    #[test]
    fn test_terminal_record_ignores_late_responses() {
        let mut record = CommandRecord::new("s-1", "task");
        record.fail("server error");

        let stale = poll_response(
            r#"{"status": "completed", "task_status": "completed",
                "result": {"explanation": "late arrival"}}"#,
        );
        assert!(record.apply_poll(&stale));
        assert_eq!(record.phase, CommandPhase::Failed);
        assert!(record.explanation.is_none());
    }

    #[test]
    fn test_completed_with_task_in_progress_keeps_polling() {
        let mut record = CommandRecord::new("s-1", "task");
        record.phase = CommandPhase::Polling;

        let terminal = record.apply_poll(&poll_response(
            r#"{"status": "completed", "task_status": "in_progress",
                "result": {"explanation": "clicked the button",
                           "results": [{"command": "click", "success": true}]}}"#,
        ));
        assert!(!terminal);
        assert_eq!(record.phase, CommandPhase::Polling);
        assert_eq!(record.explanation.as_deref(), Some("clicked the button"));
    }

    #[test]
    fn test_poll_error_is_nonfatal_progress_update() {
        let mut record = CommandRecord::new("s-1", "task");
        record.phase = CommandPhase::Polling;

        record.apply_poll_error("connection reset");
        assert_eq!(record.phase, CommandPhase::Polling);
        assert_eq!(record.progress.len(), 1);
        assert_eq!(record.progress[0].outcome, ActionOutcome::Failed);
        assert!(record.progress[0]
            .message
            .as_deref()
            .unwrap()
            .contains("connection reset"));
    }

    #[test]
    fn test_abandon_is_sticky_but_not_after_terminal() {
        let mut record = CommandRecord::new("s-1", "task");
        record.phase = CommandPhase::Polling;
        record.abandon();
        assert_eq!(record.phase, CommandPhase::Abandoned);

        let mut record = CommandRecord::new("s-1", "task");
        record.phase = CommandPhase::Completed;
        record.abandon();
        assert_eq!(record.phase, CommandPhase::Completed);
    }

    #[test]
    fn test_failure_indicator_from_result_status() {
        let mut record = CommandRecord::new("s-1", "task");
        record.phase = CommandPhase::Polling;

        let terminal = record.apply_poll(&poll_response(
            r#"{"status": "completed",
                "result": {"status": "error", "explanation": "navigation failed"}}"#,
        ));
        assert!(terminal);
        assert_eq!(record.phase, CommandPhase::Failed);
        assert_eq!(record.error.as_deref(), Some("navigation failed"));
    }
}
