//! Session lifecycle management
//!
//! Owns the single active automation session: create, status refresh, and
//! teardown. Every status refresh also feeds the captcha gate, which blocks
//! new command submission until the user confirms resolution.
//!
//! The manager is the only holder of the "current session" cell. Asynchronous
//! continuations re-validate the session id they captured before writing
//! results back, so a refresh that completes after teardown is discarded
//! instead of reviving dead state.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::wire::SessionStatusResponse;
use crate::client::AutomationApi;
use crate::core::{Result, Session, SessionOptions, WebpilotError};

/// Manager for the single active automation session
pub struct SessionManager {
    api: Arc<dyn AutomationApi>,
    state: Mutex<GateState>,
}

/// The shared mutable cells: current session snapshot and the captcha flag
struct GateState {
    current: Option<Session>,
    captcha_pending: bool,
}

impl SessionManager {
    /// Create a manager backed by the given transport
    pub fn new(api: Arc<dyn AutomationApi>) -> Self {
        Self {
            api,
            state: Mutex::new(GateState {
                current: None,
                captcha_pending: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new session
    ///
    /// Fails with a validation error if a session is already active; the
    /// caller must stop the existing one first.
    pub async fn start(&self, options: &SessionOptions) -> Result<Session> {
        if let Some(existing) = self.current() {
            return Err(WebpilotError::validation(format!(
                "session {} is already active; stop it before starting another",
                existing.id
            )));
        }

        let response = self.api.start_session(options).await?;
        let session = Session::started(response.session_id, options.browser_type, options.headless);

        let mut state = self.state();
        state.current = Some(session.clone());
        state.captcha_pending = false;

        Ok(session)
    }

    /// Refresh the current session's status from the server
    ///
    /// Updates the local snapshot and the captcha gate. If the server reports
    /// the session gone or inactive, local state is cleared and a
    /// session-lost error is returned.
    pub async fn refresh(&self) -> Result<Session> {
        let session_id = self
            .current_id()
            .ok_or_else(|| WebpilotError::validation("no active session to refresh"))?;

        match self.api.session_status(&session_id).await {
            Ok(response) => self.apply_status(&session_id, &response),
            Err(e) => {
                if e.is_session_lost() {
                    self.clear_if_current(&session_id);
                }
                Err(e)
            }
        }
    }

    /// Merge a status response into the local snapshot
    ///
    /// Discards the result if the session was torn down or replaced while the
    /// fetch was in flight.
    fn apply_status(&self, session_id: &str, response: &SessionStatusResponse) -> Result<Session> {
        let mut state = self.state();

        let current = match state.current.as_mut() {
            Some(current) if current.id == session_id => current,
            _ => {
                // Session changed hands while we were suspended; drop the result.
                return Err(WebpilotError::session_lost(
                    session_id,
                    "session status refresh",
                ));
            }
        };

        if let Some(info) = &response.session_info {
            if !info.is_active {
                state.current = None;
                state.captcha_pending = false;
                return Err(WebpilotError::session_lost(
                    session_id,
                    "session status refresh",
                ));
            }

            current.is_active = true;
            current.current_url = info.current_url.clone();
            current.last_activity = info.last_activity;
            current.pending_commands = info.pending_commands;
            if info.screenshot_path.is_some() {
                current.screenshot_path = info.screenshot_path.clone();
            }
            if let Some(kind) = info.browser_type.as_deref().and_then(|b| b.parse().ok()) {
                current.browser_type = kind;
            }
        }

        if response.screenshot_path.is_some() {
            current.screenshot_path = response.screenshot_path.clone();
        }

        let snapshot = current.clone();
        state.captcha_pending = response.waiting_for_captcha();

        Ok(snapshot)
    }

    /// Stop the current session
    ///
    /// Idempotent from the caller's perspective: stopping when no session is
    /// held, or when the server already dropped it, is a no-op. Local state is
    /// cleared before the network call so no concurrent continuation can
    /// observe a half-dead session.
    pub async fn stop(&self) -> Result<()> {
        let session_id = {
            let mut state = self.state();
            let Some(session) = state.current.take() else {
                return Ok(());
            };
            state.captcha_pending = false;
            session.id
        };

        match self.api.stop_session(&session_id).await {
            Ok(_) => Ok(()),
            // Already stopped server-side; nothing to tear down twice.
            Err(e) if e.is_session_lost() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Signal that the user resolved the captcha
    ///
    /// The flag is cleared only after the server acknowledges. On failure the
    /// gate stays set and the error is surfaced so the user can retry.
    pub async fn resolve_captcha(&self) -> Result<()> {
        let session_id = self
            .current_id()
            .ok_or_else(|| WebpilotError::validation("no active session"))?;

        self.api.resolve_captcha(&session_id).await?;

        let mut state = self.state();
        if state.current.as_ref().is_some_and(|s| s.id == session_id) {
            state.captcha_pending = false;
        }

        Ok(())
    }

    /// Validate that a command may be submitted right now
    ///
    /// Returns the session id, or fails before any network call when no
    /// session is held or the captcha gate is set.
    pub fn ensure_submittable(&self) -> Result<String> {
        let state = self.state();
        let session = state
            .current
            .as_ref()
            .ok_or_else(|| WebpilotError::validation("no active session"))?;

        if state.captcha_pending {
            return Err(WebpilotError::captcha_pending(&session.id));
        }

        Ok(session.id.clone())
    }

    /// Current session snapshot, if any
    pub fn current(&self) -> Option<Session> {
        self.state().current.clone()
    }

    /// Current session id, if any
    pub fn current_id(&self) -> Option<String> {
        self.state().current.as_ref().map(|s| s.id.clone())
    }

    /// Whether the given id still names the current session
    pub fn is_current(&self, session_id: &str) -> bool {
        self.state()
            .current
            .as_ref()
            .is_some_and(|s| s.id == session_id)
    }

    /// Whether the captcha gate is set
    pub fn captcha_pending(&self) -> bool {
        self.state().captcha_pending
    }

    /// Drop local session state if it still matches the given id
    pub(crate) fn clear_if_current(&self, session_id: &str) {
        let mut state = self.state();
        if state.current.as_ref().is_some_and(|s| s.id == session_id) {
            state.current = None;
            state.captcha_pending = false;
        }
    }

    /// Spawn a periodic status refresh loop for the current session
    ///
    /// The loop exits on its own once the session is lost or stopped. The
    /// returned handle owns the timer; dropping or stopping it cancels the
    /// loop synchronously.
    pub fn spawn_monitor(self: Arc<Self>, interval: Duration) -> MonitorHandle {
        let manager = self;

        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                if manager.current_id().is_none() {
                    break;
                }

                match manager.refresh().await {
                    Err(e) if e.is_session_lost() => break,
                    // Transient refresh failures are tolerated; the next tick retries.
                    _ => {}
                }
            }
        });

        MonitorHandle { task: Some(task) }
    }
}

/// Owned, cancelable handle to a session monitor loop
pub struct MonitorHandle {
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Cancel the monitor loop immediately
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the loop is still running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
