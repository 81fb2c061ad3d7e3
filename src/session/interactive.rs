//! Interactive step execution
//!
//! Alternate mode where the caller explicitly advances a pre-declared task in
//! discrete steps instead of fire-and-poll. The server elects interactive
//! execution by returning a session id; the controller then tracks the
//! cumulative step count against the declared budget and relinquishes the
//! session id as soon as the server reports completion.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::wire::{AgentStepRequest, AgentTaskRequest, AgentTaskResponse};
use crate::client::AutomationApi;
use crate::core::{BrowserKind, Result, WebpilotError};

/// Parameters for launching an agent task
#[derive(Debug, Clone)]
pub struct TaskSpec {
    /// Natural language task description
    pub task: String,
    /// URL to open before the first step, if any
    pub start_url: Option<String>,
    /// Step budget; the cumulative counter never exceeds this
    pub max_steps: u32,
    /// Request caller-paced execution
    pub interactive: bool,
    pub browser_type: BrowserKind,
    pub headless: bool,
}

/// How the server chose to run the task
#[derive(Debug, Clone)]
pub enum TaskLaunch {
    /// Steppable session created; advance it with `execute_step`
    Interactive { session_id: String },
    /// The server ran the task to completion synchronously
    Resolved(TaskOutcome),
}

/// Final result of a non-interactive task run
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub success: bool,
    pub message: String,
    pub steps_completed: u32,
    pub final_url: Option<String>,
    pub screenshot_path: Option<String>,
}

/// Result of one step-execution call
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Steps the server actually executed in this call; may be fewer than
    /// requested if the task completed mid-batch
    pub steps_completed: u32,
    /// Cumulative counter after this call
    pub total_steps: u32,
    pub is_complete: bool,
    pub current_url: Option<String>,
    pub screenshot_path: Option<String>,
    pub message: String,
}

/// Local state of the steppable task
#[derive(Debug, Clone)]
struct ActiveTask {
    session_id: String,
    max_steps: u32,
    steps_taken: u32,
}

/// Controller for caller-paced task execution
pub struct StepController {
    api: Arc<dyn AutomationApi>,
    active: Mutex<Option<ActiveTask>>,
}

impl StepController {
    /// Create a controller backed by the given transport
    pub fn new(api: Arc<dyn AutomationApi>) -> Self {
        Self {
            api,
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveTask>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Launch a task; interactive iff the response carries a session id
    pub async fn execute_task(&self, spec: &TaskSpec) -> Result<TaskLaunch> {
        if spec.task.trim().is_empty() {
            return Err(WebpilotError::validation("task description is empty"));
        }
        if spec.max_steps == 0 {
            return Err(WebpilotError::validation("step budget must be at least 1"));
        }
        if let Some(existing) = self.session_id() {
            return Err(WebpilotError::validation(format!(
                "interactive task session {} is still active; clean it up first",
                existing
            )));
        }

        let request = AgentTaskRequest {
            task: spec.task.clone(),
            max_steps: spec.max_steps,
            headless: spec.headless,
            browser_type: spec.browser_type.as_str().to_string(),
            start_url: spec.start_url.clone(),
            interactive: spec.interactive,
        };

        let response = self.api.execute_task(&request).await?;

        match &response.session_id {
            Some(session_id) => {
                *self.active() = Some(ActiveTask {
                    session_id: session_id.clone(),
                    max_steps: spec.max_steps,
                    steps_taken: 0,
                });
                Ok(TaskLaunch::Interactive {
                    session_id: session_id.clone(),
                })
            }
            None => Ok(TaskLaunch::Resolved(outcome_from(&response))),
        }
    }

    /// Advance the steppable task
    ///
    /// The requested count is clamped to the remaining budget, and the
    /// counter advances by what the server reports, never past the budget.
    /// Completion transitions to non-steppable and relinquishes the session
    /// id without requiring an explicit cleanup call.
    pub async fn execute_step(&self, steps: u32) -> Result<StepResult> {
        if steps == 0 {
            return Err(WebpilotError::validation("step count must be at least 1"));
        }

        let (session_id, remaining) = {
            let active = self.active();
            let task = active
                .as_ref()
                .ok_or_else(|| WebpilotError::validation("no steppable task session"))?;

            let remaining = task.max_steps - task.steps_taken;
            if remaining == 0 {
                return Err(WebpilotError::validation(format!(
                    "step budget of {} exhausted",
                    task.max_steps
                )));
            }
            (task.session_id.clone(), remaining)
        };

        let request = AgentStepRequest {
            session_id: session_id.clone(),
            steps: steps.min(remaining),
        };

        let response = match self.api.execute_step(&request).await {
            Ok(response) => response,
            Err(e) => {
                if e.is_session_lost() {
                    self.forget(&session_id);
                }
                return Err(e);
            }
        };

        let mut active = self.active();
        let task = match active.as_mut() {
            // The continuation only applies if this session is still ours.
            Some(task) if task.session_id == session_id => task,
            _ => {
                return Err(WebpilotError::session_lost(
                    session_id,
                    "execute agent step",
                ))
            }
        };

        task.steps_taken = (task.steps_taken + response.steps_completed).min(task.max_steps);
        let total_steps = task.steps_taken;

        if response.is_complete {
            *active = None;
        }

        Ok(StepResult {
            steps_completed: response.steps_completed,
            total_steps,
            is_complete: response.is_complete,
            current_url: response.current_url.clone(),
            screenshot_path: response.screenshot_path.clone(),
            message: response.message.clone(),
        })
    }

    /// Terminate the steppable session server-side and forget it locally
    ///
    /// Must be called whenever a steppable session is abandoned, or
    /// server-side resources leak. Safe to call when nothing is active.
    pub async fn cleanup(&self) -> Result<()> {
        let Some(session_id) = self.session_id() else {
            return Ok(());
        };

        self.forget(&session_id);

        match self.api.cleanup_task(&session_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_session_lost() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Session id of the steppable task, if one exists
    pub fn session_id(&self) -> Option<String> {
        self.active().as_ref().map(|t| t.session_id.clone())
    }

    /// Whether a steppable session exists
    pub fn is_steppable(&self) -> bool {
        self.active().is_some()
    }

    /// Cumulative steps taken so far
    pub fn steps_taken(&self) -> u32 {
        self.active().as_ref().map(|t| t.steps_taken).unwrap_or(0)
    }

    fn forget(&self, session_id: &str) {
        let mut active = self.active();
        if active.as_ref().is_some_and(|t| t.session_id == session_id) {
            *active = None;
        }
    }
}

fn outcome_from(response: &AgentTaskResponse) -> TaskOutcome {
    TaskOutcome {
        success: response.status != "error",
        message: response.message.clone(),
        steps_completed: response.steps_completed,
        final_url: response.final_url.clone(),
        screenshot_path: response.screenshot_path.clone(),
    }
}
