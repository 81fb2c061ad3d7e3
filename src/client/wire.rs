//! Wire types for the automation service contract
//!
//! Request and response shapes as produced by the remote service. Fields the
//! server omits depending on state are modeled as options with serde defaults,
//! so a partial payload never fails deserialization mid-poll.

use serde::{Deserialize, Serialize};

/// Sentinel status reported by the server while a captcha blocks execution
pub const WAITING_FOR_CAPTCHA: &str = "waiting_for_captcha";

/// Request body for command submission
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteCommandRequest {
    /// Natural language instruction
    pub user_input: String,
    /// Per-command timeout in seconds
    pub timeout: u64,
}

/// Response from session start
#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub session_id: String,
}

/// Generic acknowledgement (stop session, resolve captcha, cleanup)
#[derive(Debug, Clone, Deserialize)]
pub struct Acknowledgement {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Response from a session status poll
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStatusResponse {
    /// "active" or the waiting-for-captcha sentinel
    pub status: String,
    #[serde(default)]
    pub session_info: Option<SessionInfo>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

impl SessionStatusResponse {
    /// Whether the session is paused on manual captcha resolution
    pub fn waiting_for_captcha(&self) -> bool {
        self.status == WAITING_FOR_CAPTCHA
    }
}

/// Session attributes nested in a status response
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub browser_type: Option<String>,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub pending_commands: u32,
    #[serde(default)]
    pub last_activity: Option<f64>,
    #[serde(default)]
    pub current_url: Option<String>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

/// Response from command submission
///
/// Either carries a command id in `details` (asynchronous path) or the whole
/// result when the server finished synchronously.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteCommandResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<ExecuteDetails>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

/// Details block of a command submission response
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteDetails {
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<ActionResult>>,
    #[serde(default)]
    pub task_status: Option<String>,
}

/// Response from a command status poll
#[derive(Debug, Clone, Deserialize)]
pub struct CommandStatusResponse {
    /// "pending", "completed", or "error"
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    /// Overall task status, present once the server computed it:
    /// "in_progress" or "completed"
    #[serde(default)]
    pub task_status: Option<String>,
    #[serde(default)]
    pub result: Option<CommandResult>,
    #[serde(default)]
    pub progress: Option<CommandProgress>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

impl CommandStatusResponse {
    /// Terminal success: the command finished and the task is done
    pub fn is_terminal_success(&self) -> bool {
        self.status == "completed" && self.task_status.as_deref() == Some("completed")
    }

    /// Explicit failure indicator from the server or the command result
    pub fn is_failure(&self) -> bool {
        self.status == "error"
            || self
                .result
                .as_ref()
                .is_some_and(|r| r.status.as_deref() == Some("error"))
    }
}

/// Finalized result of a command
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: Vec<ActionResult>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
}

/// Outcome of one sub-action executed server-side
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Set when the action paused on a captcha and needs the user
    #[serde(default)]
    pub waiting_for_user: bool,
}

/// In-flight progress snapshot for a command still running
#[derive(Debug, Clone, Deserialize)]
pub struct CommandProgress {
    #[serde(default)]
    pub actions_completed: Option<u32>,
    #[serde(default)]
    pub last_action: Option<String>,
    #[serde(default)]
    pub current_explanation: Option<String>,
}

/// Request body for starting an agent task
#[derive(Debug, Clone, Serialize)]
pub struct AgentTaskRequest {
    pub task: String,
    pub max_steps: u32,
    pub headless: bool,
    pub browser_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    pub interactive: bool,
}

/// Response from starting an agent task
#[derive(Debug, Clone, Deserialize)]
pub struct AgentTaskResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub steps_completed: u32,
    #[serde(default)]
    pub final_url: Option<String>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
    /// Present iff the server elected interactive execution
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Request body for advancing an interactive task
#[derive(Debug, Clone, Serialize)]
pub struct AgentStepRequest {
    pub session_id: String,
    pub steps: u32,
}

/// Response from a step execution
#[derive(Debug, Clone, Deserialize)]
pub struct AgentStepResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub steps_completed: u32,
    #[serde(default)]
    pub current_url: Option<String>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub is_complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_detection() {
        let resp: CommandStatusResponse = serde_json::from_str(
            r#"{"status": "completed", "task_status": "completed",
                "result": {"explanation": "Navigated", "results": []}}"#,
        )
        .unwrap();
        assert!(resp.is_terminal_success());
        assert!(!resp.is_failure());
    }

    #[test]
    fn test_completed_command_with_task_in_progress_is_not_terminal() {
        let resp: CommandStatusResponse = serde_json::from_str(
            r#"{"status": "completed", "task_status": "in_progress",
                "progress": {"last_action": "click", "current_explanation": "Clicking"}}"#,
        )
        .unwrap();
        assert!(!resp.is_terminal_success());
        assert_eq!(resp.progress.unwrap().last_action.as_deref(), Some("click"));
    }

    #[test]
    fn test_partial_payload_deserializes() {
        let resp: CommandStatusResponse =
            serde_json::from_str(r#"{"status": "pending"}"#).unwrap();
        assert!(resp.result.is_none());
        assert!(resp.progress.is_none());
        assert!(!resp.is_terminal_success());
    }

    #[test]
    fn test_captcha_sentinel() {
        let resp: SessionStatusResponse = serde_json::from_str(
            r#"{"status": "waiting_for_captcha", "session_info": {"is_active": true}}"#,
        )
        .unwrap();
        assert!(resp.waiting_for_captcha());
    }
}
