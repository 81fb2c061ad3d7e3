//! Automation service trait for abstracting the transport
//!
//! Enables swapping the HTTP client for a scripted double in tests.

use async_trait::async_trait;

use crate::client::wire::{
    Acknowledgement, AgentStepRequest, AgentStepResponse, AgentTaskRequest, AgentTaskResponse,
    CommandStatusResponse, ExecuteCommandRequest, ExecuteCommandResponse, SessionStatusResponse,
    StartSessionResponse,
};
use crate::core::{Result, SessionOptions};

/// Remote service contract consumed by the orchestration layer
///
/// Stateless request/response wrapper; all session and command state lives in
/// the callers.
#[async_trait]
pub trait AutomationApi: Send + Sync {
    /// Create an automation session
    async fn start_session(&self, options: &SessionOptions) -> Result<StartSessionResponse>;

    /// Terminate a session
    async fn stop_session(&self, session_id: &str) -> Result<Acknowledgement>;

    /// Poll session status
    async fn session_status(&self, session_id: &str) -> Result<SessionStatusResponse>;

    /// Submit a natural-language command against a session
    async fn execute_command(
        &self,
        session_id: &str,
        request: &ExecuteCommandRequest,
    ) -> Result<ExecuteCommandResponse>;

    /// Poll command status
    async fn command_status(
        &self,
        session_id: &str,
        command_id: &str,
    ) -> Result<CommandStatusResponse>;

    /// Signal that the user resolved a captcha manually
    async fn resolve_captcha(&self, session_id: &str) -> Result<Acknowledgement>;

    /// Start an agent task, automatic or interactive
    async fn execute_task(&self, request: &AgentTaskRequest) -> Result<AgentTaskResponse>;

    /// Advance an interactive task by a number of steps
    async fn execute_step(&self, request: &AgentStepRequest) -> Result<AgentStepResponse>;

    /// Terminate an interactive task session
    async fn cleanup_task(&self, session_id: &str) -> Result<Acknowledgement>;

    /// Retrieve a rendered page image by filename
    async fn fetch_screenshot(&self, filename: &str) -> Result<Vec<u8>>;
}
