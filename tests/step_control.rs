//! Integration tests for caller-paced interactive task execution
//!
//! Exercises the step controller against a scripted transport double: launch
//! election, the step budget, completion handoff, and cleanup.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use webpilot::client::wire::{
    Acknowledgement, AgentStepRequest, AgentStepResponse, AgentTaskRequest, AgentTaskResponse,
    CommandStatusResponse, ExecuteCommandRequest, ExecuteCommandResponse, SessionStatusResponse,
    StartSessionResponse,
};
use webpilot::client::AutomationApi;
use webpilot::core::{BrowserKind, Result, SessionOptions, WebpilotError};
use webpilot::session::{StepController, TaskLaunch, TaskSpec};

const TASK_SESSION: &str = "agent-s-1";

/// Transport double scripted for the agent-task endpoints only
#[derive(Default)]
struct ScriptedAgentApi {
    /// Whether task launch elects interactive execution
    interactive: bool,
    step_replies: Mutex<VecDeque<AgentStepResponse>>,
    step_requests: Mutex<Vec<AgentStepRequest>>,
    step_lost: Mutex<bool>,
    task_calls: AtomicUsize,
    cleanup_calls: AtomicUsize,
}

impl ScriptedAgentApi {
    fn interactive() -> Arc<Self> {
        Arc::new(Self {
            interactive: true,
            ..Self::default()
        })
    }

    fn script_step(&self, steps_completed: u32, is_complete: bool) {
        self.step_replies.lock().unwrap().push_back(AgentStepResponse {
            status: "success".to_string(),
            message: format!("executed {} step(s)", steps_completed),
            steps_completed,
            current_url: Some("https://example.com/results".to_string()),
            screenshot_path: None,
            details: None,
            is_complete,
        });
    }

    fn last_step_request(&self) -> AgentStepRequest {
        self.step_requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no step request recorded")
    }
}

#[async_trait]
impl AutomationApi for ScriptedAgentApi {
    async fn start_session(&self, _options: &SessionOptions) -> Result<StartSessionResponse> {
        panic!("start_session not scripted in this test");
    }

    async fn stop_session(&self, _session_id: &str) -> Result<Acknowledgement> {
        panic!("stop_session not scripted in this test");
    }

    async fn session_status(&self, _session_id: &str) -> Result<SessionStatusResponse> {
        panic!("session_status not scripted in this test");
    }

    async fn execute_command(
        &self,
        _session_id: &str,
        _request: &ExecuteCommandRequest,
    ) -> Result<ExecuteCommandResponse> {
        panic!("execute_command not scripted in this test");
    }

    async fn command_status(
        &self,
        _session_id: &str,
        _command_id: &str,
    ) -> Result<CommandStatusResponse> {
        panic!("command_status not scripted in this test");
    }

    async fn resolve_captcha(&self, _session_id: &str) -> Result<Acknowledgement> {
        panic!("resolve_captcha not scripted in this test");
    }

    async fn execute_task(&self, _request: &AgentTaskRequest) -> Result<AgentTaskResponse> {
        self.task_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AgentTaskResponse {
            status: "success".to_string(),
            message: if self.interactive {
                "interactive session created".to_string()
            } else {
                "task completed".to_string()
            },
            details: None,
            steps_completed: if self.interactive { 0 } else { 4 },
            final_url: None,
            screenshot_path: None,
            session_id: self.interactive.then(|| TASK_SESSION.to_string()),
        })
    }

    async fn execute_step(&self, request: &AgentStepRequest) -> Result<AgentStepResponse> {
        self.step_requests.lock().unwrap().push(request.clone());
        if *self.step_lost.lock().unwrap() {
            return Err(WebpilotError::session_lost(
                request.session_id.clone(),
                "execute agent step",
            ));
        }
        self.step_replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| WebpilotError::transport("execute agent step", "no scripted reply"))
    }

    async fn cleanup_task(&self, _session_id: &str) -> Result<Acknowledgement> {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Acknowledgement {
            status: "success".to_string(),
            message: String::new(),
        })
    }

    async fn fetch_screenshot(&self, _filename: &str) -> Result<Vec<u8>> {
        panic!("fetch_screenshot not scripted in this test");
    }
}

fn spec(max_steps: u32) -> TaskSpec {
    TaskSpec {
        task: "find the cheapest flight".to_string(),
        start_url: Some("https://example.com".to_string()),
        max_steps,
        interactive: true,
        browser_type: BrowserKind::Chromium,
        headless: true,
    }
}

#[tokio::test]
async fn interactive_launch_creates_steppable_session() {
    let api = ScriptedAgentApi::interactive();
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);

    let launch = controller.execute_task(&spec(5)).await.expect("launch");
    match launch {
        TaskLaunch::Interactive { session_id } => assert_eq!(session_id, TASK_SESSION),
        TaskLaunch::Resolved(_) => panic!("expected interactive launch"),
    }

    assert!(controller.is_steppable());
    assert_eq!(controller.steps_taken(), 0);

    api.script_step(1, false);
    let result = controller.execute_step(1).await.expect("step");
    assert_eq!(result.steps_completed, 1);
    assert_eq!(result.total_steps, 1);
    assert!(!result.is_complete);
    assert!(controller.is_steppable());
}

#[tokio::test]
async fn non_interactive_launch_resolves_without_session() {
    let api = Arc::new(ScriptedAgentApi::default());
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);

    let launch = controller.execute_task(&spec(5)).await.expect("launch");
    match launch {
        TaskLaunch::Resolved(outcome) => {
            assert!(outcome.success);
            assert_eq!(outcome.steps_completed, 4);
        }
        TaskLaunch::Interactive { .. } => panic!("expected resolved launch"),
    }
    assert!(!controller.is_steppable());
}

#[tokio::test]
async fn completion_relinquishes_the_session_without_cleanup() {
    let api = ScriptedAgentApi::interactive();
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);
    controller.execute_task(&spec(5)).await.expect("launch");

    api.script_step(2, false);
    api.script_step(1, true);

    controller.execute_step(2).await.expect("first step");
    let result = controller.execute_step(1).await.expect("final step");

    assert!(result.is_complete);
    assert_eq!(result.total_steps, 3);
    assert!(!controller.is_steppable());
    assert!(controller.session_id().is_none());
    // Completion tears down server-side; no cleanup call is owed.
    assert_eq!(api.cleanup_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn requested_steps_clamped_to_remaining_budget() {
    let api = ScriptedAgentApi::interactive();
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);
    controller.execute_task(&spec(3)).await.expect("launch");

    api.script_step(3, false);
    controller.execute_step(10).await.expect("step");
    assert_eq!(api.last_step_request().steps, 3);
}

#[tokio::test]
async fn counter_never_exceeds_the_budget() {
    let api = ScriptedAgentApi::interactive();
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);
    controller.execute_task(&spec(3)).await.expect("launch");

    // Server over-reports; the local counter still caps at the budget.
    api.script_step(5, false);
    let result = controller.execute_step(3).await.expect("step");
    assert_eq!(result.total_steps, 3);
    assert_eq!(controller.steps_taken(), 3);

    let err = controller.execute_step(1).await.unwrap_err();
    assert!(matches!(err, WebpilotError::Validation(_)));
    assert!(err.to_string().contains("budget"));
}

#[tokio::test]
async fn zero_step_request_rejected() {
    let api = ScriptedAgentApi::interactive();
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);
    controller.execute_task(&spec(5)).await.expect("launch");

    let err = controller.execute_step(0).await.unwrap_err();
    assert!(matches!(err, WebpilotError::Validation(_)));
    assert!(api.step_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn step_without_task_rejected() {
    let api = ScriptedAgentApi::interactive();
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);

    let err = controller.execute_step(1).await.unwrap_err();
    assert!(matches!(err, WebpilotError::Validation(_)));
}

#[tokio::test]
async fn second_launch_rejected_while_task_active() {
    let api = ScriptedAgentApi::interactive();
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);
    controller.execute_task(&spec(5)).await.expect("launch");

    let err = controller.execute_task(&spec(5)).await.unwrap_err();
    assert!(matches!(err, WebpilotError::Validation(_)));
    assert_eq!(api.task_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn session_loss_during_step_forgets_the_task() {
    let api = ScriptedAgentApi::interactive();
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);
    controller.execute_task(&spec(5)).await.expect("launch");

    *api.step_lost.lock().unwrap() = true;
    let err = controller.execute_step(1).await.unwrap_err();

    assert!(err.is_session_lost());
    assert!(!controller.is_steppable());
}

#[tokio::test]
async fn cleanup_releases_the_session_once() {
    let api = ScriptedAgentApi::interactive();
    let controller = StepController::new(Arc::clone(&api) as Arc<dyn AutomationApi>);
    controller.execute_task(&spec(5)).await.expect("launch");

    controller.cleanup().await.expect("cleanup");
    assert!(!controller.is_steppable());
    assert_eq!(api.cleanup_calls.load(Ordering::SeqCst), 1);

    // Second cleanup is a local no-op.
    controller.cleanup().await.expect("idempotent cleanup");
    assert_eq!(api.cleanup_calls.load(Ordering::SeqCst), 1);
}
