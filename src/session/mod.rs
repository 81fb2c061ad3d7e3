//! Session module - orchestration of sessions, commands, and tasks
//!
//! Contains the session lifecycle manager (with the captcha gate), the
//! command polling orchestrator, the interactive step controller, and the
//! conversation transcript.

pub mod command;
pub mod interactive;
pub mod manager;
pub mod transcript;

pub use command::{CommandHandle, CommandOrchestrator, CommandPhase, CommandRecord};
pub use interactive::{StepController, StepResult, TaskLaunch, TaskOutcome, TaskSpec};
pub use manager::{MonitorHandle, SessionManager};
pub use transcript::{Message, MessageMeta, Role, Transcript};
