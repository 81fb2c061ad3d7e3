//! # Webpilot
//!
//! Client for a remote browser-automation service. Manages a single browser
//! session, submits natural-language commands and polls them to completion,
//! pauses for human captcha resolution, and supports caller-paced interactive
//! agent tasks with a hard step budget.
//!
//! ## Architecture
//!
//! - **core**: Configuration, error types, and shared data types
//! - **client**: HTTP transport and the wire-level API contract
//! - **session**: Session lifecycle, command orchestration, step control
//! - **cli**: Interactive REPL
//!
//! ## Example
//!
//! ```no_run
//! use webpilot::{Config, Repl};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut repl = Repl::with_config(Config::load())?;
//!     repl.run().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod core;
pub mod session;

pub use cli::Repl;
pub use client::{AutomationApi, HttpAutomationClient};
pub use core::{Config, Result, WebpilotError};
pub use session::{CommandOrchestrator, SessionManager, StepController};
