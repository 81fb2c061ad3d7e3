//! Interactive REPL for Webpilot
//!
//! Provides the main user interaction loop against a running automation
//! service: session lifecycle commands plus free-text natural-language
//! instructions with live progress rendering.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::commands::{handle_command, CommandResult};
use crate::client::{AutomationApi, HttpAutomationClient};
use crate::core::{Config, Result};
use crate::session::{
    CommandOrchestrator, CommandPhase, CommandRecord, MessageMeta, MonitorHandle, SessionManager,
    StepController, Transcript,
};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    pub(crate) config: Config,
    pub(crate) api: Arc<dyn AutomationApi>,
    pub(crate) sessions: Arc<SessionManager>,
    pub(crate) orchestrator: CommandOrchestrator,
    pub(crate) steps: StepController,
    pub(crate) transcript: Transcript,
    pub(crate) monitor: Option<MonitorHandle>,
}

impl Repl {
    /// Create a new REPL with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(Config::load())
    }

    /// Create a REPL with custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let api: Arc<dyn AutomationApi> = Arc::new(HttpAutomationClient::from_config(&config)?);
        let sessions = Arc::new(SessionManager::new(Arc::clone(&api)));
        let orchestrator =
            CommandOrchestrator::new(Arc::clone(&api), Arc::clone(&sessions), &config);
        let steps = StepController::new(Arc::clone(&api));

        Ok(Self {
            config,
            api,
            sessions,
            orchestrator,
            steps,
            transcript: Transcript::new(),
            monitor: None,
        })
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();

            if input.is_empty() {
                continue;
            }

            match handle_command(input, self).await {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                    continue;
                }
                Ok(CommandResult::None) => continue,
                Ok(CommandResult::Continue(input)) => {
                    self.submit_and_render(&input).await;
                }
                Err(e) => {
                    self.transcript.push_error(e.to_string());
                    eprintln!("Error: {}\n", e);
                }
            }
        }

        self.teardown().await;
        Ok(())
    }

    /// Submit a natural-language command and render progress until terminal
    async fn submit_and_render(&mut self, input: &str) {
        self.transcript.push_user(input);

        let mut handle = match self.orchestrator.submit(input).await {
            Ok(handle) => handle,
            Err(e) => {
                self.transcript.push_error(e.to_string());
                eprintln!("\nError: {}\n", e);
                return;
            }
        };

        let result_id = self.transcript.push_result(
            "Working...",
            MessageMeta {
                command_id: handle.command_id(),
                session_id: self.sessions.current_id(),
                ..Default::default()
            },
        );

        let mut last_line = String::new();
        while !handle.is_terminal() {
            if self.sessions.captcha_pending() {
                handle.abandon();
                self.transcript
                    .update(&result_id, "Paused: captcha resolution required");
                println!(
                    "\nCaptcha detected. Solve it in the browser window, then type 'resolve' and resubmit.\n"
                );
                return;
            }

            tokio::time::sleep(Duration::from_millis(250)).await;

            let line = handle.snapshot().progress_line();
            if !line.is_empty() && line != last_line {
                println!("  .. {}", line);
                self.transcript.update(&result_id, line.clone());
                last_line = line;
            }
        }

        let record = handle.wait().await;
        self.render_final(&record, &result_id);
    }

    fn render_final(&mut self, record: &CommandRecord, result_id: &str) {
        match record.phase {
            CommandPhase::Completed => {
                let text = record
                    .explanation
                    .clone()
                    .unwrap_or_else(|| "Done.".to_string());
                self.transcript.update(result_id, text.clone());
                if record.screenshot_path.is_some() {
                    self.transcript.update_meta(
                        result_id,
                        MessageMeta {
                            command_id: record.command_id.clone(),
                            session_id: Some(record.session_id.clone()),
                            screenshot_path: record.screenshot_path.clone(),
                            ..Default::default()
                        },
                    );
                }
                println!("\nResult:\n{}\n", text);
            }
            CommandPhase::Failed => {
                let text = record
                    .error
                    .clone()
                    .unwrap_or_else(|| "command failed".to_string());
                self.transcript.update(result_id, format!("Failed: {}", text));
                self.transcript.push_error(text.clone());
                eprintln!("\nError: {}\n", text);
            }
            CommandPhase::Abandoned => {
                self.transcript.update(result_id, "Abandoned");
                println!("\nCommand abandoned.\n");
            }
            CommandPhase::Submitted | CommandPhase::Polling => {}
        }
    }

    /// Release remote resources before exiting
    async fn teardown(&mut self) {
        // Timers first, then the network calls.
        self.monitor = None;

        if let Err(e) = self.steps.cleanup().await {
            eprintln!("Warning: failed to clean up task session: {}", e);
        }
        if let Err(e) = self.sessions.stop().await {
            eprintln!("Warning: failed to stop session: {}", e);
        }
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!(
            r#"
╔═══════════════════════════════════════════════╗
║  Webpilot - browser automation client         ║
╚═══════════════════════════════════════════════╝"#
        );
        println!("Service:  {}", self.config.server_url());
        println!(
            "Browser:  {} ({})",
            self.config.browser.browser_type,
            if self.config.browser.headless {
                "headless"
            } else {
                "headed"
            }
        );
        println!();
        println!("Commands: help, start, stop, status, task, step, exit");
        println!("───────────────────────────────────────────────");
    }
}
