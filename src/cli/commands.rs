//! CLI commands
//!
//! Special commands that can be executed in the REPL. Anything that is not a
//! command is treated as a natural-language instruction for the current
//! session.

use crate::cli::repl::Repl;
use crate::core::{Result, SessionOptions};
use crate::session::{TaskLaunch, TaskSpec};

/// Result of parsing a command
pub enum CommandResult {
    /// Continue processing as a natural-language instruction
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// No output needed
    None,
}

/// Parse and handle special commands
pub async fn handle_command(input: &str, repl: &mut Repl) -> Result<CommandResult> {
    let input = input.trim();
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd.as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "clear" => {
            repl.transcript.clear();
            Ok(CommandResult::Handled("Transcript cleared.".to_string()))
        }

        "start" => handle_start(args, repl).await,

        "stop" => {
            // Cancel the monitor timer before the stop call suspends.
            repl.monitor = None;
            repl.sessions.stop().await?;
            repl.transcript.push_system("session stopped");
            Ok(CommandResult::Handled("Session stopped.".to_string()))
        }

        "status" => Ok(CommandResult::Handled(status_text(repl))),

        "resolve" => {
            repl.sessions.resolve_captcha().await?;
            repl.transcript.push_system("captcha resolved");
            Ok(CommandResult::Handled(
                "Captcha resolution acknowledged. Commands are unblocked.".to_string(),
            ))
        }

        "task" => handle_task(args, repl).await,

        "step" => handle_step(args, repl).await,

        "cleanup" => {
            repl.steps.cleanup().await?;
            Ok(CommandResult::Handled(
                "Interactive task session cleaned up.".to_string(),
            ))
        }

        "screenshot" => handle_screenshot(repl).await,

        _ => {
            if input.starts_with('/') {
                Ok(CommandResult::Handled(format!(
                    "Unknown command: {}. Type 'help' for available commands.",
                    cmd
                )))
            } else {
                Ok(CommandResult::Continue(input.to_string()))
            }
        }
    }
}

/// Handle 'start [browser]'
async fn handle_start(args: &str, repl: &mut Repl) -> Result<CommandResult> {
    let mut options = SessionOptions {
        browser_type: repl.config.browser.browser_type,
        headless: repl.config.browser.headless,
        timeout_secs: repl.config.browser.command_timeout_secs,
    };

    if !args.is_empty() {
        match args.parse() {
            Ok(kind) => options.browser_type = kind,
            Err(e) => return Ok(CommandResult::Handled(e)),
        }
    }

    let session = repl.sessions.start(&options).await?;
    repl.monitor = Some(
        std::sync::Arc::clone(&repl.sessions).spawn_monitor(repl.config.session_poll_interval()),
    );
    repl.transcript
        .push_system(format!("session {} started", session.id));

    Ok(CommandResult::Handled(format!(
        "Session {} started ({}, {}).",
        session.id,
        session.browser_type,
        if session.headless { "headless" } else { "headed" }
    )))
}

/// Handle 'task [start_url] <description>'
async fn handle_task(args: &str, repl: &mut Repl) -> Result<CommandResult> {
    let (start_url, task) = if args.starts_with("http://") || args.starts_with("https://") {
        match args.split_once(' ') {
            Some((url, rest)) => (Some(url.to_string()), rest.trim()),
            None => (Some(args.to_string()), ""),
        }
    } else {
        (None, args)
    };

    if task.is_empty() {
        return Ok(CommandResult::Handled(
            "Usage: task [start_url] <description>".to_string(),
        ));
    }

    let spec = TaskSpec {
        task: task.to_string(),
        start_url,
        max_steps: repl.config.task.max_steps,
        interactive: true,
        browser_type: repl.config.browser.browser_type,
        headless: repl.config.browser.headless,
    };

    match repl.steps.execute_task(&spec).await? {
        TaskLaunch::Interactive { session_id } => Ok(CommandResult::Handled(format!(
            "Interactive task session {} started (budget {} steps). Use 'step [n]' to advance.",
            session_id, spec.max_steps
        ))),
        TaskLaunch::Resolved(outcome) => Ok(CommandResult::Handled(format!(
            "Task finished in {} steps: {}",
            outcome.steps_completed, outcome.message
        ))),
    }
}

/// Handle 'step [n]'
async fn handle_step(args: &str, repl: &mut Repl) -> Result<CommandResult> {
    let steps: u32 = if args.is_empty() {
        1
    } else {
        match args.parse() {
            Ok(n) => n,
            Err(_) => {
                return Ok(CommandResult::Handled(format!(
                    "Not a step count: {}",
                    args
                )))
            }
        }
    };

    let result = repl.steps.execute_step(steps).await?;

    let mut output = format!(
        "Executed {} step(s), {} total. {}",
        result.steps_completed, result.total_steps, result.message
    );
    if let Some(url) = &result.current_url {
        output.push_str(&format!("\nCurrent URL: {}", url));
    }
    if result.is_complete {
        output.push_str("\nTask complete; session released.");
    }

    Ok(CommandResult::Handled(output))
}

/// Handle 'screenshot': fetch the latest session screenshot and open it
async fn handle_screenshot(repl: &mut Repl) -> Result<CommandResult> {
    let Some(session) = repl.sessions.current() else {
        return Ok(CommandResult::Handled("No active session.".to_string()));
    };

    let Some(path) = session.screenshot_path else {
        return Ok(CommandResult::Handled(
            "No screenshot captured yet.".to_string(),
        ));
    };

    // The server reports its local path; only the filename is addressable.
    let filename = path.rsplit('/').next().unwrap_or(&path).to_string();
    let bytes = repl.api.fetch_screenshot(&filename).await?;

    let local = std::env::temp_dir().join(&filename);
    std::fs::write(&local, bytes)?;

    let opened = webbrowser::open(&local.to_string_lossy()).is_ok();
    Ok(CommandResult::Handled(if opened {
        format!("Screenshot saved to {} and opened.", local.display())
    } else {
        format!("Screenshot saved to {}.", local.display())
    }))
}

/// Render current session and task state
fn status_text(repl: &Repl) -> String {
    let session_line = match repl.sessions.current() {
        Some(session) => format!(
            "Session:   {} ({}, {})\nURL:       {}\nPending:   {} command(s)",
            session.id,
            session.browser_type,
            if session.headless { "headless" } else { "headed" },
            session.current_url.as_deref().unwrap_or("-"),
            session.pending_commands,
        ),
        None => "Session:   none".to_string(),
    };

    let captcha_line = if repl.sessions.captcha_pending() {
        "Captcha:   WAITING - solve it in the browser window, then type 'resolve'"
    } else {
        "Captcha:   clear"
    };

    let task_line = match repl.steps.session_id() {
        Some(id) => format!("Task:      {} ({} step(s) taken)", id, repl.steps.steps_taken()),
        None => "Task:      none".to_string(),
    };

    format!(
        "Webpilot Status:\n\
         ─────────────────────────────\n\
         {}\n{}\n{}\n\
         Transcript: {} entries",
        session_line,
        captcha_line,
        task_line,
        repl.transcript.len()
    )
}

/// Generate help text
fn help_text() -> String {
    r#"Webpilot Commands:
─────────────────────────────────────────────
  help, ?             Show this help message
  exit, quit, q       Exit Webpilot
  clear               Clear the transcript
  status              Show session/task status

  start [browser]     Start a session (chromium, firefox, webkit)
  stop                Stop the current session
  resolve             Confirm a captcha was solved manually
  screenshot          Fetch and open the latest screenshot

  task [url] <text>   Start an interactive agent task
  step [n]            Advance the interactive task by n steps
  cleanup             Release the interactive task session

Anything else is sent to the session as a natural-language command,
e.g.  go to example.com and extract the page title
─────────────────────────────────────────────"#
        .to_string()
}
