//! Webpilot - browser automation client
//!
//! Entry point for the CLI application.

use std::sync::Arc;

use clap::Parser;

use webpilot::client::AutomationApi;
use webpilot::core::SessionOptions;
use webpilot::session::CommandPhase;
use webpilot::{Config, HttpAutomationClient, Repl};

#[derive(Parser)]
#[command(
    name = "webpilot",
    about = "Drive a remote browser with natural-language commands",
    version
)]
struct Args {
    /// Automation service address as host or host:port
    #[arg(short, long)]
    server: Option<String>,

    /// Browser engine to request (chromium, firefox, webkit)
    #[arg(short, long)]
    browser: Option<String>,

    /// Run the remote browser headless
    #[arg(long)]
    headless: bool,

    /// Run a single command non-interactively and exit
    #[arg(short, long)]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load();

    if let Some(server) = &args.server {
        match server.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
                config.server.host = host.to_string();
                config.server.port = port.parse()?;
            }
            _ => config.server.host = server.clone(),
        }
    }
    if let Some(browser) = &args.browser {
        config.browser.browser_type = browser
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if args.headless {
        config.browser.headless = true;
    }

    match args.prompt {
        Some(prompt) => run_single_command(config, &prompt).await,
        None => {
            let mut repl = Repl::with_config(config)?;
            repl.run().await?;
            Ok(())
        }
    }
}

/// One-shot mode: start a session, run one command, print the result, stop
async fn run_single_command(config: Config, prompt: &str) -> anyhow::Result<()> {
    let api: Arc<dyn AutomationApi> = Arc::new(HttpAutomationClient::from_config(&config)?);
    let sessions = Arc::new(webpilot::SessionManager::new(Arc::clone(&api)));
    let orchestrator =
        webpilot::CommandOrchestrator::new(Arc::clone(&api), Arc::clone(&sessions), &config);

    let options = SessionOptions {
        browser_type: config.browser.browser_type,
        headless: config.browser.headless,
        timeout_secs: config.browser.command_timeout_secs,
    };
    sessions.start(&options).await?;

    let outcome = async {
        let mut handle = orchestrator.submit(prompt).await?;
        Ok::<_, webpilot::WebpilotError>(handle.wait().await)
    }
    .await;

    // Tear the session down before surfacing the command outcome.
    let stop_result = sessions.stop().await;

    let record = outcome?;
    stop_result?;

    match record.phase {
        CommandPhase::Completed => {
            println!(
                "{}",
                record.explanation.as_deref().unwrap_or("Command completed.")
            );
            Ok(())
        }
        CommandPhase::Failed => Err(anyhow::anyhow!(
            "command failed: {}",
            record.error.as_deref().unwrap_or("unknown error")
        )),
        phase => Err(anyhow::anyhow!("command did not complete: {:?}", phase)),
    }
}
