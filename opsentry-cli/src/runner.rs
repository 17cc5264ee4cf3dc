//! Wires the session loop to the terminal

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use crossterm::style::Stylize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use opsentry_core::agents::AgentRegistry;
use opsentry_core::config::{EnvSettings, SessionConfig, Settings, SettingsSource, SharedSettings};
use opsentry_core::engine::ProviderEngine;
use opsentry_core::mcp::AssociationStore;
use opsentry_core::repl::{Orchestrator, PromptSource, SessionEvent};
use opsentry_core::session::{MetricsTracker, SessionStore};
use opsentry_core::tools::local_tool_server;

use crate::args::Args;
use crate::commands::CliCommands;

/// Reads prompts from stdin, one line per turn.
struct StdinPrompts {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinPrompts {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl PromptSource for StdinPrompts {
    async fn next_prompt(&mut self) -> Option<String> {
        print!("{} ", "❯".cyan());
        let _ = std::io::stdout().flush();
        self.lines.next_line().await.ok().flatten()
    }
}

fn render(event: &SessionEvent) {
    match event {
        SessionEvent::Notice(message) => println!("{}", message.clone().yellow()),
        SessionEvent::AgentSwitched { agent } => {
            println!("{}", format!("switched to agent '{}'", agent).green());
        }
        SessionEvent::ModelRebound { model, agents } => {
            println!(
                "{}",
                format!("model rebound to '{}' across {} agent(s)", model, agents).green()
            );
        }
        SessionEvent::ToolServersFailed { servers } => {
            for server in servers {
                println!("{}", format!("tool server '{}' unavailable", server).red());
            }
        }
        SessionEvent::Output { agent, text } => {
            println!("\n{}", agent.clone().green().bold());
            println!("{}\n", text);
        }
        SessionEvent::Blocked { agent, guardrail } => {
            println!(
                "{}",
                format!("[{}] blocked by guardrail '{}'", agent, guardrail)
                    .red()
                    .bold()
            );
        }
        SessionEvent::TurnError { agent, message } => {
            println!("{}", format!("[{}] error: {}", agent, message).red());
        }
        SessionEvent::TurnLimitReached { limit } => {
            println!(
                "{}",
                format!(
                    "turn limit ({}) reached; use /turns to raise it",
                    limit
                )
                .red()
                .bold()
            );
        }
        SessionEvent::TurnLimitLifted => {
            println!("{}", "turn limit increased".green());
        }
        SessionEvent::SessionEnded {
            status,
            total_cost_usd,
            turns,
        } => {
            println!(
                "\nsession ended ({}) after {} turn(s), total cost ${:.6}",
                status.as_str(),
                turns,
                total_cost_usd
            );
        }
    }
}

pub async fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SessionConfig::load_default(),
    };
    config.expand_env_vars();

    // Seed live settings: config file, then environment, then CLI flags.
    let mut defaults = Settings::from_config(&config);
    let env_seed = EnvSettings::new(defaults.clone()).snapshot();
    defaults = env_seed;
    if let Some(model) = &args.model {
        defaults.model = model.clone();
    }
    if let Some(agent) = &args.agent {
        defaults.agent_type = agent.clone();
    }
    if let Some(max_turns) = args.max_turns {
        defaults.max_turns = Some(max_turns);
    }
    if let Some(parallel) = args.parallel {
        defaults.parallel = parallel.max(1);
    }
    let settings = SharedSettings::new(defaults.clone());

    let registry = AgentRegistry::builtin(&defaults.model)?;

    let mut store = AssociationStore::new();
    store.register_server(Arc::new(local_tool_server().await));
    let store = Arc::new(Mutex::new(store));

    let metrics = MetricsTracker::new();
    let engine = Arc::new(ProviderEngine::new(
        config.provider.clone(),
        metrics.clone(),
    ));

    let session_dir = args
        .output
        .clone()
        .unwrap_or_else(|| config.output.session_dir.clone());
    let session = SessionStore::create(&defaults.agent_type, &session_dir)?;
    println!("session: {}\n", session.path.display());

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            render(&event);
        }
    });

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut orchestrator = Orchestrator::new(
        registry,
        store.clone(),
        engine,
        Arc::new(settings.clone()),
        session,
        metrics.clone(),
        events_tx,
        provider_label(&config),
    )
    .await?;

    let mut prompts = StdinPrompts::new();
    let mut commands = CliCommands::new(settings, store, metrics);

    let summary = orchestrator
        .run(&mut prompts, &mut commands, cancel, args.prompt.clone())
        .await?;

    // Drop the orchestrator's sender side by finishing; wait for the
    // renderer to drain remaining events.
    drop(orchestrator);
    let _ = renderer.await;

    tracing::debug!(
        turns = summary.turns,
        cost = summary.total_cost_usd,
        "session complete"
    );
    Ok(())
}

fn provider_label(config: &SessionConfig) -> &'static str {
    use opsentry_core::config::ProviderName;
    match config.provider.name {
        ProviderName::Anthropic => "anthropic",
        ProviderName::OpenAi | ProviderName::LiteLlm => "openai",
    }
}
