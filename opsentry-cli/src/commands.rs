//! REPL command surface
//!
//! Commands mutate the shared settings or the association store; the
//! settings changes land at the next turn boundary, never mid-turn.

use std::sync::Arc;

use async_trait::async_trait;
use crossterm::style::Stylize;
use tokio::sync::Mutex;

use opsentry_core::config::SharedSettings;
use opsentry_core::mcp::AssociationStore;
use opsentry_core::repl::{CommandHandler, CommandOutcome};
use opsentry_core::session::MetricsTracker;

pub struct CliCommands {
    settings: SharedSettings,
    store: Arc<Mutex<AssociationStore>>,
    metrics: MetricsTracker,
}

impl CliCommands {
    pub fn new(
        settings: SharedSettings,
        store: Arc<Mutex<AssociationStore>>,
        metrics: MetricsTracker,
    ) -> Self {
        Self {
            settings,
            store,
            metrics,
        }
    }

    fn help(&self) {
        println!("{}", "Commands".bold());
        println!("  /model [agent] <id>         set the model, optionally per agent");
        println!("  /agent <name>               switch the active persona");
        println!("  /turns <n|inf>              set the turn limit");
        println!("  /parallel <n>               set the fan-out count");
        println!("  /mcp attach <agent> <srv>   attach a tool server");
        println!("  /mcp detach <agent> <srv>   detach a tool server");
        println!("  /mcp list [agent]           show associations");
        println!("  /mcp tools <agent>          resolve an agent's tools");
        println!("  /cost                       show usage and cost so far");
        println!("  /exit                       end the session");
    }

    async fn mcp(&mut self, args: &[&str]) {
        match args {
            ["attach", agent, server] => {
                let added = self.store.lock().await.attach(agent, server);
                if added {
                    println!("attached {} -> {}", agent, server);
                } else {
                    println!("{} -> {} already attached", agent, server);
                }
            }
            ["detach", agent, server] => {
                let removed = self.store.lock().await.detach(agent, server);
                if removed {
                    println!("detached {} -> {}", agent, server);
                } else {
                    println!("{} -> {} was not attached", agent, server);
                }
            }
            ["list"] => {
                let store = self.store.lock().await;
                let servers = store.server_names();
                if servers.is_empty() {
                    println!("no tool servers registered");
                }
                for server in servers {
                    println!("server: {}", server);
                }
            }
            ["list", agent] => {
                let attached = self.store.lock().await.list_for_agent(agent);
                if attached.is_empty() {
                    println!("{} has no attached servers", agent);
                }
                for server in attached {
                    println!("{} -> {}", agent, server);
                }
            }
            ["tools", agent] => {
                let resolution = self.store.lock().await.resolve_tools(agent).await;
                for tool in &resolution.tools {
                    println!("{}  ({})", tool.name, tool.origin);
                }
                for server in &resolution.failed {
                    println!("{}", format!("server '{}' unavailable", server).red());
                }
                if resolution.tools.is_empty() && resolution.failed.is_empty() {
                    println!("{} resolves no tools", agent);
                }
            }
            _ => {
                println!("{}", "usage: /mcp attach|detach|list|tools ...".yellow());
            }
        }
    }

    fn cost(&self) {
        let snapshot = self.metrics.snapshot();
        println!(
            "tokens in/out: {}/{}  tool calls: {}  estimated cost: ${:.6}",
            snapshot.tokens.input,
            snapshot.tokens.output,
            snapshot.tool_calls,
            snapshot.tokens.estimated_cost_usd
        );
    }
}

#[async_trait]
impl CommandHandler for CliCommands {
    async fn handle(&mut self, command: &str, args: &[&str]) -> CommandOutcome {
        match command {
            "/help" => {
                self.help();
                CommandOutcome::Handled
            }
            "/model" => {
                match args {
                    [model] => {
                        self.settings.set_model(*model);
                        println!("model set to {} (applies next turn)", model);
                    }
                    [agent, model] => {
                        self.settings.set_agent_model(*agent, *model);
                        println!(
                            "model for agent {} set to {} (applies next turn)",
                            agent, model
                        );
                    }
                    _ => println!("{}", "usage: /model [agent] <id>".yellow()),
                }
                CommandOutcome::Handled
            }
            "/agent" => match args.first() {
                Some(agent) => {
                    self.settings.set_agent_type(*agent);
                    println!("agent set to {} (applies next turn)", agent);
                    CommandOutcome::Handled
                }
                None => {
                    println!("{}", "usage: /agent <name>".yellow());
                    CommandOutcome::Handled
                }
            },
            "/turns" => {
                match args.first() {
                    Some(&"inf") => self.settings.set_max_turns(None),
                    Some(raw) => match raw.parse() {
                        Ok(limit) => self.settings.set_max_turns(Some(limit)),
                        Err(_) => {
                            println!("{}", "usage: /turns <n|inf>".yellow());
                            return CommandOutcome::Handled;
                        }
                    },
                    None => {
                        println!("{}", "usage: /turns <n|inf>".yellow());
                        return CommandOutcome::Handled;
                    }
                }
                CommandOutcome::Handled
            }
            "/parallel" => {
                if let Some(count) = args.first().and_then(|raw| raw.parse().ok()) {
                    self.settings.set_parallel(count);
                    println!("parallel fan-out set to {}", count);
                } else {
                    println!("{}", "usage: /parallel <n>".yellow());
                }
                CommandOutcome::Handled
            }
            "/mcp" => {
                self.mcp(args).await;
                CommandOutcome::Handled
            }
            "/cost" => {
                self.cost();
                CommandOutcome::Handled
            }
            _ => CommandOutcome::Unknown,
        }
    }
}
