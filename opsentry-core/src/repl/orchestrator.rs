//! Session orchestrator: the interactive turn loop
//!
//! Holds the active agent pointer and drives the per-turn state machine:
//! re-check live settings at the turn boundary, route commands to the
//! external handler, dispatch prompts to the execution engine (single
//! instance or parallel fan-out), classify the outcome, and tear the
//! session down unconditionally on every exit path.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::agents::{rebind, AgentInstance, AgentRegistry};
use crate::config::SettingsSource;
use crate::engine::{EngineRun, ExecutionEngine};
use crate::mcp::AssociationStore;
use crate::pricing::PricingConfig;
use crate::repl::events::SessionEvent;
use crate::session::{MetricsTracker, SessionStatus, SessionStore, TurnOutcome};
use crate::{Error, Result};

/// Stand-in prompt when the user submits an empty line.
const EMPTY_INPUT_NUDGE: &str = "User input is empty, maybe wants to continue";

/// Source of user prompts for the loop. `None` ends the session.
#[async_trait]
pub trait PromptSource: Send {
    async fn next_prompt(&mut self) -> Option<String>;
}

/// A fixed queue of prompts; used for scripted sessions and one-shot runs.
#[derive(Debug, Default)]
pub struct QueuedPrompts {
    queue: VecDeque<String>,
}

impl QueuedPrompts {
    pub fn new(prompts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            queue: prompts.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PromptSource for QueuedPrompts {
    async fn next_prompt(&mut self) -> Option<String> {
        self.queue.pop_front()
    }
}

/// Result of dispatching one command to the external handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The handler dealt with the command.
    Handled,
    /// The handler does not recognize the command.
    Unknown,
    /// The command requests session termination.
    Exit,
}

/// External command handler; commands are collaborator-owned.
#[async_trait]
pub trait CommandHandler: Send {
    async fn handle(&mut self, command: &str, args: &[&str]) -> CommandOutcome;
}

/// Final accounting returned when the loop exits.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub status: SessionStatus,
    pub turns: u32,
    pub total_cost_usd: f64,
}

/// The interactive session loop.
pub struct Orchestrator {
    registry: AgentRegistry,
    store: Arc<Mutex<AssociationStore>>,
    engine: Arc<dyn ExecutionEngine>,
    settings: Arc<dyn SettingsSource>,
    session: SessionStore,
    metrics: MetricsTracker,
    events: mpsc::UnboundedSender<SessionEvent>,
    provider_name: String,

    active_name: String,
    active: AgentInstance,
    last_model: String,
    last_assoc_generation: u64,
    parallel: u32,
    max_turns: Option<u32>,
    turn_count: u32,
    limit_latched: bool,
    idle: Duration,
    active_time: Duration,
    total_cost: f64,
}

impl Orchestrator {
    /// Build the orchestrator and resolve the initial agent.
    ///
    /// Applies the configured model across the initial agent's handoff
    /// graph before the first turn, the same way a live model change
    /// would.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        mut registry: AgentRegistry,
        store: Arc<Mutex<AssociationStore>>,
        engine: Arc<dyn ExecutionEngine>,
        settings: Arc<dyn SettingsSource>,
        session: SessionStore,
        metrics: MetricsTracker,
        events: mpsc::UnboundedSender<SessionEvent>,
        provider_name: impl Into<String>,
    ) -> Result<Self> {
        let snapshot = settings.snapshot();
        let agent_type = snapshot.agent_type.clone();
        let model = settings
            .agent_model_override(&agent_type)
            .unwrap_or_else(|| snapshot.model.clone());

        rebind(&mut registry, &agent_type, &model)?;
        let (active, generation) =
            Self::build_instance(&registry, &store, &agent_type, &events).await?;

        Ok(Self {
            registry,
            store,
            engine,
            settings,
            session,
            metrics,
            events,
            provider_name: provider_name.into(),
            active_name: agent_type,
            active,
            last_model: model,
            last_assoc_generation: generation,
            parallel: snapshot.parallel,
            max_turns: snapshot.max_turns,
            turn_count: 0,
            limit_latched: false,
            idle: Duration::ZERO,
            active_time: Duration::ZERO,
            total_cost: 0.0,
        })
    }

    /// Run the loop until the prompt source is exhausted, an exit command
    /// arrives, or the session is cancelled. Teardown is unconditional.
    pub async fn run(
        &mut self,
        prompts: &mut dyn PromptSource,
        commands: &mut dyn CommandHandler,
        cancel: CancellationToken,
        initial_prompt: Option<String>,
    ) -> Result<SessionSummary> {
        let mut pending = initial_prompt;
        let mut status = SessionStatus::Completed;

        loop {
            // Turn boundary: configuration changes land here, never mid-turn.
            if let Err(e) = self.refresh_configuration().await {
                self.notice(format!("Configuration error: {}", e));
            }

            let limit_reached = self.limit_reached();
            if limit_reached && !self.limit_latched {
                self.limit_latched = true;
                self.send(SessionEvent::TurnLimitReached {
                    limit: self.max_turns.unwrap_or_default(),
                });
            }

            // Await input, tracking idle wall-time.
            let idle_start = Instant::now();
            let input = if let Some(prompt) = pending.take() {
                Some(prompt)
            } else {
                tokio::select! {
                    input = prompts.next_prompt() => input,
                    () = cancel.cancelled() => {
                        status = SessionStatus::Interrupted;
                        break;
                    }
                }
            };
            self.idle += idle_start.elapsed();

            let Some(raw) = input else {
                break;
            };

            let input = if raw.trim().is_empty() {
                EMPTY_INPUT_NUDGE.to_string()
            } else {
                raw.trim().to_string()
            };

            // Commands route to the external handler; `/exit` and `/quit`
            // terminate directly.
            if input.starts_with('/') || input.starts_with('$') {
                let mut parts = input.split_whitespace();
                let command = parts.next().unwrap_or_default();
                let args: Vec<&str> = parts.collect();

                if command == "/exit" || command == "/quit" {
                    break;
                }

                match commands.handle(command, &args).await {
                    CommandOutcome::Handled => {}
                    CommandOutcome::Exit => break,
                    CommandOutcome::Unknown => {
                        self.notice(format!("Unknown command: {}", command));
                    }
                }
                continue;
            }

            // Turn-limit refusal: the prompt is rejected without touching
            // the turn counter; commands above remain available.
            if limit_reached {
                self.notice("Turn limit reached. Only commands are accepted.".to_string());
                continue;
            }

            let active_start = Instant::now();
            let finished = if self.parallel > 1 {
                self.execute_fanout(&input, &cancel).await
            } else {
                self.execute_single(&input, &cancel).await
            };
            self.active_time += active_start.elapsed();

            if !finished {
                status = SessionStatus::Interrupted;
                break;
            }
        }

        self.teardown(status)
    }

    /// Re-check live settings; apply model rebinds, agent switches and
    /// association changes before the next input is accepted.
    async fn refresh_configuration(&mut self) -> Result<()> {
        let snapshot = self.settings.snapshot();

        // Agent switch first, so the desired model below applies to the
        // new agent's handoff graph.
        let mut switched = false;
        if snapshot.agent_type != self.active_name {
            match self.registry.resolve(&snapshot.agent_type) {
                Ok(_) => {
                    self.active_name = snapshot.agent_type.clone();
                    switched = true;
                    self.send(SessionEvent::AgentSwitched {
                        agent: self.active_name.clone(),
                    });
                }
                Err(e) => {
                    warn!(agent = %snapshot.agent_type, "requested agent not registered");
                    self.notice(format!("{}", e));
                }
            }
        }

        let desired_model = self
            .settings
            .agent_model_override(&self.active_name)
            .unwrap_or_else(|| snapshot.model.clone());

        if switched || desired_model != self.last_model {
            let report = rebind(&mut self.registry, &self.active_name, &desired_model)?;
            if desired_model != self.last_model {
                self.send(SessionEvent::ModelRebound {
                    model: report.model.clone(),
                    agents: report.visit_count(),
                });
            }
            self.last_model = desired_model;
            self.rebuild_active().await?;
        }

        let generation = self.store.lock().await.generation();
        if generation != self.last_assoc_generation {
            self.rebuild_active().await?;
        }

        if snapshot.max_turns != self.max_turns {
            self.max_turns = snapshot.max_turns;
            if self.limit_latched && !self.limit_reached() {
                self.limit_latched = false;
                self.send(SessionEvent::TurnLimitLifted);
            }
        }

        self.parallel = snapshot.parallel;
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        matches!(self.max_turns, Some(limit) if self.turn_count >= limit)
    }

    async fn rebuild_active(&mut self) -> Result<()> {
        let (instance, generation) = Self::build_instance(
            &self.registry,
            &self.store,
            &self.active_name,
            &self.events,
        )
        .await?;
        self.active = instance;
        self.last_assoc_generation = generation;
        Ok(())
    }

    /// Resolve the agent spec and its attached tool servers into a fresh
    /// runnable instance.
    async fn build_instance(
        registry: &AgentRegistry,
        store: &Arc<Mutex<AssociationStore>>,
        agent: &str,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<(AgentInstance, u64)> {
        let spec = registry.resolve(agent)?;
        let store = store.lock().await;
        let resolution = store.resolve_tools(agent).await;
        let generation = store.generation();
        drop(store);

        if resolution.is_partial() {
            let _ = events.send(SessionEvent::ToolServersFailed {
                servers: resolution.failed.clone(),
            });
        }
        for collision in &resolution.collisions {
            let _ = events.send(SessionEvent::Notice(format!(
                "Tool '{}' from '{}' shadows the one from '{}'",
                collision.tool, collision.kept_from, collision.shadowed_from
            )));
        }

        Ok((AgentInstance::from_spec(spec, resolution.tools), generation))
    }

    /// Execute one single-instance turn. Returns false if the session was
    /// cancelled mid-flight (the turn is abandoned, not counted).
    async fn execute_single(&mut self, prompt: &str, cancel: &CancellationToken) -> bool {
        let instance = self.active.clone();
        let result = tokio::select! {
            result = self.engine.run(&instance, prompt) => result,
            () = cancel.cancelled() => return false,
        };

        let outcome = self.classify(&instance, prompt, result);
        self.finish_turn(prompt, outcome);
        true
    }

    /// Execute one fan-out turn: N isolated instances against the same
    /// prompt. All branches complete (or individually fail) before the
    /// combined result is displayed and the turn counter advances once.
    async fn execute_fanout(&mut self, prompt: &str, cancel: &CancellationToken) -> bool {
        let count = self.parallel;
        let mut set: JoinSet<(u32, Result<EngineRun>)> = JoinSet::new();

        for index in 1..=count {
            let branch = self.active.branch(index);
            let engine = Arc::clone(&self.engine);
            let prompt = prompt.to_string();
            set.spawn(async move { (index, engine.run(&branch, &prompt).await) });
        }

        let mut results: Vec<(u32, Result<EngineRun>)> = Vec::with_capacity(count as usize);
        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    Some(Ok(pair)) => results.push(pair),
                    Some(Err(join_err)) => {
                        error!(error = %join_err, "fan-out branch task failed");
                        results.push((0, Err(Error::Provider(join_err.to_string()))));
                    }
                    None => break,
                },
                () = cancel.cancelled() => {
                    // Abandon in-flight branches, do not await them.
                    set.abort_all();
                    return false;
                }
            }
        }

        results.sort_by_key(|(index, _)| *index);

        let mut transcript = String::new();
        let mut turn_cost = 0.0;
        let mut successes = 0u32;
        let mut blocked = 0u32;
        for (index, result) in results {
            let branch = self.active.branch(index.max(1));
            match self.classify(&branch, prompt, result) {
                ClassifiedTurn::Success { output, cost } => {
                    successes += 1;
                    turn_cost += cost;
                    transcript.push_str(&format!("[P{}] {}\n", index, output));
                }
                ClassifiedTurn::Blocked { .. } => blocked += 1,
                ClassifiedTurn::Error { .. } => {}
            }
        }

        let outcome = if successes > 0 {
            TurnOutcome::Success
        } else if blocked == count {
            TurnOutcome::Blocked
        } else {
            TurnOutcome::Error
        };

        self.total_cost += turn_cost;
        self.turn_count += 1;
        if let Err(e) =
            self.session
                .record_turn(&self.active.name, prompt, outcome, &transcript, turn_cost)
        {
            warn!(error = %e, "failed to record fan-out turn");
        }
        true
    }

    /// Classify an engine result, emit the matching event, and return the
    /// per-branch accounting. Guardrail-vetoed turns are never charged.
    fn classify(
        &mut self,
        instance: &AgentInstance,
        _prompt: &str,
        result: Result<EngineRun>,
    ) -> ClassifiedTurn {
        match result {
            Ok(run) => {
                let cost = PricingConfig::load().calculate_cost(
                    &self.provider_name,
                    &instance.model,
                    run.usage.input_tokens,
                    run.usage.output_tokens,
                );
                self.send(SessionEvent::Output {
                    agent: instance.display_name.clone(),
                    text: run.output.clone(),
                });

                // Mirror the turn's tool activity into the spec's model
                // binding; a later rebind clears it.
                if let Ok(spec) = self.registry.resolve_mut(&instance.name) {
                    spec.binding_mut()
                        .note_bound(format!("{}/{}", self.provider_name, instance.model));
                    if !run.tool_calls.is_empty() {
                        spec.binding_mut()
                            .record_tool_activity(run.tool_calls.clone(), vec![]);
                    }
                }

                ClassifiedTurn::Success {
                    output: run.output,
                    cost,
                }
            }
            Err(e) if e.is_guardrail() => {
                let guardrail = match &e {
                    Error::InputGuardrail(name) | Error::OutputGuardrail(name) => name.clone(),
                    _ => unreachable!(),
                };
                self.send(SessionEvent::Blocked {
                    agent: instance.display_name.clone(),
                    guardrail: guardrail.clone(),
                });
                ClassifiedTurn::Blocked { guardrail }
            }
            Err(e) => {
                error!(agent = %instance.name, error = %e, "turn execution failed");
                self.send(SessionEvent::TurnError {
                    agent: instance.display_name.clone(),
                    message: e.to_string(),
                });
                ClassifiedTurn::Error {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Account for a completed single-instance turn. A failed turn still
    /// counts as a turn.
    fn finish_turn(&mut self, prompt: &str, outcome: ClassifiedTurn) {
        let (turn_outcome, output, cost) = match outcome {
            ClassifiedTurn::Success { output, cost } => (TurnOutcome::Success, output, cost),
            ClassifiedTurn::Blocked { guardrail } => (TurnOutcome::Blocked, guardrail, 0.0),
            ClassifiedTurn::Error { message } => (TurnOutcome::Error, message, 0.0),
        };

        self.total_cost += cost;
        self.turn_count += 1;
        if let Err(e) =
            self.session
                .record_turn(&self.active.name, prompt, turn_outcome, &output, cost)
        {
            warn!(error = %e, "failed to record turn");
        }
    }

    /// Unconditional teardown: flush the cost total and metrics, write
    /// the session-end record, and report the summary.
    fn teardown(&mut self, status: SessionStatus) -> Result<SessionSummary> {
        debug!(
            status = status.as_str(),
            turns = self.turn_count,
            cost = self.total_cost,
            "session teardown"
        );

        self.session.finalize(
            status,
            self.total_cost,
            self.turn_count,
            self.idle,
            self.active_time,
            &self.metrics,
        )?;

        self.send(SessionEvent::SessionEnded {
            status,
            total_cost_usd: self.total_cost,
            turns: self.turn_count,
        });

        Ok(SessionSummary {
            status,
            turns: self.turn_count,
            total_cost_usd: self.total_cost,
        })
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.total_cost
    }

    pub fn active_agent(&self) -> &str {
        &self.active_name
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn notice(&self, message: String) {
        self.send(SessionEvent::Notice(message));
    }

    fn send(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

/// Per-branch classification of an engine result.
enum ClassifiedTurn {
    Success { output: String, cost: f64 },
    Blocked { guardrail: String },
    Error { message: String },
}
