//! Agent coordinator
//!
//! Resolves a task to one agent or a workflow and runs it. Agent calls never
//! raise: a failed call becomes an [`AgentResponse`] with `error` set, and
//! only workflow-level problems surface as [`CoordinatorError`]. With a
//! [`Synthesizer`] attached, parallel and hierarchical results that have
//! several answers are combined into one reply.

use crate::agent::{AgentError, AgentInput};
use crate::capability::CapabilityMatcher;
use crate::config::CoordinatorConfig;
use crate::registry::{AgentDescriptor, AgentInfo, AgentRegistry};
use crate::response::{AgentResponse, AggregateResponse, CoordinatorResponse, FailureStage, Pattern};
use crate::synthesis::Synthesizer;
use crate::workflow::{extract_plan, strip_plan, PlanMode, Task, Workflow};
use cortex_core::Capability;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("no agent provides capability {0}")]
    NoCapableAgent(Capability),

    #[error("{}", abort_message(.failed))]
    SequenceAborted {
        /// Responses of the steps that completed before the failure.
        partial: Vec<AgentResponse>,
        failed: Box<AgentResponse>,
    },

    #[error("plan failed: {0}")]
    PlanFailed(String),

    #[error("cancelled")]
    Cancelled,
}

fn abort_message(failed: &AgentResponse) -> String {
    match &failed.error {
        Some(e) => format!("sequence aborted at {} ({}): {}", failed.agent, e.stage, e.message),
        None => format!("sequence aborted at {}", failed.agent),
    }
}

/// What a failed step does to the rest of a sequential run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnFailure {
    /// Stop with [`CoordinatorError::SequenceAborted`].
    Abort,
    /// Keep the failed slot and carry on from the last good output.
    Isolate,
}

/// One slot of a workflow. `agent` is `None` when a plan named an agent
/// that isn't registered.
struct Step<'a> {
    name: String,
    agent: Option<&'a AgentDescriptor>,
    prompt: String,
}

fn unknown_slot(name: &str) -> AgentResponse {
    AgentResponse::failed(name, FailureStage::Agent, format!("unknown agent: {}", name), 0)
}

fn merge(contributions: &[AgentResponse]) -> String {
    contributions
        .iter()
        .filter(|c| c.is_ok())
        .map(|c| format!("## {}\n{}", c.agent, c.content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn stage_of(error: &AgentError) -> FailureStage {
    match error {
        AgentError::Route(_) => FailureStage::Routing,
        AgentError::Failed(_) => FailureStage::Agent,
        AgentError::Cancelled => FailureStage::Cancelled,
    }
}

pub struct Coordinator {
    registry: Arc<AgentRegistry>,
    matcher: CapabilityMatcher,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(registry: Arc<AgentRegistry>, config: CoordinatorConfig) -> Self {
        Self {
            registry,
            matcher: CapabilityMatcher::new(),
            synthesizer: None,
            config,
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn list_agents(&self) -> Vec<AgentInfo> {
        self.registry.list()
    }

    /// Hints win; otherwise prompt keywords (when enabled); otherwise `{General}`.
    pub fn required_capabilities(&self, task: &Task) -> BTreeSet<Capability> {
        if !task.hints.is_empty() {
            return task.hints.clone();
        }
        if self.config.infer_capabilities {
            let inferred = self.matcher.infer(&task.prompt);
            if !inferred.is_empty() {
                return inferred;
            }
        }
        BTreeSet::from([Capability::General])
    }

    fn agent(&self, name: &str) -> Result<&AgentDescriptor, CoordinatorError> {
        self.registry
            .get(name)
            .ok_or_else(|| CoordinatorError::UnknownAgent(name.to_string()))
    }

    /// Best agent per required capability, in capability order, de-duplicated.
    pub fn chain_for(&self, required: &BTreeSet<Capability>) -> Result<Vec<&AgentDescriptor>, CoordinatorError> {
        let mut chain: Vec<&AgentDescriptor> = Vec::new();
        for &capability in required {
            let agent = self
                .registry
                .best_for(&BTreeSet::from([capability]))
                .ok_or(CoordinatorError::NoCapableAgent(capability))?;
            if !chain.iter().any(|a| a.name == agent.name) {
                chain.push(agent);
            }
        }
        Ok(chain)
    }

    fn steps_for(&self, names: &[String], task: &Task) -> Result<Vec<Step<'_>>, CoordinatorError> {
        let agents = if names.is_empty() {
            self.chain_for(&self.required_capabilities(task))?
        } else {
            names.iter().map(|n| self.agent(n)).collect::<Result<Vec<_>, _>>()?
        };
        Ok(agents
            .into_iter()
            .map(|a| Step { name: a.name.clone(), agent: Some(a), prompt: task.prompt.clone() })
            .collect())
    }

    pub async fn execute(&self, task: Task, cancel: &CancellationToken) -> Result<CoordinatorResponse, CoordinatorError> {
        if cancel.is_cancelled() {
            return Err(CoordinatorError::Cancelled);
        }

        match &task.workflow {
            Some(Workflow::Sequential { agents }) => {
                let steps = self.steps_for(agents, &task)?;
                let aggregate = self
                    .run_sequential(steps, task.context.clone(), OnFailure::Abort, cancel)
                    .await?;
                return Ok(CoordinatorResponse::Aggregate(aggregate));
            }
            Some(Workflow::Parallel { agents }) => {
                let steps = self.steps_for(agents, &task)?;
                let mut aggregate = self.run_parallel(steps, task.context.clone(), cancel).await?;
                self.synthesize(&task.prompt, &mut aggregate, cancel).await?;
                return Ok(CoordinatorResponse::Aggregate(aggregate));
            }
            Some(Workflow::Hierarchical { supervisor }) => {
                let supervisor = supervisor.as_deref().unwrap_or(&self.config.supervisor);
                return self.run_hierarchical(supervisor, &task, cancel).await;
            }
            None => {}
        }

        let input = AgentInput::new(task.prompt.clone()).with_context(task.context.clone());

        if let Some(target) = &task.target {
            let agent = self.agent(target)?;
            return self.single(agent, &input, cancel).await;
        }

        let required = self.required_capabilities(&task);
        if let Some(agent) = self.registry.best_for(&required) {
            debug!(agent = %agent.name, required = ?required, "selected agent");
            return self.single(agent, &input, cancel).await;
        }

        // no single agent covers the task: one agent per capability, in order
        // when the prompt sequences its parts, side by side otherwise
        let chain = self.chain_for(&required)?;
        let ordered = self.matcher.implies_order(&task.prompt);
        info!(
            required = ?required,
            chain = ?chain.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            ordered,
            "no single agent covers the task, chaining"
        );
        let steps = chain
            .into_iter()
            .map(|a| Step { name: a.name.clone(), agent: Some(a), prompt: task.prompt.clone() })
            .collect();
        let aggregate = if ordered {
            self.run_sequential(steps, task.context.clone(), OnFailure::Abort, cancel).await?
        } else {
            let mut aggregate = self.run_parallel(steps, task.context.clone(), cancel).await?;
            self.synthesize(&task.prompt, &mut aggregate, cancel).await?;
            aggregate
        };
        Ok(CoordinatorResponse::Aggregate(aggregate))
    }

    async fn single(
        &self,
        agent: &AgentDescriptor,
        input: &AgentInput,
        cancel: &CancellationToken,
    ) -> Result<CoordinatorResponse, CoordinatorError> {
        let response = self.invoke(agent, input, cancel).await;
        if cancel.is_cancelled() {
            return Err(CoordinatorError::Cancelled);
        }
        Ok(CoordinatorResponse::Single(response))
    }

    /// Run one agent under the per-agent timeout. Never fails; failures are
    /// recorded on the response.
    async fn invoke(&self, agent: &AgentDescriptor, input: &AgentInput, cancel: &CancellationToken) -> AgentResponse {
        let started = Instant::now();
        let limit = self.config.agent_timeout();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err((FailureStage::Cancelled, "cancelled".to_string())),
            r = tokio::time::timeout(limit, agent.handler.run(input, cancel)) => match r {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err((stage_of(&e), e.to_string())),
                Err(_) => Err((FailureStage::Timeout, format!("no response within {}ms", self.config.agent_timeout_ms))),
            },
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                info!(agent = %agent.name, elapsed_ms, "agent answered");
                AgentResponse::ok(agent.name.clone(), output.content, elapsed_ms, output.metadata)
            }
            Err((stage, message)) => {
                warn!(agent = %agent.name, stage = %stage, elapsed_ms, error = %message, "agent failed");
                AgentResponse::failed(agent.name.clone(), stage, message, elapsed_ms)
            }
        }
    }

    async fn run_step(&self, step: &Step<'_>, input: &AgentInput, cancel: &CancellationToken) -> AgentResponse {
        match step.agent {
            Some(agent) => self.invoke(agent, input, cancel).await,
            None => unknown_slot(&step.name),
        }
    }

    async fn run_sequential(
        &self,
        steps: Vec<Step<'_>>,
        context: Option<String>,
        on_failure: OnFailure,
        cancel: &CancellationToken,
    ) -> Result<AggregateResponse, CoordinatorError> {
        let mut done: Vec<AgentResponse> = Vec::with_capacity(steps.len());

        for step in &steps {
            let mut input = AgentInput::new(step.prompt.clone()).with_context(context.clone());
            if let Some(previous) = done.iter().rev().find(|r| r.is_ok()) {
                input.append_context(&format!("Output from {}", previous.agent), &previous.content);
            }

            let response = self.run_step(step, &input, cancel).await;
            if cancel.is_cancelled() {
                return Err(CoordinatorError::Cancelled);
            }
            if !response.is_ok() {
                if on_failure == OnFailure::Abort {
                    warn!(agent = %response.agent, completed = done.len(), "sequence aborted");
                    return Err(CoordinatorError::SequenceAborted { partial: done, failed: Box::new(response) });
                }
                warn!(agent = %response.agent, step = done.len(), "step failed, continuing");
            }
            done.push(response);
        }

        let content = done
            .iter()
            .rev()
            .find(|r| r.is_ok())
            .map(|r| r.content.clone())
            .unwrap_or_default();
        Ok(AggregateResponse {
            pattern: Pattern::Sequential,
            content,
            contributions: done,
            synthesized: false,
            plan: None,
        })
    }

    async fn run_parallel(
        &self,
        steps: Vec<Step<'_>>,
        context: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<AggregateResponse, CoordinatorError> {
        let branches = steps.iter().map(|step| {
            let branch_cancel = cancel.child_token();
            let input = AgentInput::new(step.prompt.clone()).with_context(context.clone());
            async move {
                let response = self.run_step(step, &input, &branch_cancel).await;
                // anything the branch left running goes with it
                branch_cancel.cancel();
                response
            }
        });
        let contributions = join_all(branches).await;

        if cancel.is_cancelled() {
            return Err(CoordinatorError::Cancelled);
        }

        let failed = contributions.iter().filter(|c| !c.is_ok()).count();
        info!(branches = contributions.len(), failed, "parallel workflow joined");
        Ok(AggregateResponse {
            pattern: Pattern::Parallel,
            content: merge(&contributions),
            contributions,
            synthesized: false,
            plan: None,
        })
    }

    /// Replace the content of an aggregate holding two or more answers with
    /// one synthesized reply. A failed or timed-out synthesis keeps the
    /// content as it was.
    async fn synthesize(
        &self,
        request: &str,
        aggregate: &mut AggregateResponse,
        cancel: &CancellationToken,
    ) -> Result<(), CoordinatorError> {
        let Some(synthesizer) = self.synthesizer.as_ref().filter(|_| self.config.synthesize) else {
            return Ok(());
        };
        let answers: Vec<&AgentResponse> = aggregate.contributions.iter().filter(|c| c.is_ok()).collect();
        if answers.len() < 2 {
            return Ok(());
        }

        let parts = answers.len();
        let outcome =
            tokio::time::timeout(self.config.agent_timeout(), synthesizer.synthesize(request, &answers, cancel)).await;
        if cancel.is_cancelled() {
            return Err(CoordinatorError::Cancelled);
        }
        match outcome {
            Ok(Ok(text)) => {
                debug!(parts, "synthesized aggregate");
                aggregate.content = text;
                aggregate.synthesized = true;
            }
            Ok(Err(e)) => warn!(parts, error = %e, "synthesis failed, keeping merged content"),
            Err(_) => warn!(parts, "synthesis timed out, keeping merged content"),
        }
        Ok(())
    }

    /// Ask the supervisor for a plan and run it one level deep: planned
    /// steps call agents directly and are never planned again. A failed step
    /// keeps its slot in either mode.
    async fn run_hierarchical(
        &self,
        supervisor: &str,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<CoordinatorResponse, CoordinatorError> {
        let lead = self.agent(supervisor)?;

        let roster = self
            .registry
            .iter()
            .filter(|a| a.name != lead.name)
            .map(|a| {
                let caps: Vec<&str> = a.capabilities.iter().map(|c| c.as_str()).collect();
                format!("- {}: {} [{}]", a.name, a.description, caps.join(", "))
            })
            .collect::<Vec<_>>()
            .join("\n");
        let input = AgentInput::new(format!("Agents:\n{}\n\nRequest:\n{}", roster, task.prompt))
            .with_context(task.context.clone());

        let mut reply = self.invoke(lead, &input, cancel).await;
        if cancel.is_cancelled() {
            return Err(CoordinatorError::Cancelled);
        }
        if let Some(failure) = &reply.error {
            return Err(CoordinatorError::PlanFailed(format!(
                "supervisor {} failed at {}: {}",
                lead.name, failure.stage, failure.message
            )));
        }

        let plan = extract_plan(&reply.content).map_err(CoordinatorError::PlanFailed)?;
        if plan.steps.is_empty() {
            debug!(supervisor = %lead.name, "empty plan, supervisor answers directly");
            let answer = strip_plan(&reply.content);
            if !answer.is_empty() {
                reply.content = answer;
            }
            return Ok(CoordinatorResponse::Single(reply));
        }

        info!(supervisor = %lead.name, mode = ?plan.mode, steps = plan.steps.len(), "executing plan");
        let steps = plan
            .steps
            .iter()
            .map(|s| Step {
                name: s.agent.clone(),
                agent: self.registry.get(&s.agent),
                prompt: if s.prompt.trim().is_empty() { task.prompt.clone() } else { s.prompt.clone() },
            })
            .collect();

        let mut aggregate = match plan.mode {
            PlanMode::Sequential => {
                self.run_sequential(steps, task.context.clone(), OnFailure::Isolate, cancel)
                    .await?
            }
            PlanMode::Parallel => self.run_parallel(steps, task.context.clone(), cancel).await?,
        };
        aggregate.pattern = Pattern::Hierarchical;
        aggregate.plan = Some(plan);
        self.synthesize(&task.prompt, &mut aggregate, cancel).await?;
        Ok(CoordinatorResponse::Aggregate(aggregate))
    }
}
