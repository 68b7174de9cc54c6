//! Cortex Agent - capability-routed agents and multi-agent workflows

pub mod agent;
pub mod builtin;
pub mod capability;
pub mod config;
pub mod coordinator;
pub mod registry;
pub mod response;
pub mod synthesis;
pub mod workflow;

pub use agent::{AgentError, AgentHandler, AgentInput, AgentOutput, LlmAgent, LlmAgentProfile};
pub use builtin::{builtin_agents, default_registry};
pub use capability::CapabilityMatcher;
pub use config::{AgentOverride, AgentsConfig, CoordinatorConfig};
pub use coordinator::{Coordinator, CoordinatorError};
pub use registry::{AgentDescriptor, AgentInfo, AgentRegistry};
pub use response::{AgentFailure, AgentResponse, AggregateResponse, CoordinatorResponse, FailureStage, Pattern};
pub use synthesis::{RouterSynthesizer, Synthesizer};
pub use workflow::{extract_plan, Plan, PlanMode, PlanStep, Task, Workflow};
