//! Built-in agent roster

use crate::agent::{LlmAgent, LlmAgentProfile};
use crate::config::AgentsConfig;
use crate::registry::{AgentDescriptor, AgentRegistry};
use cortex_core::{Capability, Result, Tier};
use cortex_router::ModelRouter;
use std::sync::Arc;
use tracing::info;

struct Persona {
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    capabilities: &'static [Capability],
    tier: Tier,
    temperature: f32,
    max_tokens: u32,
    system_prompt: &'static str,
}

const RESEARCH_PROMPT: &str = "You are a Research Agent specialized in information retrieval.

Synthesize what you know and what the context provides into accurate answers.
Distinguish facts from inferences, cite sources when the context names them,
and say plainly when information is incomplete.";

const CODE_PROMPT: &str = "You are a Code Agent specialized in software development.

Write clean, well-structured code with proper error handling, and consider
edge cases. Wrap code in fenced blocks tagged with the language, and explain
non-obvious choices briefly.";

const CONTENT_PROMPT: &str = "You are a Content Agent specialized in writing.

Match the requested tone, audience and format (post, article, email, thread).
Open strongly, stay concrete, and keep the voice consistent.";

const VISION_PROMPT: &str = "You are a Vision Agent.

Describe and reason about images, diagrams and screenshots referenced in the
request or context. Be precise about what is visible versus inferred.";

const MEMORY_PROMPT: &str = "You are a Memory Agent specialized in knowledge management.

Organize what the user asks you to remember by topic and importance, recall
relevant facts from the context, and flag contradictions with earlier notes.";

const GENERAL_PROMPT: &str = "You are a helpful personal assistant. Answer clearly and concisely.";

const SUPERVISOR_PROMPT: &str = "You are a Supervisor coordinating a team of specialist agents.

Break the request into steps for the agents listed in the roster. Reply with
a single JSON object and nothing else:
{\"mode\": \"sequential\" | \"parallel\", \"steps\": [{\"agent\": \"<name>\", \"prompt\": \"<instruction>\"}]}
Use \"sequential\" when a step needs the previous step's output. If no agent
is needed, reply with {\"steps\": []} followed by your own answer.";

const PERSONAS: &[Persona] = &[
    Persona {
        name: "research",
        display_name: "Research Agent",
        description: "Information retrieval, analysis and synthesis.",
        capabilities: &[Capability::Research],
        tier: Tier::Balanced,
        temperature: 0.3,
        max_tokens: 2048,
        system_prompt: RESEARCH_PROMPT,
    },
    Persona {
        name: "code",
        display_name: "Code Agent",
        description: "Writing, reviewing and debugging code.",
        capabilities: &[Capability::Code],
        tier: Tier::Coding,
        temperature: 0.2,
        max_tokens: 4096,
        system_prompt: CODE_PROMPT,
    },
    Persona {
        name: "content",
        display_name: "Content Agent",
        description: "Articles, posts, emails and other writing.",
        capabilities: &[Capability::Content],
        tier: Tier::Balanced,
        temperature: 0.8,
        max_tokens: 2048,
        system_prompt: CONTENT_PROMPT,
    },
    Persona {
        name: "vision",
        display_name: "Vision Agent",
        description: "Image and diagram understanding.",
        capabilities: &[Capability::Vision],
        tier: Tier::Vision,
        temperature: 0.4,
        max_tokens: 2048,
        system_prompt: VISION_PROMPT,
    },
    Persona {
        name: "memory",
        display_name: "Memory Agent",
        description: "Storing and recalling personal knowledge.",
        capabilities: &[Capability::Memory, Capability::Research],
        tier: Tier::Fast,
        temperature: 0.3,
        max_tokens: 1024,
        system_prompt: MEMORY_PROMPT,
    },
    Persona {
        name: "general",
        display_name: "Assistant",
        description: "General conversation and anything unclassified.",
        capabilities: &[Capability::General],
        tier: Tier::Balanced,
        temperature: 0.7,
        max_tokens: 2048,
        system_prompt: GENERAL_PROMPT,
    },
    Persona {
        name: "supervisor",
        display_name: "Supervisor",
        description: "Plans multi-agent work for hierarchical workflows.",
        capabilities: &[Capability::General],
        tier: Tier::Smart,
        temperature: 0.5,
        max_tokens: 1024,
        system_prompt: SUPERVISOR_PROMPT,
    },
];

/// Descriptors for every enabled built-in agent, with config overrides applied.
pub fn builtin_agents(router: &Arc<ModelRouter>, overrides: &AgentsConfig) -> Result<Vec<AgentDescriptor>> {
    let mut agents = Vec::with_capacity(PERSONAS.len());
    for persona in PERSONAS {
        let custom = overrides.get(persona.name).cloned().unwrap_or_default();
        if !custom.enabled {
            info!(agent = persona.name, "disabled in config");
            continue;
        }
        let profile = LlmAgentProfile {
            tier: custom.tier.unwrap_or(persona.tier),
            model: custom.model,
            temperature: custom.temperature.unwrap_or(persona.temperature),
            max_tokens: custom.max_tokens.unwrap_or(persona.max_tokens),
            system_prompt: persona.system_prompt.to_string(),
        };
        agents.push(AgentDescriptor::new(
            persona.name,
            persona.display_name,
            persona.description,
            persona.capabilities.iter().copied(),
            Arc::new(LlmAgent::new(profile, Arc::clone(router))),
        )?);
    }
    Ok(agents)
}

/// Registry holding the built-in roster.
pub fn default_registry(router: &Arc<ModelRouter>, overrides: &AgentsConfig) -> Result<AgentRegistry> {
    let mut registry = AgentRegistry::new();
    for agent in builtin_agents(router, overrides)? {
        registry.register(agent)?;
    }
    info!(agents = registry.len(), "agent registry ready");
    Ok(registry)
}
