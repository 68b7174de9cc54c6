//! Tests for cortex-agent: registry, selection, workflow patterns, and built-in agents

use cortex_agent::*;
use cortex_core::{Capability, Error, Tier};
use cortex_llm::{CancellationToken, LlmProvider, MockProvider};
use cortex_router::{ModelEntry, ModelRegistry, ModelRouter, RouteError, RouterConfig};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ===========================================================================
// Scripted agents
// ===========================================================================

#[derive(Clone)]
enum Script {
    Reply(&'static str),
    /// Reply with the prompt and whatever context arrived.
    Echo,
    Slow(Duration),
    Fail(&'static str),
    NoRoute,
}

struct ScriptedAgent {
    script: Script,
    calls: AtomicUsize,
    inputs: Mutex<Vec<AgentInput>>,
}

impl ScriptedAgent {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self { script, calls: AtomicUsize::new(0), inputs: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_input(&self) -> AgentInput {
        self.inputs.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl AgentHandler for ScriptedAgent {
    async fn run(&self, input: &AgentInput, cancel: &CancellationToken) -> Result<AgentOutput, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(input.clone());
        let content = match &self.script {
            Script::Reply(text) => text.to_string(),
            Script::Echo => format!("{} | {}", input.prompt, input.context.clone().unwrap_or_default()),
            Script::Slow(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => "finally".to_string(),
                    _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                }
            }
            Script::Fail(msg) => return Err(AgentError::Failed(msg.to_string())),
            Script::NoRoute => return Err(AgentError::Route(RouteError::NoProviderAvailable { attempts: vec![] })),
        };
        Ok(AgentOutput { content, ..Default::default() })
    }
}

/// Joins the agent names it was given, or fails when told to.
#[derive(Default)]
struct ScriptedSynthesizer {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize(
        &self,
        _request: &str,
        contributions: &[&AgentResponse],
        _cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AgentError::Failed("synthesis model down".into()));
        }
        let names: Vec<&str> = contributions.iter().map(|c| c.agent.as_str()).collect();
        Ok(format!("combined: {}", names.join("+")))
    }
}

struct Fixture {
    coordinator: Coordinator,
    agents: HashMap<&'static str, Arc<ScriptedAgent>>,
}

impl Fixture {
    fn new(specs: Vec<(&'static str, Vec<Capability>, Script)>) -> Self {
        Self::with_config(specs, CoordinatorConfig::default())
    }

    fn with_config(specs: Vec<(&'static str, Vec<Capability>, Script)>, config: CoordinatorConfig) -> Self {
        let mut registry = AgentRegistry::new();
        let mut agents = HashMap::new();
        for (name, caps, script) in specs {
            let agent = ScriptedAgent::new(script);
            registry
                .register(AgentDescriptor::new(name, name, format!("{name} agent"), caps, agent.clone()).unwrap())
                .unwrap();
            agents.insert(name, agent);
        }
        Self { coordinator: Coordinator::new(Arc::new(registry), config), agents }
    }

    fn synthesized_by(self, synthesizer: Arc<ScriptedSynthesizer>) -> Self {
        Self { coordinator: self.coordinator.with_synthesizer(synthesizer), agents: self.agents }
    }

    async fn run(&self, task: Task) -> Result<CoordinatorResponse, CoordinatorError> {
        self.coordinator.execute(task, &CancellationToken::new()).await
    }

    fn calls(&self, name: &str) -> usize {
        self.agents[name].calls()
    }
}

fn single(response: CoordinatorResponse) -> AgentResponse {
    match response {
        CoordinatorResponse::Single(r) => r,
        other => panic!("expected single response, got {other:?}"),
    }
}

fn aggregate(response: CoordinatorResponse) -> AggregateResponse {
    match response {
        CoordinatorResponse::Aggregate(a) => a,
        other => panic!("expected aggregate response, got {other:?}"),
    }
}

// ===========================================================================
// Registry
// ===========================================================================

#[test]
fn descriptor_requires_capabilities() {
    let err = AgentDescriptor::new("x", "X", "", vec![], ScriptedAgent::new(Script::Echo)).unwrap_err();
    assert!(matches!(err, Error::EmptyCapabilities(name) if name == "x"));
}

#[test]
fn duplicate_registration_rejected() {
    let mut registry = AgentRegistry::new();
    let make = || AgentDescriptor::new("a", "A", "", [Capability::Code], ScriptedAgent::new(Script::Echo)).unwrap();
    registry.register(make()).unwrap();
    assert!(matches!(registry.register(make()), Err(Error::DuplicateAgent(n)) if n == "a"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn find_and_lookup() {
    let f = Fixture::new(vec![
        ("first", vec![Capability::Research], Script::Echo),
        ("second", vec![Capability::Research, Capability::Memory], Script::Echo),
    ]);
    let reg = f.coordinator.registry();
    let names: Vec<&str> = reg.find(Capability::Research).iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert!(reg.find(Capability::Vision).is_empty());
    assert!(matches!(reg.by_name("nope"), Err(Error::UnknownAgent(_))));
}

#[test]
fn list_agents_is_serializable() {
    let f = Fixture::new(vec![("code", vec![Capability::Code], Script::Echo)]);
    let json = serde_json::to_value(f.coordinator.list_agents()).unwrap();
    assert_eq!(json[0]["name"], "code");
    assert_eq!(json[0]["capabilities"][0], "code");
}

// ===========================================================================
// Single-agent selection
// ===========================================================================

#[tokio::test]
async fn code_task_goes_to_code_agent() {
    let f = Fixture::new(vec![
        ("research", vec![Capability::Research], Script::Reply("r")),
        ("code", vec![Capability::Code], Script::Reply("c")),
    ]);
    let r = single(f.run(Task::new("anything").hint(Capability::Code)).await.unwrap());
    assert_eq!(r.agent, "code");
    assert_eq!(f.calls("research"), 0);
}

#[tokio::test]
async fn fewest_extra_capabilities_wins() {
    let f = Fixture::new(vec![
        ("broad", vec![Capability::Code, Capability::Research, Capability::Content], Script::Reply("b")),
        ("narrow", vec![Capability::Code], Script::Reply("n")),
    ]);
    let r = single(f.run(Task::new("x").hint(Capability::Code)).await.unwrap());
    assert_eq!(r.agent, "narrow");
}

#[tokio::test]
async fn ties_go_to_first_registered() {
    let f = Fixture::new(vec![
        ("one", vec![Capability::Content], Script::Reply("1")),
        ("two", vec![Capability::Content], Script::Reply("2")),
    ]);
    assert_eq!(single(f.run(Task::new("x").hint(Capability::Content)).await.unwrap()).agent, "one");
}

#[tokio::test]
async fn selected_agent_always_covers_requirement() {
    let f = Fixture::new(vec![
        ("research", vec![Capability::Research], Script::Echo),
        ("code", vec![Capability::Code], Script::Echo),
        ("both", vec![Capability::Code, Capability::Research, Capability::Vision], Script::Echo),
        ("general", vec![Capability::General], Script::Echo),
    ]);
    let reg = f.coordinator.registry();
    for required in [
        BTreeSet::from([Capability::Code]),
        BTreeSet::from([Capability::Research]),
        BTreeSet::from([Capability::Code, Capability::Research]),
        BTreeSet::from([Capability::Vision]),
    ] {
        let mut task = Task::new("x");
        task.hints = required.clone();
        let r = single(f.run(task).await.unwrap());
        assert!(reg.by_name(&r.agent).unwrap().covers(&required), "{} lacks {:?}", r.agent, required);
    }
}

#[tokio::test]
async fn keywords_infer_capability() {
    let f = Fixture::new(vec![
        ("general", vec![Capability::General], Script::Reply("g")),
        ("code", vec![Capability::Code], Script::Reply("c")),
    ]);
    assert_eq!(single(f.run(Task::new("please debug my function")).await.unwrap()).agent, "code");
    assert_eq!(single(f.run(Task::new("good morning")).await.unwrap()).agent, "general");
}

#[tokio::test]
async fn inference_can_be_disabled() {
    let config = CoordinatorConfig { infer_capabilities: false, ..Default::default() };
    let f = Fixture::with_config(
        vec![
            ("general", vec![Capability::General], Script::Reply("g")),
            ("code", vec![Capability::Code], Script::Reply("c")),
        ],
        config,
    );
    assert_eq!(single(f.run(Task::new("debug this")).await.unwrap()).agent, "general");
}

#[tokio::test]
async fn explicit_target() {
    let f = Fixture::new(vec![("a", vec![Capability::General], Script::Reply("hi"))]);
    assert_eq!(single(f.run(Task::new("x").target("a")).await.unwrap()).content, "hi");
    assert!(matches!(f.run(Task::new("x").target("zzz")).await, Err(CoordinatorError::UnknownAgent(n)) if n == "zzz"));
}

#[tokio::test]
async fn routing_failure_is_a_failed_response_not_an_error() {
    let f = Fixture::new(vec![("a", vec![Capability::General], Script::NoRoute)]);
    let r = single(f.run(Task::new("x")).await.unwrap());
    let failure = r.error.unwrap();
    assert_eq!(failure.stage, FailureStage::Routing);
    assert!(failure.message.starts_with("no provider available"));
    assert_eq!(f.calls("a"), 1, "no coordinator-level retry");
}

// ===========================================================================
// Implicit chains
// ===========================================================================

#[tokio::test]
async fn uncovered_requirement_chains_agents() {
    let f = Fixture::new(vec![
        ("writer", vec![Capability::Content], Script::Echo),
        ("researcher", vec![Capability::Research], Script::Reply("facts")),
    ]);
    let task = Task::new("research then write").hint(Capability::Content).hint(Capability::Research);
    let a = aggregate(f.run(task).await.unwrap());

    // capability order: Research before Content
    let order: Vec<&str> = a.contributions.iter().map(|c| c.agent.as_str()).collect();
    assert_eq!(order, vec!["researcher", "writer"]);
    assert!(f.agents["writer"].last_input().context.unwrap().contains("[Output from researcher]\nfacts"));
    assert_eq!(a.content, a.contributions[1].content);
}

#[tokio::test]
async fn unordered_requirement_runs_agents_side_by_side() {
    let f = Fixture::new(vec![
        ("writer", vec![Capability::Content], Script::Slow(Duration::from_millis(100))),
        ("researcher", vec![Capability::Research], Script::Slow(Duration::from_millis(100))),
    ]);
    let started = std::time::Instant::now();
    let task = Task::new("research and write").hint(Capability::Content).hint(Capability::Research);
    let a = aggregate(f.run(task).await.unwrap());

    assert_eq!(a.pattern, Pattern::Parallel);
    assert_eq!(a.contributions.len(), 2);
    assert!(started.elapsed() < Duration::from_millis(180));
    assert!(f.agents["writer"].last_input().context.is_none());
}

#[tokio::test]
async fn missing_capability_fails() {
    let f = Fixture::new(vec![("code", vec![Capability::Code], Script::Echo)]);
    let err = f.run(Task::new("x").hint(Capability::Code).hint(Capability::Vision)).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::NoCapableAgent(Capability::Vision)));
    assert_eq!(f.calls("code"), 0);
}

// ===========================================================================
// Sequential
// ===========================================================================

#[tokio::test]
async fn sequential_passes_output_forward() {
    let f = Fixture::new(vec![
        ("a", vec![Capability::Research], Script::Reply("step one")),
        ("b", vec![Capability::Content], Script::Echo),
    ]);
    let task = Task::new("go")
        .context("user notes")
        .workflow(Workflow::Sequential { agents: vec!["a".into(), "b".into()] });
    let a = aggregate(f.run(task).await.unwrap());
    assert_eq!(a.pattern, Pattern::Sequential);
    assert_eq!(a.content, "go | user notes\n\n[Output from a]\nstep one");
}

#[tokio::test]
async fn sequential_abort_keeps_partial_output() {
    let f = Fixture::new(vec![
        ("a", vec![Capability::Research], Script::Reply("done")),
        ("b", vec![Capability::Code], Script::Fail("exploded")),
        ("c", vec![Capability::Content], Script::Echo),
    ]);
    let task = Task::new("go").workflow(Workflow::Sequential { agents: vec!["a".into(), "b".into(), "c".into()] });
    match f.run(task).await.unwrap_err() {
        CoordinatorError::SequenceAborted { partial, failed } => {
            assert_eq!(partial.len(), 1);
            assert_eq!(partial[0].content, "done");
            assert_eq!(failed.agent, "b");
            assert_eq!(failed.error.as_ref().unwrap().stage, FailureStage::Agent);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(f.calls("c"), 0);
}

#[tokio::test]
async fn workflow_with_unknown_agent_fails_before_running() {
    let f = Fixture::new(vec![("a", vec![Capability::Research], Script::Echo)]);
    let task = Task::new("go").workflow(Workflow::Sequential { agents: vec!["a".into(), "ghost".into()] });
    assert!(matches!(f.run(task).await, Err(CoordinatorError::UnknownAgent(_))));
    assert_eq!(f.calls("a"), 0);
}

// ===========================================================================
// Parallel
// ===========================================================================

#[tokio::test]
async fn parallel_keeps_timed_out_slot() {
    let config = CoordinatorConfig { agent_timeout_ms: 50, ..Default::default() };
    let f = Fixture::with_config(
        vec![
            ("a", vec![Capability::Research], Script::Reply("alpha")),
            ("b", vec![Capability::Code], Script::Slow(Duration::from_secs(10))),
        ],
        config,
    );
    let task = Task::new("go").workflow(Workflow::Parallel { agents: vec!["a".into(), "b".into()] });
    let a = aggregate(f.run(task).await.unwrap());

    assert_eq!(a.contributions.len(), 2);
    assert_eq!(a.contributions[0].agent, "a");
    assert!(a.contributions[0].is_ok());
    assert_eq!(a.contributions[1].error.as_ref().unwrap().stage, FailureStage::Timeout);
    assert!(a.content.contains("alpha"));
    assert_eq!(a.failures().count(), 1);
}

#[tokio::test]
async fn parallel_branches_run_concurrently() {
    let f = Fixture::new(vec![
        ("a", vec![Capability::Research], Script::Slow(Duration::from_millis(100))),
        ("b", vec![Capability::Code], Script::Slow(Duration::from_millis(100))),
        ("c", vec![Capability::Content], Script::Slow(Duration::from_millis(100))),
    ]);
    let started = std::time::Instant::now();
    let task = Task::new("go")
        .workflow(Workflow::Parallel { agents: vec![] })
        .hint(Capability::Research)
        .hint(Capability::Code)
        .hint(Capability::Content);
    let a = aggregate(f.run(task).await.unwrap());
    assert_eq!(a.contributions.len(), 3, "empty list means one agent per capability");
    assert!(started.elapsed() < Duration::from_millis(280));
}

#[tokio::test]
async fn outer_cancel_reaches_every_branch() {
    let f = Fixture::new(vec![
        ("a", vec![Capability::Research], Script::Slow(Duration::from_secs(10))),
        ("b", vec![Capability::Code], Script::Slow(Duration::from_secs(10))),
    ]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let task = Task::new("go").workflow(Workflow::Parallel { agents: vec!["a".into(), "b".into()] });
    let started = std::time::Instant::now();
    let err = f.coordinator.execute(task, &cancel).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

// ===========================================================================
// Hierarchical
// ===========================================================================

#[tokio::test]
async fn hierarchical_runs_plan_with_failed_slots() {
    let f = Fixture::new(vec![
        (
            "boss",
            vec![Capability::General],
            Script::Reply(r#"Plan: {"mode":"parallel","steps":[{"agent":"a","prompt":"part one"},{"agent":"ghost"}]}"#),
        ),
        ("a", vec![Capability::Research], Script::Echo),
    ]);
    let task = Task::new("big job").workflow(Workflow::Hierarchical { supervisor: Some("boss".into()) });
    let a = aggregate(f.run(task).await.unwrap());

    assert_eq!(a.pattern, Pattern::Hierarchical);
    assert_eq!(a.plan.as_ref().unwrap().mode, PlanMode::Parallel);
    assert_eq!(a.contributions[0].content, "part one | ");
    assert_eq!(a.contributions[1].agent, "ghost");
    assert_eq!(a.contributions[1].error.as_ref().unwrap().stage, FailureStage::Agent);

    let roster_prompt = f.agents["boss"].last_input().prompt;
    assert!(roster_prompt.contains("- a: a agent [research]"));
    assert!(!roster_prompt.contains("- boss"));
}

#[tokio::test]
async fn hierarchical_sequential_plan_isolates_failed_step() {
    let f = Fixture::new(vec![
        (
            "boss",
            vec![Capability::General],
            Script::Reply(r#"{"mode":"sequential","steps":[{"agent":"a"},{"agent":"bad"},{"agent":"c"}]}"#),
        ),
        ("a", vec![Capability::Research], Script::Reply("from a")),
        ("bad", vec![Capability::Code], Script::Fail("boom")),
        ("c", vec![Capability::Content], Script::Echo),
    ]);
    let task = Task::new("job").workflow(Workflow::Hierarchical { supervisor: Some("boss".into()) });
    let a = aggregate(f.run(task).await.unwrap());

    assert_eq!(a.pattern, Pattern::Hierarchical);
    let slots: Vec<(&str, bool)> = a.contributions.iter().map(|c| (c.agent.as_str(), c.is_ok())).collect();
    assert_eq!(slots, vec![("a", true), ("bad", false), ("c", true)]);
    assert_eq!(a.contributions[1].error.as_ref().unwrap().message, "boom");
    assert_eq!(f.calls("c"), 1);
    // c picks up from the last step that worked
    assert_eq!(a.content, "job | [Output from a]\nfrom a");
}

#[tokio::test]
async fn hierarchical_falls_back_to_configured_supervisor() {
    let config = CoordinatorConfig { supervisor: "boss".into(), ..Default::default() };
    let f = Fixture::with_config(
        vec![("boss", vec![Capability::General], Script::Reply("{\"steps\": []} It's 4."))],
        config,
    );
    let r = single(f.run(Task::new("2+2").workflow(Workflow::Hierarchical { supervisor: None })).await.unwrap());
    assert_eq!(r.agent, "boss");

    let f = Fixture::new(vec![("boss", vec![Capability::General], Script::Echo)]);
    let err = f.run(Task::new("x").workflow(Workflow::Hierarchical { supervisor: None })).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::UnknownAgent(n) if n == "supervisor"));
}

#[tokio::test]
async fn hierarchical_depth_is_one_level() {
    // The plan names the supervisor itself; it runs as a plain step.
    let f = Fixture::new(vec![(
        "boss",
        vec![Capability::General],
        Script::Reply(r#"{"steps":[{"agent":"boss","prompt":"again"}]}"#),
    )]);
    let task = Task::new("loop?").workflow(Workflow::Hierarchical { supervisor: Some("boss".into()) });
    let a = aggregate(f.run(task).await.unwrap());
    assert_eq!(a.contributions.len(), 1);
    assert_eq!(f.calls("boss"), 2);
}

#[tokio::test]
async fn hierarchical_empty_plan_answers_directly() {
    let f = Fixture::new(vec![("boss", vec![Capability::General], Script::Reply("{\"steps\": []} It's 4."))]);
    let task = Task::new("2+2").workflow(Workflow::Hierarchical { supervisor: Some("boss".into()) });
    let r = single(f.run(task).await.unwrap());
    assert_eq!(r.content, "It's 4.");
}

#[tokio::test]
async fn hierarchical_bad_plan_fails() {
    let f = Fixture::new(vec![
        ("boss", vec![Capability::General], Script::Reply("I would rather not")),
        ("sad", vec![Capability::Research], Script::Fail("nope")),
    ]);
    let task = Task::new("x").workflow(Workflow::Hierarchical { supervisor: Some("boss".into()) });
    assert!(matches!(f.run(task).await, Err(CoordinatorError::PlanFailed(_))));

    let task = Task::new("x").workflow(Workflow::Hierarchical { supervisor: Some("sad".into()) });
    assert!(matches!(f.run(task).await, Err(CoordinatorError::PlanFailed(m)) if m.contains("nope")));
}

// ===========================================================================
// Synthesis
// ===========================================================================

fn three_way(synthesizer: Arc<ScriptedSynthesizer>) -> Fixture {
    Fixture::new(vec![
        ("a", vec![Capability::Research], Script::Reply("alpha")),
        ("b", vec![Capability::Code], Script::Reply("beta")),
        ("c", vec![Capability::Content], Script::Fail("down")),
    ])
    .synthesized_by(synthesizer)
}

fn parallel_of(agents: &[&str]) -> Task {
    Task::new("go").workflow(Workflow::Parallel { agents: agents.iter().map(|a| a.to_string()).collect() })
}

#[tokio::test]
async fn parallel_answers_are_synthesized() {
    let synthesizer = Arc::new(ScriptedSynthesizer::default());
    let f = three_way(synthesizer.clone());
    let a = aggregate(f.run(parallel_of(&["a", "b", "c"])).await.unwrap());

    assert!(a.synthesized);
    assert_eq!(a.content, "combined: a+b");
    assert_eq!(a.contributions.len(), 3);
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_synthesis_keeps_merged_content() {
    let f = three_way(Arc::new(ScriptedSynthesizer { fail: true, ..Default::default() }));
    let a = aggregate(f.run(parallel_of(&["a", "b", "c"])).await.unwrap());
    assert!(!a.synthesized);
    assert_eq!(a.content, "## a\nalpha\n\n## b\nbeta");
}

#[tokio::test]
async fn synthesis_needs_two_answers_and_skips_sequential() {
    let synthesizer = Arc::new(ScriptedSynthesizer::default());
    let f = three_way(synthesizer.clone());

    let a = aggregate(f.run(parallel_of(&["a", "c"])).await.unwrap());
    assert!(!a.synthesized);

    let task = Task::new("go").workflow(Workflow::Sequential { agents: vec!["a".into(), "b".into()] });
    let a = aggregate(f.run(task).await.unwrap());
    assert!(!a.synthesized);
    assert_eq!(a.content, "beta");
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn synthesis_can_be_disabled() {
    let synthesizer = Arc::new(ScriptedSynthesizer::default());
    let config = CoordinatorConfig { synthesize: false, ..Default::default() };
    let f = Fixture::with_config(
        vec![
            ("a", vec![Capability::Research], Script::Reply("alpha")),
            ("b", vec![Capability::Code], Script::Reply("beta")),
        ],
        config,
    )
    .synthesized_by(synthesizer.clone());
    let a = aggregate(f.run(parallel_of(&["a", "b"])).await.unwrap());
    assert!(!a.synthesized);
    assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
}

// ===========================================================================
// Built-in agents over the model router
// ===========================================================================

fn mock_router(provider: Arc<MockProvider>) -> Arc<ModelRouter> {
    let registry = ModelRegistry::new(
        Tier::ALL
            .into_iter()
            .map(|tier| ModelEntry::new(format!("{tier}-model"), "mock", tier, 8_000, 1.0))
            .collect(),
    )
    .unwrap();
    let provider: Arc<dyn LlmProvider> = provider;
    Arc::new(ModelRouter::new(registry, RouterConfig::default()).with_provider(provider))
}

#[tokio::test]
async fn builtin_code_agent_routes_to_coding_tier() {
    let mock = Arc::new(MockProvider::echo("mock"));
    let router = mock_router(mock.clone());
    let registry = default_registry(&router, &AgentsConfig::default()).unwrap();
    let coordinator = Coordinator::new(Arc::new(registry), CoordinatorConfig::default());

    let r = single(coordinator.execute(Task::new("debug this function"), &CancellationToken::new()).await.unwrap());
    assert_eq!(r.agent, "code");
    assert_eq!(r.content, "mock: debug this function");
    assert_eq!(r.metadata["tier"], "coding");
    assert_eq!(r.metadata["model"], "coding-model");

    let requests = mock.requests();
    let sent = &requests[0];
    assert!(sent.system.as_deref().unwrap().starts_with("You are a Code Agent"));
    assert_eq!(sent.temperature, Some(0.2));
}

#[tokio::test]
async fn builtin_overrides_apply() {
    let router = mock_router(Arc::new(MockProvider::echo("mock")));
    let mut overrides = AgentsConfig::new();
    overrides.insert("vision".into(), AgentOverride { enabled: false, ..Default::default() });
    overrides.insert("general".into(), AgentOverride { tier: Some(Tier::Fast), ..Default::default() });
    let registry = default_registry(&router, &overrides).unwrap();
    assert!(registry.get("vision").is_none());

    let coordinator = Coordinator::new(Arc::new(registry), CoordinatorConfig::default());
    let r = single(coordinator.execute(Task::new("hello there"), &CancellationToken::new()).await.unwrap());
    assert_eq!(r.agent, "general");
    assert_eq!(r.metadata["served_tier"], "fast");
}

#[tokio::test]
async fn router_synthesizer_routes_at_its_tier() {
    let mock = Arc::new(MockProvider::echo("mock"));
    let synthesizer = RouterSynthesizer::new(mock_router(mock.clone()), Tier::Fast, 300);
    let research = AgentResponse::ok("research", "facts".into(), 1, Default::default());
    let content = AgentResponse::ok("content", "draft".into(), 1, Default::default());

    let text = synthesizer
        .synthesize("write it up", &[&research, &content], &CancellationToken::new())
        .await
        .unwrap();
    assert!(text.starts_with("mock: Original request: write it up"));
    assert!(text.contains("--- content ---\ndraft"));

    let requests = mock.requests();
    assert_eq!(requests[0].model, "fast-model");
    assert_eq!(requests[0].max_tokens, Some(300));
}

#[tokio::test]
async fn builtin_agent_reports_routing_failure() {
    let router = mock_router(Arc::new(MockProvider::down("mock")));
    let registry = default_registry(&router, &AgentsConfig::default()).unwrap();
    let coordinator = Coordinator::new(Arc::new(registry), CoordinatorConfig::default());
    let r = single(coordinator.execute(Task::new("hi").target("general"), &CancellationToken::new()).await.unwrap());
    assert_eq!(r.error.unwrap().stage, FailureStage::Routing);
}
