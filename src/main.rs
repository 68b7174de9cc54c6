//! cortex - personal AI orchestration
//!
//! Usage:
//!   cortex agents                          → list registered agents (JSON)
//!   cortex models --tier coding            → candidates for a tier, in fallback order
//!   cortex ask "explain rust lifetimes"    → one coordinator call
//!   cortex chat --session work             → line chat through the consciousness engine
//!   cortex config --dump                   → print the default config as TOML

use anyhow::Context;
use clap::{Parser, Subcommand};
use cortex::{default_home, expand_tilde, Cortex};
use cortex_agent::Task;
use cortex_consciousness::CortexConfig;
use cortex_core::{Capability, SessionKey, Tier};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "cortex",
    about = "Personal AI orchestration: model routing, agents, and a stateful conversation engine",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (TOML). Default: ~/.cortex/cortex.toml
    #[arg(long, global = true)]
    config: Option<String>,

    /// Persist sessions and memories under this directory
    #[arg(long, global = true)]
    state_dir: Option<String>,

    /// Write logs to a daily-rolling file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered agents as JSON
    Agents,
    /// Show the models a request would try, in order
    Models {
        /// Tier to resolve (default: the router's default tier)
        #[arg(short, long)]
        tier: Option<Tier>,
    },
    /// Send one prompt through the coordinator
    Ask {
        prompt: String,
        /// Run exactly this agent
        #[arg(short, long)]
        agent: Option<String>,
        /// Required capability (repeatable)
        #[arg(long = "hint")]
        hints: Vec<Capability>,
    },
    /// Chat line by line with session memory
    Chat {
        /// Session name
        #[arg(short, long, default_value = "main")]
        session: String,
    },
    /// Inspect configuration
    Config {
        /// Print the default config as TOML
        #[arg(long, default_value_t = false)]
        dump: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref().map(expand_tilde).as_deref())?;

    let config_path = cli
        .config
        .as_deref()
        .map(expand_tilde)
        .unwrap_or_else(|| default_home().join("cortex.toml"));

    match cli.command {
        Commands::Config { dump } => {
            if dump {
                print!("{}", CortexConfig::default().to_toml());
            } else {
                println!("{}", config_path.display());
            }
            return Ok(());
        }
        command => {
            let config = CortexConfig::load(&config_path);
            let state_dir = cli.state_dir.as_deref().map(expand_tilde);
            let cortex = Cortex::from_config(config, state_dir.as_deref())?;
            run(cortex, command).await?;
        }
    }

    Ok(())
}

async fn run(cortex: Cortex, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Agents => {
            println!("{}", serde_json::to_string_pretty(&cortex.coordinator.list_agents())?);
        }
        Commands::Models { tier } => {
            let candidates = cortex.router.candidates(None, tier);
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        }
        Commands::Ask { prompt, agent, hints } => {
            let mut task = Task::new(prompt);
            task.target = agent;
            task.hints = hints.into_iter().collect();

            let cancel = cancel_on_ctrl_c();
            let response = cortex.coordinator.execute(task, &cancel).await?;
            if let Some(failure) = response.failure() {
                anyhow::bail!("{} failure: {}", failure.stage, failure.message);
            }
            println!("{}", response.content());
            tracing::info!(agents = ?response.agents(), "answered");
        }
        Commands::Chat { session } => chat(&cortex, SessionKey::new(session)).await?,
        Commands::Config { .. } => {}
    }
    Ok(())
}

async fn chat(cortex: &Cortex, session: SessionKey) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    eprintln!("session '{}'. /reset clears it, /summary shows it, /quit exits.", session);

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                cortex.engine.sessions().reset(&session).await?;
                println!("(session cleared)");
                continue;
            }
            "/summary" => {
                let summary = cortex.engine.sessions().summary(&session).await;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                continue;
            }
            _ => {}
        }

        let cancel = cancel_on_ctrl_c();
        match cortex.engine.handle(&session, line, None, &cancel).await {
            Ok(reply) => {
                println!("{}", reply.content);
                tracing::debug!(agents = ?reply.agents, mood = ?reply.mood.label, recalled = reply.recalled, "reply");
            }
            Err(failure) => {
                eprintln!("error: {}", failure);
                if let Some(partial) = &failure.partial {
                    println!("{}", partial);
                }
            }
        }
        cancel.cancel();
    }
    Ok(())
}

/// Token cancelled by the first Ctrl-C, or when the caller cancels it.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
    cancel
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file path has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cortex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}
