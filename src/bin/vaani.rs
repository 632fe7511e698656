//! CLI binary for vaani.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::BufReader;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vaani::pipeline::hooks::Hooks;
use vaani::pipeline::session::feed_json_lines;
use vaani::pipeline::trace::{parse_trace, replay};
use vaani::{AgentConfig, CallSession, EntryPreset, SessionOutput, TurnController};

/// Vaani: turn-taking core for an outbound sales voice agent.
#[derive(Parser)]
#[command(name = "vaani", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Entry preset used when no configuration file is given.
    #[arg(short, long, default_value = "pipeline")]
    preset: EntryPreset,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Print the assembled system prompt and greeting.
    Prompt,

    /// Write the configuration to a TOML file.
    InitConfig {
        /// Destination; defaults to the user config directory.
        path: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Replay a JSON-lines trace through the turn controller.
    Simulate {
        /// Trace file.
        trace: PathBuf,
    },

    /// Run a live call session fed with JSON-lines inputs on stdin.
    ///
    /// Outputs are printed as JSON lines. End of input hangs up.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vaani=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        AgentConfig::from_file(path)?
    } else {
        AgentConfig::from_preset(cli.preset)
    };

    match cli.command {
        Command::Prompt => print_prompt(&config),
        Command::InitConfig { path, force } => init_config(&config, path, force),
        Command::Simulate { trace } => simulate(&config, trace),
        Command::Run => run_session(config).await,
    }
}

fn print_prompt(config: &AgentConfig) -> anyhow::Result<()> {
    let context = vaani::prompt::initial_context(config)?;
    println!("{}", context.system_prompt().unwrap_or_default());
    if !config.persona.greeting.trim().is_empty() {
        println!("\nGreeting:\n{}", config.persona.greeting.trim());
    }
    Ok(())
}

fn init_config(config: &AgentConfig, path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(AgentConfig::default_config_path);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config.save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn simulate(config: &AgentConfig, trace: PathBuf) -> anyhow::Result<()> {
    let file = std::fs::File::open(&trace)
        .with_context(|| format!("cannot open trace {}", trace.display()))?;
    let events = parse_trace(BufReader::new(file))?;
    let mut controller = TurnController::from_settings(&config.turn)?;
    let steps = replay(&mut controller, &events);
    for step in &steps {
        println!("{}", serde_json::to_string(step)?);
    }
    info!(
        events = events.len(),
        commands = steps.len(),
        state = ?controller.state(),
        "trace replayed"
    );
    Ok(())
}

async fn run_session(config: AgentConfig) -> anyhow::Result<()> {
    let context = vaani::prompt::initial_context(&config)?;
    let (session, handle, mut outputs) = CallSession::new(&config, context, Hooks::identity())?;
    let cancel = CancellationToken::new();

    // Handle Ctrl+C
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, hanging up...");
            cancel_clone.cancel();
        }
    });

    let session_task = tokio::spawn(session.run(cancel.clone()));

    // Plain thread: a pending stdin read must not hold up shutdown.
    std::thread::spawn(move || {
        if let Err(e) = feed_json_lines(std::io::stdin().lock(), &handle) {
            warn!(error = %e, "stdin read failed");
        }
    });

    while let Some(output) = outputs.recv().await {
        println!("{}", serde_json::to_string(&output)?);
        if output == SessionOutput::Ended {
            break;
        }
    }

    session_task.await??;
    Ok(())
}
