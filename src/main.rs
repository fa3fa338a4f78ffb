mod artifacts;
mod commands;
mod config;
mod context;
mod features;
mod gates;
mod git;
mod harness;
mod initscript;
mod messages;
mod preserved;
mod process;
mod progress;
mod prompts;
mod store;
mod subagent;
mod testrunner;
mod transcript;
mod types;
mod util;
mod validation;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use harness::Harness;
use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use types::{HookInput, HookOutput};

/// Hook payloads larger than this are ignored.
const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;
const LOG_ENV: &str = "FIC_HARNESS_LOG";

#[derive(Parser)]
#[command(name = "fic-harness")]
#[command(
    version,
    about = "Research -> Plan -> Implement gates and context tracking for agent hooks",
    long_about = "With no subcommand, reads one hook event as JSON on stdin and writes the \
                  directive as JSON on stdout."
)]
struct Cli {
    /// Project directory. Overrides the payload's `cwd`.
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create the state directory, default config and initialised marker
    Init {
        /// relaxed, standard or strict
        #[arg(long)]
        strictness: Option<String>,
    },
    /// Show the workflow phase, gate state and context estimate
    Status,
    /// Mark research complete (gate phase -> planning)
    ResearchDone,
    /// Mark the plan validated (gate phase -> implementation)
    PlanDone,
    /// Reset context tracking, as after a compaction
    ResetContext,
    /// Change the strictness level
    Strictness { level: String },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // Stdout carries the hook directive, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .take(MAX_INPUT_BYTES + 1)
        .read_to_string(&mut buffer)
        .context("reading stdin")?;
    if buffer.len() as u64 > MAX_INPUT_BYTES {
        bail!("hook input exceeds {MAX_INPUT_BYTES} bytes");
    }
    Ok(buffer)
}

/// `--project-dir`, then the payload's cwd, then the host's environment,
/// then the process directory.
fn resolve_work_dir(flag: Option<&Path>, payload_cwd: &str) -> Result<PathBuf> {
    let dir = if let Some(dir) = flag {
        dir.to_path_buf()
    } else if !payload_cwd.is_empty() {
        PathBuf::from(payload_cwd)
    } else if let Some(dir) = ["CLAUDE_PROJECT_DIR", "CLAUDE_WORKING_DIRECTORY"]
        .iter()
        .find_map(|var| env::var_os(var).filter(|v| !v.is_empty()))
    {
        PathBuf::from(dir)
    } else {
        env::current_dir().context("getting current directory")?
    };
    std::path::absolute(&dir).with_context(|| format!("resolving {}", dir.display()))
}

fn run_hook(project_dir: Option<&Path>) -> HookOutput {
    let raw = match read_stdin() {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!("ignoring hook input: {err:#}");
            return HookOutput::default();
        }
    };
    let input: HookInput = match serde_json::from_str(&raw) {
        Ok(input) => input,
        Err(err) => {
            tracing::warn!("ignoring malformed hook input: {err}");
            return HookOutput::default();
        }
    };

    let common = input.common();
    let work_dir = match resolve_work_dir(project_dir, &common.cwd) {
        Ok(dir) if validation::validate_work_dir(&dir).is_ok() => dir,
        Ok(dir) => {
            tracing::warn!("not a project directory: {}", dir.display());
            return HookOutput::default();
        }
        Err(err) => {
            tracing::warn!("{err:#}");
            return HookOutput::default();
        }
    };

    let result = Harness::open(&work_dir, &common.session_id).and_then(|h| h.handle(&input));
    match result {
        Ok(output) => output.unwrap_or_default(),
        Err(err) => {
            tracing::error!(event = input.event_name(), "{err:#}");
            HookOutput::hook_error(&err)
        }
    }
}

fn run_command(command: &Command, project_dir: Option<&Path>) -> Result<String> {
    let work_dir = resolve_work_dir(project_dir, "")?;
    match command {
        Command::Init { strictness } => commands::init(&work_dir, strictness.as_deref()),
        Command::Status => commands::status(&work_dir),
        Command::ResearchDone => commands::research_done(&work_dir),
        Command::PlanDone => commands::plan_done(&work_dir),
        Command::ResetContext => commands::reset_context(&work_dir),
        Command::Strictness { level } => commands::set_strictness(&work_dir, level),
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        match run_command(command, cli.project_dir.as_deref()) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("fic-harness: {err:#}");
                std::process::exit(1);
            }
        }
        return;
    }

    // Hooks always exit 0; failures travel in the directive.
    let output = run_hook(cli.project_dir.as_deref());
    let json = serde_json::to_string(&output).unwrap_or_else(|err| {
        tracing::error!("serializing hook output: {err}");
        "{}".to_string()
    });
    println!("{json}");
}
