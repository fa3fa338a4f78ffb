//! One hook invocation: resolve the project, load its config, and run the
//! handler for the event.

mod compact;
mod prompt;
mod session_start;
mod stop;
mod subagent_stop;
mod tool_use;

use crate::artifacts::{ArtifactStore, LatestArtifacts, WorkflowPhase, resolve_phase};
use crate::config::{self, Config};
use crate::messages;
use crate::store::StateStore;
use crate::types::{HookInput, HookOutput};
use crate::validation::{sanitize_session_id, validate_work_dir};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

fn hint(message: String) -> Option<HookOutput> {
    Some(HookOutput::message(message))
}

/// `None` for an empty list, otherwise the lines joined by `sep`.
fn joined(lines: Vec<String>, sep: &str) -> Option<HookOutput> {
    if lines.is_empty() {
        None
    } else {
        hint(lines.join(sep))
    }
}

pub struct Harness {
    work_dir: PathBuf,
    store: StateStore,
    artifacts: ArtifactStore,
    session_id: String,
    pub config: Config,
}

impl Harness {
    /// Validate `work_dir` and load its config. Does not check the
    /// initialised marker; see [`Harness::handle`].
    pub fn open(work_dir: &Path, session_id: &str) -> Result<Self> {
        validate_work_dir(work_dir)
            .with_context(|| format!("resolving project directory {}", work_dir.display()))?;
        let store = StateStore::new(work_dir);
        let config = Config::load(&store)?;
        Ok(Self {
            work_dir: work_dir.to_path_buf(),
            artifacts: ArtifactStore::new(&store),
            store,
            session_id: sanitize_session_id(session_id),
            config,
        })
    }

    pub fn is_initialized(&self) -> bool {
        config::is_initialized(&self.store)
    }

    /// Run the handler for `input`. An uninitialised project only answers
    /// SessionStart, with a pointer to `init`.
    pub fn handle(&self, input: &HookInput) -> Result<Option<HookOutput>> {
        if !self.is_initialized() {
            return Ok(match input {
                HookInput::SessionStart(_) => hint(messages::INIT_MESSAGE.to_string()),
                _ => None,
            });
        }
        tracing::debug!(event = input.event_name(), session = %self.session_id, "handling hook");
        match input {
            HookInput::SessionStart(e) => self.handle_session_start(e),
            HookInput::UserPromptSubmit(e) => self.handle_user_prompt_submit(e),
            HookInput::PreToolUse(e) => self.handle_pre_tool_use(e),
            HookInput::PostToolUse(e) => self.handle_post_tool_use(e),
            HookInput::PreCompact(e) => self.handle_pre_compact(e),
            HookInput::Stop(e) => self.handle_stop(e),
            HookInput::SubagentStop(e) => self.handle_subagent_stop(e),
        }
    }

    // ---------------------------------------------------------------
    // Shared helpers
    // ---------------------------------------------------------------

    fn confidence_threshold(&self) -> f64 {
        self.config.research_confidence_threshold()
    }

    fn latest_artifacts(&self) -> Result<LatestArtifacts> {
        self.artifacts
            .latest_all()
            .context("loading workflow artifacts")
    }

    fn current_phase(&self, latest: &LatestArtifacts) -> WorkflowPhase {
        resolve_phase(latest, self.confidence_threshold())
    }
}
