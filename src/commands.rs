//! Operator subcommands. Each returns the text to print on success.

use crate::artifacts::{ArtifactStore, resolve_phase};
use crate::config::{self, Config, Strictness};
use crate::context::{CONTEXT_STATE_FILE, ContextState};
use crate::features::FeatureList;
use crate::gates::{self, GateState};
use crate::store::StateStore;
use crate::validation::{DEFAULT_SESSION_ID, validate_work_dir};
use anyhow::{Context, Result, bail};
use std::path::Path;

fn open_store(work_dir: &Path) -> Result<StateStore> {
    validate_work_dir(work_dir)
        .with_context(|| format!("resolving project directory {}", work_dir.display()))?;
    Ok(StateStore::new(work_dir))
}

fn initialized_store(work_dir: &Path) -> Result<StateStore> {
    let store = open_store(work_dir)?;
    if !config::is_initialized(&store) {
        bail!(
            "{} is not initialized; run `fic-harness init` first",
            work_dir.display()
        );
    }
    Ok(store)
}

/// Create the state directory, write the config (keeping an existing one)
/// and drop the initialised marker.
pub fn init(work_dir: &Path, strictness: Option<&str>) -> Result<String> {
    let store = open_store(work_dir)?;
    let mut config = Config::load(&store)?;
    if let Some(level) = strictness {
        config.set_strictness(level);
    }
    config.save(&store)?;
    config::mark_initialized(&store)?;
    tracing::info!(dir = %store.dir().display(), "initialized");
    Ok(format!(
        "Initialized FIC harness in {} (strictness: {})",
        store.dir().display(),
        config.strictness
    ))
}

pub fn status(work_dir: &Path) -> Result<String> {
    let store = open_store(work_dir)?;
    if !config::is_initialized(&store) {
        return Ok("FIC harness is not initialized. Run `fic-harness init`.".to_string());
    }
    let config = Config::load(&store)?;
    let latest = ArtifactStore::new(&store)
        .latest_all()
        .context("loading workflow artifacts")?;
    let phase = resolve_phase(&latest, config.research_confidence_threshold());
    let gate = GateState::load(&store).context("loading gate state")?;

    let mut lines = vec![
        format!("Strictness: {}", config.strictness),
        format!("Phase: {phase}"),
        format!(
            "Gate: {} (research complete: {}, plan validated: {})",
            gate.phase, gate.research_complete, gate.plan_validated
        ),
    ];
    match gates::check_consistency(phase, &gate) {
        Some(problem) => lines.push(format!("Consistency: {problem}")),
        None => lines.push("Consistency: ok".to_string()),
    }
    match store.read::<ContextState>(CONTEXT_STATE_FILE)? {
        Some(state) => {
            lines.push(format!("Context: {}", state.summary()));
            if state.compaction_count > 0 {
                lines.push(format!("Compactions: {}", state.compaction_count));
            }
        }
        None => lines.push("Context: no tool calls recorded".to_string()),
    }
    match FeatureList::load(work_dir) {
        Ok(Some(list)) => {
            let s = list.summary();
            lines.push(format!(
                "Features: {} total ({} passing, {} failing, {} in progress, {} pending)",
                s.total, s.passing, s.failing, s.in_progress, s.pending
            ));
            for feature in &s.next_items {
                lines.push(format!("  next: {} [{}]", feature.name, feature.id));
            }
        }
        Ok(None) => {}
        Err(err) => lines.push(format!("Features: unreadable ({})", err.detail())),
    }
    Ok(lines.join("\n"))
}

pub fn research_done(work_dir: &Path) -> Result<String> {
    let store = initialized_store(work_dir)?;
    let state = gates::mark_research_done(&store).context("updating gate state")?;
    Ok(format!(
        "[FIC] Research marked complete. Gate phase: {}",
        state.phase
    ))
}

pub fn plan_done(work_dir: &Path) -> Result<String> {
    let store = initialized_store(work_dir)?;
    let state = gates::mark_plan_done(&store).context("updating gate state")?;
    Ok(format!("[FIC] Plan marked validated. Gate phase: {}", state.phase))
}

pub fn reset_context(work_dir: &Path) -> Result<String> {
    let store = initialized_store(work_dir)?;
    let session_id = store
        .read::<ContextState>(CONTEXT_STATE_FILE)?
        .map_or_else(|| DEFAULT_SESSION_ID.to_string(), |s| s.session_id);
    let state = ContextState::reset_persisted(&store, &session_id)
        .context("resetting context state")?;
    Ok(format!(
        "[FIC] Context tracking reset (compactions so far: {})",
        state.compaction_count
    ))
}

pub fn set_strictness(work_dir: &Path, level: &str) -> Result<String> {
    let store = initialized_store(work_dir)?;
    let mut config = Config::load(&store)?;
    if let Err(err) = level.parse::<Strictness>() {
        tracing::warn!("{err}; using standard");
    }
    let applied = config.set_strictness(level);
    config.save(&store)?;
    Ok(format!("Strictness set to {applied}"))
}
