//! Verification gates for file-mutating tool calls.
//!
//! [`GateState`] is a cache of the artifact-derived workflow phase, kept in
//! `.claude/fic-state.json` so the pre-tool hook can decide without scanning
//! artifact directories. It only moves forward: [`sync_gate_state`] raises it
//! to match the resolved phase, and the operator commands may raise it
//! further.

use crate::artifacts::WorkflowPhase;
use crate::config::Strictness;
use crate::store::{StateStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const GATE_STATE_FILE: &str = "fic-state.json";

const RESEARCH_INCOMPLETE: &str = "Research phase not complete";
const PLAN_INCOMPLETE: &str = "Planning phase not complete";

const RESEARCH_SUGGESTIONS: [&str; 2] = [
    "Complete research using Read, Grep, Glob, Task tools first",
    "Use /fic-research-done when research is complete",
];
const PLAN_SUGGESTIONS: [&str; 2] = [
    "Create and validate your implementation plan",
    "Use /fic-plan-done when plan is validated",
];

pub const BLOCK_FOOTER: &str = "[FIC Gate: Operation blocked. Complete prior phase first.]";

// ===================================================================
// Gate state
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePhase {
    #[default]
    Research,
    Planning,
    Implementation,
}

impl fmt::Display for GatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GatePhase::Research => "research",
            GatePhase::Planning => "planning",
            GatePhase::Implementation => "implementation",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateState {
    pub phase: GatePhase,
    pub research_complete: bool,
    pub plan_validated: bool,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl Default for GateState {
    fn default() -> Self {
        Self {
            phase: GatePhase::Research,
            research_complete: false,
            plan_validated: false,
            last_updated: Utc::now(),
        }
    }
}

impl GateState {
    pub fn load(store: &StateStore) -> Result<Self, StoreError> {
        Ok(store.read(GATE_STATE_FILE)?.unwrap_or_default())
    }

    /// The gate flags implied by a resolved workflow phase.
    pub fn from_phase(phase: WorkflowPhase) -> Self {
        let (phase, research_complete, plan_validated) = match phase {
            WorkflowPhase::NewSession | WorkflowPhase::Research => (GatePhase::Research, false, false),
            WorkflowPhase::PlanningReady | WorkflowPhase::Planning => {
                (GatePhase::Planning, true, false)
            }
            WorkflowPhase::ImplementationReady | WorkflowPhase::Implementation => {
                (GatePhase::Implementation, true, true)
            }
        };
        Self {
            phase,
            research_complete,
            plan_validated,
            last_updated: Utc::now(),
        }
    }

    /// Raise this state to at least `target`. Returns whether anything changed.
    pub fn advance(&mut self, target: &GateState) -> bool {
        let before = (self.phase, self.research_complete, self.plan_validated);
        self.phase = self.phase.max(target.phase);
        self.research_complete |= target.research_complete;
        self.plan_validated |= target.plan_validated;
        let changed = before != (self.phase, self.research_complete, self.plan_validated);
        if changed {
            self.last_updated = Utc::now();
        }
        changed
    }

    pub fn mark_research_done(&mut self) {
        self.advance(&GateState::from_phase(WorkflowPhase::PlanningReady));
    }

    pub fn mark_plan_done(&mut self) {
        self.advance(&GateState::from_phase(WorkflowPhase::ImplementationReady));
    }
}

/// Bring the stored gate state up to the resolved workflow phase.
pub fn sync_gate_state(store: &StateStore, phase: WorkflowPhase) -> Result<GateState, StoreError> {
    let target = GateState::from_phase(phase);
    store.update(
        GATE_STATE_FILE,
        |stored: Option<GateState>| stored.unwrap_or_default(),
        |state| {
            if state.advance(&target) {
                tracing::info!(%phase, gate_phase = %state.phase, "gate state advanced");
            }
            state.clone()
        },
    )
}

pub fn mark_research_done(store: &StateStore) -> Result<GateState, StoreError> {
    store.update(
        GATE_STATE_FILE,
        |stored: Option<GateState>| stored.unwrap_or_default(),
        |state| {
            state.mark_research_done();
            state.clone()
        },
    )
}

pub fn mark_plan_done(store: &StateStore) -> Result<GateState, StoreError> {
    store.update(
        GATE_STATE_FILE,
        |stored: Option<GateState>| stored.unwrap_or_default(),
        |state| {
            state.mark_plan_done();
            state.clone()
        },
    )
}

/// Describe any disagreement between the resolved phase and the cached gate
/// state, or `None` when they agree.
pub fn check_consistency(phase: WorkflowPhase, state: &GateState) -> Option<String> {
    let expected = GateState::from_phase(phase);
    let mut problems = Vec::new();
    if state.phase != expected.phase {
        problems.push(format!(
            "gate phase is {} but artifacts resolve to {phase} ({})",
            state.phase, expected.phase
        ));
    }
    if state.research_complete != expected.research_complete {
        problems.push(format!(
            "research_complete is {} but artifacts imply {}",
            state.research_complete, expected.research_complete
        ));
    }
    if state.plan_validated != expected.plan_validated {
        problems.push(format!(
            "plan_validated is {} but artifacts imply {}",
            state.plan_validated, expected.plan_validated
        ));
    }
    if problems.is_empty() {
        None
    } else {
        Some(problems.join("; "))
    }
}

// ===================================================================
// Gate engine
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    AllowEdit,
    AllowWrite,
    AllowBash,
}

impl GateKind {
    /// The gate guarding `tool_name`, if it is gated at all.
    pub fn for_tool(tool_name: &str) -> Option<Self> {
        match tool_name {
            "Edit" | "MultiEdit" => Some(GateKind::AllowEdit),
            "Write" => Some(GateKind::AllowWrite),
            "Bash" => Some(GateKind::AllowBash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    Allow,
    Warn,
    Block,
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GateAction::Allow => "allow",
            GateAction::Warn => "warn",
            GateAction::Block => "block",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub action: GateAction,
    pub reason: String,
    pub suggestions: Vec<String>,
}

impl GateResult {
    pub fn allow() -> Self {
        Self {
            action: GateAction::Allow,
            reason: String::new(),
            suggestions: Vec::new(),
        }
    }

    fn violation(action: GateAction, reason: &str, suggestions: &[&str]) -> Self {
        Self {
            action,
            reason: reason.to_string(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Per-project gate tuning from the `[fic]` config block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    pub warn_on_research_incomplete: bool,
    pub warn_on_plan_incomplete: bool,
    pub block_in_strict_mode: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            warn_on_research_incomplete: true,
            warn_on_plan_incomplete: true,
            block_in_strict_mode: true,
        }
    }
}

/// Where the gate engine gets its state from.
pub trait GateStateSource {
    fn gate_state(&self) -> Result<GateState, StoreError>;
}

impl GateStateSource for StateStore {
    fn gate_state(&self) -> Result<GateState, StoreError> {
        GateState::load(self)
    }
}

impl GateStateSource for GateState {
    fn gate_state(&self) -> Result<GateState, StoreError> {
        Ok(self.clone())
    }
}

/// Decide whether a mutating operation may proceed. Fails open: a state
/// that cannot be loaded allows the operation.
pub fn check_gate(
    kind: GateKind,
    source: &impl GateStateSource,
    strictness: Strictness,
    config: &GateConfig,
) -> GateResult {
    if strictness == Strictness::Relaxed {
        return GateResult::allow();
    }
    if kind == GateKind::AllowBash {
        return GateResult::allow();
    }

    let state = match source.gate_state() {
        Ok(state) => state,
        Err(err) => {
            let detail = err.detail();
            tracing::warn!("gate state unavailable, allowing: {detail}");
            return GateResult {
                reason: format!("Could not load FIC state: {detail}"),
                ..GateResult::allow()
            };
        }
    };

    let violation_action = if strictness == Strictness::Strict && config.block_in_strict_mode {
        GateAction::Block
    } else {
        GateAction::Warn
    };

    if !state.research_complete {
        if !config.warn_on_research_incomplete {
            return GateResult::allow();
        }
        return GateResult::violation(violation_action, RESEARCH_INCOMPLETE, &RESEARCH_SUGGESTIONS);
    }
    if !state.plan_validated {
        if !config.warn_on_plan_incomplete {
            return GateResult::allow();
        }
        return GateResult::violation(violation_action, PLAN_INCOMPLETE, &PLAN_SUGGESTIONS);
    }
    GateResult::allow()
}

/// Render a gate result for the user. Empty for `allow`.
pub fn format_gate_message(result: &GateResult) -> String {
    if result.action == GateAction::Allow {
        return String::new();
    }
    let mut msg = format!("[FIC Gate] {}: {}", result.action, result.reason);
    if !result.suggestions.is_empty() {
        msg.push_str("\nSuggestions:");
        for s in &result.suggestions {
            msg.push_str("\n  - ");
            msg.push_str(s);
        }
    }
    msg
}
