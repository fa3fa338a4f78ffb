//! Context utilization tracking.
//!
//! Hooks cannot see the host's real context window, so utilization is a
//! conservative proxy built from observable tool traffic: every tool call is
//! converted into a token-cost estimate and accumulated against a fixed
//! budget. The total only goes down on an explicit [`ContextState::reset`].

use crate::store::{StateStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const CONTEXT_STATE_FILE: &str = "fic-context-state.json";

// ===================================================================
// Tool kinds
// ===================================================================

/// Tool categories tracked by the estimator. Anything unrecognized is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Read,
    Grep,
    Glob,
    Task,
    Edit,
    Write,
    Bash,
    Other,
}

impl ToolKind {
    pub fn from_tool_name(name: &str) -> Self {
        match name {
            "Read" => ToolKind::Read,
            "Grep" => ToolKind::Grep,
            "Glob" => ToolKind::Glob,
            "Task" => ToolKind::Task,
            "Edit" => ToolKind::Edit,
            "Write" => ToolKind::Write,
            "Bash" => ToolKind::Bash,
            _ => ToolKind::Other,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolKind::Read => "Read",
            ToolKind::Grep => "Grep",
            ToolKind::Glob => "Glob",
            ToolKind::Task => "Task",
            ToolKind::Edit => "Edit",
            ToolKind::Write => "Write",
            ToolKind::Bash => "Bash",
            ToolKind::Other => "Other",
        };
        f.write_str(name)
    }
}

// ===================================================================
// Calibration constants
// ===================================================================

/// Average tokens per call for each tool kind, including input, output and
/// response overhead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolWeights {
    pub read: u64,
    pub grep: u64,
    pub glob: u64,
    pub task: u64,
    pub edit: u64,
    pub write: u64,
    pub bash: u64,
    pub other: u64,
}

/// Every tunable number the estimator uses. These are calibration priors,
/// not derived values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorTuning {
    /// Assumed context window size in tokens.
    pub max_context_tokens: u64,
    /// Tokens added per call for conversation structure.
    pub base_overhead: u64,
    pub chars_per_token: usize,
    pub weights: ToolWeights,
    /// Calls before the depth multiplier starts growing.
    pub depth_free_calls: u64,
    /// Multiplier growth per call past `depth_free_calls`.
    pub depth_step: f64,
    pub depth_cap: f64,
    pub moderate_floor: f64,
    pub high_floor: f64,
    pub critical_floor: f64,
}

impl EstimatorTuning {
    pub const DEFAULT: Self = Self {
        max_context_tokens: 200_000,
        base_overhead: 400,
        chars_per_token: 4,
        weights: ToolWeights {
            read: 1500,
            grep: 800,
            glob: 300,
            task: 2500,
            edit: 600,
            write: 500,
            bash: 700,
            other: 500,
        },
        depth_free_calls: 10,
        depth_step: 0.01,
        depth_cap: 1.15,
        moderate_floor: 0.30,
        high_floor: 0.50,
        critical_floor: 0.70,
    };

    pub fn weight(&self, kind: ToolKind) -> u64 {
        let w = &self.weights;
        match kind {
            ToolKind::Read => w.read,
            ToolKind::Grep => w.grep,
            ToolKind::Glob => w.glob,
            ToolKind::Task => w.task,
            ToolKind::Edit => w.edit,
            ToolKind::Write => w.write,
            ToolKind::Bash => w.bash,
            ToolKind::Other => w.other,
        }
    }

    /// Later turns carry more accumulated history, so each call costs
    /// proportionally more once the conversation is deep.
    pub fn depth_multiplier(&self, total_calls: u64) -> f64 {
        if total_calls <= self.depth_free_calls {
            return 1.0;
        }
        let extra = (total_calls - self.depth_free_calls) as f64 * self.depth_step;
        (1.0 + extra).min(self.depth_cap)
    }

    pub fn utilization(&self, tokens: u64) -> f64 {
        tokens as f64 / self.max_context_tokens as f64
    }
}

impl Default for EstimatorTuning {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ===================================================================
// Persisted state
// ===================================================================

/// Context tracking for the project. Stored as `.claude/fic-context-state.json`.
///
/// State survives session changes; only [`ContextState::reset`] clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextState {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_session_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub session_started: DateTime<Utc>,
    #[serde(default)]
    pub compaction_count: u64,

    #[serde(default)]
    pub tool_calls: BTreeMap<ToolKind, u64>,
    #[serde(default)]
    pub total_tool_calls: u64,

    #[serde(default)]
    pub total_token_estimate: u64,
    #[serde(default)]
    pub utilization_percent: f64,

    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl ContextState {
    pub fn new(session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            last_session_id: None,
            session_started: now,
            compaction_count: 0,
            tool_calls: BTreeMap::new(),
            total_tool_calls: 0,
            total_token_estimate: 0,
            utilization_percent: 0.0,
            last_updated: now,
        }
    }

    /// Load the project's context state, creating a fresh one if absent.
    ///
    /// A different `session_id` is recorded but does not reset the counters.
    pub fn load(store: &StateStore, session_id: &str) -> Result<Self, StoreError> {
        let stored: Option<Self> = store.read(CONTEXT_STATE_FILE)?;
        Ok(Self::continue_session(stored, session_id))
    }

    fn continue_session(stored: Option<Self>, session_id: &str) -> Self {
        match stored {
            Some(mut state) => {
                state.observe_session(session_id);
                state
            }
            None => Self::new(session_id),
        }
    }

    pub fn observe_session(&mut self, session_id: &str) {
        if self.session_id != session_id {
            let previous = std::mem::replace(&mut self.session_id, session_id.to_string());
            self.last_session_id = Some(previous);
        }
    }

    /// Record one tool call under the store lock and return the new state.
    pub fn record(
        store: &StateStore,
        session_id: &str,
        tool_name: &str,
        tool_result: &str,
    ) -> Result<Self, StoreError> {
        store.update(
            CONTEXT_STATE_FILE,
            |stored| Self::continue_session(stored, session_id),
            |state| {
                state.add_entry(tool_name, tool_result);
                state.last_updated = Utc::now();
                state.clone()
            },
        )
    }

    /// Reset the persisted state after a compaction.
    pub fn reset_persisted(store: &StateStore, session_id: &str) -> Result<Self, StoreError> {
        store.update(
            CONTEXT_STATE_FILE,
            |stored| stored.unwrap_or_else(|| Self::new(session_id)),
            |state| {
                state.reset(session_id);
                state.clone()
            },
        )
    }

    // ---------------------------------------------------------------
    // Estimation
    // ---------------------------------------------------------------

    pub fn add_entry(&mut self, tool_name: &str, tool_result: &str) {
        self.add_entry_tuned(&EstimatorTuning::DEFAULT, tool_name, tool_result);
    }

    pub fn add_entry_tuned(&mut self, tuning: &EstimatorTuning, tool_name: &str, tool_result: &str) {
        let kind = ToolKind::from_tool_name(tool_name);
        self.total_tool_calls += 1;
        *self.tool_calls.entry(kind).or_insert(0) += 1;

        // Use the larger of the prior and the observed payload so a small
        // prior never under-counts a genuinely large result.
        let weight = tuning.weight(kind);
        let payload_tokens = (tool_result.len() / tuning.chars_per_token) as u64;
        let tool_tokens = tuning.base_overhead + weight.max(payload_tokens);

        let scaled = tool_tokens as f64 * tuning.depth_multiplier(self.total_tool_calls);
        self.total_token_estimate += scaled as u64;
        self.utilization_percent = tuning.utilization(self.total_token_estimate);
    }

    pub fn count(&self, kind: ToolKind) -> u64 {
        self.tool_calls.get(&kind).copied().unwrap_or(0)
    }

    pub fn needs_compaction(&self, threshold: f64) -> bool {
        self.utilization_percent >= threshold
    }

    pub fn needs_compaction_by_tool_count(&self, max_tools: u64) -> bool {
        self.total_tool_calls >= max_tools
    }

    /// Zero every counter and count one compaction.
    pub fn reset(&mut self, session_id: &str) {
        let now = Utc::now();
        self.compaction_count += 1;
        self.session_id = session_id.to_string();
        self.session_started = now;
        self.tool_calls.clear();
        self.total_tool_calls = 0;
        self.total_token_estimate = 0;
        self.utilization_percent = 0.0;
        self.last_updated = now;
    }

    pub fn summary(&self) -> String {
        let per_kind = [
            ToolKind::Read,
            ToolKind::Grep,
            ToolKind::Glob,
            ToolKind::Edit,
            ToolKind::Write,
            ToolKind::Bash,
            ToolKind::Task,
        ]
        .iter()
        .map(|k| format!("{k}:{}", self.count(*k)))
        .collect::<Vec<_>>()
        .join(", ");
        format!(
            "Tool calls: {} ({per_kind}) | Est. tokens: {}k | Util: {:.0}%",
            self.total_tool_calls,
            self.total_token_estimate / 1000,
            self.utilization_percent * 100.0
        )
    }

    pub fn utilization_message(&self) -> Option<String> {
        self.utilization_message_tuned(&EstimatorTuning::DEFAULT)
    }

    pub fn utilization_message_tuned(&self, tuning: &EstimatorTuning) -> Option<String> {
        let u = self.utilization_percent;
        if u < tuning.moderate_floor {
            return None;
        }
        let level = if u >= tuning.critical_floor {
            "CRITICAL"
        } else if u >= tuning.high_floor {
            "high"
        } else {
            "moderate"
        };
        Some(format!(
            "[FIC] Context {level}: {:.0}% (~{}k tokens, {} tool calls)",
            u * 100.0,
            self.total_token_estimate / 1000,
            self.total_tool_calls
        ))
    }
}
