use crate::artifacts::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::gates::GateConfig;
use crate::store::{self, StateStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::str::FromStr;
use thiserror::Error;

pub const CONFIG_FILE: &str = "claude-harness.toml";
pub const INIT_MARKER: &str = ".claude-harness-initialized";

const DEFAULT_AUTO_COMPACT_THRESHOLD: f64 = 0.70;
const DEFAULT_COMPACTION_TOOL_THRESHOLD: u64 = 25;
const DEFAULT_TARGET_UTILIZATION_HIGH: f64 = 0.60;
const DEFAULT_TARGET_UTILIZATION_LOW: f64 = 0.40;
const DEFAULT_MAX_OPEN_QUESTIONS: u32 = 2;

/// How gate and stop-check violations are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Strictness {
    /// Never block; gates always allow.
    Relaxed,
    /// Warn on violations.
    #[default]
    Standard,
    /// Block on violations.
    Strict,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown strictness level {0:?} (expected relaxed, standard or strict)")]
pub struct UnknownStrictness(pub String);

impl FromStr for Strictness {
    type Err = UnknownStrictness;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relaxed" => Ok(Strictness::Relaxed),
            "standard" => Ok(Strictness::Standard),
            "strict" => Ok(Strictness::Strict),
            _ => Err(UnknownStrictness(s.to_string())),
        }
    }
}

/// Unrecognized levels fall back to `standard`.
impl From<String> for Strictness {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strictness::Relaxed => "relaxed",
            Strictness::Standard => "standard",
            Strictness::Strict => "strict",
        })
    }
}

/// The `[fic]` block. Zero numeric values mean "use the default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FicThresholds {
    pub auto_compact_threshold: f64,
    pub compaction_tool_threshold: u64,
    pub target_utilization_high: f64,
    pub target_utilization_low: f64,
    pub research_confidence_threshold: f64,
    pub max_open_questions: u32,
    pub warn_on_research_incomplete: bool,
    pub warn_on_plan_incomplete: bool,
    pub block_in_strict_mode: bool,
}

impl Default for FicThresholds {
    fn default() -> Self {
        Self {
            auto_compact_threshold: DEFAULT_AUTO_COMPACT_THRESHOLD,
            compaction_tool_threshold: DEFAULT_COMPACTION_TOOL_THRESHOLD,
            target_utilization_high: DEFAULT_TARGET_UTILIZATION_HIGH,
            target_utilization_low: DEFAULT_TARGET_UTILIZATION_LOW,
            research_confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_open_questions: DEFAULT_MAX_OPEN_QUESTIONS,
            warn_on_research_incomplete: true,
            warn_on_plan_incomplete: true,
            block_in_strict_mode: true,
        }
    }
}

/// Project configuration stored in `.claude/claude-harness.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strictness: Strictness,

    /// Master switch for workflow tracking and gates.
    #[serde(default = "enabled")]
    pub fic_enabled: bool,
    #[serde(default = "enabled")]
    pub fic_context_tracking: bool,
    /// Suggest delegating exploration prompts to a research subagent.
    #[serde(default = "enabled")]
    pub fic_auto_delegate_research: bool,
    #[serde(default = "enabled")]
    pub auto_progress_logging: bool,
    /// Warn at stop time about features still marked in progress.
    #[serde(default = "enabled")]
    pub feature_enforcement: bool,
    #[serde(default = "enabled")]
    pub init_script_execution: bool,
    #[serde(default = "enabled")]
    pub baseline_tests_on_startup: bool,

    #[serde(default)]
    pub fic: FicThresholds,
}

fn enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strictness: Strictness::default(),
            fic_enabled: true,
            fic_context_tracking: true,
            fic_auto_delegate_research: true,
            auto_progress_logging: true,
            feature_enforcement: true,
            init_script_execution: true,
            baseline_tests_on_startup: true,
            fic: FicThresholds::default(),
        }
    }
}

fn positive_or(value: f64, default: f64) -> f64 {
    if value > 0.0 { value } else { default }
}

impl Config {
    /// Load the project config. A missing file yields the defaults; missing
    /// keys in an existing file are filled in via serde.
    pub fn load(store: &StateStore) -> Result<Self> {
        let path = store.path(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn save(&self, store: &StateStore) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("serializing config")?;
        store.ensure_dir()?;
        let path = store.path(CONFIG_FILE);
        store::write_private_file(&path, toml_str.as_bytes())?;
        Ok(())
    }

    /// Set the strictness from user input; unknown levels become `standard`.
    pub fn set_strictness(&mut self, level: &str) -> Strictness {
        self.strictness = Strictness::from(level.to_string());
        self.strictness
    }

    pub fn is_relaxed(&self) -> bool {
        self.strictness == Strictness::Relaxed
    }

    pub fn auto_compact_threshold(&self) -> f64 {
        positive_or(self.fic.auto_compact_threshold, DEFAULT_AUTO_COMPACT_THRESHOLD)
    }

    pub fn compaction_tool_threshold(&self) -> u64 {
        match self.fic.compaction_tool_threshold {
            0 => DEFAULT_COMPACTION_TOOL_THRESHOLD,
            n => n,
        }
    }

    pub fn target_utilization_high(&self) -> f64 {
        positive_or(self.fic.target_utilization_high, DEFAULT_TARGET_UTILIZATION_HIGH)
    }

    pub fn research_confidence_threshold(&self) -> f64 {
        positive_or(self.fic.research_confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD)
    }

    pub fn max_open_questions(&self) -> u32 {
        match self.fic.max_open_questions {
            0 => DEFAULT_MAX_OPEN_QUESTIONS,
            n => n,
        }
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            warn_on_research_incomplete: self.fic.warn_on_research_incomplete,
            warn_on_plan_incomplete: self.fic.warn_on_plan_incomplete,
            block_in_strict_mode: self.fic.block_in_strict_mode,
        }
    }
}

pub fn is_initialized(store: &StateStore) -> bool {
    store.path(INIT_MARKER).is_file()
}

pub fn mark_initialized(store: &StateStore) -> Result<()> {
    store.ensure_dir()?;
    let stamp = chrono::Utc::now().to_rfc3339();
    store::write_private_file(&store.path(INIT_MARKER), stamp.as_bytes())?;
    Ok(())
}
