//! Workflow artifacts and the phase resolver.
//!
//! Each phase of the Research -> Plan -> Implement workflow leaves behind an
//! immutable JSON record under `.claude/fic-artifacts/<kind>/`. The current
//! workflow phase is never stored; it is always derived from the latest
//! record of each kind.

use crate::store::{self, StateStore, StoreError};
use crate::util::truncate_chars;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const ARTIFACTS_DIR: &str = "fic-artifacts";

/// Research is complete at or above this confidence unless configured otherwise.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.70;

const MAX_COLLISION_SUFFIX: u32 = 999;

// ===================================================================
// Artifact records
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Research,
    Plan,
    Implementation,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Research,
        ArtifactKind::Plan,
        ArtifactKind::Implementation,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Research => "research",
            ArtifactKind::Plan => "plan",
            ArtifactKind::Implementation => "implementation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub summary: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub critical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenQuestion {
    pub question: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocking: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Research {
    pub id: String,
    pub feature_or_task: String,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discoveries: Vec<Discovery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub open_questions: Vec<OpenQuestion>,
    #[serde(default)]
    pub research_sessions: u32,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Research {
    pub fn new(feature_or_task: impl Into<String>, confidence_score: f64) -> Self {
        Self {
            id: new_id(),
            feature_or_task: feature_or_task.into(),
            confidence_score,
            discoveries: Vec::new(),
            open_questions: Vec::new(),
            research_sessions: 1,
            updated_at: Utc::now(),
        }
    }

    pub fn is_complete(&self, threshold: f64) -> bool {
        self.confidence_score >= threshold
    }

    pub fn blocking_questions(&self) -> usize {
        self.open_questions.iter().filter(|q| q.blocking).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Proceed,
    Revise,
    Block,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recommendation::Proceed => "PROCEED",
            Recommendation::Revise => "REVISE",
            Recommendation::Block => "BLOCK",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub recommendation: Recommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<PlanStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_artifact_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            goal: goal.into(),
            steps: Vec::new(),
            validation_result: None,
            research_artifact_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Validated with a `PROCEED` recommendation.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self.validation_result,
            Some(ValidationResult {
                recommendation: Recommendation::Proceed,
                ..
            })
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub id: String,
    pub plan_artifact_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps_completed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps_in_progress: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_deviations: Vec<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
impl Implementation {
    pub fn new(plan_artifact_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            plan_artifact_id: plan_artifact_id.into(),
            steps_completed: Vec::new(),
            steps_in_progress: Vec::new(),
            plan_deviations: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A record type that lives in its own artifact directory.
pub trait ArtifactRecord: Serialize + DeserializeOwned {
    const KIND: ArtifactKind;

    fn id(&self) -> &str;
}

impl ArtifactRecord for Research {
    const KIND: ArtifactKind = ArtifactKind::Research;

    fn id(&self) -> &str {
        &self.id
    }
}

impl ArtifactRecord for Plan {
    const KIND: ArtifactKind = ArtifactKind::Plan;

    fn id(&self) -> &str {
        &self.id
    }
}

impl ArtifactRecord for Implementation {
    const KIND: ArtifactKind = ArtifactKind::Implementation;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Closed union of the artifact records.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Research(Research),
    Plan(Plan),
    Implementation(Implementation),
}

impl Artifact {
    /// Decode a record whose kind is known from where it was stored.
    pub fn decode(kind: ArtifactKind, json: &str) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ArtifactKind::Research => Artifact::Research(serde_json::from_str(json)?),
            ArtifactKind::Plan => Artifact::Plan(serde_json::from_str(json)?),
            ArtifactKind::Implementation => Artifact::Implementation(serde_json::from_str(json)?),
        })
    }
}

// ===================================================================
// Artifact store
// ===================================================================

/// Append-only artifact directories under `.claude/fic-artifacts/`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(store: &StateStore) -> Self {
        Self {
            root: store.path(ARTIFACTS_DIR),
        }
    }

    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Path of the newest record of `kind`: the greatest `.json` file name.
    pub fn latest_path(&self, kind: ArtifactKind) -> Result<Option<PathBuf>, StoreError> {
        let dir = self.dir(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path: dir, source }),
        };
        let latest = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".json") && !name.starts_with('.'))
            .max();
        Ok(latest.map(|name| dir.join(name)))
    }

    pub fn latest(&self, kind: ArtifactKind) -> Result<Option<Artifact>, StoreError> {
        let Some(path) = self.latest_path(kind)? else {
            return Ok(None);
        };
        let json = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        Artifact::decode(kind, &json)
            .map(Some)
            .map_err(|source| StoreError::Parse { path, source })
    }

    pub fn latest_all(&self) -> Result<LatestArtifacts, StoreError> {
        let mut latest = LatestArtifacts::default();
        for kind in ArtifactKind::ALL {
            match self.latest(kind)? {
                Some(Artifact::Research(r)) => latest.research = Some(r),
                Some(Artifact::Plan(p)) => latest.plan = Some(p),
                Some(Artifact::Implementation(i)) => latest.implementation = Some(i),
                None => {}
            }
        }
        Ok(latest)
    }

    /// Write `artifact` as a new timestamp-named record and return its path.
    pub fn save<T: ArtifactRecord>(&self, artifact: &T) -> Result<PathBuf, StoreError> {
        let json = serde_json::to_string_pretty(artifact).map_err(|source| {
            StoreError::Serialize {
                what: T::KIND.dir_name(),
                source,
            }
        })?;
        let dir = self.dir(T::KIND);
        store::create_private_dir(&dir)?;
        let stamp = Utc::now().format("%Y%m%d-%H%M%S-%6f").to_string();
        let path = write_unique(&dir, &stamp, json.as_bytes())?;
        tracing::debug!(kind = T::KIND.dir_name(), id = artifact.id(), path = %path.display(), "saved artifact");
        Ok(path)
    }
}

/// Create `<stamp>.json` in `dir` without overwriting an existing record.
/// Collisions get a `_NNN` suffix, which still sorts after the original.
fn write_unique(dir: &Path, stamp: &str, contents: &[u8]) -> Result<PathBuf, StoreError> {
    let tmp = dir.join(format!(".{stamp}.{}.tmp", std::process::id()));
    store::write_private_file(&tmp, contents)?;

    let mut result = Err(io::Error::from(io::ErrorKind::AlreadyExists));
    for n in 0..=MAX_COLLISION_SUFFIX {
        let name = if n == 0 {
            format!("{stamp}.json")
        } else {
            format!("{stamp}_{n:03}.json")
        };
        let target = dir.join(name);
        match fs::hard_link(&tmp, &target) {
            Ok(()) => {
                result = Ok(target);
                break;
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                result = Err(e);
                break;
            }
        }
    }
    let _ = fs::remove_file(&tmp);
    result.map_err(|source| StoreError::Write {
        path: dir.join(format!("{stamp}.json")),
        source,
    })
}

// ===================================================================
// Phase resolution
// ===================================================================

/// Latest record of each kind, any of which may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestArtifacts {
    pub research: Option<Research>,
    pub plan: Option<Plan>,
    pub implementation: Option<Implementation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowPhase {
    NewSession,
    Research,
    PlanningReady,
    Planning,
    ImplementationReady,
    Implementation,
}

impl WorkflowPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowPhase::NewSession => "NEW_SESSION",
            WorkflowPhase::Research => "RESEARCH",
            WorkflowPhase::PlanningReady => "PLANNING_READY",
            WorkflowPhase::Planning => "PLANNING",
            WorkflowPhase::ImplementationReady => "IMPLEMENTATION_READY",
            WorkflowPhase::Implementation => "IMPLEMENTATION",
        }
    }

    /// Phases where an implementation request should be steered back to
    /// research or planning.
    pub fn needs_planning_guidance(self) -> bool {
        matches!(
            self,
            WorkflowPhase::NewSession
                | WorkflowPhase::Research
                | WorkflowPhase::PlanningReady
                | WorkflowPhase::Planning
        )
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the workflow phase from the latest artifacts.
///
/// Precedence depends only on which kinds exist, not on their timestamps:
/// any implementation record wins over any plan, which wins over research.
pub fn resolve_phase(latest: &LatestArtifacts, confidence_threshold: f64) -> WorkflowPhase {
    if latest.implementation.is_some() {
        return WorkflowPhase::Implementation;
    }
    if let Some(plan) = &latest.plan {
        return if plan.is_actionable() {
            WorkflowPhase::ImplementationReady
        } else {
            WorkflowPhase::Planning
        };
    }
    if let Some(research) = &latest.research {
        return if research.is_complete(confidence_threshold) {
            WorkflowPhase::PlanningReady
        } else {
            WorkflowPhase::Research
        };
    }
    WorkflowPhase::NewSession
}

const GOAL_DETAIL_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseInfo {
    pub phase: WorkflowPhase,
    pub details: PhaseDetails,
}

/// Summary of the artifact that determines the phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PhaseDetails {
    Implementation {
        implementation_id: String,
        steps_completed: usize,
        steps_in_progress: Vec<String>,
        plan_id: String,
    },
    Plan {
        plan_id: String,
        goal: String,
        total_steps: usize,
        is_validated: bool,
    },
    Research {
        research_id: String,
        feature: String,
        confidence: f64,
        discoveries: usize,
        open_questions: usize,
    },
    Empty {},
}

pub fn phase_info(latest: &LatestArtifacts, confidence_threshold: f64) -> PhaseInfo {
    let phase = resolve_phase(latest, confidence_threshold);
    let details = match phase {
        WorkflowPhase::Implementation => latest.implementation.as_ref().map(|i| {
            PhaseDetails::Implementation {
                implementation_id: i.id.clone(),
                steps_completed: i.steps_completed.len(),
                steps_in_progress: i.steps_in_progress.clone(),
                plan_id: i.plan_artifact_id.clone(),
            }
        }),
        WorkflowPhase::ImplementationReady | WorkflowPhase::Planning => {
            latest.plan.as_ref().map(|p| PhaseDetails::Plan {
                plan_id: p.id.clone(),
                goal: truncate_chars(&p.goal, GOAL_DETAIL_CHARS).to_string(),
                total_steps: p.steps.len(),
                is_validated: p.validation_result.is_some(),
            })
        }
        WorkflowPhase::PlanningReady | WorkflowPhase::Research => {
            latest.research.as_ref().map(|r| PhaseDetails::Research {
                research_id: r.id.clone(),
                feature: r.feature_or_task.clone(),
                confidence: r.confidence_score,
                discoveries: r.discoveries.len(),
                open_questions: r.open_questions.len(),
            })
        }
        WorkflowPhase::NewSession => None,
    };
    PhaseInfo {
        phase,
        details: details.unwrap_or(PhaseDetails::Empty {}),
    }
}
