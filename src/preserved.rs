//! Snapshot written before compaction and shown at the next session start.

use crate::artifacts::{Discovery, PhaseDetails, PhaseInfo, Research, WorkflowPhase};
use crate::store::{StateStore, StoreError};
use crate::util::{ellipsize, percent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PRESERVED_CONTEXT_FILE: &str = "fic-preserved-context.json";

const MAX_ESSENTIAL_DISCOVERIES: usize = 5;
const FOCUS_GOAL_CHARS: usize = 60;
const FOCUS_STEPS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreservedContext {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub phase: WorkflowPhase,
    pub phase_details: PhaseDetails,
    pub focus_directive: String,
    #[serde(default)]
    pub essential_discoveries: Vec<Discovery>,
    #[serde(default)]
    pub token_estimate_at_compact: u64,
    #[serde(default)]
    pub utilization_at_compact: f64,
}

impl PreservedContext {
    pub fn new(
        session_id: &str,
        info: &PhaseInfo,
        research: Option<&Research>,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            phase: info.phase,
            phase_details: info.details.clone(),
            focus_directive: focus_directive(info, confidence_threshold),
            essential_discoveries: essential_discoveries(research),
            token_estimate_at_compact: 0,
            utilization_at_compact: 0.0,
        }
    }

    pub fn save(&self, store: &StateStore) -> Result<(), StoreError> {
        store.write(PRESERVED_CONTEXT_FILE, self)
    }

    /// The last snapshot, if one exists and is readable.
    pub fn load(store: &StateStore) -> Option<Self> {
        match store.read(PRESERVED_CONTEXT_FILE) {
            Ok(ctx) => ctx,
            Err(err) => {
                tracing::warn!("skipping preserved context: {}", err.detail());
                None
            }
        }
    }
}

/// Critical findings from the latest research, falling back to the first
/// findings when none are flagged critical.
fn essential_discoveries(research: Option<&Research>) -> Vec<Discovery> {
    let Some(research) = research else {
        return Vec::new();
    };
    let critical: Vec<Discovery> = research
        .discoveries
        .iter()
        .filter(|d| d.critical)
        .take(MAX_ESSENTIAL_DISCOVERIES)
        .cloned()
        .collect();
    if !critical.is_empty() {
        return critical;
    }
    research
        .discoveries
        .iter()
        .take(MAX_ESSENTIAL_DISCOVERIES)
        .cloned()
        .collect()
}

/// One-line instruction for what to do after compaction.
pub fn focus_directive(info: &PhaseInfo, confidence_threshold: f64) -> String {
    match (info.phase, &info.details) {
        (
            WorkflowPhase::Implementation,
            PhaseDetails::Implementation {
                steps_in_progress,
                steps_completed,
                ..
            },
        ) => {
            if steps_in_progress.is_empty() {
                format!("Continue implementation. {steps_completed} steps completed.")
            } else {
                let shown: Vec<&str> = steps_in_progress
                    .iter()
                    .take(FOCUS_STEPS)
                    .map(String::as_str)
                    .collect();
                format!("Continue implementation. In progress: {}", shown.join(", "))
            }
        }
        (WorkflowPhase::Implementation, _) => "Continue implementation.".to_string(),

        (WorkflowPhase::ImplementationReady, PhaseDetails::Plan { goal, .. }) if !goal.is_empty() => {
            format!(
                "Plan validated. Begin implementation of: {}",
                ellipsize(goal, FOCUS_GOAL_CHARS)
            )
        }
        (WorkflowPhase::ImplementationReady, _) => "Plan validated. Begin implementation.".to_string(),

        (WorkflowPhase::Planning, PhaseDetails::Plan { goal, .. }) if !goal.is_empty() => {
            format!("Continue planning. Goal: {}", ellipsize(goal, FOCUS_GOAL_CHARS))
        }
        (WorkflowPhase::Planning, _) => "Continue planning.".to_string(),

        (WorkflowPhase::PlanningReady, PhaseDetails::Research { confidence, .. }) => format!(
            "Research complete (confidence: {}%). Create implementation plan.",
            percent(*confidence)
        ),
        (WorkflowPhase::PlanningReady, _) => "Research complete. Create implementation plan.".to_string(),

        (WorkflowPhase::Research, PhaseDetails::Research { feature, .. }) if !feature.is_empty() => {
            format!(
                "Continue research on: {feature}. Build confidence to >= {}%.",
                percent(confidence_threshold)
            )
        }
        (WorkflowPhase::Research, _) => format!(
            "Continue research. Build confidence to >= {}%.",
            percent(confidence_threshold)
        ),

        (WorkflowPhase::NewSession, _) => "Review context and determine next steps.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{phase_info, Implementation, LatestArtifacts, Plan};

    fn info_for(latest: LatestArtifacts) -> PhaseInfo {
        phase_info(&latest, 0.7)
    }

    #[test]
    fn implementation_focus_lists_first_three_steps() {
        let mut implementation = Implementation::new("p");
        implementation.steps_in_progress = ["a", "b", "c", "d"].map(String::from).to_vec();
        let info = info_for(LatestArtifacts {
            implementation: Some(implementation),
            ..Default::default()
        });
        assert_eq!(
            focus_directive(&info, 0.7),
            "Continue implementation. In progress: a, b, c"
        );
    }

    #[test]
    fn implementation_focus_counts_completed() {
        let mut implementation = Implementation::new("p");
        implementation.steps_completed = vec!["1".into(), "2".into()];
        let info = info_for(LatestArtifacts {
            implementation: Some(implementation),
            ..Default::default()
        });
        assert_eq!(focus_directive(&info, 0.7), "Continue implementation. 2 steps completed.");
    }

    #[test]
    fn planning_focus_truncates_goal() {
        let info = info_for(LatestArtifacts {
            plan: Some(Plan::new("x".repeat(80))),
            ..Default::default()
        });
        let focus = focus_directive(&info, 0.7);
        assert_eq!(focus, format!("Continue planning. Goal: {}...", "x".repeat(60)));
    }

    #[test]
    fn research_focus_names_feature_and_threshold() {
        let info = info_for(LatestArtifacts {
            research: Some(Research::new("rate limiter", 0.4)),
            ..Default::default()
        });
        assert_eq!(
            focus_directive(&info, 0.7),
            "Continue research on: rate limiter. Build confidence to >= 70%."
        );

        let info = info_for(LatestArtifacts {
            research: Some(Research::new("rate limiter", 0.85)),
            ..Default::default()
        });
        assert_eq!(
            focus_directive(&info, 0.7),
            "Research complete (confidence: 85%). Create implementation plan."
        );
    }

    #[test]
    fn new_session_focus() {
        let info = info_for(LatestArtifacts::default());
        assert_eq!(focus_directive(&info, 0.7), "Review context and determine next steps.");
    }

    #[test]
    fn essential_discoveries_prefer_critical() {
        let mut research = Research::new("x", 0.5);
        research.discoveries = (0..8)
            .map(|i| Discovery {
                summary: format!("finding {i}"),
                critical: i % 2 == 1,
            })
            .collect();
        let picked = essential_discoveries(Some(&research));
        assert_eq!(picked.len(), 4);
        assert!(picked.iter().all(|d| d.critical));

        research.discoveries.iter_mut().for_each(|d| d.critical = false);
        assert_eq!(essential_discoveries(Some(&research)).len(), 5);
        assert!(essential_discoveries(None).is_empty());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert!(PreservedContext::load(&store).is_none());

        let info = info_for(LatestArtifacts::default());
        let mut ctx = PreservedContext::new("sess-1", &info, None, 0.7);
        ctx.token_estimate_at_compact = 120_000;
        ctx.utilization_at_compact = 0.6;
        ctx.save(&store).unwrap();
        assert_eq!(PreservedContext::load(&store), Some(ctx));
    }

    #[test]
    fn unreadable_snapshot_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path());
        store.ensure_dir().unwrap();
        std::fs::write(store.path(PRESERVED_CONTEXT_FILE), "nope").unwrap();
        assert!(PreservedContext::load(&store).is_none());
    }
}
