use super::{Harness, hint};
use crate::artifacts::{LatestArtifacts, WorkflowPhase};
use crate::context::ContextState;
use crate::gates;
use crate::git::GitRepo;
use crate::initscript;
use crate::messages;
use crate::preserved::PreservedContext;
use crate::progress;
use crate::testrunner::{self, TestResult};
use crate::types::{HookOutput, SessionStartInput};
use crate::util::{ellipsize, percent};
use anyhow::{Context, Result};

const MAX_PROGRESS_LINES: usize = 50;
const MAX_RECENT_COMMITS: usize = 10;
const MAX_PRIOR_DISCOVERIES: usize = 5;
const PLAN_GOAL_CHARS: usize = 60;

impl Harness {
    pub(super) fn handle_session_start(
        &self,
        input: &SessionStartInput,
    ) -> Result<Option<HookOutput>> {
        if input.after_compaction() && self.config.fic_context_tracking {
            ContextState::reset_persisted(&self.store, &self.session_id)
                .context("resetting context state after compaction")?;
        }

        let mut lines = vec![
            "=== FIC SYSTEM SESSION STARTUP ===".to_string(),
            format!("Session started: {}", chrono::Local::now().to_rfc3339()),
            format!("Working directory: {}", self.work_dir.display()),
            format!("Mode: {}", self.config.strictness),
            String::new(),
        ];

        let mut phase = None;
        if self.config.fic_enabled {
            let latest = self.latest_artifacts()?;
            let resolved = self.current_phase(&latest);
            gates::sync_gate_state(&self.store, resolved).context("syncing gate state")?;
            self.workflow_section(&mut lines, resolved, &latest);
            phase = Some(resolved);
        }

        if self.config.init_script_execution {
            let result = initscript::run(&self.work_dir, initscript::DEFAULT_TIMEOUT);
            if let Some(report) = result.report() {
                lines.push("--- INIT SCRIPT ---".into());
                lines.push(report);
                lines.push(String::new());
            }
        }

        if self.config.baseline_tests_on_startup
            && testrunner::detect_test_command(&self.work_dir).is_some()
        {
            let summary = testrunner::run(&self.work_dir, testrunner::DEFAULT_TIMEOUT);
            if summary.result != TestResult::NotRun {
                lines.push("--- BASELINE TESTS ---".into());
                if summary.result == TestResult::Error {
                    lines.push(format!("Baseline tests: error ({})", summary.raw_output));
                } else {
                    lines.push(format!("Baseline tests: {summary}"));
                }
                lines.push(String::new());
            }
        }

        self.git_section(&mut lines);
        self.progress_section(&mut lines);

        lines.push("=== END SESSION CONTEXT ===".into());
        lines.push(String::new());

        let automation: Vec<&str> = [
            (self.config.auto_progress_logging, "auto-logging"),
            (self.config.fic_enabled, "FIC context tracking"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if !automation.is_empty() {
            lines.push(format!("Automation enabled: {}", automation.join(", ")));
            lines.push(String::new());
        }

        if let Some(phase) = phase {
            lines.push(messages::phase_guidance(phase).to_string());
        }

        Ok(hint(lines.join("\n").trim_end().to_string()))
    }

    fn workflow_section(&self, lines: &mut Vec<String>, phase: WorkflowPhase, latest: &LatestArtifacts) {
        lines.push("--- FIC WORKFLOW STATE ---".into());
        lines.push(format!("Phase: {phase}"));

        if let Some(prior) = PreservedContext::load(&self.store) {
            lines.push(String::new());
            lines.push("Prior Session Context:".into());
            for d in prior.essential_discoveries.iter().take(MAX_PRIOR_DISCOVERIES) {
                lines.push(format!("  - {}", d.summary));
            }
            lines.push(format!("Focus: {}", prior.focus_directive));
        }

        if let Some(research) = &latest.research {
            lines.push(String::new());
            lines.push(format!("Active Research: {}", research.feature_or_task));
            lines.push(format!("  Confidence: {}%", percent(research.confidence_score)));
            lines.push(format!("  Discoveries: {}", research.discoveries.len()));
            lines.push(format!(
                "  Open Questions: {} ({} blocking)",
                research.open_questions.len(),
                research.blocking_questions()
            ));
        }

        if let Some(plan) = &latest.plan {
            lines.push(String::new());
            lines.push(format!("Active Plan: {}", ellipsize(&plan.goal, PLAN_GOAL_CHARS)));
            lines.push(format!("  Steps: {}", plan.steps.len()));
            if let Some(validation) = &plan.validation_result {
                lines.push(format!("  Validation: {}", validation.recommendation));
            }
        }

        if let Some(implementation) = &latest.implementation {
            lines.push(String::new());
            lines.push("Implementation Progress:".into());
            lines.push(format!("  Completed Steps: {}", implementation.steps_completed.len()));
            lines.push(format!("  In Progress: {}", implementation.steps_in_progress.len()));
            if !implementation.plan_deviations.is_empty() {
                lines.push(format!("  Plan Deviations: {}", implementation.plan_deviations.len()));
            }
        }
        lines.push(String::new());
    }

    fn git_section(&self, lines: &mut Vec<String>) {
        let Some(repo) = GitRepo::discover(&self.work_dir) else {
            return;
        };

        lines.push("--- GIT STATUS ---".into());
        match repo.status_lines() {
            Ok(status) if status.is_empty() => lines.push("(clean)".into()),
            Ok(status) => lines.extend(status),
            Err(err) => {
                tracing::warn!("git status failed: {err:#}");
                lines.push("(unavailable)".into());
            }
        }
        lines.push(String::new());

        lines.push("--- RECENT COMMITS ---".into());
        match repo.recent_commits(MAX_RECENT_COMMITS) {
            Ok(commits) if commits.is_empty() => lines.push("(no commits)".into()),
            Ok(commits) => lines.extend(commits),
            Err(err) => {
                tracing::warn!("git log failed: {err:#}");
                lines.push("(no commits)".into());
            }
        }
        lines.push(String::new());
    }

    fn progress_section(&self, lines: &mut Vec<String>) {
        let (tail, truncated) = match progress::read_tail(&self.work_dir, MAX_PROGRESS_LINES) {
            Ok(t) => t,
            Err(err) => {
                tracing::warn!("skipping progress log: {err:#}");
                return;
            }
        };
        if tail.is_empty() {
            return;
        }
        lines.push("--- PROGRESS LOG ---".into());
        if truncated {
            lines.push("[...truncated...]".into());
        }
        lines.push(tail);
        lines.push(String::new());
    }
}
