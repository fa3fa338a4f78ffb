use super::{Harness, hint};
use crate::config::Strictness;
use crate::features::{FeatureList, FeatureStatus};
use crate::git::GitRepo;
use crate::progress::PROGRESS_FILE;
use crate::testrunner::did_tests_run;
use crate::transcript::Transcript;
use crate::types::{HookOutput, StopInput};
use anyhow::Result;
use std::path::Path;

const MAX_LISTED_FEATURES: usize = 3;

/// What the agent should deal with before ending its turn.
#[derive(Debug, Default, PartialEq)]
struct StopReview {
    blockers: Vec<String>,
    warnings: Vec<String>,
}

impl StopReview {
    fn is_empty(&self) -> bool {
        self.blockers.is_empty() && self.warnings.is_empty()
    }

    fn into_output(self, strictness: Strictness) -> Option<HookOutput> {
        if self.is_empty() {
            return None;
        }
        match strictness {
            Strictness::Relaxed => {
                let first = self.blockers.iter().chain(&self.warnings).next()?;
                hint(format!("[Harness] FYI: {first}"))
            }
            Strictness::Strict if !self.blockers.is_empty() => {
                let mut reason = String::from("[Harness - STRICT MODE] Cannot stop due to:");
                for r in &self.blockers {
                    reason.push_str(&format!("\n  ! {r}"));
                }
                if !self.warnings.is_empty() {
                    reason.push_str("\n\nAdditional reminders:");
                    for w in &self.warnings {
                        reason.push_str(&format!("\n  - {w}"));
                    }
                }
                Some(HookOutput::block_stop(reason))
            }
            Strictness::Strict => {
                let mut msg = String::from("[Harness] Approved to stop.\n\nReminders:\n");
                for w in &self.warnings {
                    msg.push_str(&format!("  - {w}\n"));
                }
                hint(msg)
            }
            Strictness::Standard => {
                let mut lines = Vec::new();
                if self.blockers.is_empty() {
                    lines.push("[Harness] Reminders before stopping:".to_string());
                } else {
                    lines.push("[Harness] IMPORTANT - Before stopping:".to_string());
                    lines.extend(self.blockers.iter().map(|r| format!("  ! {r}")));
                    if !self.warnings.is_empty() {
                        lines.push(String::new());
                        lines.push("Additional reminders:".to_string());
                    }
                }
                lines.extend(self.warnings.iter().map(|w| format!("  - {w}")));
                hint(lines.join("\n"))
            }
        }
    }
}

impl Harness {
    pub(super) fn handle_stop(&self, input: &StopInput) -> Result<Option<HookOutput>> {
        if input.stop_hook_active {
            tracing::debug!("stop hook already active, not re-checking");
            return Ok(None);
        }
        if !input.is_normal_stop() {
            tracing::debug!(reason = input.stop_reason(), "skipping checks for abnormal stop");
            return Ok(None);
        }
        let review = self.review_stop(&input.common.transcript_path)?;
        Ok(review.into_output(self.config.strictness))
    }

    fn review_stop(&self, transcript_path: &str) -> Result<StopReview> {
        let mut review = StopReview::default();

        let transcript = if transcript_path.is_empty() {
            Transcript::empty()
        } else {
            Transcript::read(Path::new(transcript_path))?
        };
        let tests_ran = did_tests_run(transcript.raw());
        tracing::debug!(
            bash_commands = transcript.bash_commands().count(),
            tests_ran,
            "reviewed transcript"
        );

        let repo = GitRepo::discover(&self.work_dir);
        let code_modified = repo.as_ref().is_some_and(|r| {
            r.code_was_modified().unwrap_or_else(|err| {
                tracing::warn!("could not list modified files: {err:#}");
                false
            })
        });

        if code_modified && !tests_ran {
            review
                .blockers
                .push("Code was modified but tests were not run".to_string());
        }

        let uncommitted = repo.as_ref().is_some_and(|r| {
            r.has_uncommitted_changes().unwrap_or_else(|err| {
                tracing::warn!("could not check git status: {err:#}");
                false
            })
        });
        if uncommitted {
            review
                .warnings
                .push("Uncommitted changes exist - consider creating a checkpoint".to_string());
        }

        if self.config.feature_enforcement {
            match FeatureList::load(&self.work_dir) {
                Ok(Some(list)) => {
                    let in_progress: Vec<&str> = list
                        .with_status(FeatureStatus::InProgress)
                        .take(MAX_LISTED_FEATURES)
                        .map(|f| f.name.as_str())
                        .collect();
                    if !in_progress.is_empty() {
                        review.warnings.push(format!(
                            "Features still in progress: {}",
                            in_progress.join(", ")
                        ));
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::warn!("skipping feature checklist: {}", err.detail()),
            }
        }

        let progress_logged = repo.as_ref().is_some_and(|r| r.file_modified(PROGRESS_FILE));
        if code_modified && !progress_logged {
            review
                .warnings
                .push("Progress log not updated - consider logging your accomplishments".to_string());
        }

        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(blockers: &[&str], warnings: &[&str]) -> StopReview {
        StopReview {
            blockers: blockers.iter().map(|s| s.to_string()).collect(),
            warnings: warnings.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn nothing_to_say() {
        for strictness in [Strictness::Relaxed, Strictness::Standard, Strictness::Strict] {
            assert_eq!(review(&[], &[]).into_output(strictness), None);
        }
    }

    #[test]
    fn strict_blocks_on_blockers() {
        let out = review(&["run tests"], &["commit"])
            .into_output(Strictness::Strict)
            .unwrap();
        assert_eq!(out.decision.as_deref(), Some("block"));
        assert_eq!(
            out.reason.as_deref(),
            Some(
                "[Harness - STRICT MODE] Cannot stop due to:\n  ! run tests\n\nAdditional reminders:\n  - commit"
            )
        );
    }

    #[test]
    fn strict_approves_with_only_warnings() {
        let out = review(&[], &["commit"]).into_output(Strictness::Strict).unwrap();
        assert_eq!(out.decision, None);
        assert_eq!(
            out.system_message.as_deref(),
            Some("[Harness] Approved to stop.\n\nReminders:\n  - commit\n")
        );
    }

    #[test]
    fn standard_never_blocks() {
        let out = review(&["run tests"], &["commit"])
            .into_output(Strictness::Standard)
            .unwrap();
        assert_eq!(out.decision, None);
        assert_eq!(
            out.system_message.as_deref(),
            Some("[Harness] IMPORTANT - Before stopping:\n  ! run tests\n\nAdditional reminders:\n  - commit")
        );

        let out = review(&[], &["commit"]).into_output(Strictness::Standard).unwrap();
        assert_eq!(
            out.system_message.as_deref(),
            Some("[Harness] Reminders before stopping:\n  - commit")
        );
    }

    #[test]
    fn relaxed_mentions_first_item() {
        let out = review(&["run tests"], &["commit"])
            .into_output(Strictness::Relaxed)
            .unwrap();
        assert_eq!(out.system_message.as_deref(), Some("[Harness] FYI: run tests"));
    }
}
