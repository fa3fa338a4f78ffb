use super::{Harness, joined};
use crate::context::ContextState;
use crate::gates::{self, BLOCK_FOOTER, GateAction, GateKind};
use crate::messages;
use crate::progress;
use crate::types::{HookOutput, PostToolUseInput, PreToolUseInput};
use crate::util::ellipsize;
use crate::validation::validate_path;
use anyhow::{Context, Result};
use std::path::Path;

/// Edits with a larger result get a progress entry.
const SUBSTANTIAL_EDIT_BYTES: usize = 500;
const LOGGED_COMMAND_CHARS: usize = 40;

const SIGNIFICANT_COMMANDS: &[&str] = &["test", "build", "deploy", "npm", "cargo", "go build"];
const PASS_INDICATORS: &[&str] = &["passed", "PASSED", "test result: ok"];
const FAIL_INDICATORS: &[&str] = &["failed", "FAILED", "FAIL", "error"];

/// Project-relative when the file is inside `work_dir`, else the file name.
fn display_path(path: &str, work_dir: &Path) -> String {
    if let Ok(resolved) = validate_path(path, work_dir) {
        if let Ok(relative) = resolved.strip_prefix(work_dir) {
            return relative.display().to_string();
        }
    }
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// The progress-log line for a tool call worth remembering, if any.
fn progress_entry(input: &PostToolUseInput, work_dir: &Path) -> Option<String> {
    match input.tool_name.as_str() {
        "Write" => {
            let file = input.file_path()?;
            Some(format!(
                "AUTO: Created {} (new file created)",
                display_path(file, work_dir)
            ))
        }
        "Edit" | "MultiEdit" => {
            let file = input.file_path()?;
            (input.response_text().len() > SUBSTANTIAL_EDIT_BYTES).then(|| {
                format!(
                    "AUTO: Modified {} (substantial edit)",
                    display_path(file, work_dir)
                )
            })
        }
        "Bash" => {
            let cmd = input.command()?;
            SIGNIFICANT_COMMANDS
                .iter()
                .any(|c| cmd.contains(c))
                .then(|| {
                    format!(
                        "AUTO: Ran '{}' (build/test command)",
                        ellipsize(cmd, LOGGED_COMMAND_CHARS)
                    )
                })
        }
        _ => None,
    }
}

/// Pass/fail verdict for Bash output that looks like a test run.
/// A zero failure count is not a failure.
fn test_verdict(output: &str) -> Option<&'static str> {
    let scrubbed = output.replace(" 0 failed", "");
    let passed = PASS_INDICATORS.iter().any(|i| scrubbed.contains(i));
    let failed = FAIL_INDICATORS.iter().any(|i| scrubbed.contains(i));
    if failed {
        Some("[FIC] Tests failed. Review failures before continuing.")
    } else if passed {
        Some("[FIC] Tests passed! Implementation verification gate satisfied.")
    } else {
        None
    }
}

impl Harness {
    pub(super) fn handle_pre_tool_use(
        &self,
        input: &PreToolUseInput,
    ) -> Result<Option<HookOutput>> {
        if !self.config.fic_enabled {
            return Ok(None);
        }
        let Some(kind) = GateKind::for_tool(&input.tool_name) else {
            return Ok(None);
        };
        let result = gates::check_gate(
            kind,
            &self.store,
            self.config.strictness,
            &self.config.gate_config(),
        );
        tracing::debug!(
            tool = %input.tool_name,
            file = input.file_path().unwrap_or_default(),
            action = %result.action,
            "gate checked"
        );
        Ok(match result.action {
            GateAction::Allow => None,
            GateAction::Warn => Some(HookOutput::message(gates::format_gate_message(&result))),
            GateAction::Block => Some(HookOutput::deny_tool(format!(
                "{}\n\n{BLOCK_FOOTER}",
                gates::format_gate_message(&result)
            ))),
        })
    }

    pub(super) fn handle_post_tool_use(
        &self,
        input: &PostToolUseInput,
    ) -> Result<Option<HookOutput>> {
        let mut messages = Vec::new();
        let response = input.response_text();

        if self.config.fic_enabled && self.config.fic_context_tracking {
            let state = ContextState::record(&self.store, &self.session_id, &input.tool_name, &response)
                .context("recording tool call")?;
            let threshold = self.config.auto_compact_threshold();
            if state.needs_compaction(threshold) {
                let directive = messages::compaction_directive(
                    state.utilization_percent,
                    state.total_token_estimate,
                    threshold,
                    true,
                )?;
                return Ok(Some(HookOutput::message(directive)));
            }
            if state.needs_compaction_by_tool_count(self.config.compaction_tool_threshold())
                && state.utilization_percent >= self.config.target_utilization_high()
            {
                messages.push(messages::soft_compaction_hint(state.utilization_percent));
            } else if let Some(level) = state.utilization_message() {
                messages.push(level);
            }
        }

        let tracked = matches!(input.tool_name.as_str(), "Edit" | "MultiEdit" | "Write" | "Bash");
        if self.config.is_relaxed() || !tracked {
            return Ok(joined(messages, "\n"));
        }

        if self.config.auto_progress_logging {
            if let Some(entry) = progress_entry(input, &self.work_dir) {
                if let Err(err) = progress::append(&self.work_dir, &entry) {
                    tracing::warn!("could not update progress log: {err:#}");
                }
            }
        }

        if input.tool_name == "Bash" {
            if let Some(verdict) = test_verdict(&response) {
                if input.command().is_some_and(|c| c.contains("test")) {
                    messages.push(verdict.to_string());
                }
            }
        }

        Ok(joined(messages, "\n"))
    }
}
