use super::{Harness, joined};
use crate::context::ContextState;
use crate::messages;
use crate::prompts;
use crate::types::{HookOutput, UserPromptSubmitInput};
use anyhow::{Context, Result};

impl Harness {
    pub(super) fn handle_user_prompt_submit(
        &self,
        input: &UserPromptSubmitInput,
    ) -> Result<Option<HookOutput>> {
        if !self.config.fic_enabled {
            return Ok(None);
        }
        let prompt = prompts::cap_prompt(input.prompt());
        if prompt.trim().is_empty() {
            return Ok(None);
        }

        if self.config.fic_context_tracking {
            let state = ContextState::load(&self.store, &self.session_id)
                .context("loading context state")?;
            let threshold = self.config.auto_compact_threshold();
            if state.needs_compaction(threshold) {
                let directive = messages::compaction_directive(
                    state.utilization_percent,
                    state.total_token_estimate,
                    threshold,
                    false,
                )?;
                return Ok(Some(HookOutput::message(directive)));
            }
        }

        let mut directives = Vec::new();
        let latest = self.latest_artifacts()?;
        let phase = self.current_phase(&latest);

        if self.config.fic_auto_delegate_research && prompts::is_research_prompt(prompt) {
            directives.push(messages::research_directive(phase, prompt)?);
        } else if prompts::is_planning_prompt(prompt) && phase.needs_planning_guidance() {
            if let Some(directive) = messages::planning_directive(phase, prompt)? {
                directives.push(directive);
            }
        }

        Ok(joined(directives, "\n\n"))
    }
}
