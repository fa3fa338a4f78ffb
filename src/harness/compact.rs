use super::{Harness, hint};
use crate::artifacts::phase_info;
use crate::context::ContextState;
use crate::messages;
use crate::preserved::PreservedContext;
use crate::types::{HookOutput, PreCompactInput};
use crate::util::percent;
use anyhow::{Context, Result};

impl Harness {
    pub(super) fn handle_pre_compact(&self, input: &PreCompactInput) -> Result<Option<HookOutput>> {
        if !self.config.fic_enabled {
            return Ok(None);
        }
        tracing::debug!(trigger = input.trigger.as_deref().unwrap_or("unknown"), "preparing for compaction");

        let threshold = self.confidence_threshold();
        let latest = self.latest_artifacts()?;
        let info = phase_info(&latest, threshold);

        let context_state = if self.config.fic_context_tracking {
            Some(
                ContextState::load(&self.store, &self.session_id)
                    .context("loading context state")?,
            )
        } else {
            None
        };
        let context_line = context_state.as_ref().map(|state| {
            format!(
                "[FIC] Context state: {}% utilization, {} tokens estimated",
                percent(state.utilization_percent),
                state.total_token_estimate
            )
        });

        let mut preserved =
            PreservedContext::new(&self.session_id, &info, latest.research.as_ref(), threshold);
        if let Some(state) = &context_state {
            preserved.token_estimate_at_compact = state.total_token_estimate;
            preserved.utilization_at_compact = state.utilization_percent;
        }
        let saved = match preserved.save(&self.store) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("could not save preserved context: {}", err.detail());
                false
            }
        };

        let banner = messages::preservation_banner(
            context_line.as_deref(),
            saved,
            info.phase,
            &preserved.focus_directive,
        )?;
        Ok(hint(banner))
    }
}
