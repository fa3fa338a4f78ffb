use super::{Harness, hint};
use crate::gates;
use crate::subagent::{self, SubagentRole};
use crate::transcript::Transcript;
use crate::types::{HookOutput, SubagentStopInput};
use anyhow::{Context, Result};
use std::borrow::Cow;
use std::path::Path;

impl Harness {
    pub(super) fn handle_subagent_stop(
        &self,
        input: &SubagentStopInput,
    ) -> Result<Option<HookOutput>> {
        if !self.config.fic_enabled {
            return Ok(None);
        }
        let Some(role) = subagent::classify(input.agent_type(), input.description()) else {
            return Ok(None);
        };
        let output = subagent_output(input)?;
        if output.trim().is_empty() {
            return Ok(None);
        }

        let threshold = self.confidence_threshold();
        let latest = self.latest_artifacts()?;
        let summary = match role {
            SubagentRole::Researcher => {
                let findings = subagent::extract_research(&output);
                let summary = findings.summary(threshold, self.config.max_open_questions());
                let feature = match input.description() {
                    "" => input.agent_type(),
                    d => d,
                };
                let research = findings.into_research(feature, latest.research.as_ref());
                let path = self.artifacts.save(&research).context("saving research artifact")?;
                tracing::info!(path = %path.display(), confidence = research.confidence_score, "research recorded");
                summary
            }
            SubagentRole::PlanValidator => {
                let findings = subagent::extract_validation(&output);
                let research_id = latest.research.as_ref().map(|r| r.id.as_str());
                match findings.into_plan(latest.plan.as_ref(), input.description(), research_id) {
                    Some(plan) => {
                        let path = self.artifacts.save(&plan).context("saving plan artifact")?;
                        tracing::info!(path = %path.display(), "plan validation recorded");
                    }
                    None => tracing::debug!("validator output had no recommendation"),
                }
                findings.summary()
            }
        };

        let latest = self.latest_artifacts()?;
        gates::sync_gate_state(&self.store, self.current_phase(&latest))
            .context("syncing gate state")?;

        Ok(hint(summary))
    }
}

/// The subagent's final report, falling back to its transcript.
fn subagent_output(input: &SubagentStopInput) -> Result<Cow<'_, str>> {
    let output = input.output();
    if !output.trim().is_empty() {
        return Ok(Cow::Borrowed(output));
    }
    let Some(path) = input.agent_transcript_path.as_deref().filter(|p| !p.is_empty()) else {
        return Ok(Cow::Borrowed(output));
    };
    let transcript = Transcript::read(Path::new(path))?;
    Ok(transcript
        .last_text_response()
        .map_or(Cow::Borrowed(output), Cow::Owned))
}
