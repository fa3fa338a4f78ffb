//! Directive text shown to the agent.
//!
//! The multi-line directives are minijinja templates rendered with
//! `trim_blocks`/`lstrip_blocks`, so control tags never leave blank lines.

use crate::artifacts::WorkflowPhase;
use crate::util::{ellipsize, percent};
use anyhow::{Context, Result};
use minijinja::{Environment, context};
use std::sync::LazyLock;

const REQUEST_PREVIEW_CHARS: usize = 100;

pub const INIT_MESSAGE: &str = "[FIC System] This project has not been initialized. \
Run `fic-harness init` to enable the FIC (Flow-Information-Context) system. \
This provides automatic Research → Plan → Implement workflow with verification gates.";

const COMPACTION: &str = r#"{{ rule }}
[FIC] CRITICAL: CONTEXT UTILIZATION AT {{ utilization }}%
{% if autonomous %}
LONG-RUNNING SESSION - AUTO-COMPACTION REQUIRED
{% else %}
AUTO-COMPACTION REQUIRED
{% endif %}
{{ rule }}

Estimated tokens: {{ tokens }}
Threshold: {{ threshold }}%

{% if autonomous %}
ACTION REQUIRED: Run /compact NOW before continuing.

Context is filling up during autonomous operation.
Compacting now preserves essential discoveries and prevents
context overflow.
{% else %}
ACTION REQUIRED: Run /compact NOW before proceeding.

This will summarize context while preserving:
- Essential discoveries and decisions
- Current FIC phase and focus directive
- Critical blockers and open questions
{% endif %}
{{ rule }}

{% if autonomous %}
STOP current work. Run /compact immediately.
{% else %}
You MUST run /compact before responding to the user's request.
{% endif %}
The PreCompact hook will preserve essential context automatically."#;

const RESEARCH: &str = r#"[FIC] Research request detected.

DIRECTIVE: For complex exploration tasks, consider delegating to the @fic-researcher subagent.
This keeps exploration noise OUT of your main context.

Use the Task tool with subagent_type="Explore" or a custom research agent.

Current Phase: {{ phase }}
Original Request: {{ request }}

Only ESSENTIAL FINDINGS should enter this context. The subagent will return structured research results."#;

const PLANNING: &str = r#"{% if variant == "research_first" %}
[FIC] Implementation request detected, but research phase incomplete.

DIRECTIVE: Before implementing, complete RESEARCH to understand:
- What existing code does this affect?
- What patterns does the codebase use?
- What dependencies exist?

Consider delegating exploration to a subagent first.

Current Phase: {{ phase }}
Request: {{ request }}
{%- elif variant == "plan_first" %}
[FIC] Implementation request detected. Research is complete.

DIRECTIVE: Create an implementation PLAN before writing code.
- Define specific, actionable steps
- Identify files to modify
- Set verification criteria

Consider using the @fic-plan-validator subagent to validate your plan.

Current Phase: {{ phase }}
{%- else %}
[FIC] Implementation request detected. A plan exists but may not be validated.

DIRECTIVE: Validate the current plan before implementation.
- Review plan completeness
- Check for missing steps
- Ensure verification criteria exist

Current Phase: {{ phase }}
{%- endif %}"#;

const PRESERVATION: &str = r#"{% if context_line %}
{{ context_line }}
{% endif %}
{% if saved %}
[FIC] Context preserved for next session.
{% endif %}

{{ rule }}
FIC CONTEXT PRESERVATION
{{ rule }}
Phase: {{ phase }}
Focus: {{ focus }}
{{ rule }}

After compaction, continue with the focus directive above.
Disregard exploration noise. Focus on completing the current phase."#;

static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    for (name, source) in [
        ("compaction", COMPACTION),
        ("research", RESEARCH),
        ("planning", PLANNING),
        ("preservation", PRESERVATION),
    ] {
        if let Err(err) = env.add_template(name, source) {
            tracing::error!("template {name}: {err}");
        }
    }
    env
});

fn render(name: &str, ctx: minijinja::Value) -> Result<String> {
    TEMPLATES
        .get_template(name)
        .and_then(|t| t.render(ctx))
        .with_context(|| format!("rendering {name} directive"))
}

/// Directive demanding an immediate `/compact`. The autonomous variant is
/// used mid-task, after a tool call.
pub fn compaction_directive(
    utilization: f64,
    tokens: u64,
    threshold: f64,
    autonomous: bool,
) -> Result<String> {
    render(
        "compaction",
        context! {
            rule => "=".repeat(66),
            utilization => percent(utilization),
            tokens,
            threshold => percent(threshold),
            autonomous,
        },
    )
}

pub fn soft_compaction_hint(utilization: f64) -> String {
    format!(
        "[FIC] Context utilization at {}%. Consider compacting or using subagents for research.",
        percent(utilization)
    )
}

pub fn research_directive(phase: WorkflowPhase, prompt: &str) -> Result<String> {
    render(
        "research",
        context! {
            phase => phase.as_str(),
            request => ellipsize(prompt, REQUEST_PREVIEW_CHARS),
        },
    )
}

/// Guidance for an implementation request made before the plan is ready.
/// `None` once the workflow is past planning.
pub fn planning_directive(phase: WorkflowPhase, prompt: &str) -> Result<Option<String>> {
    let variant = match phase {
        WorkflowPhase::NewSession | WorkflowPhase::Research => "research_first",
        WorkflowPhase::PlanningReady => "plan_first",
        WorkflowPhase::Planning => "validate_plan",
        _ => return Ok(None),
    };
    render(
        "planning",
        context! {
            variant,
            phase => phase.as_str(),
            request => ellipsize(prompt, REQUEST_PREVIEW_CHARS),
        },
    )
    .map(Some)
}

pub fn preservation_banner(
    context_line: Option<&str>,
    saved: bool,
    phase: WorkflowPhase,
    focus: &str,
) -> Result<String> {
    render(
        "preservation",
        context! {
            context_line,
            saved,
            rule => "=".repeat(50),
            phase => phase.as_str(),
            focus,
        },
    )
}

pub fn phase_guidance(phase: WorkflowPhase) -> &'static str {
    match phase {
        WorkflowPhase::NewSession => {
            "IMPORTANT: This is a new session. For complex tasks, start with RESEARCH to understand the codebase.\n\
             Delegate exploration to subagents to keep main context clean."
        }
        WorkflowPhase::Research => {
            "IMPORTANT: Continue RESEARCH phase. Build confidence before planning.\n\
             Use subagents for exploration. Only essential findings should enter main context."
        }
        WorkflowPhase::PlanningReady => {
            "IMPORTANT: Research complete. Ready to create an implementation PLAN.\n\
             Create specific, actionable steps with verification criteria."
        }
        WorkflowPhase::Planning => "IMPORTANT: Continue PLANNING. Validate the plan before implementation.",
        WorkflowPhase::ImplementationReady => {
            "IMPORTANT: Plan validated. Ready to IMPLEMENT.\n\
             Follow the plan steps. Document any deviations."
        }
        WorkflowPhase::Implementation => {
            "IMPORTANT: Continue IMPLEMENTATION. Track progress against the plan."
        }
    }
}
