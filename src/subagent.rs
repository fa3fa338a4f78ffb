//! Extraction of structured findings from subagent output.
//!
//! Subagents report in free text. Research agents are expected to mention a
//! confidence score and list discoveries and open questions under headed
//! sections; plan validators are expected to say PROCEED, REVISE or BLOCK.
//! Everything here is best-effort pattern matching.

use crate::artifacts::{Discovery, OpenQuestion, Plan, Recommendation, Research, ValidationResult};
use crate::util::{ellipsize, percent, truncate_chars};
use regex::Regex;
use std::sync::LazyLock;

const RESEARCH_INDICATORS: [&str; 6] = [
    "fic-researcher",
    "research",
    "explore",
    "investigation",
    "analysis",
    "exploration",
];
const VALIDATOR_INDICATORS: [&str; 4] = [
    "fic-plan-validator",
    "plan-validator",
    "validation",
    "validate plan",
];

const DEFAULT_CONFIDENCE: f64 = 0.5;
const MAX_DISCOVERIES: usize = 10;
const MAX_QUESTIONS: usize = 5;
const MAX_FILES: usize = 15;
const MAX_ITEM_CHARS: usize = 200;
const MIN_ITEM_CHARS: usize = 11;
const MAX_ISSUE_CHARS: usize = 100;

static CONFIDENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)confidence\s*(?:score)?[:\s]+(\d+\.?\d*)%?").ok());
static FILE_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[\w./\-]+\.\w{1,10}").ok());
static PROCEED: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\bPROCEED\b").ok());
static BLOCK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\bBLOCK\b").ok());
static REVISE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\bREVISE\b").ok());
static SCORE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)overall\s+score[:\s]+(\d+)/10").ok());
static CRITICAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\[CRITICAL\]\s+(.+?)(?:\n|$)").ok());
static BLOCKING_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\[blocking\]").ok());
static CRITICAL_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\[critical\]").ok());

fn matches(re: &Option<Regex>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

fn capture<'t>(re: &Option<Regex>, text: &'t str) -> Option<&'t str> {
    re.as_ref()?.captures(text)?.get(1).map(|m| m.as_str())
}

fn strip_tag(re: &Option<Regex>, text: &str) -> (String, bool) {
    match re.as_ref() {
        Some(re) if re.is_match(text) => (re.replace_all(text, "").trim().to_string(), true),
        _ => (text.to_string(), false),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubagentRole {
    Researcher,
    PlanValidator,
}

/// Identify the subagent's role from its type and task description.
pub fn classify(agent_type: &str, description: &str) -> Option<SubagentRole> {
    let haystack = format!("{agent_type} {description}").to_lowercase();
    if RESEARCH_INDICATORS.iter().any(|i| haystack.contains(i)) {
        Some(SubagentRole::Researcher)
    } else if VALIDATOR_INDICATORS.iter().any(|i| haystack.contains(i)) {
        Some(SubagentRole::PlanValidator)
    } else {
        None
    }
}

// ===================================================================
// Research output
// ===================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchFindings {
    pub confidence: f64,
    pub discoveries: Vec<Discovery>,
    pub files: Vec<String>,
    pub open_questions: Vec<OpenQuestion>,
}

pub fn extract_research(output: &str) -> ResearchFindings {
    ResearchFindings {
        confidence: extract_confidence(output),
        discoveries: extract_discoveries(output),
        files: extract_files(output),
        open_questions: extract_open_questions(output),
    }
}

/// Confidence in `0.0..=1.0`. Percentages are scaled down; a missing score
/// is 0.5.
pub fn extract_confidence(output: &str) -> f64 {
    capture(&CONFIDENCE, output)
        .and_then(|raw| raw.parse::<f64>().ok())
        .map(|v| if v > 1.0 { v / 100.0 } else { v })
        .map(|v| v.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE)
}

/// Lines of the section whose header satisfies `is_header`, with list
/// markers removed.
fn section_items<'a>(output: &'a str, is_header: impl Fn(&str) -> bool) -> Vec<&'a str> {
    let mut items = Vec::new();
    let mut inside = false;
    for line in output.lines() {
        if !inside {
            let lower = line.to_lowercase();
            inside = lower.contains(':') && is_header(&lower);
            continue;
        }
        if line.starts_with("---") || line.starts_with("===") {
            break;
        }
        let item = strip_list_marker(line.trim());
        if is_section_header(item) {
            break;
        }
        if item.len() >= MIN_ITEM_CHARS {
            items.push(item);
        }
    }
    items
}

/// A bare heading line such as `Open Questions:`.
fn is_section_header(line: &str) -> bool {
    line.ends_with(':') && line.len() <= 40 && !line.contains(". ")
}

fn strip_list_marker(line: &str) -> &str {
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line);
    let bytes = line.as_bytes();
    if bytes.len() >= 3 && bytes[0].is_ascii_digit() && (bytes[1] == b'.' || bytes[1] == b')') {
        return line[2..].trim();
    }
    line
}

fn extract_discoveries(output: &str) -> Vec<Discovery> {
    section_items(output, |h| h.contains("discover"))
        .into_iter()
        .take(MAX_DISCOVERIES)
        .map(|item| {
            let (summary, critical) = strip_tag(&CRITICAL_TAG, item);
            Discovery {
                summary: truncate_chars(&summary, MAX_ITEM_CHARS).to_string(),
                critical,
            }
        })
        .collect()
}

fn extract_open_questions(output: &str) -> Vec<OpenQuestion> {
    section_items(output, |h| h.contains("question"))
        .into_iter()
        .take(MAX_QUESTIONS)
        .map(|item| {
            let (question, blocking) = strip_tag(&BLOCKING_TAG, item);
            OpenQuestion {
                question: truncate_chars(&question, MAX_ITEM_CHARS).to_string(),
                blocking,
            }
        })
        .collect()
}

/// Path-like tokens, deduplicated, in order of appearance.
fn extract_files(output: &str) -> Vec<String> {
    let Some(re) = &*FILE_PATH else {
        return Vec::new();
    };
    let mut files: Vec<String> = Vec::new();
    for m in re.find_iter(output) {
        let candidate = m.as_str().trim_end_matches('.');
        let numeric = candidate.chars().all(|c| c.is_ascii_digit() || c == '.');
        if numeric || !candidate.contains('.') || files.iter().any(|f| f == candidate) {
            continue;
        }
        files.push(candidate.to_string());
        if files.len() >= MAX_FILES {
            break;
        }
    }
    files
}

impl ResearchFindings {
    /// A research record for `feature_or_task`, continuing `previous` when it
    /// covers the same task.
    pub fn into_research(self, feature_or_task: &str, previous: Option<&Research>) -> Research {
        let mut research = Research::new(feature_or_task, self.confidence);
        research.discoveries = self.discoveries;
        research.open_questions = self.open_questions;
        if let Some(prev) = previous.filter(|p| p.feature_or_task == feature_or_task) {
            research.research_sessions = prev.research_sessions.saturating_add(1);
        }
        research
    }

    /// Report for the main agent. More than `max_open_questions` open
    /// questions is flagged even when confidence is high enough.
    pub fn summary(&self, confidence_threshold: f64, max_open_questions: u32) -> String {
        let rule = "=".repeat(40);
        let mut lines = vec![
            rule.clone(),
            "RESEARCH SUBAGENT RESULTS".to_string(),
            rule.clone(),
            format!("Confidence: {}%", percent(self.confidence)),
        ];

        if !self.discoveries.is_empty() {
            lines.push(String::new());
            lines.push(format!("Key Discoveries ({}):", self.discoveries.len()));
            for d in self.discoveries.iter().take(5) {
                let marker = if d.critical { "[CRITICAL] " } else { "" };
                lines.push(format!("  - {marker}{}", ellipsize(&d.summary, 80)));
            }
        }

        if !self.files.is_empty() {
            lines.push(String::new());
            lines.push(format!("Relevant Files ({}):", self.files.len()));
            for f in self.files.iter().take(5) {
                lines.push(format!("  - {f}"));
            }
        }

        if !self.open_questions.is_empty() {
            let blocking = self.open_questions.iter().filter(|q| q.blocking).count();
            lines.push(String::new());
            lines.push(format!(
                "Open Questions: {} ({blocking} blocking)",
                self.open_questions.len()
            ));
            for q in self.open_questions.iter().take(3) {
                let marker = if q.blocking { "[BLOCKING] " } else { "" };
                lines.push(format!("  - {marker}{}", ellipsize(&q.question, 60)));
            }
            if self.open_questions.len() > max_open_questions as usize {
                lines.push(format!(
                    "  Open questions exceed the limit of {max_open_questions}. Resolve some before planning."
                ));
            }
        }
        lines.push(rule);

        lines.push(String::new());
        if self.confidence >= confidence_threshold {
            lines.push("[FIC] Research confidence threshold met. Ready for PLANNING phase.".into());
        } else {
            lines.push(format!(
                "[FIC] Research confidence at {}%. Continue to build understanding.",
                percent(self.confidence)
            ));
        }
        lines.join("\n")
    }
}

// ===================================================================
// Plan validator output
// ===================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFindings {
    pub recommendation: Option<Recommendation>,
    pub score: Option<u32>,
    pub critical_issue: Option<String>,
}

pub fn extract_validation(output: &str) -> ValidationFindings {
    let recommendation = if matches(&PROCEED, output) {
        Some(Recommendation::Proceed)
    } else if matches(&BLOCK, output) {
        Some(Recommendation::Block)
    } else if matches(&REVISE, output) {
        Some(Recommendation::Revise)
    } else {
        None
    };
    ValidationFindings {
        recommendation,
        score: capture(&SCORE, output).and_then(|s| s.parse().ok()),
        critical_issue: capture(&CRITICAL, output)
            .map(|issue| truncate_chars(issue.trim(), MAX_ISSUE_CHARS).to_string()),
    }
}

impl ValidationFindings {
    /// The plan this validation applies to, as a new record. Starts from the
    /// latest plan when there is one.
    pub fn into_plan(
        &self,
        latest_plan: Option<&Plan>,
        fallback_goal: &str,
        research_id: Option<&str>,
    ) -> Option<Plan> {
        let recommendation = self.recommendation?;
        let mut plan = match latest_plan {
            Some(prev) => Plan {
                id: uuid::Uuid::new_v4().to_string(),
                updated_at: chrono::Utc::now(),
                ..prev.clone()
            },
            None => {
                let mut plan = Plan::new(fallback_goal);
                plan.research_artifact_id = research_id.map(str::to_string);
                plan
            }
        };
        plan.validation_result = Some(ValidationResult {
            recommendation,
            score: self.score,
        });
        Some(plan)
    }

    pub fn summary(&self) -> String {
        let rule = "=".repeat(40);
        let recommendation = self
            .recommendation
            .map_or_else(|| "UNKNOWN".to_string(), |r| r.to_string());
        let mut lines = vec![
            rule.clone(),
            "PLAN VALIDATION RESULTS".to_string(),
            rule.clone(),
            format!("Recommendation: {recommendation}"),
        ];
        if let Some(score) = self.score {
            lines.push(format!("Overall Score: {score}/10"));
        }
        if let Some(issue) = &self.critical_issue {
            lines.push(String::new());
            lines.push(format!("Critical Issue: {issue}"));
        }
        lines.push(rule);

        let verdict = match self.recommendation {
            Some(Recommendation::Proceed) => Some("[FIC] Plan validated. Ready for IMPLEMENTATION phase."),
            Some(Recommendation::Block) => Some("[FIC] Plan validation BLOCKED. Major revision required."),
            Some(Recommendation::Revise) => {
                Some("[FIC] Plan needs revision. Address feedback before implementation.")
            }
            None => None,
        };
        if let Some(verdict) = verdict {
            lines.push(String::new());
            lines.push(verdict.to_string());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESEARCH_OUTPUT: &str = "\
## Research summary
Confidence score: 82%

Discoveries:
- [CRITICAL] Sessions are stored in src/auth/session.rs
- Tokens are refreshed by the background worker in worker.rs
* short
1. Config lives in config/app.toml and is loaded once

Open Questions:
- Should refresh tokens rotate on every use? [BLOCKING]
- Is the legacy cookie path still needed?
---
Done.
";

    #[test]
    fn classification() {
        assert_eq!(classify("fic-researcher", ""), Some(SubagentRole::Researcher));
        assert_eq!(classify("general-purpose", "Explore the auth module"), Some(SubagentRole::Researcher));
        assert_eq!(classify("fic-plan-validator", "check"), Some(SubagentRole::PlanValidator));
        assert_eq!(classify("general-purpose", "write docs"), None);
    }

    #[test]
    fn confidence_parsing() {
        assert_eq!(extract_confidence("Confidence: 0.85"), 0.85);
        assert_eq!(extract_confidence("confidence score: 70%"), 0.70);
        assert_eq!(extract_confidence("Confidence 250"), 1.0);
        assert_eq!(extract_confidence("no score here"), 0.5);
    }

    #[test]
    fn research_sections() {
        let findings = extract_research(RESEARCH_OUTPUT);
        assert_eq!(findings.confidence, 0.82);

        let summaries: Vec<_> = findings.discoveries.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            [
                "Sessions are stored in src/auth/session.rs",
                "Tokens are refreshed by the background worker in worker.rs",
                "Config lives in config/app.toml and is loaded once",
            ]
        );
        assert!(findings.discoveries[0].critical);
        assert!(!findings.discoveries[1].critical);

        assert_eq!(findings.open_questions.len(), 2);
        assert!(findings.open_questions[0].blocking);
        assert_eq!(
            findings.open_questions[0].question,
            "Should refresh tokens rotate on every use?"
        );
        assert!(!findings.open_questions[1].blocking);

        assert!(findings.files.contains(&"src/auth/session.rs".to_string()));
        assert!(findings.files.contains(&"config/app.toml".to_string()));
        assert!(!findings.files.iter().any(|f| f == "82"));
    }

    #[test]
    fn research_summary_mentions_threshold() {
        let findings = extract_research(RESEARCH_OUTPUT);
        let summary = findings.summary(0.7, 2);
        assert!(summary.contains("Confidence: 82%"));
        assert!(summary.contains("Open Questions: 2 (1 blocking)"));
        assert!(summary.contains("  - [BLOCKING] Should refresh tokens"));
        assert!(summary.ends_with("Ready for PLANNING phase."));

        assert!(!summary.contains("exceed the limit"));

        let summary = findings.summary(0.9, 1);
        assert!(summary.contains("  Open questions exceed the limit of 1. Resolve some before planning."));
        assert!(summary.ends_with("Continue to build understanding."));
    }

    #[test]
    fn research_sessions_continue_same_task() {
        let first = extract_research(RESEARCH_OUTPUT).into_research("auth", None);
        assert_eq!(first.research_sessions, 1);
        let second = extract_research(RESEARCH_OUTPUT).into_research("auth", Some(&first));
        assert_eq!(second.research_sessions, 2);
        let other = extract_research(RESEARCH_OUTPUT).into_research("billing", Some(&second));
        assert_eq!(other.research_sessions, 1);
    }

    #[test]
    fn validation_parsing() {
        let findings = extract_validation(
            "Review done.\nOverall score: 8/10\n[CRITICAL] Missing rollback step\nRecommendation: PROCEED",
        );
        assert_eq!(findings.recommendation, Some(Recommendation::Proceed));
        assert_eq!(findings.score, Some(8));
        assert_eq!(findings.critical_issue.as_deref(), Some("Missing rollback step"));

        let findings = extract_validation("Verdict: revise the error handling");
        assert_eq!(findings.recommendation, Some(Recommendation::Revise));
        assert_eq!(findings.score, None);

        assert_eq!(extract_validation("looks fine").recommendation, None);
    }

    #[test]
    fn validation_builds_plan() {
        let findings = extract_validation("PROCEED. Overall score: 9/10");
        let plan = findings.into_plan(None, "Add caching", Some("r-1")).unwrap();
        assert!(plan.is_actionable());
        assert_eq!(plan.goal, "Add caching");
        assert_eq!(plan.research_artifact_id.as_deref(), Some("r-1"));

        let mut previous = Plan::new("Existing goal");
        previous.steps.push(crate::artifacts::PlanStep {
            id: "1".into(),
            description: "do it".into(),
            completed: false,
        });
        let plan = findings.into_plan(Some(&previous), "ignored", None).unwrap();
        assert_eq!(plan.goal, "Existing goal");
        assert_eq!(plan.steps.len(), 1);
        assert_ne!(plan.id, previous.id);

        assert!(extract_validation("no verdict").into_plan(None, "g", None).is_none());
    }

    #[test]
    fn validation_summary() {
        let summary = extract_validation("BLOCK: unsafe migration").summary();
        assert!(summary.contains("Recommendation: BLOCK"));
        assert!(summary.ends_with("[FIC] Plan validation BLOCKED. Major revision required."));
        assert!(extract_validation("meh").summary().contains("Recommendation: UNKNOWN"));
    }
}
