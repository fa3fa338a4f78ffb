//! Classification of user prompts into exploration and implementation requests.

use regex::RegexSet;
use std::sync::LazyLock;

/// Prompts longer than this are cut before matching.
pub const MAX_PROMPT_BYTES: usize = 100_000;

static RESEARCH_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\bhow does\b",
        r"(?i)\bwhere is\b",
        r"(?i)\bfind the\b",
        r"(?i)\bunderstand\b",
        r"(?i)\bexplore\b",
        r"(?i)\binvestigate\b",
        r"(?i)\bwhat is\b",
        r"(?i)\bexplain the\b",
        r"(?i)\bwhat does\b",
        r"(?i)\bhow is\b",
        r"(?i)\bwhere are\b",
        r"(?i)\blook for\b",
        r"(?i)\bsearch for\b",
        r"(?i)\bfigure out\b",
        r"(?i)\blearn about\b",
        r"(?i)\bresearch\b",
    ])
    .unwrap_or_else(|_| RegexSet::empty())
});

static PLANNING_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\bimplement\b",
        r"(?i)\badd\b.*\bfeature\b",
        r"(?i)\bcreate\b.*\bfunction\b",
        r"(?i)\bbuild\b",
        r"(?i)\brefactor\b",
        r"(?i)\bfix\b.*\bbug\b",
        r"(?i)\bupdate\b.*\bcode\b",
        r"(?i)\bmodify\b",
        r"(?i)\bchange\b.*\bimplementation\b",
    ])
    .unwrap_or_else(|_| RegexSet::empty())
});

/// Cut `prompt` to [`MAX_PROMPT_BYTES`] on a char boundary.
pub fn cap_prompt(prompt: &str) -> &str {
    if prompt.len() <= MAX_PROMPT_BYTES {
        return prompt;
    }
    let mut end = MAX_PROMPT_BYTES;
    while !prompt.is_char_boundary(end) {
        end -= 1;
    }
    &prompt[..end]
}

pub fn is_research_prompt(prompt: &str) -> bool {
    RESEARCH_PATTERNS.is_match(prompt)
}

pub fn is_planning_prompt(prompt: &str) -> bool {
    PLANNING_PATTERNS.is_match(prompt)
}
