use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;

// ===================================================================
// Transcript entries, one per JSONL line
// ===================================================================

/// A single line in a host `.jsonl` transcript file, discriminated by the
/// `type` field. Only assistant turns are kept; user turns and bookkeeping
/// lines collapse to `Other`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum TranscriptEntry {
    #[serde(rename = "assistant")]
    Assistant(ConversationEntry),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ConversationEntry {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: MessageContent,
}

/// `message.content` is either plain text or an array of content blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

impl MessageContent {
    fn text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

// ===================================================================
// Transcript
// ===================================================================

#[derive(Debug, Default)]
pub struct Transcript {
    raw: String,
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse JSONL contents. Lines that fail to parse are skipped and
    /// reported with their 1-based line number.
    pub fn parse(contents: &str) -> (Self, Vec<(usize, String)>) {
        let mut entries = Vec::new();
        let mut errors = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TranscriptEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => errors.push((idx + 1, e.to_string())),
            }
        }
        (
            Self {
                raw: contents.to_string(),
                entries,
            },
            errors,
        )
    }

    /// Read a transcript from disk. A missing file reads as empty.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading transcript {}", path.display()));
            }
        };
        let (transcript, errors) = Self::parse(&contents);
        for (line, err) in &errors {
            tracing::debug!("transcript parse error at line {line}: {err}");
        }
        Ok(transcript)
    }

    /// The unparsed file contents.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Commands passed to the Bash tool, in order.
    pub fn bash_commands(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TranscriptEntry::Assistant(c) => match &c.message.content {
                    MessageContent::Blocks(blocks) => Some(blocks.iter()),
                    MessageContent::Text(_) => None,
                },
                _ => None,
            })
            .flatten()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { name, input } if name == "Bash" => {
                    input.get("command").and_then(|c| c.as_str())
                }
                _ => None,
            })
    }

    /// Text of the last assistant message that has any.
    pub fn last_text_response(&self) -> Option<String> {
        self.entries.iter().rev().find_map(|e| match e {
            TranscriptEntry::Assistant(c) => {
                let text = c.message.content.text();
                (!text.trim().is_empty()).then_some(text)
            }
            _ => None,
        })
    }
}
