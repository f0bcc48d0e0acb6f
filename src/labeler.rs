//! Segment labeling.
//!
//! A [`Labeler`] turns a short excerpt of one segment into a topic label.
//! Failures are unit-level: the orchestrator logs them and skips the unit.

use crate::error::LabelError;
use crate::llm::{LlmClient, Prompts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Shape of the label being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelStyle {
    /// Upper bound on label length in words.
    pub max_words: usize,
    /// How many characters of the segment the labeler sees.
    pub excerpt_chars: usize,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            max_words: 8,
            excerpt_chars: 300,
        }
    }
}

/// Produces a label for a segment excerpt.
#[async_trait]
pub trait Labeler: Send + Sync {
    async fn label(&self, excerpt: &str, style: &LabelStyle) -> Result<String, LabelError>;
}

/// Labeler backed by an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct LlmLabeler {
    client: LlmClient,
}

impl LlmLabeler {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Labeler for LlmLabeler {
    async fn label(&self, excerpt: &str, style: &LabelStyle) -> Result<String, LabelError> {
        let prompt = Prompts::render_segment_label(excerpt, style.max_words);
        let reply = self
            .client
            .complete(Some(Prompts::system_transcript_analyst()), &prompt)
            .await?;
        clean_label(&reply)
    }
}

/// The first `max_chars` characters of `text`, cut on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Reduce a model reply to a single plain label: the first line with text
/// left after the `Label:` prefix and surrounding quotes are removed.
pub fn clean_label(reply: &str) -> Result<String, LabelError> {
    reply
        .lines()
        .map(clean_line)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .ok_or(LabelError::Empty)
}

fn clean_line(line: &str) -> &str {
    let line = line.trim();
    let line = strip_prefix_ci(line, "label:").unwrap_or(line).trim();
    line.trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '`' | '\u{201c}' | '\u{201d}'))
        .trim()
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}
