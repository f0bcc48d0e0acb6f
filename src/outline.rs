//! The persisted topic outline.
//!
//! Besides the ordered topic list, the outline records how far processing
//! got (`last_unit`) and the running unit counters, so a resumed run can
//! rebuild its state from disk alone.

use crate::topic::Topic;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Unit counters carried across restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct UnitStats {
    /// Units labeled successfully.
    pub processed: usize,
    /// Units whose labeling failed or timed out.
    pub skipped: usize,
}

/// Ordered, deduplicated outline of a transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Outline {
    /// Transcript name.
    pub name: String,

    /// Topics in document order.
    pub topics: Vec<Topic>,

    /// Number of leading units reflected in `topics` (1-based index of the
    /// last unit folded in, 0 when none).
    #[serde(default)]
    pub last_unit: usize,

    #[serde(default)]
    pub stats: UnitStats,

    /// Set once the run reached its final state.
    #[serde(default)]
    pub complete: bool,
}

impl Outline {
    /// Create an empty outline for a transcript.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Highest page any topic reaches.
    pub fn last_page(&self) -> usize {
        self.topics.iter().map(|t| t.page_end).max().unwrap_or(0)
    }

    /// Whether the outline closes with a synthesized end-of-testimony entry.
    pub fn ends_with_terminal(&self) -> bool {
        self.topics.last().is_some_and(|t| t.terminal)
    }

    /// Format the outline for display.
    pub fn format(&self) -> String {
        let mut result = format!(
            "Transcript: {} ({} topics, {} units{})\n",
            self.name,
            self.topic_count(),
            self.last_unit,
            if self.complete { "" } else { ", incomplete" }
        );
        result.push_str(&"─".repeat(50));
        result.push('\n');

        for (i, topic) in self.topics.iter().enumerate() {
            let span = if (topic.page_start, topic.line_start) == (topic.page_end, topic.line_end) {
                format!("{}:{}", topic.page_start, topic.line_start)
            } else {
                format!(
                    "{}:{} - {}:{}",
                    topic.page_start, topic.line_start, topic.page_end, topic.line_end
                )
            };
            result.push_str(&format!("{:>3}. {} [{}]\n", i + 1, topic.topic_text, span));
        }

        result
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
