//! Topic deduplication and merging.
//!
//! Labels produced for neighbouring segments often repeat the same subject
//! in slightly different words. A new candidate is compared only against
//! the last few accepted topics, so textually similar topics that recur far
//! apart in the transcript stay separate outline entries.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Title used for the synthesized closing entry.
pub const TERMINAL_TOPIC: &str = "End of Deposition";

/// Options for topic deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeOptions {
    /// Minimum similarity ratio (0.0..=1.0) for a merge.
    pub similarity_threshold: f64,
    /// How many recently accepted topics a candidate is compared against.
    pub lookback: usize,
}

impl Default for DedupeOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            lookback: 2,
        }
    }
}

/// A raw topic produced for one labeled segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCandidate {
    pub topic_text: String,
    pub page: usize,
    pub line: usize,
    /// Unit the candidate came from.
    pub unit: usize,
}

impl TopicCandidate {
    pub fn new(topic_text: impl Into<String>, page: usize, line: usize) -> Self {
        Self {
            topic_text: topic_text.into(),
            page,
            line,
            unit: 0,
        }
    }

    pub fn with_unit(mut self, unit: usize) -> Self {
        self.unit = unit;
        self
    }
}

/// A deduplicated outline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct Topic {
    pub topic_text: String,
    pub page_start: usize,
    pub line_start: usize,
    /// Only ever grows.
    pub page_end: usize,
    /// Only ever grows, independently of `page_end`.
    pub line_end: usize,
    /// Unit that introduced the topic.
    #[serde(default)]
    pub unit: usize,
    /// Synthesized end-of-testimony marker.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub terminal: bool,
}

impl Topic {
    /// A topic whose start and end are the candidate's position.
    pub fn seeded(candidate: &TopicCandidate) -> Self {
        Self {
            topic_text: candidate.topic_text.trim().to_string(),
            page_start: candidate.page,
            line_start: candidate.line,
            page_end: candidate.page,
            line_end: candidate.line,
            unit: candidate.unit,
            terminal: false,
        }
    }

    /// The closing entry anchored at `page`/`line`.
    pub fn terminal(page: usize, line: usize, unit: usize) -> Self {
        Self {
            topic_text: TERMINAL_TOPIC.to_string(),
            page_start: page,
            line_start: line,
            page_end: page,
            line_end: line,
            unit,
            terminal: true,
        }
    }

    /// Extend the end bounds to cover `candidate`. Never shrinks.
    pub fn extend_to(&mut self, candidate: &TopicCandidate) {
        self.page_end = self.page_end.max(candidate.page);
        self.line_end = self.line_end.max(candidate.line);
    }
}

/// What happened to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Appended as a new topic at this index.
    Appended(usize),
    /// Merged into the existing topic at this index.
    Merged(usize),
}

/// Folds candidates into an ordered, deduplicated topic list.
#[derive(Debug, Clone)]
pub struct TopicDeduper {
    options: DedupeOptions,
    topics: Vec<Topic>,
    /// Indices into `topics` of the most recently accepted entries.
    window: VecDeque<usize>,
}

impl Default for TopicDeduper {
    fn default() -> Self {
        Self::new(DedupeOptions::default())
    }
}

impl TopicDeduper {
    pub fn new(options: DedupeOptions) -> Self {
        let capacity = options.lookback;
        Self {
            options,
            topics: Vec::new(),
            window: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuild a deduper from persisted topics, restoring the lookback window.
    pub fn from_topics(options: DedupeOptions, topics: Vec<Topic>) -> Self {
        let mut deduper = Self::new(options);
        for (index, topic) in topics.iter().enumerate() {
            if !topic.terminal {
                deduper.remember(index);
            }
        }
        deduper.topics = topics;
        deduper
    }

    /// Fold one candidate into the outline.
    pub fn push(&mut self, candidate: TopicCandidate) -> MergeOutcome {
        let normalized = normalize_topic(&candidate.topic_text);

        let best = self
            .window
            .iter()
            .rev()
            .map(|&index| {
                let existing = normalize_topic(&self.topics[index].topic_text);
                (index, similarity(&normalized, &existing))
            })
            .filter(|&(_, score)| score >= self.options.similarity_threshold)
            .fold(None::<(usize, f64)>, |best, (index, score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((index, score)),
            });

        if let Some((index, score)) = best {
            let topic = &mut self.topics[index];
            topic.extend_to(&candidate);
            debug!(
                topic = %topic.topic_text,
                candidate = %candidate.topic_text,
                score,
                "merged similar topic"
            );
            return MergeOutcome::Merged(index);
        }

        let index = self.topics.len();
        self.topics.push(Topic::seeded(&candidate));
        self.remember(index);
        MergeOutcome::Appended(index)
    }

    /// Append the closing entry without comparing it.
    pub fn push_terminal(&mut self, topic: Topic) {
        self.topics.push(topic);
    }

    /// Whether the outline already ends with a terminal entry.
    pub fn is_terminated(&self) -> bool {
        self.topics.last().is_some_and(|t| t.terminal)
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn into_topics(self) -> Vec<Topic> {
        self.topics
    }

    fn remember(&mut self, index: usize) {
        if self.options.lookback == 0 {
            return;
        }
        if self.window.len() == self.options.lookback {
            self.window.pop_front();
        }
        self.window.push_back(index);
    }
}

/// Case-fold and trim a topic for comparison.
pub fn normalize_topic(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim_end_matches(['.', ',', ';', ':', '!', '?'])
        .trim()
        .to_lowercase()
}

/// Ratcliff/Obershelp ratio of two normalized topics: `2 * M / T`, where `M`
/// counts characters in matching blocks and `T` is the combined length.
/// 1.0 for identical strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Characters in the longest common block plus, recursively, the matches
/// to its left and to its right.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Longest common substring as `(start in a, start in b, length)`.
/// Ties go to the earliest start in `a`, then in `b`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            let len = if ca == cb { prev[j] + 1 } else { 0 };
            row[j + 1] = len;
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut row);
    }

    best
}
