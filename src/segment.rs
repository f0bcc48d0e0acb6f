//! Segmentation of positioned lines into labeling units.
//!
//! Lines are packed greedily into segments under a word budget (and an
//! optional character budget). A new speaker turn also closes the current
//! segment. Lines are never split, so a single oversized line becomes a
//! segment of its own. A post-pass folds segments that are too short to
//! label into their predecessor.

use crate::position::PositionedLine;
use serde::{Deserialize, Serialize};

/// Options for segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOptions {
    /// Word budget per segment.
    pub max_words: usize,
    /// Optional character budget per segment (counted on joined text).
    pub max_chars: Option<usize>,
    /// Segments with fewer words are merged into the previous segment.
    pub min_words: usize,
    /// Close the current segment when a new speaker turn starts.
    pub split_on_turns: bool,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            max_words: 150,
            max_chars: None,
            min_words: 15,
            split_on_turns: true,
        }
    }
}

/// A bounded, position-tagged span of transcript text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based unit index in document order.
    pub id: usize,
    /// Lines joined with `\n`.
    pub text: String,
    pub global_line_start: usize,
    pub global_line_end: usize,
    pub page_start: usize,
    pub page_end: usize,
    pub page_line_start: usize,
    /// `None` when the segment spans more than one page.
    pub page_line_end: Option<usize>,
    /// Distinct pages touched, ascending.
    pub page_numbers: Vec<usize>,
    pub word_count: usize,
}

impl Segment {
    /// Build a segment from a non-empty run of lines.
    fn from_lines(id: usize, lines: &[&PositionedLine]) -> Self {
        let first = lines[0];
        let last = lines[lines.len() - 1];

        let mut page_numbers: Vec<usize> = lines.iter().map(|l| l.page_number).collect();
        page_numbers.dedup();

        Self {
            id,
            text: lines
                .iter()
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            global_line_start: first.global_line_no,
            global_line_end: last.global_line_no,
            page_start: first.page_number,
            page_end: last.page_number,
            page_line_start: first.page_line_no,
            page_line_end: (first.page_number == last.page_number).then_some(last.page_line_no),
            page_numbers,
            word_count: lines.iter().map(|l| word_count(&l.text)).sum(),
        }
    }

    /// Extend this segment with the one that immediately follows it.
    pub fn absorb(&mut self, next: Segment) {
        self.text.push('\n');
        self.text.push_str(&next.text);
        self.global_line_end = next.global_line_end;
        self.page_line_end = if self.page_start == next.page_end {
            next.page_line_end
        } else {
            None
        };
        self.page_end = next.page_end;
        for page in next.page_numbers {
            if self.page_numbers.last() != Some(&page) {
                self.page_numbers.push(page);
            }
        }
        self.word_count += next.word_count;
    }

    /// Human-readable anchor, `page:line`.
    pub fn anchor(&self) -> String {
        format!("{}:{}", self.page_start, self.page_line_start)
    }

    /// Iterate the segment's lines in order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }
}

impl AsRef<str> for Segment {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Groups a line stream into segments.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    options: SegmentOptions,
}

impl Segmenter {
    pub fn new(options: SegmentOptions) -> Self {
        Self { options }
    }

    /// Segment `lines`, then merge undersized segments backwards.
    pub fn segment(&self, lines: &[PositionedLine]) -> Vec<Segment> {
        let packed = self.pack(lines);
        self.merge_small(packed)
    }

    /// Greedy packing without the small-segment post-pass.
    pub fn pack(&self, lines: &[PositionedLine]) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut current: Vec<&PositionedLine> = Vec::new();
        let mut words = 0;
        let mut chars = 0;

        for line in lines {
            let line_words = word_count(&line.text);
            // +1 for the joining newline
            let line_chars = line.text.chars().count() + usize::from(!current.is_empty());

            if !current.is_empty() {
                let over_words = words + line_words > self.options.max_words;
                let over_chars = self
                    .options
                    .max_chars
                    .is_some_and(|max| chars + line_chars > max);
                let new_turn = self.options.split_on_turns && line.turn.is_some();

                if over_words || over_chars || new_turn {
                    segments.push(Segment::from_lines(segments.len() + 1, &current));
                    current.clear();
                    words = 0;
                    chars = 0;
                }
            }

            chars += if current.is_empty() {
                line.text.chars().count()
            } else {
                line_chars
            };
            words += line_words;
            current.push(line);
        }

        if !current.is_empty() {
            segments.push(Segment::from_lines(segments.len() + 1, &current));
        }

        segments
    }

    fn merge_small(&self, segments: Vec<Segment>) -> Vec<Segment> {
        let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());

        for segment in segments {
            match merged.last_mut() {
                Some(prev) if segment.word_count < self.options.min_words => prev.absorb(segment),
                _ => merged.push(segment),
            }
        }

        for (i, segment) in merged.iter_mut().enumerate() {
            segment.id = i + 1;
        }

        merged
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
