//! Line position reconstruction.
//!
//! Turns raw per-page text into a stream of cleaned lines carrying a
//! document-wide, strictly increasing line number. Leading line-number
//! markers printed in the transcript are trusted only when they land in a
//! small window ahead of the running counter; anything else (OCR noise,
//! per-page restarts, stray numbers) falls back to `counter + 1`.
//!
//! The counter lives in a [`LineCursor`] that callers thread through each
//! call, so reconstruction of a page is a pure function of its inputs.

use crate::document::RawPage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d{1,2}:\d{2}(?::\d{2})?(?:\s*[ap]\.m\.|\s*[ap]m\b)?").expect("valid regex")
});

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<marker>\d{1,5})(?:\s+(?P<rest>.*))?$").expect("valid regex"));

static EXAMINER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^BY\s+(?:(?:MR|MS|MRS|DR|MISS)\.?\s+)?[A-Z][A-Z.'\-]*(?:\s+[A-Z][A-Z.'\-]*)*\s*:?\s*(?P<rest>.*)$",
    )
    .expect("valid regex")
});

static SPEAKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:MR|MS|MRS|DR|MISS)\.?\s+[A-Z][A-Z'\-]*|THE\s+[A-Z][A-Z ]*?)\s*:")
        .expect("valid regex")
});

static PAGE_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^page\s+\d+(?:\s+of\s+\d+)?$").expect("valid regex"));

static BRACKET_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([A-Z][A-Z .]*)\]").expect("valid regex"));

static ELLIPSIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{3,}").expect("valid regex"));

/// How page numbers are assigned to reconstructed lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageNumbering {
    /// Use source pages when there is more than one, otherwise the divisor.
    #[default]
    Auto,
    /// Page numbers come from the source's page boundaries.
    Source,
    /// Page number is `(global_line_no - 1) / lines_per_page + 1`.
    Fixed,
}

/// Options for position reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOptions {
    pub page_numbering: PageNumbering,
    /// Lines per page for [`PageNumbering::Fixed`].
    pub lines_per_page: usize,
    /// How far ahead of the counter a printed marker may jump.
    pub marker_window: usize,
    /// Lines containing any of these phrases (case-insensitive) are dropped,
    /// e.g. court-reporting agency footers.
    pub boilerplate: Vec<String>,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            page_numbering: PageNumbering::Auto,
            lines_per_page: 25,
            marker_window: 5,
            boilerplate: Vec::new(),
        }
    }
}

/// Speaker-turn marker stripped from (or detected on) a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Turn {
    /// `Q.` / `Q:` question prefix.
    Question,
    /// `A.` / `A:` answer prefix.
    Answer,
    /// `BY MR. X:` examiner change.
    Examination,
    /// `MR. X:` / `THE WITNESS:` colloquy; the speaker label is kept in the text.
    Colloquy,
}

/// One cleaned transcript line with its document position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionedLine {
    /// Document-wide line number, strictly increasing.
    pub global_line_no: usize,
    pub page_number: usize,
    /// Line number within `page_number`, 1-indexed.
    pub page_line_no: usize,
    pub text: String,
    /// Set when this line opens a new speaker turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<Turn>,
}

/// Running position state threaded through reconstruction calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCursor {
    last_line: usize,
    page_base: usize,
    pending_turn: Option<Turn>,
}

impl LineCursor {
    /// A cursor positioned before the first line of a document.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor that continues numbering after `line`.
    pub fn starting_after(line: usize) -> Self {
        Self {
            last_line: line,
            page_base: line,
            pending_turn: None,
        }
    }

    /// The last global line number handed out (0 before the first line).
    pub fn last_line(&self) -> usize {
        self.last_line
    }

    fn begin_page(&mut self) {
        self.page_base = self.last_line;
    }

    /// Hand out the next global line number.
    fn advance(&mut self, marker: Option<usize>, window: usize) -> usize {
        let next = match marker {
            Some(m) if m > self.last_line && m <= self.last_line + window => m,
            Some(m) => {
                debug!(
                    marker = m,
                    counter = self.last_line,
                    "line marker outside tolerated window, numbering sequentially"
                );
                self.last_line + 1
            }
            None => self.last_line + 1,
        };
        self.last_line = next;
        next
    }
}

/// Result of cleaning a single raw line.
#[derive(Debug, PartialEq, Eq)]
enum CleanedLine {
    /// Nothing left after stripping; may still announce a turn.
    Blank { turn: Option<Turn> },
    /// Header, footer or boilerplate.
    Noise,
    Text {
        marker: Option<usize>,
        turn: Option<Turn>,
        text: String,
    },
}

/// Converts raw pages into positioned lines.
#[derive(Debug, Clone, Default)]
pub struct PositionReconstructor {
    options: PositionOptions,
    boilerplate: Vec<String>,
}

impl PositionReconstructor {
    pub fn new(options: PositionOptions) -> Self {
        let boilerplate = options
            .boilerplate
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            options,
            boilerplate,
        }
    }

    /// Resolve [`PageNumbering::Auto`] for a source with `page_count` pages.
    pub fn resolve_numbering(&self, page_count: usize) -> PageNumbering {
        match self.options.page_numbering {
            PageNumbering::Auto if page_count > 1 => PageNumbering::Source,
            PageNumbering::Auto => PageNumbering::Fixed,
            other => other,
        }
    }

    /// Reconstruct a whole document with a fresh cursor.
    pub fn reconstruct(&self, pages: &[RawPage]) -> Vec<PositionedLine> {
        let numbering = self.resolve_numbering(pages.len());
        let mut cursor = LineCursor::new();

        pages
            .iter()
            .flat_map(|page| self.reconstruct_page(&mut cursor, page, numbering))
            .collect()
    }

    /// Reconstruct one page, continuing from `cursor`.
    pub fn reconstruct_page(
        &self,
        cursor: &mut LineCursor,
        page: &RawPage,
        numbering: PageNumbering,
    ) -> Vec<PositionedLine> {
        cursor.begin_page();
        let lines_per_page = self.options.lines_per_page.max(1);
        let mut out = Vec::new();

        for raw in page.raw_text.lines() {
            let marker_limit = lines_per_page.max(cursor.last_line + self.options.marker_window);
            let (marker, turn, text) = match self.clean_line(raw, marker_limit) {
                CleanedLine::Noise => continue,
                CleanedLine::Blank { turn } => {
                    if turn.is_some() {
                        cursor.pending_turn = turn;
                    }
                    continue;
                }
                CleanedLine::Text { marker, turn, text } => (marker, turn, text),
            };

            let global_line_no = cursor.advance(marker, self.options.marker_window);
            let turn = turn.or(cursor.pending_turn.take());

            let (page_number, page_line_no) = match numbering {
                PageNumbering::Fixed => (
                    (global_line_no - 1) / lines_per_page + 1,
                    (global_line_no - 1) % lines_per_page + 1,
                ),
                PageNumbering::Source | PageNumbering::Auto => {
                    (page.page_number, global_line_no - cursor.page_base)
                }
            };

            out.push(PositionedLine {
                global_line_no,
                page_number,
                page_line_no,
                text,
                turn,
            });
        }

        if out.is_empty() {
            debug!(page = page.page_number, "page yielded no usable lines, skipped");
        }

        out
    }

    /// Numbers above `marker_limit` cannot be line markers and stay in the text.
    fn clean_line(&self, raw: &str, marker_limit: usize) -> CleanedLine {
        let without_times = TIMESTAMP_RE.replace_all(raw, " ");
        let trimmed = without_times.trim();
        if trimmed.is_empty() {
            return CleanedLine::Blank { turn: None };
        }

        let captured = MARKER_RE.captures(trimmed).and_then(|caps| {
            let marker: usize = caps.name("marker")?.as_str().parse().ok()?;
            (marker <= marker_limit).then(|| (marker, caps.name("rest").map_or("", |m| m.as_str())))
        });
        let (marker, body) = match captured {
            Some((marker, rest)) => (Some(marker), rest),
            None => (None, trimmed),
        };

        let (turn, body) = split_turn(body.trim_start());
        let text = normalize_text(body);

        if text.is_empty() {
            return CleanedLine::Blank { turn };
        }
        if self.is_noise(&text) {
            return CleanedLine::Noise;
        }

        CleanedLine::Text { marker, turn, text }
    }

    fn is_noise(&self, text: &str) -> bool {
        if PAGE_HEADER_RE.is_match(text) {
            return true;
        }
        if self.boilerplate.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.boilerplate.iter().any(|p| lower.contains(p.as_str()))
    }
}

/// Detect and strip a speaker-turn prefix.
fn split_turn(text: &str) -> (Option<Turn>, &str) {
    let turn = match text.chars().next() {
        Some('Q') => Some(Turn::Question),
        Some('A') => Some(Turn::Answer),
        _ => None,
    };

    if let Some(turn) = turn {
        let rest = &text[1..];
        match rest.chars().next() {
            None => return (Some(turn), ""),
            Some('.') | Some(':') => return (Some(turn), rest[1..].trim_start()),
            Some(c) if c.is_whitespace() => {
                let after = rest.trim_start();
                let gap = rest.len() - after.len();
                // "A lot of..." is prose, "A  Yes." and "A Yes." are answers.
                if gap >= 2 || after.is_empty() || !after.starts_with(char::is_lowercase) {
                    return (Some(turn), after);
                }
            }
            _ => {}
        }
    }

    if let Some(caps) = EXAMINER_RE.captures(text) {
        let rest = caps.name("rest").map_or("", |m| m.as_str());
        return (Some(Turn::Examination), rest);
    }

    if SPEAKER_RE.is_match(text) {
        return (Some(Turn::Colloquy), text);
    }

    (None, text)
}

/// Collapse whitespace and tidy extraction artifacts.
fn normalize_text(text: &str) -> String {
    let text = BRACKET_TAG_RE.replace_all(text, "($1)");
    let text = ELLIPSIS_RE.replace_all(&text, "...");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
