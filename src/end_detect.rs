//! Detection of the end of substantive testimony.
//!
//! Depositions close with boilerplate ("This concludes today's deposition"),
//! followed by certificates, errata sheets and indexes that carry no
//! testimony. The detector finds the first unit past a warm-up window that
//! contains a terminal phrase without also mentioning a pause such as going
//! off the record.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Options for end-of-document detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndDetectOptions {
    /// Phrases that mark the end of testimony.
    pub terminal_phrases: Vec<String>,
    /// Phrases that veto a terminal match in the same unit.
    pub guard_phrases: Vec<String>,
    /// The first `len / warmup_divisor` units are never terminal.
    pub warmup_divisor: usize,
}

impl Default for EndDetectOptions {
    fn default() -> Self {
        Self {
            terminal_phrases: vec![
                "end of deposition".to_string(),
                "deposition concluded".to_string(),
                "this concludes the deposition".to_string(),
                "this concludes today's".to_string(),
            ],
            guard_phrases: vec![
                "off the record".to_string(),
                "resume".to_string(),
                "recess".to_string(),
            ],
            warmup_divisor: 10,
        }
    }
}

/// Finds the index of the terminal unit in a unit stream.
#[derive(Debug, Clone)]
pub struct EndOfDocumentDetector {
    terminal: Vec<Regex>,
    guards: Vec<Regex>,
    warmup_divisor: usize,
}

impl Default for EndOfDocumentDetector {
    fn default() -> Self {
        Self::new(&EndDetectOptions::default())
    }
}

impl EndOfDocumentDetector {
    pub fn new(options: &EndDetectOptions) -> Self {
        Self {
            terminal: compile_phrases(&options.terminal_phrases),
            guards: compile_phrases(&options.guard_phrases),
            warmup_divisor: options.warmup_divisor.max(1),
        }
    }

    /// Number of leading units that are skipped for a stream of `len` units.
    pub fn warmup(&self, len: usize) -> usize {
        len / self.warmup_divisor
    }

    /// Whether a single unit's text signals termination.
    pub fn is_terminal(&self, text: &str) -> bool {
        let text = text.replace(['\u{2019}', '\u{2018}'], "'");
        self.terminal.iter().any(|re| re.is_match(&text))
            && !self.guards.iter().any(|re| re.is_match(&text))
    }

    /// Index of the first terminal unit after the warm-up, if any.
    ///
    /// Units at or after the returned index are excluded from processing.
    pub fn find_end<T: AsRef<str>>(&self, units: &[T]) -> Option<usize> {
        let start = self.warmup(units.len());
        let found = units
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, unit)| self.is_terminal(unit.as_ref()))
            .map(|(i, _)| i);

        if let Some(index) = found {
            debug!(index, total = units.len(), "end of testimony detected");
        }
        found
    }
}

/// Compile phrases into case-insensitive, whitespace-tolerant patterns.
fn compile_phrases(phrases: &[String]) -> Vec<Regex> {
    phrases
        .iter()
        .filter_map(|phrase| {
            let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
            if words.is_empty() {
                return None;
            }
            RegexBuilder::new(&words.join(r"\s+"))
                .case_insensitive(true)
                .build()
                .ok()
        })
        .collect()
}
