//! The resumable indexing run.
//!
//! An [`Orchestrator`] walks the units of one transcript in document order.
//! Labeling fans out in batches of `concurrency` spawned tasks; everything
//! after it (dedupe, outline write, checkpoint advance) happens one unit at a
//! time in unit order, so the persisted outline and the checkpoint always
//! agree on how far the run got.
//!
//! ```text
//! Init -> Resuming -> Processing -> EndDetected -> Finalizing -> Done
//!           |             |      \-> Exhausted --/
//!           \-------------+--------> Suspended
//! ```

use crate::checkpoint::CheckpointStore;
use crate::config::PipelineConfig;
use crate::document::RawPage;
use crate::end_detect::{EndDetectOptions, EndOfDocumentDetector};
use crate::error::{LabelError, Result};
use crate::labeler::{LabelStyle, Labeler, excerpt};
use crate::outline::Outline;
use crate::persistence::{load_outline, save_outline};
use crate::position::PositionReconstructor;
use crate::segment::{Segment, Segmenter};
use crate::topic::{DedupeOptions, MergeOutcome, Topic, TopicCandidate, TopicDeduper};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Position reconstruction plus segmentation: raw pages to ordered units.
pub fn build_units(pages: &[RawPage], config: &PipelineConfig) -> Vec<Segment> {
    let lines = PositionReconstructor::new(config.positions.clone()).reconstruct(pages);
    let units = Segmenter::new(config.segmentation.clone()).segment(&lines);
    debug!(lines = lines.len(), units = units.len(), "built units");
    units
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    /// Picking up after `from` completed units.
    Resuming { from: usize },
    /// Next unit (0-based) to label.
    Processing { next: usize },
    /// Terminal phrase found in this unit (0-based).
    EndDetected { unit: usize },
    Exhausted,
    Finalizing,
    /// Stopped early; `next` units are durably done.
    Suspended { next: usize },
    Done,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every unit was processed.
    Exhausted,
    /// Processing stopped at the end-of-testimony unit.
    EndDetected,
    /// Cancelled or unit limit reached. Resume to continue.
    Suspended,
}

/// Summary of one run. Unit counts cover the whole transcript, including
/// units handled by earlier interrupted runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub name: String,
    pub outcome: RunOutcome,
    pub units_total: usize,
    pub units_processed: usize,
    pub units_skipped: usize,
    pub topics_emitted: usize,
    /// Units already done when this run started, if any.
    pub resumed_from: Option<usize>,
    /// 0-based index of the terminal unit.
    pub end_detected_at: Option<usize>,
}

/// Fan-out and labeling settings of a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Labeler calls in flight at once.
    pub concurrency: usize,
    pub label_timeout: Duration,
    pub label_style: LabelStyle,
    /// Stop (suspended) after this many units in one run.
    pub max_units: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            label_timeout: Duration::from_secs(60),
            label_style: LabelStyle::default(),
            max_units: None,
        }
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.labeling.concurrency,
            label_timeout: config.labeling.timeout(),
            label_style: config.labeling.label_style(),
            max_units: None,
        }
    }
}

/// Drives one transcript from units to a finished outline.
pub struct Orchestrator<C: CheckpointStore> {
    name: String,
    labeler: Arc<dyn Labeler>,
    checkpoint: C,
    output: PathBuf,
    options: PipelineOptions,
    dedupe: DedupeOptions,
    detector: EndOfDocumentDetector,
    cancel: Arc<AtomicBool>,
    state: RunState,
}

impl<C: CheckpointStore> Orchestrator<C> {
    pub fn new(
        name: impl Into<String>,
        labeler: Arc<dyn Labeler>,
        checkpoint: C,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            labeler,
            checkpoint,
            output: output.into(),
            options: PipelineOptions::default(),
            dedupe: DedupeOptions::default(),
            detector: EndOfDocumentDetector::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            state: RunState::Init,
        }
    }

    /// Build an orchestrator with every stage configured from `config`.
    pub fn from_config(
        name: impl Into<String>,
        labeler: Arc<dyn Labeler>,
        checkpoint: C,
        output: impl Into<PathBuf>,
        config: &PipelineConfig,
    ) -> Self {
        Self::new(name, labeler, checkpoint, output)
            .with_options(PipelineOptions::from(config))
            .with_dedupe(config.dedupe.clone())
            .with_end_detection(&config.end_detection)
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_dedupe(mut self, dedupe: DedupeOptions) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn with_end_detection(mut self, options: &EndDetectOptions) -> Self {
        self.detector = EndOfDocumentDetector::new(options);
        self
    }

    /// Share a cancellation flag. Checked between units.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn checkpoint(&self) -> &C {
        &self.checkpoint
    }

    pub fn into_checkpoint(self) -> C {
        self.checkpoint
    }

    /// Process `units` (document order) into the outline at the output path.
    ///
    /// Unit-level labeling failures are logged and counted as skipped.
    /// Any returned error is fatal; state on disk stays valid because every
    /// write is atomic and the checkpoint trails the outline.
    pub async fn run(&mut self, units: &[Segment]) -> Result<RunReport> {
        self.transition(RunState::Init);

        let total = units.len();
        let end = self.detector.find_end(units);
        let limit = end.unwrap_or(total);

        let (mut outline, start) = self.load_progress(total)?;
        if outline.complete {
            info!(name = %self.name, "outline already complete, clearing stale checkpoint");
            self.checkpoint.reset()?;
            self.transition(RunState::Done);
            let outcome = if end.is_some() {
                RunOutcome::EndDetected
            } else {
                RunOutcome::Exhausted
            };
            return Ok(self.report(&outline, outcome, total, Some(start), end));
        }

        let resumed_from = (start > 0).then_some(start);
        if let Some(from) = resumed_from {
            self.transition(RunState::Resuming { from });
        }

        let mut deduper =
            TopicDeduper::from_topics(self.dedupe.clone(), std::mem::take(&mut outline.topics));

        let stop_at = match self.options.max_units {
            Some(max) => start.saturating_add(max).min(limit),
            None => limit,
        };

        let mut next = start.min(stop_at);
        let mut cancelled = false;
        let batch_size = self.options.concurrency.max(1);

        'units: while next < stop_at {
            if self.is_cancelled() {
                cancelled = true;
                break;
            }
            self.transition(RunState::Processing { next });

            let batch_end = (next + batch_size).min(stop_at);
            let results = self.label_batch(units, next..batch_end).await;

            for (index, result) in results {
                if self.is_cancelled() {
                    cancelled = true;
                    break 'units;
                }
                self.apply(&units[index], index, result, &mut deduper, &mut outline);
                outline.last_unit = index + 1;
                outline.topics = deduper.topics().to_vec();
                save_outline(&outline, &self.output)?;
                self.checkpoint.set(index + 1)?;
                next = index + 1;
            }
        }

        if cancelled || next < limit {
            self.transition(RunState::Suspended { next });
            info!(
                name = %self.name,
                done = next,
                total,
                cancelled,
                "run suspended"
            );
            outline.topics = deduper.into_topics();
            return Ok(self.report(&outline, RunOutcome::Suspended, total, resumed_from, end));
        }

        let outcome = match end {
            Some(unit) => {
                self.transition(RunState::EndDetected { unit });
                if !deduper.is_terminated() {
                    let anchor = &units[unit];
                    deduper.push_terminal(Topic::terminal(
                        anchor.page_start,
                        anchor.page_line_start,
                        unit + 1,
                    ));
                }
                RunOutcome::EndDetected
            }
            None => {
                self.transition(RunState::Exhausted);
                RunOutcome::Exhausted
            }
        };

        self.transition(RunState::Finalizing);
        outline.topics = deduper.into_topics();
        outline.complete = true;
        save_outline(&outline, &self.output)?;
        self.checkpoint.reset()?;
        self.transition(RunState::Done);

        let report = self.report(&outline, outcome, total, resumed_from, end);
        info!(
            name = %report.name,
            processed = report.units_processed,
            skipped = report.units_skipped,
            topics = report.topics_emitted,
            "run complete"
        );
        Ok(report)
    }

    /// Outline and number of completed units to continue from.
    fn load_progress(&mut self, total: usize) -> Result<(Outline, usize)> {
        let checkpoint = self.checkpoint.get()?;
        if checkpoint == 0 {
            return Ok((Outline::new(&self.name), 0));
        }

        if !self.output.exists() {
            warn!(
                checkpoint,
                path = %self.output.display(),
                "checkpoint without outline, starting over"
            );
            return Ok((Outline::new(&self.name), 0));
        }

        let outline = load_outline(&self.output)?;
        if outline.name != self.name {
            warn!(
                checkpoint,
                found = %outline.name,
                expected = %self.name,
                path = %self.output.display(),
                "saved progress belongs to another transcript, starting over"
            );
            self.checkpoint.reset()?;
            return Ok((Outline::new(&self.name), 0));
        }

        let start = checkpoint.max(outline.last_unit);
        if start > total {
            warn!(start, total, "checkpoint is past the last unit");
        }
        Ok((outline, start))
    }

    async fn label_batch(
        &self,
        units: &[Segment],
        range: std::ops::Range<usize>,
    ) -> Vec<(usize, std::result::Result<String, LabelError>)> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut handles = Vec::with_capacity(range.len());

        for index in range {
            let labeler = Arc::clone(&self.labeler);
            let semaphore = Arc::clone(&semaphore);
            let style = self.options.label_style;
            let timeout = self.options.label_timeout;
            let text = excerpt(&units[index].text, style.excerpt_chars).to_string();

            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| LabelError::Backend(e.to_string()))?;
                match tokio::time::timeout(timeout, labeler.label(&text, &style)).await {
                    Ok(result) => result,
                    Err(_) => Err(LabelError::Timeout(timeout)),
                }
            });
            handles.push((index, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (index, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(LabelError::Backend(format!("labeling task failed: {e}"))),
            };
            results.push((index, result));
        }

        results.sort_by_key(|(index, _)| {
            let unit = &units[*index];
            (unit.page_start, unit.page_line_start, *index)
        });
        results
    }

    fn apply(
        &self,
        unit: &Segment,
        index: usize,
        result: std::result::Result<String, LabelError>,
        deduper: &mut TopicDeduper,
        outline: &mut Outline,
    ) {
        match result {
            Ok(label) => {
                let candidate =
                    TopicCandidate::new(label, unit.page_start, unit.page_line_start)
                        .with_unit(index + 1);
                match deduper.push(candidate) {
                    MergeOutcome::Appended(at) => debug!(unit = index + 1, topic = at, "new topic"),
                    MergeOutcome::Merged(at) => debug!(unit = index + 1, topic = at, "merged"),
                }
                outline.stats.processed += 1;
            }
            Err(error) => {
                warn!(
                    unit = index + 1,
                    anchor = %unit.anchor(),
                    %error,
                    "labeling failed, unit skipped"
                );
                outline.stats.skipped += 1;
            }
        }
    }

    fn report(
        &self,
        outline: &Outline,
        outcome: RunOutcome,
        total: usize,
        resumed_from: Option<usize>,
        end: Option<usize>,
    ) -> RunReport {
        RunReport {
            name: self.name.clone(),
            outcome,
            units_total: total,
            units_processed: outline.stats.processed,
            units_skipped: outline.stats.skipped,
            topics_emitted: outline.topics.len(),
            resumed_from,
            end_detected_at: end,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn transition(&mut self, next: RunState) {
        debug!(name = %self.name, from = ?self.state, to = ?next, "state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{FileCheckpointStore, MemoryCheckpointStore};
    use crate::labeler::clean_label;
    use crate::position::{PositionedLine, Turn};
    use crate::segment::SegmentOptions;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    const SUBJECTS: &[&str] = &[
        "Employment history at Acme",
        "Signing of the lease agreement",
        "Phone records from March",
        "Bank statements and deposits",
        "Medical treatment after the fall",
        "Vehicle accident on Route 9",
        "Emails with the landlord",
        "Prior lawsuits against the witness",
    ];

    /// One unit per text, 25 lines per page.
    fn units_from(texts: &[String]) -> Vec<Segment> {
        let lines: Vec<PositionedLine> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| PositionedLine {
                global_line_no: i + 1,
                page_number: i / 25 + 1,
                page_line_no: i % 25 + 1,
                text: text.clone(),
                turn: Some(Turn::Question),
            })
            .collect();
        Segmenter::new(SegmentOptions {
            min_words: 0,
            ..Default::default()
        })
        .segment(&lines)
    }

    /// Pairs of identical subjects, cycling through the list.
    fn subject_units(count: usize) -> Vec<Segment> {
        let texts: Vec<String> = (0..count)
            .map(|i| SUBJECTS[(i / 2) % SUBJECTS.len()].to_string())
            .collect();
        units_from(&texts)
    }

    /// Labels a unit with its own text and records every call.
    #[derive(Default)]
    struct EchoLabeler {
        calls: Mutex<Vec<String>>,
    }

    impl EchoLabeler {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Labeler for EchoLabeler {
        async fn label(&self, excerpt: &str, _style: &LabelStyle) -> std::result::Result<String, LabelError> {
            self.calls.lock().unwrap().push(excerpt.to_string());
            clean_label(excerpt)
        }
    }

    /// Fails on texts containing a marker word.
    struct FlakyLabeler;

    #[async_trait]
    impl Labeler for FlakyLabeler {
        async fn label(&self, excerpt: &str, _style: &LabelStyle) -> std::result::Result<String, LabelError> {
            if excerpt.contains("Phone") {
                return Err(LabelError::Backend("rate limited".to_string()));
            }
            clean_label(excerpt)
        }
    }

    /// Never answers in time for texts containing "Bank".
    struct SlowLabeler;

    #[async_trait]
    impl Labeler for SlowLabeler {
        async fn label(&self, excerpt: &str, _style: &LabelStyle) -> std::result::Result<String, LabelError> {
            if excerpt.contains("Bank") {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            clean_label(excerpt)
        }
    }

    /// Tracks how many calls overlap.
    #[derive(Default)]
    struct GaugeLabeler {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Labeler for GaugeLabeler {
        async fn label(&self, excerpt: &str, _style: &LabelStyle) -> std::result::Result<String, LabelError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            clean_label(excerpt)
        }
    }

    fn output(dir: &TempDir) -> PathBuf {
        dir.path().join("outline.json")
    }

    #[tokio::test]
    async fn test_full_run_merges_pairs_and_resets_checkpoint() {
        let dir = TempDir::new().unwrap();
        let labeler = Arc::new(EchoLabeler::default());
        let mut orchestrator = Orchestrator::new(
            "smith",
            labeler.clone(),
            MemoryCheckpointStore::new(),
            output(&dir),
        );

        let units = subject_units(20);
        let report = orchestrator.run(&units).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Exhausted);
        assert_eq!(report.units_total, 20);
        assert_eq!(report.units_processed, 20);
        assert_eq!(report.units_skipped, 0);
        assert_eq!(report.topics_emitted, 10);
        assert_eq!(orchestrator.state(), RunState::Done);
        assert_eq!(orchestrator.checkpoint().get().unwrap(), 0);
        assert_eq!(labeler.call_count(), 20);

        let outline = load_outline(&output(&dir)).unwrap();
        assert!(outline.complete);
        assert_eq!(outline.last_unit, 20);
        let first = &outline.topics[0];
        assert_eq!(first.topic_text, SUBJECTS[0]);
        assert_eq!((first.page_start, first.line_start), (1, 1));
        assert_eq!((first.page_end, first.line_end), (1, 2));
    }

    #[tokio::test]
    async fn test_failed_units_are_skipped_and_checkpoint_advances() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = Orchestrator::new(
            "smith",
            Arc::new(FlakyLabeler),
            MemoryCheckpointStore::new(),
            output(&dir),
        )
        .with_options(PipelineOptions {
            max_units: Some(6),
            ..Default::default()
        });

        let units = subject_units(16);
        let report = orchestrator.run(&units).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Suspended);
        // units 4 and 5 are the phone records pair
        assert_eq!(report.units_processed, 4);
        assert_eq!(report.units_skipped, 2);
        assert_eq!(orchestrator.checkpoint().get().unwrap(), 6);
        assert!(
            !load_outline(&output(&dir))
                .unwrap()
                .topics
                .iter()
                .any(|t| t.topic_text.contains("Phone"))
        );
    }

    #[tokio::test]
    async fn test_timeout_counts_as_skip() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = Orchestrator::new(
            "smith",
            Arc::new(SlowLabeler),
            MemoryCheckpointStore::new(),
            output(&dir),
        )
        .with_options(PipelineOptions {
            label_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        let units = subject_units(8);
        let report = orchestrator.run(&units).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Exhausted);
        assert_eq!(report.units_skipped, 2);
        assert_eq!(report.units_processed, 6);
        assert_eq!(report.topics_emitted, 3);
    }

    #[tokio::test]
    async fn test_end_detected_excludes_tail_and_adds_terminal() {
        let dir = TempDir::new().unwrap();
        let labeler = Arc::new(EchoLabeler::default());
        let mut orchestrator = Orchestrator::new(
            "smith",
            labeler.clone(),
            MemoryCheckpointStore::at(0),
            output(&dir),
        );

        let mut texts: Vec<String> = (0..100)
            .map(|i| SUBJECTS[(i / 2) % SUBJECTS.len()].to_string())
            .collect();
        texts[40] = "This concludes the deposition at 4:15".to_string();
        let units = units_from(&texts);

        let report = orchestrator.run(&units).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::EndDetected);
        assert_eq!(report.end_detected_at, Some(40));
        assert_eq!(labeler.call_count(), 40);
        assert_eq!(report.topics_emitted, 21);

        let outline = load_outline(&output(&dir)).unwrap();
        let terminal = outline.topics.last().unwrap();
        assert!(terminal.terminal);
        assert_eq!(terminal.topic_text, "End of Deposition");
        // unit 40 is global line 41: page 2, line 16
        assert_eq!((terminal.page_start, terminal.line_start), (2, 16));
        assert!(outline.ends_with_terminal());
    }

    #[tokio::test]
    async fn test_resume_matches_uninterrupted_and_skips_done_units() {
        let units = subject_units(22);

        let full_dir = TempDir::new().unwrap();
        let mut full = Orchestrator::new(
            "smith",
            Arc::new(EchoLabeler::default()),
            MemoryCheckpointStore::new(),
            output(&full_dir),
        );
        full.run(&units).await.unwrap();
        let expected = load_outline(&output(&full_dir)).unwrap();

        let dir = TempDir::new().unwrap();
        let checkpoint_path = dir.path().join("outline.checkpoint.json");

        let mut first = Orchestrator::new(
            "smith",
            Arc::new(EchoLabeler::default()),
            FileCheckpointStore::new(&checkpoint_path),
            output(&dir),
        )
        .with_options(PipelineOptions {
            max_units: Some(7),
            ..Default::default()
        });
        let report = first.run(&units).await.unwrap();
        assert_eq!(report.outcome, RunOutcome::Suspended);
        assert_eq!(first.state(), RunState::Suspended { next: 7 });
        assert_eq!(first.checkpoint().get().unwrap(), 7);

        let labeler = Arc::new(EchoLabeler::default());
        let mut second = Orchestrator::new(
            "smith",
            labeler.clone(),
            FileCheckpointStore::new(&checkpoint_path),
            output(&dir),
        );
        let report = second.run(&units).await.unwrap();

        assert_eq!(report.resumed_from, Some(7));
        assert_eq!(report.outcome, RunOutcome::Exhausted);
        assert_eq!(labeler.call_count(), 15);
        // only the second cycle (units 16 and 17) is labeled again
        let relabeled = labeler
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == SUBJECTS[0])
            .count();
        assert_eq!(relabeled, 2);

        let resumed = load_outline(&output(&dir)).unwrap();
        assert_eq!(resumed.topics, expected.topics);
        assert_eq!(resumed.stats, expected.stats);
    }

    #[tokio::test]
    async fn test_outline_ahead_of_checkpoint_is_not_refed() {
        let dir = TempDir::new().unwrap();
        let units = subject_units(6);

        let mut outline = Outline::new("smith");
        outline.topics.push(Topic::seeded(
            &TopicCandidate::new(SUBJECTS[0], 1, 1).with_unit(1),
        ));
        outline.topics[0].line_end = 2;
        outline.last_unit = 2;
        outline.stats.processed = 2;
        save_outline(&outline, &output(&dir)).unwrap();

        let labeler = Arc::new(EchoLabeler::default());
        let mut orchestrator = Orchestrator::new(
            "smith",
            labeler.clone(),
            MemoryCheckpointStore::at(1),
            output(&dir),
        );
        let report = orchestrator.run(&units).await.unwrap();

        assert_eq!(report.resumed_from, Some(2));
        assert_eq!(labeler.call_count(), 4);
        assert_eq!(report.units_processed, 6);
        assert_eq!(report.topics_emitted, 3);
    }

    #[tokio::test]
    async fn test_progress_of_another_transcript_is_not_resumed() {
        let dir = TempDir::new().unwrap();
        let units = subject_units(6);

        let mut alpha = Orchestrator::new(
            "alpha",
            Arc::new(EchoLabeler::default()),
            MemoryCheckpointStore::new(),
            output(&dir),
        )
        .with_options(PipelineOptions {
            max_units: Some(3),
            ..Default::default()
        });
        alpha.run(&units).await.unwrap();
        let checkpoint = alpha.into_checkpoint();
        assert_eq!(checkpoint.get().unwrap(), 3);

        let labeler = Arc::new(EchoLabeler::default());
        let mut bravo = Orchestrator::new("bravo", labeler.clone(), checkpoint, output(&dir));
        let report = bravo.run(&units).await.unwrap();

        assert_eq!(report.resumed_from, None);
        assert_eq!(report.outcome, RunOutcome::Exhausted);
        assert_eq!(labeler.call_count(), 6);
        assert_eq!(report.units_processed, 6);

        let outline = load_outline(&output(&dir)).unwrap();
        assert_eq!(outline.name, "bravo");
        assert_eq!(outline.topics.len(), 3);
        assert_eq!(outline.topics[0].unit, 1);
    }

    #[tokio::test]
    async fn test_cancel_before_first_unit() {
        let dir = TempDir::new().unwrap();
        let cancel = Arc::new(AtomicBool::new(true));
        let labeler = Arc::new(EchoLabeler::default());
        let mut orchestrator = Orchestrator::new(
            "smith",
            labeler.clone(),
            MemoryCheckpointStore::new(),
            output(&dir),
        )
        .with_cancel(cancel);

        let report = orchestrator.run(&subject_units(5)).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Suspended);
        assert_eq!(orchestrator.state(), RunState::Suspended { next: 0 });
        assert_eq!(labeler.call_count(), 0);
        assert!(!output(&dir).exists());
    }

    #[tokio::test]
    async fn test_empty_input_yields_empty_outline() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = Orchestrator::new(
            "blank",
            Arc::new(EchoLabeler::default()),
            MemoryCheckpointStore::new(),
            output(&dir),
        );

        let report = orchestrator.run(&[]).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Exhausted);
        assert_eq!(report.units_total, 0);
        assert_eq!(report.topics_emitted, 0);
        let outline = load_outline(&output(&dir)).unwrap();
        assert!(outline.topics.is_empty());
        assert!(outline.complete);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let dir = TempDir::new().unwrap();
        let labeler = Arc::new(GaugeLabeler::default());
        let mut orchestrator = Orchestrator::new(
            "smith",
            labeler.clone(),
            MemoryCheckpointStore::new(),
            output(&dir),
        )
        .with_options(PipelineOptions {
            concurrency: 3,
            ..Default::default()
        });

        orchestrator.run(&subject_units(12)).await.unwrap();

        let peak = labeler.peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak {peak}");
    }

    #[tokio::test]
    async fn test_completed_outline_clears_stale_checkpoint() {
        let dir = TempDir::new().unwrap();
        let mut outline = Outline::new("smith");
        outline.complete = true;
        outline.last_unit = 4;
        save_outline(&outline, &output(&dir)).unwrap();

        let labeler = Arc::new(EchoLabeler::default());
        let mut orchestrator = Orchestrator::new(
            "smith",
            labeler.clone(),
            MemoryCheckpointStore::at(4),
            output(&dir),
        );
        orchestrator.run(&subject_units(4)).await.unwrap();

        assert_eq!(labeler.call_count(), 0);
        assert_eq!(orchestrator.checkpoint().get().unwrap(), 0);
        assert_eq!(orchestrator.state(), RunState::Done);
    }

    #[test]
    fn test_build_units_from_pages() {
        let pages = vec![
            RawPage::new(1, "1 Q. Where do you work?\n2 A. At Acme Freight as a dispatcher."),
            RawPage::new(2, "1 Q. How long?\n2 A. Since 2015, about nine years now."),
        ];
        let mut config = PipelineConfig::default();
        config.segmentation.min_words = 0;

        let units = build_units(&pages, &config);

        assert_eq!(units.len(), 4);
        assert_eq!(units[2].page_start, 2);
        assert_eq!(units[2].page_line_start, 1);
        let ids: Vec<usize> = units.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = PipelineConfig::default();
        config.labeling.concurrency = 2;
        config.labeling.timeout_secs = 9;
        let options = PipelineOptions::from(&config);
        assert_eq!(options.concurrency, 2);
        assert_eq!(options.label_timeout, Duration::from_secs(9));
        assert_eq!(options.label_style, LabelStyle::default());
    }
}
