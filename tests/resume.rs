//! End-to-end runs over a transcript file: an interrupted run resumed from
//! its checkpoint must produce the same outline as one uninterrupted run.

use async_trait::async_trait;
use depo_indexer::checkpoint::{CheckpointStore, FileCheckpointStore};
use depo_indexer::config::PipelineConfig;
use depo_indexer::document::Transcript;
use depo_indexer::error::LabelError;
use depo_indexer::labeler::{LabelStyle, Labeler};
use depo_indexer::persistence::load_outline;
use depo_indexer::pipeline::{Orchestrator, PipelineOptions, RunOutcome, build_units};
use depo_indexer::segment::Segment;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

const SUBJECTS: &[&str] = &[
    "warehouse inventory audit",
    "termination meeting with Ms. Alvarez",
    "forklift maintenance logs",
    "overtime pay dispute",
    "security camera footage",
    "safety training records",
];

/// Six pages of numbered, timestamped Q/A testimony ending with the
/// reporter's closing statement.
fn transcript_text() -> String {
    let mut pages = Vec::new();
    let mut pair = 0;
    for page in 0..6 {
        let mut lines = Vec::new();
        let mut n = 1;
        while n <= 24 {
            let subject = SUBJECTS[(pair / 3) % SUBJECTS.len()];
            lines.push(format!(
                "{n:>2}  10:{:02}:00  Q. Turning to exhibit {}, tell me everything you can \
                 recall about the {subject} and who else was present.",
                (page * 7 + n) % 60,
                pair + 1
            ));
            lines.push(format!(
                "{:>2}  A. I recall the {subject} clearly, it came up again in week {} and \
                 everyone on the floor was talking about it for days afterwards.",
                n + 1,
                pair + 1
            ));
            n += 2;
            pair += 1;
        }
        if page == 5 {
            lines.push("25  THE REPORTER: This concludes the deposition.".to_string());
        }
        pages.push(lines.join("\n"));
    }
    pages.join("\x0c")
}

fn units(dir: &Path) -> Vec<Segment> {
    let path = dir.join("alvarez.txt");
    std::fs::write(&path, transcript_text()).unwrap();
    let transcript = Transcript::from_text_file(&path).unwrap();
    assert_eq!(transcript.page_count(), 6);
    build_units(&transcript.pages, &PipelineConfig::default())
}

/// Labels with the answer's subject and records the excerpts it saw.
#[derive(Default)]
struct SubjectLabeler {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Labeler for SubjectLabeler {
    async fn label(&self, excerpt: &str, _style: &LabelStyle) -> Result<String, LabelError> {
        self.seen.lock().unwrap().push(excerpt.to_string());
        SUBJECTS
            .iter()
            .find(|s| excerpt.contains(*s))
            .map(|s| format!("Testimony about the {s}"))
            .ok_or(LabelError::Empty)
    }
}

#[tokio::test]
async fn resumed_run_matches_uninterrupted_run() {
    let dir = TempDir::new().unwrap();
    let units = units(dir.path());
    assert!(units.len() > 10);

    let full_out = dir.path().join("full.json");
    let mut full = Orchestrator::new(
        "alvarez",
        Arc::new(SubjectLabeler::default()),
        FileCheckpointStore::beside(&full_out),
        &full_out,
    );
    let full_report = full.run(&units).await.unwrap();
    assert_eq!(full_report.outcome, RunOutcome::EndDetected);
    let expected = load_outline(&full_out).unwrap();
    assert!(expected.ends_with_terminal());

    let out = dir.path().join("split.json");
    let interrupted_at = 5;
    let mut first = Orchestrator::new(
        "alvarez",
        Arc::new(SubjectLabeler::default()),
        FileCheckpointStore::beside(&out),
        &out,
    )
    .with_options(PipelineOptions {
        max_units: Some(interrupted_at),
        ..Default::default()
    });
    let report = first.run(&units).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Suspended);
    assert_eq!(
        FileCheckpointStore::beside(&out).get().unwrap(),
        interrupted_at
    );
    assert!(!load_outline(&out).unwrap().complete);

    let labeler = Arc::new(SubjectLabeler::default());
    let mut second = Orchestrator::new(
        "alvarez",
        labeler.clone(),
        FileCheckpointStore::beside(&out),
        &out,
    );
    let report = second.run(&units).await.unwrap();

    assert_eq!(report.resumed_from, Some(interrupted_at));
    assert_eq!(report.outcome, RunOutcome::EndDetected);

    let end = report.end_detected_at.unwrap();
    let seen = labeler.seen.lock().unwrap();
    assert_eq!(seen.len(), end - interrupted_at);
    for unit in &units[..interrupted_at] {
        let excerpt: String = unit.text.chars().take(300).collect();
        assert!(!seen.contains(&excerpt));
    }

    let resumed = load_outline(&out).unwrap();
    assert_eq!(resumed.topics, expected.topics);
    assert_eq!(resumed.stats, expected.stats);
    assert!(resumed.complete);
    assert_eq!(FileCheckpointStore::beside(&out).get().unwrap(), 0);
}

#[tokio::test]
async fn cancelled_run_keeps_checkpoint_and_resumes() {
    let dir = TempDir::new().unwrap();
    let units = units(dir.path());
    let out = dir.path().join("cancelled.json");

    let cancel = Arc::new(AtomicBool::new(true));
    let mut first = Orchestrator::new(
        "alvarez",
        Arc::new(SubjectLabeler::default()),
        FileCheckpointStore::beside(&out),
        &out,
    )
    .with_cancel(Arc::clone(&cancel));
    let report = first.run(&units).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Suspended);
    assert_eq!(report.units_processed, 0);

    cancel.store(false, Ordering::SeqCst);
    let mut second = Orchestrator::new(
        "alvarez",
        Arc::new(SubjectLabeler::default()),
        FileCheckpointStore::beside(&out),
        &out,
    )
    .with_cancel(cancel);
    let report = second.run(&units).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::EndDetected);
    assert!(report.topics_emitted > 1);
    let outline = load_outline(&out).unwrap();
    assert!(outline.complete);
    assert_eq!(outline.topics.last().unwrap().topic_text, "End of Deposition");
}

#[test]
fn positions_are_anchored_to_printed_line_numbers() {
    let dir = TempDir::new().unwrap();
    let units = units(dir.path());

    let first = &units[0];
    assert_eq!((first.page_start, first.page_line_start), (1, 1));

    let second_page = units.iter().find(|u| u.page_start == 2).unwrap();
    assert_eq!(second_page.page_line_start, 1);

    let mut last = 0;
    for unit in &units {
        assert!(unit.global_line_start > last);
        assert!(unit.global_line_end >= unit.global_line_start);
        last = unit.global_line_end;
    }
}
