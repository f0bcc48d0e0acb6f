//! Deposition Indexer - turns deposition transcripts into a deduplicated,
//! page:line-anchored topic outline.
//!
//! # Overview
//!
//! A transcript is processed as a stream of units:
//! 1. Raw pages are cleaned into lines with a monotonic global line number
//!    and a page/line position ([`position`])
//! 2. Lines are packed into word-bounded segments ([`segment`])
//! 3. The closing "end of deposition" unit is located and everything after
//!    it is dropped ([`end_detect`])
//! 4. Each segment is labeled by an LLM, with bounded concurrency
//!    ([`labeler`], [`pipeline`])
//! 5. Labels are folded into topics, merging near-duplicates among the most
//!    recent entries ([`topic`])
//!
//! After every unit the outline is written atomically and a checkpoint
//! advanced, so an interrupted run resumes where it stopped.
//!
//! # Quick Start
//!
//! ```no_run
//! use depo_indexer::{
//!     checkpoint::FileCheckpointStore,
//!     config::Config,
//!     document::Transcript,
//!     labeler::LlmLabeler,
//!     llm::LlmClient,
//!     pipeline::{Orchestrator, build_units},
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let transcript = Transcript::from_text_file(Path::new("smith.txt"))?;
//!     let units = build_units(&transcript.pages, &config.pipeline);
//!
//!     let output = Path::new("smith.json");
//!     let labeler = Arc::new(LlmLabeler::new(LlmClient::new(config.llm.clone())));
//!     let mut orchestrator = Orchestrator::from_config(
//!         transcript.name.clone(),
//!         labeler,
//!         FileCheckpointStore::beside(output),
//!         output,
//!         &config.pipeline,
//!     );
//!
//!     let report = orchestrator.run(&units).await?;
//!     println!("{} topics", report.topics_emitted);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Transcript**: Page-split source text
//! - **PositionReconstructor**: Line numbering and cleanup
//! - **Segmenter**: Units of work
//! - **Labeler**: Segment excerpt to topic label
//! - **TopicDeduper**: Ordered, merged topic list
//! - **Orchestrator**: Resumable run state machine
//! - **Outline**: The persisted result

pub mod checkpoint;
pub mod config;
pub mod document;
pub mod end_detect;
pub mod error;
pub mod labeler;
pub mod llm;
pub mod outline;
pub mod persistence;
pub mod pipeline;
pub mod position;
pub mod retrieval;
pub mod segment;
pub mod topic;

// Re-export commonly used types
pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::Config;
pub use document::{RawPage, Transcript};
pub use error::{DepoIndexError, LabelError, Result};
pub use labeler::{LabelStyle, Labeler, LlmLabeler};
pub use llm::LlmClient;
pub use outline::Outline;
pub use persistence::{load_outline, save_outline};
pub use pipeline::{Orchestrator, RunOutcome, RunReport, build_units};
pub use segment::Segment;
pub use topic::{Topic, TopicDeduper};
