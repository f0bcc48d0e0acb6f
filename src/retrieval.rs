//! Optional pre-filtering of units by relevance.
//!
//! A [`Retriever`] scores segments against a query. The orchestrator consumes
//! units in document order, so callers that narrow a run cut ranked hits to
//! the top N and put them back into reading order before calling
//! [`Orchestrator::run`](crate::pipeline::Orchestrator::run).

use crate::error::Result;
use crate::segment::Segment;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashSet;

/// A segment with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub score: f32,
}

/// Returns segments relevant to a query, in any order.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredSegment>>;
}

/// A query plus how many hits to keep.
#[derive(Debug, Clone)]
pub struct RetrievalPlan {
    pub query: String,
    pub limit: usize,
}

impl RetrievalPlan {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
        }
    }

    /// Run the query and return the selected units ready for processing.
    pub async fn execute(&self, retriever: &dyn Retriever) -> Result<Vec<Segment>> {
        let hits = retriever.retrieve(&self.query).await?;
        Ok(select_ranked_units(hits, self.limit))
    }
}

/// Keep the `limit` best hits, then return them in document order.
///
/// Ties on score go to the earlier position. A segment returned twice is kept
/// once. Ids are renumbered 1..=n.
pub fn select_ranked_units(mut hits: Vec<ScoredSegment>, limit: usize) -> Vec<Segment> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| document_order(&a.segment, &b.segment))
    });

    let mut seen = HashSet::new();
    let mut selected: Vec<Segment> = hits
        .into_iter()
        .filter(|hit| seen.insert(hit.segment.global_line_start))
        .take(limit)
        .map(|hit| hit.segment)
        .collect();

    selected.sort_by(document_order);
    for (index, segment) in selected.iter_mut().enumerate() {
        segment.id = index + 1;
    }
    selected
}

fn document_order(a: &Segment, b: &Segment) -> Ordering {
    (a.page_start, a.page_line_start, a.global_line_start).cmp(&(
        b.page_start,
        b.page_line_start,
        b.global_line_start,
    ))
}
