//! Concurrency-limited facet extraction.
//!
//! Every work item is submitted up front and waits on a semaphore for one of
//! `concurrency` slots. Items run cooperatively on the calling task, so the
//! limit bounds in-flight model calls rather than threads. One item's
//! failure is recorded as its own outcome and never reaches its siblings.

use crate::error::FacetLensError;
use crate::lens::cache::FacetCache;
use crate::lens::client::{FACET_MAX_TOKENS, LanguageModel};
use crate::lens::extract::extract_json;
use crate::lens::prompts::facet_extraction_prompt;
use crate::lens::transcript::TranscriptSource;
use crate::lens::types::{SessionFacet, SessionSummary};
use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;

/// Called once per finished item with `(done, total)`.
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptyTranscript,
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    CacheHit(SessionFacet),
    Skipped {
        session_id: String,
        reason: SkipReason,
    },
    Extracted(SessionFacet),
    Failed {
        session_id: String,
        reason: String,
    },
}

impl ItemOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            ItemOutcome::CacheHit(facet) | ItemOutcome::Extracted(facet) => &facet.session_id,
            ItemOutcome::Skipped { session_id, .. } | ItemOutcome::Failed { session_id, .. } => {
                session_id
            }
        }
    }

    pub fn facet(&self) -> Option<&SessionFacet> {
        match self {
            ItemOutcome::CacheHit(facet) | ItemOutcome::Extracted(facet) => Some(facet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub cache_hits: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn tally(outcomes: &[ItemOutcome]) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome {
                ItemOutcome::CacheHit(_) => counts.cache_hits += 1,
                ItemOutcome::Extracted(_) => counts.extracted += 1,
                ItemOutcome::Skipped { .. } => counts.skipped += 1,
                ItemOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}

/// Reject concurrency limits the semaphore cannot represent.
pub fn check_concurrency(concurrency: usize) -> Result<(), FacetLensError> {
    if concurrency == 0 {
        return Err(FacetLensError::InvalidConfig(
            "concurrency must be >= 1".to_string(),
        ));
    }
    if concurrency > Semaphore::MAX_PERMITS {
        return Err(FacetLensError::InvalidConfig(format!(
            "concurrency must be <= {}",
            Semaphore::MAX_PERMITS
        )));
    }
    Ok(())
}

pub struct ExtractionScheduler<'a> {
    cache: &'a FacetCache,
    model: &'a dyn LanguageModel,
    transcripts: &'a dyn TranscriptSource,
}

impl<'a> ExtractionScheduler<'a> {
    pub fn new(
        cache: &'a FacetCache,
        model: &'a dyn LanguageModel,
        transcripts: &'a dyn TranscriptSource,
    ) -> Self {
        Self {
            cache,
            model,
            transcripts,
        }
    }

    /// Process every work item with at most `concurrency` in flight.
    /// Outcomes come back in completion order.
    pub async fn run(
        &self,
        work: &[SessionSummary],
        concurrency: usize,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<ItemOutcome>, FacetLensError> {
        check_concurrency(concurrency)?;

        let limiter = Semaphore::new(concurrency);
        let total = work.len();
        let mut in_flight: FuturesUnordered<_> = work
            .iter()
            .map(|session| {
                let limiter = &limiter;
                async move {
                    let Ok(_permit) = limiter.acquire().await else {
                        return ItemOutcome::Failed {
                            session_id: session.session_id.clone(),
                            reason: "concurrency limiter closed".to_string(),
                        };
                    };
                    self.process(session).await
                }
            })
            .collect();

        let mut outcomes = Vec::with_capacity(total);
        let mut done = 0usize;
        while let Some(outcome) = in_flight.next().await {
            done += 1;
            tracing::debug!(session_id = outcome.session_id(), done, total, "work item finished");
            if let Some(report) = on_progress {
                report(done, total);
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn process(&self, session: &SessionSummary) -> ItemOutcome {
        match self.try_process(session).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let reason = format!("{err:#}");
                tracing::warn!(session_id = %session.session_id, reason = %reason, "facet extraction failed");
                ItemOutcome::Failed {
                    session_id: session.session_id.clone(),
                    reason,
                }
            }
        }
    }

    async fn try_process(&self, session: &SessionSummary) -> Result<ItemOutcome> {
        let id = session.session_id.as_str();
        if let Some(facet) = self.cache.read(id).await {
            tracing::debug!(session_id = id, "facet cache hit");
            return Ok(ItemOutcome::CacheHit(facet));
        }

        let transcript = self.transcripts.load(session).await?;
        if transcript.is_empty() {
            tracing::debug!(session_id = id, "transcript has no turns");
            return Ok(ItemOutcome::Skipped {
                session_id: id.to_string(),
                reason: SkipReason::EmptyTranscript,
            });
        }

        let prompt = facet_extraction_prompt(&transcript);
        let raw = self
            .model
            .call(
                self.model.default_model(),
                &prompt.system,
                &prompt.content,
                FACET_MAX_TOKENS,
            )
            .await;
        if raw.is_empty() {
            return Ok(ItemOutcome::Skipped {
                session_id: id.to_string(),
                reason: SkipReason::EmptyResponse,
            });
        }

        let facet = SessionFacet::from_model_json(id, &extract_json(&raw))
            .context("model output is not a facet object")?;
        if let Err(err) = self.cache.write(id, &facet).await {
            tracing::warn!(session_id = id, error = %format!("{err:#}"), "facet cache write failed");
        }
        Ok(ItemOutcome::Extracted(facet))
    }
}
