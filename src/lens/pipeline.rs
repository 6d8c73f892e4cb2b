use crate::error::FacetLensError;
use crate::lens::cache::FacetCache;
use crate::lens::client::LanguageModel;
use crate::lens::scheduler::{ExtractionScheduler, ItemOutcome, ProgressFn, check_concurrency};
use crate::lens::selector::select_sessions;
use crate::lens::synthesis::synthesize;
use crate::lens::transcript::TranscriptSource;
use crate::lens::types::{LlmSynthesis, ProjectSummary, SessionFacet, SessionSummary};
use std::collections::HashSet;

#[derive(Clone, Copy)]
pub struct AnalyzeOptions<'a> {
    pub max_sessions: usize,
    pub concurrency: usize,
    pub clear_cache: bool,
    pub projects: Option<&'a [ProjectSummary]>,
    pub on_progress: Option<&'a ProgressFn<'a>>,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub synthesis: LlmSynthesis,
    pub facets: Vec<SessionFacet>,
    pub outcomes: Vec<ItemOutcome>,
    pub cleared_entries: Option<usize>,
}

/// Wires the selector, scheduler and synthesis step around injected
/// collaborators.
pub struct Pipeline<'a> {
    cache: &'a FacetCache,
    model: &'a dyn LanguageModel,
    transcripts: &'a dyn TranscriptSource,
}

impl<'a> Pipeline<'a> {
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

    pub async fn run_facet_extraction(
        &self,
        sessions: &[SessionSummary],
        options: AnalyzeOptions<'_>,
    ) -> Result<AnalysisOutput, FacetLensError> {
        check_concurrency(options.concurrency)?;
        if options.max_sessions == 0 {
            return Err(FacetLensError::InvalidConfig(
                "max sessions must be >= 1".to_string(),
            ));
        }

        let cleared_entries = if options.clear_cache {
            let removed = self
                .cache
                .clear()
                .await
                .map_err(|err| FacetLensError::CacheIo(format!("{err:#}")))?;
            tracing::info!(removed, dir = %self.cache.dir().display(), "facet cache cleared");
            Some(removed)
        } else {
            None
        };

        let work = select_sessions(sessions, options.max_sessions);
        tracing::info!(
            total = sessions.len(),
            selected = work.len(),
            concurrency = options.concurrency,
            "starting facet extraction"
        );

        let outcomes = ExtractionScheduler::new(self.cache, self.model, self.transcripts)
            .run(&work, options.concurrency, options.on_progress)
            .await?;

        let mut seen = HashSet::new();
        let facets: Vec<SessionFacet> = outcomes
            .iter()
            .filter_map(ItemOutcome::facet)
            .filter(|facet| seen.insert(facet.session_id.clone()))
            .cloned()
            .collect();

        let synthesis = synthesize(self.model, &facets, sessions.len(), options.projects).await;

        Ok(AnalysisOutput {
            synthesis,
            facets,
            outcomes,
            cleared_entries,
        })
    }
}
