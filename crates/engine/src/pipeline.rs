//! The query pipeline
//!
//! Wires the stages together behind the single externally visible entry
//! point: extract -> classify -> decompose -> fan-out retrieval ->
//! synthesize -> build. Deterministic given identical retrieval results.

use crate::answer::{AnswerContext, AnswerContextBuilder};
use crate::classify::classify;
use crate::decompose::decompose;
use crate::extract::EntityExtractor;
use crate::retrieve::RetrievalExecutor;
use crate::synthesize::Synthesizer;
use finsight_common::errors::{AppError, Result};
use finsight_common::search::VectorSearch;
use finsight_common::{metrics, AppConfig};
use std::sync::Arc;
use std::time::Instant;

/// Plans answer contexts for natural-language financial questions
pub struct QueryEngine {
    extractor: EntityExtractor,
    executor: RetrievalExecutor,
    synthesizer: Synthesizer,
    builder: AnswerContextBuilder,
}

impl QueryEngine {
    /// Create an engine from validated configuration and a search collaborator
    pub fn new(config: &AppConfig, search: Arc<dyn VectorSearch>) -> Self {
        Self {
            extractor: EntityExtractor::new(config.extraction.min_year, config.extraction.max_year),
            executor: RetrievalExecutor::new(
                search,
                config.retrieval.top_k_per_subquery,
                config.search_timeout(),
                config.retrieval.max_retries,
            ),
            synthesizer: Synthesizer::new(
                config.evidence.max_chunks,
                config.evidence.max_context_chars,
                config.extraction.min_figure_confidence,
            ),
            builder: AnswerContextBuilder::new(config.evidence.max_context_chars),
        }
    }

    /// Plan the answer context for one query.
    ///
    /// Retrieval failures, unresolved entities, and missing figures all
    /// degrade inside the pipeline; the only caller-visible error is an
    /// empty query.
    pub async fn answer_query_plan(&self, query_text: &str) -> Result<AnswerContext> {
        let query_text = query_text.trim();
        if query_text.is_empty() {
            return Err(AppError::Validation {
                message: "query text is empty".to_string(),
            });
        }

        let started = Instant::now();

        let entities = self.extractor.extract(query_text);
        let classification = classify(&entities, query_text);
        let sub_queries = decompose(&entities, classification, query_text);

        tracing::info!(
            classification = classification.as_str(),
            companies = entities.companies.len(),
            years = entities.years.len(),
            metrics = entities.metrics.len(),
            sub_queries = sub_queries.len(),
            "Query decomposed"
        );

        let results = self.executor.retrieve_all(&sub_queries).await;
        let outcome = self
            .synthesizer
            .synthesize(&entities, classification, &results);

        tracing::info!(
            evidence_chunks = outcome.evidence.len(),
            calculations = outcome.calculations.len(),
            gaps = outcome.gaps.len(),
            "Context synthesized"
        );

        let context = self.builder.build(query_text, classification, outcome);

        metrics::record_query(
            started.elapsed().as_secs_f64(),
            classification.as_str(),
            context.excerpts.len(),
        );

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_common::search::InMemoryVectorSearch;

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let engine = QueryEngine::new(
            &AppConfig::default(),
            Arc::new(InMemoryVectorSearch::default()),
        );
        assert!(engine.answer_query_plan("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_no_evidence_still_plans() {
        let engine = QueryEngine::new(
            &AppConfig::default(),
            Arc::new(InMemoryVectorSearch::default()),
        );
        let context = engine
            .answer_query_plan("What was Microsoft's revenue in 2023?")
            .await
            .unwrap();
        assert!(context.excerpts.is_empty());
        assert_eq!(context.original_query, "What was Microsoft's revenue in 2023?");
    }
}
