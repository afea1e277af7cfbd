//! Retrieval execution
//!
//! Issues each sub-query against the vector search collaborator. Sub-query
//! calls are independent, so they fan out concurrently and join before
//! synthesis; results come back in sub-query issue order because the
//! deduplication tie-break downstream depends on it.
//!
//! A failed, timed-out, or empty sub-query is never fatal: after bounded
//! retries it contributes an empty result set and the pipeline runs on
//! whatever evidence exists.

use crate::decompose::SubQuery;
use finsight_common::lexicon::{CompanyId, SectionTag};
use finsight_common::search::{ChunkHit, SearchFilters, VectorSearch};
use finsight_common::{metrics, AppError};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A retrieved passage with its relevance score and filing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Unique chunk identifier - the deduplication key
    pub chunk_id: String,

    /// Passage text
    pub content: String,

    /// Relevance score in [0, 1]
    pub score: f32,

    /// Issuer, when the stored ticker is one we support
    pub company: Option<CompanyId>,

    /// Filing year
    pub year: i32,

    /// 10-K section, when tagged
    pub section: Option<SectionTag>,

    /// Originating filing file
    pub source_file: String,
}

impl From<ChunkHit> for RetrievedChunk {
    fn from(hit: ChunkHit) -> Self {
        Self {
            company: CompanyId::from_ticker(&hit.company),
            section: hit.section.as_deref().and_then(SectionTag::from_key),
            chunk_id: hit.chunk_id,
            content: hit.content,
            score: hit.score,
            year: hit.year,
            source_file: hit.source_file,
        }
    }
}

/// Executes sub-queries against the vector search collaborator
pub struct RetrievalExecutor {
    search: Arc<dyn VectorSearch>,
    top_k: usize,
    timeout: Duration,
    max_retries: u32,
}

impl RetrievalExecutor {
    pub fn new(
        search: Arc<dyn VectorSearch>,
        top_k: usize,
        timeout: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            search,
            top_k,
            timeout,
            max_retries,
        }
    }

    /// Retrieve for every sub-query concurrently, preserving issue order
    pub async fn retrieve_all(
        &self,
        sub_queries: &[SubQuery],
    ) -> Vec<(SubQuery, Vec<RetrievedChunk>)> {
        let futures = sub_queries
            .iter()
            .map(|sub_query| async move {
                let chunks = self.retrieve(sub_query).await;
                (sub_query.clone(), chunks)
            })
            .collect::<Vec<_>>();

        join_all(futures).await
    }

    /// Retrieve for one sub-query; degrades to empty on persistent failure
    async fn retrieve(&self, sub_query: &SubQuery) -> Vec<RetrievedChunk> {
        let filters = SearchFilters {
            company: sub_query.company.map(|c| c.ticker().to_string()),
            year: sub_query.year,
            section: sub_query.section_filter.map(|s| s.as_key().to_string()),
        };

        let started = Instant::now();
        let mut last_error: Option<AppError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(50 * 2_u64.pow(attempt - 1))).await;
            }

            let call = self.search.search(&sub_query.text, &filters, self.top_k);
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(hits)) => {
                    let chunks: Vec<RetrievedChunk> =
                        hits.into_iter().map(RetrievedChunk::from).collect();
                    tracing::debug!(
                        sub_query = %sub_query.text,
                        results = chunks.len(),
                        "Sub-query retrieval complete"
                    );
                    metrics::record_retrieval(
                        started.elapsed().as_secs_f64(),
                        chunks.len(),
                        false,
                    );
                    return chunks;
                }
                Ok(Err(e)) if e.is_retryable() && attempt < self.max_retries => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Retrieval failed, retrying"
                    );
                    last_error = Some(e);
                }
                Ok(Err(e)) => {
                    last_error = Some(e);
                    break;
                }
                Err(_) => {
                    let timed_out = AppError::SearchTimeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    };
                    if attempt < self.max_retries {
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = self.max_retries,
                            "Retrieval timed out, retrying"
                        );
                    }
                    last_error = Some(timed_out);
                }
            }
        }

        if let Some(e) = last_error {
            tracing::warn!(
                sub_query = %sub_query.text,
                error = %e,
                "Sub-query degraded to empty result after retries"
            );
        }
        metrics::record_retrieval(started.elapsed().as_secs_f64(), 0, true);
        Vec::new()
    }
}
