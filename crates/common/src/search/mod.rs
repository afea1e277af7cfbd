//! Vector search collaborator
//!
//! The engine never talks to an index directly; it goes through the
//! [`VectorSearch`] trait. Provides:
//! - The search interface with server-side metadata filters
//! - A Qdrant-backed implementation (REST API, query text embedded first)
//! - An in-memory implementation for tests and local development
//!
//! The upstream ingestion pipeline guarantees every indexed chunk carries
//! non-empty company, year, and section metadata; hits are passed through
//! without re-validation.

use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// A chunk returned from the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    /// Stable chunk identifier (the deduplication key)
    pub chunk_id: String,

    /// Chunk text
    pub content: String,

    /// Similarity score in [0, 1]
    pub score: f32,

    /// Issuer ticker, e.g. "MSFT"
    pub company: String,

    /// Filing year
    pub year: i32,

    /// 10-K section key, e.g. "md_a"
    pub section: Option<String>,

    /// Originating filing file
    pub source_file: String,
}

/// Server-side metadata filters for a search call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Restrict to one issuer ticker
    pub company: Option<String>,

    /// Restrict to one filing year
    pub year: Option<i32>,

    /// Restrict to one 10-K section key
    pub section: Option<String>,
}

impl SearchFilters {
    /// True when no filter dimension is set
    pub fn is_empty(&self) -> bool {
        self.company.is_none() && self.year.is_none() && self.section.is_none()
    }
}

/// Read-only similarity search over indexed filing chunks.
///
/// Assumed idempotent; may return fewer than `top_k` results.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Search for chunks similar to `query_text`, filtered server-side
    async fn search(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<ChunkHit>>;
}

/// Qdrant-backed vector search.
///
/// Embeds the query text via the configured [`Embedder`], then issues a
/// filtered points search against the Qdrant REST API.
pub struct QdrantSearch {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    embedder: Arc<dyn Embedder>,
}

#[derive(Deserialize)]
struct QdrantSearchResponse {
    result: Vec<QdrantScoredPoint>,
}

#[derive(Deserialize)]
struct QdrantScoredPoint {
    score: f32,
    payload: QdrantChunkPayload,
}

#[derive(Deserialize)]
struct QdrantChunkPayload {
    chunk_id: String,
    content: String,
    company: String,
    year: i32,
    section: Option<String>,
    source_file: String,
}

impl QdrantSearch {
    /// Create a new Qdrant search client
    pub fn new(
        base_url: String,
        collection: String,
        api_key: Option<String>,
        embedder: Arc<dyn Embedder>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection,
            api_key,
            embedder,
        })
    }

    /// Build the Qdrant `filter` clause from metadata filters
    fn build_filter(filters: &SearchFilters) -> Option<serde_json::Value> {
        let mut must = Vec::new();

        if let Some(company) = &filters.company {
            must.push(json!({ "key": "company", "match": { "value": company } }));
        }
        if let Some(year) = filters.year {
            must.push(json!({ "key": "year", "match": { "value": year } }));
        }
        if let Some(section) = &filters.section {
            must.push(json!({ "key": "section", "match": { "value": section } }));
        }

        if must.is_empty() {
            None
        } else {
            Some(json!({ "must": must }))
        }
    }
}

#[async_trait]
impl VectorSearch for QdrantSearch {
    async fn search(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<ChunkHit>> {
        let embedding = self.embedder.embed(query_text).await?;

        let mut body = json!({
            "vector": embedding,
            "limit": top_k,
            "with_payload": true,
        });
        if let Some(filter) = Self::build_filter(filters) {
            body["filter"] = filter;
        }

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await.map_err(|e| AppError::SearchError {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SearchError {
                message: format!("Qdrant error {}: {}", status, body),
            });
        }

        let parsed: QdrantSearchResponse =
            response.json().await.map_err(|e| AppError::SearchError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(parsed
            .result
            .into_iter()
            .map(|point| ChunkHit {
                chunk_id: point.payload.chunk_id,
                content: point.payload.content,
                score: point.score.clamp(0.0, 1.0),
                company: point.payload.company,
                year: point.payload.year,
                section: point.payload.section,
                source_file: point.payload.source_file,
            })
            .collect())
    }
}

/// In-memory vector search for tests and local development.
///
/// Scores are fixed per chunk; filters behave like Qdrant `must` clauses.
/// Lexical overlap with the query text breaks score ties so fixtures can
/// steer which chunks surface first.
#[derive(Default)]
pub struct InMemoryVectorSearch {
    chunks: Vec<ChunkHit>,
}

impl InMemoryVectorSearch {
    pub fn new(chunks: Vec<ChunkHit>) -> Self {
        Self { chunks }
    }

    fn matches(chunk: &ChunkHit, filters: &SearchFilters) -> bool {
        if let Some(company) = &filters.company {
            if &chunk.company != company {
                return false;
            }
        }
        if let Some(year) = filters.year {
            if chunk.year != year {
                return false;
            }
        }
        if let Some(section) = &filters.section {
            if chunk.section.as_deref() != Some(section.as_str()) {
                return false;
            }
        }
        true
    }

    fn overlap(content: &str, query_lower: &str) -> usize {
        let content_lower = content.to_lowercase();
        query_lower
            .split_whitespace()
            .filter(|word| word.len() > 3 && content_lower.contains(*word))
            .count()
    }
}

#[async_trait]
impl VectorSearch for InMemoryVectorSearch {
    async fn search(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<ChunkHit>> {
        let query_lower = query_text.to_lowercase();

        let mut hits: Vec<(usize, ChunkHit)> = self
            .chunks
            .iter()
            .filter(|chunk| Self::matches(chunk, filters))
            .map(|chunk| (Self::overlap(&chunk.content, &query_lower), chunk.clone()))
            .collect();

        hits.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.0.cmp(&a.0))
        });

        Ok(hits
            .into_iter()
            .take(top_k)
            .map(|(_, chunk)| chunk)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, company: &str, year: i32, score: f32) -> ChunkHit {
        ChunkHit {
            chunk_id: id.to_string(),
            content: format!("{} filing text", company),
            score,
            company: company.to_string(),
            year,
            section: Some("md_a".to_string()),
            source_file: format!("{}_10K_{}.html", company, year),
        }
    }

    #[test]
    fn test_filter_clause_construction() {
        let filters = SearchFilters {
            company: Some("MSFT".to_string()),
            year: Some(2023),
            section: None,
        };
        let clause = QdrantSearch::build_filter(&filters).unwrap();
        let must = clause["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[0]["key"], "company");
        assert_eq!(must[1]["match"]["value"], 2023);
    }

    #[test]
    fn test_empty_filters_produce_no_clause() {
        assert!(QdrantSearch::build_filter(&SearchFilters::default()).is_none());
    }

    #[tokio::test]
    async fn test_in_memory_filters() {
        let store = InMemoryVectorSearch::new(vec![
            hit("a", "MSFT", 2023, 0.9),
            hit("b", "MSFT", 2022, 0.8),
            hit("c", "NVDA", 2023, 0.7),
        ]);

        let filters = SearchFilters {
            company: Some("MSFT".to_string()),
            year: Some(2023),
            section: None,
        };
        let hits = store.search("revenue", &filters, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "a");
    }

    #[tokio::test]
    async fn test_in_memory_respects_top_k() {
        let store = InMemoryVectorSearch::new(vec![
            hit("a", "MSFT", 2023, 0.9),
            hit("b", "MSFT", 2023, 0.8),
            hit("c", "MSFT", 2023, 0.7),
        ]);

        let hits = store
            .search("revenue", &SearchFilters::default(), 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "a");
    }
}
