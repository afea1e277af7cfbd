//! Query decomposition
//!
//! Turns a classified query into an ordered set of atomic sub-queries, each
//! scoped to one company/year/metric combination with retrieval filters
//! attached. Ordering is deterministic: Comparative sub-queries run years
//! ascending, CrossCompany sub-queries run companies in canonical order.

use crate::classify::QueryClassification;
use crate::extract::EntitySet;
use finsight_common::lexicon::{CompanyId, MetricKind, SectionTag};
use serde::{Deserialize, Serialize};

/// An atomic, filter-scoped retrieval request. Immutable once issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubQuery {
    /// Retrieval text: the original query augmented with resolved entity
    /// labels, biasing vector similarity without discarding phrasing
    pub text: String,

    /// Server-side company filter
    pub company: Option<CompanyId>,

    /// Server-side year filter
    pub year: Option<i32>,

    /// Metric this sub-query targets (not a server-side filter)
    pub metric: Option<MetricKind>,

    /// Server-side section filter
    pub section_filter: Option<SectionTag>,
}

impl SubQuery {
    fn new(
        query_text: &str,
        company: Option<CompanyId>,
        year: Option<i32>,
        metric: Option<MetricKind>,
    ) -> Self {
        Self {
            text: augment(query_text, company, year, metric),
            company,
            year,
            metric,
            section_filter: None,
        }
    }
}

/// Augment the original query with resolved entity labels
fn augment(
    query_text: &str,
    company: Option<CompanyId>,
    year: Option<i32>,
    metric: Option<MetricKind>,
) -> String {
    let mut text = query_text.trim().to_string();
    if let Some(company) = company {
        text.push(' ');
        text.push_str(company.display_name());
    }
    if let Some(metric) = metric {
        text.push(' ');
        text.push_str(metric.label());
    }
    if let Some(year) = year {
        text.push(' ');
        text.push_str(&year.to_string());
    }
    text
}

/// Decompose a classified query into ordered sub-queries.
///
/// When a classification's required dimension is missing, decomposition
/// falls back to the Simple shape using whatever entities exist; absent
/// entities mean unfiltered retrieval along that dimension.
pub fn decompose(
    entities: &EntitySet,
    classification: QueryClassification,
    query_text: &str,
) -> Vec<SubQuery> {
    match classification {
        QueryClassification::Comparative => decompose_comparative(entities, query_text),
        QueryClassification::CrossCompany => decompose_cross_company(entities, query_text),
        QueryClassification::Simple | QueryClassification::Calculation => {
            vec![decompose_simple(entities, query_text)]
        }
    }
}

/// One sub-query, filtered by whichever entities resolved
fn decompose_simple(entities: &EntitySet, query_text: &str) -> SubQuery {
    SubQuery::new(
        query_text,
        entities.primary_company(),
        entities.earliest_year(),
        entities.primary_metric(),
    )
}

/// One sub-query per (company, year) pair, years ascending
fn decompose_comparative(entities: &EntitySet, query_text: &str) -> Vec<SubQuery> {
    let Some(company) = entities.primary_company() else {
        return vec![decompose_simple(entities, query_text)];
    };
    if entities.years.len() < 2 {
        return vec![decompose_simple(entities, query_text)];
    }

    let metric = entities.primary_metric();
    entities
        .years
        .iter()
        .map(|&year| SubQuery::new(query_text, Some(company), Some(year), metric))
        .collect()
}

/// One sub-query per company for the target year, canonical company order
fn decompose_cross_company(entities: &EntitySet, query_text: &str) -> Vec<SubQuery> {
    let year = entities.earliest_year();
    let metric = entities.primary_metric();

    // A superlative over no named issuers spans the whole supported set
    let companies: Vec<CompanyId> = if entities.companies.is_empty() {
        CompanyId::ALL.to_vec()
    } else {
        entities.companies.iter().copied().collect()
    };

    companies
        .into_iter()
        .map(|company| SubQuery::new(query_text, Some(company), year, metric))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::extract::EntityExtractor;

    fn plan(query: &str) -> (QueryClassification, Vec<SubQuery>) {
        let entities = EntityExtractor::new(2020, 2025).extract(query);
        let classification = classify(&entities, query);
        (classification, decompose(&entities, classification, query))
    }

    #[test]
    fn test_simple_yields_exactly_one() {
        let (_, subs) = plan("What was Microsoft's revenue in 2023?");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].company, Some(CompanyId::Msft));
        assert_eq!(subs[0].year, Some(2023));
        assert_eq!(subs[0].metric, Some(MetricKind::Revenue));
    }

    #[test]
    fn test_comparative_yields_one_per_year_ascending() {
        let (classification, subs) = plan("How did NVIDIA's revenue grow from 2022 to 2023?");
        assert_eq!(classification, QueryClassification::Comparative);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].year, Some(2022));
        assert_eq!(subs[1].year, Some(2023));
        assert!(subs.iter().all(|s| s.company == Some(CompanyId::Nvda)));
    }

    #[test]
    fn test_cross_company_covers_supported_set_in_canonical_order() {
        let (classification, subs) = plan("Which company had the highest operating margin in 2023?");
        assert_eq!(classification, QueryClassification::CrossCompany);
        assert_eq!(subs.len(), 3);
        assert_eq!(
            subs.iter().map(|s| s.company.unwrap()).collect::<Vec<_>>(),
            vec![CompanyId::Googl, CompanyId::Msft, CompanyId::Nvda]
        );
        assert!(subs.iter().all(|s| s.year == Some(2023)));
    }

    #[test]
    fn test_cross_company_named_issuers_only() {
        let (_, subs) = plan("Compare Google and Microsoft revenue in 2024");
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].company, Some(CompanyId::Googl));
        assert_eq!(subs[1].company, Some(CompanyId::Msft));
    }

    #[test]
    fn test_missing_dimension_falls_back_to_simple() {
        // Growth markers and two years, but no resolvable company: the
        // decomposer must not fail, just degrade to one sub-query.
        let entities = EntityExtractor::new(2020, 2025)
            .extract("how did revenue grow from 2022 to 2023");
        let subs = decompose(&entities, QueryClassification::Comparative, "how did revenue grow");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].company, None);
    }

    #[test]
    fn test_sub_query_text_keeps_original_phrasing() {
        let (_, subs) = plan("What was Microsoft's revenue in 2023?");
        assert!(subs[0].text.starts_with("What was Microsoft's revenue in 2023?"));
        assert!(subs[0].text.contains("Microsoft"));
        assert!(subs[0].text.contains("2023"));
    }

    #[test]
    fn test_deterministic_ordering_for_identical_inputs() {
        let (_, first) = plan("Which company had the highest operating margin in 2023?");
        let (_, second) = plan("Which company had the highest operating margin in 2023?");
        assert_eq!(first, second);
    }
}
