//! Entity & metric extraction from raw query text
//!
//! Pulls company identifiers, fiscal years, and financial-metric mentions out
//! of a free-text question. Extraction never fails: a dimension with no
//! recognizable mention is simply an empty set.

use finsight_common::lexicon::{self, CompanyId, MetricKind};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Entities recognized in a query.
///
/// Ordered sets keep downstream decomposition deterministic for identical
/// inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitySet {
    pub companies: BTreeSet<CompanyId>,
    pub years: BTreeSet<i32>,
    pub metrics: BTreeSet<MetricKind>,
}

impl EntitySet {
    /// First company in canonical order, if any
    pub fn primary_company(&self) -> Option<CompanyId> {
        self.companies.iter().next().copied()
    }

    /// First metric in canonical order, if any
    pub fn primary_metric(&self) -> Option<MetricKind> {
        self.metrics.iter().next().copied()
    }

    /// Earliest mentioned year, if any
    pub fn earliest_year(&self) -> Option<i32> {
        self.years.iter().next().copied()
    }

    /// Latest mentioned year, if any
    pub fn latest_year(&self) -> Option<i32> {
        self.years.iter().next_back().copied()
    }
}

/// Extracts an [`EntitySet`] from raw query text.
///
/// Year recognition is bounds-checked against the configured plausible
/// filing range rather than trusting the 4-digit pattern alone, so dollar
/// figures that happen to contain four digits are rejected.
pub struct EntityExtractor {
    min_year: i32,
    max_year: i32,
    year_pattern: Regex,
}

impl EntityExtractor {
    /// Create an extractor for the given plausible year range.
    ///
    /// The range is validated by `AppConfig::validate` at startup; this
    /// constructor trusts it.
    pub fn new(min_year: i32, max_year: i32) -> Self {
        Self {
            min_year,
            max_year,
            // Word boundaries keep longer digit runs (e.g. "20235") out
            year_pattern: Regex::new(r"\b(\d{4})\b").expect("static year pattern"),
        }
    }

    /// Extract all recognizable entities. Never fails.
    pub fn extract(&self, query_text: &str) -> EntitySet {
        let query_lower = query_text.to_lowercase();

        let companies = lexicon::resolve_companies(&query_lower)
            .into_iter()
            .collect();

        let metrics = lexicon::resolve_metrics(&query_lower).into_iter().collect();

        let years = self
            .year_pattern
            .captures_iter(query_text)
            .filter_map(|caps| caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok()))
            .filter(|year| (self.min_year..=self.max_year).contains(year))
            .collect();

        EntitySet {
            companies,
            years,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> EntityExtractor {
        EntityExtractor::new(2020, 2025)
    }

    #[test]
    fn test_simple_query_extraction() {
        let entities = extractor().extract("What was Microsoft's revenue in 2023?");
        assert_eq!(
            entities.companies.iter().copied().collect::<Vec<_>>(),
            vec![CompanyId::Msft]
        );
        assert_eq!(entities.years.iter().copied().collect::<Vec<_>>(), vec![2023]);
        assert!(entities.metrics.contains(&MetricKind::Revenue));
    }

    #[test]
    fn test_two_companies_yield_two_entries() {
        let entities = extractor().extract("Compare Google and Microsoft revenue in 2024");
        assert!(entities.companies.len() >= 2);
    }

    #[test]
    fn test_years_outside_plausible_range_rejected() {
        let entities = extractor().extract("revenue was 4096 million in 1999 and 2023");
        assert_eq!(entities.years.iter().copied().collect::<Vec<_>>(), vec![2023]);
    }

    #[test]
    fn test_large_figures_not_mistaken_for_years() {
        // "2025" inside a longer digit run must not match
        let entities = extractor().extract("the company spent $120250 on lobbying");
        assert!(entities.years.is_empty());
    }

    #[test]
    fn test_duplicate_years_deduplicated() {
        let entities = extractor().extract("2023 versus 2023 revenue");
        assert_eq!(entities.years.len(), 1);
    }

    #[test]
    fn test_unrecognized_dimensions_are_empty_not_errors() {
        let entities = extractor().extract("tell me something interesting");
        assert!(entities.companies.is_empty());
        assert!(entities.years.is_empty());
        assert!(entities.metrics.is_empty());
    }

    #[test]
    fn test_year_range_extraction() {
        let entities = extractor().extract("How did NVIDIA's revenue grow from 2022 to 2023?");
        assert_eq!(entities.earliest_year(), Some(2022));
        assert_eq!(entities.latest_year(), Some(2023));
    }
}
