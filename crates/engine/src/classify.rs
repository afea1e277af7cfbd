//! Query classification
//!
//! Labels a query as Simple, Comparative (temporal), CrossCompany, or
//! Calculation-bearing from the extracted entities and lexical cues alone.
//! A pure function of its inputs: no external calls, deterministic, and the
//! priority order below is load-bearing - a query can satisfy several
//! categories' surface patterns at once, and the first match wins.

use crate::extract::EntitySet;
use finsight_common::lexicon::{
    self, ARITHMETIC_MARKERS, GROWTH_MARKERS, SUPERLATIVE_MARKERS,
};
use serde::{Deserialize, Serialize};

/// The shape of a user query, driving decomposition strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryClassification {
    /// One company/year/metric lookup
    Simple,
    /// One company across two or more years (growth, change)
    Comparative,
    /// Multiple companies, or a superlative over the supported set
    CrossCompany,
    /// Explicit arithmetic without a temporal range
    Calculation,
}

impl QueryClassification {
    /// Label used for metrics and structured logging
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryClassification::Simple => "simple",
            QueryClassification::Comparative => "comparative",
            QueryClassification::CrossCompany => "cross_company",
            QueryClassification::Calculation => "calculation",
        }
    }
}

/// Classify a query. First match wins, evaluated in this priority:
///
/// 1. growth/change markers with exactly one company and two or more years
///    -> Comparative
/// 2. two or more companies, or a superlative marker -> CrossCompany
/// 3. an arithmetic marker without a year range -> Calculation
/// 4. otherwise -> Simple
pub fn classify(entities: &EntitySet, query_text: &str) -> QueryClassification {
    let query_lower = query_text.to_lowercase();

    if lexicon::contains_marker(&query_lower, GROWTH_MARKERS)
        && entities.companies.len() == 1
        && entities.years.len() >= 2
    {
        return QueryClassification::Comparative;
    }

    if entities.companies.len() >= 2
        || lexicon::contains_marker(&query_lower, SUPERLATIVE_MARKERS)
    {
        return QueryClassification::CrossCompany;
    }

    if lexicon::contains_marker(&query_lower, ARITHMETIC_MARKERS) && entities.years.len() < 2 {
        return QueryClassification::Calculation;
    }

    QueryClassification::Simple
}
