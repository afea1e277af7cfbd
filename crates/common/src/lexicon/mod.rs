//! Lexicon - the closed vocabularies the query engine resolves against
//!
//! Provides:
//! - Supported issuers and their alias table (ticker, legal name, common name)
//! - Financial metric kinds and their synonym families
//! - 10-K section tags
//! - Lexical marker lists for query classification
//!
//! Everything here is immutable lookup data. Resolution is case-insensitive
//! and many-to-one; an unrecognized mention resolves to `None`, never an
//! error.

use serde::{Deserialize, Serialize};

/// Supported issuers, in canonical order.
///
/// The declaration order is the canonical ordering used for deterministic
/// cross-company decomposition and ranking tie-breaks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyId {
    /// Alphabet Inc. (GOOGL)
    Googl,
    /// Microsoft Corporation (MSFT)
    Msft,
    /// NVIDIA Corporation (NVDA)
    Nvda,
}

impl CompanyId {
    /// All supported issuers in canonical order
    pub const ALL: [CompanyId; 3] = [CompanyId::Googl, CompanyId::Msft, CompanyId::Nvda];

    /// Exchange ticker
    pub fn ticker(&self) -> &'static str {
        match self {
            CompanyId::Googl => "GOOGL",
            CompanyId::Msft => "MSFT",
            CompanyId::Nvda => "NVDA",
        }
    }

    /// Common display name
    pub fn display_name(&self) -> &'static str {
        match self {
            CompanyId::Googl => "Alphabet",
            CompanyId::Msft => "Microsoft",
            CompanyId::Nvda => "NVIDIA",
        }
    }

    /// Lowercase aliases that resolve to this issuer.
    ///
    /// Matching is substring-based over the lowercased query, so multi-word
    /// legal names work without tokenization.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            CompanyId::Googl => &["googl", "google", "alphabet"],
            CompanyId::Msft => &["msft", "microsoft"],
            CompanyId::Nvda => &["nvda", "nvidia"],
        }
    }

    /// Resolve a ticker string (as stored on chunk metadata) to an issuer
    pub fn from_ticker(ticker: &str) -> Option<Self> {
        match ticker.to_ascii_uppercase().as_str() {
            "GOOGL" => Some(CompanyId::Googl),
            "MSFT" => Some(CompanyId::Msft),
            "NVDA" => Some(CompanyId::Nvda),
            _ => None,
        }
    }
}

/// Canonical financial metric kinds, resolved via keyword families
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Revenue,
    NetIncome,
    OperatingIncome,
    OperatingMargin,
    GrossMargin,
    Cash,
    Debt,
    Assets,
    Equity,
    EarningsPerShare,
    DataCenterRevenue,
}

impl MetricKind {
    /// All metric kinds
    pub const ALL: [MetricKind; 11] = [
        MetricKind::Revenue,
        MetricKind::NetIncome,
        MetricKind::OperatingIncome,
        MetricKind::OperatingMargin,
        MetricKind::GrossMargin,
        MetricKind::Cash,
        MetricKind::Debt,
        MetricKind::Assets,
        MetricKind::Equity,
        MetricKind::EarningsPerShare,
        MetricKind::DataCenterRevenue,
    ];

    /// Human-readable label used to augment sub-query text
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Revenue => "revenue",
            MetricKind::NetIncome => "net income",
            MetricKind::OperatingIncome => "operating income",
            MetricKind::OperatingMargin => "operating margin",
            MetricKind::GrossMargin => "gross margin",
            MetricKind::Cash => "cash and equivalents",
            MetricKind::Debt => "total debt",
            MetricKind::Assets => "total assets",
            MetricKind::Equity => "stockholders equity",
            MetricKind::EarningsPerShare => "earnings per share",
            MetricKind::DataCenterRevenue => "data center revenue",
        }
    }

    /// Lowercase synonym family resolving to this metric.
    ///
    /// More specific metrics must list multi-word phrases so they win over
    /// their prefixes (e.g. "data center revenue" resolves before "revenue"
    /// only because both are kept as a set - extraction keeps every match).
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            MetricKind::Revenue => &["revenue", "revenues", "sales", "net sales", "total revenue"],
            MetricKind::NetIncome => &["net income", "profit", "earnings", "net profit"],
            MetricKind::OperatingIncome => {
                &["operating income", "operating profit", "operating earnings"]
            }
            MetricKind::OperatingMargin => &["operating margin", "operating profit margin"],
            MetricKind::GrossMargin => &["gross margin", "gross profit margin"],
            MetricKind::Cash => &["cash", "cash and equivalents", "cash position"],
            MetricKind::Debt => &["debt", "total debt", "long-term debt"],
            MetricKind::Assets => &["assets", "total assets"],
            MetricKind::Equity => &["equity", "shareholders equity", "stockholders equity"],
            MetricKind::EarningsPerShare => &["earnings per share", "eps"],
            MetricKind::DataCenterRevenue => {
                &["data center revenue", "datacenter revenue", "data center sales"]
            }
        }
    }

    /// Whether figures for this metric are percentages rather than currency
    pub fn is_percentage(&self) -> bool {
        matches!(self, MetricKind::OperatingMargin | MetricKind::GrossMargin)
    }
}

/// 10-K section tags carried on chunk metadata
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionTag {
    Business,
    RiskFactors,
    Properties,
    LegalProceedings,
    FinancialData,
    MdAndA,
    FinancialStatements,
    Controls,
}

impl SectionTag {
    /// The snake_case key used in chunk payloads
    pub fn as_key(&self) -> &'static str {
        match self {
            SectionTag::Business => "business",
            SectionTag::RiskFactors => "risk_factors",
            SectionTag::Properties => "properties",
            SectionTag::LegalProceedings => "legal_proceedings",
            SectionTag::FinancialData => "financial_data",
            SectionTag::MdAndA => "md_a",
            SectionTag::FinancialStatements => "financial_statements",
            SectionTag::Controls => "controls",
        }
    }

    /// Resolve a payload key back to a tag
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "business" => Some(SectionTag::Business),
            "risk_factors" => Some(SectionTag::RiskFactors),
            "properties" => Some(SectionTag::Properties),
            "legal_proceedings" => Some(SectionTag::LegalProceedings),
            "financial_data" => Some(SectionTag::FinancialData),
            "md_a" => Some(SectionTag::MdAndA),
            "financial_statements" => Some(SectionTag::FinancialStatements),
            "controls" => Some(SectionTag::Controls),
            _ => None,
        }
    }
}

/// Markers signalling temporal growth or change ("how did X grow...")
pub const GROWTH_MARKERS: &[&str] = &[
    "grow",
    "grew",
    "growth",
    "increase",
    "increased",
    "change",
    "changed",
    "decline",
    "declined",
    "decrease",
    "decreased",
    "drop",
    "fell",
];

/// Superlative / cross-company markers ("which company had the highest...")
pub const SUPERLATIVE_MARKERS: &[&str] = &[
    "highest",
    "lowest",
    "best",
    "worst",
    "most",
    "least",
    "greater",
    "better",
    "which company",
    "who had",
    "compare",
    "comparison",
    "versus",
    " vs ",
    "compared to",
];

/// Explicit arithmetic markers ("calculate the ratio of...")
pub const ARITHMETIC_MARKERS: &[&str] = &[
    "calculate",
    "compute",
    "growth rate",
    "percentage",
    "ratio",
    "difference between",
];

/// Resolve every issuer mentioned in the (lowercased) query text
pub fn resolve_companies(query_lower: &str) -> Vec<CompanyId> {
    CompanyId::ALL
        .iter()
        .copied()
        .filter(|company| {
            company
                .aliases()
                .iter()
                .any(|alias| query_lower.contains(alias))
        })
        .collect()
}

/// Resolve every metric mentioned in the (lowercased) query text
pub fn resolve_metrics(query_lower: &str) -> Vec<MetricKind> {
    MetricKind::ALL
        .iter()
        .copied()
        .filter(|metric| {
            metric
                .synonyms()
                .iter()
                .any(|synonym| query_lower.contains(synonym))
        })
        .collect()
}

/// Whether any marker in the list occurs in the (lowercased) query text
pub fn contains_marker(query_lower: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| query_lower.contains(marker))
}
