//! Answer context assembly
//!
//! Serializes the final evidence set, computed figures, and data gaps into
//! the bounded payload handed to the generation collaborator. Attribution
//! (company, year, section, source file) rides along with every excerpt so
//! generated answers can cite their sources.
//!
//! When the rendered context overflows the configured budget, whole chunks
//! are dropped in ascending-score order - never mid-chunk truncation.

use crate::classify::QueryClassification;
use crate::synthesize::{CalculationGap, DerivedCalculation, SynthesisOutcome};
use finsight_common::lexicon::{CompanyId, MetricKind, SectionTag};
use serde::{Deserialize, Serialize};

/// Where an excerpt came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub company: Option<CompanyId>,
    pub year: i32,
    pub section: Option<SectionTag>,
    pub source_file: String,
}

/// One evidence excerpt with its attribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Excerpt {
    pub content: String,
    pub score: f32,
    pub attribution: SourceAttribution,
}

/// The payload handed to the generation collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerContext {
    pub original_query: String,
    pub classification: QueryClassification,
    /// Ordered by descending relevance
    pub excerpts: Vec<Excerpt>,
    pub calculations: Vec<DerivedCalculation>,
    pub gaps: Vec<CalculationGap>,
}

impl AnswerContext {
    /// Serialize for the generation prompt
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        parts.push(format!("Query: {}", self.original_query));
        parts.push(format!("Query Type: {}", self.classification.as_str()));
        parts.push(String::new());

        for (i, excerpt) in self.excerpts.iter().enumerate() {
            let company = excerpt
                .attribution
                .company
                .map(|c| c.ticker())
                .unwrap_or("UNKNOWN");
            let section = excerpt
                .attribution
                .section
                .map(|s| s.as_key())
                .unwrap_or("general");
            parts.push(format!("### Relevant Information {}", i + 1));
            parts.push(format!(
                "**Source**: {} {} ({}) [{}]",
                company, excerpt.attribution.year, section, excerpt.attribution.source_file
            ));
            parts.push(format!("**Relevance**: {:.3}", excerpt.score));
            parts.push(format!("**Content**: {}", excerpt.content));
            parts.push(String::new());
        }

        if !self.calculations.is_empty() {
            parts.push("### Computed Figures".to_string());
            for calculation in &self.calculations {
                parts.push(format!("- {}", describe_calculation(calculation)));
            }
            parts.push(String::new());
        }

        if !self.gaps.is_empty() {
            parts.push("### Data Not Found".to_string());
            for gap in &self.gaps {
                parts.push(format!("- {}", describe_gap(gap)));
            }
            parts.push(String::new());
        }

        parts.join("\n")
    }
}

fn value_with_unit(value: f64, metric: MetricKind) -> String {
    if metric.is_percentage() {
        format!("{:.1}%", value)
    } else {
        format!("${:.1} million", value)
    }
}

fn describe_calculation(calculation: &DerivedCalculation) -> String {
    match calculation {
        DerivedCalculation::GrowthRate {
            company,
            metric,
            from_year,
            from_value,
            to_year,
            to_value,
            growth_pct,
        } => format!(
            "{} {} grew {:.1}% from {} ({}) to {} ({})",
            company.display_name(),
            metric.label(),
            growth_pct,
            from_year,
            value_with_unit(*from_value, *metric),
            to_year,
            value_with_unit(*to_value, *metric),
        ),
        DerivedCalculation::Delta {
            company,
            metric,
            from_year,
            to_year,
            delta,
        } => format!(
            "{} {} changed by {} between {} and {}",
            company.display_name(),
            metric.label(),
            value_with_unit(*delta, *metric),
            from_year,
            to_year,
        ),
        DerivedCalculation::Ranking {
            metric,
            year,
            entries,
        } => {
            let ranked = entries
                .iter()
                .enumerate()
                .map(|(i, entry)| {
                    format!(
                        "{}. {} ({})",
                        i + 1,
                        entry.company.display_name(),
                        value_with_unit(entry.value, *metric)
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            match year {
                Some(year) => format!("{} ranking for {}: {}", metric.label(), year, ranked),
                None => format!("{} ranking: {}", metric.label(), ranked),
            }
        }
    }
}

fn describe_gap(gap: &CalculationGap) -> String {
    let metric = gap.metric.map(|m| m.label()).unwrap_or("requested metric");
    let company = gap
        .company
        .map(|c| c.display_name())
        .unwrap_or("the requested company");
    if gap.missing_years.is_empty() {
        format!("No usable {} figure found for {}", metric, company)
    } else {
        let years = gap
            .missing_years
            .iter()
            .map(|y| y.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("No usable {} figure found for {} ({})", metric, company, years)
    }
}

/// Assembles answer contexts under the configured character budget
pub struct AnswerContextBuilder {
    max_context_chars: usize,
}

impl AnswerContextBuilder {
    pub fn new(max_context_chars: usize) -> Self {
        Self { max_context_chars }
    }

    /// Build the final context from a synthesis outcome.
    ///
    /// The evidence set already respects the budget on raw content; this
    /// re-checks the rendered payload (attribution and calculation text
    /// included) and drops the lowest-scored excerpts until it fits.
    pub fn build(
        &self,
        query_text: &str,
        classification: QueryClassification,
        outcome: SynthesisOutcome,
    ) -> AnswerContext {
        let SynthesisOutcome {
            evidence,
            calculations,
            gaps,
        } = outcome;

        let excerpts = evidence
            .chunks()
            .iter()
            .map(|chunk| Excerpt {
                content: chunk.content.clone(),
                score: chunk.score,
                attribution: SourceAttribution {
                    company: chunk.company,
                    year: chunk.year,
                    section: chunk.section,
                    source_file: chunk.source_file.clone(),
                },
            })
            .collect();

        let mut context = AnswerContext {
            original_query: query_text.to_string(),
            classification,
            excerpts,
            calculations,
            gaps,
        };

        while context.render().len() > self.max_context_chars && !context.excerpts.is_empty() {
            let dropped = context.excerpts.pop();
            if let Some(dropped) = dropped {
                tracing::debug!(
                    chunk_score = dropped.score,
                    "Dropped excerpt to fit context budget"
                );
            }
        }

        context
    }
}
