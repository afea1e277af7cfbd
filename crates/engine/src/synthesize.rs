//! Context synthesis
//!
//! Flattens the per-sub-query retrieval results into one deduplicated,
//! ranked, budget-bounded evidence set, extracts numeric figures from it,
//! and computes the derived quantities the query classification demands
//! (growth rates, deltas, cross-company rankings).
//!
//! Synthesis is a pure function over the joined retrieval results and never
//! raises on missing or unparsable figures - it degrades to textual evidence
//! alone and records the gap so the answer layer can surface "not found".

use crate::classify::QueryClassification;
use crate::decompose::SubQuery;
use crate::extract::EntitySet;
use crate::figures::{ExtractedFigure, FigureExtractor};
use crate::retrieve::RetrievedChunk;
use finsight_common::lexicon::{CompanyId, MetricKind};
use finsight_common::metrics;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Deduplicated, ranked, budget-bounded evidence.
///
/// Unique by `chunk_id`, ordered by descending score (ties keep original
/// retrieval order), bounded by a maximum count and an aggregate character
/// budget with lower-scored chunks dropped first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceSet {
    chunks: Vec<RetrievedChunk>,
}

impl EvidenceSet {
    /// Assemble evidence from joined retrieval results.
    ///
    /// First occurrence wins on duplicate `chunk_id`: sub-queries are issued
    /// in priority order, so the first carries the decisive score.
    pub fn assemble(
        results: &[(SubQuery, Vec<RetrievedChunk>)],
        max_chunks: usize,
        max_chars: usize,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut chunks: Vec<RetrievedChunk> = results
            .iter()
            .flat_map(|(_, chunks)| chunks.iter())
            .filter(|chunk| seen.insert(chunk.chunk_id.clone()))
            .cloned()
            .collect();

        // Stable sort keeps original retrieval order on ties
        chunks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        chunks.truncate(max_chunks);

        // Lower-scored chunks go first when the character budget overflows
        let mut total: usize = chunks.iter().map(|c| c.content.len()).sum();
        while total > max_chars {
            match chunks.pop() {
                Some(dropped) => total -= dropped.content.len(),
                None => break,
            }
        }

        Self { chunks }
    }

    pub fn chunks(&self) -> &[RetrievedChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Aggregate content size in characters
    pub fn total_chars(&self) -> usize {
        self.chunks.iter().map(|c| c.content.len()).sum()
    }

}

/// One company's entry in a cross-company ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub company: CompanyId,
    /// Comparable value: millions for currency metrics, points for margins
    pub value: f64,
}

/// A numeric result computed from extracted figures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedCalculation {
    GrowthRate {
        company: CompanyId,
        metric: MetricKind,
        from_year: i32,
        from_value: f64,
        to_year: i32,
        to_value: f64,
        /// Percent change from the earlier to the later year
        growth_pct: f64,
    },
    Delta {
        company: CompanyId,
        metric: MetricKind,
        from_year: i32,
        to_year: i32,
        /// Absolute change in comparable units
        delta: f64,
    },
    Ranking {
        metric: MetricKind,
        year: Option<i32>,
        /// Descending by value; ties keep canonical company order
        entries: Vec<RankingEntry>,
    },
}

impl DerivedCalculation {
    pub fn kind(&self) -> &'static str {
        match self {
            DerivedCalculation::GrowthRate { .. } => "growth_rate",
            DerivedCalculation::Delta { .. } => "delta",
            DerivedCalculation::Ranking { .. } => "ranking",
        }
    }
}

/// A calculation the evidence could not support.
///
/// Surfaced in the answer context so generation reports "not found" instead
/// of guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationGap {
    pub company: Option<CompanyId>,
    pub metric: Option<MetricKind>,
    /// Years for which no usable figure was extracted
    pub missing_years: Vec<i32>,
}

/// Result of a synthesis pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    pub evidence: EvidenceSet,
    pub calculations: Vec<DerivedCalculation>,
    pub gaps: Vec<CalculationGap>,
}

/// Synthesizes evidence and derived calculations from retrieval results
pub struct Synthesizer {
    max_chunks: usize,
    max_chars: usize,
    min_figure_confidence: f32,
    figures: FigureExtractor,
}

impl Synthesizer {
    pub fn new(max_chunks: usize, max_chars: usize, min_figure_confidence: f32) -> Self {
        Self {
            max_chunks,
            max_chars,
            min_figure_confidence,
            figures: FigureExtractor::new(),
        }
    }

    /// Synthesize the joined retrieval results. Never fails.
    pub fn synthesize(
        &self,
        entities: &EntitySet,
        classification: QueryClassification,
        results: &[(SubQuery, Vec<RetrievedChunk>)],
    ) -> SynthesisOutcome {
        let evidence = EvidenceSet::assemble(results, self.max_chunks, self.max_chars);
        let figures = self.figures.extract_all(evidence.chunks());

        let mut calculations = Vec::new();
        let mut gaps = Vec::new();

        match classification {
            QueryClassification::Comparative => {
                self.growth_rate(entities, &figures, &mut calculations, &mut gaps);
            }
            QueryClassification::CrossCompany => {
                self.ranking(entities, &figures, &mut calculations, &mut gaps);
            }
            QueryClassification::Calculation => {
                self.delta(entities, &figures, &mut calculations, &mut gaps);
            }
            QueryClassification::Simple => {}
        }

        for calculation in &calculations {
            metrics::record_calculation(calculation.kind());
        }

        SynthesisOutcome {
            evidence,
            calculations,
            gaps,
        }
    }

    /// Highest-confidence figure for the given company/metric/year, above
    /// the confidence floor. Ties keep the earliest extraction.
    fn best_figure<'a>(
        &self,
        figures: &'a [ExtractedFigure],
        company: CompanyId,
        metric: MetricKind,
        year: Option<i32>,
    ) -> Option<&'a ExtractedFigure> {
        figures
            .iter()
            .filter(|f| f.company == Some(company))
            .filter(|f| f.metric_hint == Some(metric))
            .filter(|f| year.map_or(true, |y| f.year == y))
            .filter(|f| f.confidence >= self.min_figure_confidence)
            .fold(None, |best: Option<&ExtractedFigure>, candidate| match best {
                Some(current) if current.confidence >= candidate.confidence => Some(current),
                _ => Some(candidate),
            })
    }

    /// GrowthRate for Comparative queries: earliest vs latest target year.
    /// No guessing - a missing year becomes a gap, not a number.
    fn growth_rate(
        &self,
        entities: &EntitySet,
        figures: &[ExtractedFigure],
        calculations: &mut Vec<DerivedCalculation>,
        gaps: &mut Vec<CalculationGap>,
    ) {
        let (Some(company), Some(from_year), Some(to_year)) = (
            entities.primary_company(),
            entities.earliest_year(),
            entities.latest_year(),
        ) else {
            return;
        };
        if from_year == to_year {
            return;
        }

        let Some(metric) = entities.primary_metric() else {
            gaps.push(CalculationGap {
                company: Some(company),
                metric: None,
                missing_years: vec![from_year, to_year],
            });
            return;
        };

        let earlier = self.best_figure(figures, company, metric, Some(from_year));
        let later = self.best_figure(figures, company, metric, Some(to_year));

        match (earlier, later) {
            (Some(earlier), Some(later)) if earlier.comparable_value() != 0.0 => {
                let from_value = earlier.comparable_value();
                let to_value = later.comparable_value();
                calculations.push(DerivedCalculation::GrowthRate {
                    company,
                    metric,
                    from_year,
                    from_value,
                    to_year,
                    to_value,
                    growth_pct: (to_value - from_value) / from_value * 100.0,
                });
            }
            (earlier, later) => {
                let mut missing_years = Vec::new();
                if earlier.is_none() {
                    missing_years.push(from_year);
                }
                if later.is_none() {
                    missing_years.push(to_year);
                }
                if missing_years.is_empty() {
                    // Both present but the base year is zero
                    missing_years.push(from_year);
                }
                gaps.push(CalculationGap {
                    company: Some(company),
                    metric: Some(metric),
                    missing_years,
                });
            }
        }
    }

    /// Ranking for CrossCompany queries: one figure per company, descending.
    /// Companies without a usable figure are reported as gaps.
    fn ranking(
        &self,
        entities: &EntitySet,
        figures: &[ExtractedFigure],
        calculations: &mut Vec<DerivedCalculation>,
        gaps: &mut Vec<CalculationGap>,
    ) {
        let year = entities.earliest_year();
        let Some(metric) = entities.primary_metric() else {
            return;
        };

        let companies: Vec<CompanyId> = if entities.companies.is_empty() {
            CompanyId::ALL.to_vec()
        } else {
            entities.companies.iter().copied().collect()
        };

        let mut entries = Vec::new();
        for company in companies {
            match self.best_figure(figures, company, metric, year) {
                Some(figure) => entries.push(RankingEntry {
                    company,
                    value: figure.comparable_value(),
                }),
                None => gaps.push(CalculationGap {
                    company: Some(company),
                    metric: Some(metric),
                    missing_years: year.into_iter().collect(),
                }),
            }
        }

        if entries.len() < 2 {
            return;
        }

        // Stable sort over canonical-order input preserves ties canonically
        entries.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        calculations.push(DerivedCalculation::Ranking {
            metric,
            year,
            entries,
        });
    }

    /// Delta for Calculation queries that still carry a two-year span
    fn delta(
        &self,
        entities: &EntitySet,
        figures: &[ExtractedFigure],
        calculations: &mut Vec<DerivedCalculation>,
        gaps: &mut Vec<CalculationGap>,
    ) {
        let (Some(company), Some(metric), Some(from_year), Some(to_year)) = (
            entities.primary_company(),
            entities.primary_metric(),
            entities.earliest_year(),
            entities.latest_year(),
        ) else {
            return;
        };
        if from_year == to_year {
            return;
        }

        let earlier = self.best_figure(figures, company, metric, Some(from_year));
        let later = self.best_figure(figures, company, metric, Some(to_year));

        match (earlier, later) {
            (Some(earlier), Some(later)) => {
                calculations.push(DerivedCalculation::Delta {
                    company,
                    metric,
                    from_year,
                    to_year,
                    delta: later.comparable_value() - earlier.comparable_value(),
                });
            }
            (earlier, later) => {
                let mut missing_years = Vec::new();
                if earlier.is_none() {
                    missing_years.push(from_year);
                }
                if later.is_none() {
                    missing_years.push(to_year);
                }
                gaps.push(CalculationGap {
                    company: Some(company),
                    metric: Some(metric),
                    missing_years,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figures::Scale;

    fn chunk(id: &str, content: &str, company: CompanyId, year: i32, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            score,
            company: Some(company),
            year,
            section: None,
            source_file: format!("{}_10K_{}.html", company.ticker(), year),
        }
    }

    fn sub(text: &str) -> SubQuery {
        SubQuery {
            text: text.to_string(),
            company: None,
            year: None,
            metric: None,
            section_filter: None,
        }
    }

    fn comparative_entities(company: CompanyId, years: &[i32], metric: MetricKind) -> EntitySet {
        EntitySet {
            companies: [company].into_iter().collect(),
            years: years.iter().copied().collect(),
            metrics: [metric].into_iter().collect(),
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let shared = chunk("dup", "Revenue was $100 million.", CompanyId::Msft, 2023, 0.9);
        let mut lower = shared.clone();
        lower.score = 0.5;

        let results = vec![
            (sub("first"), vec![shared]),
            (sub("second"), vec![lower]),
        ];
        let evidence = EvidenceSet::assemble(&results, 10, 10_000);

        assert_eq!(evidence.len(), 1);
        assert!((evidence.chunks()[0].score - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_evidence_ordered_by_descending_score() {
        let results = vec![(
            sub("q"),
            vec![
                chunk("a", "text a", CompanyId::Msft, 2023, 0.4),
                chunk("b", "text b", CompanyId::Msft, 2023, 0.9),
                chunk("c", "text c", CompanyId::Msft, 2023, 0.7),
            ],
        )];
        let evidence = EvidenceSet::assemble(&results, 10, 10_000);

        let scores: Vec<f32> = evidence.chunks().iter().map(|c| c.score).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn test_count_bound() {
        let chunks: Vec<RetrievedChunk> = (0..15)
            .map(|i| {
                chunk(
                    &format!("c{}", i),
                    "content",
                    CompanyId::Msft,
                    2023,
                    1.0 - i as f32 * 0.01,
                )
            })
            .collect();
        let evidence = EvidenceSet::assemble(&[(sub("q"), chunks)], 10, 100_000);
        assert_eq!(evidence.len(), 10);
    }

    #[test]
    fn test_character_budget_drops_lowest_scored_first() {
        let results = vec![(
            sub("q"),
            vec![
                chunk("high", &"x".repeat(600), CompanyId::Msft, 2023, 0.9),
                chunk("low", &"y".repeat(600), CompanyId::Msft, 2023, 0.5),
            ],
        )];
        let evidence = EvidenceSet::assemble(&results, 10, 1_000);

        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence.chunks()[0].chunk_id, "high");
        assert!(evidence.total_chars() <= 1_000);
    }

    #[test]
    fn test_growth_rate_twenty_percent() {
        let entities = comparative_entities(CompanyId::Nvda, &[2022, 2023], MetricKind::Revenue);
        let results = vec![
            (
                sub("2022"),
                vec![chunk(
                    "a",
                    "Revenue was $100 million in the year.",
                    CompanyId::Nvda,
                    2022,
                    0.9,
                )],
            ),
            (
                sub("2023"),
                vec![chunk(
                    "b",
                    "Revenue was $120 million in the year.",
                    CompanyId::Nvda,
                    2023,
                    0.9,
                )],
            ),
        ];

        let outcome = Synthesizer::new(10, 10_000, 0.35).synthesize(
            &entities,
            QueryClassification::Comparative,
            &results,
        );

        assert_eq!(outcome.calculations.len(), 1);
        match &outcome.calculations[0] {
            DerivedCalculation::GrowthRate { growth_pct, .. } => {
                assert!((growth_pct - 20.0).abs() < 1e-9);
            }
            other => panic!("expected growth rate, got {:?}", other),
        }
        assert!(outcome.gaps.is_empty());
    }

    #[test]
    fn test_missing_year_emits_gap_not_calculation() {
        let entities = comparative_entities(CompanyId::Nvda, &[2022, 2023], MetricKind::Revenue);
        // Only the 2023 figure is retrievable
        let results = vec![(
            sub("2023"),
            vec![chunk(
                "b",
                "Revenue was $120 million.",
                CompanyId::Nvda,
                2023,
                0.9,
            )],
        )];

        let outcome = Synthesizer::new(10, 10_000, 0.35).synthesize(
            &entities,
            QueryClassification::Comparative,
            &results,
        );

        assert!(outcome.calculations.is_empty());
        assert_eq!(outcome.gaps.len(), 1);
        assert_eq!(outcome.gaps[0].missing_years, vec![2022]);
    }

    #[test]
    fn test_ranking_orders_descending() {
        let entities = EntitySet {
            companies: Default::default(),
            years: [2023].into_iter().collect(),
            metrics: [MetricKind::OperatingMargin].into_iter().collect(),
        };
        let results = vec![
            (
                sub("googl"),
                vec![chunk(
                    "g",
                    "Operating margin was 27% for the year.",
                    CompanyId::Googl,
                    2023,
                    0.9,
                )],
            ),
            (
                sub("msft"),
                vec![chunk(
                    "m",
                    "Operating margin was 42% for the year.",
                    CompanyId::Msft,
                    2023,
                    0.9,
                )],
            ),
            (
                sub("nvda"),
                vec![chunk(
                    "n",
                    "Operating margin was 54% for the year.",
                    CompanyId::Nvda,
                    2023,
                    0.9,
                )],
            ),
        ];

        let outcome = Synthesizer::new(10, 10_000, 0.35).synthesize(
            &entities,
            QueryClassification::CrossCompany,
            &results,
        );

        assert_eq!(outcome.calculations.len(), 1);
        match &outcome.calculations[0] {
            DerivedCalculation::Ranking { entries, .. } => {
                assert_eq!(
                    entries.iter().map(|e| e.company).collect::<Vec<_>>(),
                    vec![CompanyId::Nvda, CompanyId::Msft, CompanyId::Googl]
                );
            }
            other => panic!("expected ranking, got {:?}", other),
        }
    }

    #[test]
    fn test_ranking_ties_keep_canonical_order() {
        let entities = EntitySet {
            companies: Default::default(),
            years: [2023].into_iter().collect(),
            metrics: [MetricKind::OperatingMargin].into_iter().collect(),
        };
        let results = vec![
            (
                sub("googl"),
                vec![chunk(
                    "g",
                    "Operating margin was 40% overall.",
                    CompanyId::Googl,
                    2023,
                    0.9,
                )],
            ),
            (
                sub("msft"),
                vec![chunk(
                    "m",
                    "Operating margin was 40% overall.",
                    CompanyId::Msft,
                    2023,
                    0.9,
                )],
            ),
        ];

        let outcome = Synthesizer::new(10, 10_000, 0.35).synthesize(
            &entities,
            QueryClassification::CrossCompany,
            &results,
        );

        match &outcome.calculations[0] {
            DerivedCalculation::Ranking { entries, .. } => {
                // Equal values: GOOGL precedes MSFT canonically
                assert_eq!(entries[0].company, CompanyId::Googl);
                assert_eq!(entries[1].company, CompanyId::Msft);
            }
            other => panic!("expected ranking, got {:?}", other),
        }
        // NVDA never produced a figure and is reported as a gap
        assert!(outcome
            .gaps
            .iter()
            .any(|g| g.company == Some(CompanyId::Nvda)));
    }

    #[test]
    fn test_low_confidence_figures_suppressed() {
        let entities = comparative_entities(CompanyId::Nvda, &[2022, 2023], MetricKind::Revenue);
        // Bare numbers with no label or magnitude score below the floor
        let results = vec![
            (
                sub("2022"),
                vec![chunk("a", "The figure 100 appeared.", CompanyId::Nvda, 2022, 0.9)],
            ),
            (
                sub("2023"),
                vec![chunk("b", "The figure 120 appeared.", CompanyId::Nvda, 2023, 0.9)],
            ),
        ];

        let outcome = Synthesizer::new(10, 10_000, 0.35).synthesize(
            &entities,
            QueryClassification::Comparative,
            &results,
        );

        assert!(outcome.calculations.is_empty());
        assert!(!outcome.gaps.is_empty());
    }

    #[test]
    fn test_scale_comparability() {
        // 0.1 billion vs 120 million: growth must be computed in one unit
        let figure_billion = ExtractedFigure {
            raw_text: "$0.1 billion".to_string(),
            value: 0.1,
            scale: Scale::Billions,
            company: Some(CompanyId::Nvda),
            year: 2022,
            metric_hint: Some(MetricKind::Revenue),
            confidence: 0.9,
        };
        assert!((figure_billion.comparable_value() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_simple_classification_computes_nothing() {
        let entities = EntitySet::default();
        let results = vec![(
            sub("q"),
            vec![chunk("a", "Revenue was $100 million.", CompanyId::Msft, 2023, 0.9)],
        )];

        let outcome = Synthesizer::new(10, 10_000, 0.35).synthesize(
            &entities,
            QueryClassification::Simple,
            &results,
        );

        assert!(outcome.calculations.is_empty());
        assert_eq!(outcome.evidence.len(), 1);
    }
}
