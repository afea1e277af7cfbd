//! Numeric figure extraction from retrieved passages
//!
//! Locates currency- and percentage-like tokens in chunk content, associates
//! each with the nearest preceding metric label, and normalizes magnitude
//! words into a canonical scale so figures are comparable. The label
//! association is a proximity heuristic, so every figure carries a confidence
//! score; downstream consumers threshold instead of trusting blindly.

use crate::retrieve::RetrievedChunk;
use finsight_common::lexicon::{CompanyId, MetricKind};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// How far back (in characters) a label may sit from its figure
const LABEL_WINDOW: usize = 120;

/// Magnitude of an extracted figure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Units,
    Thousands,
    Millions,
    Billions,
    Percent,
}

/// A numeric mention parsed out of chunk content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFigure {
    /// The matched text, verbatim
    pub raw_text: String,

    /// Parsed numeric value, in `scale` units
    pub value: f64,

    /// Magnitude the value was stated in
    pub scale: Scale,

    /// Issuer the source chunk belongs to
    pub company: Option<CompanyId>,

    /// Filing year of the source chunk
    pub year: i32,

    /// Nearest preceding metric label, if one sits within the window
    pub metric_hint: Option<MetricKind>,

    /// Heuristic extraction confidence in [0, 1]
    pub confidence: f32,
}

impl ExtractedFigure {
    /// Value normalized for comparison: millions for currency magnitudes,
    /// raw percentage points for percent figures.
    pub fn comparable_value(&self) -> f64 {
        match self.scale {
            Scale::Units => self.value / 1_000_000.0,
            Scale::Thousands => self.value / 1_000.0,
            Scale::Millions => self.value,
            Scale::Billions => self.value * 1_000.0,
            Scale::Percent => self.value,
        }
    }
}

/// Figure-recognition pass over retrieved chunks
pub struct FigureExtractor {
    pattern: Regex,
}

impl Default for FigureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FigureExtractor {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(
                r"(?i)\$?(\d{1,3}(?:,\d{3})*(?:\.\d+)?)(?:\s*(billion|million|thousand|percent|bn|[bmk]\b|%))?",
            )
            .expect("static figure pattern"),
        }
    }

    /// Extract every recognizable figure from a chunk. Unparsable tokens are
    /// skipped, never errors.
    pub fn extract(&self, chunk: &RetrievedChunk) -> Vec<ExtractedFigure> {
        let content_lower = chunk.content.to_lowercase();
        let mut figures = Vec::new();

        for caps in self.pattern.captures_iter(&chunk.content) {
            let (Some(full), Some(value_match)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            let Ok(value) = value_match.as_str().replace(',', "").parse::<f64>() else {
                continue;
            };

            let suffix = caps.get(2).map(|m| m.as_str().to_lowercase());
            let scale = match suffix.as_deref() {
                Some("billion") | Some("bn") | Some("b") => Scale::Billions,
                Some("million") | Some("m") => Scale::Millions,
                Some("thousand") | Some("k") => Scale::Thousands,
                Some("percent") | Some("%") => Scale::Percent,
                _ => Scale::Units,
            };

            let has_currency = full.as_str().starts_with('$');

            // A bare 4-digit token in the filing-year range is a year
            // mention, not a figure
            if scale == Scale::Units
                && !has_currency
                && value.fract() == 0.0
                && (1990.0..=2035.0).contains(&value)
                && !value_match.as_str().contains(',')
                && value_match.as_str().len() == 4
            {
                continue;
            }

            let metric_hint = nearest_label(&content_lower, full.start());
            let confidence = score_confidence(&metric_hint, scale, has_currency, value);

            figures.push(ExtractedFigure {
                raw_text: full.as_str().to_string(),
                value,
                scale,
                company: chunk.company,
                year: chunk.year,
                metric_hint: metric_hint.map(|(kind, _)| kind),
                confidence,
            });
        }

        figures
    }

    /// Extract figures from every chunk in evidence order
    pub fn extract_all(&self, chunks: &[RetrievedChunk]) -> Vec<ExtractedFigure> {
        chunks.iter().flat_map(|chunk| self.extract(chunk)).collect()
    }
}

/// Find the metric label nearest to (and preceding) the figure position.
///
/// Returns the metric and the gap in characters between label end and figure
/// start. Overlapping synonym matches (e.g. "data center revenue" contains
/// "revenue") resolve to the longer, more specific phrase.
fn nearest_label(content_lower: &str, figure_start: usize) -> Option<(MetricKind, usize)> {
    // Offsets come from the original content; lowercasing can shift byte
    // positions for non-ASCII text, in which case the label is skipped
    if figure_start > content_lower.len() || !content_lower.is_char_boundary(figure_start) {
        return None;
    }
    let mut window_start = figure_start.saturating_sub(LABEL_WINDOW);
    while window_start > 0 && !content_lower.is_char_boundary(window_start) {
        window_start -= 1;
    }
    let window = &content_lower[window_start..figure_start];

    let mut best: Option<(MetricKind, usize, usize)> = None; // (kind, end, len)
    for kind in MetricKind::ALL {
        for synonym in kind.synonyms() {
            let mut search_from = 0;
            while let Some(pos) = window[search_from..].find(synonym) {
                let start = search_from + pos;
                let end = start + synonym.len();
                let better = match best {
                    None => true,
                    Some((_, best_end, best_len)) => {
                        end > best_end || (end == best_end && synonym.len() > best_len)
                    }
                };
                if better {
                    best = Some((kind, end, synonym.len()));
                }
                search_from = end;
            }
        }
    }

    best.map(|(kind, end, _)| (kind, window.len() - end))
}

/// Score how much the association should be trusted
fn score_confidence(
    metric_hint: &Option<(MetricKind, usize)>,
    scale: Scale,
    has_currency: bool,
    value: f64,
) -> f32 {
    let mut confidence: f32 = 0.2;

    if let Some((_, gap)) = metric_hint {
        let proximity = 1.0 - (*gap as f32 / LABEL_WINDOW as f32).min(1.0);
        confidence += 0.3 * proximity;
    }

    if matches!(scale, Scale::Billions | Scale::Millions | Scale::Thousands) {
        confidence += 0.25;
    }

    if has_currency || scale == Scale::Percent {
        confidence += 0.15;
    }

    if value > 0.0 {
        confidence += 0.1;
    }

    confidence.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, company: CompanyId, year: i32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: "c1".to_string(),
            content: content.to_string(),
            score: 0.9,
            company: Some(company),
            year,
            section: None,
            source_file: "MSFT_10K_2023.html".to_string(),
        }
    }

    #[test]
    fn test_currency_with_magnitude() {
        let figures = FigureExtractor::new().extract(&chunk(
            "Total revenue was $211.9 billion for fiscal year 2023.",
            CompanyId::Msft,
            2023,
        ));

        let revenue = figures
            .iter()
            .find(|f| f.metric_hint == Some(MetricKind::Revenue))
            .expect("revenue figure");
        assert_eq!(revenue.scale, Scale::Billions);
        assert!((revenue.value - 211.9).abs() < f64::EPSILON);
        assert!((revenue.comparable_value() - 211_900.0).abs() < 0.1);
        assert!(revenue.confidence > 0.5);
    }

    #[test]
    fn test_comma_grouped_value() {
        let figures = FigureExtractor::new().extract(&chunk(
            "Net sales of $26,974 million compared with the prior year.",
            CompanyId::Nvda,
            2023,
        ));

        let sales = figures
            .iter()
            .find(|f| f.metric_hint == Some(MetricKind::Revenue))
            .expect("sales figure");
        assert!((sales.value - 26_974.0).abs() < f64::EPSILON);
        assert_eq!(sales.scale, Scale::Millions);
    }

    #[test]
    fn test_percentage_figure() {
        let figures = FigureExtractor::new().extract(&chunk(
            "Operating margin was 42% in the period.",
            CompanyId::Msft,
            2023,
        ));

        let margin = figures
            .iter()
            .find(|f| f.metric_hint == Some(MetricKind::OperatingMargin))
            .expect("margin figure");
        assert_eq!(margin.scale, Scale::Percent);
        assert!((margin.comparable_value() - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_specific_label_wins_over_contained_one() {
        let figures = FigureExtractor::new().extract(&chunk(
            "Data center revenue reached $15.0 billion in fiscal 2023.",
            CompanyId::Nvda,
            2023,
        ));

        assert_eq!(figures[0].metric_hint, Some(MetricKind::DataCenterRevenue));
    }

    #[test]
    fn test_bare_number_has_low_confidence() {
        let figures = FigureExtractor::new().extract(&chunk(
            "The board met 9 times during the period.",
            CompanyId::Googl,
            2023,
        ));

        assert!(!figures.is_empty());
        assert!(figures[0].confidence < 0.35);
        assert!(figures[0].metric_hint.is_none());
    }

    #[test]
    fn test_figures_inherit_chunk_metadata() {
        let figures = FigureExtractor::new().extract(&chunk(
            "Revenue was $100 million.",
            CompanyId::Googl,
            2022,
        ));
        assert!(figures.iter().all(|f| f.company == Some(CompanyId::Googl)));
        assert!(figures.iter().all(|f| f.year == 2022));
    }

    #[test]
    fn test_unparsable_content_yields_nothing() {
        let figures = FigureExtractor::new().extract(&chunk(
            "No numbers appear in this narrative discussion.",
            CompanyId::Msft,
            2023,
        ));
        assert!(figures.is_empty());
    }
}
