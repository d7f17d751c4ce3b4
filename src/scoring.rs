//! Artist-venue match scoring.
//!
//! A match score is a weighted mean of five factors, each assessed on a 0-10
//! scale, scaled to 0-100.

use crate::error::{GigmatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Assessed factors for one artist-venue pair, each in `[0, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchFactors {
    pub genre_compatibility: f64,
    pub audience_size: f64,
    pub ticket_sales_history: f64,
    pub financial_viability: f64,
    pub regional_demand: f64,
}

impl MatchFactors {
    fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("genre_compatibility", self.genre_compatibility),
            ("audience_size", self.audience_size),
            ("ticket_sales_history", self.ticket_sales_history),
            ("financial_viability", self.financial_viability),
            ("regional_demand", self.regional_demand),
        ]
    }
}

/// Relative weight of each factor. Normalised by their sum when scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub genre_compatibility: f64,
    pub audience_size: f64,
    pub ticket_sales_history: f64,
    pub financial_viability: f64,
    pub regional_demand: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            genre_compatibility: 0.30,
            audience_size: 0.20,
            ticket_sales_history: 0.20,
            financial_viability: 0.15,
            regional_demand: 0.15,
        }
    }
}

impl ScoringWeights {
    fn as_array(&self) -> [f64; 5] {
        [
            self.genre_compatibility,
            self.audience_size,
            self.ticket_sales_history,
            self.financial_viability,
            self.regional_demand,
        ]
    }
}

/// Qualitative band for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchGrade {
    Excellent,
    Strong,
    Fair,
    Weak,
}

impl MatchGrade {
    fn for_score(value: f64) -> Self {
        if value >= 80.0 {
            MatchGrade::Excellent
        } else if value >= 65.0 {
            MatchGrade::Strong
        } else if value >= 45.0 {
            MatchGrade::Fair
        } else {
            MatchGrade::Weak
        }
    }
}

impl fmt::Display for MatchGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchGrade::Excellent => "Excellent",
            MatchGrade::Strong => "Strong",
            MatchGrade::Fair => "Fair",
            MatchGrade::Weak => "Weak",
        };
        f.write_str(label)
    }
}

/// A computed score in `[0, 100]`, rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    pub value: f64,
    pub grade: MatchGrade,
}

/// A scored artist-venue pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub artist: String,
    pub venue: String,
    pub factors: MatchFactors,
    pub score: MatchScore,
}

/// Compute the weighted match score.
pub fn score(factors: &MatchFactors, weights: &ScoringWeights) -> Result<MatchScore> {
    for (name, value) in factors.named() {
        if !value.is_finite() || !(0.0..=10.0).contains(&value) {
            return Err(GigmatchError::Scoring(format!(
                "{} must be between 0 and 10, got {}",
                name, value
            )));
        }
    }

    let weights = weights.as_array();
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(GigmatchError::Scoring(
            "Weights must be finite and non-negative".to_string(),
        ));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(GigmatchError::Scoring(
            "Weights must sum to a positive value".to_string(),
        ));
    }

    let weighted: f64 = factors
        .named()
        .iter()
        .zip(weights.iter())
        .map(|((_, value), weight)| value * weight)
        .sum();

    let value = ((weighted / total) * 100.0).round() / 10.0;
    Ok(MatchScore {
        value,
        grade: MatchGrade::for_score(value),
    })
}

/// Render scored pairs as a markdown table, best match first.
pub fn render_ranking_table(matches: &[ScoredMatch]) -> String {
    let mut sorted: Vec<&ScoredMatch> = matches.iter().collect();
    sorted.sort_by(|a, b| b.score.value.total_cmp(&a.score.value));

    let mut out = String::from(
        "| Rank | Artist | Venue | Score | Grade |\n|---:|---|---|---:|---|\n",
    );
    for (i, m) in sorted.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} | {:.1} | {} |\n",
            i + 1,
            escape_cell(&m.artist),
            escape_cell(&m.venue),
            m.score.value,
            m.score.grade
        ));
    }
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors(value: f64) -> MatchFactors {
        MatchFactors {
            genre_compatibility: value,
            audience_size: value,
            ticket_sales_history: value,
            financial_viability: value,
            regional_demand: value,
        }
    }

    fn scored(artist: &str, venue: &str, value: f64) -> ScoredMatch {
        let factors = factors(value);
        ScoredMatch {
            artist: artist.to_string(),
            venue: venue.to_string(),
            factors,
            score: score(&factors, &ScoringWeights::default()).unwrap(),
        }
    }

    #[test]
    fn test_uniform_factors_scale_to_percent() {
        let result = score(&factors(7.0), &ScoringWeights::default()).unwrap();
        assert_eq!(result.value, 70.0);
        assert_eq!(result.grade, MatchGrade::Strong);
    }

    #[test]
    fn test_weights_are_normalised() {
        let f = MatchFactors {
            genre_compatibility: 10.0,
            audience_size: 0.0,
            ticket_sales_history: 0.0,
            financial_viability: 0.0,
            regional_demand: 0.0,
        };
        let doubled = ScoringWeights {
            genre_compatibility: 0.6,
            audience_size: 0.4,
            ticket_sales_history: 0.4,
            financial_viability: 0.3,
            regional_demand: 0.3,
        };
        let a = score(&f, &ScoringWeights::default()).unwrap();
        let b = score(&f, &doubled).unwrap();
        assert_eq!(a.value, 30.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_rounds_to_one_decimal() {
        let f = MatchFactors {
            genre_compatibility: 9.0,
            audience_size: 7.0,
            ticket_sales_history: 6.0,
            financial_viability: 8.0,
            regional_demand: 5.0,
        };
        // 2.7 + 1.4 + 1.2 + 1.2 + 0.75 = 7.25
        let result = score(&f, &ScoringWeights::default()).unwrap();
        assert!((result.value - 72.5).abs() < 1e-9);
    }

    #[test]
    fn test_grade_bands() {
        assert_eq!(MatchGrade::for_score(80.0), MatchGrade::Excellent);
        assert_eq!(MatchGrade::for_score(79.9), MatchGrade::Strong);
        assert_eq!(MatchGrade::for_score(45.0), MatchGrade::Fair);
        assert_eq!(MatchGrade::for_score(44.9), MatchGrade::Weak);
    }

    #[test]
    fn test_out_of_range_factor_rejected() {
        let mut f = factors(5.0);
        f.regional_demand = 11.0;
        let err = score(&f, &ScoringWeights::default()).unwrap_err();
        assert!(err.to_string().contains("regional_demand"));

        f.regional_demand = f64::NAN;
        assert!(score(&f, &ScoringWeights::default()).is_err());
    }

    #[test]
    fn test_zero_weights_rejected() {
        let zero = ScoringWeights {
            genre_compatibility: 0.0,
            audience_size: 0.0,
            ticket_sales_history: 0.0,
            financial_viability: 0.0,
            regional_demand: 0.0,
        };
        assert!(matches!(
            score(&factors(5.0), &zero),
            Err(GigmatchError::Scoring(_))
        ));
    }

    #[test]
    fn test_ranking_table_sorted_by_score() {
        let table = render_ranking_table(&[
            scored("Iron Tide", "Blue Room", 4.0),
            scored("Echo Valley", "The Roundhouse", 9.0),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "| 1 | Echo Valley | The Roundhouse | 90.0 | Excellent |");
        assert_eq!(lines[3], "| 2 | Iron Tide | Blue Room | 40.0 | Weak |");
    }

    #[test]
    fn test_weights_deserialize_partially() {
        let weights: ScoringWeights = toml::from_str("genre_compatibility = 0.5").unwrap();
        assert_eq!(weights.genre_compatibility, 0.5);
        assert_eq!(weights.audience_size, 0.20);
    }
}
