//! Feature scoring by rank correlation

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{check_scope, stats};
use crate::experiment::ExperimentFrame;
use crate::scope::Scope;
use crate::Result;

/// Relative importance of each input for each measure.
///
/// Each measure's row sums to 1 unless every input scored zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScores {
    inputs: Vec<String>,
    measures: Vec<String>,
    /// `scores[m][i]` for measure `m` and input `i`.
    scores: Vec<Vec<f64>>,
}

impl FeatureScores {
    /// Scored inputs, in scope order.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    /// Scored measures, in scope order.
    #[must_use]
    pub fn measures(&self) -> &[String] {
        &self.measures
    }

    /// Score of one input for one measure.
    #[must_use]
    pub fn get(&self, measure: &str, input: &str) -> Option<f64> {
        let m = self.measures.iter().position(|n| n == measure)?;
        let i = self.inputs.iter().position(|n| n == input)?;
        Some(self.scores[m][i])
    }

    /// Inputs ranked by score for one measure, most influential first.
    #[must_use]
    pub fn ranking(&self, measure: &str) -> Vec<(&str, f64)> {
        let Some(m) = self.measures.iter().position(|n| n == measure) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&str, f64)> = self
            .inputs
            .iter()
            .map(String::as_str)
            .zip(self.scores[m].iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

impl fmt::Display for FeatureScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<28}", "measure")?;
        for input in &self.inputs {
            write!(f, " {:>12}", truncate(input, 12))?;
        }
        writeln!(f)?;
        for (measure, row) in self.measures.iter().zip(&self.scores) {
            write!(f, "{:<28}", truncate(measure, 28))?;
            for score in row {
                write!(f, " {score:>12.3}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub(super) fn truncate(text: &str, width: usize) -> &str {
    text.char_indices()
        .nth(width)
        .map_or(text, |(end, _)| &text[..end])
}

/// Score every non-constant input against every measure in `experiments`.
///
/// A score is the absolute Spearman rank correlation between input and
/// measure over the rows where both are present, normalized so each
/// measure's scores sum to 1.
///
/// Scores only capture monotone association. An input with a strong but
/// non-monotone effect (a peak mid-range, or one acting only through an
/// interaction) can score near zero, so read the ranking as a screening
/// aid, not as a measure of importance.
///
/// # Errors
///
/// Returns `ScopeMismatch` if `experiments` belongs to another scope.
pub fn feature_scores(scope: &Scope, experiments: &ExperimentFrame) -> Result<FeatureScores> {
    check_scope(scope, experiments)?;

    let inputs: Vec<(&str, &[f64])> = scope
        .parameters()
        .iter()
        .filter(|p| !p.is_constant())
        .filter_map(|p| experiments.column(p.name()).map(|c| (p.name(), c)))
        .collect();
    let measures: Vec<(&str, &[f64])> = scope
        .measures()
        .iter()
        .filter_map(|m| experiments.column(m.name()).map(|c| (m.name(), c)))
        .filter(|(_, c)| c.iter().any(|v| v.is_finite()))
        .collect();

    let scores = measures
        .iter()
        .map(|(_, y)| {
            let raw: Vec<f64> = inputs
                .iter()
                .map(|(_, x)| stats::spearman(x, y).abs())
                .collect();
            let total: f64 = raw.iter().sum();
            if total > 0.0 {
                raw.iter().map(|s| s / total).collect()
            } else {
                raw
            }
        })
        .collect();

    tracing::debug!(
        scope = %scope.name(),
        inputs = inputs.len(),
        measures = measures.len(),
        "computed feature scores"
    );
    Ok(FeatureScores {
        inputs: inputs.iter().map(|(n, _)| (*n).to_string()).collect(),
        measures: measures.iter().map(|(n, _)| (*n).to_string()).collect(),
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::Source;
    use crate::scope::{Measure, Parameter, ParameterType};

    fn scope() -> Scope {
        Scope::builder("toy")
            .parameter(Parameter::real("strong", ParameterType::Uncertainty, 0.0, 1.0))
            .parameter(Parameter::real("noise", ParameterType::Uncertainty, 0.0, 1.0))
            .parameter(Parameter::constant("fixed", 1.0))
            .measure(Measure::new("y"))
            .measure(Measure::new("empty"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_strong_input_dominates() {
        let mut frame =
            ExperimentFrame::new("toy", &["strong", "noise", "fixed", "y", "empty"]).unwrap();
        let wobble = [0.3, 0.9, 0.1, 0.7, 0.5, 0.2, 0.8, 0.4, 0.6, 0.0];
        for (i, w) in wobble.iter().enumerate() {
            let x = i as f64 / 9.0;
            frame
                .push_row(i as u64 + 1, Source::CoreModel, &[x, *w, 1.0, 3.0 * x, f64::NAN])
                .unwrap();
        }

        let scores = feature_scores(&scope(), &frame).unwrap();
        assert_eq!(scores.inputs(), ["strong", "noise"]);
        assert_eq!(scores.measures(), ["y"]);

        let ranking = scores.ranking("y");
        assert_eq!(ranking[0].0, "strong");
        let total: f64 = ranking.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(scores.get("y", "strong").unwrap() > 0.5);
        assert!(scores.to_string().contains("strong"));
    }

    #[test]
    fn test_constant_measure_scores_zero() {
        let mut frame = ExperimentFrame::new("toy", &["strong", "noise", "y"]).unwrap();
        for i in 0..5_u32 {
            let x = f64::from(i);
            frame.push_row(u64::from(i), Source::CoreModel, &[x, x, 2.0]).unwrap();
        }
        let scores = feature_scores(&scope(), &frame).unwrap();
        assert_eq!(scores.get("y", "strong"), Some(0.0));
    }

    #[test]
    fn test_symmetric_effect_is_invisible() {
        let mut frame = ExperimentFrame::new("toy", &["strong", "noise", "y"]).unwrap();
        let wobble = [0.3, 0.9, 0.1, 0.7, 0.5, 0.2, 0.8, 0.4, 0.6];
        for (i, w) in wobble.iter().enumerate() {
            let x = i as f64 / 8.0;
            let y = (x - 0.5).powi(2);
            frame.push_row(i as u64 + 1, Source::CoreModel, &[x, *w, y]).unwrap();
        }

        let scores = feature_scores(&scope(), &frame).unwrap();
        assert!(scores.get("y", "strong").unwrap() < 0.05);
    }

    #[test]
    fn test_other_scope_rejected() {
        let frame = ExperimentFrame::new("other", &["strong"]).unwrap();
        assert!(feature_scores(&scope(), &frame).is_err());
    }
}
