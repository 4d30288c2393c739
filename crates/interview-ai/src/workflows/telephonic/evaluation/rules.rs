use serde::{Deserialize, Serialize};

use super::super::domain::DimensionScores;
use super::super::settings::ScoringWeights;

/// One of the six dimensions the scorer grades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Communication,
    TechnicalKnowledge,
    ProblemSolving,
    Enthusiasm,
    Clarity,
    Professionalism,
}

/// Contribution of a single dimension, kept for audit trails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub dimension: Dimension,
    pub score: u8,
    pub weight: u8,
}

pub(crate) fn components(scores: &DimensionScores, weights: &ScoringWeights) -> Vec<ScoreComponent> {
    [
        (Dimension::Communication, scores.communication, weights.communication),
        (
            Dimension::TechnicalKnowledge,
            scores.technical_knowledge,
            weights.technical_knowledge,
        ),
        (
            Dimension::ProblemSolving,
            scores.problem_solving,
            weights.problem_solving,
        ),
        (Dimension::Enthusiasm, scores.enthusiasm, weights.enthusiasm),
        (Dimension::Clarity, scores.clarity, weights.clarity),
        (
            Dimension::Professionalism,
            scores.professionalism,
            weights.professionalism,
        ),
    ]
    .into_iter()
    .map(|(dimension, score, weight)| ScoreComponent {
        dimension,
        score: score.min(100),
        weight,
    })
    .collect()
}

/// `Σ score·weight / 100`, rounded half up. Computed on integers so that e.g. 74.5 never
/// drifts to 74 through float error.
pub(crate) fn weighted_overall(components: &[ScoreComponent]) -> u8 {
    let weighted: u32 = components
        .iter()
        .map(|component| u32::from(component.score) * u32::from(component.weight))
        .sum();
    ((weighted + 50) / 100).min(100) as u8
}
