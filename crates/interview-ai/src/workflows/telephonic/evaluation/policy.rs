use super::super::domain::Decision;

/// Qualifies at or above the threshold. The AI never yields `Pending`.
pub(crate) fn decide(overall_score: u8, minimum_qualifying_score: u8) -> Decision {
    if overall_score >= minimum_qualifying_score {
        Decision::Qualified
    } else {
        Decision::NotQualified
    }
}
