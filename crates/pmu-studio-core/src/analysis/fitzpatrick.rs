//! Fitzpatrick classification from the intake questionnaire.
//!
//! Ten questions (eye colour, hair colour, sun reaction, ...) are each answered
//! on a 0-4 scale. The summed score maps onto a phototype by fixed bands.

use crate::models::FitzpatrickType;

use super::{AnalysisError, AnalysisResult};

/// Number of questions on the intake questionnaire.
pub const QUESTION_COUNT: usize = 10;

/// Highest allowed answer value per question.
pub const MAX_ANSWER: u8 = 4;

/// Upper bound (inclusive) of each score band, lightest type first.
const SCORE_BANDS: [(u32, FitzpatrickType); 6] = [
    (7, FitzpatrickType::I),
    (16, FitzpatrickType::II),
    (24, FitzpatrickType::III),
    (30, FitzpatrickType::IV),
    (35, FitzpatrickType::V),
    (40, FitzpatrickType::VI),
];

/// Map a total questionnaire score to a phototype.
pub fn type_for_score(score: u32) -> AnalysisResult<FitzpatrickType> {
    SCORE_BANDS
        .iter()
        .find(|(upper, _)| score <= *upper)
        .map(|(_, t)| *t)
        .ok_or(AnalysisError::ScoreOutOfRange(score))
}

/// Classify a completed questionnaire.
pub fn classify(answers: &[u8]) -> AnalysisResult<FitzpatrickType> {
    if answers.len() != QUESTION_COUNT {
        return Err(AnalysisError::InvalidQuestionnaire(format!(
            "expected {} answers, got {}",
            QUESTION_COUNT,
            answers.len()
        )));
    }

    if let Some((index, value)) = answers
        .iter()
        .enumerate()
        .find(|(_, v)| **v > MAX_ANSWER)
    {
        return Err(AnalysisError::InvalidQuestionnaire(format!(
            "answer {} is {}, must be 0-{}",
            index + 1,
            value,
            MAX_ANSWER
        )));
    }

    let score: u32 = answers.iter().map(|v| u32::from(*v)).sum();
    type_for_score(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_band_boundaries() {
        let cases = [
            (0, FitzpatrickType::I),
            (7, FitzpatrickType::I),
            (8, FitzpatrickType::II),
            (16, FitzpatrickType::II),
            (17, FitzpatrickType::III),
            (24, FitzpatrickType::III),
            (25, FitzpatrickType::IV),
            (30, FitzpatrickType::IV),
            (31, FitzpatrickType::V),
            (35, FitzpatrickType::V),
            (36, FitzpatrickType::VI),
            (40, FitzpatrickType::VI),
        ];
        for (score, expected) in cases {
            assert_eq!(type_for_score(score).unwrap(), expected, "score {}", score);
        }
        assert!(matches!(
            type_for_score(41),
            Err(AnalysisError::ScoreOutOfRange(41))
        ));
    }

    #[test]
    fn test_classify_questionnaire() {
        assert_eq!(classify(&[0; 10]).unwrap(), FitzpatrickType::I);
        assert_eq!(classify(&[2; 10]).unwrap(), FitzpatrickType::III);
        assert_eq!(classify(&[4; 10]).unwrap(), FitzpatrickType::VI);
    }

    #[test]
    fn test_classify_rejects_bad_input() {
        assert!(classify(&[1; 9]).is_err());
        assert!(classify(&[1; 11]).is_err());

        let mut answers = [1u8; 10];
        answers[3] = 5;
        let err = classify(&answers).unwrap_err();
        assert!(err.to_string().contains("answer 4"));
    }

    proptest! {
        #[test]
        fn prop_valid_answers_always_classify(answers in proptest::collection::vec(0u8..=4, 10)) {
            prop_assert!(classify(&answers).is_ok());
        }

        #[test]
        fn prop_higher_score_never_lighter(a in 0u32..=40, b in 0u32..=40) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(type_for_score(lo).unwrap() <= type_for_score(hi).unwrap());
        }
    }
}
