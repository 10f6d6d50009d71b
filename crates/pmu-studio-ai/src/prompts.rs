//! Prompts for skin phototype and undertone assessment.

use serde::{Deserialize, Serialize};

/// System prompt for the assessment model.
pub const SYSTEM_PROMPT: &str = r#"You are an assistant to a permanent-makeup artist. You estimate a client's skin phototype and undertone from their intake answers so the artist can pick pigments.

Answer with a single JSON object:
- fitzpatrick: Fitzpatrick skin type as an integer from 1 to 6
- undertone: one of "cool", "neutral", "warm", "olive"
- confidence: number between 0 and 1
- rationale: one short sentence

You do not diagnose medical conditions. If the answers are unclear, choose the closest type and lower the confidence."#;

/// What the client told the studio at intake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeSummary {
    /// Procedure being booked (brows, lips, eyeliner, areola)
    pub procedure: String,
    /// Free-text description of the client's skin and sun reaction
    pub self_description: Option<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub skin_conditions: Vec<String>,
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none reported".to_string()
    } else {
        items.join(", ")
    }
}

/// User prompt for one intake.
pub fn make_assessment_prompt(intake: &IntakeSummary) -> String {
    format!(
        r#"Assess this client for a {} procedure.

Skin description: "{}"
Allergies: {}
Medications: {}
Skin conditions: {}

Return the JSON object only."#,
        if intake.procedure.trim().is_empty() {
            "permanent-makeup"
        } else {
            intake.procedure.trim()
        },
        intake.self_description.as_deref().unwrap_or("not provided"),
        list_or_none(&intake.allergies),
        list_or_none(&intake.medications),
        list_or_none(&intake.skin_conditions),
    )
}

/// Few-shot pairs of (skin description, expected answer).
pub const FEW_SHOT_EXAMPLES: &[(&str, &str)] = &[
    (
        "Very pale, freckles, always burns and never tans, veins look blue",
        r#"{"fitzpatrick":1,"undertone":"cool","confidence":0.85,"rationale":"Always burns and never tans with blue veins."}"#,
    ),
    (
        "Light brown skin, rarely burns, tans easily to a golden colour",
        r#"{"fitzpatrick":4,"undertone":"warm","confidence":0.75,"rationale":"Rarely burns and tans golden."}"#,
    ),
];

/// Full prompt with optional worked examples ahead of the real intake.
pub fn build_prompt(intake: &IntakeSummary, include_examples: bool) -> String {
    let mut prompt = String::new();

    if include_examples {
        prompt.push_str("Examples:\n");
        for (description, answer) in FEW_SHOT_EXAMPLES {
            prompt.push_str("Skin description: \"");
            prompt.push_str(description);
            prompt.push_str("\"\nAnswer: ");
            prompt.push_str(answer);
            prompt.push_str("\n\n");
        }
    }

    prompt.push_str(&make_assessment_prompt(intake));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake() -> IntakeSummary {
        IntakeSummary {
            procedure: "lips".into(),
            self_description: Some("burns first, then tans".into()),
            allergies: vec!["latex".into()],
            ..IntakeSummary::default()
        }
    }

    #[test]
    fn test_assessment_prompt() {
        let prompt = make_assessment_prompt(&intake());
        assert!(prompt.contains("lips procedure"));
        assert!(prompt.contains("burns first, then tans"));
        assert!(prompt.contains("Allergies: latex"));
        assert!(prompt.contains("Medications: none reported"));
    }

    #[test]
    fn test_blank_procedure() {
        let prompt = make_assessment_prompt(&IntakeSummary::default());
        assert!(prompt.contains("permanent-makeup procedure"));
        assert!(prompt.contains("\"not provided\""));
    }

    #[test]
    fn test_build_prompt_examples() {
        let with = build_prompt(&intake(), true);
        assert!(with.starts_with("Examples:"));
        assert!(with.contains("never tans"));
        assert!(with.ends_with("Return the JSON object only."));

        let without = build_prompt(&intake(), false);
        assert!(!without.contains("never tans"));
    }
}
