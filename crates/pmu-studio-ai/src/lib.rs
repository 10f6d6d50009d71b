//! Skin and pigment assessment through a remote model endpoint.
//!
//! The model is treated as an opaque text service: a system prompt and an
//! intake prompt go in, free text comes back, and the JSON object inside it
//! is parsed and checked before it reaches the studio store.

pub mod assessment;
pub mod client;
pub mod prompts;

pub use assessment::*;
pub use client::*;
pub use prompts::*;

use thiserror::Error;

/// Assessment errors.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Fitzpatrick type out of range: {0}")]
    FitzpatrickOutOfRange(String),

    #[error("Unknown undertone: {0}")]
    UnknownUndertone(String),

    #[error("Cannot reach analysis endpoint at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Analysis endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Run one assessment against a model client.
pub fn assess(client: &dyn AnalysisClient, intake: &IntakeSummary) -> AnalysisResult<Assessment> {
    let prompt = build_prompt(intake, true);
    let response = client.complete(SYSTEM_PROMPT, &prompt)?;
    let assessment = parse_assessment(&response)?;
    tracing::info!(
        fitzpatrick = assessment.fitzpatrick,
        undertone = %assessment.undertone,
        "model assessment parsed"
    );
    Ok(assessment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assess_with_mock() {
        let client = MockAnalysisClient::new(
            r#"Here is my read: {"fitzpatrick": 4, "undertone": "olive", "confidence": 0.7}"#,
        );
        let intake = IntakeSummary {
            procedure: "brows".into(),
            self_description: Some("tans easily, greenish cast".into()),
            ..IntakeSummary::default()
        };

        let assessment = assess(&client, &intake).unwrap();
        assert_eq!(assessment.fitzpatrick, 4);
        assert_eq!(assessment.undertone, "olive");

        let (system, prompt) = client.last_request().unwrap();
        assert_eq!(system, SYSTEM_PROMPT);
        assert!(prompt.contains("tans easily"));
    }

    #[test]
    fn test_assess_rejects_bad_model_output() {
        let client = MockAnalysisClient::new(r#"{"fitzpatrick": 9, "undertone": "warm"}"#);
        let err = assess(&client, &IntakeSummary::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::FitzpatrickOutOfRange(_)));
    }
}
