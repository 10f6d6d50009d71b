//! Parsing and checking model output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prompts::IntakeSummary;
use crate::{AnalysisError, AnalysisResult};

/// Undertones the studio store accepts.
pub const UNDERTONES: [&str; 4] = ["cool", "neutral", "warm", "olive"];

/// A checked assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Fitzpatrick type, 1-6
    pub fitzpatrick: u8,
    /// One of [`UNDERTONES`]
    pub undertone: String,
    pub confidence: Option<f64>,
    pub rationale: Option<String>,
}

#[derive(Deserialize)]
struct RawAssessment {
    fitzpatrick: Value,
    undertone: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    rationale: Option<String>,
}

/// Parse a model response into an assessment.
///
/// Prose or code fences around the JSON object are ignored.
pub fn parse_assessment(text: &str) -> AnalysisResult<Assessment> {
    let start = text
        .find('{')
        .ok_or_else(|| AnalysisError::InvalidFormat("No JSON object found in response".into()))?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| AnalysisError::InvalidFormat("No closing brace found in response".into()))?;

    let raw: RawAssessment = serde_json::from_str(&text[start..=end])?;

    let fitzpatrick = parse_fitzpatrick(&raw.fitzpatrick)?;
    let undertone = canonical_undertone(&raw.undertone)
        .ok_or_else(|| AnalysisError::UnknownUndertone(raw.undertone.clone()))?;
    let confidence = raw.confidence.filter(|c| {
        let valid = (0.0..=1.0).contains(c);
        if !valid {
            tracing::debug!(confidence = c, "dropping out-of-range confidence");
        }
        valid
    });

    Ok(Assessment {
        fitzpatrick,
        undertone: undertone.to_string(),
        confidence,
        rationale: raw.rationale.filter(|r| !r.trim().is_empty()),
    })
}

/// Accepts 4, "4", "IV" and "Type IV".
pub fn parse_fitzpatrick(value: &Value) -> AnalysisResult<u8> {
    let out_of_range = || AnalysisError::FitzpatrickOutOfRange(value.to_string());

    let n = match value {
        Value::Number(n) => n.as_u64().ok_or_else(out_of_range)?,
        Value::String(s) => {
            let upper = s.trim().to_uppercase();
            let label = upper.strip_prefix("TYPE").map(str::trim).unwrap_or(&upper);
            match label {
                "I" => 1,
                "II" => 2,
                "III" => 3,
                "IV" => 4,
                "V" => 5,
                "VI" => 6,
                other => other.parse::<u64>().map_err(|_| out_of_range())?,
            }
        }
        _ => return Err(out_of_range()),
    };

    if (1..=6).contains(&n) {
        Ok(n as u8)
    } else {
        Err(out_of_range())
    }
}

/// Map an undertone word (or common synonym) to the store vocabulary.
pub fn canonical_undertone(word: &str) -> Option<&'static str> {
    match word.trim().to_lowercase().as_str() {
        "cool" | "pink" | "rosy" => Some("cool"),
        "neutral" => Some("neutral"),
        "warm" | "yellow" | "golden" | "peach" => Some("warm"),
        "olive" | "green" => Some("olive"),
        _ => None,
    }
}

/// Keyword assessor that needs no model (for tests and offline use).
pub struct OfflineAssessor;

impl OfflineAssessor {
    /// Ordered darkest-first so "medium brown" beats "medium".
    const TYPE_KEYWORDS: &'static [(&'static str, u8)] = &[
        ("very dark", 6),
        ("deeply pigmented", 6),
        ("never burns", 6),
        ("dark brown", 5),
        ("rarely burns", 4),
        ("light brown", 4),
        ("olive", 4),
        ("medium", 3),
        ("burns first", 3),
        ("burns easily", 2),
        ("fair", 2),
        ("always burns", 1),
        ("very pale", 1),
        ("pale", 1),
    ];

    const UNDERTONE_KEYWORDS: &'static [(&'static str, &'static str)] = &[
        ("olive", "olive"),
        ("green", "olive"),
        ("golden", "warm"),
        ("yellow", "warm"),
        ("peach", "warm"),
        ("blue veins", "cool"),
        ("veins look blue", "cool"),
        ("pink", "cool"),
        ("rosy", "cool"),
    ];

    pub fn assess(intake: &IntakeSummary) -> Assessment {
        let description = intake
            .self_description
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        let type_hit = Self::TYPE_KEYWORDS
            .iter()
            .find(|(keyword, _)| description.contains(keyword));
        let undertone_hit = Self::UNDERTONE_KEYWORDS
            .iter()
            .find(|(keyword, _)| description.contains(keyword));

        Assessment {
            fitzpatrick: type_hit.map(|(_, t)| *t).unwrap_or(3),
            undertone: undertone_hit.map(|(_, u)| *u).unwrap_or("neutral").to_string(),
            confidence: Some(if type_hit.is_some() { 0.5 } else { 0.2 }),
            rationale: type_hit.map(|(keyword, _)| format!("matched \"{}\"", keyword)),
        }
    }
}
