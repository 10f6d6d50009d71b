//! Skin analysis models.

use serde::{Deserialize, Serialize};

/// Fitzpatrick skin phototype.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FitzpatrickType {
    I,
    II,
    III,
    IV,
    V,
    VI,
}

impl FitzpatrickType {
    /// All phototypes, lightest first.
    pub const ALL: [FitzpatrickType; 6] = [
        FitzpatrickType::I,
        FitzpatrickType::II,
        FitzpatrickType::III,
        FitzpatrickType::IV,
        FitzpatrickType::V,
        FitzpatrickType::VI,
    ];

    /// Map 1..=6 to a phototype.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(FitzpatrickType::I),
            2 => Some(FitzpatrickType::II),
            3 => Some(FitzpatrickType::III),
            4 => Some(FitzpatrickType::IV),
            5 => Some(FitzpatrickType::V),
            6 => Some(FitzpatrickType::VI),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            FitzpatrickType::I => 1,
            FitzpatrickType::II => 2,
            FitzpatrickType::III => 3,
            FitzpatrickType::IV => 4,
            FitzpatrickType::V => 5,
            FitzpatrickType::VI => 6,
        }
    }

    /// Roman numeral label.
    pub fn as_str(&self) -> &'static str {
        match self {
            FitzpatrickType::I => "I",
            FitzpatrickType::II => "II",
            FitzpatrickType::III => "III",
            FitzpatrickType::IV => "IV",
            FitzpatrickType::V => "V",
            FitzpatrickType::VI => "VI",
        }
    }

    /// Types V and VI carry higher hyperpigmentation and keloid risk.
    pub fn is_high_melanin(&self) -> bool {
        matches!(self, FitzpatrickType::V | FitzpatrickType::VI)
    }
}

/// Skin undertone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Undertone {
    Cool,
    Neutral,
    Warm,
    Olive,
}

impl Undertone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Undertone::Cool => "cool",
            Undertone::Neutral => "neutral",
            Undertone::Warm => "warm",
            Undertone::Olive => "olive",
        }
    }

    /// Parse an undertone, accepting common synonyms.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cool" | "pink" | "rosy" => Some(Undertone::Cool),
            "neutral" => Some(Undertone::Neutral),
            "warm" | "yellow" | "golden" | "peach" => Some(Undertone::Warm),
            "olive" | "green" => Some(Undertone::Olive),
            _ => None,
        }
    }
}

/// PMU procedure the analysis is performed for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Procedure {
    Brows,
    Lips,
    Eyeliner,
    Areola,
}

impl Procedure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Procedure::Brows => "brows",
            Procedure::Lips => "lips",
            Procedure::Eyeliner => "eyeliner",
            Procedure::Areola => "areola",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "brows" | "eyebrows" | "microblading" | "powder brows" => Some(Procedure::Brows),
            "lips" | "lip blush" => Some(Procedure::Lips),
            "eyeliner" | "liner" | "lash enhancement" => Some(Procedure::Eyeliner),
            "areola" => Some(Procedure::Areola),
            _ => None,
        }
    }
}

/// Where an analysis result came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Fitzpatrick questionnaire filled in at intake
    Questionnaire,
    /// Remote model assessment of a client photo
    Ai,
    /// Artist's own judgement
    Manual,
}

impl AnalysisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisSource::Questionnaire => "questionnaire",
            AnalysisSource::Ai => "ai",
            AnalysisSource::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "questionnaire" => Some(AnalysisSource::Questionnaire),
            "ai" => Some(AnalysisSource::Ai),
            "manual" => Some(AnalysisSource::Manual),
            _ => None,
        }
    }
}

/// A recommended pigment family with an optional corrective modifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PigmentRecommendation {
    /// Base pigment family (e.g. "medium brown", "soft nude rose")
    pub family: String,
    /// Corrective modifier to mix in, if any
    pub modifier: Option<String>,
    pub rationale: String,
}

/// How strongly a contraindication affects the appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Proceed, but the artist should discuss it with the client
    Caution,
    /// Do not book until cleared
    Defer,
}

/// A flag raised by intake screening.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contraindication {
    /// The intake entry that triggered the flag
    pub trigger: String,
    pub severity: Severity,
    pub note: String,
}

/// A timestamped classification result in a client's analysis history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRecord {
    pub analysis_id: String,
    pub client_id: String,
    pub fitzpatrick: FitzpatrickType,
    pub undertone: Undertone,
    pub procedure: Procedure,
    pub recommended_pigments: Vec<PigmentRecommendation>,
    pub contraindications: Vec<Contraindication>,
    pub source: AnalysisSource,
    pub notes: Option<String>,
    pub analyzed_at: String,
}

impl AnalysisRecord {
    pub fn new(
        client_id: String,
        fitzpatrick: FitzpatrickType,
        undertone: Undertone,
        procedure: Procedure,
        source: AnalysisSource,
    ) -> Self {
        Self {
            analysis_id: uuid::Uuid::new_v4().to_string(),
            client_id,
            fitzpatrick,
            undertone,
            procedure,
            recommended_pigments: Vec::new(),
            contraindications: Vec::new(),
            source,
            notes: None,
            analyzed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether any flag blocks booking.
    pub fn requires_deferral(&self) -> bool {
        self.contraindications
            .iter()
            .any(|c| c.severity == Severity::Defer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fitzpatrick_numbers() {
        for t in FitzpatrickType::ALL {
            assert_eq!(FitzpatrickType::from_number(t.number()), Some(t));
        }
        assert_eq!(FitzpatrickType::from_number(0), None);
        assert_eq!(FitzpatrickType::from_number(7), None);
    }

    #[test]
    fn test_undertone_synonyms() {
        assert_eq!(Undertone::parse("Golden"), Some(Undertone::Warm));
        assert_eq!(Undertone::parse(" pink "), Some(Undertone::Cool));
        assert_eq!(Undertone::parse("purple"), None);
    }

    #[test]
    fn test_requires_deferral() {
        let mut record = AnalysisRecord::new(
            "client-1".into(),
            FitzpatrickType::III,
            Undertone::Neutral,
            Procedure::Brows,
            AnalysisSource::Questionnaire,
        );
        assert!(!record.requires_deferral());

        record.contraindications.push(Contraindication {
            trigger: "isotretinoin".into(),
            severity: Severity::Defer,
            note: "wait six months".into(),
        });
        assert!(record.requires_deferral());
    }
}
