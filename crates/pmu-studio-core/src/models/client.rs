//! Client models.

use serde::{Deserialize, Serialize};

/// A studio client with dual-ID support for offline-first sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    /// Local UUID - always present, generated locally
    pub local_id: String,
    /// Remote collection ID - null until first push
    pub server_id: Option<String>,
    /// Owning studio (tenant)
    pub studio_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    /// Known allergies (pigments, latex, lidocaine, ...)
    pub allergies: Vec<String>,
    /// Current medications
    pub medications: Vec<String>,
    /// Skin conditions reported at intake
    pub skin_conditions: Vec<String>,
    pub notes: Option<String>,
    /// Portal reward balance
    pub reward_points: u32,
    /// SHA-256 of the payload last pushed to the remote collection
    pub synced_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Client {
    /// Create a new client with required fields.
    pub fn new(studio_id: String, first_name: String, last_name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            local_id: uuid::Uuid::new_v4().to_string(),
            server_id: None,
            studio_id,
            first_name,
            last_name,
            email: None,
            phone: None,
            date_of_birth: None,
            allergies: Vec::new(),
            medications: Vec::new(),
            skin_conditions: Vec::new(),
            notes: None,
            reward_points: 0,
            synced_hash: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Full display name, as typed in delete confirmations.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Check if this client has ever been pushed to the remote collection.
    pub fn is_synced(&self) -> bool {
        self.server_id.is_some()
    }

    /// Intake attributes used for contraindication screening.
    pub fn intake(&self) -> IntakeProfile {
        IntakeProfile {
            allergies: self.allergies.clone(),
            medications: self.medications.clone(),
            skin_conditions: self.skin_conditions.clone(),
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Medical intake attributes collected on the intake form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntakeProfile {
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub skin_conditions: Vec<String>,
}

/// Kind of document attached to a client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Consent,
    Photo,
    Intake,
    Other,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Consent => "consent",
            DocumentKind::Photo => "photo",
            DocumentKind::Intake => "intake",
            DocumentKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "consent" => Some(DocumentKind::Consent),
            "photo" => Some(DocumentKind::Photo),
            "intake" => Some(DocumentKind::Intake),
            "other" => Some(DocumentKind::Other),
            _ => None,
        }
    }
}

/// Reference to a stored document (signed consent, before/after photo, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRef {
    pub document_id: String,
    pub client_id: String,
    pub kind: DocumentKind,
    pub file_name: String,
    /// Location of the document in object storage
    pub url: String,
    /// Hex SHA-256 of the document content
    pub sha256: String,
    pub added_at: String,
}

impl DocumentRef {
    /// Create a document reference, hashing the content for deduplication.
    pub fn new(
        client_id: String,
        kind: DocumentKind,
        file_name: String,
        url: String,
        content: &[u8],
    ) -> Self {
        Self {
            document_id: uuid::Uuid::new_v4().to_string(),
            client_id,
            kind,
            file_name,
            url,
            sha256: crate::sync::sha256_hex(content),
            added_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Insurance sub-record held against a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsuranceRecord {
    pub insurance_id: String,
    pub client_id: String,
    pub provider: String,
    pub policy_number: String,
    pub coverage_notes: Option<String>,
    /// Expiry date (YYYY-MM-DD)
    pub valid_until: Option<String>,
}

impl InsuranceRecord {
    pub fn new(client_id: String, provider: String, policy_number: String) -> Self {
        Self {
            insurance_id: uuid::Uuid::new_v4().to_string(),
            client_id,
            provider,
            policy_number,
            coverage_notes: None,
            valid_until: None,
        }
    }

    /// Whether the policy has lapsed as of `today` (YYYY-MM-DD).
    pub fn is_expired(&self, today: &str) -> bool {
        match &self.valid_until {
            // ISO dates compare lexically
            Some(until) => until.as_str() < today,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client() {
        let client = Client::new("studio-1".into(), "Ana".into(), "Lima".into());
        assert_eq!(client.full_name(), "Ana Lima");
        assert!(!client.is_synced());
        assert_eq!(client.reward_points, 0);
        assert_eq!(client.local_id.len(), 36); // UUID format
    }

    #[test]
    fn test_full_name_trims() {
        let client = Client::new("studio-1".into(), " Ana ".into(), "".into());
        assert_eq!(client.full_name(), "Ana");
    }

    #[test]
    fn test_document_digest() {
        let doc = DocumentRef::new(
            "client-1".into(),
            DocumentKind::Photo,
            "brows-before.jpg".into(),
            "s3://bucket/brows-before.jpg".into(),
            b"abc",
        );
        assert_eq!(
            doc.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_document_kind_round_trip() {
        for kind in [
            DocumentKind::Consent,
            DocumentKind::Photo,
            DocumentKind::Intake,
            DocumentKind::Other,
        ] {
            assert_eq!(DocumentKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DocumentKind::parse("video"), None);
    }

    #[test]
    fn test_insurance_expiry() {
        let mut record = InsuranceRecord::new("c".into(), "Allianz".into(), "P-1".into());
        assert!(!record.is_expired("2026-01-01"));
        record.valid_until = Some("2025-12-31".into());
        assert!(record.is_expired("2026-01-01"));
        assert!(!record.is_expired("2025-12-31"));
    }
}
