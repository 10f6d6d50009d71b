//! Consent form models.

use serde::{Deserialize, Serialize};

use super::Procedure;

/// A consent form template owned by a studio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsentForm {
    pub form_id: String,
    pub server_id: Option<String>,
    pub studio_id: String,
    pub title: String,
    pub body: String,
    /// Bumped whenever the body changes
    pub version: u32,
    /// Procedure the form covers, None for general studio consent
    pub procedure: Option<Procedure>,
    /// SHA-256 of the payload last pushed to the remote collection
    pub synced_hash: Option<String>,
    pub created_at: String,
}

impl ConsentForm {
    pub fn new(studio_id: String, title: String, body: String) -> Self {
        Self {
            form_id: uuid::Uuid::new_v4().to_string(),
            server_id: None,
            studio_id,
            title,
            body,
            version: 1,
            procedure: None,
            synced_hash: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Lifecycle of a consent request sent to a client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Pending,
    Signed,
    Revoked,
}

impl ConsentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentStatus::Pending => "pending",
            ConsentStatus::Signed => "signed",
            ConsentStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ConsentStatus::Pending),
            "signed" => Some(ConsentStatus::Signed),
            "revoked" => Some(ConsentStatus::Revoked),
            _ => None,
        }
    }
}

/// A consent form distributed to one client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsentRequest {
    pub request_id: String,
    pub form_id: String,
    /// Form version the client was asked to sign
    pub form_version: u32,
    pub client_id: String,
    pub status: ConsentStatus,
    pub sent_at: String,
    pub signed_at: Option<String>,
    /// Name typed by the client when signing
    pub signature_name: Option<String>,
}

impl ConsentRequest {
    pub fn new(form: &ConsentForm, client_id: String) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            form_id: form.form_id.clone(),
            form_version: form.version,
            client_id,
            status: ConsentStatus::Pending,
            sent_at: chrono::Utc::now().to_rfc3339(),
            signed_at: None,
            signature_name: None,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.status == ConsentStatus::Pending
    }
}

/// Outcome of distributing a form to a set of clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DistributionReport {
    /// Requests created by this distribution
    pub sent: Vec<ConsentRequest>,
    /// Clients that already had a pending request for the form
    pub skipped_client_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tracks_form_version() {
        let mut form = ConsentForm::new("s".into(), "Brows".into(), "I consent".into());
        form.version = 3;
        let request = ConsentRequest::new(&form, "client-1".into());
        assert_eq!(request.form_version, 3);
        assert!(request.is_outstanding());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ConsentStatus::Pending,
            ConsentStatus::Signed,
            ConsentStatus::Revoked,
        ] {
            assert_eq!(ConsentStatus::parse(status.as_str()), Some(status));
        }
    }
}
