//! Studio back-office operations.
//!
//! Each operation validates its input, performs one store call and keeps the
//! local cache snapshots current. Everything is scoped to one studio: records
//! belonging to another studio behave as if they did not exist.

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::{
    Client, ConsentForm, ConsentRequest, ConsentStatus, DistributionReport, DocumentKind,
    DocumentRef, InsuranceRecord, RewardReason, RewardTier, TeamMember, points_to_next_tier,
};
use crate::validation::{
    confirm_deletion, validate_client, validate_consent_form, validate_insurance,
    validate_signature, validate_team_member, FieldError, ValidationError,
};

/// Minimum full-name similarity reported by [`Studio::find_similar_clients`].
pub const SIMILAR_NAME_THRESHOLD: f64 = 0.9;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// A client whose name resembles a searched name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarClient {
    pub client: Client,
    pub score: f64,
}

/// Reward balance as shown in the client portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardBalance {
    pub points: u32,
    pub tier: RewardTier,
    pub points_to_next_tier: Option<u32>,
}

impl RewardBalance {
    pub fn for_points(points: u32) -> Self {
        Self {
            points,
            tier: RewardTier::for_points(points),
            points_to_next_tier: points_to_next_tier(points),
        }
    }
}

/// Operations for one studio over the local store.
pub struct Studio<'a> {
    db: &'a Database,
    studio_id: &'a str,
}

impl<'a> Studio<'a> {
    pub fn new(db: &'a Database, studio_id: &'a str) -> Self {
        Self { db, studio_id }
    }

    pub fn studio_id(&self) -> &str {
        self.studio_id
    }

    // =========================================================================
    // Clients
    // =========================================================================

    pub fn create_client(&self, mut client: Client) -> ServiceResult<Client> {
        client.studio_id = self.studio_id.to_string();
        validate_client(&client)?;
        self.db.insert_client(&client)?;
        tracing::info!(client_id = %client.local_id, "client created");
        Ok(client)
    }

    pub fn get_client(&self, local_id: &str) -> ServiceResult<Option<Client>> {
        Ok(self
            .db
            .get_client(local_id)?
            .filter(|c| c.studio_id == self.studio_id))
    }

    fn require_client(&self, local_id: &str) -> ServiceResult<Client> {
        self.get_client(local_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("client {}", local_id)))
    }

    /// Save edits to a client and return the stored version.
    pub fn update_client(&self, client: &Client) -> ServiceResult<Client> {
        self.require_client(&client.local_id)?;
        validate_client(client)?;
        self.db.update_client(client)?;
        self.require_client(&client.local_id)
    }

    pub fn list_clients(&self) -> ServiceResult<Vec<Client>> {
        Ok(self.db.list_clients(self.studio_id)?)
    }

    pub fn search_clients(&self, query: &str, limit: usize) -> ServiceResult<Vec<Client>> {
        Ok(self.db.search_clients(self.studio_id, query, limit)?)
    }

    /// Check a typed deletion confirmation without deleting.
    pub fn confirm_client_deletion(&self, local_id: &str, typed: &str) -> ServiceResult<Client> {
        let client = self.require_client(local_id)?;
        confirm_deletion(&client.full_name(), typed)?;
        Ok(client)
    }

    /// Delete a client after the user typed their full name. Sub-records go
    /// with it. Returns the removed client.
    pub fn delete_client(&self, local_id: &str, typed: &str) -> ServiceResult<Client> {
        let client = self.confirm_client_deletion(local_id, typed)?;
        self.db.delete_client(local_id)?;
        tracing::info!(client_id = local_id, "client deleted");
        Ok(client)
    }

    /// Clients whose full name resembles `name`, best match first.
    pub fn find_similar_clients(&self, name: &str) -> ServiceResult<Vec<SimilarClient>> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches: Vec<SimilarClient> = self
            .list_clients()?
            .into_iter()
            .filter_map(|client| {
                let score = jaro_winkler(&wanted, &client.full_name().to_lowercase());
                (score >= SIMILAR_NAME_THRESHOLD).then_some(SimilarClient { client, score })
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(matches)
    }

    // =========================================================================
    // Documents and insurance
    // =========================================================================

    /// Attach a document; re-adding identical content returns the existing one.
    pub fn add_document(
        &self,
        client_id: &str,
        kind: DocumentKind,
        file_name: &str,
        url: &str,
        content: &[u8],
    ) -> ServiceResult<DocumentRef> {
        self.require_client(client_id)?;
        if file_name.trim().is_empty() {
            return Err(ValidationError::Fields(vec![FieldError {
                field: "file_name".into(),
                message: "is required".into(),
            }])
            .into());
        }
        let document = DocumentRef::new(
            client_id.to_string(),
            kind,
            file_name.trim().to_string(),
            url.to_string(),
            content,
        );
        Ok(self.db.insert_document(&document)?)
    }

    pub fn list_documents(&self, client_id: &str) -> ServiceResult<Vec<DocumentRef>> {
        self.require_client(client_id)?;
        Ok(self.db.list_documents(client_id)?)
    }

    pub fn remove_document(&self, document_id: &str) -> ServiceResult<bool> {
        let document = self
            .db
            .get_document(document_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("document {}", document_id)))?;
        self.require_client(&document.client_id)?;
        Ok(self.db.delete_document(document_id)?)
    }

    pub fn add_insurance(&self, record: &InsuranceRecord) -> ServiceResult<()> {
        self.require_client(&record.client_id)?;
        validate_insurance(record)?;
        self.db.insert_insurance(record)?;
        Ok(())
    }

    pub fn update_insurance(&self, record: &InsuranceRecord) -> ServiceResult<()> {
        self.require_insurance(&record.insurance_id)?;
        validate_insurance(record)?;
        self.db.update_insurance(record)?;
        Ok(())
    }

    pub fn list_insurance(&self, client_id: &str) -> ServiceResult<Vec<InsuranceRecord>> {
        self.require_client(client_id)?;
        Ok(self.db.list_insurance(client_id)?)
    }

    pub fn delete_insurance(&self, insurance_id: &str) -> ServiceResult<bool> {
        self.require_insurance(insurance_id)?;
        Ok(self.db.delete_insurance(insurance_id)?)
    }

    /// Insurance records belong to a studio through their client.
    fn require_insurance(&self, insurance_id: &str) -> ServiceResult<InsuranceRecord> {
        let record = self
            .db
            .get_insurance(insurance_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("insurance {}", insurance_id)))?;
        self.require_client(&record.client_id)?;
        Ok(record)
    }

    // =========================================================================
    // Team
    // =========================================================================

    pub fn add_team_member(&self, mut member: TeamMember) -> ServiceResult<TeamMember> {
        member.studio_id = self.studio_id.to_string();
        member.email = member.email.trim().to_string();
        validate_team_member(&member)?;
        self.db.insert_team_member(&member)?;
        self.db.refresh_team_snapshots(self.studio_id)?;
        tracing::info!(member_id = %member.member_id, role = member.role.as_str(), "team member added");
        Ok(member)
    }

    pub fn update_team_member(&self, member: &TeamMember) -> ServiceResult<TeamMember> {
        self.require_member(&member.member_id)?;
        let mut member = member.clone();
        member.email = member.email.trim().to_string();
        validate_team_member(&member)?;
        self.db.update_team_member(&member)?;
        self.db.refresh_team_snapshots(self.studio_id)?;
        self.require_member(&member.member_id)
    }

    pub fn deactivate_team_member(&self, member_id: &str) -> ServiceResult<TeamMember> {
        self.require_member(member_id)?;
        self.db.deactivate_team_member(member_id)?;
        self.db.refresh_team_snapshots(self.studio_id)?;
        self.require_member(member_id)
    }

    fn require_member(&self, member_id: &str) -> ServiceResult<TeamMember> {
        self.db
            .get_team_member(member_id)?
            .filter(|m| m.studio_id == self.studio_id)
            .ok_or_else(|| ServiceError::NotFound(format!("team member {}", member_id)))
    }

    pub fn list_team_members(&self, include_inactive: bool) -> ServiceResult<Vec<TeamMember>> {
        Ok(self.db.list_team_members(self.studio_id, include_inactive)?)
    }

    /// Active members holding the instructor role.
    pub fn list_instructors(&self) -> ServiceResult<Vec<TeamMember>> {
        Ok(self
            .list_team_members(false)?
            .into_iter()
            .filter(TeamMember::is_instructor)
            .collect())
    }

    // =========================================================================
    // Consent
    // =========================================================================

    pub fn create_consent_form(&self, mut form: ConsentForm) -> ServiceResult<ConsentForm> {
        form.studio_id = self.studio_id.to_string();
        validate_consent_form(&form)?;
        self.db.insert_consent_form(&form)?;
        self.db.refresh_consent_form_snapshot(self.studio_id)?;
        Ok(form)
    }

    /// Save edits to a form; a body change bumps its version.
    pub fn update_consent_form(&self, form: &ConsentForm) -> ServiceResult<ConsentForm> {
        self.require_form(&form.form_id)?;
        validate_consent_form(form)?;
        let updated = self
            .db
            .update_consent_form(form)?
            .ok_or_else(|| ServiceError::NotFound(format!("consent form {}", form.form_id)))?;
        self.db.refresh_consent_form_snapshot(self.studio_id)?;
        Ok(updated)
    }

    pub fn list_consent_forms(&self) -> ServiceResult<Vec<ConsentForm>> {
        Ok(self.db.list_consent_forms(self.studio_id)?)
    }

    fn require_form(&self, form_id: &str) -> ServiceResult<ConsentForm> {
        self.db
            .get_consent_form(form_id)?
            .filter(|f| f.studio_id == self.studio_id)
            .ok_or_else(|| ServiceError::NotFound(format!("consent form {}", form_id)))
    }

    /// Send a form to clients. Clients already holding a pending request for
    /// the form are skipped. Unknown clients fail the whole call before any
    /// request is created.
    pub fn distribute_consent_form(
        &self,
        form_id: &str,
        client_ids: &[String],
    ) -> ServiceResult<DistributionReport> {
        let form = self.require_form(form_id)?;
        for client_id in client_ids {
            self.require_client(client_id)?;
        }

        let mut report = DistributionReport::default();
        for client_id in client_ids {
            if self.db.has_pending_consent(form_id, client_id)? {
                report.skipped_client_ids.push(client_id.clone());
                continue;
            }
            let request = ConsentRequest::new(&form, client_id.clone());
            self.db.insert_consent_request(&request)?;
            report.sent.push(request);
        }

        tracing::info!(
            form_id,
            sent = report.sent.len(),
            skipped = report.skipped_client_ids.len(),
            "consent form distributed"
        );
        Ok(report)
    }

    fn require_pending_request(&self, request_id: &str) -> ServiceResult<(ConsentRequest, Client)> {
        let request = self
            .db
            .get_consent_request(request_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("consent request {}", request_id)))?;
        let client = self.require_client(&request.client_id)?;
        if !request.is_outstanding() {
            return Err(ServiceError::InvalidState(format!(
                "consent request {} is already {}",
                request_id,
                request.status.as_str()
            )));
        }
        Ok((request, client))
    }

    /// Sign a pending request. The signature must be the client's full name.
    pub fn sign_consent_request(&self, request_id: &str, signature_name: &str) -> ServiceResult<ConsentRequest> {
        let (_, client) = self.require_pending_request(request_id)?;
        validate_signature(&client.full_name(), signature_name)?;
        self.db
            .set_consent_status(request_id, ConsentStatus::Signed, Some(signature_name.trim()))?;
        self.db
            .get_consent_request(request_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("consent request {}", request_id)))
    }

    pub fn revoke_consent_request(&self, request_id: &str) -> ServiceResult<ConsentRequest> {
        self.require_pending_request(request_id)?;
        self.db
            .set_consent_status(request_id, ConsentStatus::Revoked, None)?;
        self.db
            .get_consent_request(request_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("consent request {}", request_id)))
    }

    pub fn outstanding_consent_requests(&self, client_id: &str) -> ServiceResult<Vec<ConsentRequest>> {
        self.require_client(client_id)?;
        Ok(self.db.list_consent_requests(client_id, true)?)
    }

    pub fn consent_history(&self, client_id: &str) -> ServiceResult<Vec<ConsentRequest>> {
        self.require_client(client_id)?;
        Ok(self.db.list_consent_requests(client_id, false)?)
    }

    // =========================================================================
    // Rewards
    // =========================================================================

    pub fn award_points(&self, client_id: &str, reason: RewardReason) -> ServiceResult<RewardBalance> {
        self.require_client(client_id)?;
        let points = self.db.add_reward_points(client_id, reason.points())?;
        tracing::debug!(client_id, points, "reward points awarded");
        Ok(RewardBalance::for_points(points))
    }

    pub fn reward_balance(&self, client_id: &str) -> ServiceResult<RewardBalance> {
        let client = self.require_client(client_id)?;
        Ok(RewardBalance::for_points(client.reward_points))
    }
}
