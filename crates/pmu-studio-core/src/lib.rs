//! PMU Studio Core Library
//!
//! Local-first back office for permanent-makeup studios: client records,
//! skin analysis intake, consent forms and team administration, kept in
//! SQLite and mirrored to the studio's REST collections.
//!
//! # Architecture
//!
//! ```text
//!   Front end / mobile shell
//!              │  (uniffi)
//!              ▼
//!        PmuStudioCore ──► validation / access
//!              │
//!              ▼
//!     ┌──────────────────┐        push / pull        ┌──────────────────────┐
//!     │ Database (SQLite)│ ◄───────────────────────► │ /api/clients         │
//!     │  clients + sub-  │   synced_hash per record  │ /api/studio/team-... │
//!     │  records, team,  │                           │ /api/consent-forms   │
//!     │  consent, cache  │                           └──────────────────────┘
//!     └──────────────────┘
//! ```
//!
//! Writes always land locally first. When an API is configured each write
//! is pushed straight away; a failed push leaves the record pending for a
//! later [`PmuStudioCore::push_pending`].
//!
//! # Modules
//!
//! - [`db`]: SQLite store and local snapshot cache
//! - [`models`]: Domain types (Client, TeamMember, ConsentForm, ...)
//! - [`validation`]: Required-field checks and delete confirmation
//! - [`access`]: Role-based tab visibility and permissions
//! - [`analysis`]: Fitzpatrick classification, pigment lookup, screening
//! - [`studio`]: Studio-scoped operations over the store
//! - [`import`]: Bulk client import
//! - [`sync`]: Remote collections and push/pull
//! - [`export`]: Client export

pub mod access;
pub mod analysis;
pub mod config;
pub mod db;
pub mod export;
pub mod import;
pub mod models;
pub mod studio;
pub mod sync;
pub mod validation;

// Re-export commonly used types
pub use access::{can, visible_tabs, Permission, Tab};
pub use analysis::Analyzer;
pub use config::StudioConfig;
pub use db::Database;
pub use import::ClientImporter;
pub use models::{
    AnalysisRecord, Client, ConsentForm, ConsentRequest, DocumentRef, FitzpatrickType,
    InsuranceRecord, Role, TeamMember,
};
pub use studio::Studio;
pub use sync::{CollectionSync, HttpCollection, MemoryCollection, RemoteCollection, SyncRecord};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use crate::models::{
    AnalysisSource, Contraindication, DistributionReport, DocumentKind, IntakeProfile,
    PigmentRecommendation, Procedure, RewardReason, Severity, Undertone,
};
use crate::studio::{RewardBalance, ServiceError, SimilarClient};
use crate::sync::{PullReport, PushReport, CLIENTS_PATH, CONSENT_FORMS_PATH, TEAM_MEMBERS_PATH};

// =========================================================================
// Logging
// =========================================================================

/// Install the global tracing subscriber. `RUST_LOG` wins over `filter`.
///
/// Safe to call more than once; later calls are ignored.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) {
    let filter = filter.unwrap_or_else(|| config::default_log_filter().to_string());
    let installed = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .try_init()
        .is_ok();
    if installed {
        tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
    }
}

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum StudioError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Sync error: {0}")]
    SyncError(String),
}

impl From<db::DbError> for StudioError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => StudioError::NotFound(what),
            db::DbError::Constraint(msg) => StudioError::InvalidInput(msg),
            other => StudioError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(e: serde_json::Error) -> Self {
        StudioError::SerializationError(e.to_string())
    }
}

impl From<validation::ValidationError> for StudioError {
    fn from(e: validation::ValidationError) -> Self {
        StudioError::ValidationFailed(e.to_string())
    }
}

impl From<ServiceError> for StudioError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(e) => e.into(),
            ServiceError::Database(e) => e.into(),
            ServiceError::NotFound(what) => StudioError::NotFound(what),
            ServiceError::InvalidState(msg) => StudioError::InvalidInput(msg),
        }
    }
}

impl From<analysis::AnalysisError> for StudioError {
    fn from(e: analysis::AnalysisError) -> Self {
        match e {
            analysis::AnalysisError::Database(e) => e.into(),
            analysis::AnalysisError::ClientNotFound(id) => StudioError::NotFound(format!("client {}", id)),
            other => StudioError::InvalidInput(other.to_string()),
        }
    }
}

impl From<import::ImportError> for StudioError {
    fn from(e: import::ImportError) -> Self {
        match e {
            import::ImportError::Database(e) => e.into(),
            other => StudioError::InvalidInput(other.to_string()),
        }
    }
}

impl From<sync::SyncError> for StudioError {
    fn from(e: sync::SyncError) -> Self {
        match e {
            sync::SyncError::Database(e) => e.into(),
            sync::SyncError::NotFound(what) => StudioError::NotFound(what),
            other => StudioError::SyncError(other.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StudioError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        StudioError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

fn parse_or_invalid<T>(value: &str, what: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T, StudioError> {
    parse(value).ok_or_else(|| StudioError::InvalidInput(format!("Unknown {}: {}", what, value)))
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create an offline database at the given path.
#[uniffi::export]
pub fn open_database(path: String, studio_id: String) -> Result<Arc<PmuStudioCore>, StudioError> {
    open_core(StudioConfig {
        database_path: path.into(),
        studio_id,
        ..StudioConfig::default()
    })
}

/// Create an in-memory offline database (for testing).
#[uniffi::export]
pub fn open_database_in_memory(studio_id: String) -> Result<Arc<PmuStudioCore>, StudioError> {
    let db = Database::open_in_memory()?;
    let config = StudioConfig {
        studio_id,
        ..StudioConfig::default()
    };
    Ok(Arc::new(PmuStudioCore::new(db, config, None)))
}

/// Open the database named in the config, online when an API URL is set.
///
/// Also installs logging with the configured filter, unless a subscriber is
/// already in place.
#[uniffi::export]
pub fn open_with_config(config: FfiStudioConfig) -> Result<Arc<PmuStudioCore>, StudioError> {
    let config = StudioConfig::from(config);
    init_logging(Some(config.log_filter.clone()));
    open_core(config)
}

fn open_core(config: StudioConfig) -> Result<Arc<PmuStudioCore>, StudioError> {
    let db = Database::open(&config.database_path)?;
    let remotes = if config.is_online() {
        Some(Remotes::new(&config)?)
    } else {
        None
    };
    Ok(Arc::new(PmuStudioCore::new(db, config, remotes)))
}

/// Configuration from `PMU_STUDIO_*` environment variables.
#[uniffi::export]
pub fn load_config_from_env() -> FfiStudioConfig {
    StudioConfig::from_env().into()
}

/// Tabs shown to a role, in display order.
#[uniffi::export]
pub fn tabs_for_role(role: String) -> Result<Vec<String>, StudioError> {
    let role = parse_or_invalid(&role, "role", Role::parse)?;
    Ok(visible_tabs(role).iter().map(|t| t.as_str().to_string()).collect())
}

/// Whether a role may perform an action.
#[uniffi::export]
pub fn role_can(role: String, permission: String) -> Result<bool, StudioError> {
    let role = parse_or_invalid(&role, "role", Role::parse)?;
    let permission = parse_or_invalid(&permission, "permission", Permission::parse)?;
    Ok(can(role, permission))
}

/// Fitzpatrick type (1-6) for ten questionnaire answers of 0-4.
#[uniffi::export]
pub fn classify_fitzpatrick(answers: Vec<u8>) -> Result<u8, StudioError> {
    Ok(analysis::classify(&answers)?.number())
}

#[uniffi::export]
pub fn recommend_pigments(
    fitzpatrick: u8,
    undertone: String,
    procedure: String,
) -> Result<Vec<FfiPigmentRecommendation>, StudioError> {
    let fitzpatrick = parse_fitzpatrick(fitzpatrick)?;
    let undertone = parse_or_invalid(&undertone, "undertone", Undertone::parse)?;
    let procedure = parse_or_invalid(&procedure, "procedure", Procedure::parse)?;
    Ok(analysis::recommend(fitzpatrick, undertone, procedure)
        .into_iter()
        .map(Into::into)
        .collect())
}

#[uniffi::export]
pub fn screen_contraindications(
    allergies: Vec<String>,
    medications: Vec<String>,
    skin_conditions: Vec<String>,
) -> Vec<FfiContraindication> {
    let intake = IntakeProfile {
        allergies,
        medications,
        skin_conditions,
    };
    analysis::screen(&intake).into_iter().map(Into::into).collect()
}

fn parse_fitzpatrick(n: u8) -> Result<FitzpatrickType, StudioError> {
    FitzpatrickType::from_number(n)
        .ok_or_else(|| StudioError::InvalidInput(format!("Fitzpatrick type must be 1-6, got {}", n)))
}

// =========================================================================
// Remote collections
// =========================================================================

struct Remotes {
    clients: HttpCollection,
    team_members: HttpCollection,
    consent_forms: HttpCollection,
}

impl Remotes {
    fn new(config: &StudioConfig) -> Result<Self, StudioError> {
        Ok(Self {
            clients: HttpCollection::new(config, CLIENTS_PATH)?,
            team_members: HttpCollection::new(config, TEAM_MEMBERS_PATH)?,
            consent_forms: HttpCollection::new(config, CONSENT_FORMS_PATH)?,
        })
    }
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe studio handle for FFI.
#[derive(uniffi::Object)]
pub struct PmuStudioCore {
    db: Arc<Mutex<Database>>,
    config: StudioConfig,
    remotes: Option<Remotes>,
}

impl PmuStudioCore {
    fn new(db: Database, config: StudioConfig, remotes: Option<Remotes>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            config,
            remotes,
        }
    }

    fn remote_for(&self, path: &str) -> Option<&HttpCollection> {
        let remotes = self.remotes.as_ref()?;
        match path {
            CLIENTS_PATH => Some(&remotes.clients),
            TEAM_MEMBERS_PATH => Some(&remotes.team_members),
            CONSENT_FORMS_PATH => Some(&remotes.consent_forms),
            _ => None,
        }
    }

    /// Push one record if online. Failures are logged and leave it pending.
    fn write_through<T: SyncRecord>(&self, db: &Database, local_id: &str) {
        let Some(remote) = self.remote_for(T::PATH) else {
            return;
        };
        let sync = CollectionSync::<T>::new(db, remote, &self.config.studio_id);
        if let Err(e) = sync.push(local_id) {
            tracing::warn!(kind = T::KIND, local_id, error = %e, "push failed, record left pending");
        }
    }

    fn reload_client(&self, db: &Database, local_id: &str) -> Result<FfiClient, StudioError> {
        db.get_client(local_id)?
            .map(Into::into)
            .ok_or_else(|| StudioError::NotFound(format!("client {}", local_id)))
    }
}

#[uniffi::export]
impl PmuStudioCore {
    pub fn studio_id(&self) -> String {
        self.config.studio_id.clone()
    }

    pub fn is_online(&self) -> bool {
        self.remotes.is_some()
    }

    // =========================================================================
    // Client Operations
    // =========================================================================

    pub fn create_client(&self, input: FfiClientInput) -> Result<FfiClient, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let mut client = Client::new(self.config.studio_id.clone(), String::new(), String::new());
        input.apply_to(&mut client);
        let client = studio.create_client(client)?;
        self.write_through::<Client>(&db, &client.local_id);
        self.reload_client(&db, &client.local_id)
    }

    pub fn get_client(&self, local_id: String) -> Result<Option<FfiClient>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.get_client(&local_id)?.map(Into::into))
    }

    pub fn update_client(&self, local_id: String, input: FfiClientInput) -> Result<FfiClient, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let mut client = studio
            .get_client(&local_id)?
            .ok_or_else(|| StudioError::NotFound(format!("client {}", local_id)))?;
        input.apply_to(&mut client);
        studio.update_client(&client)?;
        self.write_through::<Client>(&db, &local_id);
        self.reload_client(&db, &local_id)
    }

    /// Clients ordered by last name, then first name.
    pub fn list_clients(&self) -> Result<Vec<FfiClient>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.list_clients()?.into_iter().map(Into::into).collect())
    }

    /// Prefix search on first name, last name or email.
    pub fn search_clients(&self, query: String, limit: u32) -> Result<Vec<FfiClient>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let clients = studio.search_clients(&query, limit as usize)?;
        Ok(clients.into_iter().map(Into::into).collect())
    }

    /// Delete a client once `typed_confirmation` equals their full name.
    ///
    /// When online the remote record is deleted first; if that fails the
    /// client is kept.
    pub fn delete_client(&self, local_id: String, typed_confirmation: String) -> Result<(), StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        match &self.remotes {
            Some(remotes) => {
                studio.confirm_client_deletion(&local_id, &typed_confirmation)?;
                CollectionSync::<Client>::new(&db, &remotes.clients, &self.config.studio_id)
                    .delete(&local_id)?;
            }
            None => {
                studio.delete_client(&local_id, &typed_confirmation)?;
            }
        }
        Ok(())
    }

    /// Existing clients with a name close to `name`, to warn before creating
    /// a duplicate.
    pub fn find_similar_clients(&self, name: String) -> Result<Vec<FfiSimilarClient>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.find_similar_clients(&name)?.into_iter().map(Into::into).collect())
    }

    /// Import spreadsheet rows given as header → cell maps.
    pub fn import_clients(&self, rows: Vec<HashMap<String, String>>) -> Result<FfiImportReport, StudioError> {
        let db = self.db.lock()?;
        let rows: Vec<BTreeMap<String, String>> = rows.into_iter().map(|r| r.into_iter().collect()).collect();
        let report = ClientImporter::new(&db, &self.config.studio_id).import(&rows)?;
        for local_id in report.created_ids() {
            self.write_through::<Client>(&db, local_id);
        }
        Ok(report.into())
    }

    // =========================================================================
    // Analysis Operations
    // =========================================================================

    pub fn record_analysis(
        &self,
        client_id: String,
        fitzpatrick: u8,
        undertone: String,
        procedure: String,
        source: String,
        notes: Option<String>,
    ) -> Result<FfiAnalysisRecord, StudioError> {
        let fitzpatrick = parse_fitzpatrick(fitzpatrick)?;
        let undertone = parse_or_invalid(&undertone, "undertone", Undertone::parse)?;
        let procedure = parse_or_invalid(&procedure, "procedure", Procedure::parse)?;
        let source = parse_or_invalid(&source, "analysis source", AnalysisSource::parse)?;

        let db = self.db.lock()?;
        self.require_client(&db, &client_id)?;
        let record = Analyzer::new(&db).analyze(&client_id, fitzpatrick, undertone, procedure, source, notes)?;
        Ok(record.into())
    }

    pub fn analyze_questionnaire(
        &self,
        client_id: String,
        answers: Vec<u8>,
        undertone: String,
        procedure: String,
    ) -> Result<FfiAnalysisRecord, StudioError> {
        let undertone = parse_or_invalid(&undertone, "undertone", Undertone::parse)?;
        let procedure = parse_or_invalid(&procedure, "procedure", Procedure::parse)?;

        let db = self.db.lock()?;
        self.require_client(&db, &client_id)?;
        let record = Analyzer::new(&db).analyze_questionnaire(&client_id, &answers, undertone, procedure)?;
        Ok(record.into())
    }

    /// Analysis history, newest first.
    pub fn list_analyses(&self, client_id: String) -> Result<Vec<FfiAnalysisRecord>, StudioError> {
        let db = self.db.lock()?;
        self.require_client(&db, &client_id)?;
        let history = Analyzer::new(&db).history(&client_id)?;
        Ok(history.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Document and Insurance Operations
    // =========================================================================

    pub fn add_document(
        &self,
        client_id: String,
        kind: String,
        file_name: String,
        url: String,
        content: Vec<u8>,
    ) -> Result<FfiDocument, StudioError> {
        let kind = parse_or_invalid(&kind, "document kind", DocumentKind::parse)?;
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.add_document(&client_id, kind, &file_name, &url, &content)?.into())
    }

    pub fn list_documents(&self, client_id: String) -> Result<Vec<FfiDocument>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.list_documents(&client_id)?.into_iter().map(Into::into).collect())
    }

    pub fn remove_document(&self, document_id: String) -> Result<bool, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.remove_document(&document_id)?)
    }

    pub fn add_insurance(&self, record: FfiInsurance) -> Result<FfiInsurance, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let mut insurance = InsuranceRecord::new(record.client_id.clone(), String::new(), String::new());
        record.apply_to(&mut insurance);
        studio.add_insurance(&insurance)?;
        Ok(insurance.into())
    }

    pub fn update_insurance(&self, record: FfiInsurance) -> Result<(), StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let mut insurance = InsuranceRecord::new(record.client_id.clone(), String::new(), String::new());
        insurance.insurance_id = record.insurance_id.clone();
        record.apply_to(&mut insurance);
        Ok(studio.update_insurance(&insurance)?)
    }

    pub fn list_insurance(&self, client_id: String) -> Result<Vec<FfiInsurance>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.list_insurance(&client_id)?.into_iter().map(Into::into).collect())
    }

    pub fn delete_insurance(&self, insurance_id: String) -> Result<bool, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.delete_insurance(&insurance_id)?)
    }

    // =========================================================================
    // Team Operations
    // =========================================================================

    pub fn add_team_member(&self, name: String, email: String, role: String) -> Result<FfiTeamMember, StudioError> {
        let role = parse_or_invalid(&role, "role", Role::parse)?;
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let member = studio.add_team_member(TeamMember::new(self.config.studio_id.clone(), name, email, role))?;
        self.write_through::<TeamMember>(&db, &member.member_id);
        Ok(self.require_member(&db, &member.member_id)?.into())
    }

    pub fn update_team_member(&self, member: FfiTeamMember) -> Result<FfiTeamMember, StudioError> {
        let role = parse_or_invalid(&member.role, "role", Role::parse)?;
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let mut stored = self.require_member(&db, &member.member_id)?;
        stored.name = member.name;
        stored.email = member.email;
        stored.role = role;
        stored.active = member.active;
        studio.update_team_member(&stored)?;
        self.write_through::<TeamMember>(&db, &stored.member_id);
        Ok(self.require_member(&db, &stored.member_id)?.into())
    }

    pub fn deactivate_team_member(&self, member_id: String) -> Result<FfiTeamMember, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        studio.deactivate_team_member(&member_id)?;
        self.write_through::<TeamMember>(&db, &member_id);
        Ok(self.require_member(&db, &member_id)?.into())
    }

    pub fn list_team_members(&self, include_inactive: bool) -> Result<Vec<FfiTeamMember>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.list_team_members(include_inactive)?.into_iter().map(Into::into).collect())
    }

    pub fn list_instructors(&self) -> Result<Vec<FfiTeamMember>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.list_instructors()?.into_iter().map(Into::into).collect())
    }

    /// Last team snapshot, for rendering before the store is queried.
    pub fn cached_team_members(&self) -> Result<Vec<FfiTeamMember>, StudioError> {
        let db = self.db.lock()?;
        Ok(db.cached_team_members()?.unwrap_or_default().into_iter().map(Into::into).collect())
    }

    pub fn cached_instructors(&self) -> Result<Vec<FfiTeamMember>, StudioError> {
        let db = self.db.lock()?;
        Ok(db.cached_instructors()?.unwrap_or_default().into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Consent Operations
    // =========================================================================

    pub fn create_consent_form(
        &self,
        title: String,
        body: String,
        procedure: Option<String>,
    ) -> Result<FfiConsentForm, StudioError> {
        let procedure = procedure
            .map(|p| parse_or_invalid(&p, "procedure", Procedure::parse))
            .transpose()?;
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let mut form = ConsentForm::new(self.config.studio_id.clone(), title, body);
        form.procedure = procedure;
        let form = studio.create_consent_form(form)?;
        self.write_through::<ConsentForm>(&db, &form.form_id);
        Ok(self.require_form(&db, &form.form_id)?.into())
    }

    /// Save title/body/procedure edits; a body change bumps the version.
    pub fn update_consent_form(&self, form: FfiConsentForm) -> Result<FfiConsentForm, StudioError> {
        let procedure = form
            .procedure
            .map(|p| parse_or_invalid(&p, "procedure", Procedure::parse))
            .transpose()?;
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let mut stored = self.require_form(&db, &form.form_id)?;
        stored.title = form.title;
        stored.body = form.body;
        stored.procedure = procedure;
        let updated = studio.update_consent_form(&stored)?;
        self.write_through::<ConsentForm>(&db, &updated.form_id);
        Ok(self.require_form(&db, &updated.form_id)?.into())
    }

    pub fn list_consent_forms(&self) -> Result<Vec<FfiConsentForm>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.list_consent_forms()?.into_iter().map(Into::into).collect())
    }

    pub fn cached_consent_forms(&self) -> Result<Vec<FfiConsentForm>, StudioError> {
        let db = self.db.lock()?;
        Ok(db.cached_consent_forms()?.unwrap_or_default().into_iter().map(Into::into).collect())
    }

    pub fn distribute_consent_form(
        &self,
        form_id: String,
        client_ids: Vec<String>,
    ) -> Result<FfiDistributionReport, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.distribute_consent_form(&form_id, &client_ids)?.into())
    }

    pub fn sign_consent_request(
        &self,
        request_id: String,
        signature_name: String,
    ) -> Result<FfiConsentRequest, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.sign_consent_request(&request_id, &signature_name)?.into())
    }

    pub fn revoke_consent_request(&self, request_id: String) -> Result<FfiConsentRequest, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.revoke_consent_request(&request_id)?.into())
    }

    pub fn outstanding_consent_requests(&self, client_id: String) -> Result<Vec<FfiConsentRequest>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio
            .outstanding_consent_requests(&client_id)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Every request sent to a client, whatever its status.
    pub fn consent_history(&self, client_id: String) -> Result<Vec<FfiConsentRequest>, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.consent_history(&client_id)?.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Rewards
    // =========================================================================

    pub fn award_points(&self, client_id: String, reason: String) -> Result<FfiRewardBalance, StudioError> {
        let reason = parse_or_invalid(&reason, "reward reason", RewardReason::parse)?;
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        let balance = studio.award_points(&client_id, reason)?;
        self.write_through::<Client>(&db, &client_id);
        Ok(balance.into())
    }

    pub fn reward_balance(&self, client_id: String) -> Result<FfiRewardBalance, StudioError> {
        let db = self.db.lock()?;
        let studio = Studio::new(&db, &self.config.studio_id);
        Ok(studio.reward_balance(&client_id)?.into())
    }

    // =========================================================================
    // Sync Operations
    // =========================================================================

    /// Push every pending client, team member and consent form.
    pub fn push_pending(&self) -> Result<Vec<FfiPushReport>, StudioError> {
        let remotes = self.require_remotes()?;
        let db = self.db.lock()?;
        let studio_id = self.config.studio_id.as_str();
        Ok(vec![
            FfiPushReport::new::<Client>(CollectionSync::<Client>::new(&db, &remotes.clients, studio_id).push_pending()?),
            FfiPushReport::new::<TeamMember>(
                CollectionSync::<TeamMember>::new(&db, &remotes.team_members, studio_id).push_pending()?,
            ),
            FfiPushReport::new::<ConsentForm>(
                CollectionSync::<ConsentForm>::new(&db, &remotes.consent_forms, studio_id).push_pending()?,
            ),
        ])
    }

    /// Pull all three collections, refreshing the cache snapshots.
    pub fn pull_all(&self) -> Result<Vec<FfiPullReport>, StudioError> {
        let remotes = self.require_remotes()?;
        let db = self.db.lock()?;
        let studio_id = self.config.studio_id.as_str();
        Ok(vec![
            FfiPullReport::new::<Client>(CollectionSync::<Client>::new(&db, &remotes.clients, studio_id).pull()?),
            FfiPullReport::new::<TeamMember>(
                CollectionSync::<TeamMember>::new(&db, &remotes.team_members, studio_id).pull()?,
            ),
            FfiPullReport::new::<ConsentForm>(
                CollectionSync::<ConsentForm>::new(&db, &remotes.consent_forms, studio_id).pull()?,
            ),
        ])
    }

    /// Records not yet pushed in their current form.
    pub fn pending_sync_count(&self) -> Result<u32, StudioError> {
        let db = self.db.lock()?;
        let studio_id = self.config.studio_id.as_str();
        // Counting needs no remote; an inert collection stands in.
        let offline = MemoryCollection::new();
        let count = CollectionSync::<Client>::new(&db, &offline, studio_id).pending_count()?
            + CollectionSync::<TeamMember>::new(&db, &offline, studio_id).pending_count()?
            + CollectionSync::<ConsentForm>::new(&db, &offline, studio_id).pending_count()?;
        Ok(count as u32)
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    pub fn export_clients_json(&self) -> Result<String, StudioError> {
        let db = self.db.lock()?;
        let export = export::ClientExporter::new(&db).export_studio(&self.config.studio_id)?;
        Ok(export.to_json()?)
    }

    pub fn export_clients_csv(&self) -> Result<String, StudioError> {
        let db = self.db.lock()?;
        let export = export::ClientExporter::new(&db).export_studio(&self.config.studio_id)?;
        Ok(export.to_csv())
    }
}

impl PmuStudioCore {
    fn require_remotes(&self) -> Result<&Remotes, StudioError> {
        self.remotes
            .as_ref()
            .ok_or_else(|| StudioError::SyncError("No API configured".into()))
    }

    fn require_client(&self, db: &Database, client_id: &str) -> Result<Client, StudioError> {
        Studio::new(db, &self.config.studio_id)
            .get_client(client_id)?
            .ok_or_else(|| StudioError::NotFound(format!("client {}", client_id)))
    }

    fn require_member(&self, db: &Database, member_id: &str) -> Result<TeamMember, StudioError> {
        db.get_team_member(member_id)?
            .filter(|m| m.studio_id == self.config.studio_id)
            .ok_or_else(|| StudioError::NotFound(format!("team member {}", member_id)))
    }

    fn require_form(&self, db: &Database, form_id: &str) -> Result<ConsentForm, StudioError> {
        db.get_consent_form(form_id)?
            .filter(|f| f.studio_id == self.config.studio_id)
            .ok_or_else(|| StudioError::NotFound(format!("consent form {}", form_id)))
    }
}

// =========================================================================
// FFI Types
// =========================================================================

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStudioConfig {
    pub database_path: String,
    pub api_base_url: Option<String>,
    pub studio_id: String,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub log_filter: String,
}

impl From<StudioConfig> for FfiStudioConfig {
    fn from(config: StudioConfig) -> Self {
        Self {
            database_path: config.database_path.to_string_lossy().into_owned(),
            api_base_url: config.api_base_url,
            studio_id: config.studio_id,
            api_token: config.api_token,
            request_timeout_secs: config.request_timeout_secs,
            log_filter: config.log_filter,
        }
    }
}

impl From<FfiStudioConfig> for StudioConfig {
    fn from(config: FfiStudioConfig) -> Self {
        StudioConfig {
            database_path: config.database_path.into(),
            api_base_url: config.api_base_url.filter(|u| !u.trim().is_empty()),
            studio_id: config.studio_id,
            api_token: config.api_token,
            request_timeout_secs: config.request_timeout_secs,
            log_filter: config.log_filter,
        }
    }
}

/// Editable client fields.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiClientInput {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub skin_conditions: Vec<String>,
    pub notes: Option<String>,
}

impl FfiClientInput {
    fn apply_to(self, client: &mut Client) {
        let blank_to_none = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        client.first_name = self.first_name.trim().to_string();
        client.last_name = self.last_name.trim().to_string();
        client.email = blank_to_none(self.email);
        client.phone = blank_to_none(self.phone);
        client.date_of_birth = blank_to_none(self.date_of_birth);
        client.allergies = self.allergies;
        client.medications = self.medications;
        client.skin_conditions = self.skin_conditions;
        client.notes = blank_to_none(self.notes);
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClient {
    pub local_id: String,
    pub server_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    pub skin_conditions: Vec<String>,
    pub notes: Option<String>,
    pub reward_points: u32,
    /// Local edits not yet accepted by the remote
    pub sync_pending: bool,
    pub updated_at: String,
}

impl From<Client> for FfiClient {
    fn from(client: Client) -> Self {
        let sync_pending = client.server_id.is_none() || client.has_unpushed_changes().unwrap_or(true);
        Self {
            full_name: client.full_name(),
            local_id: client.local_id,
            server_id: client.server_id,
            first_name: client.first_name,
            last_name: client.last_name,
            email: client.email,
            phone: client.phone,
            date_of_birth: client.date_of_birth,
            allergies: client.allergies,
            medications: client.medications,
            skin_conditions: client.skin_conditions,
            notes: client.notes,
            reward_points: client.reward_points,
            sync_pending,
            updated_at: client.updated_at,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSimilarClient {
    pub client: FfiClient,
    pub score: f64,
}

impl From<SimilarClient> for FfiSimilarClient {
    fn from(similar: SimilarClient) -> Self {
        Self {
            client: similar.client.into(),
            score: similar.score,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportFailure {
    pub row_number: u32,
    pub reason: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportReport {
    pub total_rows: u32,
    pub created: u32,
    pub duplicates: u32,
    pub failed: u32,
    pub failures: Vec<FfiImportFailure>,
    pub duplicate_rows: Vec<u32>,
    pub unmapped_headers: Vec<String>,
}

impl From<import::ImportReport> for FfiImportReport {
    fn from(report: import::ImportReport) -> Self {
        let mut failures = Vec::new();
        let mut duplicate_rows = Vec::new();
        for row in &report.rows {
            match &row.status {
                import::RowStatus::Failed { reason } => failures.push(FfiImportFailure {
                    row_number: row.row_number,
                    reason: reason.clone(),
                }),
                import::RowStatus::Duplicate { .. } => duplicate_rows.push(row.row_number),
                import::RowStatus::Created { .. } => {}
            }
        }
        Self {
            total_rows: report.total_rows,
            created: report.created,
            duplicates: report.duplicates,
            failed: report.failed,
            failures,
            duplicate_rows,
            unmapped_headers: report.unmapped_headers,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPigmentRecommendation {
    pub family: String,
    pub modifier: Option<String>,
    pub rationale: String,
}

impl From<PigmentRecommendation> for FfiPigmentRecommendation {
    fn from(rec: PigmentRecommendation) -> Self {
        Self {
            family: rec.family,
            modifier: rec.modifier,
            rationale: rec.rationale,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiContraindication {
    pub trigger: String,
    /// "caution" or "defer"
    pub severity: String,
    pub note: String,
}

impl From<Contraindication> for FfiContraindication {
    fn from(flag: Contraindication) -> Self {
        Self {
            trigger: flag.trigger,
            severity: match flag.severity {
                Severity::Caution => "caution".to_string(),
                Severity::Defer => "defer".to_string(),
            },
            note: flag.note,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAnalysisRecord {
    pub analysis_id: String,
    pub client_id: String,
    pub fitzpatrick: u8,
    pub undertone: String,
    pub procedure: String,
    pub recommended_pigments: Vec<FfiPigmentRecommendation>,
    pub contraindications: Vec<FfiContraindication>,
    pub requires_deferral: bool,
    pub source: String,
    pub notes: Option<String>,
    pub analyzed_at: String,
}

impl From<AnalysisRecord> for FfiAnalysisRecord {
    fn from(record: AnalysisRecord) -> Self {
        Self {
            requires_deferral: record.requires_deferral(),
            analysis_id: record.analysis_id,
            client_id: record.client_id,
            fitzpatrick: record.fitzpatrick.number(),
            undertone: record.undertone.as_str().to_string(),
            procedure: record.procedure.as_str().to_string(),
            recommended_pigments: record.recommended_pigments.into_iter().map(Into::into).collect(),
            contraindications: record.contraindications.into_iter().map(Into::into).collect(),
            source: record.source.as_str().to_string(),
            notes: record.notes,
            analyzed_at: record.analyzed_at,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDocument {
    pub document_id: String,
    pub client_id: String,
    pub kind: String,
    pub file_name: String,
    pub url: String,
    pub sha256: String,
    pub added_at: String,
}

impl From<DocumentRef> for FfiDocument {
    fn from(doc: DocumentRef) -> Self {
        Self {
            document_id: doc.document_id,
            client_id: doc.client_id,
            kind: doc.kind.as_str().to_string(),
            file_name: doc.file_name,
            url: doc.url,
            sha256: doc.sha256,
            added_at: doc.added_at,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInsurance {
    /// Ignored by `add_insurance`, which assigns a new id
    pub insurance_id: String,
    pub client_id: String,
    pub provider: String,
    pub policy_number: String,
    pub coverage_notes: Option<String>,
    pub valid_until: Option<String>,
}

impl FfiInsurance {
    fn apply_to(self, record: &mut InsuranceRecord) {
        record.client_id = self.client_id;
        record.provider = self.provider.trim().to_string();
        record.policy_number = self.policy_number.trim().to_string();
        record.coverage_notes = self.coverage_notes;
        record.valid_until = self.valid_until.filter(|v| !v.trim().is_empty());
    }
}

impl From<InsuranceRecord> for FfiInsurance {
    fn from(record: InsuranceRecord) -> Self {
        Self {
            insurance_id: record.insurance_id,
            client_id: record.client_id,
            provider: record.provider,
            policy_number: record.policy_number,
            coverage_notes: record.coverage_notes,
            valid_until: record.valid_until,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTeamMember {
    pub member_id: String,
    pub server_id: Option<String>,
    pub name: String,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub created_at: String,
}

impl From<TeamMember> for FfiTeamMember {
    fn from(member: TeamMember) -> Self {
        Self {
            member_id: member.member_id,
            server_id: member.server_id,
            name: member.name,
            email: member.email,
            role: member.role.as_str().to_string(),
            active: member.active,
            created_at: member.created_at,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsentForm {
    pub form_id: String,
    pub server_id: Option<String>,
    pub title: String,
    pub body: String,
    pub version: u32,
    pub procedure: Option<String>,
    pub created_at: String,
}

impl From<ConsentForm> for FfiConsentForm {
    fn from(form: ConsentForm) -> Self {
        Self {
            form_id: form.form_id,
            server_id: form.server_id,
            title: form.title,
            body: form.body,
            version: form.version,
            procedure: form.procedure.map(|p| p.as_str().to_string()),
            created_at: form.created_at,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConsentRequest {
    pub request_id: String,
    pub form_id: String,
    pub form_version: u32,
    pub client_id: String,
    pub status: String,
    pub sent_at: String,
    pub signed_at: Option<String>,
    pub signature_name: Option<String>,
}

impl From<ConsentRequest> for FfiConsentRequest {
    fn from(request: ConsentRequest) -> Self {
        Self {
            request_id: request.request_id,
            form_id: request.form_id,
            form_version: request.form_version,
            client_id: request.client_id,
            status: request.status.as_str().to_string(),
            sent_at: request.sent_at,
            signed_at: request.signed_at,
            signature_name: request.signature_name,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDistributionReport {
    pub sent: Vec<FfiConsentRequest>,
    pub skipped_client_ids: Vec<String>,
}

impl From<DistributionReport> for FfiDistributionReport {
    fn from(report: DistributionReport) -> Self {
        Self {
            sent: report.sent.into_iter().map(Into::into).collect(),
            skipped_client_ids: report.skipped_client_ids,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRewardBalance {
    pub points: u32,
    pub tier: String,
    pub points_to_next_tier: Option<u32>,
}

impl From<RewardBalance> for FfiRewardBalance {
    fn from(balance: RewardBalance) -> Self {
        Self {
            points: balance.points,
            tier: balance.tier.as_str().to_string(),
            points_to_next_tier: balance.points_to_next_tier,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPushFailure {
    pub local_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPushReport {
    pub collection: String,
    pub pushed: u32,
    pub unchanged: u32,
    pub failed: Vec<FfiPushFailure>,
}

impl FfiPushReport {
    fn new<T: SyncRecord>(report: PushReport) -> Self {
        Self {
            collection: T::KIND.to_string(),
            pushed: report.pushed,
            unchanged: report.unchanged,
            failed: report
                .failed
                .into_iter()
                .map(|f| FfiPushFailure {
                    local_id: f.local_id,
                    reason: f.reason,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPullReport {
    pub collection: String,
    pub inserted: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub skipped_local_changes: u32,
    /// Server ids left out because they collide with local records
    pub conflicts: Vec<String>,
}

impl FfiPullReport {
    fn new<T: SyncRecord>(report: PullReport) -> Self {
        Self {
            collection: T::KIND.to_string(),
            inserted: report.inserted,
            updated: report.updated,
            unchanged: report.unchanged,
            skipped_local_changes: report.skipped_local_changes,
            conflicts: report.conflicts.into_iter().map(|c| c.server_id).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Arc<PmuStudioCore> {
        open_database_in_memory("studio-1".into()).unwrap()
    }

    fn input(first: &str, last: &str) -> FfiClientInput {
        FfiClientInput {
            first_name: first.into(),
            last_name: last.into(),
            ..FfiClientInput::default()
        }
    }

    #[test]
    fn test_client_lifecycle_offline() {
        let core = core();
        assert!(!core.is_online());

        let created = core.create_client(input(" Ana ", "Lima")).unwrap();
        assert_eq!(created.full_name, "Ana Lima");
        assert!(created.sync_pending);

        let mut edit = input("Ana", "Lima");
        edit.email = Some("ana@example.com".into());
        let updated = core.update_client(created.local_id.clone(), edit).unwrap();
        assert_eq!(updated.email.as_deref(), Some("ana@example.com"));

        assert!(matches!(
            core.delete_client(created.local_id.clone(), "ana lima".into()),
            Err(StudioError::ValidationFailed(_))
        ));
        core.delete_client(created.local_id.clone(), "Ana Lima".into()).unwrap();
        assert!(core.get_client(created.local_id).unwrap().is_none());
    }

    #[test]
    fn test_validation_error_surfaces() {
        let core = core();
        let err = core.create_client(input("", "")).unwrap_err();
        match err {
            StudioError::ValidationFailed(msg) => {
                assert!(msg.contains("first_name"));
                assert!(msg.contains("last_name"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sync_requires_api() {
        let core = core();
        assert!(matches!(core.push_pending(), Err(StudioError::SyncError(_))));
        core.create_client(input("Ana", "Lima")).unwrap();
        assert_eq!(core.pending_sync_count().unwrap(), 1);
    }

    #[test]
    fn test_analysis_through_ffi() {
        let core = core();
        let client = core.create_client(input("Ana", "Lima")).unwrap();

        let record = core
            .analyze_questionnaire(client.local_id.clone(), vec![2; 10], "warm".into(), "brows".into())
            .unwrap();
        assert_eq!(record.fitzpatrick, 3);
        assert!(!record.recommended_pigments.is_empty());
        assert_eq!(core.list_analyses(client.local_id.clone()).unwrap().len(), 1);

        assert!(matches!(
            core.record_analysis(client.local_id, 9, "warm".into(), "brows".into(), "manual".into(), None),
            Err(StudioError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_free_functions() {
        assert_eq!(classify_fitzpatrick(vec![0; 10]).unwrap(), 1);
        assert!(classify_fitzpatrick(vec![5; 10]).is_err());
        assert_eq!(tabs_for_role("client".into()).unwrap(), vec!["portal".to_string()]);
        assert!(!role_can("front desk".into(), "manage_team".into()).unwrap());
        assert!(tabs_for_role("janitor".into()).is_err());

        let flags = screen_contraindications(vec![], vec!["Accutane".into()], vec![]);
        assert_eq!(flags[0].severity, "defer");
    }

    #[test]
    fn test_team_and_consent_caches() {
        let core = core();
        core.add_team_member("Bea".into(), "bea@example.com".into(), "instructor".into())
            .unwrap();
        assert_eq!(core.cached_instructors().unwrap().len(), 1);

        let form = core
            .create_consent_form("Brows".into(), "I consent.".into(), Some("brows".into()))
            .unwrap();
        assert_eq!(core.cached_consent_forms().unwrap()[0].form_id, form.form_id);
    }

    #[test]
    fn test_import_report() {
        let core = core();
        let rows = vec![
            HashMap::from([("Name".to_string(), "Ana Lima".to_string())]),
            HashMap::from([("Name".to_string(), "Cher".to_string())]),
        ];
        let report = core.import_clients(rows).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].row_number, 2);
    }
}
