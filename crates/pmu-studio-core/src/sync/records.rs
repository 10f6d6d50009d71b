//! Mapping between local records and remote payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::remote::{CLIENTS_PATH, CONSENT_FORMS_PATH, TEAM_MEMBERS_PATH};
use super::{sha256_hex, SyncError, SyncResult};
use crate::db::{Database, DbResult};
use crate::models::{Client, ConsentForm, Procedure, Role, TeamMember};

/// A locally stored record mirrored in a remote collection.
pub trait SyncRecord: Sized {
    /// Collection path on the studio API.
    const PATH: &'static str;
    /// Short name used for logs and sync state keys.
    const KIND: &'static str;

    fn local_id(&self) -> &str;
    fn server_id(&self) -> Option<&str>;
    fn synced_hash(&self) -> Option<&str>;

    /// Fields shared with the remote; local ids, sync bookkeeping and
    /// timestamps are excluded.
    fn payload(&self) -> SyncResult<Value>;

    /// Build a local record from a remote payload, keeping the local
    /// identity of `existing` when there is one.
    fn from_remote(studio_id: &str, server_id: &str, value: &Value, existing: Option<&Self>) -> SyncResult<Self>;

    fn load(db: &Database, local_id: &str) -> DbResult<Option<Self>>;
    fn load_by_server_id(db: &Database, server_id: &str) -> DbResult<Option<Self>>;
    fn list_local(db: &Database, studio_id: &str) -> DbResult<Vec<Self>>;
    fn insert_local(&self, db: &Database) -> DbResult<()>;
    fn update_local(&self, db: &Database) -> DbResult<bool>;
    fn delete_local(db: &Database, local_id: &str) -> DbResult<bool>;
    fn mark_synced(db: &Database, local_id: &str, server_id: &str, hash: &str) -> DbResult<bool>;

    /// Rewrite cache snapshots derived from this collection.
    fn refresh_cache(_db: &Database, _studio_id: &str) -> DbResult<()> {
        Ok(())
    }

    /// SHA-256 of the canonical payload JSON.
    fn fingerprint(&self) -> SyncResult<String> {
        let payload = self.payload()?;
        Ok(sha256_hex(serde_json::to_string(&payload)?.as_bytes()))
    }

    /// Whether the record differs from what was last pushed.
    fn has_unpushed_changes(&self) -> SyncResult<bool> {
        Ok(self.synced_hash() != Some(self.fingerprint()?.as_str()))
    }
}

fn decode<T: for<'de> Deserialize<'de>>(value: &Value) -> SyncResult<T> {
    serde_json::from_value(value.clone()).map_err(|e| SyncError::InvalidPayload(e.to_string()))
}

// =============================================================================
// Clients
// =============================================================================

#[derive(Serialize, Deserialize)]
struct ClientPayload {
    first_name: String,
    last_name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    date_of_birth: Option<String>,
    #[serde(default)]
    allergies: Vec<String>,
    #[serde(default)]
    medications: Vec<String>,
    #[serde(default)]
    skin_conditions: Vec<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    reward_points: u32,
}

impl SyncRecord for Client {
    const PATH: &'static str = CLIENTS_PATH;
    const KIND: &'static str = "clients";

    fn local_id(&self) -> &str {
        &self.local_id
    }

    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    fn synced_hash(&self) -> Option<&str> {
        self.synced_hash.as_deref()
    }

    fn payload(&self) -> SyncResult<Value> {
        let payload = ClientPayload {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            date_of_birth: self.date_of_birth.clone(),
            allergies: self.allergies.clone(),
            medications: self.medications.clone(),
            skin_conditions: self.skin_conditions.clone(),
            notes: self.notes.clone(),
            reward_points: self.reward_points,
        };
        Ok(serde_json::to_value(payload)?)
    }

    fn from_remote(studio_id: &str, server_id: &str, value: &Value, existing: Option<&Self>) -> SyncResult<Self> {
        let payload: ClientPayload = decode(value)?;
        let mut client = match existing {
            Some(local) => local.clone(),
            None => Client::new(studio_id.to_string(), String::new(), String::new()),
        };
        client.server_id = Some(server_id.to_string());
        client.first_name = payload.first_name;
        client.last_name = payload.last_name;
        client.email = payload.email;
        client.phone = payload.phone;
        client.date_of_birth = payload.date_of_birth;
        client.allergies = payload.allergies;
        client.medications = payload.medications;
        client.skin_conditions = payload.skin_conditions;
        client.notes = payload.notes;
        client.reward_points = payload.reward_points;
        client.synced_hash = Some(client.fingerprint()?);
        Ok(client)
    }

    fn load(db: &Database, local_id: &str) -> DbResult<Option<Self>> {
        db.get_client(local_id)
    }

    fn load_by_server_id(db: &Database, server_id: &str) -> DbResult<Option<Self>> {
        db.get_client_by_server_id(server_id)
    }

    fn list_local(db: &Database, studio_id: &str) -> DbResult<Vec<Self>> {
        db.list_clients(studio_id)
    }

    fn insert_local(&self, db: &Database) -> DbResult<()> {
        db.insert_client(self)
    }

    fn update_local(&self, db: &Database) -> DbResult<bool> {
        db.update_client(self)
    }

    fn delete_local(db: &Database, local_id: &str) -> DbResult<bool> {
        db.delete_client(local_id)
    }

    fn mark_synced(db: &Database, local_id: &str, server_id: &str, hash: &str) -> DbResult<bool> {
        db.mark_client_synced(local_id, server_id, hash)
    }
}

// =============================================================================
// Team members
// =============================================================================

#[derive(Serialize, Deserialize)]
struct TeamMemberPayload {
    name: String,
    email: String,
    role: Role,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl SyncRecord for TeamMember {
    const PATH: &'static str = TEAM_MEMBERS_PATH;
    const KIND: &'static str = "team_members";

    fn local_id(&self) -> &str {
        &self.member_id
    }

    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    fn synced_hash(&self) -> Option<&str> {
        self.synced_hash.as_deref()
    }

    fn payload(&self) -> SyncResult<Value> {
        let payload = TeamMemberPayload {
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            active: self.active,
        };
        Ok(serde_json::to_value(payload)?)
    }

    fn from_remote(studio_id: &str, server_id: &str, value: &Value, existing: Option<&Self>) -> SyncResult<Self> {
        let payload: TeamMemberPayload = decode(value)?;
        let mut member = match existing {
            Some(local) => local.clone(),
            None => TeamMember::new(studio_id.to_string(), String::new(), String::new(), payload.role),
        };
        member.server_id = Some(server_id.to_string());
        member.name = payload.name;
        member.email = payload.email;
        member.role = payload.role;
        member.active = payload.active;
        member.synced_hash = Some(member.fingerprint()?);
        Ok(member)
    }

    fn load(db: &Database, local_id: &str) -> DbResult<Option<Self>> {
        db.get_team_member(local_id)
    }

    fn load_by_server_id(db: &Database, server_id: &str) -> DbResult<Option<Self>> {
        db.get_team_member_by_server_id(server_id)
    }

    fn list_local(db: &Database, studio_id: &str) -> DbResult<Vec<Self>> {
        db.list_team_members(studio_id, true)
    }

    fn insert_local(&self, db: &Database) -> DbResult<()> {
        db.insert_team_member(self)
    }

    fn update_local(&self, db: &Database) -> DbResult<bool> {
        db.update_team_member(self)
    }

    fn delete_local(db: &Database, local_id: &str) -> DbResult<bool> {
        db.delete_team_member(local_id)
    }

    fn mark_synced(db: &Database, local_id: &str, server_id: &str, hash: &str) -> DbResult<bool> {
        db.mark_team_member_synced(local_id, server_id, hash)
    }

    fn refresh_cache(db: &Database, studio_id: &str) -> DbResult<()> {
        db.refresh_team_snapshots(studio_id)
    }
}

// =============================================================================
// Consent forms
// =============================================================================

#[derive(Serialize, Deserialize)]
struct ConsentFormPayload {
    title: String,
    body: String,
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    procedure: Option<Procedure>,
}

fn default_version() -> u32 {
    1
}

impl SyncRecord for ConsentForm {
    const PATH: &'static str = CONSENT_FORMS_PATH;
    const KIND: &'static str = "consent_forms";

    fn local_id(&self) -> &str {
        &self.form_id
    }

    fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    fn synced_hash(&self) -> Option<&str> {
        self.synced_hash.as_deref()
    }

    fn payload(&self) -> SyncResult<Value> {
        let payload = ConsentFormPayload {
            title: self.title.clone(),
            body: self.body.clone(),
            version: self.version,
            procedure: self.procedure,
        };
        Ok(serde_json::to_value(payload)?)
    }

    fn from_remote(studio_id: &str, server_id: &str, value: &Value, existing: Option<&Self>) -> SyncResult<Self> {
        let payload: ConsentFormPayload = decode(value)?;
        let mut form = match existing {
            Some(local) => local.clone(),
            None => ConsentForm::new(studio_id.to_string(), String::new(), String::new()),
        };
        form.server_id = Some(server_id.to_string());
        form.title = payload.title;
        form.body = payload.body;
        form.version = payload.version;
        form.procedure = payload.procedure;
        form.synced_hash = Some(form.fingerprint()?);
        Ok(form)
    }

    fn load(db: &Database, local_id: &str) -> DbResult<Option<Self>> {
        db.get_consent_form(local_id)
    }

    fn load_by_server_id(db: &Database, server_id: &str) -> DbResult<Option<Self>> {
        db.get_consent_form_by_server_id(server_id)
    }

    fn list_local(db: &Database, studio_id: &str) -> DbResult<Vec<Self>> {
        db.list_consent_forms(studio_id)
    }

    fn insert_local(&self, db: &Database) -> DbResult<()> {
        db.insert_consent_form(self)
    }

    fn update_local(&self, db: &Database) -> DbResult<bool> {
        db.overwrite_consent_form(self)
    }

    fn delete_local(db: &Database, local_id: &str) -> DbResult<bool> {
        db.delete_consent_form(local_id)
    }

    fn mark_synced(db: &Database, local_id: &str, server_id: &str, hash: &str) -> DbResult<bool> {
        db.mark_consent_form_synced(local_id, server_id, hash)
    }

    fn refresh_cache(db: &Database, studio_id: &str) -> DbResult<()> {
        db.refresh_consent_form_snapshot(studio_id)
    }
}
