//! Local snapshot cache and sync bookkeeping.
//!
//! The cache holds one JSON document per key, mirroring what the web front end
//! keeps in browser storage so that lists render before the network answers.

use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use super::{Database, DbResult};
use crate::models::{ConsentForm, TeamMember};

/// Snapshot of the studio's team members.
pub const CACHE_TEAM_MEMBERS: &str = "studio-team-members";
/// Snapshot of the team members holding the instructor role.
pub const CACHE_INSTRUCTORS: &str = "studio-instructors";
/// Snapshot of the studio's consent form templates.
pub const CACHE_CONSENT_FORMS: &str = "consent-forms";

impl Database {
    /// Read and decode a cached snapshot.
    pub fn cache_get<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    /// Replace a cached snapshot.
    pub fn cache_put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> DbResult<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, json],
        )?;
        tracing::debug!(key, "cache snapshot written");
        Ok(())
    }

    /// Drop a cached snapshot.
    pub fn cache_remove(&self, key: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM cache_entries WHERE key = ?", [key])?;
        Ok(rows_affected > 0)
    }

    /// Rewrite the team and instructor snapshots from the store.
    pub fn refresh_team_snapshots(&self, studio_id: &str) -> DbResult<()> {
        let members = self.list_team_members(studio_id, false)?;
        let instructors: Vec<&TeamMember> = members.iter().filter(|m| m.is_instructor()).collect();
        self.cache_put(CACHE_TEAM_MEMBERS, &members)?;
        self.cache_put(CACHE_INSTRUCTORS, &instructors)?;
        Ok(())
    }

    /// Rewrite the consent form snapshot from the store.
    pub fn refresh_consent_form_snapshot(&self, studio_id: &str) -> DbResult<()> {
        let forms = self.list_consent_forms(studio_id)?;
        self.cache_put(CACHE_CONSENT_FORMS, &forms)
    }

    pub fn cached_team_members(&self) -> DbResult<Option<Vec<TeamMember>>> {
        self.cache_get(CACHE_TEAM_MEMBERS)
    }

    pub fn cached_instructors(&self) -> DbResult<Option<Vec<TeamMember>>> {
        self.cache_get(CACHE_INSTRUCTORS)
    }

    pub fn cached_consent_forms(&self) -> DbResult<Option<Vec<ConsentForm>>> {
        self.cache_get(CACHE_CONSENT_FORMS)
    }

    /// Get sync state value.
    pub fn get_sync_state(&self, key: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Set sync state value.
    pub fn set_sync_state(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_state (key, value, updated_at) VALUES (?, ?, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }
}
