//! Synchronization between the local store and the studio's REST collections.
//!
//! Every local write lands in SQLite first. A push sends the record's payload
//! to its remote collection and, on success, remembers the payload hash in
//! `synced_hash`; records whose current hash differs are pending. Failures are
//! returned to the caller and never retried here.
//!
//! Pulls apply remote records over local ones (last writer wins), except that a
//! local record with unpushed edits is left alone until it has been pushed.

mod records;
mod remote;

pub use records::*;
pub use remote::*;

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::db::{Database, DbError};

/// Sync errors.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot reach {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Result of pushing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed { server_id: String },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushFailure {
    pub local_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReport {
    pub pushed: u32,
    pub unchanged: u32,
    pub failed: Vec<PushFailure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullReport {
    pub inserted: u32,
    pub updated: u32,
    pub unchanged: u32,
    /// Remote versions not applied because the local copy has unpushed edits
    pub skipped_local_changes: u32,
    /// Remote records that collide with a local one, e.g. on team email
    pub conflicts: Vec<PullConflict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullConflict {
    pub server_id: String,
    pub reason: String,
}

/// Push/pull driver for one record type against one remote collection.
pub struct CollectionSync<'a, T> {
    db: &'a Database,
    remote: &'a dyn RemoteCollection,
    studio_id: &'a str,
    _record: PhantomData<T>,
}

impl<'a, T: SyncRecord> CollectionSync<'a, T> {
    pub fn new(db: &'a Database, remote: &'a dyn RemoteCollection, studio_id: &'a str) -> Self {
        Self {
            db,
            remote,
            studio_id,
            _record: PhantomData,
        }
    }

    /// Push one record if it changed since the last successful push.
    pub fn push(&self, local_id: &str) -> SyncResult<PushOutcome> {
        let record = T::load(self.db, local_id)?
            .ok_or_else(|| SyncError::NotFound(local_id.to_string()))?;
        let outcome = self.push_record(&record)?;
        if matches!(outcome, PushOutcome::Pushed { .. }) {
            T::refresh_cache(self.db, self.studio_id)?;
        }
        Ok(outcome)
    }

    /// Push every pending record in the studio.
    ///
    /// Remote failures are collected per record; a local database error aborts.
    pub fn push_pending(&self) -> SyncResult<PushReport> {
        let mut report = PushReport::default();

        for record in T::list_local(self.db, self.studio_id)? {
            match self.push_record(&record) {
                Ok(PushOutcome::Pushed { .. }) => report.pushed += 1,
                Ok(PushOutcome::Unchanged) => report.unchanged += 1,
                Err(SyncError::Database(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(kind = T::KIND, local_id = record.local_id(), error = %e, "push failed");
                    report.failed.push(PushFailure {
                        local_id: record.local_id().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.pushed > 0 {
            T::refresh_cache(self.db, self.studio_id)?;
        }
        tracing::info!(
            kind = T::KIND,
            pushed = report.pushed,
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "push finished"
        );
        Ok(report)
    }

    fn push_record(&self, record: &T) -> SyncResult<PushOutcome> {
        let hash = record.fingerprint()?;
        if record.server_id().is_some() && record.synced_hash() == Some(hash.as_str()) {
            return Ok(PushOutcome::Unchanged);
        }

        let payload = record.payload()?;
        let stored = match record.server_id() {
            Some(server_id) => self.remote.update(server_id, &payload)?,
            None => self.remote.create(&payload)?,
        };
        let server_id = match record.server_id() {
            Some(server_id) => server_id.to_string(),
            None => remote_id(&stored)?,
        };

        T::mark_synced(self.db, record.local_id(), &server_id, &hash)?;
        tracing::debug!(kind = T::KIND, local_id = record.local_id(), %server_id, "pushed");
        Ok(PushOutcome::Pushed { server_id })
    }

    /// Fetch the remote collection and apply it locally.
    ///
    /// Records that break a local uniqueness rule are reported as conflicts
    /// and skipped; caches and the last-pull stamp are still refreshed.
    pub fn pull(&self) -> SyncResult<PullReport> {
        let items = self.remote.list()?;
        let mut report = PullReport::default();

        for value in &items {
            let server_id = remote_id(value)?;
            let existing = T::load_by_server_id(self.db, &server_id)?;

            match existing {
                Some(local) if local.has_unpushed_changes()? => {
                    tracing::debug!(kind = T::KIND, %server_id, "keeping unpushed local edits");
                    report.skipped_local_changes += 1;
                }
                Some(local) => {
                    let incoming = T::from_remote(self.studio_id, &server_id, value, Some(&local))?;
                    if incoming.synced_hash() == local.synced_hash() {
                        report.unchanged += 1;
                        continue;
                    }
                    if let Err(e) = incoming.update_local(self.db) {
                        match e {
                            DbError::Constraint(reason) => {
                                self.record_conflict(&mut report, server_id, reason);
                                continue;
                            }
                            e => return Err(e.into()),
                        }
                    }
                    if let Some(hash) = incoming.synced_hash() {
                        T::mark_synced(self.db, incoming.local_id(), &server_id, hash)?;
                    }
                    report.updated += 1;
                }
                None => {
                    let incoming = T::from_remote(self.studio_id, &server_id, value, None)?;
                    match incoming.insert_local(self.db) {
                        Ok(()) => report.inserted += 1,
                        Err(DbError::Constraint(reason)) => {
                            self.record_conflict(&mut report, server_id, reason)
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        self.db.set_sync_state(
            &format!("{}_last_pull", T::KIND),
            &chrono::Utc::now().to_rfc3339(),
        )?;
        T::refresh_cache(self.db, self.studio_id)?;

        tracing::info!(
            kind = T::KIND,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped_local_changes,
            conflicts = report.conflicts.len(),
            "pull finished"
        );
        Ok(report)
    }

    /// A colliding remote record is left out; the rest of the pull goes on.
    fn record_conflict(&self, report: &mut PullReport, server_id: String, reason: String) {
        tracing::warn!(kind = T::KIND, %server_id, %reason, "remote record conflicts with local data");
        report.conflicts.push(PullConflict { server_id, reason });
    }

    /// Delete a record remotely (when it was ever pushed) and then locally.
    ///
    /// A remote failure leaves the local record in place.
    pub fn delete(&self, local_id: &str) -> SyncResult<bool> {
        let Some(record) = T::load(self.db, local_id)? else {
            return Ok(false);
        };
        if let Some(server_id) = record.server_id() {
            self.remote.delete(server_id)?;
        }
        let deleted = T::delete_local(self.db, local_id)?;
        T::refresh_cache(self.db, self.studio_id)?;
        Ok(deleted)
    }

    /// Number of records in the studio that differ from their last push.
    pub fn pending_count(&self) -> SyncResult<usize> {
        let mut count = 0;
        for record in T::list_local(self.db, self.studio_id)? {
            if record.server_id().is_none() || record.has_unpushed_changes()? {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn last_pull(&self) -> SyncResult<Option<String>> {
        let value = self.db.get_sync_state(&format!("{}_last_pull", T::KIND))?;
        Ok(value.filter(|s| !s.is_empty()))
    }
}
