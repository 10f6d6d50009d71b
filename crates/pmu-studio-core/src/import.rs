//! Bulk client import from spreadsheet rows.
//!
//! Rows arrive already decoded as `header -> cell` maps. Headers are matched to
//! client fields by alias, falling back to Jaro-Winkler similarity for typos
//! and near-misses ("E-mail adress", "Surname "). Each row is validated and
//! created in order; the report carries one outcome per row.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::Client;
use crate::validation::validate_client;

/// Minimum similarity, per word, for a fuzzy header match.
pub const HEADER_SIMILARITY_THRESHOLD: f64 = 0.88;

/// Import errors that stop the whole import.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("No name column found among headers: {}", .0.join(", "))]
    NoNameColumn(Vec<String>),
}

pub type ImportResult<T> = Result<T, ImportError>;

/// Client fields a spreadsheet column can feed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ClientField {
    FirstName,
    LastName,
    /// "Full Name" style column, split into first and last
    FullName,
    Email,
    Phone,
    DateOfBirth,
    Allergies,
    Medications,
    SkinConditions,
    Notes,
}

/// Maps spreadsheet headers to client fields.
pub struct HeaderMapper {
    /// Normalized alias → field
    aliases: HashMap<String, ClientField>,
}

impl Default for HeaderMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderMapper {
    pub fn new() -> Self {
        Self {
            aliases: Self::default_aliases(),
        }
    }

    fn default_aliases() -> HashMap<String, ClientField> {
        use ClientField::*;

        let table: &[(ClientField, &[&str])] = &[
            (FirstName, &["first name", "firstname", "first", "given name", "forename"]),
            (LastName, &["last name", "lastname", "last", "surname", "family name"]),
            (FullName, &["full name", "fullname", "name", "client name", "client"]),
            (Email, &["email", "e mail", "email address", "e mail address", "mail"]),
            (Phone, &["phone", "phone number", "mobile", "cell", "telephone", "tel"]),
            (DateOfBirth, &["date of birth", "dob", "birthday", "birth date", "birthdate"]),
            (Allergies, &["allergies", "allergy", "known allergies"]),
            (Medications, &["medications", "medication", "current medications", "meds"]),
            (SkinConditions, &["skin conditions", "skin condition", "skin concerns", "conditions"]),
            (Notes, &["notes", "note", "comments", "remarks"]),
        ];

        table
            .iter()
            .flat_map(|(field, names)| names.iter().map(move |name| (name.to_string(), *field)))
            .collect()
    }

    /// Map one header, exact alias first, then the most similar alias.
    pub fn map_header(&self, header: &str) -> Option<ClientField> {
        self.match_header(header).map(|(field, _)| field)
    }

    /// The matched field and whether the match was an exact alias.
    fn match_header(&self, header: &str) -> Option<(ClientField, bool)> {
        let normalized = normalize_header(header);
        if normalized.is_empty() {
            return None;
        }
        if let Some(field) = self.aliases.get(&normalized) {
            return Some((*field, true));
        }

        let mut best: Option<(f64, ClientField)> = None;
        for (alias, field) in &self.aliases {
            let Some(score) = fuzzy_score(&normalized, alias) else {
                continue;
            };
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, *field));
            }
        }
        best.map(|(_, field)| (field, false))
    }

    /// Map a set of headers; unmapped headers are returned separately.
    ///
    /// A fuzzy match is dropped when another header names the same field
    /// exactly.
    pub fn map_headers<'h, I>(&self, headers: I) -> HeaderMapping
    where
        I: IntoIterator<Item = &'h str>,
    {
        let matched: Vec<(&str, Option<(ClientField, bool)>)> = headers
            .into_iter()
            .map(|header| (header, self.match_header(header)))
            .collect();
        let exact: HashSet<ClientField> = matched
            .iter()
            .filter_map(|(_, m)| match m {
                Some((field, true)) => Some(*field),
                _ => None,
            })
            .collect();

        let mut mapping = HeaderMapping::default();
        for (header, m) in matched {
            match m {
                Some((field, is_exact)) if is_exact || !exact.contains(&field) => {
                    mapping.columns.push((header.to_string(), field))
                }
                _ => mapping.unmapped.push(header.to_string()),
            }
        }
        mapping
    }
}

/// Word-by-word similarity of a normalized header to an alias.
///
/// Both must have the same number of words and every word must clear the
/// threshold, so "client id" never matches "client".
fn fuzzy_score(header: &str, alias: &str) -> Option<f64> {
    let header_words: Vec<&str> = header.split(' ').collect();
    let alias_words: Vec<&str> = alias.split(' ').collect();
    if header_words.len() != alias_words.len() {
        return None;
    }

    let mut total = 0.0;
    for (h, a) in header_words.iter().zip(&alias_words) {
        let score = jaro_winkler(h, a);
        if score < HEADER_SIMILARITY_THRESHOLD {
            return None;
        }
        total += score;
    }
    Some(total / header_words.len() as f64)
}

/// Lowercase, dots and apostrophes dropped, other punctuation to spaces,
/// whitespace collapsed.
fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | '\''))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderMapping {
    /// (original header, field) in header order
    pub columns: Vec<(String, ClientField)>,
    pub unmapped: Vec<String>,
}

impl HeaderMapping {
    pub fn has(&self, field: ClientField) -> bool {
        self.columns.iter().any(|(_, f)| *f == field)
    }

    fn has_name(&self) -> bool {
        self.has(ClientField::FullName)
            || (self.has(ClientField::FirstName) && self.has(ClientField::LastName))
    }

    /// First non-empty cell among the columns mapped to `field`.
    fn cell<'r>(&self, row: &'r BTreeMap<String, String>, field: ClientField) -> Option<&'r str> {
        self.columns
            .iter()
            .filter(|(_, f)| *f == field)
            .filter_map(|(header, _)| row.get(header))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
    }
}

/// Split a full name into (first, last).
///
/// "Lima, Ana" puts the surname first; otherwise the first word is the first
/// name and the rest is the last name.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let full_name = full_name.trim();
    if let Some((last, first)) = full_name.split_once(',') {
        return (first.trim().to_string(), last.trim().to_string());
    }
    match full_name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (full_name.to_string(), String::new()),
    }
}

/// Split a list cell ("latex; lidocaine, nickel").
fn split_list(cell: Option<&str>) -> Vec<String> {
    cell.map(|value| {
        value
            .split([',', ';'])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// What happened to one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Created { local_id: String },
    Duplicate { email: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOutcome {
    /// 1-based position among the data rows
    pub row_number: u32,
    pub status: RowStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub total_rows: u32,
    pub created: u32,
    pub duplicates: u32,
    pub failed: u32,
    pub rows: Vec<RowOutcome>,
    pub unmapped_headers: Vec<String>,
}

impl ImportReport {
    pub fn created_ids(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| match &row.status {
                RowStatus::Created { local_id } => Some(local_id.as_str()),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, row_number: u32, status: RowStatus) {
        match status {
            RowStatus::Created { .. } => self.created += 1,
            RowStatus::Duplicate { .. } => self.duplicates += 1,
            RowStatus::Failed { .. } => self.failed += 1,
        }
        self.rows.push(RowOutcome { row_number, status });
    }
}

/// Creates clients from spreadsheet rows.
pub struct ClientImporter<'a> {
    db: &'a Database,
    studio_id: &'a str,
    mapper: HeaderMapper,
}

impl<'a> ClientImporter<'a> {
    pub fn new(db: &'a Database, studio_id: &'a str) -> Self {
        Self {
            db,
            studio_id,
            mapper: HeaderMapper::new(),
        }
    }

    /// Import rows in order. Database errors abort; rows created before the
    /// error stay created.
    pub fn import(&self, rows: &[BTreeMap<String, String>]) -> ImportResult<ImportReport> {
        let headers: BTreeSet<&str> = rows
            .iter()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();
        let mapping = self.mapper.map_headers(headers.iter().copied());

        if !rows.is_empty() && !mapping.has_name() {
            return Err(ImportError::NoNameColumn(
                headers.iter().map(|h| h.to_string()).collect(),
            ));
        }

        let mut report = ImportReport {
            total_rows: rows.len() as u32,
            unmapped_headers: mapping.unmapped.clone(),
            ..ImportReport::default()
        };

        for (index, row) in rows.iter().enumerate() {
            let row_number = index as u32 + 1;
            let status = self.import_row(&mapping, row)?;
            if let RowStatus::Failed { reason } = &status {
                tracing::debug!(row_number, %reason, "import row rejected");
            }
            report.record(row_number, status);
        }

        tracing::info!(
            studio_id = self.studio_id,
            total = report.total_rows,
            created = report.created,
            duplicates = report.duplicates,
            failed = report.failed,
            "client import finished"
        );
        Ok(report)
    }

    fn import_row(&self, mapping: &HeaderMapping, row: &BTreeMap<String, String>) -> ImportResult<RowStatus> {
        let client = build_client(self.studio_id, mapping, row);

        if let Err(e) = validate_client(&client) {
            return Ok(RowStatus::Failed {
                reason: e.to_string(),
            });
        }

        if let Some(email) = client.email.as_deref() {
            if self.db.find_client_by_email(self.studio_id, email)?.is_some() {
                return Ok(RowStatus::Duplicate {
                    email: email.to_string(),
                });
            }
        }

        self.db.insert_client(&client)?;
        Ok(RowStatus::Created {
            local_id: client.local_id,
        })
    }
}

fn build_client(studio_id: &str, mapping: &HeaderMapping, row: &BTreeMap<String, String>) -> Client {
    let mut first = mapping.cell(row, ClientField::FirstName).unwrap_or_default().to_string();
    let mut last = mapping.cell(row, ClientField::LastName).unwrap_or_default().to_string();

    if first.is_empty() || last.is_empty() {
        if let Some(full_name) = mapping.cell(row, ClientField::FullName) {
            let (split_first, split_last) = split_full_name(full_name);
            if first.is_empty() {
                first = split_first;
            }
            if last.is_empty() {
                last = split_last;
            }
        }
    }

    let text = |field| mapping.cell(row, field).map(str::to_string);

    let mut client = Client::new(studio_id.to_string(), first, last);
    client.email = text(ClientField::Email);
    client.phone = text(ClientField::Phone);
    client.date_of_birth = text(ClientField::DateOfBirth);
    client.notes = text(ClientField::Notes);
    client.allergies = split_list(mapping.cell(row, ClientField::Allergies));
    client.medications = split_list(mapping.cell(row, ClientField::Medications));
    client.skin_conditions = split_list(mapping.cell(row, ClientField::SkinConditions));
    client
}
