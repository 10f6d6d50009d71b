//! Save-time validation of form input.
//!
//! Every check reports all offending fields at once so the form can highlight
//! them together.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Client, ConsentForm, InsuranceRecord, TeamMember};

/// A single field that failed validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid fields: {}", format_fields(.0))]
    Fields(Vec<FieldError>),

    #[error("Confirmation text does not match \"{expected}\"")]
    ConfirmationMismatch { expected: String },
}

impl ValidationError {
    /// Names of the offending fields, empty for confirmation mismatches.
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            ValidationError::Fields(fields) => fields.iter().map(|f| f.field.as_str()).collect(),
            ValidationError::ConfirmationMismatch { .. } => Vec::new(),
        }
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{} ({})", f.field, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type ValidationResult = Result<(), ValidationError>;

/// Collects field errors and turns them into a result.
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(FieldError::new(field, "is required"));
        }
        self
    }

    fn email(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            if !value.trim().is_empty() && !is_plausible_email(value) {
                self.errors.push(FieldError::new(field, "is not a valid email"));
            }
        }
        self
    }

    fn date(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            if !value.trim().is_empty()
                && chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_err()
            {
                self.errors
                    .push(FieldError::new(field, "must be a date (YYYY-MM-DD)"));
            }
        }
        self
    }

    fn finish(&mut self) -> ValidationResult {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(std::mem::take(&mut self.errors)))
        }
    }
}

/// Loose shape check: one `@`, non-empty local part, dotted domain, no spaces.
pub fn is_plausible_email(value: &str) -> bool {
    let value = value.trim();
    if value.contains(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Required: first name, last name. Optional fields must be well-formed.
pub fn validate_client(client: &Client) -> ValidationResult {
    Checker::default()
        .required("first_name", &client.first_name)
        .required("last_name", &client.last_name)
        .email("email", client.email.as_deref())
        .date("date_of_birth", client.date_of_birth.as_deref())
        .finish()
}

pub fn validate_team_member(member: &TeamMember) -> ValidationResult {
    let mut checker = Checker::default();
    checker
        .required("name", &member.name)
        .required("email", &member.email)
        .email("email", Some(&member.email));
    if !member.role.is_staff() {
        checker
            .errors
            .push(FieldError::new("role", "must be a staff role"));
    }
    checker.finish()
}

pub fn validate_consent_form(form: &ConsentForm) -> ValidationResult {
    Checker::default()
        .required("title", &form.title)
        .required("body", &form.body)
        .finish()
}

pub fn validate_insurance(record: &InsuranceRecord) -> ValidationResult {
    Checker::default()
        .required("provider", &record.provider)
        .required("policy_number", &record.policy_number)
        .date("valid_until", record.valid_until.as_deref())
        .finish()
}

/// Destructive actions require the user to type the record's name exactly.
///
/// Case-sensitive; only leading and trailing whitespace is ignored.
pub fn confirm_deletion(expected_name: &str, typed: &str) -> ValidationResult {
    let expected = expected_name.trim();
    if !expected.is_empty() && typed.trim() == expected {
        Ok(())
    } else {
        Err(ValidationError::ConfirmationMismatch {
            expected: expected.to_string(),
        })
    }
}

/// A consent signature is the client's full name, case-insensitive.
pub fn validate_signature(full_name: &str, signature: &str) -> ValidationResult {
    let expected = full_name.trim().to_lowercase();
    if !expected.is_empty() && signature.trim().to_lowercase() == expected {
        Ok(())
    } else {
        Err(ValidationError::Fields(vec![FieldError::new(
            "signature_name",
            "must match the client's full name",
        )]))
    }
}
