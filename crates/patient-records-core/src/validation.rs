//! Per-field constraints for patient payloads.
//!
//! | Field            | Required | Max chars | Format |
//! |------------------|----------|-----------|--------|
//! | `documentType`   | yes      | 10        |        |
//! | `documentNumber` | yes      | 20        |        |
//! | `firstName`      | yes      | 80        |        |
//! | `lastName`       | yes      | 80        |        |
//! | `birthDate`      | yes      |           | date   |
//! | `phoneNumber`    | no       | 20        |        |
//! | `email`          | no       | 120       | email  |

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::models::{parse_date, NewPatient, PatientInput};

pub const DOCUMENT_TYPE_MAX: usize = 10;
pub const DOCUMENT_NUMBER_MAX: usize = 20;
pub const NAME_MAX: usize = 80;
pub const PHONE_NUMBER_MAX: usize = 20;
pub const EMAIL_MAX: usize = 120;

/// A single violated constraint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    /// Wire (camelCase) field name
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Every constraint violated by one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Names of the violated fields, in check order.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Validate a full payload, producing the persistable fields or every violation.
pub fn validate_input(input: &PatientInput) -> Result<NewPatient, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_required(&mut errors, "documentType", &input.document_type, DOCUMENT_TYPE_MAX);
    check_required(&mut errors, "documentNumber", &input.document_number, DOCUMENT_NUMBER_MAX);
    check_required(&mut errors, "firstName", &input.first_name, NAME_MAX);
    check_required(&mut errors, "lastName", &input.last_name, NAME_MAX);

    let birth_date = match input.birth_date.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push("birthDate", "is required");
            None
        }
        Some(raw) => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push("birthDate", "is not a valid date");
            }
            parsed
        }
    };

    if let Some(phone) = &input.phone_number {
        check_max_len(&mut errors, "phoneNumber", phone, PHONE_NUMBER_MAX);
    }

    if let Some(email) = &input.email {
        check_max_len(&mut errors, "email", email, EMAIL_MAX);
        if !email.validate_email() {
            errors.push("email", "is not a valid email address");
        }
    }

    match birth_date {
        Some(birth_date) if errors.is_empty() => Ok(NewPatient {
            document_type: input.document_type.clone(),
            document_number: input.document_number.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            birth_date,
            phone_number: input.phone_number.clone(),
            email: input.email.clone(),
        }),
        _ => Err(errors),
    }
}

fn check_required(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.push(field, "is required");
    } else {
        check_max_len(errors, field, value, max);
    }
}

fn check_max_len(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.push(field, format!("must be at most {} characters", max));
    }
}
