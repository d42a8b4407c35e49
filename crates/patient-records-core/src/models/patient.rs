//! Patient models.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Store-assigned identifier, immutable
    pub id: i64,
    /// Document type (e.g., "CC", "TI", "PAS")
    pub document_type: String,
    /// Document number, unique together with `document_type`
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    /// Set once by the store on insert
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// The (document_type, document_number) pair identifying this patient.
    pub fn document_identity(&self) -> (&str, &str) {
        (&self.document_type, &self.document_number)
    }

    /// Overwrite every mutable field, keeping `id` and `created_at`.
    pub fn apply(&mut self, fields: NewPatient) {
        self.document_type = fields.document_type;
        self.document_number = fields.document_number;
        self.first_name = fields.first_name;
        self.last_name = fields.last_name;
        self.birth_date = fields.birth_date;
        self.phone_number = fields.phone_number;
        self.email = fields.email;
    }
}

/// Validated mutable fields of a patient, ready to persist.
///
/// Only produced by [`crate::validation::validate_input`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub document_type: String,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

impl NewPatient {
    pub fn document_identity(&self) -> (&str, &str) {
        (&self.document_type, &self.document_number)
    }
}

/// Create/replace payload as received from a client.
///
/// Every field may be missing, and `birth_date` is kept as sent, so that
/// validation can report all violations at once instead of failing on the
/// first absent key or unparseable date.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientInput {
    pub document_type: String,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

impl From<&Patient> for PatientInput {
    fn from(patient: &Patient) -> Self {
        Self {
            document_type: patient.document_type.clone(),
            document_number: patient.document_number.clone(),
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            birth_date: Some(format_date(patient.birth_date)),
            phone_number: patient.phone_number.clone(),
            email: patient.email.clone(),
        }
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a calendar date from `YYYY-MM-DD`, a naive ISO datetime, or RFC 3339.
///
/// Datetime forms are truncated to their date part.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(datetime.date());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Patient {
        Patient {
            id: 1,
            document_type: "CC".into(),
            document_number: "123".into(),
            first_name: "Ana".into(),
            last_name: "Gomez".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            phone_number: None,
            email: Some("ana@example.com".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["documentType"], "CC");
        assert_eq!(json["documentNumber"], "123");
        assert_eq!(json["birthDate"], "1990-01-01");
        assert!(json["phoneNumber"].is_null());
    }

    #[test]
    fn test_input_missing_fields_default() {
        let input: PatientInput = serde_json::from_str(r#"{"firstName":"Ana"}"#).unwrap();
        assert_eq!(input.first_name, "Ana");
        assert!(input.document_type.is_empty());
        assert!(input.birth_date.is_none());
    }

    #[test]
    fn test_input_seeded_from_patient() {
        let patient = sample();
        let input = PatientInput::from(&patient);
        assert_eq!(input.first_name, "Ana");
        assert_eq!(input.birth_date.as_deref(), Some("1990-01-01"));
        assert_eq!(input.email, patient.email);
    }

    #[test]
    fn test_input_keeps_unparseable_date() {
        let input: PatientInput =
            serde_json::from_str(r#"{"birthDate":"not a date"}"#).unwrap();
        assert_eq!(input.birth_date.as_deref(), Some("not a date"));
    }

    #[test]
    fn test_parse_date_forms() {
        let expected = NaiveDate::from_ymd_opt(1990, 1, 1);
        assert_eq!(parse_date("1990-01-01"), expected);
        assert_eq!(parse_date("1990-01-01T00:00:00"), expected);
        assert_eq!(parse_date("1990-01-01T08:30:00Z"), expected);
        assert_eq!(parse_date("01/01/1990"), None);
        assert_eq!(parse_date(""), None);
    }
}
