//! Error taxonomy surfaced at the request boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DbError;
use crate::patch::MalformedPatch;
use crate::validation::{FieldError, ValidationErrors};

/// Resource manager errors. All are recoverable per request.
#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("A patient with document {document_type} {document_number} already exists")]
    DuplicateDocument {
        document_type: String,
        document_number: String,
    },

    #[error("Patient {0} not found")]
    NotFound(i64),

    #[error("Malformed patch: {0}")]
    MalformedPatch(String),

    /// Unclassified persistence failure; the cause stays out of the message.
    #[error("Internal storage error")]
    Storage(#[source] DbError),
}

pub type PatientResult<T> = Result<T, PatientError>;

impl From<ValidationErrors> for PatientError {
    fn from(e: ValidationErrors) -> Self {
        PatientError::Validation(e)
    }
}

impl From<MalformedPatch> for PatientError {
    fn from(e: MalformedPatch) -> Self {
        PatientError::MalformedPatch(e.0)
    }
}

impl PatientError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PatientError::Validation(_) => "ValidationError",
            PatientError::DuplicateDocument { .. } => "DuplicateDocument",
            PatientError::NotFound(_) => "NotFound",
            PatientError::MalformedPatch(_) => "MalformedPatch",
            PatientError::Storage(_) => "InternalError",
        }
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            PatientError::Validation(_) | PatientError::MalformedPatch(_) => 400,
            PatientError::NotFound(_) => 404,
            PatientError::DuplicateDocument { .. } => 409,
            PatientError::Storage(_) => 500,
        }
    }

    /// Structured client-facing body.
    pub fn to_response(&self) -> ErrorResponse {
        let fields = match self {
            PatientError::Validation(errors) => errors.errors().to_vec(),
            _ => Vec::new(),
        };
        ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            fields,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let validation = PatientError::Validation(ValidationErrors::single("email", "bad"));
        assert_eq!(validation.status_code(), 400);
        assert_eq!(PatientError::MalformedPatch("x".into()).status_code(), 400);
        assert_eq!(PatientError::NotFound(1).status_code(), 404);
        let duplicate = PatientError::DuplicateDocument {
            document_type: "CC".into(),
            document_number: "1".into(),
        };
        assert_eq!(duplicate.status_code(), 409);
        let storage = PatientError::Storage(DbError::InvalidRow("x".into()));
        assert_eq!(storage.status_code(), 500);
    }

    #[test]
    fn test_storage_message_hides_cause() {
        let err = PatientError::Storage(DbError::InvalidRow("patient 3: secret detail".into()));
        let response = err.to_response();
        assert_eq!(response.error, "InternalError");
        assert!(!response.message.contains("secret"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_validation_response_lists_fields() {
        let mut errors = ValidationErrors::single("firstName", "is required");
        errors.push("email", "is not a valid email address");
        let response = PatientError::from(errors).to_response();

        assert_eq!(response.error, "ValidationError");
        assert_eq!(response.fields.len(), 2);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["fields"][0]["field"], "firstName");
    }

    #[test]
    fn test_non_validation_response_omits_fields() {
        let json = serde_json::to_value(PatientError::NotFound(9).to_response()).unwrap();
        assert_eq!(json["error"], "NotFound");
        assert_eq!(json["message"], "Patient 9 not found");
        assert!(json.get("fields").is_none());
    }
}
