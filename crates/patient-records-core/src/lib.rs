//! Patient Records Core Library
//!
//! Patient resource management over a relational store, with document
//! identity (document type + number) kept unique across all records.
//!
//! # Architecture
//!
//! ```text
//!   create / replace / patch / delete / get / list
//!                       │
//!           ┌───────────▼────────────┐
//!           │    PatientManager      │  validation, merge, duplicate pre-check
//!           └───────────┬────────────┘
//!                       │ PatientStore
//!           ┌───────────▼────────────┐
//!           │   Database (SQLite)    │  UNIQUE(document_type, document_number)
//!           └────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer implementing [`store::PatientStore`]
//! - [`models`]: Domain types (Patient, PatientInput, PatientPage, etc.)
//! - [`manager`]: Resource manager operations
//! - [`patch`]: Sparse patch parsing and merge
//! - [`validation`]: Per-field constraints
//! - [`error`]: Request-boundary error taxonomy
//! - [`config`], [`logging`]: Startup configuration and tracing setup

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod manager;
pub mod models;
pub mod patch;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use config::CoreConfig;
pub use db::Database;
pub use error::{ErrorResponse, PatientError, PatientResult};
pub use manager::PatientManager;
pub use models::{ListQuery, NewPatient, Patient, PatientFilter, PatientInput, PatientPage};
pub use patch::{merge_patch, PatientPatch};
pub use store::PatientStore;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PatientRecordsError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate document: {0}")]
    DuplicateDocument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed patch: {0}")]
    MalformedPatch(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Only message a storage failure carries across the boundary.
const STORAGE_FAILURE: &str = "Internal storage error";

impl From<PatientError> for PatientRecordsError {
    fn from(e: PatientError) -> Self {
        let message = e.to_string();
        match e {
            PatientError::Validation(errors) => PatientRecordsError::ValidationError(errors.to_string()),
            PatientError::DuplicateDocument { .. } => PatientRecordsError::DuplicateDocument(message),
            PatientError::NotFound(_) => PatientRecordsError::NotFound(message),
            PatientError::MalformedPatch(detail) => PatientRecordsError::MalformedPatch(detail),
            PatientError::Storage(_) => PatientRecordsError::StorageError(message),
        }
    }
}

impl From<db::DbError> for PatientRecordsError {
    fn from(e: db::DbError) -> Self {
        tracing::error!(error = %e, "database failure");
        PatientRecordsError::StorageError(STORAGE_FAILURE.into())
    }
}

impl From<config::ConfigError> for PatientRecordsError {
    fn from(e: config::ConfigError) -> Self {
        PatientRecordsError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PatientRecordsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        tracing::error!(error = %e, "database lock poisoned");
        PatientRecordsError::StorageError(STORAGE_FAILURE.into())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<PatientRecordsCore>, PatientRecordsError> {
    let db = Database::open(&path)?;
    Ok(PatientRecordsCore::wrap(db, CoreConfig::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<PatientRecordsCore>, PatientRecordsError> {
    let db = Database::open_in_memory()?;
    Ok(PatientRecordsCore::wrap(db, CoreConfig::default()))
}

/// Open the database described by the environment (and `.env`).
#[uniffi::export]
pub fn open_from_env() -> Result<Arc<PatientRecordsCore>, PatientRecordsError> {
    let config = CoreConfig::from_env()?;
    let db = match config.database_path() {
        Some(path) => Database::open(path)?,
        None => Database::open_in_memory()?,
    };
    Ok(PatientRecordsCore::wrap(db, config))
}

/// Install the tracing subscriber. Returns false if one was already installed.
#[uniffi::export]
pub fn init_logging(directive: Option<String>) -> bool {
    logging::init_logging(directive.as_deref().unwrap_or(logging::DEFAULT_DIRECTIVE))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct PatientRecordsCore {
    db: Arc<Mutex<Database>>,
    config: CoreConfig,
}

impl PatientRecordsCore {
    fn wrap(db: Database, config: CoreConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
        })
    }
}

#[uniffi::export]
impl PatientRecordsCore {
    /// Create a new patient.
    pub fn create_patient(&self, input: FfiPatientInput) -> Result<FfiPatient, PatientRecordsError> {
        let input = PatientInput::from(input);
        let db = self.db.lock()?;
        let patient = PatientManager::with_config(&*db, &self.config).create(&input)?;
        Ok(patient.into())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: i64) -> Result<FfiPatient, PatientRecordsError> {
        let db = self.db.lock()?;
        let patient = PatientManager::with_config(&*db, &self.config).get(id)?;
        Ok(patient.into())
    }

    /// List patients, newest first, with optional name and document filters.
    pub fn list_patients(
        &self,
        page: Option<i64>,
        page_size: Option<i64>,
        name: Option<String>,
        document_number: Option<String>,
    ) -> Result<FfiPatientPage, PatientRecordsError> {
        let query = ListQuery {
            page,
            page_size,
            name,
            document_number,
        };
        let db = self.db.lock()?;
        let page = PatientManager::with_config(&*db, &self.config).list(&query)?;
        Ok(page.into())
    }

    /// Patients created strictly after `after` (`YYYY-MM-DD` or RFC 3339).
    pub fn list_patients_created_after(
        &self,
        after: String,
    ) -> Result<Vec<FfiPatient>, PatientRecordsError> {
        let db = self.db.lock()?;
        let patients = PatientManager::with_config(&*db, &self.config).list_created_after(&after)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Replace every mutable field of a patient.
    pub fn replace_patient(&self, id: i64, input: FfiPatientInput) -> Result<(), PatientRecordsError> {
        let input = PatientInput::from(input);
        let db = self.db.lock()?;
        PatientManager::with_config(&*db, &self.config).replace(id, &input)?;
        Ok(())
    }

    /// Apply a JSON PATCH body (JSON Patch array or merge object).
    pub fn patch_patient(&self, id: i64, patch_json: String) -> Result<(), PatientRecordsError> {
        let db = self.db.lock()?;
        PatientManager::with_config(&*db, &self.config).patch_json(id, &patch_json)?;
        Ok(())
    }

    /// Delete a patient.
    pub fn delete_patient(&self, id: i64) -> Result<(), PatientRecordsError> {
        let db = self.db.lock()?;
        PatientManager::with_config(&*db, &self.config).delete(id)?;
        Ok(())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient. Dates are ISO 8601 strings.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiPatient {
    pub id: i64,
    pub document_type: String,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub created_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            document_type: patient.document_type,
            document_number: patient.document_number,
            first_name: patient.first_name,
            last_name: patient.last_name,
            birth_date: models::format_date(patient.birth_date),
            phone_number: patient.phone_number,
            email: patient.email,
            created_at: patient.created_at.to_rfc3339(),
        }
    }
}

/// FFI-safe create/replace payload.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiPatientInput {
    pub document_type: String,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

impl From<FfiPatientInput> for PatientInput {
    fn from(input: FfiPatientInput) -> Self {
        PatientInput {
            document_type: input.document_type,
            document_number: input.document_number,
            first_name: input.first_name,
            last_name: input.last_name,
            birth_date: input.birth_date,
            phone_number: input.phone_number,
            email: input.email,
        }
    }
}

/// FFI-safe listing page.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientPage {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<FfiPatient>,
}

impl From<PatientPage> for FfiPatientPage {
    fn from(page: PatientPage) -> Self {
        Self {
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            items: page.items.into_iter().map(|p| p.into()).collect(),
        }
    }
}
