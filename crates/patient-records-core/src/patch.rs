//! Sparse partial updates.
//!
//! A PATCH body becomes a [`PatientPatch`]: for each field, either absent
//! (leave the current value) or present with a new value. [`merge_patch`]
//! seeds a working copy from the current record, overlays the present
//! fields and validates the result.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Patient, PatientInput};
use crate::validation::{validate_input, ValidationErrors};

/// The PATCH body could not be read as field operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MalformedPatch(pub String);

/// Patchable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchField {
    DocumentType,
    DocumentNumber,
    FirstName,
    LastName,
    BirthDate,
    PhoneNumber,
    Email,
}

impl PatchField {
    /// Resolve a field name, accepting camelCase or snake_case in any letter case.
    pub fn parse(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "documenttype" => Some(Self::DocumentType),
            "documentnumber" => Some(Self::DocumentNumber),
            "firstname" => Some(Self::FirstName),
            "lastname" => Some(Self::LastName),
            "birthdate" => Some(Self::BirthDate),
            "phonenumber" => Some(Self::PhoneNumber),
            "email" => Some(Self::Email),
            _ => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::DocumentType => "documentType",
            Self::DocumentNumber => "documentNumber",
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::BirthDate => "birthDate",
            Self::PhoneNumber => "phoneNumber",
            Self::Email => "email",
        }
    }
}

/// Sparse set of field values; `None` leaves the field untouched.
///
/// `birth_date` is kept as sent and checked by validation after merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientPatch {
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

/// One JSON Patch operation.
#[derive(Debug, Clone, Deserialize)]
struct PatchOperation {
    op: String,
    path: String,
    #[serde(default)]
    value: Option<Value>,
}

impl PatientPatch {
    /// Parse a PATCH body.
    ///
    /// Accepts a JSON Patch array (`add`, `replace`, `remove` on top-level
    /// fields) or a JSON merge object. A `null` value or a `remove` leaves the
    /// field as it is.
    pub fn from_json(body: &str) -> Result<Self, MalformedPatch> {
        let document: Value = serde_json::from_str(body)
            .map_err(|e| MalformedPatch(format!("invalid JSON: {}", e)))?;

        match document {
            Value::Array(items) => {
                let operations: Vec<PatchOperation> = serde_json::from_value(Value::Array(items))
                    .map_err(|e| MalformedPatch(format!("invalid patch operation: {}", e)))?;
                Self::from_operations(&operations)
            }
            Value::Object(map) => {
                let mut patch = Self::default();
                for (name, value) in &map {
                    let field = PatchField::parse(name)
                        .ok_or_else(|| MalformedPatch(format!("unknown field '{}'", name)))?;
                    patch.set(field, value)?;
                }
                Ok(patch)
            }
            _ => Err(MalformedPatch(
                "patch must be an array of operations or an object".into(),
            )),
        }
    }

    fn from_operations(operations: &[PatchOperation]) -> Result<Self, MalformedPatch> {
        let mut patch = Self::default();
        for operation in operations {
            let field = parse_path(&operation.path)?;
            match operation.op.to_ascii_lowercase().as_str() {
                "add" | "replace" => {
                    let value = operation.value.as_ref().ok_or_else(|| {
                        MalformedPatch(format!(
                            "'{}' on {} requires a value",
                            operation.op, operation.path
                        ))
                    })?;
                    patch.set(field, value)?;
                }
                "remove" => patch.set(field, &Value::Null)?,
                other => {
                    return Err(MalformedPatch(format!("unsupported operation '{}'", other)));
                }
            }
        }
        Ok(patch)
    }

    /// Record `value` for `field`; later writes to the same field win.
    fn set(&mut self, field: PatchField, value: &Value) -> Result<(), MalformedPatch> {
        let value = string_value(field, value)?;
        let slot = match field {
            PatchField::DocumentType => &mut self.document_type,
            PatchField::DocumentNumber => &mut self.document_number,
            PatchField::FirstName => &mut self.first_name,
            PatchField::LastName => &mut self.last_name,
            PatchField::BirthDate => &mut self.birth_date,
            PatchField::PhoneNumber => &mut self.phone_number,
            PatchField::Email => &mut self.email,
        };
        *slot = value;
        Ok(())
    }
}

fn parse_path(path: &str) -> Result<PatchField, MalformedPatch> {
    let name = path
        .strip_prefix('/')
        .filter(|rest| !rest.contains('/'))
        .ok_or_else(|| MalformedPatch(format!("unsupported path '{}'", path)))?;
    PatchField::parse(name).ok_or_else(|| MalformedPatch(format!("unknown field '{}'", path)))
}

fn string_value(field: PatchField, value: &Value) -> Result<Option<String>, MalformedPatch> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(MalformedPatch(format!(
            "{} must be a string, got {}",
            field.wire_name(),
            other
        ))),
    }
}

/// Overlay `patch` onto `current` and validate the merged record.
///
/// The returned record keeps `current.id` and `current.created_at`.
pub fn merge_patch(current: &Patient, patch: &PatientPatch) -> Result<Patient, ValidationErrors> {
    let mut working = PatientInput::from(current);

    if let Some(value) = &patch.document_type {
        working.document_type = value.clone();
    }
    if let Some(value) = &patch.document_number {
        working.document_number = value.clone();
    }
    if let Some(value) = &patch.first_name {
        working.first_name = value.clone();
    }
    if let Some(value) = &patch.last_name {
        working.last_name = value.clone();
    }
    if let Some(value) = &patch.birth_date {
        working.birth_date = Some(value.clone());
    }
    if let Some(value) = &patch.phone_number {
        working.phone_number = Some(value.clone());
    }
    if let Some(value) = &patch.email {
        working.email = Some(value.clone());
    }

    let fields = validate_input(&working)?;
    let mut merged = current.clone();
    merged.apply(fields);
    Ok(merged)
}
