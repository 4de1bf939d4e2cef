//! FHIR-aligned clinical record models for the KDS rule crates.
//!
//! This crate provides **value objects**, **record types** and **wire translation** for the
//! FHIR resources the consent and case rules read:
//! - Patient, Encounter, Condition, Procedure, Observation, Consent, Location
//!
//! This crate focuses on:
//! - FHIR R4 semantic alignment for the elements the rules interpret
//! - lenient JSON/YAML deserialisation with path-aware error reporting
//! - relation links between records (patient, encounter) supplied once by the loader
//!
//! Rule evaluation lives in `kds-core`; nothing here decides whether a record matches.

pub mod condition;
pub mod consent;
pub mod datatypes;
pub mod encounter;
pub mod location;
pub mod observation;
pub mod patient;
pub mod procedure;
pub mod relation;
pub mod resource;

// Re-export public domain-level types
pub use condition::ConditionRecord;
pub use consent::{ConsentRecord, ProvisionNode, ProvisionType};
pub use datatypes::{
    parse_fhir_datetime, CodeableConcept, Coding, Extension, ExtensionValue, Identifier,
    IdentifierUse, Period, Reference,
};
pub use encounter::{EncounterRecord, Hospitalization, LocationStay};
pub use location::LocationRecord;
pub use observation::ObservationRecord;
pub use patient::{Address, PatientRecord};
pub use procedure::ProcedureRecord;
pub use relation::{EncounterRelated, Link, PatientRelated};
pub use resource::{Resource, ResourceKind};

use kds_types::NonEmptyText;

/// Errors returned by the `fhir` crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("mandatory field '{0}' is missing")]
    MissingField(&'static str),

    #[error("unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("invalid date/time: '{0}'")]
    InvalidDateTime(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Errors raised when reading or supplying a relation between records.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelationError {
    /// A relation that must be present has not been supplied yet.
    #[error("mandatory relation '{0}' has not been initialised")]
    MandatoryNotInitialised(&'static str),

    /// An optional relation is legitimately absent.
    #[error("optional relation '{0}' is not available")]
    OptionalNotAvailable(&'static str),

    /// The relation was already supplied; links are set once.
    #[error("relation '{0}' is already initialised")]
    AlreadyInitialised(&'static str),
}

/// Validate a mandatory text element, reporting its name when absent or blank.
pub(crate) fn required(name: &'static str, value: Option<&str>) -> FhirResult<String> {
    NonEmptyText::required(name, value)
        .map(NonEmptyText::into_string)
        .map_err(|_| FhirError::MissingField(name))
}
