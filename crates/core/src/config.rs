//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the rule services. The intent is to avoid reading process-wide environment
//! variables during evaluation, which can lead to inconsistent behaviour in multi-threaded
//! runtimes and test harnesses.

use crate::constants::{DEFAULT_ENCOUNTER_IDENTIFIER_SYSTEM, DEFAULT_PATIENT_IDENTIFIER_SYSTEM};
use crate::{CoreError, CoreResult};
use kds_types::NonEmptyText;

/// The identifying domain an identifier system belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentifierDomain {
    Patient,
    Encounter,
}

/// Default identifier systems, one per identifying domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierSystems {
    patient: String,
    encounter: String,
}

impl IdentifierSystems {
    /// Create the default systems.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if both domains would share one system.
    pub fn new(patient: NonEmptyText, encounter: NonEmptyText) -> CoreResult<Self> {
        if patient == encounter {
            return Err(CoreError::InvalidInput(format!(
                "patient and encounter identifier systems must differ (both '{patient}')"
            )));
        }
        Ok(Self {
            patient: patient.into_string(),
            encounter: encounter.into_string(),
        })
    }

    /// The default system of `domain`.
    pub fn system(&self, domain: IdentifierDomain) -> &str {
        match domain {
            IdentifierDomain::Patient => &self.patient,
            IdentifierDomain::Encounter => &self.encounter,
        }
    }

    pub fn patient(&self) -> &str {
        &self.patient
    }

    pub fn encounter(&self) -> &str {
        &self.encounter
    }
}

impl Default for IdentifierSystems {
    fn default() -> Self {
        Self {
            patient: DEFAULT_PATIENT_IDENTIFIER_SYSTEM.to_string(),
            encounter: DEFAULT_ENCOUNTER_IDENTIFIER_SYSTEM.to_string(),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug, Default)]
pub struct CoreConfig {
    identifier_systems: IdentifierSystems,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(identifier_systems: IdentifierSystems) -> Self {
        Self { identifier_systems }
    }

    pub fn identifier_systems(&self) -> &IdentifierSystems {
        &self.identifier_systems
    }
}

/// Resolve the default identifier systems from optional string values.
///
/// Absent or blank values fall back to the built-in defaults.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] if the resolved systems are equal.
pub fn identifier_systems_from_env_values(
    patient: Option<String>,
    encounter: Option<String>,
) -> CoreResult<IdentifierSystems> {
    fn resolve(value: Option<String>, default: &str) -> CoreResult<NonEmptyText> {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => Ok(NonEmptyText::new(v)?),
            None => Ok(NonEmptyText::new(default)?),
        }
    }

    IdentifierSystems::new(
        resolve(patient, DEFAULT_PATIENT_IDENTIFIER_SYSTEM)?,
        resolve(encounter, DEFAULT_ENCOUNTER_IDENTIFIER_SYSTEM)?,
    )
}
