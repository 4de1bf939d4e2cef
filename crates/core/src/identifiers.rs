//! Identifier resolution for patients and cases.
//!
//! Identifiers are looked up by system, falling back to the configured default system of the
//! identifying domain. Encounters additionally expose the official identifier and the
//! visit-number slice (`v2-0203#VN`).

use crate::collect_ids;
use crate::config::{CoreConfig, IdentifierDomain, IdentifierSystems};
use crate::constants::{IDENTIFIER_VN_TYPE_CODE, IDENTIFIER_VN_TYPE_SYSTEM};
use crate::CoreResult;
use fhir::{
    EncounterRecord, EncounterRelated, Identifier, IdentifierUse, PatientRecord, PatientRelated,
};
use std::collections::HashSet;

/// Which encounter identifier a bulk lookup resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentifierKind {
    Official,
    VisitNumber,
}

impl IdentifierKind {
    fn resolve(self, encounter: &EncounterRecord) -> Option<&str> {
        match self {
            IdentifierKind::Official => IdentifierResolver::official_identifier_value(encounter),
            IdentifierKind::VisitNumber => {
                IdentifierResolver::visit_number_identifier_value(encounter)
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            IdentifierKind::Official => "official",
            IdentifierKind::VisitNumber => "visit number",
        }
    }
}

/// Resolves identifier values against the configured default systems.
#[derive(Clone, Debug)]
pub struct IdentifierResolver {
    systems: IdentifierSystems,
}

impl IdentifierResolver {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            systems: config.identifier_systems().clone(),
        }
    }

    /// First identifier whose system equals `system`.
    ///
    /// Without a system the configured default of `domain` is used.
    pub fn identifier_by_system<'a>(
        &self,
        system: Option<&str>,
        domain: IdentifierDomain,
        identifiers: &'a [Identifier],
    ) -> Option<&'a Identifier> {
        let system = system.unwrap_or_else(|| self.systems.system(domain));
        identifiers.iter().find(|id| id.system() == Some(system))
    }

    /// First identifier with use `official`; optionally falls back to the first identifier
    /// without a use.
    pub fn official_identifier(
        identifiers: &[Identifier],
        fallback_to_first_untyped: bool,
    ) -> Option<&Identifier> {
        identifiers
            .iter()
            .find(|id| id.use_type == Some(IdentifierUse::Official))
            .or_else(|| first_untyped(identifiers, fallback_to_first_untyped))
    }

    /// First identifier typed as a visit number; optionally falls back to the first
    /// identifier without a use.
    pub fn visit_number_identifier(
        identifiers: &[Identifier],
        fallback_to_first_untyped: bool,
    ) -> Option<&Identifier> {
        identifiers
            .iter()
            .find(|id| {
                id.identifier_type
                    .as_ref()
                    .is_some_and(|t| t.has_coding(IDENTIFIER_VN_TYPE_SYSTEM, IDENTIFIER_VN_TYPE_CODE))
            })
            .or_else(|| first_untyped(identifiers, fallback_to_first_untyped))
    }

    /// Value of the encounter's official identifier, without fallback.
    pub fn official_identifier_value(encounter: &EncounterRecord) -> Option<&str> {
        Self::official_identifier(&encounter.identifiers, false).and_then(Identifier::value)
    }

    /// Value of the encounter's visit-number identifier, without fallback.
    pub fn visit_number_identifier_value(encounter: &EncounterRecord) -> Option<&str> {
        Self::visit_number_identifier(&encounter.identifiers, false).and_then(Identifier::value)
    }

    /// Official or visit-number values of the encounters whose id is in `target_ids`.
    ///
    /// Returns `None` when none of those encounters carries an identifier at all.
    pub fn bulk_official_or_visit_number_values(
        target_ids: &HashSet<String>,
        encounters: &[EncounterRecord],
        kind: IdentifierKind,
    ) -> Option<HashSet<String>> {
        let relevant: Vec<&EncounterRecord> = encounters
            .iter()
            .filter(|encounter| target_ids.contains(&encounter.id))
            .collect();

        let with_identifiers = relevant
            .iter()
            .filter(|encounter| !encounter.identifiers.is_empty())
            .count();
        if with_identifiers == 0 {
            return None;
        }
        if with_identifiers < relevant.len() {
            tracing::warn!(
                total = relevant.len(),
                without_identifier = relevant.len() - with_identifiers,
                "some encounters carry no identifier"
            );
        }

        let values = collect_ids(&relevant, |encounter| {
            kind.resolve(encounter)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        });
        if values.is_empty() {
            tracing::warn!(
                encounters = relevant.len(),
                kind = kind.label(),
                "no identifier values resolved"
            );
        }
        Some(values)
    }

    /// Value of the encounter identifier in `system` (default encounter system if `None`).
    pub fn case_identifier_value<'a>(
        &self,
        encounter: &'a EncounterRecord,
        system: Option<&str>,
    ) -> Option<&'a str> {
        self.identifier_by_system(system, IdentifierDomain::Encounter, &encounter.identifiers)
            .and_then(Identifier::value)
    }

    /// Value of the patient identifier in `system` (default patient system if `None`).
    pub fn patient_identifier_value<'a>(
        &self,
        patient: &'a PatientRecord,
        system: Option<&str>,
    ) -> Option<&'a str> {
        self.identifier_by_system(system, IdentifierDomain::Patient, &patient.identifiers)
            .and_then(Identifier::value)
    }

    /// Case identifier value of a record attached to an encounter.
    ///
    /// The default encounter system answers with the stored case id; any other system is
    /// resolved on the linked encounter.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Relation`](crate::CoreError::Relation) carrying the error of the
    /// encounter relation when it has to be followed.
    pub fn record_case_identifier_value<'a, R: EncounterRelated>(
        &self,
        record: &'a R,
        system: Option<&str>,
    ) -> CoreResult<Option<&'a str>> {
        let system = system.unwrap_or_else(|| self.systems.encounter());
        if system == self.systems.encounter() {
            return Ok(record.case_id());
        }
        let encounter = record.encounter()?;
        Ok(self.case_identifier_value(encounter, Some(system)))
    }

    /// Patient identifier value of a record attached to a patient.
    ///
    /// The default patient system answers with the stored patient id; any other system is
    /// resolved on the linked patient.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Relation`](crate::CoreError::Relation) when the patient has to be
    /// followed but was never supplied.
    pub fn record_patient_identifier_value<'a, R: PatientRelated>(
        &self,
        record: &'a R,
        system: Option<&str>,
    ) -> CoreResult<Option<&'a str>> {
        let system = system.unwrap_or_else(|| self.systems.patient());
        if system == self.systems.patient() {
            return Ok(record.patient_id());
        }
        let patient = record.patient()?;
        Ok(self.patient_identifier_value(patient, Some(system)))
    }
}

/// All identifier values, restricted to `system` if given.
pub fn identifier_values<'a>(identifiers: &'a [Identifier], system: Option<&str>) -> Vec<&'a str> {
    identifiers
        .iter()
        .filter(|id| system.map_or(true, |s| id.system() == Some(s)))
        .filter_map(Identifier::value)
        .collect()
}

fn first_untyped(identifiers: &[Identifier], enabled: bool) -> Option<&Identifier> {
    if !enabled {
        return None;
    }
    identifiers.iter().find(|id| !id.has_declared_use())
}
