//! Links between clinical records.
//!
//! Conditions, procedures and consents point at their patient (mandatory) and their
//! encounter (optional); encounters point at their patient. The loader supplies the linked
//! records after conversion, exactly once, through the `initialise_*` operations.

use crate::{EncounterRecord, PatientRecord, RelationError};
use std::sync::Arc;

/// A relation to another record that can be supplied once.
#[derive(Debug, PartialEq)]
pub struct Link<T>(Option<Arc<T>>);

impl<T> Default for Link<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> Clone for Link<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Link<T> {
    /// The linked record, if it has been supplied.
    pub fn get(&self) -> Option<&T> {
        self.0.as_deref()
    }

    /// The linked record, or [`RelationError::MandatoryNotInitialised`] naming the relation.
    pub fn require(&self, name: &'static str) -> Result<&T, RelationError> {
        self.get().ok_or(RelationError::MandatoryNotInitialised(name))
    }

    /// Supply the linked record.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::AlreadyInitialised`] if the link was already set.
    pub fn set(&mut self, name: &'static str, target: Arc<T>) -> Result<(), RelationError> {
        if self.0.is_some() {
            return Err(RelationError::AlreadyInitialised(name));
        }
        self.0 = Some(target);
        Ok(())
    }
}

/// A record with a mandatory patient relation.
pub trait PatientRelated {
    fn patient_id(&self) -> Option<&str>;
    fn patient_link(&self) -> &Link<PatientRecord>;
    fn patient_link_mut(&mut self) -> &mut Link<PatientRecord>;
    fn set_patient_id(&mut self, patient_id: String);

    /// The linked patient.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::MandatoryNotInitialised`] until the patient is supplied.
    fn patient(&self) -> Result<&PatientRecord, RelationError> {
        self.patient_link().require("patient")
    }

    /// Supply the patient; also takes over its id as the record's patient id.
    ///
    /// # Errors
    ///
    /// - [`RelationError::MandatoryNotInitialised`] if the patient has no identifier.
    /// - [`RelationError::AlreadyInitialised`] on a second call.
    fn initialise_patient(&mut self, patient: Arc<PatientRecord>) -> Result<(), RelationError> {
        if patient.identifiers.is_empty() {
            return Err(RelationError::MandatoryNotInitialised("patient.identifier"));
        }
        let patient_id = patient.id.clone();
        self.patient_link_mut().set("patient", patient)?;
        self.set_patient_id(patient_id);
        Ok(())
    }
}

/// A record with an optional encounter relation keyed by its case id.
pub trait EncounterRelated {
    fn case_id(&self) -> Option<&str>;
    fn encounter_link(&self) -> &Link<EncounterRecord>;
    fn encounter_link_mut(&mut self) -> &mut Link<EncounterRecord>;
    fn set_case_id(&mut self, case_id: String);

    /// The linked encounter.
    ///
    /// # Errors
    ///
    /// - [`RelationError::OptionalNotAvailable`] if the record has no case id at all.
    /// - [`RelationError::MandatoryNotInitialised`] if a case id is present but the encounter
    ///   has not been supplied.
    fn encounter(&self) -> Result<&EncounterRecord, RelationError> {
        match self.encounter_link().get() {
            Some(encounter) => Ok(encounter),
            None if self.case_id().is_none() => {
                Err(RelationError::OptionalNotAvailable("encounter"))
            }
            None => Err(RelationError::MandatoryNotInitialised("encounter")),
        }
    }

    /// Supply the encounter; the record's case id becomes the encounter id.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError::AlreadyInitialised`] on a second call.
    fn initialise_encounter(
        &mut self,
        encounter: Arc<EncounterRecord>,
    ) -> Result<(), RelationError> {
        let case_id = encounter.id.clone();
        self.encounter_link_mut().set("encounter", encounter)?;
        self.set_case_id(case_id);
        Ok(())
    }
}
