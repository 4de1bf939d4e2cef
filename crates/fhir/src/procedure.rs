//! Procedure records.

use crate::datatypes::{
    concept_from_wire, parse_optional_datetime, period_from_wire, reference_id,
    CodeableConcept, CodeableConceptWire, PeriodWire, ReferenceWire,
};
use crate::relation::{EncounterRelated, Link, PatientRelated};
use crate::{required, EncounterRecord, FhirError, FhirResult, PatientRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// A procedure as seen by the rule crate.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcedureRecord {
    pub id: Option<String>,
    pub patient_id: Option<String>,
    pub case_id: Option<String>,
    pub status: Option<String>,
    pub code: Option<CodeableConcept>,

    /// `performedDateTime`, or the start of `performedPeriod`.
    pub performed_date: Option<DateTime<Utc>>,

    patient: Link<PatientRecord>,
    encounter: Link<EncounterRecord>,
}

impl ProcedureRecord {
    /// Create a procedure with its mandatory elements.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingField`] naming the first missing element
    /// (`patientId`, `status`, `code`).
    pub fn new(
        patient_id: &str,
        case_id: Option<&str>,
        status: &str,
        code: Option<CodeableConcept>,
        performed_date: Option<DateTime<Utc>>,
    ) -> FhirResult<Self> {
        let patient_id = required("patientId", Some(patient_id))?;
        let status = required("status", Some(status))?;
        let code = code.ok_or(FhirError::MissingField("code"))?;

        Ok(Self {
            id: None,
            patient_id: Some(patient_id),
            case_id: case_id.filter(|c| !c.is_empty()).map(str::to_string),
            status: Some(status),
            code: Some(code),
            performed_date,
            patient: Link::default(),
            encounter: Link::default(),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl PatientRelated for ProcedureRecord {
    fn patient_id(&self) -> Option<&str> {
        self.patient_id.as_deref()
    }

    fn patient_link(&self) -> &Link<PatientRecord> {
        &self.patient
    }

    fn patient_link_mut(&mut self) -> &mut Link<PatientRecord> {
        &mut self.patient
    }

    fn set_patient_id(&mut self, patient_id: String) {
        self.patient_id = Some(patient_id);
    }
}

impl EncounterRelated for ProcedureRecord {
    fn case_id(&self) -> Option<&str> {
        self.case_id.as_deref()
    }

    fn encounter_link(&self) -> &Link<EncounterRecord> {
        &self.encounter
    }

    fn encounter_link_mut(&mut self) -> &mut Link<EncounterRecord> {
        &mut self.encounter
    }

    fn set_case_id(&mut self, case_id: String) {
        self.case_id = Some(case_id);
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProcedureWire {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub code: Option<CodeableConceptWire>,
    #[serde(default)]
    pub subject: Option<ReferenceWire>,
    #[serde(default)]
    pub encounter: Option<ReferenceWire>,
    #[serde(default)]
    pub performed_date_time: Option<String>,
    #[serde(default)]
    pub performed_period: Option<PeriodWire>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

/// Map a wire procedure to a record, validating the mandatory elements when `check` is set.
pub(crate) fn wire_to_domain(wire: ProcedureWire, check: bool) -> FhirResult<ProcedureRecord> {
    if check {
        if wire.subject.as_ref().and_then(|s| s.reference.as_ref()).is_none() {
            return Err(FhirError::MissingField("subject"));
        }
        if wire.status.is_none() {
            return Err(FhirError::MissingField("status"));
        }
        if wire.code.is_none() {
            return Err(FhirError::MissingField("code"));
        }
        if wire.performed_date_time.is_none() && wire.performed_period.is_none() {
            return Err(FhirError::MissingField("performed"));
        }
    }

    let performed_date = match (wire.performed_date_time, wire.performed_period) {
        (Some(date_time), _) => parse_optional_datetime(Some(&date_time))?,
        (None, Some(period)) => period_from_wire(period)?.start,
        (None, None) => None,
    };

    Ok(ProcedureRecord {
        id: wire.id,
        patient_id: reference_id(wire.subject),
        case_id: reference_id(wire.encounter),
        status: wire.status,
        code: wire.code.map(concept_from_wire).transpose()?,
        performed_date,
        patient: Link::default(),
        encounter: Link::default(),
    })
}
