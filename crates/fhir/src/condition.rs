//! Condition (diagnosis) records.

use crate::datatypes::{
    concept_from_wire, parse_optional_datetime, reference_id, CodeableConcept,
    CodeableConceptWire, ReferenceWire,
};
use crate::relation::{EncounterRelated, Link, PatientRelated};
use crate::{required, EncounterRecord, FhirError, FhirResult, PatientRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// A diagnosis as seen by the rule crate.
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionRecord {
    pub id: Option<String>,

    /// Id of the patient, without the `Patient/` prefix.
    pub patient_id: Option<String>,

    /// Id of the encounter the diagnosis was recorded in, if any.
    pub case_id: Option<String>,

    pub clinical_status: Option<CodeableConcept>,

    /// Diagnosis code; codings may carry a reliability extension.
    pub code: Option<CodeableConcept>,

    pub recorded_date: Option<DateTime<Utc>>,

    patient: Link<PatientRecord>,
    encounter: Link<EncounterRecord>,
}

impl ConditionRecord {
    /// Create a diagnosis with its mandatory elements.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingField`] naming the first missing element
    /// (`patientId`, `clinicalStatus`, `code`, `recordedDate`).
    pub fn new(
        patient_id: &str,
        case_id: Option<&str>,
        clinical_status: Option<CodeableConcept>,
        code: Option<CodeableConcept>,
        recorded_date: Option<DateTime<Utc>>,
    ) -> FhirResult<Self> {
        let patient_id = required("patientId", Some(patient_id))?;
        let clinical_status = clinical_status.ok_or(FhirError::MissingField("clinicalStatus"))?;
        let code = code.ok_or(FhirError::MissingField("code"))?;
        let recorded_date = recorded_date.ok_or(FhirError::MissingField("recordedDate"))?;

        Ok(Self {
            id: None,
            patient_id: Some(patient_id),
            case_id: case_id.filter(|c| !c.is_empty()).map(str::to_string),
            clinical_status: Some(clinical_status),
            code: Some(code),
            recorded_date: Some(recorded_date),
            patient: Link::default(),
            encounter: Link::default(),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl PatientRelated for ConditionRecord {
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

impl EncounterRelated for ConditionRecord {
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
pub(crate) struct ConditionWire {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub clinical_status: Option<CodeableConceptWire>,
    #[serde(default)]
    pub code: Option<CodeableConceptWire>,
    #[serde(default)]
    pub subject: Option<ReferenceWire>,
    #[serde(default)]
    pub encounter: Option<ReferenceWire>,
    #[serde(default)]
    pub recorded_date: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

/// Map a wire condition to a record, validating the mandatory elements when `check` is set.
pub(crate) fn wire_to_domain(wire: ConditionWire, check: bool) -> FhirResult<ConditionRecord> {
    if check {
        if wire.subject.as_ref().and_then(|s| s.reference.as_ref()).is_none() {
            return Err(FhirError::MissingField("subject"));
        }
        if wire.clinical_status.is_none() {
            return Err(FhirError::MissingField("clinicalStatus"));
        }
        if wire.code.is_none() {
            return Err(FhirError::MissingField("code"));
        }
        if wire.recorded_date.is_none() {
            return Err(FhirError::MissingField("recordedDate"));
        }
    }

    Ok(ConditionRecord {
        id: wire.id,
        patient_id: reference_id(wire.subject),
        case_id: reference_id(wire.encounter),
        clinical_status: wire.clinical_status.map(concept_from_wire).transpose()?,
        code: wire.code.map(concept_from_wire).transpose()?,
        recorded_date: parse_optional_datetime(wire.recorded_date.as_deref())?,
        patient: Link::default(),
        encounter: Link::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{parse_fhir_datetime, Coding, Identifier};
    use crate::RelationError;
    use std::sync::Arc;

    fn active() -> CodeableConcept {
        CodeableConcept::from_coding(Coding::new(
            "http://terminology.hl7.org/CodeSystem/condition-clinical",
            "active",
        ))
    }

    fn icd(code: &str) -> CodeableConcept {
        CodeableConcept::from_coding(Coding::new("http://fhir.de/CodeSystem/bfarm/icd-10-gm", code))
    }

    fn condition(case_id: Option<&str>) -> ConditionRecord {
        ConditionRecord::new(
            "P-1",
            case_id,
            Some(active()),
            Some(icd("I48.2")),
            Some(parse_fhir_datetime("2024-02-01").expect("date")),
        )
        .expect("valid condition")
    }

    #[test]
    fn new_names_first_missing_field() {
        let recorded = parse_fhir_datetime("2024-02-01").ok();
        let cases = [
            ("", Some(active()), Some(icd("I10")), recorded, "patientId"),
            ("P-1", None, Some(icd("I10")), recorded, "clinicalStatus"),
            ("P-1", Some(active()), None, recorded, "code"),
            ("P-1", Some(active()), Some(icd("I10")), None, "recordedDate"),
        ];

        for (patient_id, status, code, recorded_date, expected) in cases {
            let err = ConditionRecord::new(patient_id, None, status, code, recorded_date)
                .expect_err("missing field");
            match err {
                FhirError::MissingField(name) => assert_eq!(name, expected),
                other => panic!("expected MissingField error, got {other:?}"),
            }
        }
    }

    #[test]
    fn encounter_relation_distinguishes_absent_from_uninitialised() {
        let without_case = condition(None);
        assert_eq!(
            without_case.encounter().expect_err("no case id"),
            RelationError::OptionalNotAvailable("encounter")
        );

        let with_case = condition(Some("E-1"));
        assert_eq!(
            with_case.encounter().expect_err("case id but no encounter"),
            RelationError::MandatoryNotInitialised("encounter")
        );

        assert_eq!(
            with_case.patient().expect_err("no patient"),
            RelationError::MandatoryNotInitialised("patient")
        );
    }

    #[test]
    fn initialising_encounter_sets_case_id_once() {
        let mut record = condition(None);
        let encounter = Arc::new(EncounterRecord::new("E-7", "P-1").expect("valid encounter"));

        record
            .initialise_encounter(Arc::clone(&encounter))
            .expect("first initialisation");
        assert_eq!(record.case_id.as_deref(), Some("E-7"));
        assert_eq!(record.encounter().expect("linked").id, "E-7");

        assert_eq!(
            record.initialise_encounter(encounter).expect_err("second call"),
            RelationError::AlreadyInitialised("encounter")
        );

        let patient = Arc::new(PatientRecord::new(
            "P-9",
            vec![Identifier::new("https://fhir.example.org/pid", "4711")],
        ));
        record.initialise_patient(patient).expect("patient");
        assert_eq!(record.patient_id.as_deref(), Some("P-9"));
    }

    #[test]
    fn wire_mapping_strips_reference_prefixes() {
        let wire: ConditionWire = serde_json::from_str(
            r#"{
                "resourceType": "Condition",
                "id": "C-1",
                "clinicalStatus": {"coding": [{"code": "active"}]},
                "code": {"coding": [{"system": "http://fhir.de/CodeSystem/bfarm/icd-10-gm", "code": "U07.1"}]},
                "subject": {"reference": "Patient/P-1"},
                "encounter": {"reference": "Encounter/E-1"},
                "recordedDate": "2024-03-02T12:00:00Z",
                "onsetDateTime": "2024-03-01"
            }"#,
        )
        .expect("valid condition json");

        let record = wire_to_domain(wire, true).expect("valid condition");
        assert_eq!(record.patient_id.as_deref(), Some("P-1"));
        assert_eq!(record.case_id.as_deref(), Some("E-1"));
        assert!(record
            .code
            .as_ref()
            .is_some_and(|c| c.has_coding("http://fhir.de/CodeSystem/bfarm/icd-10-gm", "U07.1")));
    }

    #[test]
    fn check_mode_requires_subject_reference() {
        let wire: ConditionWire = serde_json::from_str(
            r#"{"resourceType": "Condition", "subject": {"display": "anonymous"}}"#,
        )
        .expect("valid condition json");

        match wire_to_domain(wire, true).expect_err("subject is mandatory") {
            FhirError::MissingField(name) => assert_eq!(name, "subject"),
            other => panic!("expected MissingField error, got {other:?}"),
        }
    }
}
