//! Observation records.

use crate::datatypes::{
    concept_from_wire, concepts_from_wire, parse_optional_datetime, period_from_wire,
    reference_id, CodeableConcept, CodeableConceptWire, PeriodWire, ReferenceWire,
};
use crate::relation::{EncounterRelated, Link, PatientRelated};
use crate::{required, EncounterRecord, FhirError, FhirResult, PatientRecord};
use chrono::{DateTime, Utc};
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// An observation (lab value, score, finding) as seen by the rule crate.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationRecord {
    pub id: Option<String>,
    pub patient_id: Option<String>,
    pub case_id: Option<String>,
    pub status: Option<String>,
    pub categories: Vec<CodeableConcept>,
    pub code: Option<CodeableConcept>,

    /// `effectiveDateTime`, or the start of `effectivePeriod`.
    pub effective_date: Option<DateTime<Utc>>,

    /// `valueCodeableConcept`; other value types are not interpreted.
    pub value_concept: Option<CodeableConcept>,

    patient: Link<PatientRecord>,
    encounter: Link<EncounterRecord>,
}

impl ObservationRecord {
    /// Create an observation with its mandatory elements.
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
    ) -> FhirResult<Self> {
        let patient_id = required("patientId", Some(patient_id))?;
        let status = required("status", Some(status))?;
        let code = code.ok_or(FhirError::MissingField("code"))?;

        Ok(Self {
            id: None,
            patient_id: Some(patient_id),
            case_id: case_id.filter(|c| !c.is_empty()).map(str::to_string),
            status: Some(status),
            categories: Vec::new(),
            code: Some(code),
            effective_date: None,
            value_concept: None,
            patient: Link::default(),
            encounter: Link::default(),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_category(mut self, category: CodeableConcept) -> Self {
        self.categories.push(category);
        self
    }

    pub fn with_effective_date(mut self, effective_date: DateTime<Utc>) -> Self {
        self.effective_date = Some(effective_date);
        self
    }
}

impl PatientRelated for ObservationRecord {
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

impl EncounterRelated for ObservationRecord {
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
pub(crate) struct ObservationWire {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Vec<CodeableConceptWire>,
    #[serde(default)]
    pub code: Option<CodeableConceptWire>,
    #[serde(default)]
    pub subject: Option<ReferenceWire>,
    #[serde(default)]
    pub encounter: Option<ReferenceWire>,
    #[serde(default)]
    pub effective_date_time: Option<String>,
    #[serde(default)]
    pub effective_period: Option<PeriodWire>,
    #[serde(default)]
    pub value_codeable_concept: Option<CodeableConceptWire>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

/// Map a wire observation to a record, validating the subject reference when `check` is set.
pub(crate) fn wire_to_domain(
    wire: ObservationWire,
    check: bool,
) -> FhirResult<ObservationRecord> {
    if check && wire.subject.as_ref().and_then(|s| s.reference.as_ref()).is_none() {
        return Err(FhirError::MissingField("subject"));
    }

    let effective_date = match (wire.effective_date_time, wire.effective_period) {
        (Some(date_time), _) => parse_optional_datetime(Some(&date_time))?,
        (None, Some(period)) => period_from_wire(period)?.start,
        (None, None) => None,
    };

    Ok(ObservationRecord {
        id: wire.id,
        patient_id: reference_id(wire.subject),
        case_id: reference_id(wire.encounter),
        status: wire.status,
        categories: concepts_from_wire(wire.category)?,
        code: wire.code.map(concept_from_wire).transpose()?,
        effective_date,
        value_concept: wire.value_codeable_concept.map(concept_from_wire).transpose()?,
        patient: Link::default(),
        encounter: Link::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{Coding, Identifier};
    use crate::RelationError;
    use std::sync::Arc;

    const LOINC: &str = "http://loinc.org";

    fn parse(json: &str, check: bool) -> FhirResult<ObservationRecord> {
        let wire: ObservationWire = serde_json::from_str(json).expect("valid observation json");
        wire_to_domain(wire, check)
    }

    #[test]
    fn maps_subject_encounter_and_effective_period() {
        let record = parse(
            r#"{
                "resourceType": "Observation",
                "id": "O-1",
                "status": "final",
                "category": [{"coding": [{"system": "http://terminology.hl7.org/CodeSystem/observation-category", "code": "laboratory"}]}],
                "code": {"coding": [{"system": "http://loinc.org", "code": "94500-6"}]},
                "subject": {"reference": "Patient/P-1"},
                "encounter": {"reference": "Encounter/E-1"},
                "effectivePeriod": {"start": "2024-01-03T10:00:00Z"},
                "valueCodeableConcept": {"coding": [{"system": "http://snomed.info/sct", "code": "260373001"}]},
                "valueQuantity": {"value": 1.2}
            }"#,
            true,
        )
        .expect("valid observation");

        assert_eq!(record.patient_id.as_deref(), Some("P-1"));
        assert_eq!(record.case_id.as_deref(), Some("E-1"));
        assert_eq!(record.categories.len(), 1);
        assert!(record
            .code
            .as_ref()
            .is_some_and(|c| c.has_coding(LOINC, "94500-6")));
        assert_eq!(
            record.effective_date.map(|d| d.to_rfc3339()).as_deref(),
            Some("2024-01-03T10:00:00+00:00")
        );
        assert!(record
            .value_concept
            .as_ref()
            .is_some_and(|c| c.has_coding("http://snomed.info/sct", "260373001")));
    }

    #[test]
    fn check_mode_requires_subject_reference() {
        let json = r#"{
            "resourceType": "Observation",
            "status": "final",
            "code": {"coding": [{"code": "94500-6"}]},
            "subject": {"identifier": {"value": "4711"}}
        }"#;

        match parse(json, true).expect_err("subject reference is mandatory") {
            FhirError::MissingField(name) => assert_eq!(name, "subject"),
            other => panic!("expected MissingField error, got {other:?}"),
        }

        let unchecked = parse(json, false).expect("unchecked conversion");
        assert_eq!(unchecked.patient_id.as_deref(), Some("4711"));
        assert_eq!(unchecked.case_id, None);
    }

    #[test]
    fn new_requires_status_and_code() {
        let code = CodeableConcept::from_coding(Coding::new(LOINC, "94500-6"));

        match ObservationRecord::new("P-1", None, " ", Some(code)).expect_err("status") {
            FhirError::MissingField(name) => assert_eq!(name, "status"),
            other => panic!("expected MissingField error, got {other:?}"),
        }
        match ObservationRecord::new("P-1", None, "final", None).expect_err("code") {
            FhirError::MissingField(name) => assert_eq!(name, "code"),
            other => panic!("expected MissingField error, got {other:?}"),
        }
    }

    #[test]
    fn relations_follow_condition_semantics() {
        let code = CodeableConcept::from_coding(Coding::new(LOINC, "94500-6"));
        let mut record = ObservationRecord::new("P-1", None, "final", Some(code))
            .expect("valid observation");

        assert_eq!(
            record.encounter().expect_err("no case id"),
            RelationError::OptionalNotAvailable("encounter")
        );

        let encounter = Arc::new(EncounterRecord::new("E-2", "P-1").expect("valid encounter"));
        record
            .initialise_encounter(encounter)
            .expect("first initialisation");
        assert_eq!(record.case_id.as_deref(), Some("E-2"));

        let patient = Arc::new(PatientRecord::new(
            "P-1",
            vec![Identifier::new("https://fhir.example.org/pid", "4711")],
        ));
        record.initialise_patient(patient).expect("patient");
        assert_eq!(record.patient().expect("linked").id, "P-1");
    }
}
