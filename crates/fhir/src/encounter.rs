//! Encounter (case) records.
//!
//! An encounter carries the identifiers that name a hospital case, its contact-level type
//! codings, the location stays used for ICU detection and the discharge disposition.

use crate::datatypes::{
    concept_from_wire, concepts_from_wire, extensions_from_wire, identifiers_from_wire,
    period_from_wire, reference_id, CodeableConcept, CodeableConceptWire, Coding, CodingWire,
    Extension, ExtensionWire, Identifier, IdentifierWire, Period, PeriodWire, ReferenceWire,
};
use crate::relation::{Link, PatientRelated};
use crate::{required, FhirError, FhirResult, PatientRecord};
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// A stay of the encounter at one location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationStay {
    /// Id of the location, without the `Location/` prefix.
    pub location_id: String,

    pub period: Option<Period>,
}

impl LocationStay {
    pub fn new(location_id: impl Into<String>, period: Option<Period>) -> Self {
        Self {
            location_id: location_id.into(),
            period,
        }
    }

    /// Whether the stay has begun and has no end.
    pub fn is_open(&self) -> bool {
        self.period.is_some_and(|p| p.is_active())
    }
}

/// Admission/discharge details of an encounter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hospitalization {
    /// Discharge disposition; the German discharge reason rides on its extensions.
    pub discharge_disposition: Option<CodeableConcept>,
}

/// An encounter as seen by the rule crate.
#[derive(Clone, Debug, PartialEq)]
pub struct EncounterRecord {
    /// Resource id; doubles as the case id of records attached to this encounter.
    pub id: String,

    /// Id of the patient the encounter belongs to.
    pub patient_id: Option<String>,

    pub identifiers: Vec<Identifier>,

    pub status: Option<String>,

    /// Code of `Encounter.class` (e.g. `IMP`, `AMB`).
    pub class_code: Option<String>,

    /// All codings of all `Encounter.type` concepts, flattened in source order.
    pub type_codings: Vec<Coding>,

    pub period: Option<Period>,

    pub location_stays: Vec<LocationStay>,

    pub hospitalization: Option<Hospitalization>,

    /// Id of the encounter this one is part of.
    pub part_of: Option<String>,

    /// Resource-level extensions, including markers attached by the flagging operation.
    pub extensions: Vec<Extension>,

    /// Id of the facility-level ancestor contact, assigned by the loader.
    pub facility_contact_id: Option<String>,

    patient: Link<PatientRecord>,
}

impl EncounterRecord {
    /// Create an encounter with its mandatory elements.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingField`] naming `id` or `patientId` if either is blank.
    pub fn new(id: &str, patient_id: &str) -> FhirResult<Self> {
        let id = required("id", Some(id))?;
        let patient_id = required("patientId", Some(patient_id))?;
        Ok(Self::with_ids(id, Some(patient_id)))
    }

    fn with_ids(id: String, patient_id: Option<String>) -> Self {
        Self {
            id,
            patient_id,
            identifiers: Vec::new(),
            status: None,
            class_code: None,
            type_codings: Vec::new(),
            period: None,
            location_stays: Vec::new(),
            hospitalization: None,
            part_of: None,
            extensions: Vec::new(),
            facility_contact_id: None,
            patient: Link::default(),
        }
    }

    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifiers.push(identifier);
        self
    }

    pub fn with_class_code(mut self, class_code: impl Into<String>) -> Self {
        self.class_code = Some(class_code.into());
        self
    }

    pub fn with_type_coding(mut self, coding: Coding) -> Self {
        self.type_codings.push(coding);
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_location_stay(mut self, stay: LocationStay) -> Self {
        self.location_stays.push(stay);
        self
    }

    pub fn with_discharge_disposition(mut self, disposition: CodeableConcept) -> Self {
        self.hospitalization = Some(Hospitalization {
            discharge_disposition: Some(disposition),
        });
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn with_facility_contact_id(mut self, facility_contact_id: impl Into<String>) -> Self {
        self.facility_contact_id = Some(facility_contact_id.into());
        self
    }

    /// Whether a resource-level extension equal to `extension` is attached.
    pub fn has_extension(&self, extension: &Extension) -> bool {
        self.extensions.contains(extension)
    }

    /// First resource-level extension with the given url.
    pub fn extension_by_url(&self, url: &str) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.url == url)
    }

    /// Attach `extension` unless an equal one is already present.
    ///
    /// Returns whether the extension was added.
    pub fn attach_extension(&mut self, extension: Extension) -> bool {
        if self.has_extension(&extension) {
            return false;
        }
        self.extensions.push(extension);
        true
    }

    /// The discharge disposition, if any.
    pub fn discharge_disposition(&self) -> Option<&CodeableConcept> {
        self.hospitalization
            .as_ref()
            .and_then(|h| h.discharge_disposition.as_ref())
    }
}

impl PatientRelated for EncounterRecord {
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

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EncounterWire {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub identifier: Vec<IdentifierWire>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub class: Option<CodingWire>,
    #[serde(rename = "type", default)]
    pub encounter_type: Vec<CodeableConceptWire>,
    #[serde(default)]
    pub subject: Option<ReferenceWire>,
    #[serde(default)]
    pub period: Option<PeriodWire>,
    #[serde(default)]
    pub location: Vec<EncounterLocationWire>,
    #[serde(default)]
    pub hospitalization: Option<HospitalizationWire>,
    #[serde(default)]
    pub part_of: Option<ReferenceWire>,
    #[serde(default)]
    pub extension: Vec<ExtensionWire>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct EncounterLocationWire {
    #[serde(default)]
    pub location: Option<ReferenceWire>,
    #[serde(default)]
    pub period: Option<PeriodWire>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HospitalizationWire {
    #[serde(default)]
    pub discharge_disposition: Option<CodeableConceptWire>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

/// Map a wire encounter to a record, validating the mandatory elements when `check` is set.
pub(crate) fn wire_to_domain(wire: EncounterWire, check: bool) -> FhirResult<EncounterRecord> {
    if check {
        if wire.period.as_ref().and_then(|p| p.start.as_ref()).is_none() {
            return Err(FhirError::MissingField("period.start"));
        }
        if wire.class.as_ref().and_then(|c| c.code.as_ref()).is_none() {
            return Err(FhirError::MissingField("class.code"));
        }
    }

    let id = required("id", wire.id.as_deref())?;
    let mut record = EncounterRecord::with_ids(id, reference_id(wire.subject));

    record.identifiers = identifiers_from_wire(wire.identifier)?;
    record.status = wire.status;
    record.class_code = wire.class.and_then(|c| c.code);
    record.type_codings = concepts_from_wire(wire.encounter_type)?
        .into_iter()
        .flat_map(|concept| concept.codings)
        .collect();
    record.period = wire.period.map(period_from_wire).transpose()?;
    record.location_stays = location_stays_from_wire(&record.id, wire.location)?;
    record.hospitalization = wire
        .hospitalization
        .map(|h| -> FhirResult<Hospitalization> {
            Ok(Hospitalization {
                discharge_disposition: h.discharge_disposition.map(concept_from_wire).transpose()?,
            })
        })
        .transpose()?;
    record.part_of = reference_id(wire.part_of);
    record.extensions = extensions_from_wire(wire.extension)?;

    Ok(record)
}

fn location_stays_from_wire(
    encounter_id: &str,
    wire: Vec<EncounterLocationWire>,
) -> FhirResult<Vec<LocationStay>> {
    let mut stays = Vec::with_capacity(wire.len());
    for entry in wire {
        let period = entry.period.map(period_from_wire).transpose()?;
        match reference_id(entry.location) {
            Some(location_id) => stays.push(LocationStay {
                location_id,
                period,
            }),
            None => tracing::warn!(
                encounter_id,
                "encounter location entry without a resolvable location reference skipped"
            ),
        }
    }
    Ok(stays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::ExtensionValue;
    use crate::RelationError;
    use std::sync::Arc;

    const ENCOUNTER_JSON: &str = r#"{
        "resourceType": "Encounter",
        "id": "E-1",
        "meta": {"profile": ["https://www.medizininformatik-initiative.de/fhir/core/modul-fall/StructureDefinition/KontaktGesundheitseinrichtung"]},
        "identifier": [{
            "type": {"coding": [{"system": "http://terminology.hl7.org/CodeSystem/v2-0203", "code": "VN"}]},
            "system": "https://fhir.example.org/fall",
            "value": "V100"
        }],
        "status": "in-progress",
        "class": {"system": "http://terminology.hl7.org/CodeSystem/v3-ActCode", "code": "IMP"},
        "type": [
            {"coding": [{"system": "http://fhir.de/CodeSystem/Kontaktebene", "code": "einrichtungskontakt"}]},
            {"coding": [{"system": "http://fhir.de/CodeSystem/kontaktart-de", "code": "normalstationaer"}]}
        ],
        "subject": {"reference": "Patient/P-1"},
        "period": {"start": "2024-01-01T08:00:00+01:00"},
        "location": [
            {"location": {"reference": "Location/ICU-1"}, "period": {"start": "2024-01-02"}},
            {"location": {"display": "unknown ward"}}
        ],
        "hospitalization": {
            "dischargeDisposition": {
                "extension": [{
                    "url": "http://fhir.de/StructureDefinition/Entlassungsgrund",
                    "extension": [{
                        "url": "ErsteUndZweiteStelle",
                        "valueCoding": {"system": "http://fhir.de/CodeSystem/dkgev/EntlassungsgrundErsteUndZweiteStelle", "code": "07"}
                    }]
                }]
            }
        }
    }"#;

    fn parse(json: &str, check: bool) -> FhirResult<EncounterRecord> {
        let wire: EncounterWire = serde_json::from_str(json).expect("valid encounter json");
        wire_to_domain(wire, check)
    }

    #[test]
    fn maps_encounter_elements() {
        let encounter = parse(ENCOUNTER_JSON, true).expect("valid encounter");

        assert_eq!(encounter.id, "E-1");
        assert_eq!(encounter.patient_id.as_deref(), Some("P-1"));
        assert_eq!(encounter.class_code.as_deref(), Some("IMP"));
        assert_eq!(encounter.type_codings.len(), 2);
        assert_eq!(encounter.type_codings[0].code(), Some("einrichtungskontakt"));

        // The entry without a literal reference is dropped; the id carries no resource type.
        assert_eq!(encounter.location_stays.len(), 1);
        assert_eq!(encounter.location_stays[0].location_id, "ICU-1");
        assert!(encounter.location_stays[0].is_open());

        let reason = encounter
            .discharge_disposition()
            .and_then(|d| d.extension_by_url("http://fhir.de/StructureDefinition/Entlassungsgrund"))
            .and_then(|ext| ext.nested_extension("ErsteUndZweiteStelle"))
            .and_then(|ext| ext.value_coding())
            .and_then(|coding| coding.code());
        assert_eq!(reason, Some("07"));
    }

    #[test]
    fn check_mode_reports_first_missing_field() {
        let no_start = r#"{"resourceType": "Encounter", "id": "E-2", "class": {"code": "IMP"}}"#;
        match parse(no_start, true).expect_err("period.start is mandatory") {
            FhirError::MissingField(name) => assert_eq!(name, "period.start"),
            other => panic!("expected MissingField error, got {other:?}"),
        }

        let no_class = r#"{"resourceType": "Encounter", "id": "E-2", "period": {"start": "2024"}}"#;
        match parse(no_class, true).expect_err("class.code is mandatory") {
            FhirError::MissingField(name) => assert_eq!(name, "class.code"),
            other => panic!("expected MissingField error, got {other:?}"),
        }

        let unchecked = parse(no_class, false).expect("unchecked conversion");
        assert_eq!(unchecked.class_code, None);
    }

    #[test]
    fn new_rejects_blank_patient_id() {
        match EncounterRecord::new("E-3", " ").expect_err("patient id is mandatory") {
            FhirError::MissingField(name) => assert_eq!(name, "patientId"),
            other => panic!("expected MissingField error, got {other:?}"),
        }
    }

    #[test]
    fn attach_extension_is_idempotent() {
        let marker = Extension::new("http://example.org/marker", ExtensionValue::Boolean(true));
        let mut encounter = EncounterRecord::new("E-4", "P-1").expect("valid encounter");

        assert!(encounter.attach_extension(marker.clone()));
        assert!(!encounter.attach_extension(marker.clone()));
        assert_eq!(encounter.extensions, vec![marker]);
    }

    #[test]
    fn patient_link_can_be_set_once() {
        let mut encounter = EncounterRecord::new("E-5", "P-0").expect("valid encounter");
        match encounter.patient().expect_err("not yet linked") {
            RelationError::MandatoryNotInitialised(name) => assert_eq!(name, "patient"),
            other => panic!("expected MandatoryNotInitialised, got {other:?}"),
        }

        let patient = Arc::new(PatientRecord::new(
            "P-1",
            vec![Identifier::new("https://fhir.example.org/pid", "4711")],
        ));
        encounter
            .initialise_patient(Arc::clone(&patient))
            .expect("first initialisation");
        assert_eq!(encounter.patient_id.as_deref(), Some("P-1"));
        assert_eq!(encounter.patient().expect("linked").id, "P-1");

        match encounter
            .initialise_patient(patient)
            .expect_err("second initialisation")
        {
            RelationError::AlreadyInitialised(name) => assert_eq!(name, "patient"),
            other => panic!("expected AlreadyInitialised, got {other:?}"),
        }
    }

    #[test]
    fn patient_without_identifier_is_rejected() {
        let mut encounter = EncounterRecord::new("E-6", "P-1").expect("valid encounter");
        let err = encounter
            .initialise_patient(Arc::new(PatientRecord::new("P-1", Vec::new())))
            .expect_err("identifier required");
        assert_eq!(err, RelationError::MandatoryNotInitialised("patient.identifier"));
    }
}
