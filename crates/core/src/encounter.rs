//! Encounter classification.
//!
//! Encounters form a hierarchy of facility, supply and department contacts, declared through
//! the `Kontaktebene` coding of `Encounter.type`. An encounter without any type coding is
//! treated as matching every level.

use crate::constants::{
    CONTACT_LEVEL_DEPARTMENT, CONTACT_LEVEL_FACILITY, CONTACT_LEVEL_SUPPLY, CONTACT_LEVEL_SYSTEM,
    DEATH_CODE, DISCHARGE_DISPOSITION_EXT_URL, DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_EXT_URL,
    DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_SYSTEM, ENCOUNTER_CLASS_INPATIENT_CODES,
    ENCOUNTER_CLASS_OUTPATIENT_CODES,
};
use crate::identifiers::IdentifierResolver;
use fhir::{EncounterRecord, Extension, ExtensionValue};
use std::collections::HashSet;

/// Outcome of comparing an encounter's declared contact level with a requested one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactLevelMatch {
    /// The encounter declares no type at all.
    Unknown,
    Matches,
    DoesNotMatch,
}

/// Contact-level, ICU and discharge questions over encounters.
pub struct EncounterContactClassifier;

impl EncounterContactClassifier {
    pub fn contact_level_match(encounter: &EncounterRecord, level_code: &str) -> ContactLevelMatch {
        if encounter.type_codings.is_empty() {
            return ContactLevelMatch::Unknown;
        }
        if encounter
            .type_codings
            .iter()
            .any(|coding| coding.is(CONTACT_LEVEL_SYSTEM, level_code))
        {
            ContactLevelMatch::Matches
        } else {
            ContactLevelMatch::DoesNotMatch
        }
    }

    /// Whether the encounter sits at contact level `level_code`.
    pub fn is_contact_level(encounter: &EncounterRecord, level_code: &str) -> bool {
        match Self::contact_level_match(encounter, level_code) {
            // Untyped encounters match every level; loaders without Kontaktebene rely on it.
            ContactLevelMatch::Unknown | ContactLevelMatch::Matches => true,
            ContactLevelMatch::DoesNotMatch => false,
        }
    }

    pub fn is_facility_contact(encounter: &EncounterRecord) -> bool {
        Self::is_contact_level(encounter, CONTACT_LEVEL_FACILITY)
    }

    pub fn is_supply_contact(encounter: &EncounterRecord) -> bool {
        Self::is_contact_level(encounter, CONTACT_LEVEL_SUPPLY)
    }

    pub fn is_department_contact(encounter: &EncounterRecord) -> bool {
        Self::is_contact_level(encounter, CONTACT_LEVEL_DEPARTMENT)
    }

    /// Id of the facility contact the encounter belongs to.
    ///
    /// An id assigned by the loader wins; otherwise a facility contact is its own ancestor.
    pub fn facility_contact_id(encounter: &EncounterRecord) -> Option<&str> {
        if let Some(id) = encounter.facility_contact_id.as_deref() {
            return Some(id);
        }
        Self::is_facility_contact(encounter).then_some(encounter.id.as_str())
    }

    /// Whether an open stay (started, not ended) is at one of the ICU locations.
    pub fn is_currently_on_icu(
        encounter: &EncounterRecord,
        icu_location_ids: &HashSet<String>,
    ) -> bool {
        !icu_location_ids.is_empty()
            && encounter
                .location_stays
                .iter()
                .filter(|stay| stay.is_open())
                .any(|stay| icu_location_ids.contains(&stay.location_id))
    }

    /// Whether any stay, open or closed, is at one of the ICU locations.
    pub fn is_icu_case(encounter: &EncounterRecord, icu_location_ids: &HashSet<String>) -> bool {
        encounter
            .location_stays
            .iter()
            .any(|stay| icu_location_ids.contains(&stay.location_id))
    }

    pub fn is_period_start_existent(encounter: &EncounterRecord) -> bool {
        encounter.period.is_some_and(|period| period.start.is_some())
    }

    pub fn is_inpatient(encounter: &EncounterRecord) -> bool {
        class_code_in(encounter, &ENCOUNTER_CLASS_INPATIENT_CODES)
    }

    pub fn is_outpatient(encounter: &EncounterRecord) -> bool {
        class_code_in(encounter, &ENCOUNTER_CLASS_OUTPATIENT_CODES)
    }

    /// Whether the discharge reason records the patient's death.
    ///
    /// Reads the first-and-second-position part of the `Entlassungsgrund` extension on the
    /// discharge disposition.
    pub fn is_patient_deceased(encounter: &EncounterRecord) -> bool {
        let Some(discharge_reason) = encounter
            .discharge_disposition()
            .and_then(|disposition| disposition.extension_by_url(DISCHARGE_DISPOSITION_EXT_URL))
        else {
            return false;
        };

        let Some(position) =
            discharge_reason.nested_extension(DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_EXT_URL)
        else {
            tracing::warn!(
                encounter_id = %encounter.id,
                "discharge reason without {DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_EXT_URL} part"
            );
            return false;
        };

        match &position.value {
            Some(ExtensionValue::Coding(coding)) => {
                coding.is(DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_SYSTEM, DEATH_CODE)
            }
            other => {
                tracing::warn!(
                    encounter_id = %encounter.id,
                    value_type = other.as_ref().map_or("none", ExtensionValue::type_name),
                    "discharge reason value is not a Coding"
                );
                false
            }
        }
    }

    /// Attach `marker` to every encounter whose visit number is in `values`.
    ///
    /// Returns the matching encounters; the marker is attached at most once per encounter.
    pub fn flag_encounters_by_visit_number<'a>(
        values: &HashSet<String>,
        encounters: &'a mut [EncounterRecord],
        marker: &Extension,
    ) -> Vec<&'a EncounterRecord> {
        let mut flagged = Vec::new();
        for encounter in encounters.iter_mut() {
            let matches = IdentifierResolver::visit_number_identifier_value(encounter)
                .is_some_and(|value| values.contains(value));
            if matches {
                encounter.attach_extension(marker.clone());
                flagged.push(&*encounter);
            }
        }
        flagged
    }
}

fn class_code_in(encounter: &EncounterRecord, codes: &[&str]) -> bool {
    encounter
        .class_code
        .as_deref()
        .is_some_and(|code| codes.contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEATH_CODE_DISPLAY, IDENTIFIER_VN_TYPE_CODE, IDENTIFIER_VN_TYPE_SYSTEM};
    use fhir::{parse_fhir_datetime, CodeableConcept, Coding, Identifier, LocationStay, Period};

    fn encounter(id: &str) -> EncounterRecord {
        EncounterRecord::new(id, "P-1").expect("valid encounter")
    }

    fn level(code: &str) -> Coding {
        Coding::new(CONTACT_LEVEL_SYSTEM, code)
    }

    fn stay(location_id: &str, end: Option<&str>) -> LocationStay {
        let start = parse_fhir_datetime("2024-01-01T08:00:00Z").ok();
        let end = end.map(|e| parse_fhir_datetime(e).expect("end date"));
        LocationStay::new(location_id, Some(Period::new(start, end)))
    }

    fn discharge(value: ExtensionValue) -> CodeableConcept {
        CodeableConcept::default().with_extension(Extension::complex(
            DISCHARGE_DISPOSITION_EXT_URL,
            vec![Extension::new(
                DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_EXT_URL,
                value,
            )],
        ))
    }

    fn visit_number(value: &str) -> Identifier {
        Identifier::new("https://fhir.example.org/fallnummer", value).with_type(
            CodeableConcept::from_coding(Coding::new(
                IDENTIFIER_VN_TYPE_SYSTEM,
                IDENTIFIER_VN_TYPE_CODE,
            )),
        )
    }

    #[test]
    fn untyped_encounter_matches_every_level() {
        let enc = encounter("E-1");
        assert_eq!(
            EncounterContactClassifier::contact_level_match(&enc, CONTACT_LEVEL_FACILITY),
            ContactLevelMatch::Unknown
        );
        assert!(EncounterContactClassifier::is_facility_contact(&enc));
        assert!(EncounterContactClassifier::is_supply_contact(&enc));
        assert!(EncounterContactClassifier::is_department_contact(&enc));
    }

    #[test]
    fn typed_encounter_matches_only_declared_level() {
        let enc = encounter("E-1").with_type_coding(level(CONTACT_LEVEL_DEPARTMENT));
        assert!(EncounterContactClassifier::is_department_contact(&enc));
        assert!(!EncounterContactClassifier::is_facility_contact(&enc));
        assert!(!EncounterContactClassifier::is_supply_contact(&enc));

        // Right code, wrong system.
        let other_system = encounter("E-2")
            .with_type_coding(Coding::new("http://fhir.de/CodeSystem/kontaktart-de", "abteilungskontakt"));
        assert_eq!(
            EncounterContactClassifier::contact_level_match(&other_system, CONTACT_LEVEL_DEPARTMENT),
            ContactLevelMatch::DoesNotMatch
        );
    }

    #[test]
    fn facility_contact_id_prefers_assigned_id() {
        let assigned = encounter("E-2")
            .with_type_coding(level(CONTACT_LEVEL_DEPARTMENT))
            .with_facility_contact_id("E-1");
        assert_eq!(EncounterContactClassifier::facility_contact_id(&assigned), Some("E-1"));

        let facility = encounter("E-1").with_type_coding(level(CONTACT_LEVEL_FACILITY));
        assert_eq!(EncounterContactClassifier::facility_contact_id(&facility), Some("E-1"));

        let department = encounter("E-3").with_type_coding(level(CONTACT_LEVEL_DEPARTMENT));
        assert_eq!(EncounterContactClassifier::facility_contact_id(&department), None);
    }

    #[test]
    fn open_icu_stay_means_currently_on_icu() {
        let icu_ids = HashSet::from(["ICU-1".to_string()]);

        let open = encounter("E-1").with_location_stay(stay("ICU-1", None));
        assert!(EncounterContactClassifier::is_currently_on_icu(&open, &icu_ids));
        assert!(!EncounterContactClassifier::is_currently_on_icu(&open, &HashSet::new()));

        let closed = encounter("E-1").with_location_stay(stay("ICU-1", Some("2024-01-03T08:00:00Z")));
        assert!(!EncounterContactClassifier::is_currently_on_icu(&closed, &icu_ids));
        assert!(EncounterContactClassifier::is_icu_case(&closed, &icu_ids));
    }

    #[test]
    fn class_codes_split_inpatient_and_outpatient() {
        let inpatient = encounter("E-1").with_class_code("IMP");
        let outpatient = encounter("E-2").with_class_code("ambulant");
        assert!(EncounterContactClassifier::is_inpatient(&inpatient));
        assert!(!EncounterContactClassifier::is_outpatient(&inpatient));
        assert!(EncounterContactClassifier::is_outpatient(&outpatient));
        assert!(!EncounterContactClassifier::is_inpatient(&encounter("E-3")));
    }

    #[test]
    fn period_start_existence() {
        let start = parse_fhir_datetime("2024-01-01").ok();
        let with_start = encounter("E-1").with_period(Period::new(start, None));
        let without_start = encounter("E-2").with_period(Period::new(None, start));
        assert!(EncounterContactClassifier::is_period_start_existent(&with_start));
        assert!(!EncounterContactClassifier::is_period_start_existent(&without_start));
        assert!(!EncounterContactClassifier::is_period_start_existent(&encounter("E-3")));
    }

    #[test]
    fn death_discharge_is_detected() {
        let death = Coding::new(DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_SYSTEM, DEATH_CODE)
            .with_display(DEATH_CODE_DISPLAY);
        let deceased = encounter("E-1")
            .with_discharge_disposition(discharge(ExtensionValue::Coding(death)));
        assert!(EncounterContactClassifier::is_patient_deceased(&deceased));

        let regular = Coding::new(DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_SYSTEM, "01");
        let discharged = encounter("E-2")
            .with_discharge_disposition(discharge(ExtensionValue::Coding(regular)));
        assert!(!EncounterContactClassifier::is_patient_deceased(&discharged));
    }

    #[test]
    fn malformed_discharge_reason_is_not_death() {
        let wrong_type = encounter("E-1")
            .with_discharge_disposition(discharge(ExtensionValue::Code(DEATH_CODE.into())));
        assert!(!EncounterContactClassifier::is_patient_deceased(&wrong_type));

        let without_part = encounter("E-2").with_discharge_disposition(
            CodeableConcept::default()
                .with_extension(Extension::complex(DISCHARGE_DISPOSITION_EXT_URL, Vec::new())),
        );
        assert!(!EncounterContactClassifier::is_patient_deceased(&without_part));
        assert!(!EncounterContactClassifier::is_patient_deceased(&encounter("E-3")));
    }

    #[test]
    fn bad_extension_date_does_not_hide_death_discharge() {
        let value = serde_json::json!({
            "resourceType": "Encounter",
            "id": "E-1",
            "class": {"code": "IMP"},
            "period": {"start": "2024-01-01T08:00:00Z"},
            "subject": {"reference": "Patient/P-1"},
            "extension": [{"url": "http://example.org/aufnahme", "valueDateTime": "2024-13-45"}],
            "hospitalization": {"dischargeDisposition": {"extension": [{
                "url": DISCHARGE_DISPOSITION_EXT_URL,
                "extension": [{
                    "url": DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_EXT_URL,
                    "valueCoding": {
                        "system": DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_SYSTEM,
                        "code": DEATH_CODE
                    }
                }]
            }]}}
        });

        let converted = fhir::Resource::convert_all(vec![value], true);
        assert_eq!(converted.len(), 1);
        let encounter = match &converted[0] {
            fhir::Resource::Encounter(encounter) => encounter,
            other => panic!("expected Encounter resource, got {:?}", other.kind()),
        };
        assert!(encounter.extension_by_url("http://example.org/aufnahme").is_some());
        assert!(EncounterContactClassifier::is_patient_deceased(encounter));
    }

    #[test]
    fn flagging_attaches_marker_once() {
        let marker = Extension::new(
            "https://fhir.example.org/StructureDefinition/flagged",
            ExtensionValue::Boolean(true),
        );
        let mut encounters = vec![
            encounter("E-1").with_identifier(visit_number("V100")),
            encounter("E-2").with_identifier(visit_number("V200")),
            encounter("E-3"),
        ];
        let values = HashSet::from(["V100".to_string()]);

        let flagged =
            EncounterContactClassifier::flag_encounters_by_visit_number(&values, &mut encounters, &marker);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, "E-1");
        assert!(flagged[0].has_extension(&marker));

        EncounterContactClassifier::flag_encounters_by_visit_number(&values, &mut encounters, &marker);
        assert_eq!(encounters[0].extensions.len(), 1);
        assert!(!encounters[1].has_extension(&marker));
    }
}
