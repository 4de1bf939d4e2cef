//! Resource-kind dispatch.
//!
//! Loaders hand over FHIR resources as JSON or YAML text without knowing their kind up
//! front. [`Resource`] reads `resourceType`, routes to the mapping function of that kind and
//! returns the typed record.

use crate::{
    condition, consent, encounter, location, observation, patient, procedure, ConditionRecord,
    ConsentRecord, EncounterRecord, FhirError, FhirResult, LocationRecord, ObservationRecord,
    PatientRecord, ProcedureRecord,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Supported resource kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Patient,
    Encounter,
    Condition,
    Procedure,
    Observation,
    Consent,
    Location,
}

impl ResourceKind {
    /// Convert to the FHIR `resourceType` string.
    pub fn to_wire(self) -> &'static str {
        match self {
            ResourceKind::Patient => "Patient",
            ResourceKind::Encounter => "Encounter",
            ResourceKind::Condition => "Condition",
            ResourceKind::Procedure => "Procedure",
            ResourceKind::Observation => "Observation",
            ResourceKind::Consent => "Consent",
            ResourceKind::Location => "Location",
        }
    }

    /// Parse from the FHIR `resourceType` string.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "Patient" => Some(ResourceKind::Patient),
            "Encounter" => Some(ResourceKind::Encounter),
            "Condition" => Some(ResourceKind::Condition),
            "Procedure" => Some(ResourceKind::Procedure),
            "Observation" => Some(ResourceKind::Observation),
            "Consent" => Some(ResourceKind::Consent),
            "Location" => Some(ResourceKind::Location),
            _ => None,
        }
    }
}

/// A converted clinical record of any supported kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    Patient(PatientRecord),
    Encounter(EncounterRecord),
    Condition(ConditionRecord),
    Procedure(ProcedureRecord),
    Observation(ObservationRecord),
    Consent(ConsentRecord),
    Location(LocationRecord),
}

impl Resource {
    /// Parse a resource from FHIR JSON text.
    ///
    /// # Arguments
    ///
    /// * `json_text` - JSON text of a single FHIR resource.
    /// * `check` - When set, the mandatory elements of the resource kind are validated.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the text is not valid JSON,
    /// - `resourceType` is missing or not a supported kind,
    /// - an element has an unexpected shape (the failing path is reported),
    /// - `check` is set and a mandatory element is missing.
    pub fn from_json(json_text: &str, check: bool) -> FhirResult<Self> {
        let value: Value = serde_json::from_str(json_text)?;
        Self::from_value(value, check)
    }

    /// Parse a resource from YAML text; see [`Resource::from_json`].
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] under the same conditions as [`Resource::from_json`], with
    /// [`FhirError::InvalidYaml`] for malformed YAML.
    pub fn from_yaml(yaml_text: &str, check: bool) -> FhirResult<Self> {
        let value: Value = serde_yaml::from_str(yaml_text)?;
        Self::from_value(value, check)
    }

    /// Convert an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// See [`Resource::from_json`].
    pub fn from_value(value: Value, check: bool) -> FhirResult<Self> {
        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(FhirError::MissingField("resourceType"))?;
        let kind = ResourceKind::from_wire(resource_type)
            .ok_or_else(|| FhirError::UnsupportedResourceType(resource_type.to_string()))?;

        match kind {
            ResourceKind::Patient => {
                patient::wire_to_domain(decode(value, kind)?, check).map(Resource::Patient)
            }
            ResourceKind::Encounter => {
                encounter::wire_to_domain(decode(value, kind)?, check).map(Resource::Encounter)
            }
            ResourceKind::Condition => {
                condition::wire_to_domain(decode(value, kind)?, check).map(Resource::Condition)
            }
            ResourceKind::Procedure => {
                procedure::wire_to_domain(decode(value, kind)?, check).map(Resource::Procedure)
            }
            ResourceKind::Observation => observation::wire_to_domain(decode(value, kind)?, check)
                .map(Resource::Observation),
            ResourceKind::Consent => {
                consent::wire_to_domain(decode(value, kind)?, check).map(Resource::Consent)
            }
            ResourceKind::Location => {
                location::wire_to_domain(decode(value, kind)?, check).map(Resource::Location)
            }
        }
    }

    /// Convert a batch of resources.
    ///
    /// Resources that fail to convert are logged and skipped, so one malformed entry does
    /// not discard the rest of a bundle.
    pub fn convert_all(values: impl IntoIterator<Item = Value>, check: bool) -> Vec<Self> {
        values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match Self::from_value(value, check) {
                Ok(resource) => Some(resource),
                Err(err) => {
                    tracing::warn!(index, error = %err, "resource conversion failed, skipping");
                    None
                }
            })
            .collect()
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Patient(_) => ResourceKind::Patient,
            Resource::Encounter(_) => ResourceKind::Encounter,
            Resource::Condition(_) => ResourceKind::Condition,
            Resource::Procedure(_) => ResourceKind::Procedure,
            Resource::Observation(_) => ResourceKind::Observation,
            Resource::Consent(_) => ResourceKind::Consent,
            Resource::Location(_) => ResourceKind::Location,
        }
    }

    /// Resource id, if the record has one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Resource::Patient(r) => Some(&r.id),
            Resource::Encounter(r) => Some(&r.id),
            Resource::Location(r) => Some(&r.id),
            Resource::Condition(r) => r.id.as_deref(),
            Resource::Procedure(r) => r.id.as_deref(),
            Resource::Observation(r) => r.id.as_deref(),
            Resource::Consent(r) => r.id.as_deref(),
        }
    }
}

/// Deserialize the wire model of `kind`, reporting the failing path on mismatch.
fn decode<W: DeserializeOwned>(value: Value, kind: ResourceKind) -> FhirResult<W> {
    serde_path_to_error::deserialize::<_, W>(value).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>"
        } else {
            path.as_str()
        };
        FhirError::Translation(format!(
            "{} schema mismatch at {path}: {source}",
            kind.to_wire()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_resource_type() {
        let resource = Resource::from_json(
            r#"{"resourceType": "Location", "id": "ICU-1", "type": [{"coding": [{"code": "ICU"}]}]}"#,
            false,
        )
        .expect("valid location");

        assert_eq!(resource.kind(), ResourceKind::Location);
        assert_eq!(resource.id(), Some("ICU-1"));
        match resource {
            Resource::Location(location) => assert!(location.has_type_code("ICU")),
            other => panic!("expected location, got {other:?}"),
        }
    }

    #[test]
    fn dispatches_observations() {
        let resource = Resource::from_json(
            r#"{
                "resourceType": "Observation",
                "id": "O-1",
                "status": "final",
                "code": {"coding": [{"system": "http://loinc.org", "code": "94500-6"}]},
                "subject": {"reference": "Patient/P-1"},
                "encounter": {"reference": "Encounter/E-1"}
            }"#,
            true,
        )
        .expect("valid observation");

        assert_eq!(resource.kind(), ResourceKind::Observation);
        assert_eq!(resource.id(), Some("O-1"));
        match resource {
            Resource::Observation(observation) => {
                assert_eq!(observation.case_id.as_deref(), Some("E-1"));
            }
            other => panic!("expected observation, got {other:?}"),
        }
    }

    #[test]
    fn parses_yaml_resources() {
        let yaml = r#"
resourceType: Encounter
id: E-1
class:
  code: IMP
period:
  start: 2024-01-01T08:00:00Z
subject:
  reference: Patient/P-1
"#;
        let resource = Resource::from_yaml(yaml, true).expect("valid encounter");
        match resource {
            Resource::Encounter(encounter) => {
                assert_eq!(encounter.patient_id.as_deref(), Some("P-1"));
                assert_eq!(encounter.class_code.as_deref(), Some("IMP"));
            }
            other => panic!("expected encounter, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unsupported_resource_type() {
        let err = Resource::from_json(r#"{"resourceType": "Medication", "id": "M-1"}"#, false)
            .expect_err("unsupported");
        match err {
            FhirError::UnsupportedResourceType(kind) => assert_eq!(kind, "Medication"),
            other => panic!("expected UnsupportedResourceType error, got {other:?}"),
        }

        let err = Resource::from_json(r#"{"id": "X"}"#, false).expect_err("no resourceType");
        match err {
            FhirError::MissingField(name) => assert_eq!(name, "resourceType"),
            other => panic!("expected MissingField error, got {other:?}"),
        }
    }

    #[test]
    fn schema_mismatch_reports_path() {
        let err = Resource::from_json(
            r#"{"resourceType": "Condition", "code": {"coding": [{"code": 42}]}}"#,
            false,
        )
        .expect_err("code must be a string");

        match err {
            FhirError::Translation(msg) => {
                assert!(msg.starts_with("Condition schema mismatch at code.coding"));
            }
            other => panic!("expected Translation error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_reported() {
        match Resource::from_json("{not json", false).expect_err("malformed") {
            FhirError::InvalidJson(_) => {}
            other => panic!("expected InvalidJson error, got {other:?}"),
        }
    }

    #[test]
    fn convert_all_skips_failures() {
        let values = vec![
            serde_json::json!({"resourceType": "Patient", "id": "P-1", "identifier": [{"value": "1"}]}),
            serde_json::json!({"resourceType": "Patient", "id": "P-2"}),
            serde_json::json!({"resourceType": "Medication"}),
            serde_json::json!({"resourceType": "Location", "id": "L-1", "identifier": [{"value": "L"}], "physicalType": {}}),
        ];

        let converted = Resource::convert_all(values, true);
        let ids: Vec<_> = converted.iter().filter_map(Resource::id).collect();
        assert_eq!(ids, vec!["P-1", "L-1"]);
    }
}
