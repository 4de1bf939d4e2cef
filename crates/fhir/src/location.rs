//! Location records.

use crate::datatypes::{
    concept_from_wire, concepts_from_wire, identifiers_from_wire, CodeableConcept,
    CodeableConceptWire, Identifier, IdentifierWire,
};
use crate::{required, FhirError, FhirResult};
use serde::Deserialize;

/// A location (ward, room, bed) as seen by the rule crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationRecord {
    pub id: String,
    pub identifiers: Vec<Identifier>,

    /// Physical form, e.g. ward (`wa`) or room (`ro`).
    pub physical_type: Option<CodeableConcept>,

    /// Service types, e.g. intensive care unit (`ICU`).
    pub types: Vec<CodeableConcept>,
}

impl LocationRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            identifiers: Vec::new(),
            physical_type: None,
            types: Vec::new(),
        }
    }

    pub fn with_physical_type(mut self, physical_type: CodeableConcept) -> Self {
        self.physical_type = Some(physical_type);
        self
    }

    pub fn with_type(mut self, location_type: CodeableConcept) -> Self {
        self.types.push(location_type);
        self
    }

    /// Whether some type concept carries a coding with `code`, regardless of system.
    pub fn has_type_code(&self, code: &str) -> bool {
        self.types
            .iter()
            .flat_map(|t| t.codings.iter())
            .any(|c| c.code() == Some(code))
    }

    /// Whether the physical type carries a coding with `code`, regardless of system.
    pub fn has_physical_type_code(&self, code: &str) -> bool {
        self.physical_type
            .as_ref()
            .is_some_and(|p| p.codings.iter().any(|c| c.code() == Some(code)))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LocationWire {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub identifier: Vec<IdentifierWire>,
    #[serde(default)]
    pub physical_type: Option<CodeableConceptWire>,
    #[serde(rename = "type", default)]
    pub location_type: Vec<CodeableConceptWire>,
}

/// Map a wire location to a record, validating the mandatory elements when `check` is set.
pub(crate) fn wire_to_domain(wire: LocationWire, check: bool) -> FhirResult<LocationRecord> {
    if check {
        if wire.identifier.is_empty() {
            return Err(FhirError::MissingField("identifier"));
        }
        if wire.physical_type.is_none() {
            return Err(FhirError::MissingField("physicalType"));
        }
    }

    Ok(LocationRecord {
        id: required("id", wire.id.as_deref())?,
        identifiers: identifiers_from_wire(wire.identifier)?,
        physical_type: wire.physical_type.map(concept_from_wire).transpose()?,
        types: concepts_from_wire(wire.location_type)?,
    })
}
