//! Patient records.
//!
//! Only the parts of a FHIR Patient the rule crate reads are kept: the resource id, the
//! business identifiers, the birth date and the postal addresses.

use crate::datatypes::{identifiers_from_wire, Identifier, IdentifierWire};
use crate::{FhirError, FhirResult};
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// A postal address reduced to the fields used for residence checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Address {
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Whether the address has a postal code and its country equals `country_code`.
    pub fn has_country_code(&self, country_code: &str) -> bool {
        self.postal_code.as_deref().is_some_and(|p| !p.is_empty())
            && self.country.as_deref() == Some(country_code)
    }
}

/// A patient as seen by the rule crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientRecord {
    /// Resource id, used as the patient id of every linked record.
    pub id: String,

    pub identifiers: Vec<Identifier>,

    /// Birth date as written in the resource (`YYYY`, `YYYY-MM` or `YYYY-MM-DD`).
    pub birth_date: Option<String>,

    pub addresses: Vec<Address>,
}

impl PatientRecord {
    /// Create a patient record with the given id and identifiers.
    pub fn new(id: impl Into<String>, identifiers: Vec<Identifier>) -> Self {
        Self {
            id: id.into(),
            identifiers,
            birth_date: None,
            addresses: Vec::new(),
        }
    }

    /// Whether the first address carries a postal code and the given country code.
    pub fn has_address_with_country(&self, country_code: &str) -> bool {
        self.addresses
            .first()
            .is_some_and(|address| address.has_country_code(country_code))
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PatientWire {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub identifier: Vec<IdentifierWire>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub address: Vec<AddressWire>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddressWire {
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

/// Map a wire patient to a record, validating the mandatory elements when `check` is set.
pub(crate) fn wire_to_domain(wire: PatientWire, check: bool) -> FhirResult<PatientRecord> {
    if check && wire.identifier.is_empty() {
        return Err(FhirError::MissingField("identifier"));
    }

    let id = wire
        .id
        .filter(|id| !id.is_empty())
        .ok_or(FhirError::MissingField("id"))?;

    Ok(PatientRecord {
        id,
        identifiers: identifiers_from_wire(wire.identifier)?,
        birth_date: wire.birth_date,
        addresses: wire
            .address
            .into_iter()
            .map(|a| Address {
                postal_code: a.postal_code,
                country: a.country,
            })
            .collect(),
    })
}
