//! Consent directive records.
//!
//! A consent carries its categories, the policy URIs naming the directive form version and
//! a provision tree. The root provision is usually a blanket deny whose children permit
//! individual data-use or re-contact codes, each with a validity period.

use crate::datatypes::{
    concept_from_wire, concepts_from_wire, period_from_wire, reference_id, CodeableConcept,
    CodeableConceptWire, Period, PeriodWire, ReferenceWire,
};
use crate::relation::{EncounterRelated, Link, PatientRelated};
use crate::{required, EncounterRecord, FhirError, FhirResult, PatientRecord};
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// Whether a provision permits or denies the actions it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProvisionType {
    Permit,
    Deny,
}

impl ProvisionType {
    /// Convert to FHIR wire format string.
    pub fn to_wire(self) -> &'static str {
        match self {
            ProvisionType::Permit => "permit",
            ProvisionType::Deny => "deny",
        }
    }

    /// Parse from FHIR wire format string.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "permit" => Some(ProvisionType::Permit),
            "deny" => Some(ProvisionType::Deny),
            _ => None,
        }
    }
}

/// One node of a consent provision tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProvisionNode {
    pub provision_type: Option<ProvisionType>,

    /// The provision code; only the first code concept of the wire list is kept.
    pub code: Option<CodeableConcept>,

    pub period: Option<Period>,

    pub children: Vec<ProvisionNode>,
}

impl ProvisionNode {
    pub fn new(provision_type: ProvisionType) -> Self {
        Self {
            provision_type: Some(provision_type),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: CodeableConcept) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_child(mut self, child: ProvisionNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_permit(&self) -> bool {
        self.provision_type == Some(ProvisionType::Permit)
    }
}

/// A consent directive as seen by the rule crate.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsentRecord {
    pub id: Option<String>,
    pub status: Option<String>,
    pub scope: Option<CodeableConcept>,
    pub categories: Vec<CodeableConcept>,

    /// `Consent.policy.uri` values in source order, e.g. `urn:oid:2.16.840...`.
    pub policy_uris: Vec<String>,

    /// Root of the provision tree.
    pub provision: Option<ProvisionNode>,

    pub patient_id: Option<String>,
    pub case_id: Option<String>,

    patient: Link<PatientRecord>,
    encounter: Link<EncounterRecord>,
}

impl ConsentRecord {
    /// Create a consent with its mandatory elements.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingField`] naming the first missing element
    /// (`patientId`, `status`, `scope`, `category`).
    pub fn new(
        patient_id: &str,
        case_id: Option<&str>,
        status: &str,
        scope: Option<CodeableConcept>,
        categories: Vec<CodeableConcept>,
    ) -> FhirResult<Self> {
        let patient_id = required("patientId", Some(patient_id))?;
        let status = required("status", Some(status))?;
        let scope = scope.ok_or(FhirError::MissingField("scope"))?;
        if categories.is_empty() {
            return Err(FhirError::MissingField("category"));
        }

        Ok(Self {
            id: None,
            status: Some(status),
            scope: Some(scope),
            categories,
            policy_uris: Vec::new(),
            provision: None,
            patient_id: Some(patient_id),
            case_id: case_id.filter(|c| !c.is_empty()).map(str::to_string),
            patient: Link::default(),
            encounter: Link::default(),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_policy_uri(mut self, uri: impl Into<String>) -> Self {
        self.policy_uris.push(uri.into());
        self
    }

    pub fn with_provision(mut self, provision: ProvisionNode) -> Self {
        self.provision = Some(provision);
        self
    }

    /// Immediate children of the root provision; empty without a root.
    pub fn top_level_provisions(&self) -> &[ProvisionNode] {
        self.provision
            .as_ref()
            .map(|root| root.children.as_slice())
            .unwrap_or_default()
    }
}

impl PatientRelated for ConsentRecord {
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

impl EncounterRelated for ConsentRecord {
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
pub(crate) struct ConsentWire {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub scope: Option<CodeableConceptWire>,
    #[serde(default)]
    pub category: Vec<CodeableConceptWire>,
    #[serde(default)]
    pub patient: Option<ReferenceWire>,
    #[serde(default)]
    pub policy: Vec<PolicyWire>,
    #[serde(default)]
    pub provision: Option<ProvisionWire>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct PolicyWire {
    #[serde(default)]
    pub uri: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ProvisionWire {
    #[serde(rename = "type", default)]
    pub provision_type: Option<String>,
    #[serde(default)]
    pub period: Option<PeriodWire>,
    #[serde(default)]
    pub code: Vec<CodeableConceptWire>,
    #[serde(default)]
    pub provision: Vec<ProvisionWire>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

/// Map a wire consent to a record, validating the mandatory elements when `check` is set.
pub(crate) fn wire_to_domain(wire: ConsentWire, check: bool) -> FhirResult<ConsentRecord> {
    if check {
        if wire.patient.as_ref().and_then(|p| p.reference.as_ref()).is_none() {
            return Err(FhirError::MissingField("patient"));
        }
        if wire.status.is_none() {
            return Err(FhirError::MissingField("status"));
        }
        if wire.category.is_empty() {
            return Err(FhirError::MissingField("category"));
        }
    }

    Ok(ConsentRecord {
        id: wire.id,
        status: wire.status,
        scope: wire.scope.map(concept_from_wire).transpose()?,
        categories: concepts_from_wire(wire.category)?,
        policy_uris: wire.policy.into_iter().filter_map(|p| p.uri).collect(),
        provision: wire.provision.map(provision_from_wire).transpose()?,
        patient_id: reference_id(wire.patient),
        case_id: None,
        patient: Link::default(),
        encounter: Link::default(),
    })
}

fn provision_from_wire(wire: ProvisionWire) -> FhirResult<ProvisionNode> {
    let provision_type = match wire.provision_type.as_deref() {
        None => None,
        Some(s) => Some(ProvisionType::from_wire(s).ok_or_else(|| {
            FhirError::InvalidInput(format!("unknown provision type '{s}'"))
        })?),
    };

    Ok(ProvisionNode {
        provision_type,
        code: wire.code.into_iter().next().map(concept_from_wire).transpose()?,
        period: wire.period.map(period_from_wire).transpose()?,
        children: wire
            .provision
            .into_iter()
            .map(provision_from_wire)
            .collect::<FhirResult<Vec<_>>>()?,
    })
}
