//! FHIR-aligned general-purpose data types.
//!
//! This module provides the value objects every clinical record is built from
//! (Coding, CodeableConcept, Identifier, Period, Reference, Extension) together with the
//! wire representations they are read from.
//!
//! Responsibilities:
//! - Define immutable domain-level value types for the rule crates
//! - Define lenient wire models matching the FHIR JSON element shapes
//! - Normalise FHIR date/time strings to UTC instants
//!
//! Notes:
//! - Wire models ignore elements this workspace does not interpret; FHIR resources
//!   produced by real servers carry far more than we read.
//! - `value[x]` choice elements are folded into closed enums.

use crate::{FhirError, FhirResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

// ============================================================================
// Public domain-level types
// ============================================================================

/// A single (terminology system, code) pair, optionally with display text and extensions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Coding {
    /// Terminology system URI.
    pub system: Option<String>,

    /// Code within the system.
    pub code: Option<String>,

    /// Human-readable display text.
    pub display: Option<String>,

    /// Extensions attached to this coding (e.g. diagnosis reliability).
    pub extensions: Vec<Extension>,
}

impl Coding {
    /// Create a coding for the given system and code.
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            display: None,
            extensions: Vec::new(),
        }
    }

    /// Set the display text.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Attach an extension.
    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// The system, if present and non-empty.
    pub fn system(&self) -> Option<&str> {
        non_empty(self.system.as_deref())
    }

    /// The code, if present and non-empty.
    pub fn code(&self) -> Option<&str> {
        non_empty(self.code.as_deref())
    }

    /// Whether this coding belongs to `system`.
    pub fn has_system(&self, system: &str) -> bool {
        self.system() == Some(system)
    }

    /// Whether this coding is exactly (`system`, `code`).
    pub fn is(&self, system: &str, code: &str) -> bool {
        self.has_system(system) && self.code() == Some(code)
    }

    /// First extension with the given url.
    pub fn extension_by_url(&self, url: &str) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.url == url)
    }
}

/// A set of alternative codings for one real-world concept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeableConcept {
    /// Alternative encodings, in source order.
    pub codings: Vec<Coding>,

    /// Plain text representation.
    pub text: Option<String>,

    /// Extensions on the concept element itself.
    pub extensions: Vec<Extension>,
}

impl CodeableConcept {
    /// Concept with a single coding.
    pub fn from_coding(coding: Coding) -> Self {
        Self {
            codings: vec![coding],
            text: None,
            extensions: Vec::new(),
        }
    }

    /// Attach an extension to the concept element.
    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Whether any coding is exactly (`system`, `code`).
    pub fn has_coding(&self, system: &str, code: &str) -> bool {
        self.codings.iter().any(|c| c.is(system, code))
    }

    /// First coding, without creating an empty placeholder when there is none.
    pub fn first_coding(&self) -> Option<&Coding> {
        self.codings.first()
    }

    /// First extension with the given url.
    pub fn extension_by_url(&self, url: &str) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.url == url)
    }
}

/// A FHIR extension: a url plus either a value or nested extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extension {
    /// Identifies the meaning of the extension.
    pub url: String,

    /// The `value[x]` content, if any.
    pub value: Option<ExtensionValue>,

    /// Nested (complex) extension content.
    pub extensions: Vec<Extension>,
}

impl Extension {
    /// Simple extension carrying a value.
    pub fn new(url: impl Into<String>, value: ExtensionValue) -> Self {
        Self {
            url: url.into(),
            value: Some(value),
            extensions: Vec::new(),
        }
    }

    /// Complex extension carrying nested extensions only.
    pub fn complex(url: impl Into<String>, extensions: Vec<Extension>) -> Self {
        Self {
            url: url.into(),
            value: None,
            extensions,
        }
    }

    /// First nested extension with the given url.
    pub fn nested_extension(&self, url: &str) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.url == url)
    }

    /// The value, if it is a coding.
    pub fn value_coding(&self) -> Option<&Coding> {
        match &self.value {
            Some(ExtensionValue::Coding(coding)) => Some(coding),
            _ => None,
        }
    }
}

/// Supported `Extension.value[x]` types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtensionValue {
    Coding(Coding),
    Code(String),
    String(String),
    Boolean(bool),
    Integer(i64),
    DateTime(DateTime<Utc>),
    Reference(Reference),
}

impl ExtensionValue {
    /// FHIR type name of the value, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ExtensionValue::Coding(_) => "Coding",
            ExtensionValue::Code(_) => "code",
            ExtensionValue::String(_) => "string",
            ExtensionValue::Boolean(_) => "boolean",
            ExtensionValue::Integer(_) => "integer",
            ExtensionValue::DateTime(_) => "dateTime",
            ExtensionValue::Reference(_) => "Reference",
        }
    }
}

/// Purpose of an identifier.
///
/// An identifier without a declared use is represented by `None` at the call site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentifierUse {
    Usual,
    Official,
    Temp,
    Secondary,
    Old,
}

impl IdentifierUse {
    /// Convert to FHIR wire format string.
    pub fn to_wire(self) -> &'static str {
        match self {
            IdentifierUse::Usual => "usual",
            IdentifierUse::Official => "official",
            IdentifierUse::Temp => "temp",
            IdentifierUse::Secondary => "secondary",
            IdentifierUse::Old => "old",
        }
    }

    /// Parse from FHIR wire format string.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "usual" => Some(IdentifierUse::Usual),
            "official" => Some(IdentifierUse::Official),
            "temp" => Some(IdentifierUse::Temp),
            "secondary" => Some(IdentifierUse::Secondary),
            "old" => Some(IdentifierUse::Old),
            _ => None,
        }
    }
}

/// A business identifier of a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identifier {
    /// Namespace of the identifier value.
    pub system: Option<String>,

    /// The identifier value.
    pub value: Option<String>,

    /// Declared purpose; `None` when unset or unrecognised.
    pub use_type: Option<IdentifierUse>,

    /// Declared use text that maps to no [`IdentifierUse`].
    pub unrecognised_use: Option<String>,

    /// Identifier type, carrying slice markers such as the visit number (`VN`).
    pub identifier_type: Option<CodeableConcept>,
}

impl Identifier {
    /// Identifier with system and value and no declared use.
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            value: Some(value.into()),
            use_type: None,
            unrecognised_use: None,
            identifier_type: None,
        }
    }

    /// Set the declared use.
    pub fn with_use(mut self, use_type: IdentifierUse) -> Self {
        self.use_type = Some(use_type);
        self
    }

    /// Set the identifier type.
    pub fn with_type(mut self, identifier_type: CodeableConcept) -> Self {
        self.identifier_type = Some(identifier_type);
        self
    }

    /// The system, if present and non-empty.
    pub fn system(&self) -> Option<&str> {
        non_empty(self.system.as_deref())
    }

    /// The value, if present and non-empty.
    pub fn value(&self) -> Option<&str> {
        non_empty(self.value.as_deref())
    }

    /// Whether the source declared any use, recognised or not.
    pub fn has_declared_use(&self) -> bool {
        self.use_type.is_some() || self.unrecognised_use.is_some()
    }
}

/// A time range; either bound may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Period {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Period {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Started and not yet ended.
    pub fn is_active(&self) -> bool {
        self.start.is_some() && self.end.is_none()
    }
}

/// A reference to another resource, either literal (`Type/id`) or logical (identifier).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reference {
    /// Literal reference, e.g. `Location/123`.
    pub reference: Option<String>,

    /// Logical reference.
    pub identifier: Option<Identifier>,
}

impl Reference {
    /// Literal reference to `resource_type/id`.
    pub fn to(resource_type: &str, id: &str) -> Self {
        Self {
            reference: Some(format!("{resource_type}/{id}")),
            identifier: None,
        }
    }

    /// Plain id of the referenced resource, i.e. the reference without its resource type.
    ///
    /// Falls back to the logical identifier value when there is no literal reference.
    pub fn id_part(&self) -> Option<&str> {
        match non_empty(self.reference.as_deref()) {
            Some(reference) => reference.rsplit('/').next().filter(|s| !s.is_empty()),
            None => self.identifier.as_ref().and_then(Identifier::value),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

// ============================================================================
// Date/time parsing
// ============================================================================

/// Parse a FHIR `date`, `dateTime` or `instant` string into a UTC instant.
///
/// Partial dates (`YYYY`, `YYYY-MM`) resolve to the first instant of the period; local
/// date-times without offset are taken as UTC.
///
/// # Errors
///
/// Returns [`FhirError::InvalidDateTime`] if the string matches none of the FHIR forms.
pub fn parse_fhir_datetime(value: &str) -> FhirResult<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    let mut parts = value.splitn(3, '-');
    let year = parts.next().and_then(|y| y.parse::<i32>().ok());
    let month = parts.next().map(|m| m.parse::<u32>().ok());
    let day = parts.next().map(|d| d.parse::<u32>().ok());

    let date = match (year, month, day) {
        (Some(y), None, None) if value.len() == 4 => NaiveDate::from_ymd_opt(y, 1, 1),
        (Some(y), Some(Some(m)), None) => NaiveDate::from_ymd_opt(y, m, 1),
        (Some(y), Some(Some(m)), Some(Some(d))) => NaiveDate::from_ymd_opt(y, m, d),
        _ => None,
    };

    date.and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| FhirError::InvalidDateTime(value.to_string()))
}

pub(crate) fn parse_optional_datetime(value: Option<&str>) -> FhirResult<Option<DateTime<Utc>>> {
    value.map(parse_fhir_datetime).transpose()
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct CodingWire {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub extension: Vec<ExtensionWire>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct CodeableConceptWire {
    #[serde(default)]
    pub coding: Vec<CodingWire>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub extension: Vec<ExtensionWire>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExtensionWire {
    pub url: String,
    #[serde(default)]
    pub value_coding: Option<CodingWire>,
    #[serde(default)]
    pub value_code: Option<String>,
    #[serde(default)]
    pub value_string: Option<String>,
    #[serde(default)]
    pub value_boolean: Option<bool>,
    #[serde(default)]
    pub value_integer: Option<i64>,
    #[serde(default)]
    pub value_date_time: Option<String>,
    #[serde(default)]
    pub value_reference: Option<ReferenceWire>,
    #[serde(default)]
    pub extension: Vec<ExtensionWire>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct IdentifierWire {
    #[serde(rename = "use", default)]
    pub use_type: Option<String>,
    #[serde(rename = "type", default)]
    pub identifier_type: Option<CodeableConceptWire>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct PeriodWire {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct ReferenceWire {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub identifier: Option<IdentifierWire>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

pub(crate) fn coding_from_wire(wire: CodingWire) -> FhirResult<Coding> {
    Ok(Coding {
        system: wire.system,
        code: wire.code,
        display: wire.display,
        extensions: extensions_from_wire(wire.extension)?,
    })
}

pub(crate) fn concept_from_wire(wire: CodeableConceptWire) -> FhirResult<CodeableConcept> {
    Ok(CodeableConcept {
        codings: wire
            .coding
            .into_iter()
            .map(coding_from_wire)
            .collect::<FhirResult<Vec<_>>>()?,
        text: wire.text,
        extensions: extensions_from_wire(wire.extension)?,
    })
}

pub(crate) fn concepts_from_wire(
    wire: Vec<CodeableConceptWire>,
) -> FhirResult<Vec<CodeableConcept>> {
    wire.into_iter().map(concept_from_wire).collect()
}

pub(crate) fn extensions_from_wire(wire: Vec<ExtensionWire>) -> FhirResult<Vec<Extension>> {
    wire.into_iter().map(extension_from_wire).collect()
}

fn extension_from_wire(wire: ExtensionWire) -> FhirResult<Extension> {
    // At most one value[x] is populated in valid FHIR; the first present one wins.
    let value = if let Some(coding) = wire.value_coding {
        Some(ExtensionValue::Coding(coding_from_wire(coding)?))
    } else if let Some(code) = wire.value_code {
        Some(ExtensionValue::Code(code))
    } else if let Some(s) = wire.value_string {
        Some(ExtensionValue::String(s))
    } else if let Some(b) = wire.value_boolean {
        Some(ExtensionValue::Boolean(b))
    } else if let Some(i) = wire.value_integer {
        Some(ExtensionValue::Integer(i))
    } else if let Some(dt) = wire.value_date_time {
        match parse_fhir_datetime(&dt) {
            Ok(parsed) => Some(ExtensionValue::DateTime(parsed)),
            Err(_) => {
                tracing::warn!(url = %wire.url, value = %dt, "unparsable extension dateTime dropped");
                None
            }
        }
    } else {
        wire.value_reference
            .map(|r| ExtensionValue::Reference(reference_from_wire(r)))
    };

    Ok(Extension {
        url: wire.url,
        value,
        extensions: extensions_from_wire(wire.extension)?,
    })
}

pub(crate) fn identifier_from_wire(wire: IdentifierWire) -> FhirResult<Identifier> {
    let (use_type, unrecognised_use) = identifier_use_from_wire(wire.use_type);
    Ok(Identifier {
        system: wire.system,
        value: wire.value,
        use_type,
        unrecognised_use,
        identifier_type: wire.identifier_type.map(concept_from_wire).transpose()?,
    })
}

fn identifier_use_from_wire(raw: Option<String>) -> (Option<IdentifierUse>, Option<String>) {
    let Some(raw) = raw else {
        return (None, None);
    };
    match IdentifierUse::from_wire(&raw) {
        Some(use_type) => (Some(use_type), None),
        None => {
            tracing::warn!(value = %raw, "unrecognised identifier use kept out of untyped fallback");
            (None, Some(raw))
        }
    }
}

pub(crate) fn identifiers_from_wire(wire: Vec<IdentifierWire>) -> FhirResult<Vec<Identifier>> {
    wire.into_iter().map(identifier_from_wire).collect()
}

pub(crate) fn period_from_wire(wire: PeriodWire) -> FhirResult<Period> {
    Ok(Period {
        start: parse_optional_datetime(wire.start.as_deref())?,
        end: parse_optional_datetime(wire.end.as_deref())?,
    })
}

pub(crate) fn reference_from_wire(wire: ReferenceWire) -> Reference {
    Reference {
        reference: wire.reference,
        // Identifier types inside logical references are not interpreted.
        identifier: wire.identifier.map(|i| {
            let (use_type, unrecognised_use) = identifier_use_from_wire(i.use_type);
            Identifier {
                system: i.system,
                value: i.value,
                use_type,
                unrecognised_use,
                identifier_type: None,
            }
        }),
    }
}

/// Plain id of an optional wire reference.
pub(crate) fn reference_id(wire: Option<ReferenceWire>) -> Option<String> {
    wire.map(reference_from_wire)
        .and_then(|r| r.id_part().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn parses_full_and_partial_datetimes() {
        let full = parse_fhir_datetime("2024-03-01T10:15:00+01:00").expect("rfc3339");
        assert_eq!(full.to_rfc3339(), "2024-03-01T09:15:00+00:00");

        let local = parse_fhir_datetime("2024-03-01T10:15:00").expect("local date-time");
        assert_eq!(local.to_rfc3339(), "2024-03-01T10:15:00+00:00");

        let date = parse_fhir_datetime("2024-03-01").expect("date");
        assert_eq!(date.day(), 1);

        let month = parse_fhir_datetime("2024-03").expect("year-month");
        assert_eq!((month.year(), month.month(), month.day()), (2024, 3, 1));

        let year = parse_fhir_datetime("2024").expect("year");
        assert_eq!((year.year(), year.month()), (2024, 1));
    }

    #[test]
    fn rejects_malformed_datetimes() {
        for bad in ["", "yesterday", "2024-13-01", "2024-02-30", "24"] {
            let err = parse_fhir_datetime(bad).expect_err("should reject");
            match err {
                FhirError::InvalidDateTime(_) => {}
                other => panic!("expected InvalidDateTime error, got {other:?}"),
            }
        }
    }

    #[test]
    fn reference_id_part_strips_resource_type() {
        assert_eq!(Reference::to("Location", "ICU-1").id_part(), Some("ICU-1"));

        let absolute = Reference {
            reference: Some("https://fhir.example.org/Encounter/E-9".into()),
            identifier: None,
        };
        assert_eq!(absolute.id_part(), Some("E-9"));

        let logical = Reference {
            reference: None,
            identifier: Some(Identifier::new("urn:sys", "P-1")),
        };
        assert_eq!(logical.id_part(), Some("P-1"));

        assert_eq!(Reference::default().id_part(), None);
    }

    #[test]
    fn extension_value_choice_is_folded() {
        let wire: ExtensionWire = serde_json::from_str(
            r#"{"url": "http://example.org/ext", "valueCoding": {"system": "s", "code": "G"}}"#,
        )
        .expect("valid extension");
        let ext = extension_from_wire(wire).expect("convert");
        assert_eq!(ext.value_coding(), Some(&Coding::new("s", "G")));

        let wire: ExtensionWire =
            serde_json::from_str(r#"{"url": "http://example.org/ext", "valueString": "G"}"#)
                .expect("valid extension");
        let ext = extension_from_wire(wire).expect("convert");
        assert!(ext.value_coding().is_none());
        assert_eq!(ext.value.as_ref().map(ExtensionValue::type_name), Some("string"));
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let coding = Coding {
            system: Some(String::new()),
            code: Some(String::new()),
            ..Coding::default()
        };
        assert_eq!(coding.system(), None);
        assert_eq!(coding.code(), None);

        let identifier = Identifier {
            value: Some(String::new()),
            ..Identifier::default()
        };
        assert_eq!(identifier.value(), None);
    }

    #[test]
    fn unrecognised_identifier_use_is_kept_apart() {
        let wire: IdentifierWire =
            serde_json::from_str(r#"{"use": "offical", "system": "urn:sys", "value": "A"}"#)
                .expect("valid identifier");
        let identifier = identifier_from_wire(wire).expect("convert");
        assert_eq!(identifier.use_type, None);
        assert_eq!(identifier.unrecognised_use.as_deref(), Some("offical"));
        assert!(identifier.has_declared_use());

        let wire: IdentifierWire =
            serde_json::from_str(r#"{"use": "official", "value": "B"}"#).expect("valid identifier");
        let identifier = identifier_from_wire(wire).expect("convert");
        assert_eq!(identifier.use_type, Some(IdentifierUse::Official));
        assert_eq!(identifier.unrecognised_use, None);

        assert!(!Identifier::new("urn:sys", "C").has_declared_use());
    }

    #[test]
    fn unparsable_extension_date_drops_only_the_value() {
        let wire: ExtensionWire = serde_json::from_str(
            r#"{
                "url": "http://example.org/aufnahme",
                "valueDateTime": "2024-13-45",
                "extension": [{"url": "part", "valueCode": "x"}]
            }"#,
        )
        .expect("valid extension");
        let ext = extension_from_wire(wire).expect("bad date is not fatal");
        assert_eq!(ext.url, "http://example.org/aufnahme");
        assert!(ext.value.is_none());
        assert_eq!(ext.extensions.len(), 1);
    }

    #[test]
    fn active_period_requires_start_without_end() {
        let start = parse_fhir_datetime("2024-01-01").expect("date");
        let end = parse_fhir_datetime("2024-01-05").expect("date");
        assert!(Period::new(Some(start), None).is_active());
        assert!(!Period::new(Some(start), Some(end)).is_active());
        assert!(!Period::new(None, None).is_active());
    }
}
