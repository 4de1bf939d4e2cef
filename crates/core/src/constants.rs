//! Terminology constants used throughout the KDS core crate.
//!
//! System URIs, extension URLs and literal codes are kept here so every rule reads the
//! same byte-for-byte values.

// ============================================================================
// Terminology systems
// ============================================================================

/// ICD-10-GM (German modification) diagnosis codes.
pub const ICD: &str = "http://fhir.de/CodeSystem/bfarm/icd-10-gm";

/// OPS procedure codes.
pub const OPS: &str = "http://fhir.de/CodeSystem/bfarm/ops";

pub const SNOMED: &str = "http://snomed.info/sct";

pub const LOINC: &str = "http://loinc.org";

/// Diagnosis reliability ("Diagnosesicherheit") extension on ICD codings.
pub const EXTENSION_DIAGNOSIS_RELIABILITY: &str =
    "http://fhir.de/StructureDefinition/icd-10-gm-diagnosesicherheit";

/// Code system of the reliability letters (`G`, `V`, `Z`, `A`).
pub const EXTENSION_DIAGNOSIS_RELIABILITY_SYSTEM: &str =
    "https://fhir.kbv.de/CodeSystem/KBV_CS_SFHIR_ICD_DIAGNOSESICHERHEIT";

// ============================================================================
// Identifier defaults
// ============================================================================

/// Default system of patient identifiers when none is configured.
pub const DEFAULT_PATIENT_IDENTIFIER_SYSTEM: &str =
    "https://www.medizininformatik-initiative.de/fhir/core/NamingSystem/patient-identifier";

/// Default system of encounter identifiers when none is configured.
pub const DEFAULT_ENCOUNTER_IDENTIFIER_SYSTEM: &str =
    "https://www.medizininformatik-initiative.de/fhir/core/NamingSystem/encounter-identifier";

/// Identifier type system carrying the visit-number slice.
pub const IDENTIFIER_VN_TYPE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v2-0203";

pub const IDENTIFIER_VN_TYPE_CODE: &str = "VN";

// ============================================================================
// Consent
// ============================================================================

pub const CONSENT_CATEGORY_SYSTEM: &str =
    "https://www.medizininformatik-initiative.de/fhir/modul-consent/CodeSystem/mii-cs-consent-consent_category";

pub const CONSENT_CATEGORY_CODE: &str = "2.16.840.1.113883.3.1937.777.24.2.184";

pub const CONSENT_CATEGORY_CODES_URL: &str =
    "http://terminology.hl7.org/CodeSystem/consentcategorycodes";

pub const V3_ACT_CODE_URL: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";

/// Prefix of OIDs written as URIs.
pub const URN_OID: &str = "urn:oid:";

/// Code system of consent provision codes.
pub const PROVISION_CODE_SYSTEM: &str = "urn:oid:2.16.840.1.113883.3.1937.777.24.5.3";

pub const VERSION_OID_1_6_D: &str = "2.16.840.1.113883.3.1937.777.24.2.1790";
pub const VERSION_OID_1_6_D_REVOKED_COMPLETE: &str = "2.16.840.1.113883.3.1937.777.24.2.2718";
pub const VERSION_OID_1_6_D_REVOKED_PARTLY: &str = "2.16.840.1.113883.3.1937.777.24.2.2719";

pub const VERSION_OID_1_6_F: &str = "2.16.840.1.113883.3.1937.777.24.2.1791";
pub const VERSION_OID_1_6_F_REVOKED_COMPLETE: &str = "2.16.840.1.113883.3.1937.777.24.2.2720";
pub const VERSION_OID_1_6_F_REVOKED_PARTLY: &str = "2.16.840.1.113883.3.1937.777.24.2.2721";

pub const VERSION_OID_1_7_2: &str = "2.16.840.1.113883.3.1937.777.24.2.2079";
pub const VERSION_OID_1_7_2_REVOKED_COMPLETE: &str = "2.16.840.1.113883.3.1937.777.24.2.2722";
pub const VERSION_OID_1_7_2_REVOKED_PARTLY: &str = "2.16.840.1.113883.3.1937.777.24.2.2723";
pub const VERSION_OID_1_7_2_PARENTS: &str = "2.16.840.1.113883.3.1937.777.24.2.3542";
pub const VERSION_OID_1_7_2_UNDERAGE_7_11: &str = "2.16.840.1.113883.3.1937.777.24.2.3543";
pub const VERSION_OID_1_7_2_UNDERAGE_12_17: &str = "2.16.840.1.113883.3.1937.777.24.2.3544";

pub const VERSION_OID_Z_MODULE_ACRIBIS: &str = "2.16.840.1.113883.3.1937.777.24.2.4031";

/// Broad-consent form versions whose provisions answer the general data-use questions.
pub const VERSIONS_MAIN_FORM: [&str; 3] = [VERSION_OID_1_6_D, VERSION_OID_1_6_F, VERSION_OID_1_7_2];

// ============================================================================
// Encounter
// ============================================================================

/// Contact level ("Kontaktebene") system of `Encounter.type`.
pub const CONTACT_LEVEL_SYSTEM: &str = "http://fhir.de/CodeSystem/Kontaktebene";

pub const CONTACT_LEVEL_FACILITY: &str = "einrichtungskontakt";
pub const CONTACT_LEVEL_SUPPLY: &str = "versorgungsstellenkontakt";
pub const CONTACT_LEVEL_DEPARTMENT: &str = "abteilungskontakt";

pub const ENCOUNTER_CLASS_INPATIENT_CODES: [&str; 2] = ["IMP", "stationaer"];
pub const ENCOUNTER_CLASS_OUTPATIENT_CODES: [&str; 2] = ["AMB", "ambulant"];

pub const DISCHARGE_DISPOSITION_EXT_URL: &str =
    "http://fhir.de/StructureDefinition/Entlassungsgrund";
pub const DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_EXT_URL: &str = "ErsteUndZweiteStelle";
pub const DISCHARGE_DISPOSITION_FIRST_AND_SECOND_POS_SYSTEM: &str =
    "http://fhir.de/CodeSystem/dkgev/EntlassungsgrundErsteUndZweiteStelle";
pub const DEATH_CODE: &str = "07";
pub const DEATH_CODE_DISPLAY: &str = "Tod";

// ============================================================================
// Location
// ============================================================================

pub const LOCATION_PHYSICAL_TYPE_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/location-physical-type";

pub const ROLE_CODE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-RoleCode";

/// Location type code of intensive care units.
pub const ICU: &str = "ICU";

/// Physical type code of wards.
pub const WARD: &str = "wa";

pub const ICU_DUMMY_ID: &str = "ICU_DUMMY";
pub const ICU_DUMMY_REF: &str = "Location/ICU_DUMMY";
