//! Broad-consent evaluation.
//!
//! A consent answers a question only if it passes three gates: it is filed under the MII
//! consent category together with the LOINC privacy-policy category, its policy names a
//! recognised form version, and a top-level provision of its tree permits the requested code.
//! Only the immediate children of the provision root are inspected.

use crate::constants::{
    CONSENT_CATEGORY_CODE, CONSENT_CATEGORY_CODES_URL, CONSENT_CATEGORY_SYSTEM, LOINC,
    PROVISION_CODE_SYSTEM, URN_OID, V3_ACT_CODE_URL, VERSIONS_MAIN_FORM, VERSION_OID_1_6_D,
    VERSION_OID_1_6_D_REVOKED_COMPLETE, VERSION_OID_1_6_D_REVOKED_PARTLY, VERSION_OID_1_6_F,
    VERSION_OID_1_6_F_REVOKED_COMPLETE, VERSION_OID_1_6_F_REVOKED_PARTLY, VERSION_OID_1_7_2,
    VERSION_OID_1_7_2_PARENTS, VERSION_OID_1_7_2_REVOKED_COMPLETE,
    VERSION_OID_1_7_2_REVOKED_PARTLY, VERSION_OID_1_7_2_UNDERAGE_12_17,
    VERSION_OID_1_7_2_UNDERAGE_7_11, VERSION_OID_Z_MODULE_ACRIBIS,
};
use chrono::{DateTime, Utc};
use fhir::{CodeableConcept, Coding, ConsentRecord, ProvisionNode};

// ============================================================================
// Code tables
// ============================================================================

macro_rules! code_table {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => ($code:expr, $display:expr)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            /// Every entry, in table order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn display(self) -> &'static str {
                match self {
                    $($name::$variant => $display),+
                }
            }

            /// First entry with `code`, in table order.
            pub fn from_code(code: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|entry| entry.code() == code)
            }

            /// A concept holding the single coding of this entry.
            pub fn to_codeable_concept(self) -> CodeableConcept {
                CodeableConcept::from_coding(
                    Coding::new(self.system(), self.code()).with_display(self.display()),
                )
            }
        }
    };
}

code_table! {
    /// Consent categories of the R4 `consent-category` value set.
    pub enum ConsentCategory {
        Acd => ("acd", "Advance Directive"),
        Dnr => ("dnr", "Do Not Resuscitate"),
        EmergencyOnly => ("emrgonly", "Emergency Only"),
        Hcd => ("hcd", "Health Care Directive"),
        Npp => ("npp", "Notice of Privacy Practices"),
        Polst => ("polst", "POLST"),
        Research => ("research", "Research Information Access"),
        Rsdid => ("rsdid", "De-identified Information Access"),
        Rsreid => ("rsreid", "Re-identifiable Information Access"),
        Icol => ("ICOL", "information collection"),
        Idscl => ("IDSCL", "information disclosure"),
        Infa => ("INFA", "information access"),
        Infao => ("INFAO", "access only"),
        Infaso => ("INFASO", "access and save only"),
        Irdscl => ("IRDSCL", "information redisclosure"),
        ActResearch => ("RESEARCH", "research information access"),
        ActRsdid => ("RSDID", "de-identified information access"),
        ActRsreid => ("RSREID", "re-identifiable information access"),
        PatientConsent => ("59284-0", "Patient Consent"),
        PrivacyPolicyAcknowledgement => ("57016-8", "Privacy policy acknowledgement Document"),
        PrivacyPolicyOrganization => ("57017-6", "Privacy policy Organization Document"),
        ReleaseOfInformation => ("64292-6", "Release of information consent"),
    }
}

impl ConsentCategory {
    pub fn system(self) -> &'static str {
        use ConsentCategory::*;
        match self {
            Acd | Dnr | EmergencyOnly | Hcd | Npp | Polst | Research | Rsdid | Rsreid => {
                CONSENT_CATEGORY_CODES_URL
            }
            Icol | Idscl | Infa | Infao | Infaso | Irdscl | ActResearch | ActRsdid
            | ActRsreid => V3_ACT_CODE_URL,
            PatientConsent | PrivacyPolicyAcknowledgement | PrivacyPolicyOrganization
            | ReleaseOfInformation => LOINC,
        }
    }
}

macro_rules! provision_code {
    ($suffix:literal) => {
        concat!("2.16.840.1.113883.3.1937.777.24.5.3.", $suffix)
    };
}

code_table! {
    /// Provision codes of the MII broad-consent policy value set.
    ///
    /// Level-2 entries refine a level-1 entry; a permit on either answers the same question.
    pub enum ConsentPolicyCode {
        PatdatRetrievalSavingUsing => (provision_code!("1"), "Patientendaten erheben, speichern, nutzen"),
        IdatCollect => (provision_code!("2"), "IDAT erheben"),
        IdatSaveProcess => (provision_code!("3"), "IDAT speichern, verarbeiten"),
        IdatMergeThirdParties => (provision_code!("4"), "IDAT zusammenfuehren Dritte"),
        IdatOfferDsgvo => (provision_code!("5"), "IDAT bereitstellen EU DSGVO NIVEAU"),
        MdatCollection => (provision_code!("6"), "MDAT erheben"),
        MdatSaveProcess => (provision_code!("7"), "MDAT speichern, verarbeiten"),
        MdatScientificUsageDsgvo => (provision_code!("8"), "MDAT wissenschaftlich nutzen EU DSGVO NIVEAU"),
        MdatMergeThirdParties => (provision_code!("9"), "MDAT zusammenfuehren Dritte"),
        RecontactingOnEvents => (provision_code!("37"), "Rekontaktierung Ergebnisse erheblicher Bedeutung"),
        PatdatRetrospectiveUsage => (provision_code!("44"), "Patientendaten retrospektiv verarbeiten, nutzen"),
        MdatRetroSaveProcess => (provision_code!("45"), "MDAT retrospektiv speichern verarbeiten"),
        MdatRetroScientificUsageDsgvo => (provision_code!("46"), "MDAT retrospektiv wissenschaftlich nutzen EU DSGVO NIVEAU"),
        MdatRetroMergeThirdParties => (provision_code!("47"), "MDAT retrospektiv zusammenfuehren Dritte"),
        PatdatForwardingNonDsgvo => (provision_code!("48"), "Patientendaten Weitergabe non DSGVO NIVEAU"),
        MdatOfferNonDsgvo => (provision_code!("49"), "MDAT bereitstellen non EU DSGVO NIVEAU"),
        KkdatRetroTransferSaveUsage => (provision_code!("10"), "Krankenkassendaten retrospektiv uebertragen, speichern, nutzen"),
        Kkdat5YearsRetroTransfer => (provision_code!("11"), "KKDAT 5J retrospektiv uebertragen"),
        Kkdat5YearsRetroSaveProcess => (provision_code!("12"), "KKDAT 5J retrospektiv speichern verarbeiten"),
        Kkdat5YearsRetroScientificUsage => (provision_code!("13"), "KKDAT 5J retrospektiv wissenschaftlich nutzen"),
        Kkdat5YearsRetroTransferKvnr => (provision_code!("38"), "KKDAT 5J retrospektiv uebertragen KVNR"),
        KkdatProspectiveTransferSaveUsage => (provision_code!("14"), "KKDAT prospektiv uebertragen speichern nutzen"),
        Kkdat5YearsProspectiveTransfer => (provision_code!("15"), "KKDAT 5J prospektiv uebertragen"),
        Kkdat5YearsProspectiveSaveProcess => (provision_code!("16"), "KKDAT 5J prospektiv speichern verarbeiten"),
        Kkdat5YearsProspectiveScientificUsage => (provision_code!("17"), "KKDAT 5J prospektiv wissenschaftlich nutzen"),
        Kkdat5YearsProspectiveTransferKvnr => (provision_code!("39"), "KKDAT 5J prospektiv uebertragen KVNR"),
        BiomatCollectStoreUse => (provision_code!("18"), "Biomaterial erheben, lagern, nutzen"),
        BiomatCollect => (provision_code!("19"), "BIOMAT erheben"),
        BiomatStoreProcess => (provision_code!("20"), "BIOMAT lagern verarbeiten"),
        BiomatTransferOwnership => (provision_code!("21"), "BIOMAT Eigentum übertragen"),
        BiomatScientificUsageDsgvo => (provision_code!("22"), "BIOMAT wissenschaftlich nutzen EU DSGVO NIVEAU"),
        BiomatMergeAnalysisDataThirdParties => (provision_code!("23"), "BIOMAT Analysedaten zusammenfuehren Dritte"),
        BiomatAdditionalSampling => (provision_code!("24"), "Biomaterial Zusatzentnahme"),
        BiomatAdditionalQuantities => (provision_code!("25"), "BIOMAT Zusatzmengen entnehmen"),
        BiomatRetroStoringUsage => (provision_code!("50"), "Biomaterial retrospektiv speichern, nutzen"),
        BiomatRetroStoreProcess => (provision_code!("51"), "BIOMAT retrospektiv lagern verarbeiten"),
        BiomatRetroScientificUsageDsgvo => (provision_code!("52"), "BIOMAT retrospektiv wissenschaftlich nutzen EU DSGVO NIVEAU"),
        BiomatRetroMergeAnalysisDataThirdParties => (provision_code!("53"), "BIOMAT retrospektiv Analysedaten zusammenfuehren Dritte"),
        BiomatForwardingNonDsgvo => (provision_code!("54"), "Biomaterial Weitergabe non EU DSGVO NIVEAU"),
        BiomatOfferNonDsgvo => (provision_code!("55"), "BIOMAT bereitstellen ohne EU DSGVO NIVEAU"),
        RecontactingAdditions => (provision_code!("26"), "Rekontaktierung Ergänzungen"),
        RecontactingMergingDatabases => (provision_code!("27"), "Rekontaktierung Verknüpfung Datenbanken"),
        RecontactingFurtherCollection => (provision_code!("28"), "Rekontaktierung weitere Erhebung"),
        RecontactingFurtherStudies => (provision_code!("29"), "Rekontaktierung weitere Studien"),
        RecontactingAdditionalFinding => (provision_code!("30"), "Rekontaktierung Zusatzbefund"),
        RecontactingAdditionalFindingLvl2 => (provision_code!("31"), "Rekontaktierung Zusatzbefund"),
        Z1Gecco83UsageNumCodex => (provision_code!("32"), "Z1 GECCO83 Nutzung NUM/CODEX"),
        MdatGecco83CompleteOnce => (provision_code!("40"), "MDAT GECCO83 komplettieren einmalig"),
        MdatGecco83Collect => (provision_code!("43"), "MDAT GECCO83 erheben"),
        MdatGecco83OfferNumCodex => (provision_code!("33"), "MDAT GECCO83 bereitstellen NUM/CODEX"),
        MdatGecco83StoreProcessNumCodex => (provision_code!("34"), "MDAT GECCO83 speichern verarbeiten NUM/CODEX"),
        MdatGecco83ScientificUsageNumCodexDsgvo => (provision_code!("56"), "MDAT GECCO83 wissenschaftlich nutzen NUM/CODEX EU DSGVO NIVEAU"),
        Z2PatData => (provision_code!("57"), "Z2 Patientendaten erheben, nutzen, Kontaktierung im acribis-Projekt"),
        Z2PatDataLvl2 => (provision_code!("58"), "PATDAT erheben, nutzen, Kontaktierung im acribis-Projekt"),
        Z2Idat => (provision_code!("59"), "Z2 IDAT Melderegister abfragen, speichern, verarbeiten im acribis-Projekt"),
        Z2IdatLvl2 => (provision_code!("60"), "Anschrift und Vitalstatus Melderegister abfragen, speichern, verarbeiten im acribis-Projekt"),
        Z2Mdat => (provision_code!("61"), "Z2 MDAT Hausarzt erheben, speichern, verarbeiten, nutzen im acribis-Projekt"),
        // Published with the same code as its level-1 parent.
        Z2MdatLvl2 => (provision_code!("61"), "MDAT Hausarzt erheben, speichern, verarbeiten, nutzen im acribis-Projekt"),
    }
}

impl ConsentPolicyCode {
    pub fn system(self) -> &'static str {
        PROVISION_CODE_SYSTEM
    }
}

/// Form versions named by `Consent.policy.uri`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConsentFormVersion {
    V16d,
    V16dRevokedComplete,
    V16dRevokedPartly,
    V16f,
    V16fRevokedComplete,
    V16fRevokedPartly,
    V172,
    V172RevokedComplete,
    V172RevokedPartly,
    V172Parents,
    V172Underage7To11,
    V172Underage12To17,
    Acribis,
}

impl ConsentFormVersion {
    const ALL: [ConsentFormVersion; 13] = [
        Self::V16d,
        Self::V16dRevokedComplete,
        Self::V16dRevokedPartly,
        Self::V16f,
        Self::V16fRevokedComplete,
        Self::V16fRevokedPartly,
        Self::V172,
        Self::V172RevokedComplete,
        Self::V172RevokedPartly,
        Self::V172Parents,
        Self::V172Underage7To11,
        Self::V172Underage12To17,
        Self::Acribis,
    ];

    pub fn oid(self) -> &'static str {
        match self {
            Self::V16d => VERSION_OID_1_6_D,
            Self::V16dRevokedComplete => VERSION_OID_1_6_D_REVOKED_COMPLETE,
            Self::V16dRevokedPartly => VERSION_OID_1_6_D_REVOKED_PARTLY,
            Self::V16f => VERSION_OID_1_6_F,
            Self::V16fRevokedComplete => VERSION_OID_1_6_F_REVOKED_COMPLETE,
            Self::V16fRevokedPartly => VERSION_OID_1_6_F_REVOKED_PARTLY,
            Self::V172 => VERSION_OID_1_7_2,
            Self::V172RevokedComplete => VERSION_OID_1_7_2_REVOKED_COMPLETE,
            Self::V172RevokedPartly => VERSION_OID_1_7_2_REVOKED_PARTLY,
            Self::V172Parents => VERSION_OID_1_7_2_PARENTS,
            Self::V172Underage7To11 => VERSION_OID_1_7_2_UNDERAGE_7_11,
            Self::V172Underage12To17 => VERSION_OID_1_7_2_UNDERAGE_12_17,
            Self::Acribis => VERSION_OID_Z_MODULE_ACRIBIS,
        }
    }

    pub fn from_oid(oid: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|version| version.oid() == oid)
    }

    /// Classify a policy URI, with or without the `urn:oid:` prefix.
    pub fn from_policy_uri(uri: &str) -> Option<Self> {
        Self::from_oid(strip_urn_oid(uri))
    }

    /// Whether the version is one of the broad-consent main forms.
    pub fn is_main_form(self) -> bool {
        VERSIONS_MAIN_FORM.contains(&self.oid())
    }

    pub fn is_revoked(self) -> bool {
        matches!(
            self,
            Self::V16dRevokedComplete
                | Self::V16dRevokedPartly
                | Self::V16fRevokedComplete
                | Self::V16fRevokedPartly
                | Self::V172RevokedComplete
                | Self::V172RevokedPartly
        )
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Consent questions over a single consent record.
pub struct ConsentEvaluator;

impl ConsentEvaluator {
    /// Whether the consent carries both the MII consent category and the LOINC
    /// privacy-policy category.
    pub fn is_recognized_category(consent: &ConsentRecord) -> bool {
        let has_category = |system: &str, code: &str| {
            consent
                .categories
                .iter()
                .any(|category| category.has_coding(system, code))
        };
        let privacy_policy = ConsentCategory::PrivacyPolicyAcknowledgement;

        has_category(CONSENT_CATEGORY_SYSTEM, CONSENT_CATEGORY_CODE)
            && has_category(privacy_policy.system(), privacy_policy.code())
    }

    /// Whether some policy URI names one of the broad-consent main forms.
    pub fn is_main_form(consent: &ConsentRecord) -> bool {
        policy_oids(consent).any(|oid| VERSIONS_MAIN_FORM.contains(&oid))
    }

    /// Whether some policy URI names the form `oid`.
    pub fn is_special_form(consent: &ConsentRecord, oid: &str) -> bool {
        policy_oids(consent).any(|candidate| candidate == oid)
    }

    /// Form version of the first recognised policy URI.
    pub fn form_version(consent: &ConsentRecord) -> Option<ConsentFormVersion> {
        policy_oids(consent).find_map(ConsentFormVersion::from_oid)
    }

    /// Whether a top-level permit provision is coded with `code`.
    pub fn has_permit(consent: &ConsentRecord, code: &str) -> bool {
        permits(consent).any(|provision| has_provision_code(provision, code))
    }

    /// Whether patient data may be collected and used under a main-form consent.
    pub fn data_usage_allowed(consent: &ConsentRecord) -> bool {
        Self::is_main_form(consent)
            && Self::is_recognized_category(consent)
            && (Self::has_permit(consent, ConsentPolicyCode::PatdatRetrievalSavingUsing.code())
                || Self::has_permit(consent, ConsentPolicyCode::MdatCollection.code()))
    }

    /// Whether the patient may be re-contacted under a main-form consent.
    pub fn recontact_allowed(consent: &ConsentRecord) -> bool {
        Self::is_main_form(consent)
            && Self::is_recognized_category(consent)
            && (Self::has_permit(consent, ConsentPolicyCode::RecontactingAdditions.code())
                || Self::has_permit(consent, ConsentPolicyCode::RecontactingFurtherCollection.code()))
    }

    /// Whether a special-form consent permits `level1_code` or `level2_code`.
    pub fn special_form_allowed(
        consent: &ConsentRecord,
        oid: &str,
        level1_code: &str,
        level2_code: &str,
    ) -> bool {
        Self::is_special_form(consent, oid)
            && Self::is_recognized_category(consent)
            && permits(consent).any(|provision| {
                has_provision_code(provision, level1_code)
                    || has_provision_code(provision, level2_code)
            })
    }

    /// Start of the first permit of a special-form consent coded with either level code.
    pub fn special_form_permit_start_date(
        consent: &ConsentRecord,
        oid: &str,
        level1_code: &str,
        level2_code: &str,
    ) -> Option<DateTime<Utc>> {
        if !Self::is_special_form(consent, oid) || !Self::is_recognized_category(consent) {
            return None;
        }

        permits(consent)
            .filter(|provision| {
                has_provision_code(provision, level1_code)
                    || has_provision_code(provision, level2_code)
            })
            .find_map(|provision| provision.period.and_then(|period| period.start))
    }

    /// Whether the ACRIBIS module consent permits patient data use.
    pub fn acribis_allowed(consent: &ConsentRecord) -> bool {
        Self::special_form_allowed(
            consent,
            VERSION_OID_Z_MODULE_ACRIBIS,
            ConsentPolicyCode::Z2PatData.code(),
            ConsentPolicyCode::Z2PatDataLvl2.code(),
        )
    }

    pub fn acribis_permit_start_date(consent: &ConsentRecord) -> Option<DateTime<Utc>> {
        Self::special_form_permit_start_date(
            consent,
            VERSION_OID_Z_MODULE_ACRIBIS,
            ConsentPolicyCode::Z2PatData.code(),
            ConsentPolicyCode::Z2PatDataLvl2.code(),
        )
    }
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn strip_urn_oid(uri: &str) -> &str {
    uri.strip_prefix(URN_OID).unwrap_or(uri)
}

fn policy_oids(consent: &ConsentRecord) -> impl Iterator<Item = &str> {
    consent
        .policy_uris
        .iter()
        .map(|uri| strip_urn_oid(uri))
}

fn permits(consent: &ConsentRecord) -> impl Iterator<Item = &ProvisionNode> {
    consent
        .top_level_provisions()
        .iter()
        .filter(|provision| provision.is_permit())
}

fn has_provision_code(provision: &ProvisionNode, code: &str) -> bool {
    provision
        .code
        .as_ref()
        .is_some_and(|concept| concept.has_coding(PROVISION_CODE_SYSTEM, code))
}
