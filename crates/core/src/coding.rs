//! Code matching over codings, diagnoses and procedures.
//!
//! Responsibilities:
//! - Exact matching of a coding list against a reference code set for one terminology system
//! - Prefix-wildcard matching (`"I48"` matches `"I48.2"`) for category-level rules
//! - Reliability-qualified diagnosis filtering over many conditions
//!
//! Every predicate is total: absent codes, systems or concepts yield `false`/`None`.

use crate::collect_ids;
use crate::constants::{ICD, OPS, SNOMED};
use chrono::{DateTime, Utc};
use fhir::{CodeableConcept, Coding, ConditionRecord, ExtensionValue, ProcedureRecord};
use std::collections::HashSet;

/// Code matching operations.
///
/// This is a zero-sized type used for namespacing code-matching operations.
/// All methods are associated functions.
pub struct CodeMatcher;

impl CodeMatcher {
    /// Code of the first coding whose system equals `system`.
    ///
    /// Returns `None` when no coding has the system, or when the first such coding has no
    /// code; later codings of the same system are not consulted.
    pub fn code_for_system<'a>(codings: &'a [Coding], system: &str) -> Option<&'a str> {
        codings
            .iter()
            .find(|c| c.has_system(system))
            .and_then(Coding::code)
    }

    /// Whether a code exists for `system` and is a member of `reference_codes`.
    pub fn code_in_set<C: AsRef<str>>(
        codings: &[Coding],
        reference_codes: &[C],
        system: &str,
    ) -> bool {
        Self::code_for_system(codings, system).is_some_and(|code| contains(reference_codes, code))
    }

    /// Whether some coding of `concept` has `system` and a code starting with any prefix.
    pub fn prefix_match<P: AsRef<str>>(
        concept: Option<&CodeableConcept>,
        system: &str,
        prefixes: &[P],
    ) -> bool {
        let Some(concept) = concept else {
            return false;
        };
        if prefixes.is_empty() {
            return false;
        }

        concept.codings.iter().any(|coding| {
            coding.has_system(system)
                && coding
                    .code()
                    .is_some_and(|code| prefixes.iter().any(|p| code.starts_with(p.as_ref())))
        })
    }

    /// Case ids of conditions coded with one of `codes` at the given diagnosis reliability.
    ///
    /// Per condition, codings are scanned in order; the first coding that matches
    /// `system`/`codes` and carries the reliability extension (`extension_url`) with a
    /// coding of `value_system`/`reliability` adds the case id and ends the scan. Matching
    /// codings without the qualifying extension are passed over.
    pub fn matching_case_ids_by_code_and_reliability<C: AsRef<str> + Sync>(
        conditions: &[ConditionRecord],
        codes: &[C],
        system: &str,
        extension_url: &str,
        value_system: &str,
        reliability: &str,
    ) -> HashSet<String> {
        if codes.is_empty() {
            return HashSet::new();
        }

        collect_ids(conditions, |condition| {
            let case_id = condition.case_id.as_deref()?;
            let concept = condition.code.as_ref()?;

            concept
                .codings
                .iter()
                .filter(|coding| matches_code(coding, codes, system))
                .find(|coding| {
                    has_reliability(coding, extension_url, value_system, reliability, case_id)
                })
                .map(|_| case_id.to_string())
        })
    }

    /// Code of the first coding, whatever its system.
    pub fn code_of_first_coding(codings: &[Coding]) -> Option<&str> {
        codings.first().and_then(Coding::code)
    }

    /// Whether any concept passes [`CodeMatcher::code_in_set`].
    pub fn is_code_in_codeable_concepts<C: AsRef<str>>(
        concepts: &[CodeableConcept],
        codes: &[C],
        system: &str,
    ) -> bool {
        concepts
            .iter()
            .any(|concept| Self::code_in_set(&concept.codings, codes, system))
    }

    /// Case ids of conditions with any coding of `system` whose code is in `codes`.
    pub fn case_ids_by_codes<C: AsRef<str> + Sync>(
        conditions: &[ConditionRecord],
        codes: &[C],
        system: &str,
    ) -> HashSet<String> {
        if codes.is_empty() {
            return HashSet::new();
        }
        collect_ids(conditions, |condition| {
            Self::is_code_in_condition(condition, codes, system)
                .then(|| condition.case_id.clone())
                .flatten()
        })
    }

    /// Patient ids of conditions with any coding of `system` whose code is in `codes`.
    pub fn patient_ids_by_codes<C: AsRef<str> + Sync>(
        conditions: &[ConditionRecord],
        codes: &[C],
        system: &str,
    ) -> HashSet<String> {
        if codes.is_empty() {
            return HashSet::new();
        }
        collect_ids(conditions, |condition| {
            Self::is_code_in_condition(condition, codes, system)
                .then(|| condition.patient_id.clone())
                .flatten()
        })
    }

    /// Conditions with any coding of `system` whose code is in `codes`, in input order.
    pub fn conditions_by_codes<'a, C: AsRef<str>>(
        conditions: &'a [ConditionRecord],
        codes: &[C],
        system: &str,
    ) -> Vec<&'a ConditionRecord> {
        conditions
            .iter()
            .filter(|condition| Self::is_code_in_condition(condition, codes, system))
            .collect()
    }

    /// Whether any coding of the diagnosis has `system` and a code in `codes`.
    pub fn is_code_in_condition<C: AsRef<str>>(
        condition: &ConditionRecord,
        codes: &[C],
        system: &str,
    ) -> bool {
        any_coding_matches(condition.code.as_ref(), codes, system)
    }

    /// Whether any coding of the procedure has `system` and a code in `codes`.
    pub fn is_code_in_procedure<C: AsRef<str>>(
        procedure: &ProcedureRecord,
        codes: &[C],
        system: &str,
    ) -> bool {
        any_coding_matches(procedure.code.as_ref(), codes, system)
    }

    /// Prefix-wildcard match of ICD-10-GM codes on a diagnosis.
    pub fn is_icd_code_in_condition_with_prefix<P: AsRef<str>>(
        condition: &ConditionRecord,
        prefixes: &[P],
    ) -> bool {
        Self::prefix_match(condition.code.as_ref(), ICD, prefixes)
    }

    /// Prefix-wildcard match of OPS codes on a procedure.
    pub fn is_ops_code_in_procedure_with_prefix<P: AsRef<str>>(
        procedure: &ProcedureRecord,
        prefixes: &[P],
    ) -> bool {
        Self::prefix_match(procedure.code.as_ref(), OPS, prefixes)
    }

    /// Conditions recorded strictly after `date`; conditions without a recorded date are dropped.
    pub fn conditions_recorded_after(
        conditions: &[ConditionRecord],
        date: DateTime<Utc>,
    ) -> Vec<&ConditionRecord> {
        conditions
            .iter()
            .filter(|c| c.recorded_date.is_some_and(|recorded| recorded > date))
            .collect()
    }

    /// Whether the procedure code is in `codes`.
    ///
    /// The code of `preferred_system` (SNOMED CT when `None` and `force_system_check` is not
    /// set) is checked first; on a miss the code of the first coding is checked regardless of
    /// its system, since some providers code procedures in OPS instead. With
    /// `force_system_check` and no preferred system the procedure never matches.
    pub fn procedure_code_in_value_set<C: AsRef<str>>(
        procedure: &ProcedureRecord,
        codes: &[C],
        preferred_system: Option<&str>,
        force_system_check: bool,
    ) -> bool {
        let preferred_system = match preferred_system {
            Some(system) => system,
            None if !force_system_check => SNOMED,
            None => return false,
        };
        let Some(concept) = procedure.code.as_ref().filter(|c| !c.codings.is_empty()) else {
            return false;
        };

        Self::code_for_system(&concept.codings, preferred_system)
            .is_some_and(|code| contains(codes, code))
            || Self::code_of_first_coding(&concept.codings).is_some_and(|code| contains(codes, code))
    }
}

fn contains<C: AsRef<str>>(codes: &[C], code: &str) -> bool {
    codes.iter().any(|c| c.as_ref() == code)
}

fn matches_code<C: AsRef<str>>(coding: &Coding, codes: &[C], system: &str) -> bool {
    coding.has_system(system) && coding.code().is_some_and(|code| contains(codes, code))
}

fn any_coding_matches<C: AsRef<str>>(
    concept: Option<&CodeableConcept>,
    codes: &[C],
    system: &str,
) -> bool {
    concept.is_some_and(|c| c.codings.iter().any(|coding| matches_code(coding, codes, system)))
}

fn has_reliability(
    coding: &Coding,
    extension_url: &str,
    value_system: &str,
    reliability: &str,
    case_id: &str,
) -> bool {
    let Some(extension) = coding.extension_by_url(extension_url) else {
        return false;
    };
    match &extension.value {
        Some(ExtensionValue::Coding(value)) => {
            value.has_system(value_system) && value.code() == Some(reliability)
        }
        other => {
            tracing::warn!(
                case_id,
                extension_url,
                value_type = other.as_ref().map_or("none", ExtensionValue::type_name),
                "reliability extension value is not a Coding"
            );
            false
        }
    }
}
