//! # KDS Core
//!
//! Clinical rule helpers over the records produced by the `fhir` crate.
//!
//! This crate holds the pure decision logic of the KDS/MII rule set:
//! - Code matching against ICD-10-GM, OPS and SNOMED codings, including the diagnosis
//!   reliability extension
//! - Identifier resolution for patients and cases
//! - Broad-consent evaluation over provision trees and form versions
//! - Encounter classification (contact level, ICU stays, discharge on death)
//! - Location predicates and the ICU dummy location
//!
//! **No I/O concerns**: records are loaded and linked by the caller; every function here is
//! a read of the records it is given, except the explicit flagging operation on encounters.

pub mod coding;
pub mod config;
pub mod consent;
pub mod constants;
pub mod encounter;
pub mod error;
pub mod identifiers;
pub mod location;

pub use coding::CodeMatcher;
pub use config::{
    identifier_systems_from_env_values, CoreConfig, IdentifierDomain, IdentifierSystems,
};
pub use consent::{ConsentCategory, ConsentEvaluator, ConsentFormVersion, ConsentPolicyCode};
pub use encounter::{ContactLevelMatch, EncounterContactClassifier};
pub use error::{CoreError, CoreResult};
pub use identifiers::{identifier_values, IdentifierKind, IdentifierResolver};
pub use location::{
    dummy_icu_ward_location, is_dummy_icu_location, is_icu_location, is_ward_location,
};

use std::collections::HashSet;

/// Collect the distinct ids `extract` yields over `items`.
#[cfg(feature = "parallel")]
pub(crate) fn collect_ids<T, F>(items: &[T], extract: F) -> HashSet<String>
where
    T: Sync,
    F: Fn(&T) -> Option<String> + Sync + Send,
{
    use rayon::prelude::*;

    items.par_iter().filter_map(extract).collect()
}

/// Collect the distinct ids `extract` yields over `items`.
#[cfg(not(feature = "parallel"))]
pub(crate) fn collect_ids<T, F>(items: &[T], extract: F) -> HashSet<String>
where
    F: Fn(&T) -> Option<String>,
{
    items.iter().filter_map(extract).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_ids_deduplicates_and_skips_none() {
        let items = ["a", "b", "", "a"];
        let ids = collect_ids(&items, |s| (!s.is_empty()).then(|| s.to_uppercase()));
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("A"));
        assert!(ids.contains("B"));
    }
}
