//! Location predicates and the synthetic ICU ward.
//!
//! Some providers flag ICU stays without a real ICU location resource. Such stays reference
//! [`ICU_DUMMY_REF`], which resolves to a shared stand-in ward typed as intensive care.

use crate::constants::{
    ICU, ICU_DUMMY_ID, ICU_DUMMY_REF, LOCATION_PHYSICAL_TYPE_SYSTEM, ROLE_CODE_SYSTEM, WARD,
};
use fhir::{CodeableConcept, Coding, LocationRecord, Reference};
use std::sync::LazyLock;

static DUMMY_ICU: LazyLock<LocationRecord> = LazyLock::new(|| {
    LocationRecord::new(ICU_DUMMY_ID)
        .with_physical_type(CodeableConcept::from_coding(
            Coding::new(LOCATION_PHYSICAL_TYPE_SYSTEM, WARD).with_display("Ward"),
        ))
        .with_type(CodeableConcept::from_coding(
            Coding::new(ROLE_CODE_SYSTEM, ICU).with_display("Intensive care unit"),
        ))
});

/// The stand-in ICU ward used when no real ICU location exists.
pub fn dummy_icu_ward_location() -> &'static LocationRecord {
    &DUMMY_ICU
}

/// Whether `reference` points at the stand-in ICU ward.
pub fn is_dummy_icu_location(reference: &Reference) -> bool {
    reference.reference.as_deref() == Some(ICU_DUMMY_REF)
}

/// Whether the location is typed as an intensive care unit.
pub fn is_icu_location(location: &LocationRecord) -> bool {
    location.has_type_code(ICU)
}

/// Whether the location's physical type is a ward.
pub fn is_ward_location(location: &LocationRecord) -> bool {
    location.has_physical_type_code(WARD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_is_an_icu_ward() {
        let dummy = dummy_icu_ward_location();
        assert_eq!(dummy.id, ICU_DUMMY_ID);
        assert!(is_icu_location(dummy));
        assert!(is_ward_location(dummy));
        assert!(std::ptr::eq(dummy, dummy_icu_ward_location()));
    }

    #[test]
    fn dummy_reference_is_recognised() {
        assert!(is_dummy_icu_location(&Reference::to("Location", ICU_DUMMY_ID)));
        assert!(!is_dummy_icu_location(&Reference::to("Location", "ICU-1")));
        assert!(!is_dummy_icu_location(&Reference::default()));
    }

    #[test]
    fn room_is_not_a_ward() {
        let room = LocationRecord::new("L-1").with_physical_type(CodeableConcept::from_coding(
            Coding::new(LOCATION_PHYSICAL_TYPE_SYSTEM, "ro"),
        ));
        assert!(!is_ward_location(&room));
        assert!(!is_icu_location(&room));
    }
}
