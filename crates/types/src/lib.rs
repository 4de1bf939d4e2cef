//! Validated primitive values shared by the KDS crates.
//!
//! Clinical records arrive from an upstream loader with many optional elements. The few
//! values that must be present (patient ids, identifier systems, field values checked
//! during conversion) are carried as [`NonEmptyText`] once validated.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace.
    #[error("text cannot be empty")]
    Empty,

    /// A required value was absent or blank; carries the name of the value.
    #[error("required value '{0}' is missing or blank")]
    Missing(&'static str),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Validates a required value, naming it in the error when it is absent or blank.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the value, reported back in [`TextError::Missing`].
    /// * `input` - The candidate value, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Missing`] if `input` is `None` or blank.
    pub fn required(name: &'static str, input: Option<&str>) -> Result<Self, TextError> {
        input
            .and_then(|value| Self::new(value).ok())
            .ok_or(TextError::Missing(name))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NonEmptyText {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NonEmptyText {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
