use kds_types::TextError;

/// Errors returned by the KDS core crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid text: {0}")]
    Text(#[from] TextError),

    #[error("relation error: {0}")]
    Relation(#[from] fhir::RelationError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
