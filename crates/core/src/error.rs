/// Domain errors raised by the decision engine.
///
/// Invariant checks do not use this type; they collect every violation into
/// a [`crate::invariants::ValidationResult`] instead.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
