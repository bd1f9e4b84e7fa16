//! Common error types for jury scoring

use thiserror::Error;

/// Common result type for jury scoring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the aggregation core and the HTTP layer.
///
/// Caller-input and authorization errors are never retried; they are mapped to a
/// structured response with a stable [`Error::kind`].
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Note outside `[0, criterion.max]` (or not a finite number)
    #[error("Invalid score: note {note} is outside [0, {max}]")]
    InvalidScore { note: f64, max: i64 },

    /// Criterion does not belong to the category named in the request
    #[error("Criterion {criterion_id} belongs to category {expected}, not {actual}")]
    CriterionCategoryMismatch {
        criterion_id: i64,
        expected: i64,
        actual: i64,
    },

    /// Identity is known but not allowed to perform the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Missing, malformed or expired credential
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Unknown candidate / juror / category / criterion / link
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique key already taken (email, category name, membership link)
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    /// Final score requested before any jury total exists
    #[error("No jury data for candidate {candidate_id} in category {category_id}")]
    NoJuryData { candidate_id: i64, category_id: i64 },

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "DATABASE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::InvalidScore { .. } => "INVALID_SCORE",
            Error::CriterionCategoryMismatch { .. } => "CRITERION_CATEGORY_MISMATCH",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::Unauthenticated(_) => "UNAUTHENTICATED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::DuplicateEntity(_) => "DUPLICATE_ENTITY",
            Error::NoJuryData { .. } => "NO_JURY_DATA",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for errors caused by the caller's input or identity (never retried)
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_)
        )
    }
}
