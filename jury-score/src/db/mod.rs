//! Database access for jury-score
//!
//! Thin query functions over the shared schema created by `jury_common::db::init`.

pub mod candidates;
pub mod categories;
pub mod membership;
pub mod scores;
pub mod users;

use jury_common::Error;

/// Turn a UNIQUE constraint failure into `DuplicateEntity`; other errors pass through.
///
/// The pre-insert existence checks cover the common case; this covers the race where two
/// requests register the same key concurrently.
pub(crate) fn map_unique_violation(err: sqlx::Error, message: impl FnOnce() -> String) -> Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::DuplicateEntity(message())
        }
        _ => Error::Database(err),
    }
}

/// `true` when a write failed because a referenced row no longer exists
pub(crate) fn is_foreign_key_violation(err: &Error) -> bool {
    matches!(
        err,
        Error::Database(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation()
    )
}
