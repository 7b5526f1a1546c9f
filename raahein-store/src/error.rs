use raahein_core::CoreError;
use tracing::error;

/// SQLSTATE codes that mean "another transaction got there first".
const RETRYABLE_CODES: &[&str] = &[
    "40P01", // deadlock_detected
    "40001", // serialization_failure
    "55P03", // lock_not_available (lock_timeout)
];

/// Translate a sqlx failure into the core taxonomy.
pub fn db_err(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(code) = db.code() {
            if RETRYABLE_CODES.contains(&code.as_ref()) {
                return CoreError::Conflict(format!(
                    "Concurrent update, try again ({code})"
                ));
            }
        }
    }
    error!("Database error: {}", err);
    CoreError::Storage(err.to_string())
}

/// A persisted value the domain types cannot represent.
pub(crate) fn corrupt(what: &str, err: CoreError) -> CoreError {
    error!("Corrupt {} row: {}", what, err);
    CoreError::Storage(format!("corrupt {what} row: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_storage() {
        assert!(matches!(db_err(sqlx::Error::RowNotFound), CoreError::Storage(_)));
        assert!(matches!(db_err(sqlx::Error::PoolTimedOut), CoreError::Storage(_)));
    }
}
