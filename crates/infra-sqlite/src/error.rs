// sqlx -> AppError mapping

use queueserver_core::error::AppError;

// Helper to convert sqlx::Error to AppError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                Some("5") => AppError::Persistence(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                Some("13") => {
                    AppError::Persistence(format!("Database full: {}", db_err.message()))
                }
                Some(code) => AppError::Persistence(format!(
                    "Database error [{}]: {}",
                    code,
                    db_err.message()
                )),
                None => AppError::Persistence(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::RowNotFound => AppError::Persistence("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Persistence(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Persistence(err.to_string()),
    }
}
