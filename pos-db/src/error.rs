use pos_core::AppError;

#[derive(Debug)]
pub enum DbError {
    NotFound(String),
    Conflict(String),
    Database(sqlx::Error),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::NotFound(m) => write!(f, "not found: {m}"),
            DbError::Conflict(m) => write!(f, "conflict: {m}"),
            DbError::Database(e) => write!(f, "database error: {e}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => DbError::NotFound("row not found".into()),
            other => DbError::Database(other),
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(m) => AppError::not_found(m),
            DbError::Conflict(m) => AppError::conflict(m),
            DbError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}
