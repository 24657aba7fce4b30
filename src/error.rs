// ❗ Error types shared by every fleet-journal operation

use thiserror::Error;

/// Errors surfaced by the library.
///
/// Binaries wrap these in `anyhow`, the HTTP layer maps them to status codes.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A unique field (license plate, call sign, VIN, username...) is already taken
    #[error("{field} '{value}' already exists")]
    Conflict { field: &'static str, value: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid username or password")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FleetError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        FleetError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FleetError::NotFound { .. })
    }
}

impl From<csv::Error> for FleetError {
    fn from(e: csv::Error) -> Self {
        FleetError::Report(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;

/// True when a rusqlite error is a UNIQUE/CHECK/FK constraint violation
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
