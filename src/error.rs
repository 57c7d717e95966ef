use thiserror::Error;

/// Failures raised by a store driver.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Lock timeout, deadlock or serialization failure. Safe to retry.
    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("check constraint violated: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

// Postgres SQLSTATE codes
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());

        match code.as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(LOCK_NOT_AVAILABLE) => {
                StoreError::Conflict(err.to_string())
            }
            Some(UNIQUE_VIOLATION) => StoreError::UniqueViolation(err.to_string()),
            Some(CHECK_VIOLATION) => StoreError::Constraint(err.to_string()),
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome kinds surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("event not found")]
    NotFound,

    #[error("caller lacks the required role or does not own the event")]
    Unauthorized,

    #[error("event start time must be in the future")]
    InvalidSchedule,

    #[error("invalid seat count: {0}")]
    InvalidSeatCount(i32),

    #[error("event has already started, registration is closed")]
    EventClosed,

    #[error("event is already completed")]
    EventAlreadyCompleted,

    #[error("not enough seats available: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("already registered for this event")]
    DuplicateRegistration,

    #[error("not registered for this event")]
    NotRegistered,

    #[error("transient store conflict, retry the operation: {0}")]
    TransientStoreConflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl EngineError {
    /// Only lock contention is worth retrying; every other kind is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::TransientStoreConflict(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => EngineError::TransientStoreConflict(msg),
            // the only unique key the engine writes through is (user_id, event_id)
            StoreError::UniqueViolation(_) => EngineError::DuplicateRegistration,
            other => EngineError::Store(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
