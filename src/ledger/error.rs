use rust_decimal::Decimal;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Coarse classification callers map onto their own responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Decimal, available: Decimal },

    #[error("conflicting ledger update: {0}")]
    Conflict(String),

    #[error("ledger invariant violated: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Database(sqlx::Error),
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::BadRequest(_) | Self::InsufficientFunds { .. } => ErrorKind::BadRequest,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Internal(_) | Self::Database(_) => ErrorKind::Internal,
        }
    }
}

// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
fn is_lock_contention(code: &str) -> bool {
    code.parse::<i64>()
        .map(|c| matches!(c & 0xff, 5 | 6))
        .unwrap_or(false)
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref().is_some_and(is_lock_contention) {
                return Self::Conflict(db.message().to_string());
            }
        }
        Self::Database(err)
    }
}
