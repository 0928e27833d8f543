//! Pieces shared by the SQLite-backed repositories: the error type, the
//! configured access level and the mapping from `sqlx` errors.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Authorization or policy rejection. Needs operator action, not a retry.
    #[error("persistence denied: {0}")]
    PersistenceDenied(String),
    #[error("persistence error: {0}")]
    PersistenceError(String),
    #[error("record `{0}` not found")]
    NotFound(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if is_denied(&err) {
            RepositoryError::PersistenceDenied(err.to_string())
        } else {
            RepositoryError::PersistenceError(err.to_string())
        }
    }
}

/// SQLite primary result codes that mean "you may not do this" rather than
/// "something broke": SQLITE_PERM (3), SQLITE_READONLY (8), SQLITE_AUTH (23).
const DENIED_CODES: [i32; 3] = [3, 8, 23];

fn is_denied(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    let by_code = db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| DENIED_CODES.contains(&(code & 0xff)))
        .unwrap_or(false);
    let message = db_err.message().to_ascii_lowercase();
    by_code
        || message.contains("readonly")
        || message.contains("not authorized")
        || message.contains("permission denied")
}

/// Privilege the repositories and the object store run with.
///
/// Always set explicitly in configuration; a missing privileged credential is
/// never silently downgraded to public access.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Full read/write access.
    Service,
    /// Read-only access; every mutation is rejected before reaching storage.
    Public,
}

impl AccessLevel {
    pub fn ensure_writable(&self, action: &str) -> RepositoryResult<()> {
        match self {
            AccessLevel::Service => Ok(()),
            AccessLevel::Public => Err(RepositoryError::PersistenceDenied(format!(
                "{} requires the service access level",
                action
            ))),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessLevel::Service => "service",
            AccessLevel::Public => "public",
        })
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" => Ok(AccessLevel::Service),
            "public" => Ok(AccessLevel::Public),
            other => Err(format!(
                "unknown access level `{}` (expected `service` or `public`)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_level_rejects_writes() {
        assert!(AccessLevel::Service.ensure_writable("insert").is_ok());
        assert!(matches!(
            AccessLevel::Public.ensure_writable("insert"),
            Err(RepositoryError::PersistenceDenied(msg)) if msg.contains("insert")
        ));
    }

    #[test]
    fn parses_access_level() {
        assert_eq!(" Service ".parse::<AccessLevel>(), Ok(AccessLevel::Service));
        assert_eq!("public".parse::<AccessLevel>(), Ok(AccessLevel::Public));
        assert!("anon".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn non_database_errors_are_generic_failures() {
        assert!(matches!(
            RepositoryError::from(sqlx::Error::PoolTimedOut),
            RepositoryError::PersistenceError(_)
        ));
    }
}
