//! DbErr classification for administrative operations.

use std::io::ErrorKind;

use sea_orm::{DbErr, RuntimeErr};

use crate::error::FailureReason;

const SQLSTATE_DUPLICATE_DATABASE: &str = "42P04";
const SQLSTATE_INVALID_PASSWORD: &str = "28P01";
const SQLSTATE_INVALID_AUTHORIZATION: &str = "28000";
const SQLSTATE_INSUFFICIENT_PRIVILEGE: &str = "42501";
const SQLSTATE_CANNOT_CONNECT_NOW: &str = "57P03";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorClass {
    DuplicateDatabase,
    ConnectionRefused,
    AuthFailure,
    PermissionDenied,
    Other,
}

impl DbErrorClass {
    /// Failure reason for every class except a duplicate, which is not a
    /// failure for the creator.
    pub fn into_reason(self, err: &DbErr) -> FailureReason {
        match self {
            DbErrorClass::ConnectionRefused => FailureReason::ConnectionRefused,
            DbErrorClass::AuthFailure => FailureReason::AuthFailure,
            DbErrorClass::PermissionDenied => FailureReason::PermissionDenied,
            DbErrorClass::DuplicateDatabase | DbErrorClass::Other => {
                FailureReason::Backend(err.to_string())
            }
        }
    }
}

fn mentions_sqlstate(msg: &str, code: &str) -> bool {
    msg.contains(&format!("SQLSTATE({code})"))
}

fn sqlx_error(err: &DbErr) -> Option<&sqlx::Error> {
    match err {
        DbErr::Conn(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e)) => Some(e),
        _ => None,
    }
}

fn classify_sqlstate(code: &str) -> Option<DbErrorClass> {
    match code {
        SQLSTATE_DUPLICATE_DATABASE => Some(DbErrorClass::DuplicateDatabase),
        SQLSTATE_INVALID_PASSWORD | SQLSTATE_INVALID_AUTHORIZATION => {
            Some(DbErrorClass::AuthFailure)
        }
        SQLSTATE_INSUFFICIENT_PRIVILEGE => Some(DbErrorClass::PermissionDenied),
        SQLSTATE_CANNOT_CONNECT_NOW => Some(DbErrorClass::ConnectionRefused),
        _ => None,
    }
}

/// Classify a backend error. Structured sqlx detail wins; message text is
/// the fallback.
pub fn classify_db_err(err: &DbErr) -> DbErrorClass {
    if let DbErr::ConnectionAcquire(_) = err {
        return DbErrorClass::ConnectionRefused;
    }

    if let Some(sqlx_err) = sqlx_error(err) {
        match sqlx_err {
            sqlx::Error::Database(db_err) => {
                if let Some(class) = db_err.code().as_deref().and_then(classify_sqlstate) {
                    return class;
                }
            }
            sqlx::Error::Io(io_err) => {
                return match io_err.kind() {
                    ErrorKind::PermissionDenied => DbErrorClass::PermissionDenied,
                    _ => DbErrorClass::ConnectionRefused,
                };
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                return DbErrorClass::ConnectionRefused;
            }
            _ => {}
        }
    }

    classify_message(&err.to_string())
}

fn classify_message(msg: &str) -> DbErrorClass {
    let lower = msg.to_lowercase();

    if mentions_sqlstate(msg, SQLSTATE_DUPLICATE_DATABASE)
        || (lower.contains("database") && lower.contains("already exists"))
    {
        return DbErrorClass::DuplicateDatabase;
    }

    if mentions_sqlstate(msg, SQLSTATE_INVALID_PASSWORD)
        || mentions_sqlstate(msg, SQLSTATE_INVALID_AUTHORIZATION)
        || lower.contains("password authentication failed")
        || (lower.contains("role \"") && lower.contains("does not exist"))
    {
        return DbErrorClass::AuthFailure;
    }

    if mentions_sqlstate(msg, SQLSTATE_INSUFFICIENT_PRIVILEGE)
        || lower.contains("permission denied")
    {
        return DbErrorClass::PermissionDenied;
    }

    if lower.contains("connection refused")
        || lower.contains("could not connect")
        || lower.contains("timed out")
    {
        return DbErrorClass::ConnectionRefused;
    }

    DbErrorClass::Other
}
