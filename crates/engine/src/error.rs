//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when an input is rejected before reaching the store.
//! - [`InvalidState`] thrown when an operation is not allowed in the current
//!   state (e.g. accepting an invitation that is no longer pending).
//! - [`RemoteUnavailable`] thrown when the store fails (network, permission).
//! - [`NotFound`] thrown when the store reports a missing id.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`InvalidState`]: EngineError::InvalidState
//!  [`RemoteUnavailable`]: EngineError::RemoteUnavailable
//!  [`NotFound`]: EngineError::NotFound
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(what) => Self::NotFound(what),
            other => Self::RemoteUnavailable(other.to_string()),
        }
    }
}
