//! Session Result Cache
//!
//! Keeps the latest prediction of each UI session so re-renders never re-run
//! inference. A failed submission keeps the last good result.

mod cache;
mod store;

pub use cache::{SessionResult, SessionResultCache, SessionState};
pub use store::{SessionId, SessionStore, SubmissionGuard};

use thiserror::Error;

/// Session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session {0} not found")]
    NotFound(SessionId),
    #[error("Session {0} already has a prediction in progress")]
    Busy(SessionId),
    #[error("Session {0} has no prediction yet")]
    NoResult(SessionId),
    #[error("Session limit of {0} reached with every session computing")]
    Full(usize),
    #[error("Session store lock poisoned: {0}")]
    Lock(String),
}
