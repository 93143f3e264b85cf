//! Error type shared by the store, the normalizer and the orchestrator.
//!
//! Every variant renders a message that is safe to hand back to a caller
//! verbatim; the HTTP layer maps variants onto status codes.

use std::fmt::Display;

use thiserror::Error;
use uuid::Uuid;

use crate::types::ScanStatus;

#[derive(Error, Debug)]
pub enum ConsoleError {
    /// The request was rejected before any scan record was created.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("scan engine unreachable: {0}")]
    EngineUnreachable(String),

    /// The engine answered with an explicit error or a `failed` status.
    #[error("{0}")]
    EngineReportedFailure(String),

    #[error("unrecognised engine response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    NotFound(String),

    #[error("no results found for this scan")]
    NoResults(Uuid),

    #[error("scan {0} already exists")]
    DuplicateKey(Uuid),

    #[error("scan {id} is already {status}")]
    TerminalState { id: Uuid, status: ScanStatus },

    #[error("scan aborted unexpectedly")]
    Aborted,
}

impl ConsoleError {
    pub fn scan_not_found(id: impl Display) -> Self {
        ConsoleError::NotFound(format!("scan not found: {id}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ConsoleError::NotFound(_) | ConsoleError::NoResults(_))
    }
}

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;
