use std::{io, time::Duration};

use serde::{Deserialize, Serialize};

use crate::rules::MoveRequest;

/// A serialized position could not be turned back into a playable one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("invalid position {fen:?}: {reason}")]
    InvalidPosition { fen: String, reason: String },
}

/// The rules engine refused to play a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("move {request} is not legal in the current position")]
pub struct MoveRejected {
    pub request: MoveRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("ply index {index} is out of range for a history of {len} plies")]
    OutOfRange { index: usize, len: usize },
}

/// Failures talking to the analysis engine.
///
/// Every one of these is fatal for the engine session: there is no reconnect.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("could not start the analysis engine: {0}")]
    Spawn(#[source] io::Error),

    #[error("i/o error talking to the analysis engine: {0}")]
    Io(#[from] io::Error),

    #[error("the analysis engine process has no {0} pipe")]
    MissingPipe(&'static str),

    #[error("the analysis engine disconnected")]
    Disconnected,

    #[error("the engine session has already been terminated")]
    Terminated,

    /// An outstanding search got no answer in time.
    #[error("the analysis engine did not answer within {0:?}")]
    Unresponsive(Duration),
}

/// Errors surfaced by the advisory chat.
///
/// Backend failures are only reported through logs; once every backend has failed
/// the caller receives the fallback reply instead of an error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AdvisoryError {
    /// Another advisory request from this session is still in flight.
    #[error("an advisory request is already in flight")]
    Busy,

    /// The user did not type anything.
    #[error("the advisory request has no text")]
    EmptyPrompt,

    /// One backend failed to produce an answer.
    #[error("advisory backend {backend} failed: {message}")]
    Backend { backend: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read the configuration: {0}")]
    Io(#[from] io::Error),

    #[error("could not parse the configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The only error a session command lets escape.
///
/// Illegal moves and out-of-range navigation are ordinary outcomes reported in the
/// returned view; losing the analysis engine is not recoverable.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("analysis engine unavailable: {0}")]
    EngineUnavailable(#[from] EngineError),
}

pub type MatchResult<T> = Result<T, MatchError>;
