//! Simulator error taxonomy
//!
//! Transport and session failures are recoverable (the reconnection
//! controller owns them); domain failures are returned as typed negative
//! results by the station; fatal errors propagate out of `start()` and mark
//! the station stopped.

use thiserror::Error;

use crate::shared::frame::DecodeError;

/// Errors raised by the OCPP session engine (socket + request correlation).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("socket is not open")]
    Offline,

    #[error("response timeout")]
    Timeout,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("response channel closed")]
    ChannelClosed,

    #[error("CALLERROR {code}: {description}")]
    CallError {
        code: String,
        description: String,
        details: serde_json::Value,
    },

    #[error("payload failed schema validation: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fatal simulator-level failures.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("station {0} not found")]
    UnknownStation(String),

    #[error("station {0} is already running")]
    AlreadyRunning(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}
