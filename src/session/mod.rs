//! OCPP session engine: socket lifecycle, request correlation, offline
//! queueing and reconnection.

pub mod client;
pub mod pending;
pub mod queue;

pub use client::{
    reconnect_delay, OcppSession, SendOutcome, SessionConfig, SessionEvent, SessionHandle,
};
pub use pending::PendingRequestMap;
pub use queue::{QueuedCall, SendQueue};
