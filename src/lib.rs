//! # Texnouz OCPP Station Simulator
//!
//! Simulates fleets of OCPP 1.6J / 2.0.1 charging stations against a CSMS:
//! persistent WebSocket sessions, the full boot/heartbeat/transaction state
//! machine, synthetic meter values and traffic, and a control-plane endpoint
//! to drive it all.
//!
//! ## Architecture
//!
//! - **shared**: framing, errors, shutdown coordination
//! - **ocpp**: protocol primitives (versions, actions, error codes, payload
//!   validation)
//! - **template**: station prototypes, content hashing, process-wide cache
//! - **vars**: 2.0.1 variable manager and 1.6 configuration keys
//! - **auth**: unified identifiers and the authorization strategy chain
//! - **session**: per-station WebSocket client with request correlation,
//!   offline queueing and reconnection
//! - **station**: the station actor (boot, connectors, transactions, meter
//!   sampler, server-command handlers)
//! - **atg**: automatic transaction generator
//! - **registry**: supervisor owning the fleet + event bus
//! - **ui**: control-plane WebSocket/HTTP servers
//! - **persistence**: per-station configuration files

pub mod atg;
pub mod auth;
pub mod config;
pub mod ocpp;
pub mod persistence;
pub mod registry;
pub mod session;
pub mod shared;
pub mod station;
pub mod template;
pub mod ui;
pub mod vars;

// Re-export commonly used types at crate root
pub use config::{SimulatorConfig, UiTransport};
pub use registry::{create_event_bus, SharedEventBus, SimulatorEvent, StationRegistry};
pub use shared::{ShutdownCoordinator, ShutdownSignal, SimulatorError};
pub use station::{ChargingStation, StationHandle};
