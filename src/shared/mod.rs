pub mod errors;
pub mod frame;
pub mod shutdown;

pub use errors::{SessionError, SimulatorError};
pub use frame::{DecodeError, MessageType, OcppFrame};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
