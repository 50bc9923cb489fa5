//! Per-station configuration surface
//!
//! OCPP 2.0.1 stations expose a typed component/variable/attribute registry
//! ([`VariableManager`]); OCPP 1.6 stations expose an ordered configuration
//! key list ([`ConfigurationKeyStore`]).

pub mod attribute;
pub mod definition;
pub mod key_store;
pub mod manager;

pub use attribute::{
    AttributeDefinition, AttributeType, Mutability, VariableConstraints, VariableDataType,
    VariableDefinition,
};
pub use key_store::{ChangeKeyOutcome, ConfigurationKey, ConfigurationKeyStore};
pub use manager::{PersistedVariableAttribute, VariableManager};
