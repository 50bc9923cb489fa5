//! Station templates: types, hashing, cache and loader.

pub mod cache;
pub mod hash;
pub mod loader;
pub mod types;

pub use cache::TemplateCache;
pub use loader::{JsonTemplateLoader, LoadedTemplate, TemplateLoader};
pub use types::{
    AtgTemplate, EvseTemplate, FirmwareUpgradeTemplate, IdTagDistribution, ReconnectTemplate,
    StationTemplate,
};
