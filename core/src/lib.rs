//! Plugin Image Core - Foundational Types
//!
//! Error taxonomy, configuration and the plugin payload shared by the
//! fetch pipeline and its callers.

pub mod config;
pub mod error;
pub mod plugin;

// Re-export commonly used types
pub use config::{ConfigError, FetchConfig, RegistryProtocol, DEFAULT_SIZE_LIMIT, USER_AGENT};
pub use error::{BoxedCause, FetchError, Result};
pub use plugin::{PluginFiles, HANDLER_FILE, REQUIRED_FILES, SCHEMA_FILE};

/// Plugin image core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
