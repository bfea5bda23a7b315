//! Kong plugin image fetching.
//!
//! Resolves an OCI image reference, copies the image graph into memory and
//! returns the plugin's `handler.lua` and `schema.lua`.

pub mod oci;

// Re-export common types
pub use oci::{fetch, PluginFetcher};
pub use oci::{build_client, OciConnector, Registry, RegistryConnector};
pub use oci::{Credential, CredentialFile, CredentialStore, EnvCredentials, StaticCredentials};
pub use oci::{ClassifiedLayer, CopyError, Descriptor, ImageReference, LayerExtractor, MemoryStore};
pub use plugin_image_core::{FetchConfig, FetchError, PluginFiles, Result};

/// Plugin image fetch version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
