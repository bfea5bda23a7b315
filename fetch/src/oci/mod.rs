//! OCI plugin image fetching.
//!
//! Pulls a Kong plugin image from an OCI registry entirely into memory and
//! turns its single layer into a validated plugin file set.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Plugin fetch pipeline                    │
//! │                                                              │
//! │  image URL                                                   │
//! │   └── reference     (registry, repository, tag/digest)      │
//! │        └── registry (authenticated client, no I/O yet)      │
//! │             └── copy     (index → manifests → blobs)        │
//! │                  └── layers   (select one, extract tar.gz)  │
//! │                       └── classify (handler.lua, schema.lua)│
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod classify;
pub mod copy;
pub mod credentials;
pub mod error;
pub mod layers;
pub mod media;
mod pull;
pub mod reference;
pub mod registry;
pub mod store;

pub use classify::classify;
pub use copy::{copy_graph, ClassifiedLayer, CopiedGraph};
pub use credentials::{
    Credential, CredentialFile, CredentialFileError, CredentialStore, EnvCredentials,
    StaticCredentials,
};
pub use error::CopyError;
pub use layers::{select_layer, LayerExtractor};
pub use pull::{fetch, PluginFetcher};
pub use reference::{Identifier, ImageReference};
pub use registry::{build_client, OciConnector, OciRegistry, Registry, RegistryConnector};
pub use store::{Descriptor, MemoryStore};
