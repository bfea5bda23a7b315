//! Registry credential stores.
//!
//! A [`CredentialStore`] is a capability handed to the fetch pipeline by its
//! caller: given a registry host, it yields the credential to use, or `None`
//! for an anonymous pull.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Basic-auth credential for one registry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of registry credentials, queried by host.
pub trait CredentialStore: Send + Sync {
    /// Credential for `host`, or `None` to pull anonymously.
    fn credential_for(&self, host: &str) -> Option<Credential>;
}

/// In-memory credentials keyed by registry host.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    registries: HashMap<String, Credential>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the credential for a registry.
    pub fn insert(&mut self, registry: &str, credential: Credential) {
        self.registries.insert(normalize_registry(registry), credential);
    }

    /// Builder-style [`StaticCredentials::insert`].
    pub fn with(mut self, registry: &str, credential: Credential) -> Self {
        self.insert(registry, credential);
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn credential_for(&self, host: &str) -> Option<Credential> {
        self.registries.get(&normalize_registry(host)).cloned()
    }
}

/// Credentials from `REGISTRY_USERNAME` / `REGISTRY_PASSWORD`, used for every host.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    credential: Option<Credential>,
}

impl EnvCredentials {
    /// Read the environment once. Both variables must be set.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();
        Self::from_parts(username, password)
    }

    fn from_parts(username: Option<String>, password: Option<String>) -> Self {
        let credential = match (username, password) {
            (Some(u), Some(p)) => Some(Credential::basic(u, p)),
            _ => None,
        };
        Self { credential }
    }

    /// Whether both variables were present.
    pub fn is_set(&self) -> bool {
        self.credential.is_some()
    }
}

impl CredentialStore for EnvCredentials {
    fn credential_for(&self, _host: &str) -> Option<Credential> {
        self.credential.clone()
    }
}

/// Per-registry credential entry.
#[derive(Debug, Clone, Deserialize)]
struct CredentialEntry {
    username: String,
    password: String,
}

/// Credential file format.
#[derive(Debug, Default, Deserialize)]
struct CredentialFileData {
    #[serde(default)]
    registries: HashMap<String, CredentialEntry>,
}

/// Read-only credentials loaded from a JSON file.
///
/// Format: `{"registries": {"ghcr.io": {"username": "u", "password": "p"}}}`
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
    credentials: StaticCredentials,
}

/// Credential file loading error.
#[derive(Debug, thiserror::Error)]
pub enum CredentialFileError {
    #[error("failed to read credential file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse credential file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CredentialFile {
    /// Load a credential file. A missing file yields an empty store.
    pub fn load(path: &Path) -> std::result::Result<Self, CredentialFileError> {
        let data = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| CredentialFileError::Read {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&raw).map_err(|source| CredentialFileError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            CredentialFileData::default()
        };

        let mut credentials = StaticCredentials::new();
        for (registry, entry) in data.registries {
            credentials.insert(&registry, Credential::basic(entry.username, entry.password));
        }

        tracing::debug!(
            path = %path.display(),
            registries = credentials.registries.len(),
            "Loaded credential file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            credentials,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List all registries with stored credentials.
    pub fn list_registries(&self) -> Vec<String> {
        let mut registries: Vec<String> = self.credentials.registries.keys().cloned().collect();
        registries.sort();
        registries
    }
}

impl CredentialStore for CredentialFile {
    fn credential_for(&self, host: &str) -> Option<Credential> {
        self.credentials.credential_for(host)
    }
}

/// Normalize registry names (e.g., "docker.io" and "index.docker.io" → "index.docker.io").
pub(crate) fn normalize_registry(registry: &str) -> String {
    let r = registry.trim().to_lowercase();
    if r == "docker.io" || r == "registry-1.docker.io" {
        "index.docker.io".to_string()
    } else {
        r
    }
}
