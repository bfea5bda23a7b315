use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default ceiling for a single extracted file: 1 MiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 1024 * 1024;

/// Default ceiling for a manifest or index body: 4 MiB.
pub const DEFAULT_MAX_MANIFEST_SIZE: u64 = 4 * 1024 * 1024;

/// Default ceiling for a config or layer blob: 64 MiB.
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 64 * 1024 * 1024;

/// Default maximum index → manifest nesting depth.
pub const DEFAULT_MAX_GRAPH_DEPTH: usize = 4;

/// Identifies this pipeline to registries and in logs.
pub const USER_AGENT: &str = concat!("kong-plugin-image/", env!("CARGO_PKG_VERSION"));

/// Fetch pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of decompressed bytes read for any single archive entry
    pub size_limit: u64,

    /// Maximum size of a manifest or index body
    pub max_manifest_size: u64,

    /// Maximum size of a config or layer blob
    pub max_blob_size: u64,

    /// Maximum index nesting depth followed by the graph copy
    pub max_graph_depth: usize,

    /// Transport used to reach registries
    pub protocol: RegistryProtocol,

    /// Registries reached over plain HTTP when `protocol` is `https`
    pub insecure_registries: Vec<String>,

    /// Wall-clock bound on the network stages, in seconds
    pub timeout_secs: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            size_limit: DEFAULT_SIZE_LIMIT,
            max_manifest_size: DEFAULT_MAX_MANIFEST_SIZE,
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
            max_graph_depth: DEFAULT_MAX_GRAPH_DEPTH,
            protocol: RegistryProtocol::Https,
            insecure_registries: Vec::new(),
            timeout_secs: None,
        }
    }
}

impl FetchConfig {
    /// Load configuration from a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: &Path) -> std::result::Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&data)
    }

    /// Parse configuration from a YAML document.
    pub fn from_yaml_str(data: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every fetch fail.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.size_limit == 0 {
            return Err(ConfigError::Invalid("size_limit must be greater than 0".to_string()));
        }
        if self.max_manifest_size == 0 || self.max_blob_size == 0 {
            return Err(ConfigError::Invalid(
                "max_manifest_size and max_blob_size must be greater than 0".to_string(),
            ));
        }
        if self.max_graph_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_graph_depth must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("timeout_secs must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// The network timeout, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Whether `registry` should be reached over plain HTTP.
    pub fn is_plain_http(&self, registry: &str) -> bool {
        match self.protocol {
            RegistryProtocol::Http => true,
            RegistryProtocol::Https => self.insecure_registries.iter().any(|r| r == registry),
        }
    }
}

/// Registry transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryProtocol {
    Https,
    Http,
}

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.size_limit, 1024 * 1024);
        assert_eq!(config.protocol, RegistryProtocol::Https);
        assert!(config.timeout().is_none());
        assert!(USER_AGENT.starts_with("kong-plugin-image/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = FetchConfig::from_yaml_str("size_limit: 2048\ntimeout_secs: 30\n").unwrap();
        assert_eq!(config.size_limit, 2048);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.max_blob_size, DEFAULT_MAX_BLOB_SIZE);
    }

    #[test]
    fn test_protocol_yaml() {
        let config = FetchConfig::from_yaml_str("protocol: http\n").unwrap();
        assert_eq!(config.protocol, RegistryProtocol::Http);
        assert!(config.is_plain_http("localhost:5000"));
    }

    #[test]
    fn test_insecure_registries() {
        let config = FetchConfig {
            insecure_registries: vec!["localhost:5000".to_string()],
            ..Default::default()
        };
        assert!(config.is_plain_http("localhost:5000"));
        assert!(!config.is_plain_http("ghcr.io"));
    }

    #[test]
    fn test_zero_size_limit_rejected() {
        let err = FetchConfig::from_yaml_str("size_limit: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = FetchConfig {
            timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        let err = FetchConfig::from_yaml_str("size_limit: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_graph_depth: 2").unwrap();
        let config = FetchConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.max_graph_depth, 2);
    }

    #[test]
    fn test_from_missing_file() {
        let err = FetchConfig::from_yaml_file(Path::new("/nonexistent/fetch.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
