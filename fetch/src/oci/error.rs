//! Causes of a failed manifest graph copy.
//!
//! Every variant ends up as the `source` of
//! [`FetchError::FetchFailed`](plugin_image_core::FetchError::FetchFailed).

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopyError {
    /// Transport, authentication or protocol error from the registry client
    #[error(transparent)]
    Registry(#[from] oci_distribution::errors::OciDistributionError),

    /// The registry does not have the requested content
    #[error("content not found: {0}")]
    NotFound(String),

    /// A manifest body could not be decoded
    #[error("malformed manifest {digest}: {source}")]
    MalformedManifest {
        digest: String,
        #[source]
        source: serde_json::Error,
    },

    /// A manifest descriptor carries a media type the copier cannot walk
    #[error("unsupported manifest media type '{media_type}' for {digest}")]
    UnsupportedManifest { media_type: String, digest: String },

    /// Content hash does not match the descriptor digest
    #[error("digest mismatch: expected {expected}, computed {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Byte count does not match the descriptor size
    #[error("size mismatch for {digest}: descriptor declares {declared} bytes, received {actual}")]
    SizeMismatch {
        digest: String,
        declared: u64,
        actual: u64,
    },

    /// Content is larger than the configured ceiling
    #[error("{digest} is {size} bytes, over the {limit} byte limit")]
    TooLarge { digest: String, size: u64, limit: u64 },

    /// A descriptor declares a size that cannot be valid
    #[error("invalid size {size} for {digest}")]
    InvalidSize { digest: String, size: i64 },

    /// Digest algorithm other than sha256/sha512
    #[error("unsupported digest '{0}'")]
    UnsupportedDigest(String),

    /// Index nesting beyond the configured depth
    #[error("manifest graph is nested deeper than {0} levels")]
    TooDeep(usize),

    /// The network stages did not finish in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_display() {
        let err = CopyError::SizeMismatch {
            digest: "sha256:abc".to_string(),
            declared: 10,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "size mismatch for sha256:abc: descriptor declares 10 bytes, received 12"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = CopyError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "timed out after 5s");
    }
}
