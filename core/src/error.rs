use thiserror::Error;

/// Boxed cause carried by errors that wrap a lower layer.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Plugin image fetch error types.
///
/// The `Display` output of every variant is surfaced verbatim in resource
/// status conditions, so the wording is part of the public contract.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The image URL could not be parsed into registry, repository and tag/digest.
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// A registry client could not be constructed for the resolved host.
    #[error("registry '{registry}' unavailable: {message}")]
    RegistryUnavailable { registry: String, message: String },

    /// Copying the manifest graph into the content store failed.
    #[error("failed to fetch image '{image}': {source}")]
    FetchFailed {
        image: String,
        #[source]
        source: BoxedCause,
    },

    /// The image does not carry exactly one plugin layer.
    #[error("expected exactly 1 plugin layer in image, found {count}")]
    LayerCountMismatch { count: usize },

    /// The layer blob is not a readable gzip-compressed tar archive.
    #[error("failed to decode plugin layer: {source}")]
    DecodeFailed {
        #[source]
        source: std::io::Error,
    },

    /// An archive entry is larger than the configured ceiling.
    #[error("file '{name}' exceeds the size limit of {limit} bytes")]
    SizeLimitExceeded { name: String, limit: u64 },

    /// An archive entry is not one of the required plugin files.
    #[error("unexpected file '{name}' in plugin image, only {} are allowed", crate::plugin::REQUIRED_FILES.join(" and "))]
    UnexpectedFile { name: String },

    /// Two archive entries map to the same plugin file.
    #[error("duplicate file '{name}' in plugin image")]
    DuplicateFile { name: String },

    /// One or more required plugin files are absent from the archive.
    #[error("missing required files in plugin image: {}", .names.join(", "))]
    MissingFiles { names: Vec<String> },
}

impl FetchError {
    /// Short machine-readable kind, suitable for a status condition reason.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidReference { .. } => "InvalidReference",
            Self::RegistryUnavailable { .. } => "RegistryUnavailable",
            Self::FetchFailed { .. } => "FetchFailed",
            Self::LayerCountMismatch { .. } => "LayerCountMismatch",
            Self::DecodeFailed { .. } => "DecodeFailed",
            Self::SizeLimitExceeded { .. } => "SizeLimitExceeded",
            Self::UnexpectedFile { .. } => "UnexpectedFile",
            Self::DuplicateFile { .. } => "DuplicateFile",
            Self::MissingFiles { .. } => "MissingFiles",
        }
    }

    /// Build a [`FetchError::InvalidReference`] naming the offending input.
    pub fn invalid_reference(reference: &str, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for plugin image operations
pub type Result<T> = std::result::Result<T, FetchError>;
