//! OCI image reference parsing.
//!
//! Parses image references like `ghcr.io/kong/my-plugin:1.0.0` into structured
//! components. Parsing is pure: a reference that does not follow the image
//! reference grammar is rejected here, before any registry is contacted.

use plugin_image_core::{FetchError, Result};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag when neither tag nor digest is specified.
const DEFAULT_TAG: &str = "latest";

/// Maximum length of the registry + repository part of a reference.
const MAX_NAME_LEN: usize = 255;

/// Maximum length of a tag.
const MAX_TAG_LEN: usize = 128;

/// Tag or digest identifying one manifest within a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Mutable tag (e.g., "1.0.0", "latest")
    Tag(String),
    /// Content digest (e.g., "sha256:abc123...")
    Digest(String),
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tag(tag) => write!(f, ":{}", tag),
            Self::Digest(digest) => write!(f, "@{}", digest),
        }
    }
}

/// Parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host with optional port (e.g., "ghcr.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g., "kong/my-plugin", "library/nginx")
    pub repository: String,
    /// Tag or digest
    pub identifier: Identifier,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `myplugin` → docker.io/library/myplugin:latest
    /// - `kong/myplugin:1.0` → docker.io/kong/myplugin:1.0
    /// - `ghcr.io/org/plugin:tag` → ghcr.io/org/plugin:tag
    /// - `localhost:5000/plugin@sha256:abc...` → localhost:5000/plugin@sha256:abc...
    ///
    /// When both a tag and a digest are given, the digest wins.
    pub fn parse(reference: &str) -> Result<Self> {
        let input = reference;
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(FetchError::invalid_reference(input, "empty reference"));
        }
        if let Some(c) = reference.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(FetchError::invalid_reference(
                input,
                format!("contains invalid character {:?}", c),
            ));
        }

        // Split off digest first (@ separator)
        let (name_tag, digest) = match reference.split_once('@') {
            Some((name_tag, digest)) => {
                validate_digest(digest).map_err(|reason| FetchError::invalid_reference(input, reason))?;
                (name_tag, Some(digest))
            }
            None => (reference, None),
        };

        // Split tag (: separator, but only after the last /)
        let last_slash = name_tag.rfind('/').map_or(0, |p| p + 1);
        let (name, tag) = match name_tag[last_slash..].rfind(':') {
            Some(colon) => {
                let colon = last_slash + colon;
                (&name_tag[..colon], Some(&name_tag[colon + 1..]))
            }
            None => (name_tag, None),
        };

        if let Some(tag) = tag {
            validate_tag(tag).map_err(|reason| FetchError::invalid_reference(input, reason))?;
        }

        if name.len() > MAX_NAME_LEN {
            return Err(FetchError::invalid_reference(
                input,
                format!("name exceeds {} characters", MAX_NAME_LEN),
            ));
        }

        let (registry, repository) =
            split_registry_repository(name).map_err(|reason| FetchError::invalid_reference(input, reason))?;

        let identifier = match (digest, tag) {
            (Some(digest), _) => Identifier::Digest(digest.to_string()),
            (None, Some(tag)) => Identifier::Tag(tag.to_string()),
            (None, None) => Identifier::Tag(DEFAULT_TAG.to_string()),
        };

        Ok(ImageReference {
            registry,
            repository,
            identifier,
        })
    }

    /// The tag, if the reference is tag-addressed.
    pub fn tag(&self) -> Option<&str> {
        match &self.identifier {
            Identifier::Tag(tag) => Some(tag),
            Identifier::Digest(_) => None,
        }
    }

    /// The digest, if the reference is digest-addressed.
    pub fn digest(&self) -> Option<&str> {
        match &self.identifier {
            Identifier::Digest(digest) => Some(digest),
            Identifier::Tag(_) => None,
        }
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        format!("{}/{}{}", self.registry, self.repository, self.identifier)
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split a name into registry and repository components.
fn split_registry_repository(name: &str) -> std::result::Result<(String, String), String> {
    // The first component is a registry hostname if it contains a dot or
    // colon, or is "localhost"
    let (registry, repository) = match name.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            validate_registry(first)?;
            (first.to_string(), rest.to_string())
        }
        _ if name.contains('/') => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        // Single name like "plugin" → "library/plugin" for Docker Hub
        _ => (DEFAULT_REGISTRY.to_string(), format!("library/{}", name)),
    };

    if repository.is_empty() {
        return Err("empty repository".to_string());
    }
    for component in repository.split('/') {
        validate_path_component(component)?;
    }

    Ok((registry, repository))
}

/// `host[:port]` with an alphanumeric/dot/dash host and numeric port.
fn validate_registry(registry: &str) -> std::result::Result<(), String> {
    let (host, port) = match registry.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };

    let valid_host = !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        });
    if !valid_host {
        return Err(format!("invalid registry host '{}'", registry));
    }

    if let Some(port) = port {
        if port.is_empty() || port.len() > 5 || !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid registry port in '{}'", registry));
        }
    }
    Ok(())
}

/// Lowercase alphanumerics separated by `.`, `_`, `__` or runs of `-`.
fn validate_path_component(component: &str) -> std::result::Result<(), String> {
    let invalid = || format!("invalid repository path component '{}'", component);

    let bytes = component.as_bytes();
    if bytes.is_empty() {
        return Err(invalid());
    }
    if !is_lower_alnum(bytes[0]) || !is_lower_alnum(bytes[bytes.len() - 1]) {
        return Err(invalid());
    }

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if is_lower_alnum(b) {
            i += 1;
            continue;
        }
        // Separator run: ".", "_", "__" or one or more "-"
        let start = i;
        match b {
            b'.' => i += 1,
            b'_' => {
                i += 1;
                if i < bytes.len() && bytes[i] == b'_' {
                    i += 1;
                }
            }
            b'-' => {
                while i < bytes.len() && bytes[i] == b'-' {
                    i += 1;
                }
            }
            _ => return Err(invalid()),
        }
        if i == start || i >= bytes.len() || !is_lower_alnum(bytes[i]) {
            return Err(invalid());
        }
    }
    Ok(())
}

fn is_lower_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

/// `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
fn validate_tag(tag: &str) -> std::result::Result<(), String> {
    let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut chars = tag.chars();
    let valid = match chars.next() {
        Some(first) => word(first) && chars.all(|c| word(c) || c == '.' || c == '-'),
        None => false,
    };
    if !valid || tag.len() > MAX_TAG_LEN {
        return Err(format!("invalid tag '{}'", tag));
    }
    Ok(())
}

/// `algorithm:encoded`, with exact hex lengths for sha256 and sha512.
fn validate_digest(digest: &str) -> std::result::Result<(), String> {
    let invalid = || format!("invalid digest '{}': expected algorithm:hex", digest);

    let (algorithm, encoded) = digest.split_once(':').ok_or_else(invalid)?;
    if algorithm.is_empty()
        || encoded.is_empty()
        || !algorithm
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+._-".contains(c))
    {
        return Err(invalid());
    }

    let expected_len = match algorithm {
        "sha256" => Some(64),
        "sha512" => Some(128),
        _ => None,
    };
    match expected_len {
        Some(len) => {
            let is_hex = encoded
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
            if encoded.len() != len || !is_hex {
                return Err(invalid());
            }
        }
        None => {
            if !encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "=_-".contains(c))
            {
                return Err(invalid());
            }
        }
    }
    Ok(())
}
