//! Media types of the nodes in an image graph.

/// OCI image manifest
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
/// OCI image index
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
/// Docker image manifest, schema 2
pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
/// Docker manifest list
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
/// OCI gzip-compressed filesystem layer
pub const OCI_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
/// Docker gzip-compressed filesystem layer, wire-compatible with [`OCI_LAYER_GZIP`]
pub const DOCKER_LAYER_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

/// Manifest types requested from the registry, in preference order.
pub const ACCEPTED_MANIFESTS: &[&str] = &[OCI_MANIFEST, OCI_INDEX, DOCKER_MANIFEST, DOCKER_MANIFEST_LIST];

/// How the graph copier treats a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Lists platform manifests
    Index,
    /// Lists a config and layers
    Manifest,
    /// Plugin layer candidate
    Layer,
    /// Anything else: config blobs, attestations, foreign layers
    Other,
}

impl NodeKind {
    pub fn of(media_type: &str) -> Self {
        match media_type {
            OCI_INDEX | DOCKER_MANIFEST_LIST => Self::Index,
            OCI_MANIFEST | DOCKER_MANIFEST => Self::Manifest,
            OCI_LAYER_GZIP | DOCKER_LAYER_GZIP => Self::Layer,
            _ => Self::Other,
        }
    }

    /// Whether the node has successors to walk.
    pub fn is_manifest(self) -> bool {
        matches!(self, Self::Index | Self::Manifest)
    }
}

/// Media type of a manifest body, from its `mediaType` field or its shape.
pub fn sniff_manifest(body: &serde_json::Value) -> Option<String> {
    if let Some(media_type) = body.get("mediaType").and_then(|v| v.as_str()) {
        return Some(media_type.to_string());
    }
    if body.get("manifests").is_some() {
        Some(OCI_INDEX.to_string())
    } else if body.get("config").is_some() || body.get("layers").is_some() {
        Some(OCI_MANIFEST.to_string())
    } else {
        None
    }
}
