//! Manifest graph copy.
//!
//! Walks the content-addressable graph behind an image reference
//! (index → manifests → config + layers), copying every node into a
//! [`MemoryStore`] and classifying each node by media type as it goes.
//!
//! Sibling nodes are copied concurrently. Each branch returns the layers it
//! found and the branches are folded in descriptor order once they have all
//! completed, so classification needs no shared mutable state.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use oci_distribution::manifest::{OciImageIndex, OciImageManifest};
use plugin_image_core::{FetchConfig, FetchError, Result};

use super::error::CopyError;
use super::media::{sniff_manifest, NodeKind};
use super::reference::ImageReference;
use super::registry::Registry;
use super::store::{Descriptor, MemoryStore};

/// A descriptor whose media type marks it as a plugin layer candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLayer {
    pub descriptor: Descriptor,
}

/// Everything a successful graph copy produced.
#[derive(Debug)]
pub struct CopiedGraph {
    /// Descriptor of the node the reference resolved to
    pub root: Descriptor,
    /// Every copied node
    pub store: MemoryStore,
    /// Layer candidates in graph order
    pub layers: Vec<ClassifiedLayer>,
}

/// Copy the graph behind `reference` into a fresh in-memory store.
///
/// Any failure is reported as [`FetchError::FetchFailed`] naming `image`.
pub async fn copy_graph(
    registry: &dyn Registry,
    reference: &ImageReference,
    image: &str,
    config: &FetchConfig,
) -> Result<CopiedGraph> {
    let store = MemoryStore::new();
    let copier = GraphCopier {
        registry,
        store: &store,
        config,
    };

    let copied = match config.timeout() {
        Some(limit) => tokio::time::timeout(limit, copier.copy_root(reference))
            .await
            .unwrap_or(Err(CopyError::Timeout(limit))),
        None => copier.copy_root(reference).await,
    };

    match copied {
        Ok((root, layers)) => {
            tracing::debug!(
                reference = %reference,
                digest = %root.digest,
                nodes = store.len(),
                bytes = store.total_size(),
                layers = layers.len(),
                "Copied manifest graph"
            );
            Ok(CopiedGraph {
                root,
                store,
                layers,
            })
        }
        Err(e) => Err(FetchError::FetchFailed {
            image: image.to_string(),
            source: Box::new(e),
        }),
    }
}

struct GraphCopier<'a> {
    registry: &'a dyn Registry,
    store: &'a MemoryStore,
    config: &'a FetchConfig,
}

impl<'a> GraphCopier<'a> {
    async fn copy_root(
        &'a self,
        reference: &'a ImageReference,
    ) -> std::result::Result<(Descriptor, Vec<ClassifiedLayer>), CopyError> {
        let body = self.registry.fetch_root(reference).await?;
        self.check_limit(&reference.to_string(), body.len() as u64, self.config.max_manifest_size)?;

        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|source| CopyError::MalformedManifest {
                digest: reference.to_string(),
                source,
            })?;
        let media_type = sniff_manifest(&value).unwrap_or_default();

        // A digest reference pins the content; a tag is trusted for whatever it serves
        let root = match reference.digest() {
            Some(digest) => Descriptor::new(media_type, digest, body.len() as u64),
            None => Descriptor::for_content(media_type, &body),
        };
        if !NodeKind::of(&root.media_type).is_manifest() {
            return Err(CopyError::UnsupportedManifest {
                media_type: root.media_type,
                digest: root.digest,
            });
        }

        self.store.claim(&root.digest);
        let layers = self.copy_manifest(reference, root.clone(), body, 1).await?;
        Ok((root, layers))
    }

    fn copy_node(
        &'a self,
        reference: &'a ImageReference,
        descriptor: Descriptor,
        depth: usize,
    ) -> BoxFuture<'a, std::result::Result<Vec<ClassifiedLayer>, CopyError>> {
        async move {
            if !self.store.claim(&descriptor.digest) {
                tracing::trace!(digest = %descriptor.digest, "Node already copied, skipping");
                return Ok(Vec::new());
            }

            let kind = NodeKind::of(&descriptor.media_type);
            if kind.is_manifest() {
                if depth > self.config.max_graph_depth {
                    return Err(CopyError::TooDeep(self.config.max_graph_depth));
                }
                self.check_limit(&descriptor.digest, descriptor.size, self.config.max_manifest_size)?;
                let body = self.registry.fetch_manifest(reference, &descriptor).await?;
                return self.copy_manifest(reference, descriptor, body, depth).await;
            }

            self.check_limit(&descriptor.digest, descriptor.size, self.config.max_blob_size)?;
            let body = self.registry.fetch_blob(reference, &descriptor).await?;
            self.store.push(&descriptor, body)?;

            tracing::debug!(
                digest = %descriptor.digest,
                media_type = %descriptor.media_type,
                size = descriptor.size,
                "Copied blob"
            );

            Ok(match kind {
                NodeKind::Layer => vec![ClassifiedLayer { descriptor }],
                _ => Vec::new(),
            })
        }
        .boxed()
    }

    /// Verify and store a manifest body, then copy its successors.
    async fn copy_manifest(
        &'a self,
        reference: &'a ImageReference,
        descriptor: Descriptor,
        body: Vec<u8>,
        depth: usize,
    ) -> std::result::Result<Vec<ClassifiedLayer>, CopyError> {
        let content = self.store.push(&descriptor, body)?;
        let successors = successors(&descriptor, &content)?;

        tracing::debug!(
            digest = %descriptor.digest,
            media_type = %descriptor.media_type,
            successors = successors.len(),
            "Copied manifest"
        );

        let branches = successors
            .into_iter()
            .map(|successor| self.copy_node(reference, successor, depth + 1));
        let found = try_join_all(branches).await?;
        Ok(found.into_iter().flatten().collect())
    }

    fn check_limit(&self, digest: &str, size: u64, limit: u64) -> std::result::Result<(), CopyError> {
        if size > limit {
            return Err(CopyError::TooLarge {
                digest: digest.to_string(),
                size,
                limit,
            });
        }
        Ok(())
    }
}

/// Descriptors referenced by a manifest or index body.
fn successors(descriptor: &Descriptor, content: &[u8]) -> std::result::Result<Vec<Descriptor>, CopyError> {
    let malformed = |source| CopyError::MalformedManifest {
        digest: descriptor.digest.clone(),
        source,
    };

    match NodeKind::of(&descriptor.media_type) {
        NodeKind::Index => {
            let index: OciImageIndex = serde_json::from_slice(content).map_err(malformed)?;
            index.manifests.iter().map(Descriptor::try_from).collect()
        }
        NodeKind::Manifest => {
            let manifest: OciImageManifest = serde_json::from_slice(content).map_err(malformed)?;
            std::iter::once(&manifest.config)
                .chain(manifest.layers.iter())
                .map(Descriptor::try_from)
                .collect()
        }
        _ => Err(CopyError::UnsupportedManifest {
            media_type: descriptor.media_type.clone(),
            digest: descriptor.digest.clone(),
        }),
    }
}
