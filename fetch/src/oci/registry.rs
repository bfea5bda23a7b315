//! OCI registry client for pulling plugin images.
//!
//! Uses the `oci-distribution` crate to talk to container registries
//! (Docker Hub, GHCR, etc.). The [`Registry`] trait is the seam the graph
//! copier works against, so the pipeline can run against any source of
//! manifests and blobs.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};
use plugin_image_core::{FetchConfig, FetchError, RegistryProtocol, Result, USER_AGENT};
use tokio::io::AsyncWrite;

use super::credentials::{Credential, CredentialStore};
use super::error::CopyError;
use super::media::ACCEPTED_MANIFESTS;
use super::reference::{Identifier, ImageReference};
use super::store::Descriptor;

/// Source of manifests and blobs for one registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch the manifest (or index) the reference's tag or digest points at.
    async fn fetch_root(&self, reference: &ImageReference) -> std::result::Result<Vec<u8>, CopyError>;

    /// Fetch a manifest (or index) by descriptor from the reference's repository.
    async fn fetch_manifest(
        &self,
        reference: &ImageReference,
        descriptor: &Descriptor,
    ) -> std::result::Result<Vec<u8>, CopyError>;

    /// Fetch a blob by descriptor from the reference's repository.
    ///
    /// Implementations must not buffer more than `descriptor.size` bytes.
    async fn fetch_blob(
        &self,
        reference: &ImageReference,
        descriptor: &Descriptor,
    ) -> std::result::Result<Vec<u8>, CopyError>;
}

/// Builds a [`Registry`] for a host.
pub trait RegistryConnector: Send + Sync {
    fn connect(
        &self,
        registry: &str,
        credentials: Option<&dyn CredentialStore>,
    ) -> Result<Arc<dyn Registry>>;
}

/// Connector producing [`OciRegistry`] clients.
#[derive(Debug, Clone, Default)]
pub struct OciConnector {
    config: FetchConfig,
}

impl OciConnector {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }
}

impl RegistryConnector for OciConnector {
    fn connect(
        &self,
        registry: &str,
        credentials: Option<&dyn CredentialStore>,
    ) -> Result<Arc<dyn Registry>> {
        Ok(Arc::new(build_client(registry, credentials, &self.config)?))
    }
}

/// Build an authenticated client for `registry`.
///
/// Performs no I/O. Credentials are resolved from the store once, up front;
/// without a store (or without an entry for this host) the pull is anonymous.
pub fn build_client(
    registry: &str,
    credentials: Option<&dyn CredentialStore>,
    config: &FetchConfig,
) -> Result<OciRegistry> {
    if registry.is_empty()
        || registry
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '@')
    {
        return Err(FetchError::RegistryUnavailable {
            registry: registry.to_string(),
            message: "invalid registry host".to_string(),
        });
    }

    let protocol = match config.protocol {
        RegistryProtocol::Http => ClientProtocol::Http,
        RegistryProtocol::Https if config.insecure_registries.is_empty() => ClientProtocol::Https,
        RegistryProtocol::Https => ClientProtocol::HttpsExcept(config.insecure_registries.clone()),
    };
    let client = Client::new(ClientConfig {
        protocol,
        ..Default::default()
    });

    let credential = credentials.and_then(|store| store.credential_for(registry));

    tracing::debug!(
        registry = %registry,
        plain_http = config.is_plain_http(registry),
        authenticated = credential.is_some(),
        user_agent = USER_AGENT,
        "Built registry client"
    );

    Ok(OciRegistry {
        client,
        auth: to_oci_auth(credential.as_ref()),
    })
}

/// Convert to oci-distribution auth type.
fn to_oci_auth(credential: Option<&Credential>) -> OciRegistryAuth {
    match credential {
        Some(c) => OciRegistryAuth::Basic(c.username.clone(), c.password.clone()),
        None => OciRegistryAuth::Anonymous,
    }
}

/// Registry backed by the `oci-distribution` client.
pub struct OciRegistry {
    client: Client,
    auth: OciRegistryAuth,
}

impl OciRegistry {
    /// Convert an ImageReference to an oci-distribution Reference.
    fn to_oci_reference(reference: &ImageReference) -> Reference {
        match &reference.identifier {
            Identifier::Tag(tag) => Reference::with_tag(
                reference.registry.clone(),
                reference.repository.clone(),
                tag.clone(),
            ),
            Identifier::Digest(digest) => Reference::with_digest(
                reference.registry.clone(),
                reference.repository.clone(),
                digest.clone(),
            ),
        }
    }

    fn to_oci_digest_reference(reference: &ImageReference, digest: &str) -> Reference {
        Reference::with_digest(
            reference.registry.clone(),
            reference.repository.clone(),
            digest.to_string(),
        )
    }
}

#[async_trait]
impl Registry for OciRegistry {
    async fn fetch_root(&self, reference: &ImageReference) -> std::result::Result<Vec<u8>, CopyError> {
        let oci_ref = Self::to_oci_reference(reference);
        let (body, digest) = self
            .client
            .pull_manifest_raw(&oci_ref, &self.auth, ACCEPTED_MANIFESTS)
            .await?;

        tracing::debug!(reference = %reference, digest = %digest, "Resolved root manifest");
        Ok(body)
    }

    async fn fetch_manifest(
        &self,
        reference: &ImageReference,
        descriptor: &Descriptor,
    ) -> std::result::Result<Vec<u8>, CopyError> {
        let oci_ref = Self::to_oci_digest_reference(reference, &descriptor.digest);
        let (body, _digest) = self
            .client
            .pull_manifest_raw(&oci_ref, &self.auth, ACCEPTED_MANIFESTS)
            .await?;
        Ok(body)
    }

    async fn fetch_blob(
        &self,
        reference: &ImageReference,
        descriptor: &Descriptor,
    ) -> std::result::Result<Vec<u8>, CopyError> {
        let oci_ref = Self::to_oci_reference(reference);
        let mut buffer = BoundedBuffer::new(descriptor.size);

        let pulled = self
            .client
            .pull_blob(&oci_ref, &descriptor.to_oci(), &mut buffer)
            .await;

        if buffer.overflowed {
            return Err(CopyError::TooLarge {
                digest: descriptor.digest.clone(),
                size: buffer.attempted,
                limit: descriptor.size,
            });
        }
        pulled?;
        Ok(buffer.data)
    }
}

/// Write sink that refuses to grow past a fixed byte count.
struct BoundedBuffer {
    data: Vec<u8>,
    limit: u64,
    attempted: u64,
    overflowed: bool,
}

impl BoundedBuffer {
    fn new(limit: u64) -> Self {
        Self {
            data: Vec::new(),
            limit,
            attempted: 0,
            overflowed: false,
        }
    }
}

impl AsyncWrite for BoundedBuffer {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = &mut *self;
        this.attempted = this.data.len() as u64 + buf.len() as u64;
        if this.attempted > this.limit {
            this.overflowed = true;
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("blob exceeds declared size of {} bytes", this.limit),
            )));
        }
        this.data.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::credentials::StaticCredentials;
    use tokio::io::AsyncWriteExt;

    fn reference(identifier: Identifier) -> ImageReference {
        ImageReference {
            registry: "ghcr.io".to_string(),
            repository: "kong/plugin".to_string(),
            identifier,
        }
    }

    #[test]
    fn test_auth_anonymous_without_store() {
        assert!(matches!(to_oci_auth(None), OciRegistryAuth::Anonymous));
    }

    #[test]
    fn test_auth_basic_from_store() {
        let store = StaticCredentials::new().with("ghcr.io", Credential::basic("user", "pass"));
        let client = build_client("ghcr.io", Some(&store), &FetchConfig::default()).unwrap();
        assert!(matches!(client.auth, OciRegistryAuth::Basic(ref u, _) if u == "user"));
    }

    #[test]
    fn test_auth_anonymous_for_other_host() {
        let store = StaticCredentials::new().with("quay.io", Credential::basic("user", "pass"));
        let client = build_client("ghcr.io", Some(&store), &FetchConfig::default()).unwrap();
        assert!(matches!(client.auth, OciRegistryAuth::Anonymous));
    }

    #[test]
    fn test_build_client_rejects_bad_host() {
        for host in ["", "ghcr.io/kong", "bad host"] {
            let err = build_client(host, None, &FetchConfig::default()).err().unwrap();
            assert!(matches!(err, FetchError::RegistryUnavailable { .. }), "{host}");
        }
    }

    #[test]
    fn test_connector_builds_client() {
        let connector = OciConnector::new(FetchConfig::default());
        assert!(connector.connect("localhost:5000", None).is_ok());
    }

    #[test]
    fn test_to_oci_reference_with_tag() {
        let oci_ref = OciRegistry::to_oci_reference(&reference(Identifier::Tag("v0.1.0".to_string())));
        assert_eq!(oci_ref.to_string(), "ghcr.io/kong/plugin:v0.1.0");
    }

    #[test]
    fn test_to_oci_reference_with_digest() {
        let digest = "sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";
        let oci_ref = OciRegistry::to_oci_reference(&reference(Identifier::Digest(digest.to_string())));
        assert_eq!(oci_ref.digest(), Some(digest));
        assert!(oci_ref.to_string().contains("sha256:"));
    }

    #[tokio::test]
    async fn test_bounded_buffer_accepts_up_to_limit() {
        let mut buffer = BoundedBuffer::new(4);
        buffer.write_all(b"ab").await.unwrap();
        buffer.write_all(b"cd").await.unwrap();
        assert_eq!(buffer.data, b"abcd");
        assert!(!buffer.overflowed);
    }

    #[tokio::test]
    async fn test_bounded_buffer_rejects_overflow() {
        let mut buffer = BoundedBuffer::new(4);
        buffer.write_all(b"abc").await.unwrap();
        assert!(buffer.write_all(b"de").await.is_err());
        assert!(buffer.overflowed);
        assert_eq!(buffer.attempted, 5);
        assert_eq!(buffer.data, b"abc");
    }
}
