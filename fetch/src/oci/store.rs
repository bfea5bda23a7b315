//! In-memory content-addressable store.
//!
//! Holds every node copied from the manifest graph of one image, keyed by
//! digest. A store lives for exactly one fetch call.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use oci_distribution::manifest::{ImageIndexEntry, OciDescriptor};
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256, Sha512};

use super::error::CopyError;

/// Content-addressed reference to one node of the image graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    /// Media type (e.g., "application/vnd.oci.image.manifest.v1+json")
    pub media_type: String,
    /// Content digest (e.g., "sha256:abc123...")
    pub digest: String,
    /// Size in bytes
    pub size: u64,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, digest: impl Into<String>, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest: digest.into(),
            size,
        }
    }

    /// Describe `content` with a freshly computed sha256 digest.
    pub fn for_content(media_type: impl Into<String>, content: &[u8]) -> Self {
        Self::new(
            media_type,
            format!("sha256:{}", sha256_hex(content)),
            content.len() as u64,
        )
    }

    /// Convert to the oci-distribution descriptor used for blob requests.
    pub fn to_oci(&self) -> OciDescriptor {
        OciDescriptor {
            media_type: self.media_type.clone(),
            digest: self.digest.clone(),
            size: self.size as i64,
            urls: None,
            annotations: None,
        }
    }
}

impl TryFrom<&OciDescriptor> for Descriptor {
    type Error = CopyError;

    fn try_from(desc: &OciDescriptor) -> Result<Self, Self::Error> {
        Ok(Self::new(
            desc.media_type.clone(),
            desc.digest.clone(),
            checked_size(&desc.digest, desc.size)?,
        ))
    }
}

impl TryFrom<&ImageIndexEntry> for Descriptor {
    type Error = CopyError;

    fn try_from(entry: &ImageIndexEntry) -> Result<Self, Self::Error> {
        Ok(Self::new(
            entry.media_type.clone(),
            entry.digest.clone(),
            checked_size(&entry.digest, entry.size)?,
        ))
    }
}

fn checked_size(digest: &str, size: i64) -> Result<u64, CopyError> {
    u64::try_from(size).map_err(|_| CopyError::InvalidSize {
        digest: digest.to_string(),
        size,
    })
}

/// Verify `content` hashes to `digest`.
///
/// Supports `sha256` and `sha512`.
pub fn verify_digest(digest: &str, content: &[u8]) -> Result<(), CopyError> {
    let actual = match digest.split_once(':') {
        Some(("sha256", _)) => format!("sha256:{}", sha256_hex(content)),
        Some(("sha512", _)) => {
            let mut hasher = Sha512::new();
            hasher.update(content);
            format!("sha512:{}", hex::encode(hasher.finalize()))
        }
        _ => return Err(CopyError::UnsupportedDigest(digest.to_string())),
    };

    if actual != digest {
        return Err(CopyError::DigestMismatch {
            expected: digest.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Compute SHA256 digest of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Thread-safe digest → bytes store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Arc<[u8]>>>,
    claimed: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `digest` for copying. Returns false if another branch of the
    /// graph already claimed it.
    pub fn claim(&self, digest: &str) -> bool {
        self.claimed.lock().insert(digest.to_string())
    }

    /// Store `content` under its descriptor after verifying size and digest.
    ///
    /// Returns the stored bytes.
    pub fn push(&self, descriptor: &Descriptor, content: Vec<u8>) -> Result<Arc<[u8]>, CopyError> {
        let actual = content.len() as u64;
        if actual != descriptor.size {
            return Err(CopyError::SizeMismatch {
                digest: descriptor.digest.clone(),
                declared: descriptor.size,
                actual,
            });
        }
        verify_digest(&descriptor.digest, &content)?;

        let content: Arc<[u8]> = Arc::from(content);
        self.blobs
            .write()
            .insert(descriptor.digest.clone(), Arc::clone(&content));
        Ok(content)
    }

    /// Bytes for a descriptor, if present.
    pub fn fetch(&self, descriptor: &Descriptor) -> Option<Arc<[u8]>> {
        self.blobs.read().get(&descriptor.digest).cloned()
    }

    pub fn exists(&self, descriptor: &Descriptor) -> bool {
        self.blobs.read().contains_key(&descriptor.digest)
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Total bytes held.
    pub fn total_size(&self) -> u64 {
        self.blobs.read().values().map(|b| b.len() as u64).sum()
    }
}
