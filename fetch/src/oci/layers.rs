//! Plugin layer selection and extraction.
//!
//! A plugin image carries exactly one gzip-compressed tar layer. Only the
//! required plugin files are read, into memory and never onto disk, and each
//! is bounded by the configured size limit while it is decompressed.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Read};

use flate2::read::GzDecoder;
use plugin_image_core::{FetchError, Result, REQUIRED_FILES};
use tar::{Archive, EntryType};

use super::classify::base_name;
use super::copy::ClassifiedLayer;
use super::store::MemoryStore;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Pick the single plugin layer out of the copied candidates.
///
/// Zero or several candidates fail with [`FetchError::LayerCountMismatch`].
pub fn select_layer(candidates: Vec<ClassifiedLayer>) -> Result<ClassifiedLayer> {
    let count = candidates.len();
    let mut candidates = candidates.into_iter();
    match (candidates.next(), candidates.next()) {
        (Some(layer), None) => Ok(layer),
        _ => Err(FetchError::LayerCountMismatch { count }),
    }
}

/// Reads plugin layers into `path → contents` maps.
#[derive(Debug, Clone, Copy)]
pub struct LayerExtractor {
    size_limit: u64,
}

impl LayerExtractor {
    /// Create an extractor that rejects any entry larger than `size_limit` bytes.
    pub fn new(size_limit: u64) -> Self {
        Self { size_limit }
    }

    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    /// Extract the layer's bytes from the store.
    pub fn extract(
        &self,
        store: &MemoryStore,
        layer: &ClassifiedLayer,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let data = store.fetch(&layer.descriptor).ok_or_else(|| FetchError::DecodeFailed {
            source: io::Error::new(
                io::ErrorKind::NotFound,
                format!("layer {} missing from content store", layer.descriptor.digest),
            ),
        })?;

        let files = self.extract_bytes(&data)?;

        tracing::debug!(
            digest = %layer.descriptor.digest,
            files = files.len(),
            "Extracted plugin layer"
        );

        Ok(files)
    }

    /// Extract a gzip-compressed tar archive held in memory.
    ///
    /// Directories and global PAX headers are skipped. Entry names are checked
    /// before any body is read: a name other than a required plugin file is
    /// rejected on the spot, so at most one body per required file is ever
    /// buffered. Bodies are read up to one byte past the limit and the declared
    /// entry size is never trusted. Any other entry type (links, devices,
    /// fifos) is rejected.
    ///
    /// A repeated base name is reported once the whole archive has been
    /// scanned without finding an unexpected name.
    pub fn extract_bytes(&self, data: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
        if !data.starts_with(&GZIP_MAGIC) {
            return Err(decode_failed(io::Error::new(
                io::ErrorKind::InvalidData,
                "layer is not gzip-compressed",
            )));
        }

        let mut archive = Archive::new(GzDecoder::new(data));
        let mut files = BTreeMap::new();
        let mut seen = HashSet::new();
        let mut duplicate = None;

        for entry in archive.entries().map_err(decode_failed)? {
            let mut entry = entry.map_err(decode_failed)?;
            let name = entry
                .path()
                .map_err(decode_failed)?
                .to_string_lossy()
                .into_owned();

            match entry.header().entry_type() {
                EntryType::Directory | EntryType::XGlobalHeader => {
                    tracing::trace!(entry = %name, "Skipping non-file entry");
                    continue;
                }
                EntryType::Regular | EntryType::Continuous => {}
                _ => return Err(FetchError::UnexpectedFile { name }),
            }

            let base = base_name(&name);
            if !REQUIRED_FILES.contains(&base) {
                return Err(FetchError::UnexpectedFile { name });
            }
            if !seen.insert(base.to_string()) {
                tracing::debug!(entry = %name, "Skipping repeated plugin file");
                duplicate.get_or_insert(name);
                continue;
            }

            let mut contents = Vec::new();
            let read = (&mut entry)
                .take(self.size_limit.saturating_add(1))
                .read_to_end(&mut contents)
                .map_err(decode_failed)?;
            if read as u64 > self.size_limit {
                return Err(FetchError::SizeLimitExceeded {
                    name,
                    limit: self.size_limit,
                });
            }

            tracing::debug!(entry = %name, size = read, "Read archive entry");
            files.insert(name, contents);
        }

        if let Some(name) = duplicate {
            return Err(FetchError::DuplicateFile { name });
        }
        Ok(files)
    }
}

fn decode_failed(source: io::Error) -> FetchError {
    FetchError::DecodeFailed { source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oci::media::OCI_LAYER_GZIP;
    use crate::oci::store::Descriptor;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tar::{Builder, Header};

    fn create_test_layer(files: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);

        for (name, content) in files {
            let mut header = Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();

            builder.append_data(&mut header, name, *content).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        use std::io::Write;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn layer(descriptor: Descriptor) -> ClassifiedLayer {
        ClassifiedLayer { descriptor }
    }

    #[test]
    fn test_select_single_layer() {
        let desc = Descriptor::for_content(OCI_LAYER_GZIP, b"a");
        assert_eq!(select_layer(vec![layer(desc.clone())]).unwrap().descriptor, desc);
    }

    #[test]
    fn test_select_no_layers() {
        let err = select_layer(Vec::new()).unwrap_err();
        assert!(matches!(err, FetchError::LayerCountMismatch { count: 0 }));
    }

    #[test]
    fn test_select_two_layers() {
        let layers = vec![
            layer(Descriptor::for_content(OCI_LAYER_GZIP, b"a")),
            layer(Descriptor::for_content(OCI_LAYER_GZIP, b"b")),
        ];
        let err = select_layer(layers).unwrap_err();
        assert!(matches!(err, FetchError::LayerCountMismatch { count: 2 }));
    }

    #[test]
    fn test_extract_files() {
        let data = create_test_layer(&[("handler.lua", b"return {}"), ("schema.lua", b"return {}")]);
        let files = LayerExtractor::new(1024).extract_bytes(&data).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files["handler.lua"], b"return {}");
        assert_eq!(files["schema.lua"], b"return {}");
    }

    #[test]
    fn test_extract_from_store() {
        let data = create_test_layer(&[("handler.lua", b"h")]);
        let desc = Descriptor::for_content(OCI_LAYER_GZIP, &data);
        let store = MemoryStore::new();
        store.push(&desc, data).unwrap();

        let files = LayerExtractor::new(1024).extract(&store, &layer(desc)).unwrap();
        assert_eq!(files["handler.lua"], b"h");
    }

    #[test]
    fn test_extract_missing_from_store() {
        let desc = Descriptor::for_content(OCI_LAYER_GZIP, b"gone");
        let err = LayerExtractor::new(1024)
            .extract(&MemoryStore::new(), &layer(desc))
            .unwrap_err();
        assert!(matches!(err, FetchError::DecodeFailed { .. }));
    }

    #[test]
    fn test_size_limit_boundary() {
        let exact = vec![b'x'; 64];
        let data = create_test_layer(&[("handler.lua", &exact)]);
        assert!(LayerExtractor::new(64).extract_bytes(&data).is_ok());

        let over = vec![b'x'; 65];
        let data = create_test_layer(&[("handler.lua", &over)]);
        let err = LayerExtractor::new(64).extract_bytes(&data).unwrap_err();
        assert!(matches!(
            err,
            FetchError::SizeLimitExceeded { ref name, limit: 64 } if name == "handler.lua"
        ));
    }

    #[test]
    fn test_understated_header_rejected() {
        // Header claims 8 bytes, followed by a much longer body. Tar framing
        // bounds the body by the header, so the overrun is read as a corrupt
        // next header.
        let mut header = Header::new_ustar();
        header.set_path("handler.lua").unwrap();
        header.set_size(8);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        header.set_cksum();

        let mut raw = header.as_bytes().to_vec();
        raw.extend(vec![b'x'; 4096]);
        raw.extend(vec![0u8; 1024]);

        let err = LayerExtractor::new(16).extract_bytes(&gzip(&raw)).unwrap_err();
        assert!(matches!(err, FetchError::DecodeFailed { .. }));
    }

    #[test]
    fn test_unknown_entries_rejected_before_reading() {
        const LIMIT: usize = 64 * 1024;
        let junk = vec![0u8; LIMIT];
        let names: Vec<String> = (0..64).map(|i| format!("junk{i:03}.bin")).collect();
        let entries: Vec<(&str, &[u8])> = names
            .iter()
            .map(|name| (name.as_str(), junk.as_slice()))
            .collect();
        let data = create_test_layer(&entries);

        let err = LayerExtractor::new(LIMIT as u64).extract_bytes(&data).unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedFile { ref name } if name == "junk000.bin"));
    }

    #[test]
    fn test_unexpected_reported_after_duplicate() {
        let data = create_test_layer(&[
            ("handler.lua", b"a"),
            ("handler.lua", b"b"),
            ("extra.lua", b"x"),
        ]);
        let err = LayerExtractor::new(1024).extract_bytes(&data).unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedFile { ref name } if name == "extra.lua"));
    }

    #[test]
    fn test_duplicate_base_name_rejected() {
        let data = create_test_layer(&[("a/schema.lua", b"1"), ("b/schema.lua", b"2")]);
        let err = LayerExtractor::new(1024).extract_bytes(&data).unwrap_err();
        assert!(matches!(err, FetchError::DuplicateFile { ref name } if name == "b/schema.lua"));
    }

    #[test]
    fn test_skips_directories() {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);

        let mut dir = Header::new_gnu();
        dir.set_entry_type(EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        dir.set_cksum();
        builder.append_data(&mut dir, "plugin/", io::empty()).unwrap();

        let mut file = Header::new_gnu();
        file.set_size(1);
        file.set_mode(0o644);
        file.set_cksum();
        builder.append_data(&mut file, "plugin/handler.lua", &b"h"[..]).unwrap();

        let data = builder.into_inner().unwrap().finish().unwrap();
        let files = LayerExtractor::new(1024).extract_bytes(&data).unwrap();

        assert_eq!(files.keys().collect::<Vec<_>>(), vec!["plugin/handler.lua"]);
    }

    #[test]
    fn test_symlink_rejected() {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);

        let mut link = Header::new_gnu();
        link.set_entry_type(EntryType::Symlink);
        link.set_size(0);
        link.set_mode(0o777);
        builder
            .append_link(&mut link, "handler.lua", "/etc/passwd")
            .unwrap();

        let data = builder.into_inner().unwrap().finish().unwrap();
        let err = LayerExtractor::new(1024).extract_bytes(&data).unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedFile { ref name } if name == "handler.lua"));
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let data = create_test_layer(&[("handler.lua", b"a"), ("handler.lua", b"b")]);
        let err = LayerExtractor::new(1024).extract_bytes(&data).unwrap_err();
        assert!(matches!(err, FetchError::DuplicateFile { .. }));
    }

    #[test]
    fn test_not_gzip() {
        let err = LayerExtractor::new(1024)
            .extract_bytes(b"plain tar bytes")
            .unwrap_err();
        assert!(matches!(err, FetchError::DecodeFailed { .. }));
    }

    #[test]
    fn test_corrupt_gzip() {
        // Valid gzip header, then a deflate block with a reserved block type
        let mut data = vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 0xff];
        data.extend([0xff; 16]);
        let err = LayerExtractor::new(1024).extract_bytes(&data).unwrap_err();
        assert!(matches!(err, FetchError::DecodeFailed { .. }));
    }

    #[test]
    fn test_empty_archive() {
        let data = create_test_layer(&[]);
        assert!(LayerExtractor::new(1024).extract_bytes(&data).unwrap().is_empty());
    }
}
