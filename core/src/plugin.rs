//! The plugin payload returned by a successful fetch.

use std::collections::BTreeMap;

/// Name of the plugin handler file.
pub const HANDLER_FILE: &str = "handler.lua";

/// Name of the plugin schema file.
pub const SCHEMA_FILE: &str = "schema.lua";

/// The exact set of files a plugin image must carry, in reporting order.
pub const REQUIRED_FILES: [&str; 2] = [HANDLER_FILE, SCHEMA_FILE];

/// Files extracted from a plugin image.
///
/// The key set is always exactly [`REQUIRED_FILES`]; the only way to build
/// one is through [`PluginFiles::new`], which takes both contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFiles {
    files: BTreeMap<String, Vec<u8>>,
}

impl PluginFiles {
    /// Create the payload from the handler and schema contents.
    pub fn new(handler: Vec<u8>, schema: Vec<u8>) -> Self {
        let mut files = BTreeMap::new();
        files.insert(HANDLER_FILE.to_string(), handler);
        files.insert(SCHEMA_FILE.to_string(), schema);
        Self { files }
    }

    /// Contents of `handler.lua`.
    pub fn handler(&self) -> &[u8] {
        self.get(HANDLER_FILE).unwrap_or_default()
    }

    /// Contents of `schema.lua`.
    pub fn schema(&self) -> &[u8] {
        self.get(SCHEMA_FILE).unwrap_or_default()
    }

    /// Look up a file by name.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Iterate over `(name, contents)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of files, always 2.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Consume into the underlying name → bytes map.
    pub fn into_map(self) -> BTreeMap<String, Vec<u8>> {
        self.files
    }

    /// Render as name → text, replacing invalid UTF-8 sequences.
    ///
    /// This is the shape a generic key/value config object expects.
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        self.files
            .iter()
            .map(|(k, v)| (k.clone(), String::from_utf8_lossy(v).into_owned()))
            .collect()
    }
}
