//! Plugin file classification.

use std::collections::BTreeMap;
use std::path::Path;

use plugin_image_core::{FetchError, PluginFiles, Result, HANDLER_FILE, REQUIRED_FILES, SCHEMA_FILE};

/// Turn extracted layer entries into a plugin's file set.
///
/// Entries are matched on their base name, so `plugin/handler.lua` counts as
/// `handler.lua`. Any other name is rejected, wherever it sits in the archive.
pub fn classify(files: BTreeMap<String, Vec<u8>>) -> Result<PluginFiles> {
    let mut handler = None;
    let mut schema = None;
    let mut duplicate = None;

    for (path, contents) in files {
        let slot = match base_name(&path) {
            HANDLER_FILE => &mut handler,
            SCHEMA_FILE => &mut schema,
            _ => return Err(FetchError::UnexpectedFile { name: path }),
        };
        if slot.is_some() {
            duplicate.get_or_insert(path);
            continue;
        }
        *slot = Some(contents);
    }

    if let Some(name) = duplicate {
        return Err(FetchError::DuplicateFile { name });
    }

    match (handler, schema) {
        (Some(handler), Some(schema)) => Ok(PluginFiles::new(handler, schema)),
        (handler, schema) => {
            let present = [handler.is_some(), schema.is_some()];
            let names = REQUIRED_FILES
                .iter()
                .zip(present)
                .filter(|(_, found)| !found)
                .map(|(name, _)| name.to_string())
                .collect();
            Err(FetchError::MissingFiles { names })
        }
    }
}

/// Final path component, used to match archive entries to plugin files.
pub(crate) fn base_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_classify_plugin() {
        let plugin = classify(files(&[
            ("handler.lua", "return { PRIORITY = 1000 }"),
            ("schema.lua", "return { name = 'x' }"),
        ]))
        .unwrap();

        assert_eq!(plugin.handler(), b"return { PRIORITY = 1000 }");
        assert_eq!(plugin.schema(), b"return { name = 'x' }");
        assert_eq!(plugin.len(), 2);
    }

    #[test]
    fn test_nested_paths_use_base_name() {
        let plugin = classify(files(&[
            ("kong/plugins/demo/handler.lua", "h"),
            ("./schema.lua", "s"),
        ]))
        .unwrap();
        assert_eq!(plugin.handler(), b"h");
        assert_eq!(plugin.schema(), b"s");
    }

    #[test]
    fn test_unexpected_file_any_position() {
        for extra in ["aaa.lua", "extra.lua", "zzz.lua"] {
            let err = classify(files(&[
                ("handler.lua", "h"),
                (extra, "x"),
                ("schema.lua", "s"),
            ]))
            .unwrap_err();
            assert!(matches!(err, FetchError::UnexpectedFile { ref name } if name == extra));
        }
    }

    #[test]
    fn test_missing_schema() {
        let err = classify(files(&[("handler.lua", "h")])).unwrap_err();
        assert!(matches!(err, FetchError::MissingFiles { ref names } if names == &["schema.lua"]));
    }

    #[test]
    fn test_missing_both_in_fixed_order() {
        let err = classify(BTreeMap::new()).unwrap_err();
        assert!(
            matches!(err, FetchError::MissingFiles { ref names } if names == &["handler.lua", "schema.lua"])
        );
    }

    #[test]
    fn test_duplicate_base_name() {
        let err = classify(files(&[
            ("a/handler.lua", "1"),
            ("b/handler.lua", "2"),
            ("schema.lua", "s"),
        ]))
        .unwrap_err();
        assert!(matches!(err, FetchError::DuplicateFile { ref name } if name == "b/handler.lua"));
    }

    #[test]
    fn test_unexpected_reported_before_missing() {
        let err = classify(files(&[("README.md", "docs")])).unwrap_err();
        assert!(matches!(err, FetchError::UnexpectedFile { .. }));
    }
}
