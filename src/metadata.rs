use serde_json::{Map, Value};

use crate::{error::Result, labels::LabelStore, manifest::Manifest};

/// Manifest fields that are too big (or too uninteresting) to keep as labels.
const REMOVE_FIELDS: [&str; 3] = ["files", "spec", "metrics"];

/// Copies the labelable parts of `manifest` and, if given a label store, saves them there too.
///
/// Keys are saved as `{PREFIX}{key}` (the prefix is upper-cased) and always overwrite what's in
/// the store already.  The manifest itself is not modified.
pub fn extract_metadata(
    manifest: &Manifest,
    labels: Option<&mut dyn LabelStore>,
    prefix: Option<&str>,
) -> Result<Map<String, Value>> {
    let prefix = prefix.unwrap_or_default().to_uppercase();
    let source = manifest.source();

    let mut metadata = manifest.as_map().clone();
    for field in REMOVE_FIELDS {
        metadata.shift_remove(field);
    }

    if let Some(labels) = labels {
        for (key, value) in &metadata {
            labels.add(&format!("{prefix}{key}"), value, true)?;
        }
        log::info!(
            "Saving Singularity {source} metadata to {}",
            labels.describe()
        );
    }

    Ok(metadata)
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;
    use crate::labels::JsonLabelFile;

    /// Remembers every write, in order.
    #[derive(Default)]
    struct RecordingStore {
        writes: Vec<(String, Value, bool)>,
    }

    impl LabelStore for RecordingStore {
        fn add(&mut self, key: &str, value: &Value, force: bool) -> Result<Value> {
            self.writes.push((key.to_string(), value.clone(), force));
            Ok(value.clone())
        }

        fn describe(&self) -> String {
            "memory".into()
        }
    }

    fn manifest() -> Manifest {
        Manifest::from_value(json!({
            "name": "vsoch/hello-world",
            "branch": "master",
            "files": ["Singularity", "README.md"],
            "spec": "Bootstrap: docker\nFrom: ubuntu",
            "metrics": {"size": 1234},
            "version": null,
            "custom": {"nested": true},
        }))
        .unwrap()
    }

    #[test]
    fn test_filters_fields() {
        let manifest = manifest();
        let before = manifest.clone();

        let metadata = extract_metadata(&manifest, None, None).unwrap();
        let keys: Vec<&str> = metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "branch", "version", "custom"]);

        // the input is untouched
        assert_eq!(manifest, before);
        assert_eq!(manifest.as_map().len(), 7);
    }

    #[test]
    fn test_prefixed_labels() {
        let mut store = RecordingStore::default();
        let metadata = extract_metadata(&manifest(), Some(&mut store), Some("meta")).unwrap();

        assert_eq!(
            store.writes,
            [
                ("METAname".to_string(), json!("vsoch/hello-world"), true),
                ("METAbranch".to_string(), json!("master"), true),
                ("METAversion".to_string(), json!(null), true),
                ("METAcustom".to_string(), json!({"nested": true}), true),
            ]
        );
        // the returned copy has the original keys
        assert!(metadata.contains_key("name"));
    }

    #[test]
    fn test_label_file_last_write_wins() {
        let td = crate::test::tempdir();
        let mut labels = JsonLabelFile::new(td.path().join("labels.json"));

        extract_metadata(&manifest(), Some(&mut labels), None).unwrap();
        let newer = Manifest::from_value(json!({"name": "vsoch/hello-world", "branch": "dev"}))
            .unwrap();
        extract_metadata(&newer, Some(&mut labels), None).unwrap();

        let stored = labels.load().unwrap();
        assert_eq!(stored["branch"], json!("dev"));
        assert_eq!(stored["custom"], json!({"nested": true}));
        assert!(!stored.contains_key("files"));
    }
}
