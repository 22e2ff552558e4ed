//! Image manifests as served by the Hub.
//!
//! The registry hands back an arbitrary JSON object.  We keep the whole object around (it is what
//! ends up in the label file) but validate the handful of fields the naming and download logic
//! looks at once, up front, so nothing else has to poke around in untyped JSON.

use serde_json::{Map, Value};
use thiserror::Error;

/// A manifest that could not be turned into a [`Manifest`].
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("response is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("manifest is not a JSON object")]
    NotAnObject,
    #[error("manifest is missing field '{0}'")]
    MissingField(&'static str),
    #[error("manifest field '{field}' should be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Where a manifest came from.  Registry manifests carry a `frozen` key and belong to a
/// collection; Hub manifests don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Hub,
    Registry,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Source::Hub => "Hub",
            Source::Registry => "Registry",
        })
    }
}

/// A validated image manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    raw: Map<String, Value>,
}

fn optional_str<'a>(
    raw: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<&'a str>, ManifestError> {
    match raw.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ManifestError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn nullable_str<'a>(
    raw: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<&'a str>, ManifestError> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ManifestError::WrongType {
            field,
            expected: "a string or null",
        }),
    }
}

impl Manifest {
    /// Decodes a raw response body: UTF-8 first, then JSON, then field validation.
    pub fn from_bytes(body: &[u8]) -> Result<Self, ManifestError> {
        let text = String::from_utf8(body.to_vec())?;
        Self::from_value(serde_json::from_str(&text)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        match value {
            Value::Object(raw) => Self::from_map(raw),
            _ => Err(ManifestError::NotAnObject),
        }
    }

    pub fn from_map(raw: Map<String, Value>) -> Result<Self, ManifestError> {
        match raw.get("name") {
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(ManifestError::WrongType {
                    field: "name",
                    expected: "a string",
                })
            }
            None => return Err(ManifestError::MissingField("name")),
        }
        optional_str(&raw, "branch")?;
        optional_str(&raw, "tag")?;
        optional_str(&raw, "collection")?;
        nullable_str(&raw, "version")?;
        nullable_str(&raw, "image")?;

        Ok(Manifest { raw })
    }

    // The accessors below can't fail: from_map() checked the types already.

    pub fn name(&self) -> &str {
        self.raw.get("name").and_then(Value::as_str).unwrap_or("")
    }

    /// The tag of the image: `branch` for Hub manifests, `tag` for Registry ones.
    pub fn tag(&self) -> Option<&str> {
        match self.raw.get("branch") {
            Some(branch) => branch.as_str(),
            None => self.raw.get("tag").and_then(Value::as_str),
        }
    }

    /// The commit the image was built from, if known.
    pub fn version(&self) -> Option<&str> {
        self.raw.get("version").and_then(Value::as_str)
    }

    /// The download URL, `None` while the image isn't built yet.
    pub fn image(&self) -> Option<&str> {
        self.raw.get("image").and_then(Value::as_str)
    }

    pub fn collection(&self) -> Option<&str> {
        self.raw.get("collection").and_then(Value::as_str)
    }

    pub fn source(&self) -> Source {
        if self.raw.contains_key("frozen") {
            Source::Registry
        } else {
            Source::Hub
        }
    }

    /// The raw JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.raw
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn test_hub_manifest() {
        let manifest = Manifest::from_value(json!({
            "name": "vsoch/hello-world",
            "branch": "master",
            "tag": "ignored",
            "version": "e279432e6d3962777bb7b5e8d54f30f4347d867e",
            "image": "https://example.org/images/hello.img.gz",
            "files": ["Singularity"],
        }))
        .unwrap();

        assert_eq!(manifest.name(), "vsoch/hello-world");
        assert_eq!(manifest.tag(), Some("master"));
        assert_eq!(
            manifest.version(),
            Some("e279432e6d3962777bb7b5e8d54f30f4347d867e")
        );
        assert_eq!(
            manifest.image(),
            Some("https://example.org/images/hello.img.gz")
        );
        assert_eq!(manifest.source(), Source::Hub);
        assert_eq!(manifest.as_map().len(), 6);
    }

    #[test]
    fn test_registry_manifest() {
        let manifest = Manifest::from_value(json!({
            "name": "hello",
            "tag": "latest",
            "collection": "vsoch",
            "frozen": false,
            "version": null,
            "image": null,
        }))
        .unwrap();

        // `frozen` counts by presence, not value
        assert_eq!(manifest.source(), Source::Registry);
        assert_eq!(manifest.tag(), Some("latest"));
        assert_eq!(manifest.collection(), Some("vsoch"));
        assert_eq!(manifest.version(), None);
        assert_eq!(manifest.image(), None);
    }

    #[test]
    fn test_invalid_manifests() {
        assert!(matches!(
            Manifest::from_bytes(b"\xff\xfe"),
            Err(ManifestError::Utf8(_))
        ));
        assert!(matches!(
            Manifest::from_bytes(b"<html>nope</html>"),
            Err(ManifestError::Json(_))
        ));
        assert!(matches!(
            Manifest::from_bytes(b"[1, 2]"),
            Err(ManifestError::NotAnObject)
        ));
        assert!(matches!(
            Manifest::from_bytes(b"{\"branch\": \"master\"}"),
            Err(ManifestError::MissingField("name"))
        ));
        assert!(matches!(
            Manifest::from_value(json!({"name": "x", "image": 12})),
            Err(ManifestError::WrongType { field: "image", .. })
        ));
        assert!(matches!(
            Manifest::from_value(json!({"name": "x", "branch": null})),
            Err(ManifestError::WrongType { field: "branch", .. })
        ));
    }
}
