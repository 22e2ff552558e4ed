use crate::error::{Error, Result};

/// The registry used when a reference doesn't name one.
pub const DEFAULT_REGISTRY: &str = "singularity-hub.org";

const URI_PREFIX: &str = "shub://";
const DEFAULT_NAMESPACE: &str = "library";
const DEFAULT_TAG: &str = "latest";

/// A parsed `shub://` image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub namespace: String,
    pub repo_name: String,
    pub repo_tag: String,
}

/// Prepends `https://` to a host that has no scheme and drops any trailing slash.
pub fn add_http(registry: &str) -> String {
    let registry = registry.trim_end_matches('/');
    if registry.starts_with("http://") || registry.starts_with("https://") {
        registry.to_string()
    } else {
        format!("https://{registry}")
    }
}

impl ImageReference {
    /// Parses `[shub://][registry/]namespace/name[:tag]`.
    ///
    /// With three or more path components the first one is the registry and everything between it
    /// and the name is the namespace.  A lone name lives in the `library` namespace.  The tag
    /// defaults to `latest`.
    pub fn parse(image: &str, default_registry: &str) -> Result<Self> {
        let invalid = || Error::InvalidReference(image.to_string());

        let rest = image.strip_prefix(URI_PREFIX).unwrap_or(image);
        let rest = rest.trim_matches('/');

        let (path, repo_name) = match rest.rsplit_once('/') {
            Some((path, name)) => (Some(path), name),
            None => (None, rest),
        };

        let (repo_name, repo_tag) = match repo_name.rsplit_once(':') {
            Some((name, tag)) if !tag.is_empty() => (name, tag),
            Some((name, _)) => (name, DEFAULT_TAG),
            None => (repo_name, DEFAULT_TAG),
        };
        if repo_name.is_empty() {
            return Err(invalid());
        }

        let (registry, namespace) = match path {
            None => (default_registry, DEFAULT_NAMESPACE),
            Some(path) => match path.split_once('/') {
                Some((registry, namespace)) => (registry, namespace),
                None => (default_registry, path),
            },
        };
        if registry.is_empty() || namespace.is_empty() || namespace.split('/').any(str::is_empty) {
            return Err(invalid());
        }

        Ok(ImageReference {
            registry: registry.to_string(),
            namespace: namespace.to_string(),
            repo_name: repo_name.to_string(),
            repo_tag: repo_tag.to_string(),
        })
    }

    /// The URL of this image's manifest in the registry API.
    pub fn manifest_url(&self) -> String {
        format!(
            "{}/api/container/{}/{}:{}",
            add_http(&self.registry),
            self.namespace,
            self.repo_name,
            self.repo_tag
        )
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{URI_PREFIX}{}/{}/{}:{}",
            self.registry, self.namespace, self.repo_name, self.repo_tag
        )
    }
}

#[cfg(test)]
mod test {
    use similar_asserts::assert_eq;

    use super::*;

    fn parse(image: &str) -> ImageReference {
        ImageReference::parse(image, DEFAULT_REGISTRY).unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        assert_eq!(
            parse("shub://vsoch/hello-world"),
            ImageReference {
                registry: DEFAULT_REGISTRY.into(),
                namespace: "vsoch".into(),
                repo_name: "hello-world".into(),
                repo_tag: "latest".into(),
            }
        );
        assert_eq!(parse("hello-world").namespace, "library");
        assert_eq!(parse("vsoch/hello-world:").repo_tag, "latest");
    }

    #[test]
    fn test_parse_registry_and_tag() {
        assert_eq!(
            parse("shub://registry.example.org/collection/sub/hello:v1.0"),
            ImageReference {
                registry: "registry.example.org".into(),
                namespace: "collection/sub".into(),
                repo_name: "hello".into(),
                repo_tag: "v1.0".into(),
            }
        );
        // a port in the registry is not mistaken for a tag
        let image = parse("localhost:8000/vsoch/hello");
        assert_eq!(image.registry, "localhost:8000");
        assert_eq!(image.repo_tag, "latest");
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", "shub://", "shub:///", "vsoch/:tag", "registry//name"] {
            assert!(
                matches!(
                    ImageReference::parse(bad, DEFAULT_REGISTRY),
                    Err(Error::InvalidReference(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_manifest_url() {
        assert_eq!(
            parse("shub://vsoch/hello-world:master").manifest_url(),
            "https://singularity-hub.org/api/container/vsoch/hello-world:master"
        );
        assert_eq!(
            ImageReference::parse("vsoch/hello", "http://localhost:8000/")
                .unwrap()
                .manifest_url(),
            "http://localhost:8000/api/container/vsoch/hello:latest"
        );
    }

    #[test]
    fn test_add_http() {
        assert_eq!(add_http("singularity-hub.org"), "https://singularity-hub.org");
        assert_eq!(add_http("http://example.org/"), "http://example.org");
        assert_eq!(add_http("https://example.org"), "https://example.org");
    }
}
