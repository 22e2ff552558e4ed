//! Error types for the shub client.
//!
//! Every fallible operation returns [`Result<T>`]. A few variants are *fatal*: there is nothing a
//! caller can do to make progress after them (the image does not exist, the registry sent garbage,
//! or the image was never built). The library never exits the process itself; see
//! [`Error::is_fatal`].

use thiserror::Error;

use crate::manifest::ManifestError;

/// Result type alias for operations that may return an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while resolving, naming, downloading or labelling an image.
#[derive(Error, Debug)]
pub enum Error {
    /// The registry answered 404 for the manifest request.
    #[error("Cannot find image. Is your capitalization correct? ({url})")]
    NotFound { url: String },

    /// The manifest body could not be decoded, parsed or validated.
    #[error("Error getting image manifest using url {url}")]
    MalformedManifest {
        url: String,
        #[source]
        source: ManifestError,
    },

    /// The manifest has no download URL yet.
    #[error("{name} is not ready for download\nplease try when build completed or specify tag.")]
    NotReadyForDownload { name: String },

    /// Name-by-hash found no `.{extension}` suffix in the image URL.
    #[error("no match for '.{extension}' in image file name '{basename}'")]
    NoHashMatch { basename: String, extension: String },

    #[error("invalid manifest: {0}")]
    InvalidManifest(#[from] ManifestError),

    #[error("invalid image reference '{0}'")]
    InvalidReference(String),

    /// The label already exists and the write was not forced.
    #[error("label {key} already exists, use force to overwrite")]
    LabelExists { key: String },

    #[error("label file {path} does not contain a JSON object")]
    InvalidLabelFile { path: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid name pattern: {0}")]
    Regex(#[from] regex_automata::meta::BuildError),

    #[error("invalid progress template: {0}")]
    Progress(#[from] indicatif::style::TemplateError),
}

impl Error {
    /// Whether this error should terminate the calling process.
    ///
    /// True for a missing image, an unreadable manifest and an image without a download URL.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::MalformedManifest { .. }
                | Error::NotReadyForDownload { .. }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(Error::NotFound { url: "u".into() }.is_fatal());
        assert!(Error::NotReadyForDownload { name: "n".into() }.is_fatal());
        assert!(Error::MalformedManifest {
            url: "u".into(),
            source: ManifestError::NotAnObject,
        }
        .is_fatal());

        assert!(!Error::NoHashMatch {
            basename: "b".into(),
            extension: "img.gz".into(),
        }
        .is_fatal());
        assert!(!Error::LabelExists { key: "K".into() }.is_fatal());
        assert!(!Error::Io(std::io::ErrorKind::UnexpectedEof.into()).is_fatal());
    }

    #[test]
    fn test_not_ready_message() {
        let msg = Error::NotReadyForDownload {
            name: "vsoch-hello-world-master.img.gz".into(),
        }
        .to_string();
        let lines: Vec<&str> = msg.lines().collect();
        similar_asserts::assert_eq!(
            lines,
            [
                "vsoch-hello-world-master.img.gz is not ready for download",
                "please try when build completed or specify tag.",
            ]
        );
    }
}
