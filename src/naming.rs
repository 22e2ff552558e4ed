//! Deterministic local file names for downloaded images.
//!
//! Four strategies are tried in a fixed order and the first one that applies wins:
//!
//!  1. a custom container name chosen by the user
//!  2. the commit the image was built from (if the manifest knows it)
//!  3. the file name the registry stores the image under
//!  4. `{name}-{tag}`, with a collection prefix for Registry manifests
//!
//! The first three are pure configuration overrides.  Only the last one looks at the shape of the
//! manifest, and only it knows the manifest's [`Source`].

use std::env;

use regex_automata::meta::Regex;

use crate::{
    error::{Error, Result},
    manifest::{Manifest, ManifestError, Source},
};

/// The extension images are named with unless the caller asks for something else.
pub const DEFAULT_EXTENSION: &str = "img.gz";

/// User choices that override the default `{name}-{tag}` naming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingConfig {
    /// Use this name (minus spaces and image extensions) for every image.
    pub container_name: Option<String>,
    /// Name images after the commit they were built from.
    pub name_by_commit: bool,
    /// Name images after the file name in the download URL.
    pub name_by_hash: bool,
}

impl NamingConfig {
    /// Reads `SHUB_CONTAINERNAME`, `SHUB_NAMEBYCOMMIT` and `SHUB_NAMEBYHASH`.
    ///
    /// The flags are on whenever the variable is set, whatever its value.
    pub fn from_env() -> Self {
        NamingConfig {
            container_name: env::var("SHUB_CONTAINERNAME").ok(),
            name_by_commit: env::var_os("SHUB_NAMEBYCOMMIT").is_some(),
            name_by_hash: env::var_os("SHUB_NAMEBYHASH").is_some(),
        }
    }
}

/// Which naming rule produced an [`ImageName`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Custom,
    Commit,
    Hash,
    Default(Source),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    pub file_name: String,
    pub strategy: Strategy,
}

impl ImageName {
    /// The line shown to the user once a name has been picked.
    pub fn notice(&self) -> String {
        match self.strategy {
            Strategy::Default(source) => format!("Singularity {source} Image: {}", self.file_name),
            _ => format!("Singularity Image: {}", self.file_name),
        }
    }
}

fn custom_name(name: &str, extension: &str) -> String {
    let mut name = name.to_string();
    for pattern in [" ", ".gz", ".img"] {
        name = name.replace(pattern, "");
    }
    format!("{name}.{extension}")
}

/// The longest prefix of the URL's (percent-decoded) basename that ends in `.{extension}`.
///
/// Escapes that don't decode to UTF-8 become U+FFFD.
fn hash_name(url: &str, extension: &str) -> Result<String> {
    let decoded = urlencoding::decode_binary(url.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);
    let basename = match decoded.rsplit_once('/') {
        Some((_, basename)) => basename,
        None => &*decoded,
    };

    let regex = Regex::new(&format!(".+[.]{}", regex_syntax::escape(extension)))?;
    match regex.find(basename) {
        Some(found) => Ok(basename[found.range()].to_string()),
        None => Err(Error::NoHashMatch {
            basename: basename.to_string(),
            extension: extension.to_string(),
        }),
    }
}

fn default_name(manifest: &Manifest, extension: &str) -> Result<(String, Source)> {
    let tag = manifest.tag().ok_or(ManifestError::MissingField("tag"))?;

    let source = manifest.source();
    let name = match source {
        Source::Registry => {
            let collection = manifest
                .collection()
                .ok_or(ManifestError::MissingField("collection"))?;
            format!("{collection}-{}", manifest.name())
        }
        Source::Hub => manifest.name().to_string(),
    };

    Ok((
        format!(
            "{}-{}.{extension}",
            name.replace('/', "-"),
            tag.replace('/', "-")
        ),
        source,
    ))
}

/// Picks the local file name for the image described by `manifest`.
pub fn derive_name(
    manifest: &Manifest,
    extension: &str,
    config: &NamingConfig,
) -> Result<ImageName> {
    let (file_name, strategy) = if let Some(name) = &config.container_name {
        (custom_name(name, extension), Strategy::Custom)
    } else if let (true, Some(version)) = (config.name_by_commit, manifest.version()) {
        (format!("{version}.{extension}"), Strategy::Commit)
    } else if config.name_by_hash {
        let url = manifest.image().ok_or_else(|| Error::NotReadyForDownload {
            name: manifest.name().to_string(),
        })?;
        (hash_name(url, extension)?, Strategy::Hash)
    } else {
        let (name, source) = default_name(manifest, extension)?;
        (name, Strategy::Default(source))
    };

    Ok(ImageName {
        file_name,
        strategy,
    })
}
