//! The Hub client: manifest lookup, download and labelling.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{
    download::{clean_up, decompressed_path, download_atomically, gunzip},
    error::{Error, Result},
    labels::LabelStore,
    manifest::Manifest,
    metadata::extract_metadata,
    naming::{derive_name, NamingConfig, DEFAULT_EXTENSION},
    reference::ImageReference,
    transport::{HttpTransport, Transport},
};

/// Where a downloaded image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub local_path: PathBuf,
    /// Whether `local_path` is the decompressed image.  False if extraction wasn't asked for, or
    /// if it failed (in which case nothing is left on disk).
    pub extracted: bool,
}

/// Options for [`ShubClient::pull`].
#[derive(Default)]
pub struct PullOptions<'a> {
    /// Use this file name instead of deriving one from the manifest.
    pub image_name: Option<String>,
    pub download_folder: Option<PathBuf>,
    /// Leave the image gzip-compressed.
    pub no_extract: bool,
    /// Save the manifest's metadata here.
    pub labels: Option<&'a mut dyn LabelStore>,
    pub prefix: Option<String>,
}

pub struct ShubClient<T = HttpTransport> {
    transport: T,
    naming: NamingConfig,
    quiet: bool,
    gzip: OsString,
}

impl ShubClient<HttpTransport> {
    /// A client talking HTTP, with naming overrides taken from the environment.
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new()).naming(NamingConfig::from_env())
    }
}

impl Default for ShubClient<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> ShubClient<T> {
    pub fn with_transport(transport: T) -> Self {
        ShubClient {
            transport,
            naming: NamingConfig::default(),
            quiet: false,
            gzip: "gzip".into(),
        }
    }

    pub fn naming(mut self, naming: NamingConfig) -> Self {
        self.naming = naming;
        self
    }

    /// Suppresses notices and progress bars.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// The gzip-compatible program used to decompress images.
    pub fn gzip_program(mut self, program: impl Into<OsString>) -> Self {
        self.gzip = program.into();
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn notice(&self, message: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", message.as_ref());
        }
    }

    /// Fetches the manifest for `image`.
    ///
    /// A 404 is [`Error::NotFound`]; anything that doesn't decode to a manifest is
    /// [`Error::MalformedManifest`].  Both are fatal.
    pub async fn get_manifest(&self, image: &ImageReference) -> Result<Manifest> {
        let url = image.manifest_url();
        let response = self.transport.get(&url).await?;

        if response.status == 404 {
            return Err(Error::NotFound { url });
        }

        Manifest::from_bytes(&response.body).map_err(|source| {
            log::debug!("manifest from {url} (status {}): {source}", response.status);
            Error::MalformedManifest { url, source }
        })
    }

    /// The local file name for `manifest` according to this client's naming configuration.
    pub fn image_name(&self, manifest: &Manifest, extension: &str) -> Result<String> {
        let name = derive_name(manifest, extension, &self.naming)?;
        self.notice(name.notice());
        Ok(name.file_name)
    }

    /// Downloads the image described by `manifest`.
    ///
    /// The file is named by [`Self::image_name`] unless `image_name` is given, always ends in
    /// `.gz`, and lands in `download_folder` (or the current directory).  With `extract`, it is
    /// decompressed in place; if that fails, both the compressed and decompressed files are removed
    /// and the result says `extracted: false`.
    ///
    /// An image without a download URL is [`Error::NotReadyForDownload`], which is fatal.  Errors
    /// from the transfer itself are returned as-is and leave nothing at the destination.
    pub async fn download_image(
        &self,
        manifest: &Manifest,
        image_name: Option<&str>,
        download_folder: Option<&Path>,
        extract: bool,
    ) -> Result<DownloadResult> {
        let mut image_name = match image_name {
            Some(name) => name.to_string(),
            None => self.image_name(manifest, DEFAULT_EXTENSION)?,
        };

        match manifest.tag() {
            Some(tag) => self.notice(format!("Found image {}:{tag}", manifest.name())),
            None => self.notice(format!("Found image {}", manifest.name())),
        }
        self.notice(format!("Downloading image... {image_name}"));

        let Some(url) = manifest.image() else {
            return Err(Error::NotReadyForDownload { name: image_name });
        };

        if !image_name.ends_with(".gz") {
            image_name.push_str(".gz");
        }

        let path = match download_folder {
            Some(folder) => folder.join(&image_name),
            None => PathBuf::from(&image_name),
        };

        let download = self.transport.open(url).await?;
        let image_file =
            download_atomically(download.body, download.length, &path, !self.quiet).await?;

        if !extract {
            return Ok(DownloadResult {
                local_path: image_file,
                extracted: false,
            });
        }

        self.notice(format!("Decompressing {}", image_file.display()));
        let extracted = gunzip(&self.gzip, &image_file).await;
        let local_path = decompressed_path(&image_file);

        if !extracted {
            log::error!("Error extracting image, cleaning up.");
            clean_up(&[&local_path, &image_file]);
        }

        Ok(DownloadResult {
            local_path,
            extracted,
        })
    }

    /// Resolves `image`, downloads it, and saves its metadata if asked to.
    pub async fn pull(
        &self,
        image: &ImageReference,
        options: PullOptions<'_>,
    ) -> Result<DownloadResult> {
        let manifest = self.get_manifest(image).await?;

        let result = self
            .download_image(
                &manifest,
                options.image_name.as_deref(),
                options.download_folder.as_deref(),
                !options.no_extract,
            )
            .await?;

        let artifact_exists = result.extracted || options.no_extract;
        if let (Some(labels), true) = (options.labels, artifact_exists) {
            extract_metadata(&manifest, Some(labels), options.prefix.as_deref())?;
        }

        Ok(result)
    }
}
