//! A client for pulling Singularity images from Singularity Hub and compatible registries.
//!
//! Pulling an image takes four steps:
//!
//!  - [`ShubClient::get_manifest`] asks the registry about an [`ImageReference`]
//!  - [`naming::derive_name`] decides what the image is called locally
//!  - [`ShubClient::download_image`] streams it to disk atomically and decompresses it
//!  - [`metadata::extract_metadata`] records the manifest in a [`labels::LabelStore`]
//!
//! [`ShubClient::pull`] does all of them in a row.

pub mod client;
pub mod download;
pub mod error;
pub mod labels;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod reference;
pub mod transport;


pub use client::{DownloadResult, PullOptions, ShubClient};
pub use error::{Error, Result};
pub use manifest::Manifest;
pub use reference::ImageReference;
