//! The HTTP side of the client.
//!
//! Everything that touches the network goes through [`Transport`] so that the rest of the crate
//! can be exercised against canned responses.

use std::{io, pin::Pin};

use futures_util::TryStreamExt;
use reqwest::Client;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::error::Result;

/// A response body that is consumed incrementally.
pub type Body = Pin<Box<dyn AsyncRead + Send>>;

/// A buffered response: the manifest endpoint only ever returns small JSON documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

/// A response whose body has not been read yet.
pub struct Download {
    /// The Content-Length, if the server sent one.
    pub length: Option<u64>,
    pub body: Body,
}

#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Performs a GET and returns the status with the full body, whatever the status is.
    async fn get(&self, url: &str) -> Result<Response>;

    /// Starts a GET whose body is going to be streamed.  Non-success statuses are errors.
    async fn open(&self, url: &str) -> Result<Download>;
}

/// [`Transport`] on top of a reqwest [`Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        HttpTransport { client }
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        log::debug!("GET {url}: {status}, {} bytes", body.len());
        Ok(Response { status, body })
    }

    async fn open(&self, url: &str) -> Result<Download> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let length = response.content_length();
        log::debug!("streaming {url} ({length:?} bytes)");
        let stream = response.bytes_stream().map_err(io::Error::other);
        Ok(Download {
            length,
            body: Box::pin(StreamReader::new(stream)),
        })
    }
}
