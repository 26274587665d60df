//! Streaming fetch of media payloads.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use url::Url;

use crate::error::Result;

/// Chunked byte stream of a download.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// An opened download.
pub struct Download {
    /// Total size in bytes, when the server reports it.
    pub content_length: Option<u64>,

    pub stream: ByteStream,
}

impl Download {
    /// Creates a download over in-memory chunks.
    #[must_use]
    pub fn from_chunks(chunks: Vec<Result<Bytes>>) -> Self {
        let content_length = chunks
            .iter()
            .map(|chunk| chunk.as_ref().map_or(0, |bytes| bytes.len() as u64))
            .sum();
        Self {
            content_length: Some(content_length),
            stream: Box::pin(futures_util::stream::iter(chunks)),
        }
    }
}

/// Opens chunked HTTP streams for track payloads and episode audio.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Opens `url` for streaming.
    ///
    /// Opening confirms that the source is fetchable; a missing source
    /// fails with `NotFound`, a refused one with `RightsDenied`.
    async fn open(&self, url: &Url) -> Result<Download>;
}
