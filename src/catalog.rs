//! Collaborator seams towards the providers.
//!
//! * [`Catalog`]: public metadata of the download provider
//! * [`MediaApi`]: private gateway with descriptors and media URLs
//! * [`SourceCatalog`]: a second provider whose links are mapped onto the
//!   download provider by ISRC/UPC

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    error::Result,
    metadata::{AlbumRecord, PlaylistRecord, TrackRecord},
    protocol::media,
    quality::QualityTier,
    track::{Descriptor, TrackId},
};

/// Lookup key for catalog records.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Query {
    Id(u64),
    Isrc(String),
    Upc(String),
}

impl fmt::Display for Query {
    /// Renders the path segment of the public API: `123`, `isrc:<code>`
    /// or `upc:<code>`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Isrc(isrc) => write!(f, "isrc:{isrc}"),
            Self::Upc(upc) => write!(f, "upc:{upc}"),
        }
    }
}

/// Public metadata API.
///
/// Lookups that find nothing fail with `NotFound`; records that exist but
/// cannot be streamed fail with `MarketUnavailable`.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn track(&self, query: &Query) -> Result<TrackRecord>;

    async fn album(&self, query: &Query) -> Result<AlbumRecord>;

    async fn playlist(&self, id: u64) -> Result<PlaylistRecord>;

    /// Most popular tracks of an artist.
    async fn artist_top(&self, id: u64) -> Result<Vec<TrackRecord>>;

    /// Artwork for a picture hash, as JPEG.
    async fn cover(&self, md5: &str, size: u32) -> Result<Bytes>;
}

/// Private gateway API.
#[async_trait]
pub trait MediaApi: Send + Sync {
    async fn song(&self, id: TrackId) -> Result<Descriptor>;

    /// Descriptors of an album in album order.
    async fn album_songs(&self, id: u64) -> Result<Vec<Descriptor>>;

    /// Descriptors of a playlist in playlist order.
    async fn playlist_songs(&self, id: u64) -> Result<Vec<Descriptor>>;

    async fn episode(&self, id: TrackId) -> Result<Descriptor>;

    /// Resolves media URLs for up to 25 tokens, one result per token.
    ///
    /// # Errors
    ///
    /// `RightsDenied` when the whole batch is refused.
    async fn media_urls(&self, tokens: &[String], tier: QualityTier) -> Result<Vec<media::Data>>;
}

/// Track of the source provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub isrc: Option<String>,
}

/// Album of the source provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceAlbum {
    pub id: String,
    pub title: String,
    pub upc: Option<String>,
    pub total_tracks: u32,
    pub track_ids: Vec<String>,
}

/// Playlist of the source provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourcePlaylist {
    pub id: String,
    pub title: String,
    pub owner: String,
    pub track_ids: Vec<String>,
}

/// The provider whose links are mapped from.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    async fn track(&self, id: &str) -> Result<SourceTrack>;

    async fn album(&self, id: &str) -> Result<SourceAlbum>;

    async fn playlist(&self, id: &str) -> Result<SourcePlaylist>;

    /// Tracks matching a search query like `track:{song} artist:{artist}`,
    /// best match first.
    async fn search(&self, query: &str) -> Result<Vec<SourceTrack>>;
}
