//! Gateway API types for Deezer's web services.
//!
//! * Session data ([`user_data`])
//! * Song descriptors for single tracks, albums and playlists ([`songs`])
//! * Episode descriptors ([`episodes`])
//!
//! # Response Types
//!
//! The API returns two types of responses:
//! * Paginated lists ([`Response::Paginated`])
//! * Simple results ([`Response::Unpaginated`])
//!
//! Both carry an `error` map, which is empty on success:
//!
//! ```json
//! { "error": {}, "results": { "data": [...], "count": 10, "total": 10, "filtered_count": 0 } }
//! { "error": { "DATA_ERROR": "song_id" }, "results": {} }
//! ```

pub mod episodes;
pub mod songs;
pub mod user_data;

pub use episodes::EpisodeData;
pub use songs::{AlbumSongs, PlaylistSongs, SongData};
pub use user_data::UserData;

use std::collections::HashMap;

use serde::Deserialize;
use serde_with::{serde_as, PickFirst, Seq};

/// Gateway method identifier of a response type.
pub trait Method {
    /// Method name in dot-notation, e.g. `song.getData`.
    const METHOD: &'static str;
}

/// Response from a gateway endpoint.
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Debug)]
#[serde(untagged)]
pub enum Response<T> {
    /// Paginated response with result counts
    Paginated {
        #[serde(default)]
        #[serde_as(as = "PickFirst<(_, Seq<(_, _)>)>")]
        error: HashMap<String, serde_json::Value>,
        results: Paginated<T>,
    },

    /// Direct response with a single item or an array
    Unpaginated {
        #[serde(default)]
        #[serde_as(as = "PickFirst<(_, Seq<(_, _)>)>")]
        error: HashMap<String, serde_json::Value>,
        #[serde_as(as = "serde_with::OneOrMany<_>")]
        results: Vec<T>,
    },

    /// Failed call; the error map explains why
    Failed {
        #[serde_as(as = "PickFirst<(_, Seq<(_, _)>)>")]
        error: HashMap<String, serde_json::Value>,
    },
}

impl<T> Response<T> {
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.all().first()
    }

    #[must_use]
    pub fn all(&self) -> &[T] {
        match self {
            Self::Paginated { results, .. } => &results.data,
            Self::Unpaginated { results, .. } => results,
            Self::Failed { .. } => &[],
        }
    }

    #[must_use]
    pub fn into_all(self) -> Vec<T> {
        match self {
            Self::Paginated { results, .. } => results.data,
            Self::Unpaginated { results, .. } => results,
            Self::Failed { .. } => Vec::new(),
        }
    }

    /// Errors reported by the gateway, if any.
    #[must_use]
    pub fn errors(&self) -> &HashMap<String, serde_json::Value> {
        match self {
            Self::Paginated { error, .. }
            | Self::Unpaginated { error, .. }
            | Self::Failed { error } => error,
        }
    }
}

/// Paginated result set.
#[derive(Clone, PartialEq, Deserialize, Debug)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub filtered_count: u64,
}
