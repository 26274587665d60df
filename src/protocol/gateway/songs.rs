//! Song descriptors from the gateway.
//!
//! The same record shape comes back from three methods, so each gets a
//! transparent wrapper carrying its method name:
//! * [`SongData`] - `song.getData` for a single track
//! * [`AlbumSongs`] - `song.getListByAlbum` for the tracks of an album
//! * [`PlaylistSongs`] - `playlist.getSongs` for the tracks of a playlist

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use super::Method;
use crate::track::{Song, TrackId};

macro_rules! song_wrapper {
    ($(#[$meta:meta])* $name:ident, $method:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Deserialize, Debug)]
        #[serde(transparent)]
        pub struct $name(pub Song);

        impl Method for $name {
            const METHOD: &'static str = $method;
        }

        impl Deref for $name {
            type Target = Song;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$name> for Song {
            fn from(wrapper: $name) -> Self {
                wrapper.0
            }
        }
    };
}

song_wrapper!(
    /// Result of `song.getData`.
    SongData,
    "song.getData"
);
song_wrapper!(
    /// Item of `song.getListByAlbum`.
    AlbumSongs,
    "song.getListByAlbum"
);
song_wrapper!(
    /// Item of `playlist.getSongs`.
    PlaylistSongs,
    "playlist.getSongs"
);

/// Request body of `song.getData`.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct SongRequest {
    #[serde(rename = "sng_id")]
    #[serde_as(as = "DisplayFromStr")]
    pub track_id: TrackId,
}

/// Request body of `song.getListByAlbum`.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct AlbumRequest {
    #[serde(rename = "alb_id")]
    #[serde_as(as = "DisplayFromStr")]
    pub album_id: u64,

    /// Number of items, `-1` for all.
    pub nb: i64,
}

/// Request body of `playlist.getSongs`.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct PlaylistRequest {
    #[serde(rename = "playlist_id")]
    #[serde_as(as = "DisplayFromStr")]
    pub playlist_id: u64,

    /// Number of items, `-1` for all.
    pub nb: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_use_string_ids() {
        let request = AlbumRequest {
            album_id: 302_127,
            nb: -1,
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"alb_id":"302127","nb":-1}"#
        );
    }
}
