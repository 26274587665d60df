//! Metadata records of the public catalog API.
//!
//! These mirror the JSON of `api.deezer.com` closely enough for tagging,
//! path templating and cross-catalog matching; everything else is ignored.

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnError};

use crate::track::TrackId;

/// Data list wrapper used by the public API.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Listing<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,

    /// URL of the next page, if the listing is paginated.
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub md5_image: String,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Genre {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

fn readable() -> bool {
    true
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct TrackRecord {
    pub id: TrackId,

    #[serde(default = "readable")]
    pub readable: bool,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub isrc: Option<String>,

    #[serde(default)]
    pub duration: u64,

    #[serde(default)]
    pub track_position: Option<u32>,

    #[serde(default)]
    pub disk_number: Option<u32>,

    #[serde(default)]
    pub release_date: Option<String>,

    #[serde(default)]
    pub explicit_lyrics: bool,

    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub bpm: Option<f64>,

    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub gain: Option<f64>,

    #[serde(default)]
    pub available_countries: Vec<String>,

    #[serde(default)]
    pub contributors: Vec<ArtistRef>,

    #[serde(default)]
    pub artist: ArtistRef,

    #[serde(default)]
    pub album: Option<AlbumRef>,
}

impl TrackRecord {
    /// Names of all credited artists, main artist first.
    #[must_use]
    pub fn artist_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        if !self.artist.name.is_empty() {
            names.push(self.artist.name.clone());
        }
        for contributor in &self.contributors {
            if !names.contains(&contributor.name) && !contributor.name.is_empty() {
                names.push(contributor.name.clone());
            }
        }
        names
    }

    /// Whether the track may be streamed in `market`.
    ///
    /// Records without a country list are considered available.
    #[must_use]
    pub fn is_available_in(&self, market: &str) -> bool {
        self.available_countries.is_empty()
            || self
                .available_countries
                .iter()
                .any(|country| country.eq_ignore_ascii_case(market))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AlbumRecord {
    pub id: u64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub upc: Option<String>,

    #[serde(default)]
    pub md5_image: String,

    #[serde(default)]
    pub genres: Listing<Genre>,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub nb_tracks: u32,

    #[serde(default)]
    pub release_date: Option<String>,

    #[serde(default)]
    pub explicit_lyrics: bool,

    #[serde(default)]
    pub contributors: Vec<ArtistRef>,

    #[serde(default)]
    pub artist: ArtistRef,

    #[serde(default)]
    pub tracks: Listing<TrackRecord>,
}

impl AlbumRecord {
    /// Number of tracks, preferring the declared total.
    #[must_use]
    pub fn total_tracks(&self) -> u32 {
        if self.nb_tracks > 0 {
            self.nb_tracks
        } else {
            u32::try_from(self.tracks.data.len()).unwrap_or(u32::MAX)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PlaylistRecord {
    pub id: u64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub md5_image: String,

    #[serde(default)]
    pub creator: Option<User>,

    #[serde(default)]
    pub tracks: Listing<TrackRecord>,
}
