//! Track and episode descriptors from the gateway.
//!
//! A [`Descriptor`] is the opaque provider record the resolver and the
//! engine work from: identifiers, resolution token, sizes per quality and
//! encryption parameters. It is fetched once per attempt and never mutated.
//!
//! A descriptor is either a song or an episode:
//! * Songs are encrypted and resolved through the media URL API
//! * Episodes stream directly from `EPISODE_DIRECT_STREAM_URL`

use std::fmt;

use serde::Deserialize;
use serde_with::{serde_as, DefaultOnError, DisplayFromStr, PickFirst};
use veil::Redact;

use crate::quality::QualityTier;

/// Provider identifier of a track, album, playlist or episode.
pub type TrackId = u64;

/// Gateway record of a song.
#[serde_as]
#[derive(Clone, Default, PartialEq, Deserialize, Redact)]
pub struct Song {
    #[serde(rename = "SNG_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: TrackId,

    #[serde(default, rename = "SNG_TITLE")]
    pub title: String,

    #[serde(default, rename = "VERSION")]
    pub version: String,

    #[serde(default, rename = "ART_NAME")]
    pub artist: String,

    #[serde(default, rename = "ALB_TITLE")]
    pub album_title: String,

    #[serde(default, rename = "ALB_PICTURE")]
    pub album_cover: String,

    #[serde(default, rename = "DURATION")]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub duration: u64,

    #[serde(default, rename = "TRACK_TOKEN")]
    #[redact]
    pub track_token: String,

    #[serde(default, rename = "MD5_ORIGIN")]
    pub md5_origin: String,

    #[serde(default, rename = "MEDIA_VERSION")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub media_version: Option<u32>,

    #[serde(default, rename = "FILESIZE_FLAC")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub filesize_flac: Option<u64>,

    #[serde(default, rename = "FILESIZE_MP3_320")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub filesize_mp3_320: Option<u64>,

    #[serde(default, rename = "FILESIZE_MP3_128")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub filesize_mp3_128: Option<u64>,

    #[serde(default, rename = "MEDIA_KEY")]
    #[redact]
    pub media_key: Option<String>,

    #[serde(default, rename = "MEDIA_NONCE")]
    #[redact]
    pub media_nonce: Option<String>,

    #[serde(default, rename = "ISRC")]
    pub isrc: Option<String>,

    #[serde(default, rename = "EXPLICIT_LYRICS")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub explicit_lyrics: Option<u8>,

    #[serde(default, rename = "GAIN")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub gain: Option<f64>,

    #[serde(default, rename = "TRACK_NUMBER")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub track_number: Option<u32>,

    #[serde(default, rename = "DISK_NUMBER")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub disk_number: Option<u32>,

    #[serde(default, rename = "FALLBACK")]
    pub fallback: Option<Box<Fallback>>,
}

/// Alternate record the provider offers for an unavailable song.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Fallback {
    #[serde(rename = "SNG_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: TrackId,
}

/// Gateway record of a podcast episode.
#[serde_as]
#[derive(Clone, Default, PartialEq, Deserialize, Redact)]
pub struct Episode {
    #[serde(rename = "EPISODE_ID")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: TrackId,

    #[serde(default, rename = "EPISODE_TITLE")]
    pub title: String,

    #[serde(default, rename = "EPISODE_DESCRIPTION")]
    pub description: String,

    #[serde(default, rename = "SHOW_NAME")]
    pub show: String,

    #[serde(default, rename = "SHOW_ART_MD5")]
    pub show_cover: String,

    #[serde(default, rename = "DURATION")]
    #[serde_as(as = "DefaultOnError<PickFirst<(_, DisplayFromStr)>>")]
    pub duration: u64,

    #[serde(default, rename = "EPISODE_PUBLISHED_TIMESTAMP")]
    pub published: String,

    #[serde(default, rename = "SHOW_IS_EXPLICIT")]
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    pub explicit: Option<u8>,

    #[serde(default, rename = "EPISODE_DIRECT_STREAM_URL")]
    #[redact]
    pub direct_stream_url: String,

    #[serde(default, rename = "TRACK_TOKEN")]
    #[redact]
    pub track_token: String,
}

/// How the payload of a track is encrypted.
#[derive(Clone, PartialEq, Eq, Redact)]
pub enum Encryption {
    /// Plain stream
    None,
    /// Blowfish CBC stripe, key derived from the track id
    Blowfish {
        md5_origin: String,
        media_version: u32,
    },
    /// AES-CTR with per-track key material
    Aes {
        #[redact]
        key: String,
        #[redact]
        nonce: String,
    },
}

/// Encryption family, recorded on the item for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionType {
    None,
    Blowfish,
    Aes,
}

impl fmt::Display for EncryptionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Blowfish => "blowfish",
            Self::Aes => "aes",
        };
        write!(f, "{name}")
    }
}

impl Encryption {
    #[must_use]
    pub fn kind(&self) -> EncryptionType {
        match self {
            Self::None => EncryptionType::None,
            Self::Blowfish { .. } => EncryptionType::Blowfish,
            Self::Aes { .. } => EncryptionType::Aes,
        }
    }
}

/// A track or episode as described by the gateway.
#[derive(Clone, PartialEq, Debug)]
pub enum Descriptor {
    Song(Song),
    Episode(Episode),
}

impl Descriptor {
    #[must_use]
    pub fn id(&self) -> TrackId {
        match self {
            Self::Song(song) => song.id,
            Self::Episode(episode) => episode.id,
        }
    }

    #[must_use]
    pub fn is_episode(&self) -> bool {
        matches!(self, Self::Episode(_))
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Song(song) => &song.title,
            Self::Episode(episode) => &episode.title,
        }
    }

    /// Opaque token submitted to the media URL API.
    #[must_use]
    pub fn track_token(&self) -> &str {
        match self {
            Self::Song(song) => &song.track_token,
            Self::Episode(episode) => &episode.track_token,
        }
    }

    /// Reported size in bytes at `tier`, if the provider says.
    #[must_use]
    pub fn size(&self, tier: QualityTier) -> Option<u64> {
        match self {
            Self::Song(song) => match tier {
                QualityTier::FLAC => song.filesize_flac,
                QualityTier::MP3_320 => song.filesize_mp3_320,
                QualityTier::MP3_128 => song.filesize_mp3_128,
            },
            Self::Episode(_) => None,
        }
    }

    /// Encryption parameters, selected by the presence of AES key material.
    #[must_use]
    pub fn encryption(&self) -> Encryption {
        match self {
            Self::Episode(_) => Encryption::None,
            Self::Song(song) => match (&song.media_key, &song.media_nonce) {
                (Some(key), Some(nonce)) if !key.is_empty() && !nonce.is_empty() => {
                    Encryption::Aes {
                        key: key.clone(),
                        nonce: nonce.clone(),
                    }
                }
                _ => Encryption::Blowfish {
                    md5_origin: song.md5_origin.clone(),
                    media_version: song.media_version.unwrap_or(1),
                },
            },
        }
    }

    #[must_use]
    pub fn track_number(&self) -> Option<u32> {
        match self {
            Self::Song(song) => song.track_number.filter(|number| *number > 0),
            Self::Episode(_) => None,
        }
    }

    #[must_use]
    pub fn disc_number(&self) -> Option<u32> {
        match self {
            Self::Song(song) => song.disk_number.filter(|number| *number > 0),
            Self::Episode(_) => None,
        }
    }

    #[must_use]
    pub fn isrc(&self) -> Option<&str> {
        match self {
            Self::Song(song) => song.isrc.as_deref().filter(|isrc| !isrc.is_empty()),
            Self::Episode(_) => None,
        }
    }

    #[must_use]
    pub fn explicit(&self) -> Option<bool> {
        match self {
            Self::Song(song) => song.explicit_lyrics.map(|flag| flag > 0),
            Self::Episode(episode) => episode.explicit.map(|flag| flag > 0),
        }
    }

    /// Replay gain in dB.
    #[must_use]
    pub fn gain(&self) -> Option<f64> {
        match self {
            Self::Song(song) => song.gain,
            Self::Episode(_) => None,
        }
    }

    /// Picture hash of the album cover or show artwork.
    #[must_use]
    pub fn cover_md5(&self) -> Option<&str> {
        let md5 = match self {
            Self::Song(song) => &song.album_cover,
            Self::Episode(episode) => &episode.show_cover,
        };
        Some(md5.as_str()).filter(|md5| !md5.is_empty())
    }

    /// Alternate track id offered when this one is unavailable.
    #[must_use]
    pub fn fallback_id(&self) -> Option<TrackId> {
        match self {
            Self::Song(song) => song.fallback.as_ref().map(|fallback| fallback.id),
            Self::Episode(_) => None,
        }
    }
}

impl From<Song> for Descriptor {
    fn from(song: Song) -> Self {
        Self::Song(song)
    }
}

impl From<Episode> for Descriptor {
    fn from(episode: Episode) -> Self {
        Self::Episode(episode)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Song(song) => write!(f, "{}: \"{} - {}\"", song.id, song.artist, song.title),
            Self::Episode(episode) => {
                write!(f, "{}: \"{} - {}\"", episode.id, episode.show, episode.title)
            }
        }
    }
}
