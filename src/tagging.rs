//! Audio metadata and tag writing.
//!
//! [`Tags`] is built from catalog records, enhanced with what only the
//! gateway knows (ISRC, explicit flag, replay gain), and written through a
//! [`Tagger`]. [`LoftyTagger`] writes ID3v2, Vorbis comments and MP4 atoms
//! through `lofty`, whichever the file format calls for.

use std::path::Path;

use bytes::Bytes;
use lofty::{
    config::WriteOptions,
    file::{AudioFile, TaggedFileExt},
    picture::{MimeType, Picture, PictureType},
    probe::Probe,
    tag::{Accessor, ItemKey, Tag, TagExt},
};

use crate::{
    error::Result,
    metadata::{AlbumRecord, TrackRecord},
    track::{Descriptor, Episode, Song},
};

/// Metadata of one downloaded file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tags {
    pub title: String,
    pub artists: Vec<String>,
    pub album: String,
    pub album_artist: String,
    pub track_number: Option<u32>,
    pub total_tracks: Option<u32>,
    pub disc_number: Option<u32>,

    /// Release date as `YYYY-MM-DD`, or a prefix of it.
    pub date: Option<String>,

    pub genres: Vec<String>,
    pub isrc: Option<String>,
    pub upc: Option<String>,
    pub label: Option<String>,
    pub explicit: Option<bool>,

    /// Duration in seconds.
    pub duration: u64,

    pub bpm: Option<f64>,

    /// Replay gain in dB.
    pub gain: Option<f64>,

    /// Front cover as JPEG.
    pub cover: Option<Bytes>,
}

impl Tags {
    /// Tags of a track from the public catalog.
    #[must_use]
    pub fn from_track(track: &TrackRecord) -> Self {
        let album = track.album.as_ref();
        Self {
            title: track.title.clone(),
            artists: track.artist_names(),
            album: album.map(|album| album.title.clone()).unwrap_or_default(),
            album_artist: track.artist.name.clone(),
            track_number: track.track_position,
            disc_number: track.disk_number,
            date: track
                .release_date
                .clone()
                .or_else(|| album.and_then(|album| album.release_date.clone())),
            isrc: track.isrc.clone(),
            explicit: Some(track.explicit_lyrics),
            duration: track.duration,
            bpm: track.bpm.filter(|bpm| *bpm > 0.0),
            gain: track.gain,
            ..Self::default()
        }
    }

    /// Fills in the album-level fields of an album download.
    #[must_use]
    pub fn with_album(mut self, album: &AlbumRecord) -> Self {
        self.album.clone_from(&album.title);
        if !album.artist.name.is_empty() {
            self.album_artist.clone_from(&album.artist.name);
        }
        self.total_tracks = Some(album.total_tracks());
        if album.release_date.is_some() {
            self.date.clone_from(&album.release_date);
        }
        self.genres = album
            .genres
            .data
            .iter()
            .map(|genre| genre.name.clone())
            .collect();
        self.upc.clone_from(&album.upc);
        self.label.clone_from(&album.label);
        self
    }

    /// Tags from a gateway song, for when no catalog record is available.
    #[must_use]
    pub fn from_song(song: &Song) -> Self {
        let title = if song.version.is_empty() {
            song.title.clone()
        } else {
            format!("{} {}", song.title, song.version)
        };
        Self {
            title,
            artists: vec![song.artist.clone()],
            album: song.album_title.clone(),
            album_artist: song.artist.clone(),
            duration: song.duration,
            ..Self::default()
        }
    }

    /// Tags of a podcast episode; the show stands in for artist and album.
    #[must_use]
    pub fn from_episode(episode: &Episode) -> Self {
        Self {
            title: episode.title.clone(),
            artists: vec![episode.show.clone()],
            album: episode.show.clone(),
            album_artist: episode.show.clone(),
            date: Some(episode.published.chars().take(10).collect::<String>())
                .filter(|date| !date.is_empty()),
            explicit: episode.explicit.map(|flag| flag > 0),
            duration: episode.duration,
            ..Self::default()
        }
    }

    /// Merges what the gateway knows beyond the public catalog.
    pub fn enhance(&mut self, descriptor: &Descriptor) {
        if let Some(isrc) = descriptor.isrc() {
            self.isrc = Some(isrc.to_owned());
        }
        if let Some(explicit) = descriptor.explicit() {
            self.explicit = Some(explicit);
        }
        if let Some(gain) = descriptor.gain() {
            self.gain = Some(gain);
        }
        if self.track_number.is_none() {
            self.track_number = descriptor.track_number();
        }
        if self.disc_number.is_none() {
            self.disc_number = descriptor.disc_number();
        }
        if self.title.is_empty() {
            self.title = descriptor.title().to_owned();
        }
    }

    /// All artists, separated for display.
    #[must_use]
    pub fn artist(&self) -> String {
        self.artists.join("; ")
    }

    #[must_use]
    pub fn year(&self) -> Option<&str> {
        self.date
            .as_deref()
            .and_then(|date| date.get(..4))
            .filter(|year| year.chars().all(|c| c.is_ascii_digit()))
    }
}

/// Writes and reads file tags.
pub trait Tagger: Send + Sync {
    /// Replaces the tags of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or written.
    fn write(&self, path: &Path, tags: &Tags) -> Result<()>;

    /// Title and album of the file at `path`, if it is tagged.
    fn read_identity(&self, path: &Path) -> Option<(String, String)>;
}

/// Tagger backed by `lofty`.
#[derive(Copy, Clone, Debug, Default)]
pub struct LoftyTagger;

impl LoftyTagger {
    fn fill(tag: &mut Tag, tags: &Tags) {
        tag.set_title(tags.title.clone());
        tag.set_artist(tags.artist());
        tag.set_album(tags.album.clone());
        if !tags.album_artist.is_empty() {
            tag.insert_text(ItemKey::AlbumArtist, tags.album_artist.clone());
        }

        if let Some(number) = tags.track_number {
            tag.set_track(number);
        }
        if let Some(total) = tags.total_tracks {
            tag.set_track_total(total);
        }
        if let Some(disc) = tags.disc_number {
            tag.set_disk(disc);
        }

        if let Some(date) = &tags.date {
            tag.insert_text(ItemKey::RecordingDate, date.clone());
        }
        if let Some(year) = tags.year() {
            tag.insert_text(ItemKey::Year, year.to_owned());
        }
        if !tags.genres.is_empty() {
            tag.set_genre(tags.genres.join("; "));
        }

        let optional = [
            (ItemKey::Isrc, tags.isrc.clone()),
            (ItemKey::Barcode, tags.upc.clone()),
            (ItemKey::Label, tags.label.clone()),
            (
                ItemKey::ParentalAdvisory,
                tags.explicit.map(|explicit| u8::from(explicit).to_string()),
            ),
            (ItemKey::Bpm, tags.bpm.map(|bpm| format!("{bpm:.0}"))),
            (
                ItemKey::ReplayGainTrackGain,
                tags.gain.map(|gain| format!("{gain:.2} dB")),
            ),
        ];
        for (key, value) in optional {
            if let Some(value) = value.filter(|value| !value.is_empty()) {
                tag.insert_text(key, value);
            }
        }

        if let Some(cover) = &tags.cover {
            tag.remove_picture_type(PictureType::CoverFront);
            tag.push_picture(Picture::new_unchecked(
                PictureType::CoverFront,
                Some(MimeType::Jpeg),
                None,
                cover.to_vec(),
            ));
        }
    }
}

impl Tagger for LoftyTagger {
    fn write(&self, path: &Path, tags: &Tags) -> Result<()> {
        let tagged_file = Probe::open(path)?.read()?;
        let tag_type = tagged_file.primary_tag_type();

        let mut tag = tagged_file
            .tag(tag_type)
            .cloned()
            .unwrap_or_else(|| Tag::new(tag_type));
        Self::fill(&mut tag, tags);

        tag.save_to_path(path, WriteOptions::default())?;

        trace!(
            "tagged {} ({:?}, {}s)",
            path.display(),
            tag_type,
            tagged_file.properties().duration().as_secs()
        );
        Ok(())
    }

    fn read_identity(&self, path: &Path) -> Option<(String, String)> {
        let tagged_file = Probe::open(path).ok()?.read().ok()?;
        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())?;
        Some((tag.title()?.into_owned(), tag.album()?.into_owned()))
    }
}
