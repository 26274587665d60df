//! In-memory collaborators for integration tests.
#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use deezload::{
    catalog::{
        Catalog, MediaApi, Query, SourceAlbum, SourceCatalog, SourcePlaylist, SourceTrack,
    },
    config::Secrets,
    convert::{ConversionTarget, Converter},
    downloader::{Builder, Downloader},
    error::{Error, Result},
    events::Recorder,
    fetch::{Download, Fetcher},
    metadata::{AlbumRecord, AlbumRef, ArtistRef, Listing, PlaylistRecord, TrackRecord},
    preferences::Preferences,
    protocol::media::{self, Data, Medium, Source},
    quality::QualityTier,
    tagging::{Tagger, Tags},
    track::{Descriptor, Episode, Song, TrackId},
};

pub const ARTIST: &str = "Daft Punk";
pub const ALBUM: &str = "Discovery";
pub const ALBUM_ID: u64 = 302_127;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn secrets() -> Secrets {
    Secrets {
        bf_secret: Some("g4el58wc0zvf9na1".parse().unwrap()),
        url_key: Some("jo6aey6haid2Teih".parse().unwrap()),
    }
}

/// Payload served for a track; small enough to stay below one stripe
/// block, so it is written as is.
pub fn payload(id: TrackId) -> Vec<u8> {
    format!("audio of track {id}").into_bytes()
}

pub fn source_url(id: TrackId, tier: QualityTier, mirror: usize) -> Url {
    format!("https://cdn{mirror}.example/{}/{id}", tier.label())
        .parse()
        .unwrap()
}

pub fn song(id: TrackId, title: &str) -> Song {
    Song {
        id,
        title: title.to_owned(),
        artist: ARTIST.to_owned(),
        album_title: ALBUM.to_owned(),
        track_token: format!("token-{id}"),
        md5_origin: format!("{id:032x}"),
        media_version: Some(1),
        filesize_flac: Some(30_000_000),
        filesize_mp3_320: Some(9_000_000),
        filesize_mp3_128: Some(3_600_000),
        ..Song::default()
    }
}

pub fn track_record(id: TrackId, title: &str, position: u32) -> TrackRecord {
    TrackRecord {
        id,
        readable: true,
        title: title.to_owned(),
        duration: 200,
        track_position: Some(position),
        disk_number: Some(1),
        artist: ArtistRef {
            id: 27,
            name: ARTIST.to_owned(),
            role: None,
        },
        album: Some(AlbumRef {
            id: ALBUM_ID,
            title: ALBUM.to_owned(),
            md5_image: String::new(),
            release_date: Some("2001-03-07".to_owned()),
        }),
        ..TrackRecord::default()
    }
}

pub fn album_record(id: u64, tracks: &[TrackRecord]) -> AlbumRecord {
    AlbumRecord {
        id,
        title: ALBUM.to_owned(),
        upc: Some("724384960650".to_owned()),
        nb_tracks: u32::try_from(tracks.len()).unwrap(),
        release_date: Some("2001-03-07".to_owned()),
        artist: ArtistRef {
            id: 27,
            name: ARTIST.to_owned(),
            role: None,
        },
        tracks: Listing {
            data: tracks.to_vec(),
            next: None,
        },
        ..AlbumRecord::default()
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub tracks: Mutex<HashMap<TrackId, TrackRecord>>,
    pub by_isrc: Mutex<HashMap<String, TrackRecord>>,
    pub albums: Mutex<HashMap<u64, AlbumRecord>>,
    pub by_upc: Mutex<HashMap<String, AlbumRecord>>,
    pub playlists: Mutex<HashMap<u64, PlaylistRecord>>,
    pub tops: Mutex<HashMap<u64, Vec<TrackRecord>>>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn add_track(&self, record: TrackRecord) {
        if let Some(isrc) = record.isrc.clone() {
            self.by_isrc.lock().unwrap().insert(isrc, record.clone());
        }
        self.tracks.lock().unwrap().insert(record.id, record);
    }

    pub fn add_album(&self, record: AlbumRecord) {
        for track in &record.tracks.data {
            self.add_track(track.clone());
        }
        if let Some(upc) = record.upc.clone() {
            self.by_upc.lock().unwrap().insert(upc, record.clone());
        }
        self.albums.lock().unwrap().insert(record.id, record);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

fn missing(what: impl std::fmt::Display) -> Error {
    Error::not_found(format!("{what}: no data"))
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn track(&self, query: &Query) -> Result<TrackRecord> {
        self.queries.lock().unwrap().push(format!("track/{query}"));
        match query {
            Query::Id(id) => self.tracks.lock().unwrap().get(id).cloned(),
            Query::Isrc(isrc) => self.by_isrc.lock().unwrap().get(isrc).cloned(),
            Query::Upc(_) => None,
        }
        .ok_or_else(|| missing(query))
    }

    async fn album(&self, query: &Query) -> Result<AlbumRecord> {
        self.queries.lock().unwrap().push(format!("album/{query}"));
        match query {
            Query::Id(id) => self.albums.lock().unwrap().get(id).cloned(),
            Query::Upc(upc) => self.by_upc.lock().unwrap().get(upc).cloned(),
            Query::Isrc(_) => None,
        }
        .ok_or_else(|| missing(query))
    }

    async fn playlist(&self, id: u64) -> Result<PlaylistRecord> {
        self.playlists
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| missing(id))
    }

    async fn artist_top(&self, id: u64) -> Result<Vec<TrackRecord>> {
        self.tops
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| missing(id))
    }

    async fn cover(&self, _md5: &str, _size: u32) -> Result<Bytes> {
        Ok(Bytes::from_static(b"\xff\xd8\xff\xe0 cover"))
    }
}

/// Gateway double. Tokens resolve to two mirrors per tier unless refused.
#[derive(Default)]
pub struct FakeMedia {
    pub songs: Mutex<HashMap<TrackId, Song>>,
    pub albums: Mutex<HashMap<u64, Vec<TrackId>>>,
    pub playlists: Mutex<HashMap<u64, Vec<TrackId>>>,
    pub episodes: Mutex<HashMap<TrackId, Episode>>,

    /// Tokens answered with a rights error marker.
    pub refused: Mutex<HashSet<String>>,

    /// Tiers no token can be served at.
    pub unavailable: Mutex<HashSet<QualityTier>>,

    /// Tokens served from a single mirror.
    pub single_source: Mutex<HashSet<String>>,

    /// Refuse every batch as a whole.
    pub refuse_all: Mutex<bool>,

    pub calls: Mutex<Vec<(Vec<String>, QualityTier)>>,
}

impl FakeMedia {
    pub fn add_song(&self, song: Song) {
        self.songs.lock().unwrap().insert(song.id, song);
    }

    pub fn calls(&self) -> Vec<(Vec<String>, QualityTier)> {
        self.calls.lock().unwrap().clone()
    }

    fn descriptors(&self, ids: &[TrackId]) -> Vec<Descriptor> {
        let songs = self.songs.lock().unwrap();
        ids.iter()
            .filter_map(|id| songs.get(id).cloned())
            .map(Descriptor::Song)
            .collect()
    }

    fn data(&self, token: &str, tier: QualityTier) -> Data {
        if self.refused.lock().unwrap().contains(token) {
            return Data::Errors {
                errors: vec![media::Error {
                    code: media::Error::NO_RIGHTS,
                    message: "Track token has no sufficient rights on requested media".to_owned(),
                }],
            };
        }

        let sources = if self.unavailable.lock().unwrap().contains(&tier) {
            Vec::new()
        } else {
            let id: TrackId = token.trim_start_matches("token-").parse().unwrap_or_default();
            let mirrors = if self.single_source.lock().unwrap().contains(token) {
                1
            } else {
                2
            };
            (1..=mirrors)
                .map(|mirror| Source {
                    url: source_url(id, tier, mirror),
                    provider: format!("cdn{mirror}"),
                })
                .collect()
        };
        Data::Media {
            media: vec![Medium {
                media_type: media::Type::FULL,
                format: Some(tier),
                sources,
            }],
        }
    }
}

#[async_trait]
impl MediaApi for FakeMedia {
    async fn song(&self, id: TrackId) -> Result<Descriptor> {
        self.songs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .map(Descriptor::Song)
            .ok_or_else(|| missing(id))
    }

    async fn album_songs(&self, id: u64) -> Result<Vec<Descriptor>> {
        let ids = self.albums.lock().unwrap().get(&id).cloned();
        ids.map(|ids| self.descriptors(&ids))
            .ok_or_else(|| missing(id))
    }

    async fn playlist_songs(&self, id: u64) -> Result<Vec<Descriptor>> {
        let ids = self.playlists.lock().unwrap().get(&id).cloned();
        ids.map(|ids| self.descriptors(&ids))
            .ok_or_else(|| missing(id))
    }

    async fn episode(&self, id: TrackId) -> Result<Descriptor> {
        self.episodes
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .map(Descriptor::Episode)
            .ok_or_else(|| missing(id))
    }

    async fn media_urls(&self, tokens: &[String], tier: QualityTier) -> Result<Vec<Data>> {
        self.calls.lock().unwrap().push((tokens.to_vec(), tier));
        if *self.refuse_all.lock().unwrap() {
            return Err(Error::rights_denied("no rights on any token"));
        }
        Ok(tokens.iter().map(|token| self.data(token, tier)).collect())
    }
}

/// What the CDN double serves for a URL.
#[derive(Clone)]
pub enum Payload {
    Audio(Vec<u8>),

    /// Serves the bytes, then fails as if the stream were undecryptable.
    Corrupt(Vec<u8>),
}

#[derive(Default)]
pub struct FakeFetcher {
    pub payloads: Mutex<HashMap<Url, Payload>>,
    pub opened: Mutex<Vec<Url>>,
}

impl FakeFetcher {
    /// Serves track `id` on every mirror at `tier`.
    pub fn serve(&self, id: TrackId, tier: QualityTier, payload: Payload) {
        let mut payloads = self.payloads.lock().unwrap();
        for mirror in 1..=2 {
            payloads.insert(source_url(id, tier, mirror), payload.clone());
        }
    }

    pub fn opened(&self) -> Vec<Url> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn open(&self, url: &Url) -> Result<Download> {
        self.opened.lock().unwrap().push(url.clone());
        let payload = self.payloads.lock().unwrap().get(url).cloned();
        match payload {
            Some(Payload::Audio(bytes)) => Ok(Download::from_chunks(vec![Ok(Bytes::from(bytes))])),
            Some(Payload::Corrupt(bytes)) => Ok(Download::from_chunks(vec![
                Ok(Bytes::from(bytes)),
                Err(Error::decryption_failed("bad padding in stripe block")),
            ])),
            None => Err(Error::not_found(format!("HTTP 404 Not Found for {url}"))),
        }
    }
}

/// Keeps tags in memory, keyed by path.
#[derive(Default)]
pub struct FakeTagger {
    pub tagged: Mutex<HashMap<PathBuf, Tags>>,
}

impl FakeTagger {
    pub fn tags(&self, path: &Path) -> Option<Tags> {
        self.tagged.lock().unwrap().get(path).cloned()
    }
}

impl Tagger for FakeTagger {
    fn write(&self, path: &Path, tags: &Tags) -> Result<()> {
        if !path.exists() {
            return Err(Error::not_found(format!("{} does not exist", path.display())));
        }
        self.tagged
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), tags.clone());
        Ok(())
    }

    fn read_identity(&self, path: &Path) -> Option<(String, String)> {
        self.tags(path).map(|tags| (tags.title, tags.album))
    }
}

/// Renames files instead of transcoding them.
#[derive(Default)]
pub struct FakeConverter {
    pub fail: Mutex<bool>,
    pub converted: Mutex<Vec<(PathBuf, ConversionTarget)>>,
}

#[async_trait]
impl Converter for FakeConverter {
    async fn convert(&self, input: &Path, target: &ConversionTarget) -> Result<PathBuf> {
        if *self.fail.lock().unwrap() {
            return Err(Error::conversion_failed("ffmpeg exited with 1"));
        }
        self.converted
            .lock()
            .unwrap()
            .push((input.to_path_buf(), *target));
        let output = target.output_path(input);
        std::fs::rename(input, &output)?;
        Ok(output)
    }
}

#[derive(Default)]
pub struct FakeSource {
    pub tracks: HashMap<String, SourceTrack>,
    pub albums: HashMap<String, SourceAlbum>,
    pub playlists: HashMap<String, SourcePlaylist>,

    /// Hits by search query.
    pub searches: HashMap<String, Vec<SourceTrack>>,
}

#[async_trait]
impl SourceCatalog for FakeSource {
    async fn track(&self, id: &str) -> Result<SourceTrack> {
        self.tracks.get(id).cloned().ok_or_else(|| missing(id))
    }

    async fn album(&self, id: &str) -> Result<SourceAlbum> {
        self.albums.get(id).cloned().ok_or_else(|| missing(id))
    }

    async fn playlist(&self, id: &str) -> Result<SourcePlaylist> {
        self.playlists.get(id).cloned().ok_or_else(|| missing(id))
    }

    async fn search(&self, query: &str) -> Result<Vec<SourceTrack>> {
        Ok(self.searches.get(query).cloned().unwrap_or_default())
    }
}

/// A session over in-memory collaborators writing to a temporary directory.
pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub media: Arc<FakeMedia>,
    pub fetcher: Arc<FakeFetcher>,
    pub tagger: Arc<FakeTagger>,
    pub converter: Arc<FakeConverter>,
    pub recorder: Recorder,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        init_logging();
        Self {
            catalog: Arc::new(FakeCatalog::default()),
            media: Arc::new(FakeMedia::default()),
            fetcher: Arc::new(FakeFetcher::default()),
            tagger: Arc::new(FakeTagger::default()),
            converter: Arc::new(FakeConverter::default()),
            recorder: Recorder::new(),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn builder(&self) -> Builder {
        Downloader::builder(
            Arc::clone(&self.catalog) as _,
            Arc::clone(&self.media) as _,
            Arc::clone(&self.fetcher) as _,
        )
        .tagger(Arc::clone(&self.tagger) as _)
        .converter(Arc::clone(&self.converter) as _)
        .reporter(Arc::new(self.recorder.clone()))
        .secrets(secrets())
    }

    pub fn downloader(&self) -> Downloader {
        self.builder().build()
    }

    /// A downloader that maps links of `source` onto the catalog.
    pub fn mapping_downloader(&self, source: FakeSource) -> Downloader {
        self.builder().source(Arc::new(source)).build()
    }

    pub fn preferences(&self) -> Preferences {
        Preferences::new(self.dir.path())
    }

    /// Registers a track everywhere, served at every tier.
    pub fn add_track(&self, record: TrackRecord, song: Song) {
        for tier in QualityTier::LADDER {
            self.fetcher
                .serve(song.id, tier, Payload::Audio(payload(song.id)));
        }
        self.catalog.add_track(record);
        self.media.add_song(song);
    }

    /// Registers an album of `count` tracks with ids `first..first + count`.
    pub fn add_album(&self, id: u64, first: TrackId, count: u32) -> Vec<TrackId> {
        let mut records = Vec::new();
        for position in 1..=count {
            let track_id = first + u64::from(position) - 1;
            let title = format!("Track {position}");
            let record = track_record(track_id, &title, position);
            self.add_track(record.clone(), song(track_id, &title));
            records.push(record);
        }
        let ids: Vec<TrackId> = records.iter().map(|record| record.id).collect();
        self.catalog.add_album(album_record(id, &records));
        self.media.albums.lock().unwrap().insert(id, ids.clone());
        ids
    }
}
