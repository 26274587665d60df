//! Download sessions.
//!
//! A [`Downloader`] owns the collaborators of one session and exposes a
//! call per entity kind, plus [`Downloader::download_smart`] for any
//! supported link. Links of the source catalog are mapped onto Deezer
//! before anything is downloaded.
//!
//! # Example
//!
//! ```rust,no_run
//! use deezload::{config::Config, downloader::Downloader, preferences::Preferences};
//!
//! # async fn run() -> deezload::error::Result<()> {
//! let config = Config::from_secrets_file("secrets.toml")?;
//! let downloader = Downloader::new(&config)?;
//!
//! let preferences = Preferences::new("/music");
//! let album = downloader
//!     .download_album("https://www.deezer.com/album/302127", &preferences)
//!     .await?;
//! println!("{} tracks failed", album.summary.total_failed());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::{
    api::PublicApi,
    catalog::{Catalog, MediaApi, Query, SourceCatalog},
    config::{Config, ResolvePolicy, Secrets},
    context::Context,
    convert::{Converter, Ffmpeg},
    crosswalk::Crosswalk,
    engine::{Engine, Job},
    error::{classify, Error, ErrorKind, Result},
    events::{EntityRef, Event, LogReporter, Reporter, Status, Subject},
    fetch::Fetcher,
    gateway::Gateway,
    http::Client as HttpClient,
    inflight::InFlight,
    item::{Batch, DownloadItem},
    link::{Kind, Link, Provider},
    metadata::TrackRecord,
    orchestrate::Orchestrator,
    preferences::{Preferences, TrackContext},
    tagging::{LoftyTagger, Tagger, Tags},
    track::{Descriptor, TrackId},
};

/// What a link resolved to.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Item(DownloadItem),
    Batch(Batch),
}

pub struct Downloader {
    context: Context,
    source: Option<Arc<dyn SourceCatalog>>,
}

/// Assembles a [`Downloader`] from custom collaborators.
pub struct Builder {
    catalog: Arc<dyn Catalog>,
    media: Arc<dyn MediaApi>,
    fetcher: Arc<dyn Fetcher>,
    tagger: Arc<dyn Tagger>,
    converter: Arc<dyn Converter>,
    reporter: Arc<dyn Reporter>,
    source: Option<Arc<dyn SourceCatalog>>,
    in_flight: InFlight,
    secrets: Secrets,
    resolve: ResolvePolicy,
}

impl Builder {
    #[must_use]
    pub fn tagger(mut self, tagger: Arc<dyn Tagger>) -> Self {
        self.tagger = tagger;
        self
    }

    #[must_use]
    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Catalog that source links are mapped from.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn SourceCatalog>) -> Self {
        self.source = Some(source);
        self
    }

    /// Registry shared with whoever cleans up after an interrupted run.
    #[must_use]
    pub fn in_flight(mut self, in_flight: InFlight) -> Self {
        self.in_flight = in_flight;
        self
    }

    #[must_use]
    pub fn secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }

    #[must_use]
    pub fn resolve_policy(mut self, policy: ResolvePolicy) -> Self {
        self.resolve = policy;
        self
    }

    #[must_use]
    pub fn build(self) -> Downloader {
        Downloader {
            context: Context {
                catalog: self.catalog,
                media: self.media,
                fetcher: self.fetcher,
                tagger: self.tagger,
                converter: self.converter,
                reporter: self.reporter,
                in_flight: self.in_flight,
                secrets: self.secrets,
                resolve: self.resolve,
            },
            source: self.source,
        }
    }
}

impl Downloader {
    /// Creates a session against the Deezer services, tagging with `lofty`,
    /// converting with `ffmpeg` and reporting to the log.
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let catalog = Arc::new(PublicApi::new(config)?);
        let media = Arc::new(Gateway::new(config)?);
        let fetcher = Arc::new(HttpClient::without_cookies(config)?);

        Ok(Self::builder(catalog, media, fetcher)
            .secrets(config.secrets.clone())
            .resolve_policy(config.resolve)
            .build())
    }

    /// Starts a session from the three network collaborators.
    #[must_use]
    pub fn builder(
        catalog: Arc<dyn Catalog>,
        media: Arc<dyn MediaApi>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Builder {
        Builder {
            catalog,
            media,
            fetcher,
            tagger: Arc::new(LoftyTagger),
            converter: Arc::new(Ffmpeg::default()),
            reporter: Arc::new(LogReporter),
            source: None,
            in_flight: InFlight::new(),
            secrets: Secrets::default(),
            resolve: ResolvePolicy::default(),
        }
    }

    /// Files being written right now.
    #[must_use]
    pub fn in_flight(&self) -> &InFlight {
        &self.context.in_flight
    }

    fn crosswalk(&self) -> Result<Crosswalk<'_>> {
        let source = self.source.as_deref().ok_or_else(|| {
            Error::invalid_argument("no source catalog configured for mapping links")
        })?;
        Ok(Crosswalk::new(source, self.context.catalog.as_ref()))
    }

    /// Parses `link`, mapping it onto Deezer, and checks it is of `kind`.
    async fn deezer_id(&self, link: &str, kind: Kind) -> Result<u64> {
        let link: Link = link.parse()?;
        if link.kind != kind {
            return Err(Error::invalid_argument(format!(
                "{link} is not a {kind:?} link"
            )));
        }
        let link = match link.provider {
            Provider::Deezer => link,
            Provider::Spotify => {
                let mapped = self.crosswalk()?.map_link(&link).await?;
                info!("mapped {link} to {mapped}");
                mapped
            }
        };
        link.deezer_id()
    }

    /// Downloads a single track.
    ///
    /// A track the catalog no longer serves is retried under the alternate
    /// id the gateway offers for it.
    ///
    /// # Errors
    ///
    /// Returns `MarketUnavailable` if the track cannot be streamed in the
    /// configured market, or `TrackNotFound` if it cannot be acquired.
    pub async fn download_track(
        &self,
        link: &str,
        preferences: &Preferences,
    ) -> Result<DownloadItem> {
        let id = self.deezer_id(link, Kind::Track).await?;
        let track = TrackContext::standalone(Link::deezer(Kind::Track, id).to_string());
        self.track_by_id(id, preferences, &track)
            .await
            .inspect_err(|e| self.report_failure(Subject::Track(EntityRef::new(id, "", "")), e))
    }

    /// Downloads the track the source catalog finds first for `song` by
    /// `artist`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` without a source catalog, `NotFound` if
    /// the search has no hits or the hit has no Deezer equivalent, or any
    /// error of [`download_track`](Self::download_track).
    pub async fn download_name(
        &self,
        artist: &str,
        song: &str,
        preferences: &Preferences,
    ) -> Result<DownloadItem> {
        let record = self.crosswalk()?.find(artist, song).await?;
        info!("\"{song}\" by {artist} is track {}", record.id);

        let track = TrackContext::standalone(Link::deezer(Kind::Track, record.id).to_string());
        self.track_by_id(record.id, preferences, &track)
            .await
            .inspect_err(|e| {
                self.report_failure(Subject::Track(EntityRef::new(record.id, song, artist)), e);
            })
    }

    async fn track_by_id(
        &self,
        id: TrackId,
        preferences: &Preferences,
        track: &TrackContext,
    ) -> Result<DownloadItem> {
        let context = &self.context;
        let record = match context.catalog.track(&Query::Id(id)).await {
            Ok(record) if record.readable => record,
            Ok(_) => {
                let cause = Error::market_unavailable(format!("track {id} is not readable"));
                self.fallback(id, cause).await?
            }
            Err(e) if matches!(e.kind, ErrorKind::NotFound | ErrorKind::MarketUnavailable) => {
                self.fallback(id, e).await?
            }
            Err(e) => return Err(e),
        };

        if let Some(market) = preferences.market.as_deref() {
            if !record.is_available_in(market) {
                return Err(Error::market_unavailable(format!(
                    "\"{}\" is not available in market {market}",
                    record.title
                )));
            }
        }

        let descriptor = context.media.song(record.id).await?;
        let mut tags = Tags::from_track(&record);
        if let Some(album) = record.album.as_ref().filter(|album| album.id != 0) {
            match context.catalog.album(&Query::Id(album.id)).await {
                Ok(album) => tags = tags.with_album(&album),
                Err(e) => debug!("album {} of track {id} unavailable: {e}", album.id),
            }
        }

        Engine::new(context, preferences)
            .acquire(Job::new(&descriptor, tags, track))
            .await
    }

    /// The catalog record of the alternate id the gateway offers for `id`,
    /// or `cause` if there is none.
    async fn fallback(&self, id: TrackId, cause: Error) -> Result<TrackRecord> {
        let Ok(descriptor) = self.context.media.song(id).await else {
            return Err(cause);
        };
        let Some(fallback) = descriptor.fallback_id().filter(|fallback| *fallback != id) else {
            return Err(cause);
        };

        info!("track {id} unavailable ({cause}), trying alternate {fallback}");
        let record = self.context.catalog.track(&Query::Id(fallback)).await?;
        if record.readable {
            Ok(record)
        } else {
            Err(cause)
        }
    }

    /// Downloads a podcast episode.
    ///
    /// # Errors
    ///
    /// Returns `TrackNotFound` if the episode cannot be acquired.
    pub async fn download_episode(
        &self,
        link: &str,
        preferences: &Preferences,
    ) -> Result<DownloadItem> {
        let id = self.deezer_id(link, Kind::Episode).await?;
        self.episode_by_id(id, preferences)
            .await
            .inspect_err(|e| self.report_failure(Subject::Episode(EntityRef::new(id, "", "")), e))
    }

    async fn episode_by_id(&self, id: TrackId, preferences: &Preferences) -> Result<DownloadItem> {
        let descriptor = self.context.media.episode(id).await?;
        let tags = match &descriptor {
            Descriptor::Episode(episode) => Tags::from_episode(episode),
            Descriptor::Song(song) => Tags::from_song(song),
        };
        let track = TrackContext::standalone(Link::deezer(Kind::Episode, id).to_string());
        Engine::new(&self.context, preferences)
            .acquire(Job::new(&descriptor, tags, &track))
            .await
    }

    /// Downloads all tracks of an album.
    ///
    /// # Errors
    ///
    /// Returns error if the album cannot be looked up. Failing tracks are
    /// recorded in the batch instead.
    pub async fn download_album(&self, link: &str, preferences: &Preferences) -> Result<Batch> {
        let id = self.deezer_id(link, Kind::Album).await?;
        Orchestrator::new(&self.context, preferences).album(id).await
    }

    /// Downloads all tracks of a playlist.
    ///
    /// Playlists of the source catalog have each of their tracks mapped on
    /// its own; a track without equivalent fails alone.
    ///
    /// # Errors
    ///
    /// Returns error if the playlist cannot be looked up.
    pub async fn download_playlist(&self, link: &str, preferences: &Preferences) -> Result<Batch> {
        let parsed: Link = link.parse()?;
        if parsed.kind != Kind::Playlist {
            return Err(Error::invalid_argument(format!("{parsed} is not a playlist link")));
        }

        let orchestrator = Orchestrator::new(&self.context, preferences);
        match parsed.provider {
            Provider::Deezer => orchestrator.playlist(parsed.deezer_id()?).await,
            Provider::Spotify => {
                let (playlist, tracks) = self.crosswalk()?.playlist(&parsed.id).await?;
                Ok(orchestrator.mapped_playlist(&playlist, tracks).await)
            }
        }
    }

    /// Downloads the top tracks of an artist.
    ///
    /// # Errors
    ///
    /// Returns error if the top list cannot be looked up.
    pub async fn download_artist_top(
        &self,
        link: &str,
        preferences: &Preferences,
    ) -> Result<Batch> {
        let id = self.deezer_id(link, Kind::Artist).await?;
        Orchestrator::new(&self.context, preferences)
            .artist_top(id)
            .await
    }

    /// Downloads whatever `link` points to.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unsupported links, otherwise whatever
    /// the call for the link's kind returns.
    pub async fn download_smart(&self, link: &str, preferences: &Preferences) -> Result<Outcome> {
        let parsed: Link = link.parse()?;
        debug!("{link}: {:?} {:?}", parsed.provider, parsed.kind);

        match parsed.kind {
            Kind::Track => self.download_track(link, preferences).await.map(Outcome::Item),
            Kind::Episode => self.download_episode(link, preferences).await.map(Outcome::Item),
            Kind::Album => self.download_album(link, preferences).await.map(Outcome::Batch),
            Kind::Playlist => self.download_playlist(link, preferences).await.map(Outcome::Batch),
            Kind::Artist => self.download_artist_top(link, preferences).await.map(Outcome::Batch),
        }
    }

    /// Reports a failure that happened before the engine took over.
    fn report_failure(&self, subject: Subject, error: &Error) {
        // The engine has reported its own failures already.
        if error.kind == ErrorKind::TrackNotFound {
            return;
        }
        self.context.report(&Event::new(
            subject,
            Status::Error {
                error: classify(&error.root_message()),
            },
        ));
    }
}
