//! Track acquisition.
//!
//! The [`Engine`] acquires one track or episode from its descriptor to a
//! tagged file on disk, walking these states:
//!
//! ```text
//! Init -> SkipCheck -> Resolving -> Downloading -> Tagging -> Converting -> Done
//!             |            |             |            |
//!             v            +-------------+------------+--> Failed
//!          Skipped
//! ```
//!
//! Resolving walks the quality [`Ladder`] of the track: each step resolves
//! a source at one tier and confirms it can be fetched before anything is
//! written. Conversion failures are logged and keep the unconverted file.
//! Every other failure is reported as an error event and returned as
//! `TrackNotFound`, wrapping the cause.
//!
//! Episodes take a reduced path: no ladder, no decryption.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    context::Context,
    convert::ConversionTarget,
    cover,
    decrypt::Decryptor,
    error::{classify, Error, ErrorKind, Result},
    events::{Event, Status, Subject, Summary},
    fetch::Download,
    item::{DownloadItem, ItemKind},
    path,
    preferences::{Preferences, TrackContext},
    protocol::media::MediaSource,
    quality::{Ladder, QualityTier},
    skip,
    tagging::{Tagger, Tags},
    track::Descriptor,
    writer,
};

/// One track or episode to acquire.
pub struct Job<'a> {
    pub descriptor: &'a Descriptor,
    pub tags: Tags,
    pub track: &'a TrackContext,

    /// Source already resolved for this track by a batch, with the tier it
    /// was resolved at. Only used when the ladder starts at that tier.
    pub source: Option<(QualityTier, Result<MediaSource>)>,
}

impl<'a> Job<'a> {
    #[must_use]
    pub fn new(descriptor: &'a Descriptor, tags: Tags, track: &'a TrackContext) -> Self {
        Self {
            descriptor,
            tags,
            track,
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, tier: QualityTier, source: Result<MediaSource>) -> Self {
        self.source = Some((tier, source));
        self
    }
}

pub struct Engine<'a> {
    context: &'a Context,
    preferences: &'a Preferences,
}

impl<'a> Engine<'a> {
    #[must_use]
    pub fn new(context: &'a Context, preferences: &'a Preferences) -> Self {
        Self {
            context,
            preferences,
        }
    }

    /// Acquires the track or episode of `job`.
    ///
    /// # Errors
    ///
    /// Returns `TrackNotFound` wrapping the cause when the track cannot be
    /// acquired at any tier its ladder allows. An error event carrying the
    /// classified cause has been reported by then.
    pub async fn acquire(&self, job: Job<'_>) -> Result<DownloadItem> {
        let Job {
            descriptor,
            mut tags,
            track,
            source,
        } = job;

        tags.enhance(descriptor);
        let kind = if descriptor.is_episode() {
            ItemKind::Episode
        } else {
            ItemKind::Track
        };
        let mut item = DownloadItem::new(kind, descriptor.id(), tags, track.link.clone());
        item.fallback_id = descriptor.fallback_id();
        let subject = item.subject();

        let result = if descriptor.is_episode() {
            self.run_episode(descriptor, track, source, &mut item, &subject)
                .await
        } else {
            self.run_song(descriptor, track, source, &mut item, &subject)
                .await
        };

        match result {
            Ok(()) => Ok(item),
            Err(e) => {
                let reason = classify(&e.root_message());
                self.emit(
                    &subject,
                    track,
                    Status::Error {
                        error: reason.clone(),
                    },
                );
                Err(Error::wrap(
                    ErrorKind::TrackNotFound,
                    format!("cannot download {subject}: {reason}"),
                    e,
                ))
            }
        }
    }

    async fn run_song(
        &self,
        descriptor: &Descriptor,
        track: &TrackContext,
        source: Option<(QualityTier, Result<MediaSource>)>,
        item: &mut DownloadItem,
        subject: &Subject,
    ) -> Result<()> {
        let preferences = self.preferences;
        let ladder = Ladder::plan(
            preferences.quality,
            descriptor.size(QualityTier::FLAC),
            preferences.recursive_quality,
        );
        trace!("{subject}: ladder {:?}", ladder.steps);

        let expected = path::track_path(&item.tags, preferences, ladder.start());
        if let Some(existing) = self.existing(&expected, &item.tags).await {
            let quality = if existing.extension().is_some_and(|ext| ext == "flac") {
                QualityTier::FLAC
            } else if ladder.start().is_lossless() {
                QualityTier::BEST_LOSSY
            } else {
                ladder.start()
            };
            item.quality = Some(quality);
            self.skip(item, existing, subject, track);
            return Ok(());
        }

        self.emit(subject, track, Status::Initializing);
        let (tier, download) = self
            .open_ladder(descriptor, &ladder, source, subject, track)
            .await?;

        let path = path::track_path(&item.tags, preferences, tier);
        item.quality = Some(tier);
        item.path = Some(path.clone());

        let decryptor = Decryptor::new(
            descriptor.id(),
            &descriptor.encryption(),
            self.context.secrets.bf_secret.as_ref(),
        )?;
        item.encryption = Some(decryptor.kind());
        self.download(download, decryptor, &path, subject, track)
            .await?;

        self.finish(descriptor, path, item, subject, track).await
    }

    async fn run_episode(
        &self,
        descriptor: &Descriptor,
        track: &TrackContext,
        source: Option<(QualityTier, Result<MediaSource>)>,
        item: &mut DownloadItem,
        subject: &Subject,
    ) -> Result<()> {
        let expected = path::episode_path(&item.tags, self.preferences);
        if let Some(existing) = self.existing(&expected, &item.tags).await {
            self.skip(item, existing, subject, track);
            return Ok(());
        }

        self.emit(subject, track, Status::Initializing);
        let source = match source {
            Some((_, source)) => source,
            None => {
                self.context
                    .resolver()
                    .resolve_one(descriptor, QualityTier::MP3_128)
                    .await
            }
        };
        let download = self.open(source).await?;

        item.path = Some(expected.clone());
        item.encryption = Some(descriptor.encryption().kind());
        self.download(download, Decryptor::passthrough(), &expected, subject, track)
            .await?;

        self.finish(descriptor, expected, item, subject, track).await
    }

    async fn existing(&self, expected: &Path, tags: &Tags) -> Option<PathBuf> {
        skip::find_existing(
            expected,
            &tags.title,
            &tags.album,
            self.preferences.convert_to.as_ref(),
            self.context.tagger.as_ref(),
        )
        .await
    }

    fn skip(&self, item: &mut DownloadItem, existing: PathBuf, subject: &Subject, track: &TrackContext) {
        let reason = format!("already exists at {}", existing.display());
        item.path = Some(existing);
        item.success = true;
        item.was_skipped = true;
        self.emit(subject, track, Status::Skipped { reason });
    }

    /// Walks the ladder until a source can be opened.
    async fn open_ladder(
        &self,
        descriptor: &Descriptor,
        ladder: &Ladder,
        mut preresolved: Option<(QualityTier, Result<MediaSource>)>,
        subject: &Subject,
        track: &TrackContext,
    ) -> Result<(QualityTier, Download)> {
        let resolver = self.context.resolver();
        let mut last_error: Option<Error> = None;

        for (step, tier) in ladder.steps.iter().copied().enumerate() {
            if step > 0 {
                let reason = last_error
                    .as_ref()
                    .map(|e| classify(&e.root_message()))
                    .unwrap_or_default();
                self.emit(
                    subject,
                    track,
                    Status::Retrying {
                        from: ladder.steps[step - 1],
                        to: tier,
                        reason,
                    },
                );
            }

            let source = match preresolved.take() {
                Some((resolved_at, source)) if resolved_at == tier && step == 0 => source,
                _ => resolver.resolve_one(descriptor, tier).await,
            };

            match self.open(source).await {
                Ok(download) => {
                    debug!("{subject}: streaming at {tier}");
                    return Ok((tier, download));
                }
                Err(e) if can_fall_back(&e) => {
                    debug!("{subject}: {tier} unavailable: {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let tiers = ladder
            .steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let message = format!("no fetchable source at {tiers}");
        Err(match last_error {
            Some(cause) => Error::wrap(ladder.exhausted, message, cause),
            None => Error::new(ladder.exhausted, message),
        })
    }

    /// Opens the first fetchable URL of a resolved source.
    async fn open(&self, source: Result<MediaSource>) -> Result<Download> {
        let source = source?;
        let mut last_error = None;
        for candidate in &source.sources {
            match self.context.fetcher.open(&candidate.url).await {
                Ok(download) => return Ok(download),
                Err(e) => {
                    trace!("{} ({}) failed: {e}", candidate.url.host_str().unwrap_or_default(), candidate.provider);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| Error::not_found(format!("no source urls at {}", source.tier))))
    }

    async fn download(
        &self,
        download: Download,
        decryptor: Decryptor,
        path: &Path,
        subject: &Subject,
        track: &TrackContext,
    ) -> Result<u64> {
        let real_time = self.preferences.real_time;
        let mut last_percent = None;
        let mut progress = |read: u64, total: Option<u64>| {
            if !real_time {
                return;
            }
            let Some(total) = total.filter(|total| *total > 0) else {
                return;
            };
            let percent = u8::try_from(read.saturating_mul(100) / total)
                .unwrap_or(100)
                .min(100);
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                self.emit(subject, track, Status::RealTime { percent });
            }
        };

        writer::write_decrypted(
            download,
            decryptor,
            path,
            &self.context.in_flight,
            &mut progress,
        )
        .await
    }

    /// Tagging, cover and conversion of a written file.
    async fn finish(
        &self,
        descriptor: &Descriptor,
        mut path: PathBuf,
        item: &mut DownloadItem,
        subject: &Subject,
        track: &TrackContext,
    ) -> Result<()> {
        let preferences = self.preferences;

        if item.tags.cover.is_none() {
            item.tags.cover = cover::fetch(
                self.context.catalog.as_ref(),
                descriptor.cover_md5(),
                preferences.cover_size,
            )
            .await;
        }

        if let Err(e) = self.tag(&path, &item.tags).await {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("could not remove untagged {}: {e}", path.display());
            }
            return Err(e);
        }

        if preferences.save_cover && track.cover_beside {
            if let (Some(image), Some(dir)) = (&item.tags.cover, path.parent()) {
                if let Err(e) = cover::save(image, dir).await {
                    warn!("{subject}: could not save cover: {e}");
                }
            }
        }

        if let Some(target) = &preferences.convert_to {
            if item.quality.is_some_and(|tier| target.is_satisfied_by(tier)) {
                debug!("{subject}: already {target}");
            } else {
                match self.convert(&path, target, &item.tags).await {
                    Ok(converted) => path = converted,
                    Err(e) => warn!("{subject}: keeping {}: {e}", path.display()),
                }
            }
        }

        item.path = Some(path);
        item.success = true;

        let summary = track.parent.is_none().then(|| Summary {
            successful: vec![item.entity()],
            ..Summary::default()
        });
        self.emit(subject, track, Status::Done { summary });
        Ok(())
    }

    async fn tag(&self, path: &Path, tags: &Tags) -> Result<()> {
        let tagger: Arc<dyn Tagger> = Arc::clone(&self.context.tagger);
        let path = path.to_path_buf();
        let tags = tags.clone();
        tokio::task::spawn_blocking(move || tagger.write(&path, &tags))
            .await
            .map_err(|e| Error::internal(format!("tagging task failed: {e}")))?
    }

    async fn convert(&self, path: &Path, target: &ConversionTarget, tags: &Tags) -> Result<PathBuf> {
        let staging = target.staging_path(path);

        let in_flight = &self.context.in_flight;
        in_flight.register(staging.clone());
        let result = self.context.converter.convert(path, target).await;
        in_flight.unregister(&staging);
        let converted = result?;

        // Not every container keeps the source tags through ffmpeg.
        if let Err(e) = self.tag(&converted, tags).await {
            warn!("could not tag {}: {e}", converted.display());
        }
        Ok(converted)
    }

    fn emit(&self, subject: &Subject, track: &TrackContext, status: Status) {
        self.context.report(&Event {
            subject: subject.clone(),
            status,
            parent: track.parent.clone(),
            current: track.position,
            total: track.total,
        });
    }
}

/// Whether the next tier of the ladder may succeed where this one failed.
fn can_fall_back(error: &Error) -> bool {
    matches!(
        error.kind,
        ErrorKind::NotFound
            | ErrorKind::RightsDenied
            | ErrorKind::QualityUnavailable
            | ErrorKind::TrackNotFound
    )
}
