//! Albums, playlists and artist top lists.
//!
//! An [`Orchestrator`] downloads every child of a batch through the
//! [`Engine`], one after the other and in catalog order. A child that fails
//! is recorded in the batch summary and never stops its siblings; only a
//! failure to fetch the batch's own metadata fails the call.
//!
//! Each batch reports `Initializing` before its first child and `Done`
//! with its summary after the last one, whatever happened in between.

mod album;
mod artist;
mod playlist;

use crate::{
    context::Context,
    engine::{Engine, Job},
    error::{classify, Result},
    events::{Event, Status, Subject},
    item::{Batch, DownloadItem},
    link::{Kind, Link},
    metadata::TrackRecord,
    preferences::{Preferences, TrackContext},
    protocol::media::MediaSource,
    tagging::Tags,
    track::Descriptor,
};

pub struct Orchestrator<'a> {
    context: &'a Context,
    preferences: &'a Preferences,
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub fn new(context: &'a Context, preferences: &'a Preferences) -> Self {
        Self {
            context,
            preferences,
        }
    }

    fn emit(&self, subject: &Subject, status: Status) {
        self.context.report(&Event::new(subject.clone(), status));
    }

    /// Resolves sources for all children at the requested tier up front.
    ///
    /// When the batch call fails as a whole every child resolves its own
    /// source later on.
    async fn resolve(&self, descriptors: &[Descriptor]) -> Vec<Option<Result<MediaSource>>> {
        match self
            .context
            .resolver()
            .resolve(descriptors, self.preferences.quality)
            .await
        {
            Ok(sources) => sources.into_iter().map(Some).collect(),
            Err(e) => {
                warn!("batch resolution failed, resolving per track: {e}");
                descriptors.iter().map(|_| None).collect()
            }
        }
    }

    /// Downloads one child, turning its failure into a failed item.
    async fn child(
        &self,
        descriptor: &Descriptor,
        tags: Tags,
        track: &TrackContext,
        source: Option<Result<MediaSource>>,
    ) -> DownloadItem {
        let engine = Engine::new(self.context, self.preferences);
        let mut job = Job::new(descriptor, tags.clone(), track);
        if let Some(source) = source {
            job = job.with_source(self.preferences.quality, source);
        }

        match engine.acquire(job).await {
            Ok(item) => item,
            Err(e) => {
                debug!("{e}");
                let mut item = DownloadItem::failed(
                    descriptor.id(),
                    tags,
                    track.link.clone(),
                    classify(&e.root_message()),
                );
                item.fallback_id = descriptor.fallback_id();
                item
            }
        }
    }

    /// Downloads a child known only by its catalog record, looking up its
    /// descriptor on the way.
    async fn record_child(
        &self,
        record: &TrackRecord,
        subject: &Subject,
        position: usize,
        total: usize,
    ) -> DownloadItem {
        let tags = Tags::from_track(record);
        let link = track_link(record.id);
        if let Some(failed) = self.market_check(record, &tags, &link) {
            return failed;
        }

        match self.context.media.song(record.id).await {
            Ok(descriptor) => {
                let child = TrackContext::child(subject.clone(), position, total, link)
                    .with_cover_beside(true);
                self.child(&descriptor, tags, &child, None).await
            }
            Err(e) => {
                warn!("{subject}: track {} unavailable: {e}", record.id);
                DownloadItem::failed(record.id, tags, Some(link), classify(&e.root_message()))
            }
        }
    }

    /// A child that is not streamable in the configured market, as a failed
    /// item. `None` when the record allows the market or none is set.
    fn market_check(&self, record: &TrackRecord, tags: &Tags, link: &str) -> Option<DownloadItem> {
        let market = self.preferences.market.as_deref()?;
        if record.is_available_in(market) {
            return None;
        }
        Some(DownloadItem::failed(
            record.id,
            tags.clone(),
            Some(link.to_owned()),
            format!("not available in market {market}"),
        ))
    }

    /// Finishes a batch: reports `Done` and hands the batch back.
    fn done(&self, batch: Batch) -> Batch {
        self.emit(
            &batch.subject,
            Status::Done {
                summary: Some(batch.summary.clone()),
            },
        );
        batch
    }
}

/// Tags of child `position` (1-based), from its catalog record if the
/// batch listing has one.
///
/// Track and disc numbers come from the record or descriptor, falling
/// back to the position and the first disc.
fn child_tags<'r>(
    descriptor: &Descriptor,
    records: &'r [TrackRecord],
    position: usize,
) -> (Tags, Option<&'r TrackRecord>) {
    let record = records.iter().find(|record| record.id == descriptor.id());
    let mut tags = match (record, descriptor) {
        (Some(record), _) => Tags::from_track(record),
        (None, Descriptor::Song(song)) => Tags::from_song(song),
        (None, Descriptor::Episode(episode)) => Tags::from_episode(episode),
    };

    tags.track_number = tags
        .track_number
        .or_else(|| descriptor.track_number())
        .or_else(|| u32::try_from(position).ok());
    tags.disc_number = tags
        .disc_number
        .or_else(|| descriptor.disc_number())
        .or(Some(1));
    (tags, record)
}

fn track_link(id: u64) -> String {
    Link::deezer(Kind::Track, id).to_string()
}
