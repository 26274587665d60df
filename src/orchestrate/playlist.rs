use super::{child_tags, track_link, Orchestrator};
use crate::{
    archive,
    catalog::SourcePlaylist,
    crosswalk::MappedTrack,
    error::{classify, Result},
    events::{EntityRef, Status, Subject},
    item::{Batch, DownloadItem},
    m3u::M3u,
    path,
    preferences::TrackContext,
    tagging::Tags,
};

impl Orchestrator<'_> {
    /// Downloads every track of playlist `id`.
    ///
    /// Tracks keep the layout of their own albums. Each one that succeeds
    /// is appended to `{output_dir}/{playlist}.m3u` right away.
    ///
    /// # Errors
    ///
    /// Returns error only if the playlist itself cannot be looked up.
    pub async fn playlist(&self, id: u64) -> Result<Batch> {
        let context = self.context;
        let record = context.catalog.playlist(id).await?;
        let descriptors = context.media.playlist_songs(record.id).await?;

        let owner = record
            .creator
            .as_ref()
            .map(|creator| creator.name.clone())
            .unwrap_or_default();
        let subject = Subject::Playlist(EntityRef::new(record.id, record.title.clone(), owner));
        self.emit(&subject, Status::Initializing);
        let mut batch = Batch::new(subject.clone());

        let m3u = self.open_m3u(&subject, &record.title).await;

        let sources = self.resolve(&descriptors).await;
        let total = descriptors.len();
        for (index, (descriptor, source)) in descriptors.iter().zip(sources).enumerate() {
            let position = index + 1;
            let (tags, track) = child_tags(descriptor, &record.tracks.data, position);

            let link = track_link(descriptor.id());
            if let Some(failed) = track.and_then(|track| self.market_check(track, &tags, &link)) {
                batch.push(failed);
                continue;
            }

            let child =
                TrackContext::child(subject.clone(), position, total, link).with_cover_beside(true);
            let item = self.child(descriptor, tags, &child, source).await;

            append(m3u.as_ref(), &item, &subject).await;
            batch.push(item);
        }

        Ok(self.finish_playlist(batch, m3u, &record.title).await)
    }

    /// Downloads a playlist of the source catalog whose tracks have been
    /// mapped one by one. Tracks without an equivalent are failed items.
    pub async fn mapped_playlist(
        &self,
        playlist: &SourcePlaylist,
        tracks: Vec<MappedTrack>,
    ) -> Batch {
        let subject = Subject::Playlist(EntityRef::new(0, playlist.title.clone(), playlist.owner.clone()));
        self.emit(&subject, Status::Initializing);
        let mut batch = Batch::new(subject.clone());
        let m3u = self.open_m3u(&subject, &playlist.title).await;

        let total = tracks.len();
        for (index, MappedTrack { source, record }) in tracks.into_iter().enumerate() {
            let item = match record {
                Ok(record) => self.record_child(&record, &subject, index + 1, total).await,
                Err(e) => {
                    let title = if source.title.is_empty() {
                        source.id
                    } else {
                        source.title
                    };
                    let tags = Tags {
                        title,
                        artists: [source.artist].into_iter().filter(|a| !a.is_empty()).collect(),
                        ..Tags::default()
                    };
                    DownloadItem::failed(0, tags, None, classify(&e.root_message()))
                }
            };
            append(m3u.as_ref(), &item, &subject).await;
            batch.push(item);
        }

        self.finish_playlist(batch, m3u, &playlist.title).await
    }

    async fn open_m3u(&self, subject: &Subject, title: &str) -> Option<M3u> {
        match M3u::create(&self.preferences.output_dir, title).await {
            Ok(m3u) => Some(m3u),
            Err(e) => {
                warn!("{subject}: could not create playlist file: {e}");
                None
            }
        }
    }

    async fn finish_playlist(&self, mut batch: Batch, m3u: Option<M3u>, title: &str) -> Batch {
        let preferences = self.preferences;
        batch.m3u_path = m3u.map(|m3u| m3u.path().to_path_buf());

        if preferences.make_zip {
            let files = batch.successful_paths();
            if !files.is_empty() {
                let zip_path = path::playlist_zip(&preferences.output_dir, title, preferences.quality);
                match archive::create(files, zip_path).await {
                    Ok(zip_path) => batch.zip_path = Some(zip_path),
                    Err(e) => warn!("{}: could not create archive: {e}", batch.subject),
                }
            }
        }

        self.done(batch)
    }
}

/// Adds a succeeded item to the playlist file.
async fn append(m3u: Option<&M3u>, item: &DownloadItem, subject: &Subject) {
    let (Some(m3u), Some(path)) = (m3u, item.path.as_ref().filter(|_| item.success)) else {
        return;
    };
    if let Err(e) = m3u.append(path).await {
        warn!("{subject}: could not add {} to playlist file: {e}", path.display());
    }
}
