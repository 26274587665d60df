use std::path::PathBuf;

use super::{child_tags, track_link, Orchestrator};
use crate::{
    archive,
    catalog::Query,
    cover,
    error::Result,
    events::{EntityRef, Status, Subject},
    item::Batch,
    link::{Kind, Link},
    path,
    preferences::TrackContext,
};

impl Orchestrator<'_> {
    /// Downloads every track of album `id`.
    ///
    /// The album cover is fetched once, embedded into every track and, if
    /// requested, saved once into the album directory.
    ///
    /// # Errors
    ///
    /// Returns error only if the album itself cannot be looked up.
    pub async fn album(&self, id: u64) -> Result<Batch> {
        let context = self.context;
        let preferences = self.preferences;

        let record = context.catalog.album(&Query::Id(id)).await?;
        let descriptors = context.media.album_songs(record.id).await?;

        let subject = Subject::Album(EntityRef::new(
            record.id,
            record.title.clone(),
            record.artist.name.clone(),
        ));
        self.emit(&subject, Status::Initializing);
        let mut batch = Batch::new(subject.clone());

        let image = cover::fetch(
            context.catalog.as_ref(),
            Some(record.md5_image.as_str()).filter(|md5| !md5.is_empty()),
            preferences.cover_size,
        )
        .await;

        let sources = self.resolve(&descriptors).await;
        let total = descriptors.len();
        for (index, (descriptor, source)) in descriptors.iter().zip(sources).enumerate() {
            let position = index + 1;
            let (tags, track) = child_tags(descriptor, &record.tracks.data, position);
            let mut tags = tags.with_album(&record);
            tags.cover.clone_from(&image);

            let link = track_link(descriptor.id());
            if let Some(failed) = track.and_then(|track| self.market_check(track, &tags, &link)) {
                batch.push(failed);
                continue;
            }

            let child = TrackContext::child(subject.clone(), position, total, link);
            let item = self.child(descriptor, tags, &child, source).await;
            batch.push(item);
        }

        if preferences.save_cover {
            if let (Some(image), Some(dir)) = (&image, album_dir(&batch)) {
                if let Err(e) = cover::save(image, &dir).await {
                    warn!("{subject}: could not save cover: {e}");
                }
            }
        }

        if preferences.make_zip {
            let files = batch.successful_paths();
            if files.is_empty() {
                debug!("{subject}: nothing to archive");
            } else {
                let zip_path = path::album_zip(
                    &preferences.output_dir,
                    &record.artist.name,
                    &record.title,
                    preferences.quality,
                );
                match archive::create(files, zip_path).await {
                    Ok(zip_path) => batch.zip_path = Some(zip_path),
                    Err(e) => warn!("{subject}: could not create archive: {e}"),
                }
            }
        }

        debug!(
            "{subject}: {} of {total} tracks from {}",
            batch.summary.total_successful() + batch.summary.total_skipped(),
            Link::deezer(Kind::Album, record.id)
        );
        Ok(self.done(batch))
    }
}

/// Directory the album's files landed in.
fn album_dir(batch: &Batch) -> Option<PathBuf> {
    batch
        .items
        .iter()
        .filter(|item| item.success)
        .find_map(|item| item.path.as_ref()?.parent().map(PathBuf::from))
}
