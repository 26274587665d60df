use super::Orchestrator;
use crate::{
    error::Result,
    events::{EntityRef, Status, Subject},
    item::Batch,
};

impl Orchestrator<'_> {
    /// Downloads the most popular tracks of artist `id`.
    ///
    /// Each track is looked up on the gateway on its own, so a track the
    /// gateway does not know only fails that track.
    ///
    /// # Errors
    ///
    /// Returns error only if the top list itself cannot be looked up.
    pub async fn artist_top(&self, id: u64) -> Result<Batch> {
        let records = self.context.catalog.artist_top(id).await?;

        let name = records
            .first()
            .map(|record| record.artist.name.clone())
            .unwrap_or_default();
        let subject = Subject::ArtistTop(EntityRef::new(id, "Top tracks", name));
        self.emit(&subject, Status::Initializing);
        let mut batch = Batch::new(subject.clone());

        let total = records.len();
        for (index, record) in records.iter().enumerate() {
            let item = self.record_child(record, &subject, index + 1, total).await;
            batch.push(item);
        }

        Ok(self.done(batch))
    }
}
