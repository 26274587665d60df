//! Mapping entities of the source catalog onto Deezer.
//!
//! Tracks are joined by ISRC. Albums are joined by UPC first; failing
//! that, each track's ISRC leads to a candidate album, which is accepted
//! only if it has as many tracks as the source album. Reissues share ISRCs
//! with their originals but rarely their track lists.
//!
//! Free-text lookups take the first search hit of the source catalog and
//! join it like any other track.

use crate::{
    catalog::{Catalog, Query, SourceCatalog, SourcePlaylist, SourceTrack},
    error::{Error, ErrorKind, Result},
    link::{Kind, Link, Provider},
    metadata::{AlbumRecord, TrackRecord},
};

/// A source track and the outcome of mapping it.
#[derive(Debug)]
pub struct MappedTrack {
    /// Only the id is known if the source track could not be looked up.
    pub source: SourceTrack,
    pub record: Result<TrackRecord>,
}

pub struct Crosswalk<'a> {
    source: &'a dyn SourceCatalog,
    catalog: &'a dyn Catalog,
}

impl<'a> Crosswalk<'a> {
    #[must_use]
    pub fn new(source: &'a dyn SourceCatalog, catalog: &'a dyn Catalog) -> Self {
        Self { source, catalog }
    }

    /// Maps a source catalog link onto the equivalent Deezer link. Deezer
    /// links are returned as they are.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no equivalent exists, and `InvalidArgument`
    /// for playlists, which have no single equivalent.
    pub async fn map_link(&self, link: &Link) -> Result<Link> {
        if link.provider == Provider::Deezer {
            return Ok(link.clone());
        }

        match link.kind {
            Kind::Track => Ok(Link::deezer(Kind::Track, self.track(&link.id).await?.id)),
            Kind::Album => Ok(Link::deezer(Kind::Album, self.album(&link.id).await?.id)),
            _ => Err(Error::invalid_argument(format!("{link} has no single equivalent"))),
        }
    }

    /// The Deezer track with the ISRC of source track `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the source track has no ISRC or Deezer does
    /// not know it.
    pub async fn track(&self, id: &str) -> Result<TrackRecord> {
        let track = self.source.track(id).await?;
        self.equivalent(&track).await
    }

    /// The Deezer track of the first source search hit for `song` by
    /// `artist`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the search has no hits or the hit has no
    /// equivalent.
    pub async fn find(&self, artist: &str, song: &str) -> Result<TrackRecord> {
        let query = format!("track:{song} artist:{artist}");
        let hits = self.source.search(&query).await?;
        let Some(hit) = hits.first() else {
            return Err(Error::not_found(format!("no result for {query}")));
        };
        debug!("{query} found {}", hit.id);
        self.track(&hit.id).await
    }

    async fn equivalent(&self, track: &SourceTrack) -> Result<TrackRecord> {
        let Some(isrc) = track.isrc.as_deref().filter(|isrc| !isrc.is_empty()) else {
            return Err(Error::not_found(format!(
                "\"{}\" by {} has no ISRC",
                track.title, track.artist
            )));
        };

        self.track_by_isrc(isrc).await.map_err(|e| {
            Error::wrap(
                ErrorKind::NotFound,
                format!("no equivalent of \"{}\" by {}", track.title, track.artist),
                e,
            )
        })
    }

    async fn track_by_isrc(&self, isrc: &str) -> Result<TrackRecord> {
        let record = self.catalog.track(&Query::Isrc(isrc.to_owned())).await?;
        if record.id == 0 {
            return Err(Error::not_found(format!("isrc:{isrc}")));
        }
        Ok(record)
    }

    /// The Deezer album equivalent to source album `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if neither the UPC nor any track ISRC leads to a
    /// matching album.
    pub async fn album(&self, id: &str) -> Result<AlbumRecord> {
        let album = self.source.album(id).await?;

        if let Some(upc) = album.upc.as_deref() {
            let upc = upc.trim_start_matches('0');
            if upc.is_empty() {
                debug!("album {id} has a blank UPC");
            } else {
                match self.catalog.album(&Query::Upc(upc.to_owned())).await {
                    Ok(record) if record.id != 0 => {
                        debug!("album {id} found by UPC {upc}: {}", record.id);
                        return Ok(record);
                    }
                    Ok(_) => debug!("no album with UPC {upc}"),
                    Err(e) if e.kind == ErrorKind::NotFound => debug!("no album with UPC {upc}"),
                    Err(e) => warn!("looking up UPC {upc} failed: {e}"),
                }
            }
        }

        for track_id in &album.track_ids {
            match self.candidate(track_id, album.total_tracks).await {
                Ok(Some(record)) => {
                    debug!("album {id} found by track {track_id}: {}", record.id);
                    return Ok(record);
                }
                Ok(None) => {}
                Err(e) => debug!("track {track_id} leads nowhere: {e}"),
            }
        }

        Err(Error::not_found(format!(
            "no equivalent of album \"{}\"",
            album.title
        )))
    }

    /// The album of source track `id`, if it has `total_tracks` tracks.
    async fn candidate(&self, track_id: &str, total_tracks: u32) -> Result<Option<AlbumRecord>> {
        let track = self.source.track(track_id).await?;
        let Some(isrc) = track.isrc.filter(|isrc| !isrc.is_empty()) else {
            return Ok(None);
        };

        let record = self.track_by_isrc(&isrc).await?;
        let Some(album) = record.album.filter(|album| album.id != 0) else {
            return Ok(None);
        };

        let candidate = self.catalog.album(&Query::Id(album.id)).await?;
        if candidate.total_tracks() == total_tracks {
            Ok(Some(candidate))
        } else {
            trace!(
                "album {} has {} tracks, expected {total_tracks}",
                candidate.id,
                candidate.total_tracks()
            );
            Ok(None)
        }
    }

    /// The source playlist with each of its tracks mapped individually.
    ///
    /// # Errors
    ///
    /// Returns error only if the playlist itself cannot be looked up.
    pub async fn playlist(&self, id: &str) -> Result<(SourcePlaylist, Vec<MappedTrack>)> {
        let playlist = self.source.playlist(id).await?;
        let mut tracks = Vec::with_capacity(playlist.track_ids.len());
        for track_id in &playlist.track_ids {
            let mapped = match self.source.track(track_id).await {
                Ok(source) => {
                    let record = self.equivalent(&source).await;
                    MappedTrack { source, record }
                }
                Err(e) => MappedTrack {
                    source: SourceTrack {
                        id: track_id.clone(),
                        ..SourceTrack::default()
                    },
                    record: Err(e),
                },
            };
            tracks.push(mapped);
        }
        Ok((playlist, tracks))
    }
}
