//! Results of download calls.
//!
//! A [`DownloadItem`] is owned by the engine while a track is being
//! acquired and handed to the caller afterwards. A [`Batch`] collects the
//! items of an album, playlist or artist top list together with their
//! [`Summary`].
//!
//! `success` implies the file at `path` is complete and tagged;
//! `was_skipped` implies it was already there and left untouched.

use std::path::PathBuf;

use crate::{
    events::{EntityRef, FailedEntry, Subject, Summary},
    quality::QualityTier,
    tagging::Tags,
    track::{EncryptionType, TrackId},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Track,
    Episode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DownloadItem {
    pub kind: ItemKind,
    pub id: TrackId,
    pub tags: Tags,
    pub link: Option<String>,

    /// Where the file is, or would have been written.
    pub path: Option<PathBuf>,

    /// Tier the file was acquired at.
    pub quality: Option<QualityTier>,

    pub success: bool,
    pub was_skipped: bool,
    pub error_message: Option<String>,

    /// Encryption of the source stream, for diagnostics.
    pub encryption: Option<EncryptionType>,

    /// Alternate id the provider offers for this track.
    pub fallback_id: Option<TrackId>,
}

impl DownloadItem {
    #[must_use]
    pub fn new(kind: ItemKind, id: TrackId, tags: Tags, link: Option<String>) -> Self {
        Self {
            kind,
            id,
            tags,
            link,
            path: None,
            quality: None,
            success: false,
            was_skipped: false,
            error_message: None,
            encryption: None,
            fallback_id: None,
        }
    }

    /// A track that could not be acquired.
    #[must_use]
    pub fn failed(id: TrackId, tags: Tags, link: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            error_message: Some(reason.into()),
            ..Self::new(ItemKind::Track, id, tags, link)
        }
    }

    /// File extension of the result, including the dot.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|path| path.extension())
            .map(|extension| format!(".{}", extension.to_string_lossy().to_lowercase()))
    }

    #[must_use]
    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.id, self.tags.title.clone(), self.tags.artist())
    }

    #[must_use]
    pub fn subject(&self) -> Subject {
        match self.kind {
            ItemKind::Track => Subject::Track(self.entity()),
            ItemKind::Episode => Subject::Episode(self.entity()),
        }
    }
}

/// Items of an album, playlist or artist top list.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub subject: Subject,
    pub items: Vec<DownloadItem>,
    pub summary: Summary,
    pub zip_path: Option<PathBuf>,
    pub m3u_path: Option<PathBuf>,
}

impl Batch {
    #[must_use]
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            items: Vec::new(),
            summary: Summary::default(),
            zip_path: None,
            m3u_path: None,
        }
    }

    /// Adds an item and files it into the summary.
    pub fn push(&mut self, item: DownloadItem) {
        let entity = item.entity();
        if item.was_skipped {
            self.summary.skipped.push(entity);
        } else if item.success {
            self.summary.successful.push(entity);
        } else {
            self.summary.failed.push(FailedEntry {
                track: entity,
                reason: item
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "unknown reason".to_owned()),
            });
        }
        self.items.push(item);
    }

    /// Files of the items that succeeded, skipped ones included.
    #[must_use]
    pub fn successful_paths(&self) -> Vec<PathBuf> {
        self.items
            .iter()
            .filter(|item| item.success)
            .filter_map(|item| item.path.clone())
            .collect()
    }
}
