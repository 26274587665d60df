//! Per-request download preferences.
//!
//! [`Preferences`] is the immutable snapshot a caller passes to one
//! download call. Orchestrators never mutate it; whatever differs per child
//! lives in a [`TrackContext`] built for that child.

use std::path::PathBuf;

use crate::{convert::ConversionTarget, events::Subject, quality::QualityTier};

#[derive(Clone, Debug, PartialEq)]
pub struct Preferences {
    /// Root of the output tree.
    pub output_dir: PathBuf,

    pub quality: QualityTier,

    /// Walk every remaining tier when a lossy tier cannot be served.
    pub recursive_quality: bool,

    /// Archive the successful files of an album or playlist.
    pub make_zip: bool,

    /// Write `cover.jpg` next to the downloaded files.
    pub save_cover: bool,

    /// Edge length of downloaded artwork in pixels.
    pub cover_size: u32,

    pub convert_to: Option<ConversionTarget>,

    /// Directory template, relative to `output_dir`.
    pub dir_format: String,

    /// File name template, without extension.
    pub track_format: String,

    /// Zero-pad track numbers to the width of the track count.
    pub pad_tracks: bool,

    /// Report download progress per percent.
    pub real_time: bool,

    /// ISO 3166-1 country code the tracks must be available in.
    pub market: Option<String>,
}

impl Preferences {
    pub const DEFAULT_DIR_FORMAT: &'static str = "%ar_album%/%album%";
    pub const DEFAULT_TRACK_FORMAT: &'static str = "%tracknum%. %music%";
    pub const DEFAULT_COVER_SIZE: u32 = 1200;

    /// Preferences writing to `output_dir` with defaults otherwise.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            quality: QualityTier::MP3_320,
            recursive_quality: false,
            make_zip: false,
            save_cover: false,
            cover_size: Self::DEFAULT_COVER_SIZE,
            convert_to: None,
            dir_format: Self::DEFAULT_DIR_FORMAT.to_owned(),
            track_format: Self::DEFAULT_TRACK_FORMAT.to_owned(),
            pad_tracks: true,
            real_time: false,
            market: None,
        }
    }
}

/// Values that differ per child of a batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackContext {
    /// Link reported back on the item.
    pub link: Option<String>,

    /// Album or playlist the track belongs to.
    pub parent: Option<Subject>,

    /// 1-based position within the parent.
    pub position: Option<usize>,

    /// Number of children of the parent.
    pub total: Option<usize>,

    /// Whether the cover belongs next to this file rather than being
    /// written once for the whole batch.
    pub cover_beside: bool,
}

impl TrackContext {
    /// Context of a track downloaded on its own.
    #[must_use]
    pub fn standalone(link: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            cover_beside: true,
            ..Self::default()
        }
    }

    /// Context of child `position` of `total` within `parent`.
    #[must_use]
    pub fn child(parent: Subject, position: usize, total: usize, link: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            parent: Some(parent),
            position: Some(position),
            total: Some(total),
            cover_beside: false,
        }
    }

    #[must_use]
    pub fn with_cover_beside(mut self, cover_beside: bool) -> Self {
        self.cover_beside = cover_beside;
        self
    }
}
