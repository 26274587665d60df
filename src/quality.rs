//! Audio quality tiers and the fallback ladder.
//!
//! Tiers are totally ordered from highest to lowest quality:
//! `FLAC` > `MP3_320` > `MP3_128`. The ladder walks them in that
//! direction when a tier cannot be served.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// A named audio quality level.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[expect(non_camel_case_types)]
pub enum QualityTier {
    /// Lossless FLAC
    FLAC,
    /// 320 kbps MP3
    MP3_320,
    /// 128 kbps MP3
    MP3_128,
}

impl QualityTier {
    /// All tiers, highest first.
    pub const LADDER: [Self; 3] = [Self::FLAC, Self::MP3_320, Self::MP3_128];

    /// Best lossy tier, the target of lossless downgrades.
    pub const BEST_LOSSY: Self = Self::MP3_320;

    /// Numeric quality code used by the legacy URL derivation.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::FLAC => 9,
            Self::MP3_320 => 3,
            Self::MP3_128 => 1,
        }
    }

    /// File extension including the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::FLAC => ".flac",
            Self::MP3_320 | Self::MP3_128 => ".mp3",
        }
    }

    /// Short label used in file and archive names.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::FLAC => "FLAC",
            Self::MP3_320 => "320",
            Self::MP3_128 => "128",
        }
    }

    #[must_use]
    pub fn is_lossless(self) -> bool {
        self == Self::FLAC
    }

    /// Position on the ladder, `0` being the highest quality.
    fn rank(self) -> usize {
        Self::LADDER
            .iter()
            .position(|tier| *tier == self)
            .unwrap_or(Self::LADDER.len())
    }
}

impl Ord for QualityTier {
    /// Higher quality compares greater.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.rank().cmp(&self.rank())
    }
}

impl PartialOrd for QualityTier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl FromStr for QualityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FLAC" => Ok(Self::FLAC),
            "MP3_320" | "320" => Ok(Self::MP3_320),
            "MP3_128" | "128" => Ok(Self::MP3_128),
            other => Err(Error::invalid_argument(format!(
                "unknown quality tier: {other}"
            ))),
        }
    }
}

/// Ordered plan of tiers to attempt for one track.
///
/// Built once from the requested tier, without any I/O; the engine walks
/// [`steps`](Ladder::steps) in order and stops at the first tier whose
/// source can be fetched. When every step fails, the attempt fails with
/// [`exhausted`](Ladder::exhausted).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ladder {
    /// Tiers to try, in order.
    pub steps: Vec<QualityTier>,

    /// Error kind raised once all steps have failed.
    pub exhausted: ErrorKind,
}

impl Ladder {
    /// Plans the tiers for a track requested at `requested`.
    ///
    /// * A lossless request for a track that reports zero lossless bytes
    ///   starts at the best lossy tier.
    /// * A lossless start falls back once to the best lossy tier.
    /// * A lossy start fails with `QualityUnavailable` unless `recursive`,
    ///   in which case every other tier is tried from highest to lowest.
    #[must_use]
    pub fn plan(requested: QualityTier, lossless_size: Option<u64>, recursive: bool) -> Self {
        let start = if requested.is_lossless() && lossless_size == Some(0) {
            QualityTier::BEST_LOSSY
        } else {
            requested
        };

        if start.is_lossless() {
            return Self {
                steps: vec![start, QualityTier::BEST_LOSSY],
                exhausted: ErrorKind::NotFound,
            };
        }

        if recursive {
            let mut steps = vec![start];
            steps.extend(QualityTier::LADDER.into_iter().filter(|tier| *tier != start));
            Self {
                steps,
                exhausted: ErrorKind::NotFound,
            }
        } else {
            Self {
                steps: vec![start],
                exhausted: ErrorKind::QualityUnavailable,
            }
        }
    }

    /// The tier the first attempt is made at.
    #[must_use]
    pub fn start(&self) -> QualityTier {
        self.steps[0]
    }
}
