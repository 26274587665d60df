//! Podcast episode descriptors from the gateway.
//!
//! Episodes stream from a direct URL rather than the encrypted CDN, and
//! carry show metadata instead of artist and album.

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use super::Method;
use crate::track::{Episode, TrackId};

impl Method for EpisodeData {
    const METHOD: &'static str = "episode.getData";
}

/// Result of `episode.getData`.
#[derive(Clone, PartialEq, Deserialize, Debug)]
#[serde(transparent)]
pub struct EpisodeData(pub Episode);

impl Deref for EpisodeData {
    type Target = Episode;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Request body of `episode.getData`.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct Request {
    #[serde(rename = "episode_id")]
    #[serde_as(as = "DisplayFromStr")]
    pub episode_id: TrackId,
}
