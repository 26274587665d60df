//! Links to catalog entities.
//!
//! Parses Deezer links such as `https://www.deezer.com/en/album/302127` and
//! links of the source catalog such as
//! `https://open.spotify.com/track/0DiWol3AO6WpXZgp0goxAV`. Query strings
//! and fragments are ignored.

use std::{fmt, str::FromStr, sync::LazyLock};

use regex_lite::Regex;

use crate::error::{Error, Result};

type Pattern = LazyLock<std::result::Result<Regex, regex_lite::Error>>;

static DEEZER: Pattern = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?deezer\.com/(?:[a-z]{2}(?:-[a-z]{2})?/)?(track|album|playlist|episode|artist)/(\d+)(?:/top_track)?/?$",
    )
});

static SOURCE: Pattern = LazyLock::new(|| {
    Regex::new(r"^https?://open\.spotify\.com/(?:intl-[a-z]{2}/)?(track|album|playlist)/([A-Za-z0-9]+)/?$")
});

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    Deezer,

    /// The catalog links are mapped from.
    Spotify,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Track,
    Album,
    Playlist,
    Episode,
    Artist,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Playlist => "playlist",
            Self::Episode => "episode",
            Self::Artist => "artist",
        }
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "playlist" => Ok(Self::Playlist),
            "episode" => Ok(Self::Episode),
            "artist" => Ok(Self::Artist),
            other => Err(Error::invalid_argument(format!("unsupported link kind: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Link {
    pub provider: Provider,
    pub kind: Kind,
    pub id: String,
}

impl Link {
    #[must_use]
    pub fn deezer(kind: Kind, id: u64) -> Self {
        Self {
            provider: Provider::Deezer,
            kind,
            id: id.to_string(),
        }
    }

    /// Numeric id of a Deezer link.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for links of the source catalog.
    pub fn deezer_id(&self) -> Result<u64> {
        if self.provider != Provider::Deezer {
            return Err(Error::invalid_argument(format!("{self} is not a Deezer link")));
        }
        self.id
            .parse()
            .map_err(|_| Error::invalid_argument(format!("invalid id in {self}")))
    }
}

fn captures(pattern: &Pattern, link: &str) -> Result<Option<(Kind, String)>> {
    let regex = pattern
        .as_ref()
        .map_err(|e| Error::internal(format!("invalid link pattern: {e}")))?;
    let Some(captures) = regex.captures(link) else {
        return Ok(None);
    };
    let kind = captures.get(1).map_or("", |m| m.as_str()).parse()?;
    let id = captures.get(2).map_or("", |m| m.as_str()).to_owned();
    Ok(Some((kind, id)))
}

impl FromStr for Link {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let link = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or(trimmed);

        if let Some((kind, id)) = captures(&DEEZER, link)? {
            return Ok(Self {
                provider: Provider::Deezer,
                kind,
                id,
            });
        }
        if let Some((kind, id)) = captures(&SOURCE, link)? {
            return Ok(Self {
                provider: Provider::Spotify,
                kind,
                id,
            });
        }
        Err(Error::invalid_argument(format!("unsupported link: {trimmed}")))
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.provider {
            Provider::Deezer => write!(f, "https://www.deezer.com/{}/{}", self.kind.as_str(), self.id),
            Provider::Spotify => write!(f, "https://open.spotify.com/{}/{}", self.kind.as_str(), self.id),
        }
    }
}
