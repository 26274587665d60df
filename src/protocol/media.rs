//! Media URL resolution types.
//!
//! Wire types for `media.deezer.com/v1/get_url`, plus [`MediaSource`],
//! the resolved form the rest of the crate works with.
//!
//! # Wire Format
//!
//! Request:
//! ```json
//! {
//!     "license_token": "secret",
//!     "media": [{
//!         "type": "FULL",
//!         "formats": [{
//!             "cipher": "BF_CBC_STRIPE",
//!             "format": "MP3_320"
//!         }]
//!     }],
//!     "track_tokens": ["token1", "token2"]
//! }
//! ```
//!
//! Response, one entry per token in request order:
//! ```json
//! {
//!     "data": [
//!         { "media": [{ "format": "MP3_320", "sources": [{ "url": "https://..." }] }] },
//!         { "errors": [{ "code": 2002, "message": "Track token has no sufficient rights on requested media" }] }
//!     ]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;
use veil::Redact;

use crate::quality::QualityTier;

/// Media access request.
#[derive(Clone, Eq, PartialEq, Serialize, Redact)]
pub struct Request {
    /// License authentication token
    #[redact]
    pub license_token: String,
    /// Requested media formats
    pub media: Vec<Media>,
    /// Track-specific access tokens
    #[redact]
    pub track_tokens: Vec<String>,
}

impl Request {
    /// Builds a request for full tracks at a single tier.
    #[must_use]
    pub fn new(license_token: impl Into<String>, track_tokens: Vec<String>, tier: QualityTier) -> Self {
        Self {
            license_token: license_token.into(),
            media: vec![Media {
                typ: Type::FULL,
                cipher_formats: vec![CipherFormat {
                    cipher: Cipher::BF_CBC_STRIPE,
                    format: tier,
                }],
            }],
            track_tokens,
        }
    }
}

/// Media format request.
#[derive(Clone, Eq, PartialEq, Serialize, Debug)]
pub struct Media {
    /// Full track or preview clip
    #[serde(rename = "type")]
    pub typ: Type,

    /// Requested format and encryption combinations
    #[serde(rename = "formats")]
    pub cipher_formats: Vec<CipherFormat>,
}

/// Media content type.
#[derive(Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub enum Type {
    /// Full-length track
    #[default]
    FULL,
    /// Preview clip
    PREVIEW,
}

/// Format and encryption combination.
#[derive(Copy, Clone, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub struct CipherFormat {
    pub cipher: Cipher,
    pub format: QualityTier,
}

/// Content encryption method.
#[derive(Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
#[expect(non_camel_case_types)]
pub enum Cipher {
    /// Blowfish CBC with striping
    #[default]
    BF_CBC_STRIPE,
    /// No encryption
    NONE,
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Media access response.
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Debug)]
pub struct Response {
    #[serde(default)]
    pub data: Vec<Data>,

    /// Present when the request as a whole was refused.
    #[serde(default)]
    pub errors: Vec<Error>,
}

/// Response data for one track token.
#[derive(Clone, Eq, PartialEq, Deserialize, Debug)]
#[serde(untagged)]
pub enum Data {
    Media { media: Vec<Medium> },
    Errors { errors: Vec<Error> },
}

impl Data {
    /// Builds a result holding a single source.
    #[must_use]
    pub fn single(url: Url) -> Self {
        Self::Media {
            media: vec![Medium {
                media_type: Type::FULL,
                format: None,
                sources: vec![Source {
                    url,
                    provider: String::new(),
                }],
            }],
        }
    }

    /// Whether the media server reported errors for this token.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Errors { .. })
    }

    /// Sources of the first medium; empty for errors.
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        match self {
            Self::Media { media } => media.first().map_or(&[], |medium| &medium.sources),
            Self::Errors { .. } => &[],
        }
    }
}

/// Media server error.
#[derive(Clone, Eq, Default, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub struct Error {
    /// Numeric error code
    pub code: i64,
    /// Human-readable error description
    #[serde(default)]
    pub message: String,
}

impl Error {
    /// Error code for a token without rights on the requested media.
    pub const NO_RIGHTS: i64 = 2002;
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Media access details.
#[derive(Clone, Eq, PartialEq, Deserialize, Debug)]
pub struct Medium {
    #[serde(default)]
    pub media_type: Type,

    #[serde(default)]
    pub format: Option<QualityTier>,

    #[serde(default)]
    pub sources: Vec<Source>,
}

/// Media source information.
#[derive(Clone, Eq, PartialEq, Deserialize, Serialize, Redact, Hash)]
pub struct Source {
    /// Download URL (redacted in debug output)
    #[redact]
    pub url: Url,

    /// Content provider name (e.g., "ak")
    #[serde(default)]
    pub provider: String,
}

/// A playable source for one track at one tier.
///
/// Created per resolution attempt and discarded afterwards.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MediaSource {
    pub tier: QualityTier,
    pub sources: Vec<Source>,
}

impl MediaSource {
    /// URL of the preferred source.
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.sources.first().map(|source| &source.url)
    }
}
